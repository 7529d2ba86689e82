//! # Pipepack
//!
//! A binary archive format and reader/writer for precompiled
//! graphics-pipeline objects: shaders, pipeline resource signatures, render
//! passes, and graphics/compute/tile/ray-tracing pipeline states.
//!
//! An offline [`Archiver`] bundles device-specific compiled shader bytecode
//! and shared (device-agnostic) pipeline descriptions for multiple backend
//! APIs into one relocatable blob. At runtime an [`Archive`] opens the blob,
//! locates the data for its own backend, and reconstructs live pipeline
//! objects through a pluggable [`device::PipelineFactory`], with
//! weak-reference caching and shader deduplication.
//!
//! ## Archive layout
//!
//! ```text
//! | ArchiveHeader | ChunkHeader * N |
//! | chunk bodies (named-resource arrays, shader tables, debug info) |
//! | shared data: one typed record per resource                      |
//! | backend block 0 | backend block 1 | ...                         |
//! ```
//!
//! Backend-agnostic descriptor bytes are stored once per resource no matter
//! how many backends it targets; each backend block holds only that
//! backend's compiled data, addressed relative to the block base so blocks
//! can be relocated by patching one offset. Identical shaders are stored
//! once per backend and referenced by index.
//!
//! ## Writing
//!
//! ```rust,ignore
//! use pipepack::{Archiver, BackendFlags, PatcherRegistry};
//!
//! let mut patchers = PatcherRegistry::new();
//! patchers.register(Backend::Vulkan, vulkan_patcher);
//! let mut archiver = Archiver::new(patchers);
//! archiver.add_signature(&signature, BackendFlags::VULKAN)?;
//! archiver.add_graphics_pipeline(&pipeline, BackendFlags::VULKAN)?;
//! std::fs::write("pipelines.ppk", archiver.serialize_to_blob()?)?;
//! ```
//!
//! ## Reading
//!
//! ```rust,ignore
//! use pipepack::{Archive, Backend, MappedArchive};
//!
//! let source = Arc::new(MappedArchive::open("pipelines.ppk")?);
//! let archive = Archive::open(source, Backend::Vulkan, factory)?;
//! let pso = archive.unpack_graphics_pipeline("P1", None)?;
//! // A second unpack of "P1" is served from the cache without I/O.
//! ```
//!
//! ## Error handling
//!
//! Structural problems fail [`Archive::open`] outright; per-resource
//! problems fail only the unpack call at hand and leave the archive usable.
//! All failure conditions surface as [`PipepackError`] values, never
//! panics.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

pub mod dedup;
pub mod device;
pub mod error;
pub mod format;
pub mod inspector;
pub mod layout;
pub mod reader;
pub mod serializer;
pub mod source;
pub mod types;
pub mod writer;

pub use device::{ObjectHandle, PatcherRegistry, PipelineFactory, ShaderPatcher};
pub use error::{PipepackError, Result};
pub use format::{Backend, BackendFlags, ChunkType};
pub use inspector::{ArchiveInspector, ArchiveReport};
pub use reader::Archive;
pub use source::{ArchiveSource, MappedArchive};
pub use writer::{Archiver, API_VERSION};
