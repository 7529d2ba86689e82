//! Defines the physical binary layout of Pipepack archives.
//!
//! # Layout
//!
//! ```text
//! | ArchiveHeader | ChunkHeader * N | chunk bodies ... | shared data | per-backend blocks ... |
//! ```
//!
//! - The [`ArchiveHeader`] carries the magic number, format version, chunk
//!   count and one base offset per backend block (sentinel
//!   [`INVALID_OFFSET`] when a backend has no data).
//! - Each chunk body is either a named-resource array (count, three parallel
//!   `u32` arrays, packed NUL-terminated names), the shader index header, or
//!   the serialized debug info.
//! - The shared-data segment holds one [`DataHeader`]-prefixed record per
//!   resource: backend-agnostic descriptor bytes plus a per-backend
//!   size/offset table pointing into the backend blocks.
//!
//! All integers are little-endian. Every chunk body, the shared-data
//! segment, every per-backend block, and every record inside the shared
//! segment starts at a [`SEGMENT_ALIGN`]-aligned offset; the writer pads
//! with zeros and records the aligned offsets, so readers never re-derive
//! padding.

use crate::error::{PipepackError, Result};

/// Magic number identifying the file format ("PPAK" in little-endian order).
pub const MAGIC_NUMBER: u32 = u32::from_le_bytes(*b"PPAK");

/// Current archive format version. Older or newer archives are rejected.
pub const FORMAT_VERSION: u32 = 1;

/// Sentinel for "no offset": a backend block that is absent, or a
/// per-backend slot with no data.
pub const INVALID_OFFSET: u32 = u32::MAX;

/// Alignment of every segment start and shared-data record, in bytes.
pub const SEGMENT_ALIGN: usize = 8;

/// Maximum number of resource signatures a pipeline may reference.
pub const MAX_SIGNATURES_PER_PIPELINE: usize = 8;

/// Number of backend kinds the format reserves a block slot for.
pub const BACKEND_COUNT: usize = 6;

/// Number of chunk types.
pub const CHUNK_TYPE_COUNT: usize = 8;

/// Backend APIs a resource can carry device-specific data for.
///
/// The discriminant is the block slot index in the archive header; the
/// on-disk block order follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Backend {
    /// OpenGL / OpenGL ES.
    OpenGl = 0,
    /// Direct3D 11.
    Direct3D11 = 1,
    /// Direct3D 12.
    Direct3D12 = 2,
    /// Vulkan.
    Vulkan = 3,
    /// Metal on iOS.
    MetalIos = 4,
    /// Metal on macOS.
    MetalMacos = 5,
}

impl Backend {
    /// All backends in block-slot order.
    pub const ALL: [Backend; BACKEND_COUNT] = [
        Backend::OpenGl,
        Backend::Direct3D11,
        Backend::Direct3D12,
        Backend::Vulkan,
        Backend::MetalIos,
        Backend::MetalMacos,
    ];

    /// Decodes a block-slot index.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }

    /// The block-slot index of this backend.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The flag bit for this backend.
    pub fn flag(self) -> BackendFlags {
        BackendFlags::from_bits_truncate(1 << self as u32)
    }

    /// The other Metal flavor, if this is a Metal backend.
    ///
    /// Metal-iOS and Metal-macOS share resource-signature data; the writer
    /// fills a missing Metal signature slot from its twin.
    pub fn metal_twin(self) -> Option<Backend> {
        match self {
            Backend::MetalIos => Some(Backend::MetalMacos),
            Backend::MetalMacos => Some(Backend::MetalIos),
            _ => None,
        }
    }

    /// Human-readable backend name for diagnostics and reports.
    pub fn name(self) -> &'static str {
        match self {
            Backend::OpenGl => "OpenGL",
            Backend::Direct3D11 => "Direct3D11",
            Backend::Direct3D12 => "Direct3D12",
            Backend::Vulkan => "Vulkan",
            Backend::MetalIos => "Metal-iOS",
            Backend::MetalMacos => "Metal-macOS",
        }
    }
}

bitflags::bitflags! {
    /// A set of target backends for an add operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BackendFlags: u32 {
        /// OpenGL / OpenGL ES.
        const OPEN_GL = 1 << 0;
        /// Direct3D 11.
        const DIRECT3D11 = 1 << 1;
        /// Direct3D 12.
        const DIRECT3D12 = 1 << 2;
        /// Vulkan.
        const VULKAN = 1 << 3;
        /// Metal on iOS.
        const METAL_IOS = 1 << 4;
        /// Metal on macOS.
        const METAL_MACOS = 1 << 5;
    }
}

impl BackendFlags {
    /// Iterates the backends whose bits are set, in block-slot order.
    pub fn backends(self) -> impl Iterator<Item = Backend> {
        Backend::ALL.into_iter().filter(move |b| self.contains(b.flag()))
    }
}

/// Top-level chunk categories.
///
/// The discriminant is the fixed layout order of the chunk bodies. At most
/// one chunk of each type may appear in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChunkType {
    /// Writer version info (API version + git hash).
    DebugInfo = 0,
    /// Named pipeline resource signatures.
    ResourceSignatures = 1,
    /// Named graphics pipelines.
    GraphicsPipelines = 2,
    /// Named compute pipelines.
    ComputePipelines = 3,
    /// Named ray-tracing pipelines.
    RayTracingPipelines = 4,
    /// Named tile pipelines.
    TilePipelines = 5,
    /// Named render passes.
    RenderPasses = 6,
    /// The per-backend shader index tables.
    Shaders = 7,
}

impl ChunkType {
    /// All chunk types in layout order.
    pub const ALL: [ChunkType; CHUNK_TYPE_COUNT] = [
        ChunkType::DebugInfo,
        ChunkType::ResourceSignatures,
        ChunkType::GraphicsPipelines,
        ChunkType::ComputePipelines,
        ChunkType::RayTracingPipelines,
        ChunkType::TilePipelines,
        ChunkType::RenderPasses,
        ChunkType::Shaders,
    ];

    /// Decodes a chunk type tag.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }

    /// The layout-order index of this chunk type.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable chunk name for diagnostics and reports.
    pub fn name(self) -> &'static str {
        match self {
            ChunkType::DebugInfo => "DebugInfo",
            ChunkType::ResourceSignatures => "ResourceSignatures",
            ChunkType::GraphicsPipelines => "GraphicsPipelines",
            ChunkType::ComputePipelines => "ComputePipelines",
            ChunkType::RayTracingPipelines => "RayTracingPipelines",
            ChunkType::TilePipelines => "TilePipelines",
            ChunkType::RenderPasses => "RenderPasses",
            ChunkType::Shaders => "Shaders",
        }
    }
}

/// Reads a little-endian `u32` at `pos`, failing on truncated input.
pub(crate) fn get_u32(bytes: &[u8], pos: usize) -> Result<u32> {
    bytes
        .get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| PipepackError::Format("unexpected end of data".into()))
}

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
pub(crate) fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// The fixed-size header at offset 0 of every archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Must equal [`MAGIC_NUMBER`].
    pub magic: u32,
    /// Must equal [`FORMAT_VERSION`].
    pub version: u32,
    /// Number of chunk table entries that follow the header.
    pub num_chunks: u32,
    /// Absolute base offset of each backend block, [`INVALID_OFFSET`] if the
    /// backend has no data in this archive.
    pub block_base_offsets: [u32; BACKEND_COUNT],
}

impl ArchiveHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 12 + BACKEND_COUNT * 4;

    /// Serializes to a fixed-size byte array.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.num_chunks.to_le_bytes());
        for (i, off) in self.block_base_offsets.iter().enumerate() {
            let at = 12 + i * 4;
            buf[at..at + 4].copy_from_slice(&off.to_le_bytes());
        }
        buf
    }

    /// Deserializes from a byte buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut block_base_offsets = [INVALID_OFFSET; BACKEND_COUNT];
        for (i, off) in block_base_offsets.iter_mut().enumerate() {
            *off = get_u32(bytes, 12 + i * 4)?;
        }
        Ok(Self {
            magic: get_u32(bytes, 0)?,
            version: get_u32(bytes, 4)?,
            num_chunks: get_u32(bytes, 8)?,
            block_base_offsets,
        })
    }
}

/// One entry of the chunk table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Which category this chunk holds.
    pub chunk_type: ChunkType,
    /// Size of the chunk body in bytes.
    pub size: u32,
    /// Absolute file offset of the chunk body.
    pub offset: u32,
}

impl ChunkHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 12;

    /// Serializes to a fixed-size byte array.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&(self.chunk_type as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.offset.to_le_bytes());
        buf
    }

    /// Deserializes from a byte buffer, rejecting unknown chunk types.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw_type = get_u32(bytes, 0)?;
        let chunk_type = ChunkType::from_u32(raw_type)
            .ok_or_else(|| PipepackError::Format(format!("unknown chunk type ({raw_type})")))?;
        Ok(Self {
            chunk_type,
            size: get_u32(bytes, 4)?,
            offset: get_u32(bytes, 8)?,
        })
    }
}

/// An `(offset, size)` pair addressing a byte range.
///
/// Depending on context the offset is absolute (named-resource entries after
/// finalization) or relative to a backend block base (shader records).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileRange {
    /// Start of the range.
    pub offset: u32,
    /// Length of the range in bytes.
    pub size: u32,
}

impl FileRange {
    /// Serialized size in bytes.
    pub const SIZE: usize = 8;

    /// One-past-the-end offset, widened to avoid overflow.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }

    /// Serializes to a fixed-size byte array.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.offset.to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// Deserializes from a byte buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            offset: get_u32(bytes, 0)?,
            size: get_u32(bytes, 4)?,
        })
    }
}

/// The typed header that starts every shared-data record, and the body of
/// the Shaders chunk.
///
/// The per-backend table addresses this resource's device-specific bytes
/// inside the backend block: `block_base + offsets[backend]`. Offsets stay
/// block-relative forever; only the block bases move when the archive is
/// relocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    /// The chunk category this record belongs to, used as a corruption check
    /// when the record is read back.
    pub chunk_type: ChunkType,
    /// Per-backend data size; zero marks "no data for this backend".
    pub sizes: [u32; BACKEND_COUNT],
    /// Per-backend block-relative data offset; [`INVALID_OFFSET`] when the
    /// size is zero.
    pub offsets: [u32; BACKEND_COUNT],
}

impl DataHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 4 + BACKEND_COUNT * 8;

    /// Creates a header with no device data recorded.
    pub fn new(chunk_type: ChunkType) -> Self {
        Self {
            chunk_type,
            sizes: [0; BACKEND_COUNT],
            offsets: [INVALID_OFFSET; BACKEND_COUNT],
        }
    }

    /// Records the device-data range of `backend`.
    pub fn set_range(&mut self, backend: Backend, range: FileRange) {
        self.sizes[backend.index()] = range.size;
        self.offsets[backend.index()] = range.offset;
    }

    /// The device-data range of `backend`, `None` when absent.
    pub fn range(&self, backend: Backend) -> Option<FileRange> {
        let size = self.sizes[backend.index()];
        if size == 0 {
            return None;
        }
        Some(FileRange {
            offset: self.offsets[backend.index()],
            size,
        })
    }

    /// Serializes to a fixed-size byte array.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&(self.chunk_type as u32).to_le_bytes());
        for i in 0..BACKEND_COUNT {
            let at = 4 + i * 4;
            buf[at..at + 4].copy_from_slice(&self.sizes[i].to_le_bytes());
        }
        for i in 0..BACKEND_COUNT {
            let at = 4 + (BACKEND_COUNT + i) * 4;
            buf[at..at + 4].copy_from_slice(&self.offsets[i].to_le_bytes());
        }
        buf
    }

    /// Deserializes from a byte buffer, rejecting unknown type tags.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw_type = get_u32(bytes, 0)?;
        let chunk_type = ChunkType::from_u32(raw_type).ok_or_else(|| {
            PipepackError::Format(format!("unknown data header type ({raw_type})"))
        })?;
        let mut sizes = [0u32; BACKEND_COUNT];
        let mut offsets = [INVALID_OFFSET; BACKEND_COUNT];
        for (i, size) in sizes.iter_mut().enumerate() {
            *size = get_u32(bytes, 4 + i * 4)?;
        }
        for (i, off) in offsets.iter_mut().enumerate() {
            *off = get_u32(bytes, 4 + (BACKEND_COUNT + i) * 4)?;
        }
        Ok(Self {
            chunk_type,
            sizes,
            offsets,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn header_round_trip() {
        let header = ArchiveHeader {
            magic: MAGIC_NUMBER,
            version: FORMAT_VERSION,
            num_chunks: 3,
            block_base_offsets: [64, INVALID_OFFSET, 128, INVALID_OFFSET, 256, 512],
        };
        let decoded = ArchiveHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn data_header_round_trip() {
        let mut header = DataHeader::new(ChunkType::GraphicsPipelines);
        header.set_range(Backend::Vulkan, FileRange { offset: 40, size: 16 });
        let decoded = DataHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(
            decoded.range(Backend::Vulkan),
            Some(FileRange { offset: 40, size: 16 })
        );
        assert_eq!(decoded.range(Backend::OpenGl), None);
    }

    #[test]
    fn chunk_header_rejects_unknown_type() {
        let mut bytes = ChunkHeader {
            chunk_type: ChunkType::Shaders,
            size: 1,
            offset: 2,
        }
        .to_bytes();
        bytes[0] = 0xAA;
        assert!(ChunkHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn align_up_powers_of_two() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(13, 4), 16);
    }
}
