//! Collaborator interfaces to the graphics backends.
//!
//! The core never talks to a graphics API. On the write side a
//! [`ShaderPatcher`] per backend compiles a pipeline's shaders into that
//! backend's stored form; on the read side a [`PipelineFactory`] turns fully
//! reconstructed descriptors into live engine objects. Backends are selected
//! through a runtime registry, never by hard-coded dispatch inside the core.

use std::any::Any;
use std::sync::Arc;

use crate::error::{PipepackError, Result};
use crate::format::{Backend, BackendFlags, BACKEND_COUNT};
use crate::types::{
    ComputePipelineCreateInfo, ComputePipelineDesc, GraphicsPipelineCreateInfo,
    GraphicsPipelineDesc, RayTracingPipelineCreateInfo, RayTracingPipelineDesc, RenderPassDesc,
    ShaderData, ShaderStage, SignatureDesc, TilePipelineCreateInfo, TilePipelineDesc,
};

/// A live engine object produced by a [`PipelineFactory`].
///
/// The archive caches these without interpreting them; `as_any` lets the
/// owning engine downcast back to its concrete type.
pub trait DeviceObject: Any + Send + Sync + std::fmt::Debug {
    /// The object as `Any`, for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// A shared handle to a live engine object.
pub type ObjectHandle = Arc<dyn DeviceObject>;

/// Everything the factory needs to create a graphics pipeline.
pub struct UnpackedGraphicsPipeline<'a> {
    /// The deserialized descriptor, overrides already applied.
    pub desc: &'a GraphicsPipelineDesc,
    /// Live signatures, parallel to `desc.signature_names`.
    pub signatures: &'a [ObjectHandle],
    /// Live render pass when `desc.render_pass_name` is set.
    pub render_pass: Option<&'a ObjectHandle>,
    /// Live shaders with their stages.
    pub shaders: &'a [(ShaderStage, ObjectHandle)],
}

/// Everything the factory needs to create a compute pipeline.
pub struct UnpackedComputePipeline<'a> {
    /// The deserialized descriptor.
    pub desc: &'a ComputePipelineDesc,
    /// Live signatures, parallel to `desc.signature_names`.
    pub signatures: &'a [ObjectHandle],
    /// The compute shader.
    pub shader: &'a ObjectHandle,
}

/// Everything the factory needs to create a tile pipeline.
pub struct UnpackedTilePipeline<'a> {
    /// The deserialized descriptor, overrides already applied.
    pub desc: &'a TilePipelineDesc,
    /// Live signatures, parallel to `desc.signature_names`.
    pub signatures: &'a [ObjectHandle],
    /// The tile shader.
    pub shader: &'a ObjectHandle,
}

/// Everything the factory needs to create a ray-tracing pipeline.
///
/// Shader groups in `desc` index into `shaders`; every index has been
/// validated by the reader's remap pass.
pub struct UnpackedRayTracingPipeline<'a> {
    /// The deserialized descriptor.
    pub desc: &'a RayTracingPipelineDesc,
    /// Live signatures, parallel to `desc.signature_names`.
    pub signatures: &'a [ObjectHandle],
    /// Live shaders, indexed by the descriptor's shader groups.
    pub shaders: &'a [ObjectHandle],
}

/// Creates live engine objects from unpacked archive data.
///
/// One factory serves one backend; the reader calls it outside of any lock,
/// so implementations may take as long as they need. Returning an error
/// fails only the resource being unpacked.
pub trait PipelineFactory: Send + Sync {
    /// Creates a shader from its stored record.
    fn create_shader(&self, shader: &ShaderData) -> Result<ObjectHandle>;

    /// Creates a resource signature from its descriptor and this backend's
    /// serialized signature data.
    fn create_signature(&self, desc: &SignatureDesc, device_data: &[u8]) -> Result<ObjectHandle>;

    /// Creates a render pass.
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<ObjectHandle>;

    /// Creates a graphics pipeline.
    fn create_graphics_pipeline(&self, pipeline: UnpackedGraphicsPipeline<'_>)
        -> Result<ObjectHandle>;

    /// Creates a compute pipeline.
    fn create_compute_pipeline(&self, pipeline: UnpackedComputePipeline<'_>)
        -> Result<ObjectHandle>;

    /// Creates a tile pipeline.
    fn create_tile_pipeline(&self, pipeline: UnpackedTilePipeline<'_>) -> Result<ObjectHandle>;

    /// Creates a ray-tracing pipeline.
    fn create_ray_tracing_pipeline(
        &self,
        pipeline: UnpackedRayTracingPipeline<'_>,
    ) -> Result<ObjectHandle>;
}

/// Compiles pipeline shaders into one backend's stored form.
///
/// Each `patch_*` call returns the compiled records for every shader the
/// pipeline uses on that backend. For ray-tracing pipelines the returned
/// list must be parallel to the create info's `shaders` list, because the
/// descriptor's shader groups reference shaders by index.
pub trait ShaderPatcher: Send + Sync {
    /// Compiles the shaders of a graphics pipeline.
    fn patch_graphics(&self, info: &GraphicsPipelineCreateInfo) -> Result<Vec<ShaderData>>;

    /// Compiles the shader of a compute pipeline.
    fn patch_compute(&self, info: &ComputePipelineCreateInfo) -> Result<Vec<ShaderData>>;

    /// Compiles the shader of a tile pipeline.
    fn patch_tile(&self, info: &TilePipelineCreateInfo) -> Result<Vec<ShaderData>>;

    /// Compiles the shaders of a ray-tracing pipeline, preserving order.
    fn patch_ray_tracing(&self, info: &RayTracingPipelineCreateInfo) -> Result<Vec<ShaderData>>;

    /// Produces this backend's serialized signature data, or `None` when the
    /// backend stores none.
    fn signature_data(&self, desc: &SignatureDesc) -> Result<Option<Vec<u8>>>;
}

/// Maps backends to their shader patchers.
///
/// The set of registered backends defines which [`BackendFlags`] an archiver
/// accepts.
#[derive(Default)]
pub struct PatcherRegistry {
    slots: [Option<Arc<dyn ShaderPatcher>>; BACKEND_COUNT],
}

impl PatcherRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `patcher` for `backend`, replacing any previous one.
    pub fn register(&mut self, backend: Backend, patcher: Arc<dyn ShaderPatcher>) {
        self.slots[backend.index()] = Some(patcher);
    }

    /// The patcher for `backend`.
    pub fn get(&self, backend: Backend) -> Result<&Arc<dyn ShaderPatcher>> {
        self.slots[backend.index()].as_ref().ok_or_else(|| {
            PipepackError::Usage(format!("no patcher registered for {}", backend.name()))
        })
    }

    /// The set of backends with a registered patcher.
    pub fn supported(&self) -> BackendFlags {
        let mut flags = BackendFlags::empty();
        for backend in Backend::ALL {
            if self.slots[backend.index()].is_some() {
                flags |= backend.flag();
            }
        }
        flags
    }
}

impl std::fmt::Debug for PatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PatcherRegistry({:?})", self.supported())
    }
}
