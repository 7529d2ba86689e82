//! Mock backend collaborators and fixture builders shared by the
//! integration tests.
#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use pipepack::device::{
    DeviceObject, ObjectHandle, PipelineFactory, ShaderPatcher, UnpackedComputePipeline,
    UnpackedGraphicsPipeline, UnpackedRayTracingPipeline, UnpackedTilePipeline,
};
use pipepack::format::Backend;
use pipepack::source::ArchiveSource;
use pipepack::types::{
    ComputePipelineCreateInfo, GraphicsPipelineCreateInfo, GraphicsPipelineDesc,
    RayTracingPipelineCreateInfo, RenderPassDesc, ResourceBindingDesc, ResourceKind, ShaderData,
    ShaderStage, ShaderStageFlags, SignatureDesc, TilePipelineCreateInfo, VariableKind,
};
use pipepack::{PatcherRegistry, Result};

/// A live object handed back by the mock factory.
#[derive(Debug)]
pub struct MockObject {
    pub kind: &'static str,
    pub name: String,
    /// Shader bytecode, signature device data, or empty.
    pub payload: Vec<u8>,
    pub stage: Option<ShaderStage>,
}

impl DeviceObject for MockObject {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn as_mock(handle: &ObjectHandle) -> &MockObject {
    handle
        .as_any()
        .downcast_ref::<MockObject>()
        .expect("object created by MockFactory")
}

/// Patches shaders by appending the backend index to every non-vertex
/// shader's bytecode, so vertex shaders stay identical across backends
/// while other stages differ per backend.
pub struct MockPatcher {
    pub backend: Backend,
}

impl MockPatcher {
    fn compile(&self, shaders: &[ShaderData]) -> Vec<ShaderData> {
        shaders
            .iter()
            .map(|shader| {
                let mut compiled = shader.clone();
                if shader.stage != ShaderStage::Vertex {
                    compiled.bytecode.push(self.backend.index() as u8);
                }
                compiled
            })
            .collect()
    }
}

impl ShaderPatcher for MockPatcher {
    fn patch_graphics(&self, info: &GraphicsPipelineCreateInfo) -> Result<Vec<ShaderData>> {
        Ok(self.compile(&info.shaders))
    }

    fn patch_compute(&self, info: &ComputePipelineCreateInfo) -> Result<Vec<ShaderData>> {
        Ok(self.compile(&info.shaders))
    }

    fn patch_tile(&self, info: &TilePipelineCreateInfo) -> Result<Vec<ShaderData>> {
        Ok(self.compile(&info.shaders))
    }

    fn patch_ray_tracing(&self, info: &RayTracingPipelineCreateInfo) -> Result<Vec<ShaderData>> {
        Ok(self.compile(&info.shaders))
    }

    fn signature_data(&self, desc: &SignatureDesc) -> Result<Option<Vec<u8>>> {
        // A plausible stand-in for backend-compiled signature data.
        let mut blob = (desc.resources.len() as u32).to_le_bytes().to_vec();
        blob.push(self.backend.index() as u8);
        Ok(Some(blob))
    }
}

pub fn registry(backends: &[Backend]) -> PatcherRegistry {
    let mut registry = PatcherRegistry::new();
    for &backend in backends {
        registry.register(backend, Arc::new(MockPatcher { backend }));
    }
    registry
}

/// Records everything it creates.
#[derive(Default)]
pub struct MockFactory {
    pub shaders: Mutex<Vec<ShaderData>>,
    pub signatures: Mutex<Vec<(SignatureDesc, Vec<u8>)>>,
    pub render_passes: Mutex<Vec<RenderPassDesc>>,
    pub graphics: Mutex<Vec<GraphicsPipelineDesc>>,
    pub created_count: AtomicU64,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn object(&self, kind: &'static str, name: &str, payload: Vec<u8>, stage: Option<ShaderStage>) -> ObjectHandle {
        self.created_count.fetch_add(1, Ordering::SeqCst);
        Arc::new(MockObject {
            kind,
            name: name.to_owned(),
            payload,
            stage,
        })
    }
}

impl PipelineFactory for MockFactory {
    fn create_shader(&self, shader: &ShaderData) -> Result<ObjectHandle> {
        self.shaders.lock().unwrap().push(shader.clone());
        Ok(self.object(
            "shader",
            &shader.entry_point,
            shader.bytecode.clone(),
            Some(shader.stage),
        ))
    }

    fn create_signature(&self, desc: &SignatureDesc, device_data: &[u8]) -> Result<ObjectHandle> {
        self.signatures
            .lock()
            .unwrap()
            .push((desc.clone(), device_data.to_vec()));
        Ok(self.object("signature", &desc.name, device_data.to_vec(), None))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<ObjectHandle> {
        self.render_passes.lock().unwrap().push(desc.clone());
        Ok(self.object("render_pass", &desc.name, Vec::new(), None))
    }

    fn create_graphics_pipeline(
        &self,
        pipeline: UnpackedGraphicsPipeline<'_>,
    ) -> Result<ObjectHandle> {
        assert_eq!(
            pipeline.signatures.len(),
            pipeline.desc.signature_names.len()
        );
        self.graphics.lock().unwrap().push(pipeline.desc.clone());
        Ok(self.object("graphics", &pipeline.desc.name, Vec::new(), None))
    }

    fn create_compute_pipeline(
        &self,
        pipeline: UnpackedComputePipeline<'_>,
    ) -> Result<ObjectHandle> {
        Ok(self.object("compute", &pipeline.desc.name, Vec::new(), None))
    }

    fn create_tile_pipeline(&self, pipeline: UnpackedTilePipeline<'_>) -> Result<ObjectHandle> {
        Ok(self.object("tile", &pipeline.desc.name, Vec::new(), None))
    }

    fn create_ray_tracing_pipeline(
        &self,
        pipeline: UnpackedRayTracingPipeline<'_>,
    ) -> Result<ObjectHandle> {
        Ok(self.object("ray_tracing", &pipeline.desc.name, Vec::new(), None))
    }
}

/// Counts `read_at` calls to verify cached unpacks perform no I/O.
pub struct CountingSource {
    data: Vec<u8>,
    pub reads: AtomicU64,
}

impl CountingSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            reads: AtomicU64::new(0),
        }
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ArchiveSource for CountingSource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.data.read_at(offset, buf)
    }
}

// --- Fixture builders ---

pub fn shader(stage: ShaderStage, entry: &str, bytes: &[u8]) -> ShaderData {
    ShaderData {
        stage,
        entry_point: entry.to_owned(),
        bytecode: bytes.to_vec(),
        ..ShaderData::default()
    }
}

pub fn signature(name: &str, binding_index: u8) -> SignatureDesc {
    SignatureDesc {
        name: name.to_owned(),
        binding_index,
        resources: vec![
            ResourceBindingDesc {
                name: "Constants".to_owned(),
                stages: ShaderStageFlags::VERTEX | ShaderStageFlags::PIXEL,
                array_size: 1,
                kind: ResourceKind::ConstantBuffer,
                var_kind: VariableKind::Static,
                ..ResourceBindingDesc::default()
            },
            ResourceBindingDesc {
                name: "Albedo".to_owned(),
                stages: ShaderStageFlags::PIXEL,
                array_size: 1,
                kind: ResourceKind::TextureSrv,
                var_kind: VariableKind::Mutable,
                ..ResourceBindingDesc::default()
            },
        ],
        ..SignatureDesc::default()
    }
}

pub fn graphics_pipeline(
    name: &str,
    signatures: Vec<SignatureDesc>,
    shaders: Vec<ShaderData>,
) -> GraphicsPipelineCreateInfo {
    GraphicsPipelineCreateInfo {
        desc: GraphicsPipelineDesc {
            name: name.to_owned(),
            ..GraphicsPipelineDesc::default()
        },
        signatures,
        shaders,
        ..GraphicsPipelineCreateInfo::default()
    }
}
