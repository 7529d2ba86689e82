//! The archive writer.
//!
//! An [`Archiver`] collects resource signatures, render passes and pipelines,
//! compiles their shaders once per target backend through the registered
//! [`ShaderPatcher`]s, deduplicates shader records, and finally lays the
//! whole archive out and streams it.
//!
//! Layout happens in two passes over identical iteration order: a reserve
//! pass declares every sub-allocation of every segment, then a write pass
//! fills them (see [`crate::layout`]). Offsets recorded while chunks are
//! built are segment-relative; [`Archiver::serialize_to_stream`] rebases the
//! named-array entries to absolute file offsets once the final layout is
//! known. Per-backend offsets stay block-relative forever, so backend blocks
//! can move without patching anything but the header's base offsets.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::Write;

use crate::dedup::ShaderDedupTable;
use crate::device::PatcherRegistry;
use crate::error::{PipepackError, Result};
use crate::format::{
    align_up, ArchiveHeader, Backend, BackendFlags, ChunkHeader, ChunkType, DataHeader, FileRange,
    BACKEND_COUNT, CHUNK_TYPE_COUNT, FORMAT_VERSION, INVALID_OFFSET, MAGIC_NUMBER,
    MAX_SIGNATURES_PER_PIPELINE, SEGMENT_ALIGN,
};
use crate::layout::SegmentBuilder;
use crate::serializer::{serialize_record, Serialize, SerializerMode};
use crate::types::{
    ArchiveDebugInfo, ComputePipelineCreateInfo, GraphicsPipelineCreateInfo,
    RayTracingPipelineCreateInfo, RenderPassDesc, ResourceLayoutDesc, ShaderData, ShaderStage,
    SignatureDesc, TilePipelineCreateInfo,
};

/// API version stamped into the DebugInfo chunk.
pub const API_VERSION: u32 = 1;

/// Alignment of sub-allocations inside the per-backend blocks.
const DEVICE_DATA_ALIGN: usize = 4;

/// The serialized per-backend payload of a pipeline: its shader indices.
#[derive(Debug, Clone, Default)]
struct ShaderIndexList(Vec<u32>);

impl Serialize for ShaderIndexList {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.seq(&mut self.0)
    }
}

/// One named resource pending serialization.
#[derive(Debug, Default)]
struct ResourceEntry {
    /// Serialized backend-agnostic descriptor bytes.
    shared: Vec<u8>,
    /// Per-backend serialized data.
    device: [Option<Vec<u8>>; BACKEND_COUNT],
}

fn usage(msg: String) -> PipepackError {
    log::error!("{msg}");
    PipepackError::Usage(msg)
}

/// Builds device-object archives.
///
/// All `add_*` operations validate their input and change nothing on
/// failure; re-adding a resource whose serialized content is identical to
/// the stored one succeeds and may extend its target-backend set.
/// [`Archiver::serialize_to_blob`] may be called any number of times.
#[derive(Debug)]
pub struct Archiver {
    patchers: PatcherRegistry,
    git_hash: String,
    signatures: BTreeMap<String, ResourceEntry>,
    render_passes: BTreeMap<String, ResourceEntry>,
    graphics: BTreeMap<String, ResourceEntry>,
    compute: BTreeMap<String, ResourceEntry>,
    ray_tracing: BTreeMap<String, ResourceEntry>,
    tile: BTreeMap<String, ResourceEntry>,
    shaders: [ShaderDedupTable; BACKEND_COUNT],
}

impl Archiver {
    /// Creates an archiver over the given backend patchers.
    ///
    /// The registered backends define the valid target flags for every
    /// `add_*` call.
    pub fn new(patchers: PatcherRegistry) -> Self {
        Self {
            patchers,
            git_hash: String::new(),
            signatures: BTreeMap::new(),
            render_passes: BTreeMap::new(),
            graphics: BTreeMap::new(),
            compute: BTreeMap::new(),
            ray_tracing: BTreeMap::new(),
            tile: BTreeMap::new(),
            shaders: Default::default(),
        }
    }

    /// Records the writing engine's git hash in the DebugInfo chunk.
    pub fn set_git_hash(&mut self, hash: impl Into<String>) {
        self.git_hash = hash.into();
    }

    fn validate_backends(&self, backends: BackendFlags) -> Result<()> {
        if backends.is_empty() {
            return Err(usage("at least one target backend must be set".into()));
        }
        let supported = self.patchers.supported();
        if !supported.contains(backends) {
            return Err(usage(format!(
                "target backends {backends:?} contain unsupported backends (registered: {supported:?})"
            )));
        }
        Ok(())
    }

    /// Adds a resource signature targeting `backends`.
    pub fn add_signature(&mut self, desc: &SignatureDesc, backends: BackendFlags) -> Result<()> {
        self.validate_backends(backends)?;
        if desc.name.is_empty() {
            return Err(usage("signature name must not be empty".into()));
        }
        let shared = serialize_record(desc)?;
        if let Some(existing) = self.signatures.get(&desc.name) {
            if existing.shared != shared {
                return Err(usage(format!(
                    "signature '{}' is already present in the archive with different content; \
                     all signature names must be unique",
                    desc.name
                )));
            }
        }

        // Patch before touching the map so a failing backend leaves no trace.
        let mut patched: Vec<(Backend, Vec<u8>)> = Vec::new();
        for backend in backends.backends() {
            let already_stored = self
                .signatures
                .get(&desc.name)
                .is_some_and(|e| e.device[backend.index()].is_some());
            if already_stored {
                continue;
            }
            let patcher = self.patchers.get(backend)?.clone();
            if let Some(blob) = patcher.signature_data(desc)? {
                patched.push((backend, blob));
            }
        }

        let entry = match self.signatures.entry(desc.name.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => v.insert(ResourceEntry {
                shared,
                ..ResourceEntry::default()
            }),
        };
        for (backend, blob) in patched {
            entry.device[backend.index()] = Some(blob);
        }
        Ok(())
    }

    /// Adds a render pass.
    pub fn add_render_pass(&mut self, desc: &RenderPassDesc) -> Result<()> {
        if desc.name.is_empty() {
            return Err(usage("render pass name must not be empty".into()));
        }
        for subpass in &desc.subpasses {
            if let Some(resolves) = &subpass.resolve_attachments {
                if resolves.len() != subpass.render_targets.len() {
                    return Err(usage(format!(
                        "render pass '{}' has a subpass with {} resolve attachments for {} render targets",
                        desc.name,
                        resolves.len(),
                        subpass.render_targets.len()
                    )));
                }
            }
        }
        let shared = serialize_record(desc)?;
        match self.render_passes.entry(desc.name.clone()) {
            Entry::Occupied(e) => {
                if e.get().shared != shared {
                    return Err(usage(format!(
                        "render pass '{}' must have a unique name",
                        desc.name
                    )));
                }
            }
            Entry::Vacant(v) => {
                v.insert(ResourceEntry {
                    shared,
                    ..ResourceEntry::default()
                });
            }
        }
        Ok(())
    }

    /// Adds a graphics pipeline targeting `backends`.
    pub fn add_graphics_pipeline(
        &mut self,
        info: &GraphicsPipelineCreateInfo,
        backends: BackendFlags,
    ) -> Result<()> {
        self.validate_backends(backends)?;
        validate_pipeline_name(&info.desc.name, "graphics pipeline")?;
        validate_signature_set(&info.signatures)?;
        for shader in &info.shaders {
            if !shader.stage.is_graphics() {
                return Err(usage(format!(
                    "graphics pipeline '{}' references a {:?} shader",
                    info.desc.name, shader.stage
                )));
            }
        }

        let mut desc = info.desc.clone();
        if let Some(render_pass) = &info.render_pass {
            self.add_render_pass(render_pass)?;
            desc.render_pass_name = Some(render_pass.name.clone());
        }
        desc.signature_names = self.resolve_signatures(
            &desc.name,
            &info.signatures,
            &info.resource_layout,
            backends,
        )?;
        let shared = serialize_record(&desc)?;

        let name = desc.name;
        check_shared_match(&self.graphics, &name, &shared, "graphics pipeline")?;
        let mut patched = Vec::new();
        for backend in missing_backends(&self.graphics, &name, backends) {
            let patcher = self.patchers.get(backend)?.clone();
            let records = patcher.patch_graphics(info)?;
            patched.push((backend, self.store_shader_records(backend, records)?));
        }
        store_entry(&mut self.graphics, name, shared, patched);
        Ok(())
    }

    /// Adds a compute pipeline targeting `backends`.
    pub fn add_compute_pipeline(
        &mut self,
        info: &ComputePipelineCreateInfo,
        backends: BackendFlags,
    ) -> Result<()> {
        self.validate_backends(backends)?;
        validate_pipeline_name(&info.desc.name, "compute pipeline")?;
        validate_signature_set(&info.signatures)?;
        if info.shaders.len() != 1 || info.shaders[0].stage != ShaderStage::Compute {
            return Err(usage(format!(
                "compute pipeline '{}' must carry exactly one compute shader",
                info.desc.name
            )));
        }

        let mut desc = info.desc.clone();
        desc.signature_names = self.resolve_signatures(
            &desc.name,
            &info.signatures,
            &info.resource_layout,
            backends,
        )?;
        let shared = serialize_record(&desc)?;

        let name = desc.name;
        check_shared_match(&self.compute, &name, &shared, "compute pipeline")?;
        let mut patched = Vec::new();
        for backend in missing_backends(&self.compute, &name, backends) {
            let patcher = self.patchers.get(backend)?.clone();
            let records = patcher.patch_compute(info)?;
            patched.push((backend, self.store_shader_records(backend, records)?));
        }
        store_entry(&mut self.compute, name, shared, patched);
        Ok(())
    }

    /// Adds a tile pipeline targeting `backends`.
    pub fn add_tile_pipeline(
        &mut self,
        info: &TilePipelineCreateInfo,
        backends: BackendFlags,
    ) -> Result<()> {
        self.validate_backends(backends)?;
        validate_pipeline_name(&info.desc.name, "tile pipeline")?;
        validate_signature_set(&info.signatures)?;
        if info.shaders.len() != 1 || info.shaders[0].stage != ShaderStage::Tile {
            return Err(usage(format!(
                "tile pipeline '{}' must carry exactly one tile shader",
                info.desc.name
            )));
        }

        let mut desc = info.desc.clone();
        desc.signature_names = self.resolve_signatures(
            &desc.name,
            &info.signatures,
            &info.resource_layout,
            backends,
        )?;
        let shared = serialize_record(&desc)?;

        let name = desc.name;
        check_shared_match(&self.tile, &name, &shared, "tile pipeline")?;
        let mut patched = Vec::new();
        for backend in missing_backends(&self.tile, &name, backends) {
            let patcher = self.patchers.get(backend)?.clone();
            let records = patcher.patch_tile(info)?;
            patched.push((backend, self.store_shader_records(backend, records)?));
        }
        store_entry(&mut self.tile, name, shared, patched);
        Ok(())
    }

    /// Adds a ray-tracing pipeline targeting `backends`.
    pub fn add_ray_tracing_pipeline(
        &mut self,
        info: &RayTracingPipelineCreateInfo,
        backends: BackendFlags,
    ) -> Result<()> {
        self.validate_backends(backends)?;
        validate_pipeline_name(&info.desc.name, "ray tracing pipeline")?;
        validate_signature_set(&info.signatures)?;
        let shader_count = info.shaders.len() as u32;
        let out_of_range = info
            .desc
            .general_groups
            .iter()
            .filter_map(|g| g.shader.index())
            .chain(info.desc.triangle_hit_groups.iter().flat_map(|g| {
                [g.closest_hit.index(), g.any_hit.index()].into_iter().flatten()
            }))
            .chain(info.desc.procedural_hit_groups.iter().flat_map(|g| {
                [g.intersection.index(), g.closest_hit.index(), g.any_hit.index()]
                    .into_iter()
                    .flatten()
            }))
            .any(|index| index >= shader_count);
        if out_of_range {
            return Err(usage(format!(
                "ray tracing pipeline '{}' has a shader group referencing a shader index \
                 outside its {shader_count} shaders",
                info.desc.name
            )));
        }

        let mut desc = info.desc.clone();
        desc.signature_names = self.resolve_signatures(
            &desc.name,
            &info.signatures,
            &info.resource_layout,
            backends,
        )?;
        let shared = serialize_record(&desc)?;

        let name = desc.name;
        check_shared_match(&self.ray_tracing, &name, &shared, "ray tracing pipeline")?;
        let mut patched = Vec::new();
        for backend in missing_backends(&self.ray_tracing, &name, backends) {
            let patcher = self.patchers.get(backend)?.clone();
            let records = patcher.patch_ray_tracing(info)?;
            if records.len() != info.shaders.len() {
                return Err(usage(format!(
                    "patcher for {} returned {} shader records for ray tracing pipeline '{}' \
                     with {} shaders; the lists must be parallel",
                    backend.name(),
                    records.len(),
                    name,
                    info.shaders.len()
                )));
            }
            patched.push((backend, self.store_shader_records(backend, records)?));
        }
        store_entry(&mut self.ray_tracing, name, shared, patched);
        Ok(())
    }

    /// Dedups `records` into `backend`'s shader table and returns the
    /// serialized shader-index list.
    fn store_shader_records(
        &mut self,
        backend: Backend,
        records: Vec<ShaderData>,
    ) -> Result<Vec<u8>> {
        let table = &mut self.shaders[backend.index()];
        let mut indices = ShaderIndexList(Vec::with_capacity(records.len()));
        for record in &records {
            indices.0.push(table.add_or_find(serialize_record(record)?));
        }
        serialize_record(&indices)
    }

    /// Registers the pipeline's signatures (or synthesizes the default one)
    /// and returns their names in binding order.
    fn resolve_signatures(
        &mut self,
        pipeline_name: &str,
        signatures: &[SignatureDesc],
        layout: &ResourceLayoutDesc,
        backends: BackendFlags,
    ) -> Result<Vec<String>> {
        if signatures.is_empty() {
            let mut desc = SignatureDesc {
                name: String::new(),
                binding_index: 0,
                use_combined_samplers: false,
                combined_sampler_suffix: String::new(),
                resources: layout.variables.clone(),
                immutable_samplers: layout.immutable_samplers.clone(),
            };
            desc.name = self.default_signature_name(pipeline_name, &desc)?;
            self.add_signature(&desc, backends)?;
            return Ok(vec![desc.name]);
        }
        let mut names = Vec::with_capacity(signatures.len());
        for signature in signatures {
            self.add_signature(signature, backends)?;
            names.push(signature.name.clone());
        }
        Ok(names)
    }

    /// Picks a unique name for a synthesized default signature.
    ///
    /// Re-adding the same pipeline must land on the same name, so a
    /// candidate is also accepted when it already holds identical content.
    fn default_signature_name(
        &self,
        pipeline_name: &str,
        desc: &SignatureDesc,
    ) -> Result<String> {
        let shared = serialize_record(desc)?;
        let base = format!("Default Signature of PSO '{pipeline_name}'");
        let mut index = 0u32;
        loop {
            let candidate = if index == 0 {
                base.clone()
            } else {
                format!("{base}{index}")
            };
            match self.signatures.get(&candidate) {
                None => return Ok(candidate),
                Some(existing) if existing.shared == shared => return Ok(candidate),
                Some(_) => index += 1,
            }
        }
    }

    /// The named-resource categories in shared-segment layout order.
    fn named_categories(&self) -> [(ChunkType, &BTreeMap<String, ResourceEntry>); 6] {
        [
            (ChunkType::ResourceSignatures, &self.signatures),
            (ChunkType::RenderPasses, &self.render_passes),
            (ChunkType::GraphicsPipelines, &self.graphics),
            (ChunkType::ComputePipelines, &self.compute),
            (ChunkType::RayTracingPipelines, &self.ray_tracing),
            (ChunkType::TilePipelines, &self.tile),
        ]
    }

    /// Serializes the archive into a byte blob.
    pub fn serialize_to_blob(&self) -> Result<Vec<u8>> {
        let mut blob = Vec::new();
        self.serialize_to_stream(&mut blob)?;
        Ok(blob)
    }

    /// Lays out the archive and streams it to `stream`.
    pub fn serialize_to_stream<W: Write>(&self, stream: &mut W) -> Result<()> {
        let mut chunks: [SegmentBuilder; CHUNK_TYPE_COUNT] = Default::default();
        let mut shared = SegmentBuilder::new();
        let mut device: [SegmentBuilder; BACKEND_COUNT] = Default::default();
        // Chunk-local positions of the named-array offset entries, with
        // their still-shared-relative values, rebased once the layout is
        // known.
        let mut offset_arrays: [Option<(usize, Vec<u32>)>; CHUNK_TYPE_COUNT] = Default::default();

        self.reserve_space(&mut shared, &mut device);
        self.write_debug_info(&mut chunks[ChunkType::DebugInfo.index()])?;
        self.write_shader_data(&mut chunks[ChunkType::Shaders.index()], &mut device);
        for (chunk_type, map) in self.named_categories() {
            let offsets = write_named_chunk(
                chunk_type,
                map,
                &mut chunks[chunk_type.index()],
                &mut shared,
                &mut device,
            );
            if let Some(offsets) = offsets {
                offset_arrays[chunk_type.index()] = Some(offsets);
            }
        }

        // Final layout: header, chunk bodies in type order, shared data,
        // backend blocks. Every segment start is aligned.
        let num_chunks = chunks.iter().filter(|c| !c.is_empty()).count();
        let mut header_builder = SegmentBuilder::new();
        header_builder.add_space(ArchiveHeader::SIZE, 1);
        header_builder.add_space(ChunkHeader::SIZE * num_chunks, 4);
        header_builder.commit();

        let mut cursor = header_builder.len();
        let mut chunk_headers = Vec::with_capacity(num_chunks);
        for chunk_type in ChunkType::ALL {
            let body = &chunks[chunk_type.index()];
            if body.is_empty() {
                continue;
            }
            let offset = align_up(cursor, SEGMENT_ALIGN);
            chunk_headers.push(ChunkHeader {
                chunk_type,
                size: body.len() as u32,
                offset: offset as u32,
            });
            cursor = offset + body.len();
        }

        let shared_base = align_up(cursor, SEGMENT_ALIGN);
        cursor = shared_base + shared.len();
        for (index, values) in offset_arrays.iter().enumerate() {
            if let Some((pos, values)) = values {
                for (j, value) in values.iter().enumerate() {
                    chunks[index].put_u32(pos + j * 4, value + shared_base as u32);
                }
            }
        }

        let mut block_base_offsets = [INVALID_OFFSET; BACKEND_COUNT];
        for (index, block) in device.iter().enumerate() {
            if block.is_empty() {
                continue;
            }
            let base = align_up(cursor, SEGMENT_ALIGN);
            block_base_offsets[index] = base as u32;
            cursor = base + block.len();
        }

        if cursor > u32::MAX as usize {
            return Err(PipepackError::Format(
                "archive exceeds the 4 GiB addressable limit".into(),
            ));
        }

        let file_header = ArchiveHeader {
            magic: MAGIC_NUMBER,
            version: FORMAT_VERSION,
            num_chunks: num_chunks as u32,
            block_base_offsets,
        };
        let at = header_builder.alloc(ArchiveHeader::SIZE, 1);
        header_builder.write_at(at, &file_header.to_bytes());
        let at = header_builder.alloc(ChunkHeader::SIZE * num_chunks, 4);
        for (i, chunk_header) in chunk_headers.iter().enumerate() {
            header_builder.write_at(at + i * ChunkHeader::SIZE, &chunk_header.to_bytes());
        }

        // Stream out with zero padding between segments.
        let mut pos = 0usize;
        let mut emit = |stream: &mut W, offset: usize, bytes: &[u8]| -> Result<()> {
            debug_assert!(offset >= pos);
            const ZEROS: [u8; SEGMENT_ALIGN] = [0; SEGMENT_ALIGN];
            stream.write_all(&ZEROS[..offset - pos])?;
            stream.write_all(bytes)?;
            pos = offset + bytes.len();
            Ok(())
        };
        emit(stream, 0, header_builder.as_slice())?;
        for chunk_header in &chunk_headers {
            emit(
                stream,
                chunk_header.offset as usize,
                chunks[chunk_header.chunk_type.index()].as_slice(),
            )?;
        }
        emit(stream, shared_base, shared.as_slice())?;
        for (index, block) in device.iter().enumerate() {
            if block.is_empty() {
                continue;
            }
            emit(stream, block_base_offsets[index] as usize, block.as_slice())?;
        }
        debug_assert_eq!(pos, cursor);
        Ok(())
    }

    /// The reserve pass: declares every sub-allocation of the shared and
    /// per-backend segments, mirroring the write pass exactly.
    fn reserve_space(&self, shared: &mut SegmentBuilder, device: &mut [SegmentBuilder]) {
        for (index, table) in self.shaders.iter().enumerate() {
            if table.is_empty() {
                continue;
            }
            device[index].add_space(table.len() * FileRange::SIZE, DEVICE_DATA_ALIGN);
            for record in table.records() {
                device[index].add_space(record.len(), DEVICE_DATA_ALIGN);
            }
        }

        for (chunk_type, map) in self.named_categories() {
            for entry in map.values() {
                shared.add_space(DataHeader::SIZE, SEGMENT_ALIGN);
                shared.add_space(entry.shared.len(), 1);
                for backend in Backend::ALL {
                    if let Some(blob) = effective_device_blob(chunk_type, entry, backend) {
                        device[backend.index()].add_space(blob.len(), DEVICE_DATA_ALIGN);
                    }
                }
            }
        }

        shared.commit();
        for block in device.iter_mut() {
            block.commit();
        }
    }

    /// Builds the DebugInfo chunk.
    fn write_debug_info(&self, chunk: &mut SegmentBuilder) -> Result<()> {
        let info = ArchiveDebugInfo {
            api_version: API_VERSION,
            git_hash: self.git_hash.clone(),
        };
        let bytes = serialize_record(&info)?;
        chunk.add_space(bytes.len(), 1);
        chunk.commit();
        chunk.copy(&bytes, 1);
        Ok(())
    }

    /// Builds the Shaders chunk and fills each backend block's shader table.
    ///
    /// Shader data must be written before any per-resource data so that it
    /// sits first in each block.
    fn write_shader_data(&self, chunk: &mut SegmentBuilder, device: &mut [SegmentBuilder]) {
        if self.shaders.iter().all(ShaderDedupTable::is_empty) {
            return;
        }
        chunk.add_space(DataHeader::SIZE, 1);
        chunk.commit();

        let mut header = DataHeader::new(ChunkType::Shaders);
        for (index, table) in self.shaders.iter().enumerate() {
            if table.is_empty() {
                continue;
            }
            let block = &mut device[index];
            debug_assert!(block.len() > 0, "shaders must be written first");
            let table_size = table.len() * FileRange::SIZE;
            let table_pos = block.alloc(table_size, DEVICE_DATA_ALIGN);
            let mut ranges = Vec::with_capacity(table_size);
            for record in table.records() {
                let pos = block.copy(record, DEVICE_DATA_ALIGN);
                ranges.extend_from_slice(
                    &FileRange {
                        offset: pos as u32,
                        size: record.len() as u32,
                    }
                    .to_bytes(),
                );
            }
            block.write_at(table_pos, &ranges);
            header.sizes[index] = table_size as u32;
            header.offsets[index] = table_pos as u32;
        }
        chunk.copy(&header.to_bytes(), 1);
    }
}

fn validate_pipeline_name(name: &str, label: &str) -> Result<()> {
    if name.is_empty() {
        return Err(usage(format!("{label} name must not be empty")));
    }
    Ok(())
}

/// Binding indices of a pipeline's signatures must form a set.
fn validate_signature_set(signatures: &[SignatureDesc]) -> Result<()> {
    if signatures.len() > MAX_SIGNATURES_PER_PIPELINE {
        return Err(usage(format!(
            "a pipeline may bind at most {MAX_SIGNATURES_PER_PIPELINE} signatures, got {}",
            signatures.len()
        )));
    }
    let mut seen = [false; MAX_SIGNATURES_PER_PIPELINE];
    for signature in signatures {
        let index = usize::from(signature.binding_index);
        if index >= MAX_SIGNATURES_PER_PIPELINE {
            return Err(usage(format!(
                "signature '{}' has binding index {index}, the maximum is {}",
                signature.name,
                MAX_SIGNATURES_PER_PIPELINE - 1
            )));
        }
        if seen[index] {
            return Err(usage(format!(
                "signature binding index {index} is used twice; binding indices must be unique"
            )));
        }
        seen[index] = true;
    }
    Ok(())
}

fn check_shared_match(
    map: &BTreeMap<String, ResourceEntry>,
    name: &str,
    shared: &[u8],
    label: &str,
) -> Result<()> {
    match map.get(name) {
        Some(existing) if existing.shared != shared => Err(usage(format!(
            "{label} '{name}' is already present in the archive with different content; \
             names must be unique within a category"
        ))),
        _ => Ok(()),
    }
}

/// The backends a pipeline entry still lacks device data for.
fn missing_backends(
    map: &BTreeMap<String, ResourceEntry>,
    name: &str,
    requested: BackendFlags,
) -> Vec<Backend> {
    requested
        .backends()
        .filter(|b| {
            map.get(name)
                .map_or(true, |e| e.device[b.index()].is_none())
        })
        .collect()
}

fn store_entry(
    map: &mut BTreeMap<String, ResourceEntry>,
    name: String,
    shared: Vec<u8>,
    patched: Vec<(Backend, Vec<u8>)>,
) {
    let entry = map.entry(name).or_insert_with(|| ResourceEntry {
        shared,
        ..ResourceEntry::default()
    });
    for (backend, blob) in patched {
        entry.device[backend.index()] = Some(blob);
    }
}

/// The device blob actually written for `backend`, after the Metal
/// signature substitution: the two Metal flavors share signature data, so a
/// missing slot borrows its twin's blob. Never applied to pipeline data.
fn effective_device_blob<'a>(
    chunk_type: ChunkType,
    entry: &'a ResourceEntry,
    backend: Backend,
) -> Option<&'a Vec<u8>> {
    let own = entry.device[backend.index()].as_ref();
    if chunk_type != ChunkType::ResourceSignatures {
        return own;
    }
    own.or_else(|| {
        backend
            .metal_twin()
            .and_then(|twin| entry.device[twin.index()].as_ref())
    })
}

/// Builds one named-resource chunk and writes its resources' shared records
/// and device blobs. Returns the chunk-local position of the data-offset
/// array together with its shared-relative values, for rebasing.
fn write_named_chunk(
    chunk_type: ChunkType,
    map: &BTreeMap<String, ResourceEntry>,
    chunk: &mut SegmentBuilder,
    shared: &mut SegmentBuilder,
    device: &mut [SegmentBuilder],
) -> Option<(usize, Vec<u32>)> {
    if map.is_empty() {
        return None;
    }
    let count = map.len();

    chunk.add_space(4, 4);
    chunk.add_space(4 * count, 4); // name lengths
    chunk.add_space(4 * count, 4); // data sizes
    chunk.add_space(4 * count, 4); // data offsets
    for name in map.keys() {
        chunk.add_space(name.len() + 1, 1);
    }
    chunk.commit();

    let at = chunk.alloc(4, 4);
    chunk.put_u32(at, count as u32);
    let name_lengths = chunk.alloc(4 * count, 4);
    let data_sizes = chunk.alloc(4 * count, 4);
    let data_offsets = chunk.alloc(4 * count, 4);
    for (i, (name, entry)) in map.iter().enumerate() {
        chunk.put_u32(name_lengths + i * 4, name.len() as u32 + 1);
        chunk.put_u32(
            data_sizes + i * 4,
            (DataHeader::SIZE + entry.shared.len()) as u32,
        );
    }
    for name in map.keys() {
        chunk.copy(name.as_bytes(), 1);
        chunk.copy(&[0u8], 1);
    }

    let mut offsets = Vec::with_capacity(count);
    for entry in map.values() {
        let header_pos = shared.alloc(DataHeader::SIZE, SEGMENT_ALIGN);
        shared.copy(&entry.shared, 1);

        let mut header = DataHeader::new(chunk_type);
        for backend in Backend::ALL {
            if let Some(blob) = effective_device_blob(chunk_type, entry, backend) {
                let pos = device[backend.index()].copy(blob, DEVICE_DATA_ALIGN);
                header.set_range(
                    backend,
                    FileRange {
                        offset: pos as u32,
                        size: blob.len() as u32,
                    },
                );
            }
        }
        shared.write_at(header_pos, &header.to_bytes());
        offsets.push(header_pos as u32);
    }
    for (j, value) in offsets.iter().enumerate() {
        chunk.put_u32(data_offsets + j * 4, *value);
    }
    Some((data_offsets, offsets))
}
