//! The archive reader.
//!
//! An [`Archive`] wraps a random-access byte source for one backend. Opening
//! validates the header and chunk table and builds the name-to-offset index
//! of every resource category; everything else is lazy. Unpacking a named
//! resource reads its shared record, recursively unpacks the signatures and
//! render pass it depends on, reads this backend's data slice, and hands the
//! reconstructed descriptor to the [`PipelineFactory`].
//!
//! Unpacked objects are cached per category under weak references, so the
//! cache never keeps an otherwise-unreferenced object alive. Shader objects
//! are cached by table index under strong handles (pipelines do not retain
//! their shaders), released by [`Archive::clear_resource_cache`].
//!
//! # Concurrency
//!
//! Any number of threads may unpack concurrently. Each category has one
//! mutex guarding its index and cache; locks are never held across I/O,
//! deserialization or factory calls. Two racing unpacks of one name may
//! both construct the object, but the insert-if-empty cache populate keeps
//! exactly one instance cached.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::device::{
    DeviceObject, ObjectHandle, PipelineFactory, UnpackedComputePipeline,
    UnpackedGraphicsPipeline, UnpackedRayTracingPipeline, UnpackedTilePipeline,
};
use crate::error::{PipepackError, Result};
use crate::format::{
    ArchiveHeader, Backend, ChunkHeader, ChunkType, DataHeader, FileRange, BACKEND_COUNT,
    CHUNK_TYPE_COUNT, FORMAT_VERSION, INVALID_OFFSET, MAGIC_NUMBER,
};
use crate::serializer::{read_record, Reader, SerializerMode};
use crate::source::ArchiveSource;
use crate::types::{
    ArchiveDebugInfo, AttachmentOverride, AttachmentOverrideFlags, ComputePipelineDesc,
    GraphicsOverrideFlags, GraphicsPipelineDesc, GraphicsPipelineOverrides, RayTracingPipelineDesc,
    RenderPassDesc, ShaderData, ShaderStage, SignatureDesc, TileOverrideFlags, TilePipelineDesc,
    TilePipelineOverrides,
};
use crate::writer::API_VERSION;

#[derive(Debug)]
struct NamedSlot {
    range: FileRange,
    cached: Option<Weak<dyn DeviceObject>>,
}

type NamedTable = std::collections::HashMap<String, NamedSlot>;

struct ShaderSlot {
    range: FileRange,
    cached: Option<(ShaderStage, ObjectHandle)>,
}

enum SlotState {
    Cached(ShaderStage, ObjectHandle),
    Pending(FileRange),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn resource_err(msg: String) -> PipepackError {
    log::error!("{msg}");
    PipepackError::Resource(msg)
}

/// An open device-object archive, bound to one backend.
pub struct Archive {
    source: Arc<dyn ArchiveSource>,
    factory: Arc<dyn PipelineFactory>,
    backend: Backend,
    base_offsets: [u32; BACKEND_COUNT],
    debug_info: Option<ArchiveDebugInfo>,
    signatures: Mutex<NamedTable>,
    render_passes: Mutex<NamedTable>,
    graphics: Mutex<NamedTable>,
    compute: Mutex<NamedTable>,
    ray_tracing: Mutex<NamedTable>,
    tile: Mutex<NamedTable>,
    shaders: Mutex<Vec<ShaderSlot>>,
}

impl Archive {
    /// Opens an archive over `source` for `backend`.
    ///
    /// Reads and validates the header and chunk table and indexes every
    /// chunk. Any structural problem (bad magic, unsupported version,
    /// truncation, duplicate chunk types, duplicate names, out-of-range
    /// entries) fails the open; no partially usable archive is returned.
    pub fn open(
        source: Arc<dyn ArchiveSource>,
        backend: Backend,
        factory: Arc<dyn PipelineFactory>,
    ) -> Result<Self> {
        let header_bytes = source.read_vec(0, ArchiveHeader::SIZE)?;
        let header = ArchiveHeader::from_bytes(&header_bytes)?;
        if header.magic != MAGIC_NUMBER {
            return Err(PipepackError::Format(
                "archive header magic number is incorrect".into(),
            ));
        }
        if header.version != FORMAT_VERSION {
            return Err(PipepackError::Format(format!(
                "archive version ({}) is not supported; expected version {FORMAT_VERSION}",
                header.version
            )));
        }
        if header.num_chunks as usize > CHUNK_TYPE_COUNT {
            return Err(PipepackError::Format(format!(
                "chunk count ({}) exceeds the number of chunk types",
                header.num_chunks
            )));
        }

        let table_bytes = source.read_vec(
            ArchiveHeader::SIZE as u64,
            ChunkHeader::SIZE * header.num_chunks as usize,
        )?;
        let mut archive = Self {
            source,
            factory,
            backend,
            base_offsets: header.block_base_offsets,
            debug_info: None,
            signatures: Mutex::new(NamedTable::new()),
            render_passes: Mutex::new(NamedTable::new()),
            graphics: Mutex::new(NamedTable::new()),
            compute: Mutex::new(NamedTable::new()),
            ray_tracing: Mutex::new(NamedTable::new()),
            tile: Mutex::new(NamedTable::new()),
            shaders: Mutex::new(Vec::new()),
        };

        let mut seen = [false; CHUNK_TYPE_COUNT];
        for i in 0..header.num_chunks as usize {
            let chunk = ChunkHeader::from_bytes(&table_bytes[i * ChunkHeader::SIZE..])?;
            if seen[chunk.chunk_type.index()] {
                return Err(PipepackError::Format(
                    "multiple chunks with the same type are not allowed".into(),
                ));
            }
            seen[chunk.chunk_type.index()] = true;

            match chunk.chunk_type {
                ChunkType::DebugInfo => archive.read_debug_info(&chunk)?,
                ChunkType::Shaders => archive.read_shader_index(&chunk)?,
                named => {
                    let table = read_named_resources(archive.source.as_ref(), &chunk)?;
                    *lock(archive.named_table(named)) = table;
                }
            }
        }
        Ok(archive)
    }

    /// The backend this archive was opened for.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Version info of the engine that wrote the archive, when present.
    pub fn debug_info(&self) -> Option<&ArchiveDebugInfo> {
        self.debug_info.as_ref()
    }

    fn named_table(&self, chunk_type: ChunkType) -> &Mutex<NamedTable> {
        match chunk_type {
            ChunkType::ResourceSignatures => &self.signatures,
            ChunkType::GraphicsPipelines => &self.graphics,
            ChunkType::ComputePipelines => &self.compute,
            ChunkType::RayTracingPipelines => &self.ray_tracing,
            ChunkType::TilePipelines => &self.tile,
            ChunkType::RenderPasses => &self.render_passes,
            ChunkType::DebugInfo | ChunkType::Shaders => {
                unreachable!("not a named-resource chunk")
            }
        }
    }

    fn read_debug_info(&mut self, chunk: &ChunkHeader) -> Result<()> {
        let body = self
            .source
            .read_vec(chunk.offset as u64, chunk.size as usize)?;
        let info: ArchiveDebugInfo = read_record(&body)?;
        if info.api_version != API_VERSION {
            log::info!(
                "archive was created with engine API version {} but is used with {API_VERSION}",
                info.api_version
            );
        }
        self.debug_info = Some(info);
        Ok(())
    }

    /// Reads this backend's shader table from the Shaders chunk.
    ///
    /// A backend without a block or without shaders simply gets an empty
    /// table; that only matters once a pipeline needs a shader.
    fn read_shader_index(&mut self, chunk: &ChunkHeader) -> Result<()> {
        if chunk.size as usize != DataHeader::SIZE {
            return Err(PipepackError::Format(
                "shaders chunk size does not match its header".into(),
            ));
        }
        let body = self
            .source
            .read_vec(chunk.offset as u64, chunk.size as usize)?;
        let header = DataHeader::from_bytes(&body)?;
        if header.chunk_type != ChunkType::Shaders {
            return Err(PipepackError::Format(
                "invalid shader table header in the archive".into(),
            ));
        }
        let Some(range) = header.range(self.backend) else {
            return Ok(());
        };
        let base = self.base_offsets[self.backend.index()];
        if base == INVALID_OFFSET {
            log::error!(
                "shader list refers to the {} block, which does not exist in the archive",
                self.backend.name()
            );
            return Ok(());
        }
        if range.size as usize % FileRange::SIZE != 0 {
            return Err(PipepackError::Format(
                "shader table size is not a multiple of its entry size".into(),
            ));
        }
        let bytes = self
            .source
            .read_vec(u64::from(base) + u64::from(range.offset), range.size as usize)?;
        let mut slots = Vec::with_capacity(bytes.len() / FileRange::SIZE);
        for entry in bytes.chunks_exact(FileRange::SIZE) {
            slots.push(ShaderSlot {
                range: FileRange::from_bytes(entry)?,
                cached: None,
            });
        }
        *lock(&self.shaders) = slots;
        Ok(())
    }

    // --- Shared unpack plumbing ---

    fn cached_named(&self, table: &Mutex<NamedTable>, name: &str) -> Option<ObjectHandle> {
        lock(table)
            .get(name)
            .and_then(|slot| slot.cached.as_ref())
            .and_then(Weak::upgrade)
    }

    fn lookup_range(&self, table: &Mutex<NamedTable>, name: &str, label: &str) -> Result<FileRange> {
        lock(table)
            .get(name)
            .map(|slot| slot.range)
            .ok_or_else(|| resource_err(format!("{label} '{name}' is not present in the archive")))
    }

    /// Insert-if-empty cache populate: under contention the first finished
    /// construction wins and later ones are dropped.
    fn cache_named(&self, table: &Mutex<NamedTable>, name: &str, object: &ObjectHandle) {
        let mut guard = lock(table);
        if let Some(slot) = guard.get_mut(name) {
            let alive = slot.cached.as_ref().and_then(Weak::upgrade).is_some();
            if !alive {
                slot.cached = Some(Arc::downgrade(object));
            }
        }
    }

    /// Reads a resource's shared record and splits it into the typed header
    /// and the descriptor bytes, verifying the type tag.
    fn read_shared(
        &self,
        range: FileRange,
        expected: ChunkType,
        label: &str,
    ) -> Result<(DataHeader, Vec<u8>)> {
        if (range.size as usize) < DataHeader::SIZE {
            return Err(resource_err(format!(
                "{label} record is smaller than its header"
            )));
        }
        let bytes = self
            .source
            .read_vec(u64::from(range.offset), range.size as usize)?;
        let header = DataHeader::from_bytes(&bytes)?;
        if header.chunk_type != expected {
            return Err(PipepackError::Format(format!(
                "invalid {label} header in the archive"
            )));
        }
        Ok((header, bytes[DataHeader::SIZE..].to_vec()))
    }

    /// Reads this backend's data slice for a resource.
    fn load_device_data(&self, header: &DataHeader, label: &str) -> Result<Vec<u8>> {
        let Some(range) = header.range(self.backend) else {
            return Err(resource_err(format!(
                "device specific data is not specified for {label}"
            )));
        };
        let base = self.base_offsets[self.backend.index()];
        if base == INVALID_OFFSET {
            return Err(resource_err(format!(
                "required {} block does not exist in the archive",
                self.backend.name()
            )));
        }
        if u64::from(base) + range.end() > self.source.size() {
            return Err(resource_err(format!(
                "device data of {label} lies outside the archive"
            )));
        }
        self.source
            .read_vec(u64::from(base) + u64::from(range.offset), range.size as usize)
    }

    /// Resolves a shader-index list into live shader objects, deduplicating
    /// creation through the per-index shader cache.
    fn load_shaders(&self, indices: &[u32]) -> Result<Vec<(ShaderStage, ObjectHandle)>> {
        let base = self.base_offsets[self.backend.index()];
        if base == INVALID_OFFSET {
            return Err(resource_err(format!(
                "required {} block does not exist in the archive",
                self.backend.name()
            )));
        }
        let mut shaders = Vec::with_capacity(indices.len());
        for &index in indices {
            let state = {
                let guard = lock(&self.shaders);
                match guard.get(index as usize) {
                    None => {
                        return Err(resource_err(format!(
                            "shader index {index} is out of bounds"
                        )))
                    }
                    Some(slot) => match &slot.cached {
                        Some((stage, object)) => SlotState::Cached(*stage, object.clone()),
                        None => SlotState::Pending(slot.range),
                    },
                }
            };
            match state {
                SlotState::Cached(stage, object) => shaders.push((stage, object)),
                SlotState::Pending(range) => {
                    // Construct outside the lock; insert only if still empty.
                    let bytes = self.source.read_vec(
                        u64::from(base) + u64::from(range.offset),
                        range.size as usize,
                    )?;
                    let record: ShaderData = read_record(&bytes)?;
                    let object = self.factory.create_shader(&record)?;
                    let mut guard = lock(&self.shaders);
                    if let Some(slot) = guard.get_mut(index as usize) {
                        if slot.cached.is_none() {
                            slot.cached = Some((record.stage, object));
                        }
                        if let Some((stage, object)) = &slot.cached {
                            shaders.push((*stage, object.clone()));
                        }
                    }
                }
            }
        }
        Ok(shaders)
    }

    fn unpack_signature_list(&self, names: &[String]) -> Result<Vec<ObjectHandle>> {
        let mut signatures = Vec::with_capacity(names.len());
        for name in names {
            signatures.push(self.unpack_signature(name)?);
        }
        Ok(signatures)
    }

    // --- Public unpack operations ---

    /// Unpacks a resource signature by name.
    pub fn unpack_signature(&self, name: &str) -> Result<ObjectHandle> {
        if let Some(object) = self.cached_named(&self.signatures, name) {
            return Ok(object);
        }
        let range = self.lookup_range(&self.signatures, name, "resource signature")?;
        let (header, desc_bytes) =
            self.read_shared(range, ChunkType::ResourceSignatures, "resource signature")?;
        let mut desc: SignatureDesc = read_record(&desc_bytes)?;
        desc.name = name.to_owned();
        let device_data = self.load_device_data(&header, "resource signature")?;
        let object = self.factory.create_signature(&desc, &device_data)?;
        self.cache_named(&self.signatures, name, &object);
        Ok(object)
    }

    /// Unpacks a render pass by name, optionally overriding attachment
    /// fields. Overridden unpacks bypass the cache in both directions.
    pub fn unpack_render_pass(
        &self,
        name: &str,
        overrides: Option<&[AttachmentOverride]>,
    ) -> Result<ObjectHandle> {
        let use_cache = overrides.is_none();
        if use_cache {
            if let Some(object) = self.cached_named(&self.render_passes, name) {
                return Ok(object);
            }
        }
        let range = self.lookup_range(&self.render_passes, name, "render pass")?;
        let (_, desc_bytes) = self.read_shared(range, ChunkType::RenderPasses, "render pass")?;
        let mut desc: RenderPassDesc = read_record(&desc_bytes)?;
        desc.name = name.to_owned();
        if let Some(overrides) = overrides {
            apply_attachment_overrides(&mut desc, overrides)?;
        }
        let object = self.factory.create_render_pass(&desc)?;
        if use_cache {
            self.cache_named(&self.render_passes, name, &object);
        }
        Ok(object)
    }

    /// Unpacks a graphics pipeline by name, optionally overriding
    /// fixed-function state. Overridden unpacks bypass the cache in both
    /// directions.
    pub fn unpack_graphics_pipeline(
        &self,
        name: &str,
        overrides: Option<&GraphicsPipelineOverrides>,
    ) -> Result<ObjectHandle> {
        let use_cache = overrides.is_none();
        if use_cache {
            if let Some(object) = self.cached_named(&self.graphics, name) {
                return Ok(object);
            }
        }
        let range = self.lookup_range(&self.graphics, name, "graphics pipeline")?;
        let (header, desc_bytes) =
            self.read_shared(range, ChunkType::GraphicsPipelines, "graphics pipeline")?;
        let mut desc: GraphicsPipelineDesc = read_record(&desc_bytes)?;
        desc.name = name.to_owned();
        if let Some(overrides) = overrides {
            apply_graphics_overrides(&mut desc, overrides)?;
        }

        // Dependencies first: render pass, then signatures.
        let render_pass = match &desc.render_pass_name {
            Some(rp_name) if !rp_name.is_empty() => {
                Some(self.unpack_render_pass(rp_name, None)?)
            }
            _ => None,
        };
        let signatures = self.unpack_signature_list(&desc.signature_names)?;

        let device_data = self.load_device_data(&header, "graphics pipeline")?;
        let indices = read_index_list(&device_data)?;
        let shaders = self.load_shaders(&indices)?;
        for (stage, _) in &shaders {
            if !stage.is_graphics() {
                return Err(resource_err(format!(
                    "unsupported shader stage {stage:?} for graphics pipeline '{name}'"
                )));
            }
        }

        let object = self.factory.create_graphics_pipeline(UnpackedGraphicsPipeline {
            desc: &desc,
            signatures: &signatures,
            render_pass: render_pass.as_ref(),
            shaders: &shaders,
        })?;
        if use_cache {
            self.cache_named(&self.graphics, name, &object);
        }
        Ok(object)
    }

    /// Unpacks a compute pipeline by name.
    pub fn unpack_compute_pipeline(&self, name: &str) -> Result<ObjectHandle> {
        if let Some(object) = self.cached_named(&self.compute, name) {
            return Ok(object);
        }
        let range = self.lookup_range(&self.compute, name, "compute pipeline")?;
        let (header, desc_bytes) =
            self.read_shared(range, ChunkType::ComputePipelines, "compute pipeline")?;
        let mut desc: ComputePipelineDesc = read_record(&desc_bytes)?;
        desc.name = name.to_owned();

        let signatures = self.unpack_signature_list(&desc.signature_names)?;
        let device_data = self.load_device_data(&header, "compute pipeline")?;
        let indices = read_index_list(&device_data)?;
        let shaders = self.load_shaders(&indices)?;
        let compute_shader = match shaders.as_slice() {
            [(ShaderStage::Compute, object)] => object,
            _ => {
                return Err(resource_err(format!(
                    "compute pipeline '{name}' must have exactly one compute shader"
                )))
            }
        };

        let object = self.factory.create_compute_pipeline(UnpackedComputePipeline {
            desc: &desc,
            signatures: &signatures,
            shader: compute_shader,
        })?;
        self.cache_named(&self.compute, name, &object);
        Ok(object)
    }

    /// Unpacks a tile pipeline by name, optionally overriding its
    /// fixed-function state. Overridden unpacks bypass the cache in both
    /// directions.
    pub fn unpack_tile_pipeline(
        &self,
        name: &str,
        overrides: Option<&TilePipelineOverrides>,
    ) -> Result<ObjectHandle> {
        let use_cache = overrides.is_none();
        if use_cache {
            if let Some(object) = self.cached_named(&self.tile, name) {
                return Ok(object);
            }
        }
        let range = self.lookup_range(&self.tile, name, "tile pipeline")?;
        let (header, desc_bytes) =
            self.read_shared(range, ChunkType::TilePipelines, "tile pipeline")?;
        let mut desc: TilePipelineDesc = read_record(&desc_bytes)?;
        desc.name = name.to_owned();
        if let Some(overrides) = overrides {
            apply_tile_overrides(&mut desc, overrides)?;
        }

        let signatures = self.unpack_signature_list(&desc.signature_names)?;
        let device_data = self.load_device_data(&header, "tile pipeline")?;
        let indices = read_index_list(&device_data)?;
        let shaders = self.load_shaders(&indices)?;
        let tile_shader = match shaders.as_slice() {
            [(ShaderStage::Tile, object)] => object,
            _ => {
                return Err(resource_err(format!(
                    "tile pipeline '{name}' must have exactly one tile shader"
                )))
            }
        };

        let object = self.factory.create_tile_pipeline(UnpackedTilePipeline {
            desc: &desc,
            signatures: &signatures,
            shader: tile_shader,
        })?;
        if use_cache {
            self.cache_named(&self.tile, name, &object);
        }
        Ok(object)
    }

    /// Unpacks a ray-tracing pipeline by name.
    pub fn unpack_ray_tracing_pipeline(&self, name: &str) -> Result<ObjectHandle> {
        if let Some(object) = self.cached_named(&self.ray_tracing, name) {
            return Ok(object);
        }
        let range = self.lookup_range(&self.ray_tracing, name, "ray tracing pipeline")?;
        let (header, desc_bytes) =
            self.read_shared(range, ChunkType::RayTracingPipelines, "ray tracing pipeline")?;
        let mut desc: RayTracingPipelineDesc = read_record(&desc_bytes)?;
        desc.name = name.to_owned();

        let signatures = self.unpack_signature_list(&desc.signature_names)?;
        let device_data = self.load_device_data(&header, "ray tracing pipeline")?;
        let indices = read_index_list(&device_data)?;
        let shaders: Vec<ObjectHandle> = self
            .load_shaders(&indices)?
            .into_iter()
            .map(|(_, object)| object)
            .collect();
        remap_shader_groups(&desc, shaders.len() as u32)?;

        let object = self
            .factory
            .create_ray_tracing_pipeline(UnpackedRayTracingPipeline {
                desc: &desc,
                signatures: &signatures,
                shaders: &shaders,
            })?;
        self.cache_named(&self.ray_tracing, name, &object);
        Ok(object)
    }

    /// Drops the strong shader handles held by the shader cache.
    pub fn clear_resource_cache(&self) {
        let mut guard = lock(&self.shaders);
        for slot in guard.iter_mut() {
            slot.cached = None;
        }
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("backend", &self.backend)
            .field("base_offsets", &self.base_offsets)
            .finish_non_exhaustive()
    }
}

/// Parses a named-resource array chunk into a name-to-range table.
fn read_named_resources(source: &dyn ArchiveSource, chunk: &ChunkHeader) -> Result<NamedTable> {
    let body = source.read_vec(chunk.offset as u64, chunk.size as usize)?;
    let count = crate::format::get_u32(&body, 0)? as usize;
    let header_len = count
        .checked_mul(12)
        .and_then(|n| n.checked_add(4))
        .filter(|&n| n <= body.len())
        .ok_or_else(|| {
            PipepackError::Format("named resource array is larger than its chunk".into())
        })?;

    let mut table = NamedTable::with_capacity(count);
    let mut name_cursor = header_len;
    for i in 0..count {
        let name_len = crate::format::get_u32(&body, 4 + i * 4)? as usize;
        let data_size = crate::format::get_u32(&body, 4 + (count + i) * 4)?;
        let data_offset = crate::format::get_u32(&body, 4 + (2 * count + i) * 4)?;

        let name_end = name_cursor
            .checked_add(name_len)
            .filter(|&end| end <= body.len())
            .ok_or_else(|| PipepackError::Format("failed to read resource name list".into()))?;
        let name_bytes = &body[name_cursor..name_end];
        name_cursor = name_end;
        let terminated = name_len >= 2 && name_bytes[name_len - 1] == 0;
        if !terminated || name_bytes[..name_len - 1].contains(&0) {
            return Err(PipepackError::Format(
                "resource name is not a NUL-terminated string".into(),
            ));
        }
        let name = std::str::from_utf8(&name_bytes[..name_len - 1])
            .map_err(|_| PipepackError::Format("resource name is not valid UTF-8".into()))?
            .to_owned();

        let range = FileRange {
            offset: data_offset,
            size: data_size,
        };
        if range.end() > source.size() {
            return Err(PipepackError::Format(format!(
                "data of resource '{name}' lies outside the archive"
            )));
        }
        let inserted = table
            .insert(
                name,
                NamedSlot {
                    range,
                    cached: None,
                },
            )
            .is_none();
        if !inserted {
            return Err(PipepackError::Format(
                "each name in the resource names array must be unique".into(),
            ));
        }
    }
    Ok(table)
}

/// Decodes a pipeline's device blob: its shader-index list.
fn read_index_list(bytes: &[u8]) -> Result<Vec<u32>> {
    let mut indices: Vec<u32> = Vec::new();
    let mut reader = Reader::new(bytes);
    reader.seq(&mut indices)?;
    reader.finish()?;
    Ok(indices)
}

/// Validates that every shader group reference resolves into the loaded
/// shader list before any object creation happens.
fn remap_shader_groups(desc: &RayTracingPipelineDesc, shader_count: u32) -> Result<()> {
    let all_resolve = desc
        .general_groups
        .iter()
        .filter_map(|g| g.shader.index())
        .chain(
            desc.triangle_hit_groups
                .iter()
                .flat_map(|g| [g.closest_hit.index(), g.any_hit.index()].into_iter().flatten()),
        )
        .chain(desc.procedural_hit_groups.iter().flat_map(|g| {
            [g.intersection.index(), g.closest_hit.index(), g.any_hit.index()]
                .into_iter()
                .flatten()
        }))
        .all(|index| index < shader_count);
    if !all_resolve {
        return Err(resource_err(format!(
            "failed to remap a shader group of ray tracing pipeline '{}'",
            desc.name
        )));
    }
    Ok(())
}

fn check_known_bits<F>(bits: u32, known: F, what: &str) -> Result<()>
where
    F: FnOnce(u32) -> bool,
{
    if !known(bits) {
        let msg = format!("unknown {what} override bits ({bits:#x})");
        log::error!("{msg}");
        return Err(PipepackError::Usage(msg));
    }
    Ok(())
}

/// Applies attachment overrides to a freshly deserialized render pass,
/// field by field in ascending bit order.
fn apply_attachment_overrides(
    desc: &mut RenderPassDesc,
    overrides: &[AttachmentOverride],
) -> Result<()> {
    for over in overrides {
        check_known_bits(
            over.flags.bits(),
            |b| AttachmentOverrideFlags::from_bits(b).is_some(),
            "render pass attachment",
        )?;
        let index = over.attachment_index as usize;
        let count = desc.attachments.len();
        let target = desc.attachments.get_mut(index).ok_or_else(|| {
            let msg = format!(
                "attachment override index {index} is out of bounds for render pass '{}' \
                 with {count} attachments",
                desc.name
            );
            log::error!("{msg}");
            PipepackError::Usage(msg)
        })?;
        let flags = over.flags;
        let src = &over.desc;
        if flags.contains(AttachmentOverrideFlags::FORMAT) {
            target.format = src.format;
        }
        if flags.contains(AttachmentOverrideFlags::SAMPLE_COUNT) {
            target.sample_count = src.sample_count;
        }
        if flags.contains(AttachmentOverrideFlags::LOAD_OP) {
            target.load_op = src.load_op;
        }
        if flags.contains(AttachmentOverrideFlags::STORE_OP) {
            target.store_op = src.store_op;
        }
        if flags.contains(AttachmentOverrideFlags::STENCIL_LOAD_OP) {
            target.stencil_load_op = src.stencil_load_op;
        }
        if flags.contains(AttachmentOverrideFlags::STENCIL_STORE_OP) {
            target.stencil_store_op = src.stencil_store_op;
        }
        if flags.contains(AttachmentOverrideFlags::INITIAL_STATE) {
            target.initial_state = src.initial_state;
        }
        if flags.contains(AttachmentOverrideFlags::FINAL_STATE) {
            target.final_state = src.final_state;
        }
    }
    Ok(())
}

/// Applies fixed-function overrides to a freshly deserialized graphics
/// pipeline descriptor, field by field in ascending bit order.
fn apply_graphics_overrides(
    desc: &mut GraphicsPipelineDesc,
    overrides: &GraphicsPipelineOverrides,
) -> Result<()> {
    check_known_bits(
        overrides.flags.bits(),
        |b| GraphicsOverrideFlags::from_bits(b).is_some(),
        "graphics pipeline",
    )?;
    let flags = overrides.flags;
    let src = &overrides.desc;
    if flags.contains(GraphicsOverrideFlags::NAME) {
        desc.name = src.name.clone();
    }
    if flags.contains(GraphicsOverrideFlags::RASTERIZER) {
        desc.rasterizer = src.rasterizer.clone();
    }
    if flags.contains(GraphicsOverrideFlags::BLEND_STATE) {
        desc.blend = src.blend.clone();
    }
    if flags.contains(GraphicsOverrideFlags::SAMPLE_MASK) {
        desc.sample_mask = src.sample_mask;
    }
    if flags.contains(GraphicsOverrideFlags::DEPTH_STENCIL) {
        desc.depth_stencil = src.depth_stencil.clone();
    }
    if flags.contains(GraphicsOverrideFlags::INPUT_LAYOUT) {
        desc.input_layout = src.input_layout.clone();
    }
    if flags.contains(GraphicsOverrideFlags::PRIMITIVE_TOPOLOGY) {
        desc.primitive_topology = src.primitive_topology;
    }
    if flags.contains(GraphicsOverrideFlags::NUM_VIEWPORTS) {
        desc.num_viewports = src.num_viewports;
    }
    if flags.contains(GraphicsOverrideFlags::RENDER_TARGETS) {
        desc.rtv_formats = src.rtv_formats.clone();
    }
    if flags.contains(GraphicsOverrideFlags::RENDER_PASS) {
        desc.render_pass_name = src.render_pass_name.clone();
        desc.subpass_index = src.subpass_index;
    }
    if flags.contains(GraphicsOverrideFlags::SHADING_RATE) {
        desc.shading_rate_flags = src.shading_rate_flags;
    }
    if flags.contains(GraphicsOverrideFlags::DEPTH_STENCIL_TARGET) {
        desc.dsv_format = src.dsv_format;
    }
    if flags.contains(GraphicsOverrideFlags::SAMPLE_DESC) {
        desc.sample = src.sample.clone();
    }
    Ok(())
}

/// Applies overrides to a freshly deserialized tile pipeline descriptor.
fn apply_tile_overrides(desc: &mut TilePipelineDesc, overrides: &TilePipelineOverrides) -> Result<()> {
    check_known_bits(
        overrides.flags.bits(),
        |b| TileOverrideFlags::from_bits(b).is_some(),
        "tile pipeline",
    )?;
    let flags = overrides.flags;
    let src = &overrides.desc;
    if flags.contains(TileOverrideFlags::NAME) {
        desc.name = src.name.clone();
    }
    if flags.contains(TileOverrideFlags::SAMPLE_COUNT) {
        desc.sample_count = src.sample_count;
    }
    if flags.contains(TileOverrideFlags::RENDER_TARGETS) {
        desc.rtv_formats = src.rtv_formats.clone();
    }
    Ok(())
}
