//! Tools for inspecting the physical structure of archives.
//!
//! Useful for debugging layout and verifying what an archiver produced
//! without standing up a backend: the inspector parses headers and index
//! tables only and never touches a [`crate::device::PipelineFactory`].

use serde::Serialize;

use crate::error::{PipepackError, Result};
use crate::format::{
    ArchiveHeader, Backend, ChunkHeader, ChunkType, DataHeader, FileRange, CHUNK_TYPE_COUNT,
    FORMAT_VERSION, INVALID_OFFSET, MAGIC_NUMBER,
};
use crate::source::ArchiveSource;

/// A structural report of an archive.
#[derive(Debug, Serialize)]
pub struct ArchiveReport {
    /// Total size of the archive in bytes.
    pub file_size: u64,
    /// Format version.
    pub version: u32,
    /// The chunk table.
    pub chunks: Vec<ChunkInfo>,
    /// Base offset of each backend block that is present.
    pub blocks: Vec<BlockInfo>,
    /// Per-category resource listings.
    pub categories: Vec<CategoryInfo>,
    /// Distinct shader count per backend.
    pub shader_counts: Vec<ShaderCountInfo>,
}

/// One chunk table entry.
#[derive(Debug, Serialize)]
pub struct ChunkInfo {
    /// Chunk type name.
    pub chunk: &'static str,
    /// Absolute offset of the chunk body.
    pub offset: u32,
    /// Size of the chunk body.
    pub size: u32,
}

/// One present backend block.
#[derive(Debug, Serialize)]
pub struct BlockInfo {
    /// Backend name.
    pub backend: &'static str,
    /// Absolute base offset of the block.
    pub base_offset: u32,
}

/// The resources of one named chunk.
#[derive(Debug, Serialize)]
pub struct CategoryInfo {
    /// Chunk type name.
    pub chunk: &'static str,
    /// The resources, in index order.
    pub resources: Vec<ResourceInfo>,
}

/// One named resource.
#[derive(Debug, Serialize)]
pub struct ResourceInfo {
    /// Resource name.
    pub name: String,
    /// Size of the shared record (header plus descriptor bytes).
    pub shared_size: u32,
    /// Per-backend data sizes, present backends only.
    pub device_sizes: Vec<(&'static str, u32)>,
}

/// Shader count of one backend.
#[derive(Debug, Serialize)]
pub struct ShaderCountInfo {
    /// Backend name.
    pub backend: &'static str,
    /// Number of distinct shader records stored for it.
    pub count: u32,
}

/// The archive inspector.
#[derive(Debug)]
pub struct ArchiveInspector;

impl ArchiveInspector {
    /// Parses the structure of `source` into a report.
    pub fn inspect(source: &dyn ArchiveSource) -> Result<ArchiveReport> {
        let header = ArchiveHeader::from_bytes(&source.read_vec(0, ArchiveHeader::SIZE)?)?;
        if header.magic != MAGIC_NUMBER {
            return Err(PipepackError::Format(
                "archive header magic number is incorrect".into(),
            ));
        }
        if header.version != FORMAT_VERSION {
            return Err(PipepackError::Format(format!(
                "archive version ({}) is not supported",
                header.version
            )));
        }
        if header.num_chunks as usize > CHUNK_TYPE_COUNT {
            return Err(PipepackError::Format("chunk table is too large".into()));
        }

        let mut report = ArchiveReport {
            file_size: source.size(),
            version: header.version,
            chunks: Vec::new(),
            blocks: Vec::new(),
            categories: Vec::new(),
            shader_counts: Vec::new(),
        };
        for (index, &base) in header.block_base_offsets.iter().enumerate() {
            if base != INVALID_OFFSET {
                if let Some(backend) = Backend::from_u32(index as u32) {
                    report.blocks.push(BlockInfo {
                        backend: backend.name(),
                        base_offset: base,
                    });
                }
            }
        }

        let table_bytes = source.read_vec(
            ArchiveHeader::SIZE as u64,
            ChunkHeader::SIZE * header.num_chunks as usize,
        )?;
        for i in 0..header.num_chunks as usize {
            let chunk = ChunkHeader::from_bytes(&table_bytes[i * ChunkHeader::SIZE..])?;
            report.chunks.push(ChunkInfo {
                chunk: chunk.chunk_type.name(),
                offset: chunk.offset,
                size: chunk.size,
            });
            match chunk.chunk_type {
                ChunkType::DebugInfo => {}
                ChunkType::Shaders => Self::inspect_shaders(source, &chunk, &mut report)?,
                named => Self::inspect_category(source, &chunk, named, &mut report)?,
            }
        }
        Ok(report)
    }

    fn inspect_shaders(
        source: &dyn ArchiveSource,
        chunk: &ChunkHeader,
        report: &mut ArchiveReport,
    ) -> Result<()> {
        let body = source.read_vec(chunk.offset as u64, chunk.size as usize)?;
        let header = DataHeader::from_bytes(&body)?;
        for backend in Backend::ALL {
            if let Some(range) = header.range(backend) {
                report.shader_counts.push(ShaderCountInfo {
                    backend: backend.name(),
                    count: range.size / FileRange::SIZE as u32,
                });
            }
        }
        Ok(())
    }

    fn inspect_category(
        source: &dyn ArchiveSource,
        chunk: &ChunkHeader,
        chunk_type: ChunkType,
        report: &mut ArchiveReport,
    ) -> Result<()> {
        let body = source.read_vec(chunk.offset as u64, chunk.size as usize)?;
        let count = crate::format::get_u32(&body, 0)? as usize;
        let mut category = CategoryInfo {
            chunk: chunk_type.name(),
            resources: Vec::with_capacity(count),
        };
        let mut name_cursor = 4 + count * 12;
        for i in 0..count {
            let name_len = crate::format::get_u32(&body, 4 + i * 4)? as usize;
            let data_size = crate::format::get_u32(&body, 4 + (count + i) * 4)?;
            let data_offset = crate::format::get_u32(&body, 4 + (2 * count + i) * 4)?;
            let name_bytes = body
                .get(name_cursor..name_cursor + name_len)
                .ok_or_else(|| PipepackError::Format("failed to read resource name list".into()))?;
            name_cursor += name_len;
            let name = String::from_utf8_lossy(&name_bytes[..name_len.saturating_sub(1)]).into_owned();

            let record = source.read_vec(data_offset as u64, data_size as usize)?;
            let data_header = DataHeader::from_bytes(&record)?;
            let mut device_sizes = Vec::new();
            for backend in Backend::ALL {
                if let Some(range) = data_header.range(backend) {
                    device_sizes.push((backend.name(), range.size));
                }
            }
            category.resources.push(ResourceInfo {
                name,
                shared_size: data_size,
                device_sizes,
            });
        }
        report.categories.push(category);
        Ok(())
    }
}

impl std::fmt::Display for ArchiveReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== ARCHIVE REPORT ===")?;
        writeln!(f, "File size: {} bytes, version {}", self.file_size, self.version)?;
        writeln!(f, "\n[CHUNKS]")?;
        for chunk in &self.chunks {
            writeln!(
                f,
                "  {:<20} offset {:>8}  size {:>8}",
                chunk.chunk, chunk.offset, chunk.size
            )?;
        }
        if !self.blocks.is_empty() {
            writeln!(f, "\n[BACKEND BLOCKS]")?;
            for block in &self.blocks {
                writeln!(f, "  {:<12} base offset {:>8}", block.backend, block.base_offset)?;
            }
        }
        for category in &self.categories {
            writeln!(f, "\n[{}]", category.chunk)?;
            for res in &category.resources {
                let devices: Vec<String> = res
                    .device_sizes
                    .iter()
                    .map(|(backend, size)| format!("{backend}: {size}b"))
                    .collect();
                writeln!(
                    f,
                    "  {} | shared {}b | {}",
                    res.name,
                    res.shared_size,
                    if devices.is_empty() {
                        "no device data".to_owned()
                    } else {
                        devices.join(", ")
                    }
                )?;
            }
        }
        if !self.shader_counts.is_empty() {
            writeln!(f, "\n[SHADERS]")?;
            for entry in &self.shader_counts {
                writeln!(f, "  {:<12} {} shaders", entry.backend, entry.count)?;
            }
        }
        Ok(())
    }
}
