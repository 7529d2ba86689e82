//! Corruption rejection: every structural defect must fail the open
//! cleanly, with no panic crossing the collaborator boundary and no
//! partially usable archive.

mod common;

use std::sync::Arc;

use common::*;
use pipepack::format::{ArchiveHeader, Backend, BackendFlags, ChunkHeader};
use pipepack::types::ShaderStage;
use pipepack::{Archive, Archiver, PipepackError};

fn build_blob() -> Vec<u8> {
    let mut archiver = Archiver::new(registry(&[Backend::Vulkan]));
    archiver
        .add_signature(&signature("S1", 0), BackendFlags::VULKAN)
        .unwrap();
    let info = graphics_pipeline(
        "P1",
        vec![signature("S1", 0)],
        vec![shader(ShaderStage::Vertex, "VSMain", b"vs")],
    );
    archiver
        .add_graphics_pipeline(&info, BackendFlags::VULKAN)
        .unwrap();
    archiver.serialize_to_blob().unwrap()
}

fn open(blob: Vec<u8>) -> Result<Arc<Archive>, PipepackError> {
    Archive::open(Arc::new(blob), Backend::Vulkan, MockFactory::new()).map(Arc::new)
}

fn expect_format_error(blob: Vec<u8>) {
    match open(blob) {
        Err(PipepackError::Format(_)) => {}
        Err(other) => panic!("expected a format error, got {other:?}"),
        Ok(_) => panic!("corrupted archive must not open"),
    }
}

#[test]
fn valid_blob_opens() {
    open(build_blob()).unwrap();
}

#[test]
fn flipped_magic_number_is_rejected() {
    let mut blob = build_blob();
    blob[0] ^= 0xFF;
    expect_format_error(blob);
}

#[test]
fn unsupported_version_is_rejected() {
    let mut blob = build_blob();
    // Bump the version field past the supported one.
    blob[4..8].copy_from_slice(&99u32.to_le_bytes());
    expect_format_error(blob);
}

#[test]
fn truncated_header_is_rejected() {
    let blob = build_blob();
    expect_format_error(blob[..ArchiveHeader::SIZE - 4].to_vec());
    expect_format_error(Vec::new());
}

#[test]
fn truncated_chunk_table_is_rejected() {
    let blob = build_blob();
    expect_format_error(blob[..ArchiveHeader::SIZE + 4].to_vec());
}

#[test]
fn truncated_body_is_rejected() {
    let blob = build_blob();
    // Cutting the archive in half truncates chunk bodies and data ranges.
    expect_format_error(blob[..blob.len() / 2].to_vec());
}

#[test]
fn duplicate_chunk_type_is_rejected() {
    let mut blob = build_blob();
    // Overwrite the second chunk table entry's type with the first one's.
    let first = ArchiveHeader::SIZE;
    let second = ArchiveHeader::SIZE + ChunkHeader::SIZE;
    let first_type: [u8; 4] = blob[first..first + 4].try_into().unwrap();
    blob[second..second + 4].copy_from_slice(&first_type);
    expect_format_error(blob);
}

#[test]
fn unknown_chunk_type_is_rejected() {
    let mut blob = build_blob();
    let first = ArchiveHeader::SIZE;
    blob[first..first + 4].copy_from_slice(&0xAAu32.to_le_bytes());
    expect_format_error(blob);
}

#[test]
fn absurd_chunk_count_is_rejected() {
    let mut blob = build_blob();
    blob[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
    expect_format_error(blob);
}

#[test]
fn out_of_range_resource_offset_is_rejected() {
    let blob = build_blob();
    // Find the signatures chunk and corrupt its first data offset so the
    // record points past the end of the file.
    let header = ArchiveHeader::from_bytes(&blob).unwrap();
    let mut target = None;
    for i in 0..header.num_chunks as usize {
        let at = ArchiveHeader::SIZE + i * ChunkHeader::SIZE;
        let chunk = ChunkHeader::from_bytes(&blob[at..]).unwrap();
        if chunk.chunk_type == pipepack::ChunkType::ResourceSignatures {
            target = Some(chunk);
        }
    }
    let chunk = target.expect("signatures chunk present");
    let body = chunk.offset as usize;
    let count =
        u32::from_le_bytes(blob[body..body + 4].try_into().unwrap()) as usize;
    // DataOffset array starts after the count and two u32 arrays.
    let offset_entry = body + 4 + 2 * 4 * count;
    let mut corrupted = blob;
    corrupted[offset_entry..offset_entry + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    expect_format_error(corrupted);
}

#[test]
fn no_error_escapes_as_panic() {
    // Feed a few byte-level mutations through the whole open path; every
    // one must come back as an error value, not a panic.
    let blob = build_blob();
    for at in (0..blob.len().min(256)).step_by(7) {
        let mut mutated = blob.clone();
        mutated[at] ^= 0x55;
        let _ = open(mutated);
    }
    for len in [1, 7, 35, 36, 48, blob.len() - 1] {
        let _ = open(blob[..len].to_vec());
    }
}
