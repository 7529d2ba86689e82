//! Round-trip properties of the three-mode serializer: for every record
//! type, reading back a written record reproduces it, and the measure pass
//! always agrees with the write pass.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pipepack::serializer::{read_record, serialize_record, Measure, Serialize};
use pipepack::types::*;

fn round_trip<T>(value: &T)
where
    T: Serialize + Clone + Default + PartialEq + std::fmt::Debug,
{
    let mut measure = Measure::new();
    value
        .clone()
        .serialize(&mut measure)
        .expect("measure never fails");
    let encoded = serialize_record(value).expect("serialize");
    assert_eq!(
        encoded.len(),
        measure.size(),
        "measure and write disagree for {value:?}"
    );
    let decoded: T = read_record(&encoded).expect("read");
    assert_eq!(&decoded, value);
}

/// Clears the name field, which is carried by the archive index rather than
/// the record bytes.
fn unnamed<T: Clone>(value: &T, clear: impl FnOnce(&mut T)) -> T {
    let mut copy = value.clone();
    clear(&mut copy);
    copy
}

#[test]
fn shader_data_round_trip() {
    round_trip(&ShaderData::default());
    round_trip(&ShaderData {
        stage: ShaderStage::Pixel,
        entry_point: "PSMain".into(),
        language: ShaderSourceLanguage::Hlsl,
        compiler: ShaderCompiler::Dxc,
        bytecode: (0..=255).collect(),
    });
    // Empty entry point and empty bytecode are legal boundary values.
    round_trip(&ShaderData {
        stage: ShaderStage::RayCallable,
        entry_point: String::new(),
        language: ShaderSourceLanguage::Msl,
        compiler: ShaderCompiler::Default,
        bytecode: Vec::new(),
    });
}

#[test]
fn signature_round_trip() {
    round_trip(&unnamed(&full_signature(), |s| s.name.clear()));
    round_trip(&SignatureDesc::default());
}

#[test]
fn render_pass_round_trip() {
    round_trip(&unnamed(&full_render_pass(), |rp| rp.name.clear()));
    round_trip(&RenderPassDesc::default());
}

#[test]
fn graphics_pipeline_round_trip() {
    round_trip(&unnamed(&full_graphics_desc(), |d| d.name.clear()));
    round_trip(&GraphicsPipelineDesc {
        name: String::new(),
        ..GraphicsPipelineDesc::default()
    });
}

#[test]
fn compute_pipeline_round_trip() {
    round_trip(&ComputePipelineDesc {
        name: String::new(),
        flags: PipelineCreateFlags::DONT_REMAP_SHADER_RESOURCES,
        signature_names: vec!["A".into(), "B".into()],
    });
}

#[test]
fn tile_pipeline_round_trip() {
    round_trip(&TilePipelineDesc {
        name: String::new(),
        flags: PipelineCreateFlags::empty(),
        signature_names: vec!["S".into()],
        sample_count: 4,
        rtv_formats: vec![TextureFormat::Rgba8Unorm, TextureFormat::Rgba16Float],
    });
}

#[test]
fn ray_tracing_pipeline_round_trip() {
    round_trip(&unnamed(&full_ray_tracing_desc(), |d| d.name.clear()));
}

#[test]
fn debug_info_round_trip() {
    round_trip(&ArchiveDebugInfo {
        api_version: 0xDEAD_BEEF,
        git_hash: "3f9a2c1".into(),
    });
    round_trip(&ArchiveDebugInfo::default());
}

#[test]
fn wrong_pipeline_kind_tag_is_rejected() {
    // A compute descriptor decoded as a graphics descriptor must fail on
    // the kind tag, not misparse.
    let encoded = serialize_record(&ComputePipelineDesc::default()).unwrap();
    assert!(read_record::<GraphicsPipelineDesc>(&encoded).is_err());
}

#[test]
fn invalid_enum_tag_is_rejected() {
    let mut encoded = serialize_record(&ShaderData::default()).unwrap();
    encoded[0] = 0xFF; // stage tag
    assert!(read_record::<ShaderData>(&encoded).is_err());
}

#[test]
fn randomized_signature_round_trips() {
    let mut rng = StdRng::seed_from_u64(0x5157);
    for _ in 0..200 {
        let desc = random_signature(&mut rng);
        round_trip(&desc);
    }
}

#[test]
fn randomized_render_pass_round_trips() {
    let mut rng = StdRng::seed_from_u64(0xA11C);
    for _ in 0..200 {
        let desc = random_render_pass(&mut rng);
        round_trip(&desc);
    }
}

// --- fixtures ---

fn full_signature() -> SignatureDesc {
    SignatureDesc {
        name: "S".into(),
        binding_index: 7,
        use_combined_samplers: true,
        combined_sampler_suffix: "_sampler".into(),
        resources: vec![ResourceBindingDesc {
            name: "Tex".into(),
            stages: ShaderStageFlags::all(),
            array_size: u32::MAX,
            kind: ResourceKind::AccelStruct,
            var_kind: VariableKind::Dynamic,
            flags: ResourceBindingFlags::RUNTIME_ARRAY,
        }],
        immutable_samplers: vec![ImmutableSamplerDesc {
            sampler_or_texture_name: "Tex".into(),
            stages: ShaderStageFlags::PIXEL,
            desc: SamplerDesc {
                min_filter: FilterKind::Anisotropic,
                mag_filter: FilterKind::Linear,
                mip_filter: FilterKind::Point,
                address_u: AddressMode::Border,
                address_v: AddressMode::Mirror,
                address_w: AddressMode::Clamp,
                mip_lod_bias: -0.5,
                max_anisotropy: 16,
                comparison: ComparisonFunc::GreaterEqual,
                border_color: [0.0, 0.25, 0.5, 1.0],
                min_lod: 0.0,
                max_lod: 1000.0,
            },
        }],
    }
}

fn full_render_pass() -> RenderPassDesc {
    RenderPassDesc {
        name: "RP".into(),
        attachments: vec![
            AttachmentDesc {
                format: TextureFormat::Rgba8UnormSrgb,
                sample_count: 4,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::Discard,
                stencil_store_op: StoreOp::Discard,
                initial_state: ResourceStateFlags::RENDER_TARGET,
                final_state: ResourceStateFlags::SHADER_RESOURCE,
            },
            AttachmentDesc {
                format: TextureFormat::D32Float,
                sample_count: 4,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Discard,
                stencil_load_op: LoadOp::Load,
                stencil_store_op: StoreOp::Store,
                initial_state: ResourceStateFlags::DEPTH_WRITE,
                final_state: ResourceStateFlags::DEPTH_READ,
            },
        ],
        subpasses: vec![SubpassDesc {
            input_attachments: vec![AttachmentReference {
                attachment_index: 0,
                state: ResourceStateFlags::INPUT_ATTACHMENT,
            }],
            render_targets: vec![AttachmentReference {
                attachment_index: 0,
                state: ResourceStateFlags::RENDER_TARGET,
            }],
            resolve_attachments: Some(vec![AttachmentReference {
                attachment_index: 1,
                state: ResourceStateFlags::RESOLVE_DEST,
            }]),
            depth_stencil: Some(AttachmentReference {
                attachment_index: 1,
                state: ResourceStateFlags::DEPTH_WRITE,
            }),
            preserve_attachments: vec![0, 1],
            shading_rate: Some(ShadingRateAttachment {
                attachment: AttachmentReference {
                    attachment_index: 0,
                    state: ResourceStateFlags::SHADING_RATE,
                },
                tile_size: [16, 16],
            }),
        }],
        dependencies: vec![SubpassDependencyDesc {
            src_subpass: u32::MAX,
            dst_subpass: 0,
            src_stage_mask: PipelineStageFlags::RENDER_TARGET,
            dst_stage_mask: PipelineStageFlags::PIXEL,
            src_access_mask: AccessFlags::RENDER_TARGET_WRITE,
            dst_access_mask: AccessFlags::SHADER_READ,
        }],
    }
}

fn full_graphics_desc() -> GraphicsPipelineDesc {
    GraphicsPipelineDesc {
        name: "P".into(),
        flags: PipelineCreateFlags::IGNORE_MISSING_VARIABLES,
        signature_names: vec!["S0".into(), "S1".into()],
        blend: BlendStateDesc {
            alpha_to_coverage: true,
            independent_blend: true,
            render_targets: vec![RenderTargetBlendDesc {
                blend_enable: true,
                src_blend: BlendFactor::SrcAlpha,
                dest_blend: BlendFactor::InvSrcAlpha,
                blend_op: BlendOp::Add,
                src_blend_alpha: BlendFactor::One,
                dest_blend_alpha: BlendFactor::Zero,
                blend_op_alpha: BlendOp::Max,
                write_mask: 0x7,
            }],
        },
        sample_mask: 0x0000_FFFF,
        rasterizer: RasterizerDesc {
            fill_mode: FillMode::Wireframe,
            cull_mode: CullMode::None,
            front_counter_clockwise: true,
            depth_clip_enable: false,
            scissor_enable: true,
            depth_bias: -4,
            slope_scaled_depth_bias: 1.5,
        },
        depth_stencil: DepthStencilDesc {
            stencil_enable: true,
            stencil_read_mask: 0x0F,
            ..DepthStencilDesc::default()
        },
        input_layout: vec![LayoutElement {
            hlsl_semantic: "POSITION".into(),
            input_index: 0,
            buffer_slot: 0,
            num_components: 3,
            value_kind: ValueKind::Float32,
            is_normalized: false,
            relative_offset: 0,
            stride: 24,
            frequency: InputFrequency::PerVertex,
            instance_step_rate: 1,
        }],
        primitive_topology: PrimitiveTopology::TriangleStrip,
        num_viewports: 2,
        rtv_formats: vec![TextureFormat::Bgra8Unorm],
        dsv_format: TextureFormat::D24UnormS8Uint,
        sample: SampleDesc { count: 4, quality: 1 },
        shading_rate_flags: ShadingRateFlags::TEXTURE_BASED,
        render_pass_name: Some("RP".into()),
        subpass_index: 1,
    }
}

fn full_ray_tracing_desc() -> RayTracingPipelineDesc {
    RayTracingPipelineDesc {
        name: "RT".into(),
        flags: PipelineCreateFlags::empty(),
        signature_names: vec!["S".into()],
        shader_record_size: 32,
        max_recursion_depth: 8,
        shader_record_name: Some("record".into()),
        max_attribute_size: 8,
        max_payload_size: 64,
        general_groups: vec![
            GeneralShaderGroup {
                name: "raygen".into(),
                shader: ShaderRef::Index(0),
            },
            GeneralShaderGroup {
                name: "miss".into(),
                shader: ShaderRef::None,
            },
        ],
        triangle_hit_groups: vec![TriangleHitShaderGroup {
            name: "hit".into(),
            closest_hit: ShaderRef::Index(1),
            any_hit: ShaderRef::None,
        }],
        procedural_hit_groups: vec![ProceduralHitShaderGroup {
            name: "proc".into(),
            intersection: ShaderRef::Index(2),
            closest_hit: ShaderRef::Index(3),
            any_hit: ShaderRef::None,
        }],
    }
}

// --- randomized fixtures ---

fn random_string(rng: &mut StdRng) -> String {
    let len = rng.gen_range(0..12);
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

fn random_stage_flags(rng: &mut StdRng) -> ShaderStageFlags {
    ShaderStageFlags::from_bits_truncate(rng.gen())
}

fn random_signature(rng: &mut StdRng) -> SignatureDesc {
    let resources = (0..rng.gen_range(0..6))
        .map(|_| ResourceBindingDesc {
            name: random_string(rng),
            stages: random_stage_flags(rng),
            array_size: rng.gen(),
            kind: ResourceKind::from_u32(rng.gen_range(0..8)).unwrap(),
            var_kind: VariableKind::from_u32(rng.gen_range(0..3)).unwrap(),
            flags: ResourceBindingFlags::from_bits_truncate(rng.gen()),
        })
        .collect();
    let immutable_samplers = (0..rng.gen_range(0..3))
        .map(|_| ImmutableSamplerDesc {
            sampler_or_texture_name: random_string(rng),
            stages: random_stage_flags(rng),
            desc: SamplerDesc {
                min_filter: FilterKind::from_u32(rng.gen_range(0..3)).unwrap(),
                mag_filter: FilterKind::from_u32(rng.gen_range(0..3)).unwrap(),
                mip_filter: FilterKind::from_u32(rng.gen_range(0..3)).unwrap(),
                address_u: AddressMode::from_u32(rng.gen_range(0..4)).unwrap(),
                address_v: AddressMode::from_u32(rng.gen_range(0..4)).unwrap(),
                address_w: AddressMode::from_u32(rng.gen_range(0..4)).unwrap(),
                mip_lod_bias: rng.gen(),
                max_anisotropy: rng.gen_range(1..=16),
                comparison: ComparisonFunc::from_u32(rng.gen_range(0..8)).unwrap(),
                border_color: [rng.gen(), rng.gen(), rng.gen(), rng.gen()],
                min_lod: rng.gen(),
                max_lod: rng.gen(),
            },
        })
        .collect();
    SignatureDesc {
        name: String::new(),
        binding_index: rng.gen_range(0..8),
        use_combined_samplers: rng.gen(),
        combined_sampler_suffix: random_string(rng),
        resources,
        immutable_samplers,
    }
}

fn random_attachment_reference(rng: &mut StdRng) -> AttachmentReference {
    AttachmentReference {
        attachment_index: rng.gen_range(0..4),
        state: ResourceStateFlags::from_bits_truncate(rng.gen()),
    }
}

fn random_render_pass(rng: &mut StdRng) -> RenderPassDesc {
    let attachments = (0..rng.gen_range(0..4))
        .map(|_| AttachmentDesc {
            format: TextureFormat::from_u32(rng.gen_range(0..10)).unwrap(),
            sample_count: 1 << rng.gen_range(0..4),
            load_op: LoadOp::from_u32(rng.gen_range(0..3)).unwrap(),
            store_op: StoreOp::from_u32(rng.gen_range(0..2)).unwrap(),
            stencil_load_op: LoadOp::from_u32(rng.gen_range(0..3)).unwrap(),
            stencil_store_op: StoreOp::from_u32(rng.gen_range(0..2)).unwrap(),
            initial_state: ResourceStateFlags::from_bits_truncate(rng.gen()),
            final_state: ResourceStateFlags::from_bits_truncate(rng.gen()),
        })
        .collect();
    let subpasses = (0..rng.gen_range(0..3))
        .map(|_| {
            let render_targets: Vec<_> = (0..rng.gen_range(0..3))
                .map(|_| random_attachment_reference(rng))
                .collect();
            let resolve_attachments = if rng.gen() {
                Some(
                    render_targets
                        .iter()
                        .map(|_| random_attachment_reference(rng))
                        .collect(),
                )
            } else {
                None
            };
            SubpassDesc {
                input_attachments: (0..rng.gen_range(0..2))
                    .map(|_| random_attachment_reference(rng))
                    .collect(),
                render_targets,
                resolve_attachments,
                depth_stencil: rng.gen::<bool>().then(|| random_attachment_reference(rng)),
                preserve_attachments: (0..rng.gen_range(0..3)).map(|_| rng.gen()).collect(),
                shading_rate: rng.gen::<bool>().then(|| ShadingRateAttachment {
                    attachment: random_attachment_reference(rng),
                    tile_size: [rng.gen_range(1..64), rng.gen_range(1..64)],
                }),
            }
        })
        .collect();
    let dependencies = (0..rng.gen_range(0..3))
        .map(|_| SubpassDependencyDesc {
            src_subpass: rng.gen(),
            dst_subpass: rng.gen(),
            src_stage_mask: PipelineStageFlags::from_bits_truncate(rng.gen()),
            dst_stage_mask: PipelineStageFlags::from_bits_truncate(rng.gen()),
            src_access_mask: AccessFlags::from_bits_truncate(rng.gen()),
            dst_access_mask: AccessFlags::from_bits_truncate(rng.gen()),
        })
        .collect();
    RenderPassDesc {
        name: String::new(),
        attachments,
        subpasses,
        dependencies,
    }
}
