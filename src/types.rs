//! The graphics data model stored in an archive.
//!
//! These are the backend-agnostic descriptors: shader metadata, pipeline
//! resource signatures, render passes, and the four pipeline flavors. Each
//! carries a [`Serialize`] traversal that visits its fields in one fixed
//! order for all three serializer modes.
//!
//! Resource names are not part of the serialized descriptor bytes; they live
//! in the named-resource arrays of the archive and are patched back into the
//! descriptor when a record is read. Pipelines reference signatures and
//! render passes by name for the same reason: pointers do not survive
//! serialization.

use crate::error::{PipepackError, Result};
use crate::serializer::{Serialize, SerializerMode};

/// Declares a `u32`-tagged enum together with its codec.
///
/// The first variant is the default. Decoding validates the tag.
macro_rules! enum_codec {
    (
        $(#[$meta:meta])*
        $vis:vis enum $Name:ident {
            $(#[$first_meta:meta])*
            $First:ident = $first_val:literal,
            $(
                $(#[$vmeta:meta])*
                $Variant:ident = $val:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        #[repr(u32)]
        $vis enum $Name {
            $(#[$first_meta])*
            #[default]
            $First = $first_val,
            $(
                $(#[$vmeta])*
                $Variant = $val,
            )*
        }

        impl $Name {
            /// Decodes a serialized tag.
            pub fn from_u32(v: u32) -> Option<Self> {
                match v {
                    $first_val => Some(Self::$First),
                    $($val => Some(Self::$Variant),)*
                    _ => None,
                }
            }
        }

        impl Serialize for $Name {
            fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
                let mut tag = *self as u32;
                ser.u32(&mut tag)?;
                if M::READS {
                    *self = Self::from_u32(tag).ok_or_else(|| {
                        PipepackError::Serialization(format!(
                            concat!("invalid ", stringify!($Name), " tag ({})"),
                            tag
                        ))
                    })?;
                }
                Ok(())
            }
        }
    };
}

/// Declares the codec for a `bitflags` type.
///
/// Decoding rejects unknown bits.
macro_rules! flags_codec {
    ($Name:ident) => {
        impl Serialize for $Name {
            fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
                let mut bits = self.bits();
                ser.u32(&mut bits)?;
                if M::READS {
                    *self = Self::from_bits(bits).ok_or_else(|| {
                        PipepackError::Serialization(format!(
                            concat!("invalid ", stringify!($Name), " bits ({:#x})"),
                            bits
                        ))
                    })?;
                }
                Ok(())
            }
        }
    };
}

// --- Shaders ---

enum_codec! {
    /// The pipeline stage a shader runs in.
    pub enum ShaderStage {
        /// Unknown / not yet assigned.
        Unknown = 0,
        /// Vertex shader.
        Vertex = 1,
        /// Pixel (fragment) shader.
        Pixel = 2,
        /// Geometry shader.
        Geometry = 3,
        /// Hull (tessellation control) shader.
        Hull = 4,
        /// Domain (tessellation evaluation) shader.
        Domain = 5,
        /// Amplification (task) shader.
        Amplification = 6,
        /// Mesh shader.
        Mesh = 7,
        /// Compute shader.
        Compute = 8,
        /// Tile shader.
        Tile = 9,
        /// Ray-generation shader.
        RayGen = 10,
        /// Ray miss shader.
        RayMiss = 11,
        /// Ray closest-hit shader.
        RayClosestHit = 12,
        /// Ray any-hit shader.
        RayAnyHit = 13,
        /// Ray intersection shader.
        RayIntersection = 14,
        /// Ray callable shader.
        RayCallable = 15,
    }
}

impl ShaderStage {
    /// True for stages a graphics pipeline may bind.
    pub fn is_graphics(self) -> bool {
        matches!(
            self,
            ShaderStage::Vertex
                | ShaderStage::Pixel
                | ShaderStage::Geometry
                | ShaderStage::Hull
                | ShaderStage::Domain
                | ShaderStage::Amplification
                | ShaderStage::Mesh
        )
    }
}

enum_codec! {
    /// The language the shader was authored in.
    pub enum ShaderSourceLanguage {
        /// Backend default.
        Default = 0,
        /// HLSL.
        Hlsl = 1,
        /// GLSL.
        Glsl = 2,
        /// GLSL passed to the driver verbatim.
        GlslVerbatim = 3,
        /// Metal shading language.
        Msl = 4,
    }
}

enum_codec! {
    /// The compiler that produced the stored bytes.
    pub enum ShaderCompiler {
        /// Backend default.
        Default = 0,
        /// glslang.
        Glslang = 1,
        /// DirectX shader compiler.
        Dxc = 2,
        /// Legacy FXC.
        Fxc = 3,
    }
}

bitflags::bitflags! {
    /// A set of shader stages.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        /// Vertex stage.
        const VERTEX = 1 << 0;
        /// Pixel stage.
        const PIXEL = 1 << 1;
        /// Geometry stage.
        const GEOMETRY = 1 << 2;
        /// Hull stage.
        const HULL = 1 << 3;
        /// Domain stage.
        const DOMAIN = 1 << 4;
        /// Amplification stage.
        const AMPLIFICATION = 1 << 5;
        /// Mesh stage.
        const MESH = 1 << 6;
        /// Compute stage.
        const COMPUTE = 1 << 7;
        /// Tile stage.
        const TILE = 1 << 8;
        /// All ray-tracing stages.
        const RAY_TRACING = 1 << 9;
    }
}
flags_codec!(ShaderStageFlags);

/// A compiled (or source-form) shader as stored per backend.
///
/// The metadata fields are serialized first; the bytecode is the unprefixed
/// tail of the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderData {
    /// Stage this shader binds to.
    pub stage: ShaderStage,
    /// Entry point name.
    pub entry_point: String,
    /// Source language of the original shader.
    pub language: ShaderSourceLanguage,
    /// Compiler that produced `bytecode`.
    pub compiler: ShaderCompiler,
    /// Compiled bytecode, or source bytes for source-shipping backends.
    pub bytecode: Vec<u8>,
}

impl Serialize for ShaderData {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        self.stage.serialize(ser)?;
        ser.str(&mut self.entry_point)?;
        self.language.serialize(ser)?;
        self.compiler.serialize(ser)?;
        ser.tail(&mut self.bytecode)
    }
}

// --- Resource signatures ---

enum_codec! {
    /// What kind of resource a binding exposes to shaders.
    pub enum ResourceKind {
        /// Constant (uniform) buffer.
        ConstantBuffer = 0,
        /// Sampled texture.
        TextureSrv = 1,
        /// Read-only formatted or structured buffer.
        BufferSrv = 2,
        /// Writable texture.
        TextureUav = 3,
        /// Writable buffer.
        BufferUav = 4,
        /// Standalone sampler.
        Sampler = 5,
        /// Render-pass input attachment.
        InputAttachment = 6,
        /// Ray-tracing acceleration structure.
        AccelStruct = 7,
    }
}

enum_codec! {
    /// How often a binding's contents may change.
    pub enum VariableKind {
        /// Bound once at pipeline creation.
        Static = 0,
        /// Rebound between draw batches.
        Mutable = 1,
        /// Rebound freely.
        Dynamic = 2,
    }
}

bitflags::bitflags! {
    /// Per-binding behavior flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ResourceBindingFlags: u32 {
        /// Texture binding owns a combined sampler.
        const COMBINED_SAMPLER = 1 << 0;
        /// Buffer binding uses a formatted view.
        const FORMATTED_BUFFER = 1 << 1;
        /// Array size is a runtime upper bound.
        const RUNTIME_ARRAY = 1 << 2;
    }
}
flags_codec!(ResourceBindingFlags);

/// One shader-visible resource binding of a signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceBindingDesc {
    /// Binding name as referenced by shaders.
    pub name: String,
    /// Stages that can see the binding.
    pub stages: ShaderStageFlags,
    /// Array element count (1 for scalars).
    pub array_size: u32,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Update frequency class.
    pub var_kind: VariableKind,
    /// Behavior flags.
    pub flags: ResourceBindingFlags,
}

impl Serialize for ResourceBindingDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.str(&mut self.name)?;
        self.stages.serialize(ser)?;
        ser.u32(&mut self.array_size)?;
        self.kind.serialize(ser)?;
        self.var_kind.serialize(ser)?;
        self.flags.serialize(ser)
    }
}

enum_codec! {
    /// Texture filtering mode.
    pub enum FilterKind {
        /// Nearest-sample filtering.
        Point = 0,
        /// Linear filtering.
        Linear = 1,
        /// Anisotropic filtering.
        Anisotropic = 2,
    }
}

enum_codec! {
    /// Texture addressing outside [0, 1).
    pub enum AddressMode {
        /// Repeat.
        Wrap = 0,
        /// Mirror-repeat.
        Mirror = 1,
        /// Clamp to edge.
        Clamp = 2,
        /// Clamp to border color.
        Border = 3,
    }
}

enum_codec! {
    /// Comparison function for depth, stencil and comparison samplers.
    pub enum ComparisonFunc {
        /// Never passes.
        Never = 0,
        /// Passes when less.
        Less = 1,
        /// Passes when equal.
        Equal = 2,
        /// Passes when less or equal.
        LessEqual = 3,
        /// Passes when greater.
        Greater = 4,
        /// Passes when not equal.
        NotEqual = 5,
        /// Passes when greater or equal.
        GreaterEqual = 6,
        /// Always passes.
        Always = 7,
    }
}

/// A complete sampler state description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplerDesc {
    /// Minification filter.
    pub min_filter: FilterKind,
    /// Magnification filter.
    pub mag_filter: FilterKind,
    /// Mip-level filter.
    pub mip_filter: FilterKind,
    /// Addressing along U.
    pub address_u: AddressMode,
    /// Addressing along V.
    pub address_v: AddressMode,
    /// Addressing along W.
    pub address_w: AddressMode,
    /// Mip LOD bias.
    pub mip_lod_bias: f32,
    /// Maximum anisotropy (1 disables).
    pub max_anisotropy: u32,
    /// Comparison function for comparison samplers.
    pub comparison: ComparisonFunc,
    /// Border color for [`AddressMode::Border`].
    pub border_color: [f32; 4],
    /// Minimum LOD clamp.
    pub min_lod: f32,
    /// Maximum LOD clamp.
    pub max_lod: f32,
}

impl Serialize for SamplerDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        self.min_filter.serialize(ser)?;
        self.mag_filter.serialize(ser)?;
        self.mip_filter.serialize(ser)?;
        self.address_u.serialize(ser)?;
        self.address_v.serialize(ser)?;
        self.address_w.serialize(ser)?;
        ser.f32(&mut self.mip_lod_bias)?;
        ser.u32(&mut self.max_anisotropy)?;
        self.comparison.serialize(ser)?;
        for c in &mut self.border_color {
            ser.f32(c)?;
        }
        ser.f32(&mut self.min_lod)?;
        ser.f32(&mut self.max_lod)
    }
}

/// A sampler baked into a signature and bound to a texture or sampler name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImmutableSamplerDesc {
    /// The sampler or texture binding this sampler attaches to.
    pub sampler_or_texture_name: String,
    /// Stages that can see the sampler.
    pub stages: ShaderStageFlags,
    /// The sampler state.
    pub desc: SamplerDesc,
}

impl Serialize for ImmutableSamplerDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.str(&mut self.sampler_or_texture_name)?;
        self.stages.serialize(ser)?;
        self.desc.serialize(ser)
    }
}

/// A named, reusable description of the resource bindings a pipeline expects.
///
/// The name is carried by the archive's named-resource array, not the
/// serialized bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureDesc {
    /// Signature name; unique among signatures in one archive.
    pub name: String,
    /// Slot this signature binds to on pipelines using several signatures.
    pub binding_index: u8,
    /// Whether texture bindings implicitly pair with samplers.
    pub use_combined_samplers: bool,
    /// Suffix appended to texture names to derive combined-sampler names.
    pub combined_sampler_suffix: String,
    /// The shader-visible bindings.
    pub resources: Vec<ResourceBindingDesc>,
    /// Samplers baked into the signature.
    pub immutable_samplers: Vec<ImmutableSamplerDesc>,
}

impl Serialize for SignatureDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        // Name intentionally skipped: the named-resource array owns it.
        ser.u8(&mut self.binding_index)?;
        ser.bool(&mut self.use_combined_samplers)?;
        ser.str(&mut self.combined_sampler_suffix)?;
        ser.seq(&mut self.resources)?;
        ser.seq(&mut self.immutable_samplers)
    }
}

// --- Render passes ---

enum_codec! {
    /// Texture formats the archive records for attachments.
    pub enum TextureFormat {
        /// Format not specified.
        Unknown = 0,
        /// 8-bit RGBA, unsigned normalized.
        Rgba8Unorm = 1,
        /// 8-bit RGBA, sRGB.
        Rgba8UnormSrgb = 2,
        /// 8-bit BGRA, unsigned normalized.
        Bgra8Unorm = 3,
        /// 16-bit float RGBA.
        Rgba16Float = 4,
        /// 32-bit float RGBA.
        Rgba32Float = 5,
        /// Packed 11-11-10 float RGB.
        Rg11B10Float = 6,
        /// 32-bit float depth.
        D32Float = 7,
        /// 24-bit depth with 8-bit stencil.
        D24UnormS8Uint = 8,
        /// 16-bit depth.
        D16Unorm = 9,
    }
}

bitflags::bitflags! {
    /// Resource usage states for attachment transitions.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ResourceStateFlags: u32 {
        /// Bound as a render target.
        const RENDER_TARGET = 1 << 0;
        /// Bound for unordered access.
        const UNORDERED_ACCESS = 1 << 1;
        /// Depth buffer, writable.
        const DEPTH_WRITE = 1 << 2;
        /// Depth buffer, read-only.
        const DEPTH_READ = 1 << 3;
        /// Sampled in a shader.
        const SHADER_RESOURCE = 1 << 4;
        /// Read as a subpass input attachment.
        const INPUT_ATTACHMENT = 1 << 5;
        /// Source of a resolve operation.
        const RESOLVE_SOURCE = 1 << 6;
        /// Destination of a resolve operation.
        const RESOLVE_DEST = 1 << 7;
        /// Presented to a swap chain.
        const PRESENT = 1 << 8;
        /// Read as a shading-rate map.
        const SHADING_RATE = 1 << 9;
    }
}
flags_codec!(ResourceStateFlags);

enum_codec! {
    /// What happens to an attachment's contents when a pass begins.
    pub enum LoadOp {
        /// Preserve the previous contents.
        Load = 0,
        /// Clear to a pass-supplied value.
        Clear = 1,
        /// Contents undefined.
        Discard = 2,
    }
}

enum_codec! {
    /// What happens to an attachment's contents when a pass ends.
    pub enum StoreOp {
        /// Keep the results.
        Store = 0,
        /// Results may be discarded.
        Discard = 1,
    }
}

/// One attachment of a render pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentDesc {
    /// Pixel format.
    pub format: TextureFormat,
    /// MSAA sample count.
    pub sample_count: u8,
    /// Color/depth load behavior.
    pub load_op: LoadOp,
    /// Color/depth store behavior.
    pub store_op: StoreOp,
    /// Stencil load behavior.
    pub stencil_load_op: LoadOp,
    /// Stencil store behavior.
    pub stencil_store_op: StoreOp,
    /// State the attachment is in when the pass begins.
    pub initial_state: ResourceStateFlags,
    /// State the attachment is left in when the pass ends.
    pub final_state: ResourceStateFlags,
}

impl Serialize for AttachmentDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        self.format.serialize(ser)?;
        ser.u8(&mut self.sample_count)?;
        self.load_op.serialize(ser)?;
        self.store_op.serialize(ser)?;
        self.stencil_load_op.serialize(ser)?;
        self.stencil_store_op.serialize(ser)?;
        self.initial_state.serialize(ser)?;
        self.final_state.serialize(ser)
    }
}

/// A subpass reference to one attachment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentReference {
    /// Index into the render pass's attachment list.
    pub attachment_index: u32,
    /// State the attachment must be in during the subpass.
    pub state: ResourceStateFlags,
}

impl Serialize for AttachmentReference {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.u32(&mut self.attachment_index)?;
        self.state.serialize(ser)
    }
}

/// A shading-rate attachment of a subpass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadingRateAttachment {
    /// The referenced attachment.
    pub attachment: AttachmentReference,
    /// Shading-rate tile size in pixels (width, height).
    pub tile_size: [u32; 2],
}

impl Serialize for ShadingRateAttachment {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        self.attachment.serialize(ser)?;
        ser.u32(&mut self.tile_size[0])?;
        ser.u32(&mut self.tile_size[1])
    }
}

/// One subpass of a render pass.
///
/// `resolve_attachments`, when present, must have one entry per render
/// target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubpassDesc {
    /// Input attachments read by the subpass.
    pub input_attachments: Vec<AttachmentReference>,
    /// Render targets written by the subpass.
    pub render_targets: Vec<AttachmentReference>,
    /// Per-render-target resolve destinations.
    pub resolve_attachments: Option<Vec<AttachmentReference>>,
    /// Depth-stencil attachment.
    pub depth_stencil: Option<AttachmentReference>,
    /// Attachments whose contents must be preserved across the subpass.
    pub preserve_attachments: Vec<u32>,
    /// Shading-rate attachment.
    pub shading_rate: Option<ShadingRateAttachment>,
}

impl Serialize for SubpassDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.seq(&mut self.input_attachments)?;
        ser.seq(&mut self.render_targets)?;
        ser.seq(&mut self.preserve_attachments)?;

        let mut has_resolve = self.resolve_attachments.is_some();
        let mut has_depth_stencil = self.depth_stencil.is_some();
        let mut has_shading_rate = self.shading_rate.is_some();
        ser.bool(&mut has_resolve)?;
        ser.bool(&mut has_depth_stencil)?;
        ser.bool(&mut has_shading_rate)?;

        if has_resolve {
            let mut resolves = self.resolve_attachments.take().unwrap_or_default();
            // One resolve slot per render target; the count is implied.
            if M::READS {
                resolves.clear();
                resolves.resize_with(self.render_targets.len(), Default::default);
            }
            for r in resolves.iter_mut() {
                r.serialize(ser)?;
            }
            self.resolve_attachments = Some(resolves);
        } else {
            self.resolve_attachments = None;
        }

        if has_depth_stencil {
            let mut ds = self.depth_stencil.take().unwrap_or_default();
            ds.serialize(ser)?;
            self.depth_stencil = Some(ds);
        } else {
            self.depth_stencil = None;
        }

        if has_shading_rate {
            let mut sr = self.shading_rate.take().unwrap_or_default();
            sr.serialize(ser)?;
            self.shading_rate = Some(sr);
        } else {
            self.shading_rate = None;
        }
        Ok(())
    }
}

bitflags::bitflags! {
    /// Pipeline stages referenced by subpass dependencies.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PipelineStageFlags: u32 {
        /// Vertex input and shading.
        const VERTEX = 1 << 0;
        /// Pixel shading.
        const PIXEL = 1 << 1;
        /// Early/late depth-stencil tests.
        const DEPTH_STENCIL = 1 << 2;
        /// Render-target writes.
        const RENDER_TARGET = 1 << 3;
        /// Compute shading.
        const COMPUTE = 1 << 4;
        /// Transfer operations.
        const TRANSFER = 1 << 5;
    }
}
flags_codec!(PipelineStageFlags);

bitflags::bitflags! {
    /// Memory access kinds referenced by subpass dependencies.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// Input-attachment reads.
        const INPUT_ATTACHMENT_READ = 1 << 0;
        /// Shader reads.
        const SHADER_READ = 1 << 1;
        /// Shader writes.
        const SHADER_WRITE = 1 << 2;
        /// Render-target reads.
        const RENDER_TARGET_READ = 1 << 3;
        /// Render-target writes.
        const RENDER_TARGET_WRITE = 1 << 4;
        /// Depth-stencil reads.
        const DEPTH_STENCIL_READ = 1 << 5;
        /// Depth-stencil writes.
        const DEPTH_STENCIL_WRITE = 1 << 6;
    }
}
flags_codec!(AccessFlags);

/// An execution/memory dependency between two subpasses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubpassDependencyDesc {
    /// Source subpass index, or `u32::MAX` for "external".
    pub src_subpass: u32,
    /// Destination subpass index, or `u32::MAX` for "external".
    pub dst_subpass: u32,
    /// Stages that must complete in the source.
    pub src_stage_mask: PipelineStageFlags,
    /// Stages that wait in the destination.
    pub dst_stage_mask: PipelineStageFlags,
    /// Accesses made available by the source.
    pub src_access_mask: AccessFlags,
    /// Accesses made visible to the destination.
    pub dst_access_mask: AccessFlags,
}

impl Serialize for SubpassDependencyDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.u32(&mut self.src_subpass)?;
        ser.u32(&mut self.dst_subpass)?;
        self.src_stage_mask.serialize(ser)?;
        self.dst_stage_mask.serialize(ser)?;
        self.src_access_mask.serialize(ser)?;
        self.dst_access_mask.serialize(ser)
    }
}

/// A complete render pass description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPassDesc {
    /// Render pass name; unique among render passes in one archive.
    pub name: String,
    /// All attachments.
    pub attachments: Vec<AttachmentDesc>,
    /// The subpasses, in execution order.
    pub subpasses: Vec<SubpassDesc>,
    /// Dependencies between subpasses.
    pub dependencies: Vec<SubpassDependencyDesc>,
}

impl Serialize for RenderPassDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        // Name intentionally skipped: the named-resource array owns it.
        ser.seq(&mut self.attachments)?;
        ser.seq(&mut self.subpasses)?;
        ser.seq(&mut self.dependencies)
    }
}

// --- Pipelines: shared parts ---

enum_codec! {
    /// The pipeline flavor, stored as the first field of every pipeline
    /// descriptor and checked against the chunk it was found in.
    pub enum PipelineKind {
        /// Graphics pipeline.
        Graphics = 0,
        /// Compute pipeline.
        Compute = 1,
        /// Ray-tracing pipeline.
        RayTracing = 2,
        /// Tile pipeline.
        Tile = 3,
    }
}

bitflags::bitflags! {
    /// Pipeline creation behavior flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PipelineCreateFlags: u32 {
        /// Missing shader variables are not an error.
        const IGNORE_MISSING_VARIABLES = 1 << 0;
        /// Shader resources bind by register as compiled.
        const DONT_REMAP_SHADER_RESOURCES = 1 << 1;
    }
}
flags_codec!(PipelineCreateFlags);

/// Serializes the descriptor prefix every pipeline flavor shares: kind tag,
/// creation flags, and the referenced signature names.
///
/// On read the kind tag is validated against `expected`.
fn serialize_pipeline_base<M: SerializerMode>(
    ser: &mut M,
    expected: PipelineKind,
    flags: &mut PipelineCreateFlags,
    signature_names: &mut Vec<String>,
) -> Result<()> {
    let mut kind = expected;
    kind.serialize(ser)?;
    if M::READS && kind != expected {
        return Err(PipepackError::Serialization(format!(
            "pipeline kind tag {:?} does not match the containing chunk",
            kind
        )));
    }
    flags.serialize(ser)?;
    ser.seq(signature_names)
}

/// The flat resource layout a pipeline declares when it does not use
/// explicit signatures.
///
/// Not serialized: the archiver converts it into a generated default
/// signature, which then carries the information.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceLayoutDesc {
    /// Update-frequency class for bindings not listed in `variables`.
    pub default_var_kind: VariableKind,
    /// Explicitly described bindings.
    pub variables: Vec<ResourceBindingDesc>,
    /// Samplers baked into the layout.
    pub immutable_samplers: Vec<ImmutableSamplerDesc>,
}

// --- Graphics pipelines ---

enum_codec! {
    /// Blend factor.
    pub enum BlendFactor {
        /// Zero.
        Zero = 0,
        /// One.
        One = 1,
        /// Source color.
        SrcColor = 2,
        /// One minus source color.
        InvSrcColor = 3,
        /// Source alpha.
        SrcAlpha = 4,
        /// One minus source alpha.
        InvSrcAlpha = 5,
        /// Destination alpha.
        DestAlpha = 6,
        /// One minus destination alpha.
        InvDestAlpha = 7,
        /// Destination color.
        DestColor = 8,
        /// One minus destination color.
        InvDestColor = 9,
    }
}

enum_codec! {
    /// Blend operation.
    pub enum BlendOp {
        /// src + dst.
        Add = 0,
        /// src - dst.
        Subtract = 1,
        /// dst - src.
        RevSubtract = 2,
        /// min(src, dst).
        Min = 3,
        /// max(src, dst).
        Max = 4,
    }
}

/// Blend state of one render target.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetBlendDesc {
    /// Whether blending is enabled.
    pub blend_enable: bool,
    /// Source color factor.
    pub src_blend: BlendFactor,
    /// Destination color factor.
    pub dest_blend: BlendFactor,
    /// Color blend operation.
    pub blend_op: BlendOp,
    /// Source alpha factor.
    pub src_blend_alpha: BlendFactor,
    /// Destination alpha factor.
    pub dest_blend_alpha: BlendFactor,
    /// Alpha blend operation.
    pub blend_op_alpha: BlendOp,
    /// Per-channel write mask.
    pub write_mask: u8,
}

impl Default for RenderTargetBlendDesc {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_blend: BlendFactor::One,
            dest_blend: BlendFactor::Zero,
            blend_op: BlendOp::Add,
            src_blend_alpha: BlendFactor::One,
            dest_blend_alpha: BlendFactor::Zero,
            blend_op_alpha: BlendOp::Add,
            write_mask: 0xF,
        }
    }
}

impl Serialize for RenderTargetBlendDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.bool(&mut self.blend_enable)?;
        self.src_blend.serialize(ser)?;
        self.dest_blend.serialize(ser)?;
        self.blend_op.serialize(ser)?;
        self.src_blend_alpha.serialize(ser)?;
        self.dest_blend_alpha.serialize(ser)?;
        self.blend_op_alpha.serialize(ser)?;
        ser.u8(&mut self.write_mask)
    }
}

/// Blend state of the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendStateDesc {
    /// Alpha-to-coverage.
    pub alpha_to_coverage: bool,
    /// Whether render targets blend independently.
    pub independent_blend: bool,
    /// Per-render-target blend state, parallel to the pipeline's render
    /// targets.
    pub render_targets: Vec<RenderTargetBlendDesc>,
}

impl Serialize for BlendStateDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.bool(&mut self.alpha_to_coverage)?;
        ser.bool(&mut self.independent_blend)?;
        ser.seq(&mut self.render_targets)
    }
}

enum_codec! {
    /// Polygon fill mode.
    pub enum FillMode {
        /// Filled polygons.
        Solid = 0,
        /// Wireframe.
        Wireframe = 1,
    }
}

enum_codec! {
    /// Face culling mode.
    pub enum CullMode {
        /// No culling.
        None = 0,
        /// Cull front faces.
        Front = 1,
        /// Cull back faces.
        Back = 2,
    }
}

/// Rasterizer state.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizerDesc {
    /// Fill mode.
    pub fill_mode: FillMode,
    /// Cull mode.
    pub cull_mode: CullMode,
    /// Whether counter-clockwise triangles are front-facing.
    pub front_counter_clockwise: bool,
    /// Whether depth clipping is enabled.
    pub depth_clip_enable: bool,
    /// Whether scissor testing is enabled.
    pub scissor_enable: bool,
    /// Constant depth bias.
    pub depth_bias: i32,
    /// Slope-scaled depth bias.
    pub slope_scaled_depth_bias: f32,
}

impl Default for RasterizerDesc {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_counter_clockwise: false,
            depth_clip_enable: true,
            scissor_enable: false,
            depth_bias: 0,
            slope_scaled_depth_bias: 0.0,
        }
    }
}

impl Serialize for RasterizerDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        self.fill_mode.serialize(ser)?;
        self.cull_mode.serialize(ser)?;
        ser.bool(&mut self.front_counter_clockwise)?;
        ser.bool(&mut self.depth_clip_enable)?;
        ser.bool(&mut self.scissor_enable)?;
        ser.i32(&mut self.depth_bias)?;
        ser.f32(&mut self.slope_scaled_depth_bias)
    }
}

enum_codec! {
    /// Stencil operation.
    pub enum StencilOp {
        /// Keep the current value.
        Keep = 0,
        /// Set to zero.
        Zero = 1,
        /// Replace with the reference.
        Replace = 2,
        /// Increment with saturation.
        IncrSat = 3,
        /// Decrement with saturation.
        DecrSat = 4,
        /// Bitwise invert.
        Invert = 5,
        /// Increment with wrap.
        IncrWrap = 6,
        /// Decrement with wrap.
        DecrWrap = 7,
    }
}

/// Stencil behavior of one face.
#[derive(Debug, Clone, PartialEq)]
pub struct StencilOpDesc {
    /// On stencil-test failure.
    pub stencil_fail_op: StencilOp,
    /// On depth-test failure.
    pub stencil_depth_fail_op: StencilOp,
    /// On pass.
    pub stencil_pass_op: StencilOp,
    /// Stencil comparison function.
    pub stencil_func: ComparisonFunc,
}

impl Default for StencilOpDesc {
    fn default() -> Self {
        Self {
            stencil_fail_op: StencilOp::Keep,
            stencil_depth_fail_op: StencilOp::Keep,
            stencil_pass_op: StencilOp::Keep,
            stencil_func: ComparisonFunc::Always,
        }
    }
}

impl Serialize for StencilOpDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        self.stencil_fail_op.serialize(ser)?;
        self.stencil_depth_fail_op.serialize(ser)?;
        self.stencil_pass_op.serialize(ser)?;
        self.stencil_func.serialize(ser)
    }
}

/// Depth-stencil state.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilDesc {
    /// Whether depth testing is enabled.
    pub depth_enable: bool,
    /// Whether depth writes are enabled.
    pub depth_write_enable: bool,
    /// Depth comparison function.
    pub depth_func: ComparisonFunc,
    /// Whether stencil testing is enabled.
    pub stencil_enable: bool,
    /// Stencil read mask.
    pub stencil_read_mask: u8,
    /// Stencil write mask.
    pub stencil_write_mask: u8,
    /// Front-face stencil behavior.
    pub front_face: StencilOpDesc,
    /// Back-face stencil behavior.
    pub back_face: StencilOpDesc,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_enable: true,
            depth_write_enable: true,
            depth_func: ComparisonFunc::Less,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front_face: StencilOpDesc::default(),
            back_face: StencilOpDesc::default(),
        }
    }
}

impl Serialize for DepthStencilDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.bool(&mut self.depth_enable)?;
        ser.bool(&mut self.depth_write_enable)?;
        self.depth_func.serialize(ser)?;
        ser.bool(&mut self.stencil_enable)?;
        ser.u8(&mut self.stencil_read_mask)?;
        ser.u8(&mut self.stencil_write_mask)?;
        self.front_face.serialize(ser)?;
        self.back_face.serialize(ser)
    }
}

enum_codec! {
    /// Component type of a vertex attribute.
    pub enum ValueKind {
        /// 8-bit signed integer.
        Int8 = 0,
        /// 16-bit signed integer.
        Int16 = 1,
        /// 32-bit signed integer.
        Int32 = 2,
        /// 8-bit unsigned integer.
        Uint8 = 3,
        /// 16-bit unsigned integer.
        Uint16 = 4,
        /// 32-bit unsigned integer.
        Uint32 = 5,
        /// 16-bit float.
        Float16 = 6,
        /// 32-bit float.
        Float32 = 7,
    }
}

enum_codec! {
    /// Whether a vertex buffer advances per vertex or per instance.
    pub enum InputFrequency {
        /// Per vertex.
        PerVertex = 0,
        /// Per instance.
        PerInstance = 1,
    }
}

/// One element of the vertex input layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutElement {
    /// HLSL semantic the element maps to.
    pub hlsl_semantic: String,
    /// Attribute location.
    pub input_index: u32,
    /// Vertex buffer slot.
    pub buffer_slot: u32,
    /// Number of components.
    pub num_components: u32,
    /// Component type.
    pub value_kind: ValueKind,
    /// Whether integer components are normalized to [0, 1].
    pub is_normalized: bool,
    /// Byte offset from the element's vertex start, `u32::MAX` for
    /// auto-computed.
    pub relative_offset: u32,
    /// Vertex stride in bytes, `u32::MAX` for auto-computed.
    pub stride: u32,
    /// Step frequency.
    pub frequency: InputFrequency,
    /// Instances sharing one attribute value when stepping per instance.
    pub instance_step_rate: u32,
}

impl Default for LayoutElement {
    fn default() -> Self {
        Self {
            hlsl_semantic: "ATTRIB".to_owned(),
            input_index: 0,
            buffer_slot: 0,
            num_components: 0,
            value_kind: ValueKind::Float32,
            is_normalized: true,
            relative_offset: u32::MAX,
            stride: u32::MAX,
            frequency: InputFrequency::PerVertex,
            instance_step_rate: 1,
        }
    }
}

impl Serialize for LayoutElement {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.str(&mut self.hlsl_semantic)?;
        ser.u32(&mut self.input_index)?;
        ser.u32(&mut self.buffer_slot)?;
        ser.u32(&mut self.num_components)?;
        self.value_kind.serialize(ser)?;
        ser.bool(&mut self.is_normalized)?;
        ser.u32(&mut self.relative_offset)?;
        ser.u32(&mut self.stride)?;
        self.frequency.serialize(ser)?;
        ser.u32(&mut self.instance_step_rate)
    }
}

enum_codec! {
    /// Primitive topology.
    pub enum PrimitiveTopology {
        /// Triangle list.
        TriangleList = 0,
        /// Triangle strip.
        TriangleStrip = 1,
        /// Point list.
        PointList = 2,
        /// Line list.
        LineList = 3,
        /// Line strip.
        LineStrip = 4,
    }
}

bitflags::bitflags! {
    /// Variable-rate-shading modes a pipeline opts into.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ShadingRateFlags: u32 {
        /// Rate set per draw.
        const PER_PRIMITIVE = 1 << 0;
        /// Rate sourced from a texture.
        const TEXTURE_BASED = 1 << 1;
    }
}
flags_codec!(ShadingRateFlags);

/// Multisampling configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDesc {
    /// Samples per pixel.
    pub count: u8,
    /// Quality level.
    pub quality: u8,
}

impl Default for SampleDesc {
    fn default() -> Self {
        Self { count: 1, quality: 0 }
    }
}

impl Serialize for SampleDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.u8(&mut self.count)?;
        ser.u8(&mut self.quality)
    }
}

/// The backend-agnostic descriptor of a graphics pipeline.
///
/// Shaders are not part of this record; they are device-specific and stored
/// in the backend blocks. The render pass, when used, is referenced by name.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    /// Pipeline name; unique among graphics pipelines in one archive.
    pub name: String,
    /// Creation flags.
    pub flags: PipelineCreateFlags,
    /// Names of the resource signatures the pipeline binds, in binding-index
    /// order.
    pub signature_names: Vec<String>,
    /// Blend state.
    pub blend: BlendStateDesc,
    /// MSAA coverage mask.
    pub sample_mask: u32,
    /// Rasterizer state.
    pub rasterizer: RasterizerDesc,
    /// Depth-stencil state.
    pub depth_stencil: DepthStencilDesc,
    /// Vertex input layout.
    pub input_layout: Vec<LayoutElement>,
    /// Primitive topology.
    pub primitive_topology: PrimitiveTopology,
    /// Number of viewports used.
    pub num_viewports: u8,
    /// Render-target formats, one per bound target.
    pub rtv_formats: Vec<TextureFormat>,
    /// Depth-stencil format.
    pub dsv_format: TextureFormat,
    /// Multisampling configuration.
    pub sample: SampleDesc,
    /// Variable-rate-shading modes.
    pub shading_rate_flags: ShadingRateFlags,
    /// Render pass name, when rendering inside an archived render pass.
    pub render_pass_name: Option<String>,
    /// Subpass index within the render pass.
    pub subpass_index: u8,
}

impl Default for GraphicsPipelineDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            flags: PipelineCreateFlags::empty(),
            signature_names: Vec::new(),
            blend: BlendStateDesc::default(),
            sample_mask: u32::MAX,
            rasterizer: RasterizerDesc::default(),
            depth_stencil: DepthStencilDesc::default(),
            input_layout: Vec::new(),
            primitive_topology: PrimitiveTopology::TriangleList,
            num_viewports: 1,
            rtv_formats: Vec::new(),
            dsv_format: TextureFormat::Unknown,
            sample: SampleDesc::default(),
            shading_rate_flags: ShadingRateFlags::empty(),
            render_pass_name: None,
            subpass_index: 0,
        }
    }
}

impl Serialize for GraphicsPipelineDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        serialize_pipeline_base(ser, PipelineKind::Graphics, &mut self.flags, &mut self.signature_names)?;
        self.blend.serialize(ser)?;
        ser.u32(&mut self.sample_mask)?;
        self.rasterizer.serialize(ser)?;
        self.depth_stencil.serialize(ser)?;
        ser.seq(&mut self.input_layout)?;
        self.primitive_topology.serialize(ser)?;
        ser.u8(&mut self.num_viewports)?;
        ser.seq(&mut self.rtv_formats)?;
        self.dsv_format.serialize(ser)?;
        self.sample.serialize(ser)?;
        self.shading_rate_flags.serialize(ser)?;
        ser.opt_str(&mut self.render_pass_name)?;
        ser.u8(&mut self.subpass_index)
    }
}

/// The backend-agnostic descriptor of a compute pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputePipelineDesc {
    /// Pipeline name; unique among compute pipelines in one archive.
    pub name: String,
    /// Creation flags.
    pub flags: PipelineCreateFlags,
    /// Names of the resource signatures the pipeline binds.
    pub signature_names: Vec<String>,
}

impl Serialize for ComputePipelineDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        serialize_pipeline_base(ser, PipelineKind::Compute, &mut self.flags, &mut self.signature_names)
    }
}

/// The backend-agnostic descriptor of a tile pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePipelineDesc {
    /// Pipeline name; unique among tile pipelines in one archive.
    pub name: String,
    /// Creation flags.
    pub flags: PipelineCreateFlags,
    /// Names of the resource signatures the pipeline binds.
    pub signature_names: Vec<String>,
    /// Samples per pixel.
    pub sample_count: u8,
    /// Render-target formats.
    pub rtv_formats: Vec<TextureFormat>,
}

impl Default for TilePipelineDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            flags: PipelineCreateFlags::empty(),
            signature_names: Vec::new(),
            sample_count: 1,
            rtv_formats: Vec::new(),
        }
    }
}

impl Serialize for TilePipelineDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        serialize_pipeline_base(ser, PipelineKind::Tile, &mut self.flags, &mut self.signature_names)?;
        ser.u8(&mut self.sample_count)?;
        ser.seq(&mut self.rtv_formats)
    }
}

// --- Ray tracing ---

/// A reference from a shader group to one of its pipeline's shaders.
///
/// Serialized as a `u32` index with `u32::MAX` standing for "no shader";
/// after the backend shader list is loaded, every index is validated against
/// it in a dedicated remap pass before any object creation happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShaderRef {
    /// No shader bound in this slot.
    #[default]
    None,
    /// Index into the pipeline's shader list.
    Index(u32),
}

/// The serialized sentinel for [`ShaderRef::None`].
pub const SHADER_UNUSED: u32 = u32::MAX;

impl ShaderRef {
    /// The index, if a shader is bound.
    pub fn index(self) -> Option<u32> {
        match self {
            ShaderRef::None => None,
            ShaderRef::Index(i) => Some(i),
        }
    }
}

impl Serialize for ShaderRef {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        let mut raw = match *self {
            ShaderRef::None => SHADER_UNUSED,
            ShaderRef::Index(i) => i,
        };
        ser.u32(&mut raw)?;
        if M::READS {
            *self = if raw == SHADER_UNUSED {
                ShaderRef::None
            } else {
                ShaderRef::Index(raw)
            };
        }
        Ok(())
    }
}

/// A ray-gen, miss, or callable shader group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneralShaderGroup {
    /// Group name used by shader binding tables.
    pub name: String,
    /// The shader.
    pub shader: ShaderRef,
}

impl Serialize for GeneralShaderGroup {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.str(&mut self.name)?;
        self.shader.serialize(ser)
    }
}

/// A hit group for triangle geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleHitShaderGroup {
    /// Group name used by shader binding tables.
    pub name: String,
    /// Closest-hit shader.
    pub closest_hit: ShaderRef,
    /// Optional any-hit shader.
    pub any_hit: ShaderRef,
}

impl Serialize for TriangleHitShaderGroup {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.str(&mut self.name)?;
        self.closest_hit.serialize(ser)?;
        self.any_hit.serialize(ser)
    }
}

/// A hit group for procedural geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProceduralHitShaderGroup {
    /// Group name used by shader binding tables.
    pub name: String,
    /// Intersection shader.
    pub intersection: ShaderRef,
    /// Optional closest-hit shader.
    pub closest_hit: ShaderRef,
    /// Optional any-hit shader.
    pub any_hit: ShaderRef,
}

impl Serialize for ProceduralHitShaderGroup {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.str(&mut self.name)?;
        self.intersection.serialize(ser)?;
        self.closest_hit.serialize(ser)?;
        self.any_hit.serialize(ser)
    }
}

/// The backend-agnostic descriptor of a ray-tracing pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RayTracingPipelineDesc {
    /// Pipeline name; unique among ray-tracing pipelines in one archive.
    pub name: String,
    /// Creation flags.
    pub flags: PipelineCreateFlags,
    /// Names of the resource signatures the pipeline binds.
    pub signature_names: Vec<String>,
    /// Size of the per-record data in the shader binding table.
    pub shader_record_size: u32,
    /// Maximum recursion depth of traced rays.
    pub max_recursion_depth: u8,
    /// Name of the shader-record constant buffer, if any.
    pub shader_record_name: Option<String>,
    /// Maximum ray attribute size in bytes.
    pub max_attribute_size: u32,
    /// Maximum ray payload size in bytes.
    pub max_payload_size: u32,
    /// Ray-gen, miss and callable groups.
    pub general_groups: Vec<GeneralShaderGroup>,
    /// Triangle hit groups.
    pub triangle_hit_groups: Vec<TriangleHitShaderGroup>,
    /// Procedural hit groups.
    pub procedural_hit_groups: Vec<ProceduralHitShaderGroup>,
}

impl Serialize for RayTracingPipelineDesc {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        serialize_pipeline_base(ser, PipelineKind::RayTracing, &mut self.flags, &mut self.signature_names)?;
        ser.u32(&mut self.shader_record_size)?;
        ser.u8(&mut self.max_recursion_depth)?;
        ser.opt_str(&mut self.shader_record_name)?;
        ser.u32(&mut self.max_attribute_size)?;
        ser.u32(&mut self.max_payload_size)?;
        ser.seq(&mut self.general_groups)?;
        ser.seq(&mut self.triangle_hit_groups)?;
        ser.seq(&mut self.procedural_hit_groups)
    }
}

// --- Writer-side create infos ---

/// Input to [`crate::writer::Archiver::add_graphics_pipeline`].
#[derive(Debug, Clone, Default)]
pub struct GraphicsPipelineCreateInfo {
    /// The pipeline descriptor. `signature_names` and `render_pass_name` are
    /// filled by the archiver from the fields below.
    pub desc: GraphicsPipelineDesc,
    /// Signatures the pipeline binds; empty to derive a default signature
    /// from `resource_layout`.
    pub signatures: Vec<SignatureDesc>,
    /// Flat resource layout used when `signatures` is empty.
    pub resource_layout: ResourceLayoutDesc,
    /// Render pass the pipeline renders in, registered automatically.
    pub render_pass: Option<RenderPassDesc>,
    /// Device-agnostic shaders; each backend's patcher compiles these.
    pub shaders: Vec<ShaderData>,
}

/// Input to [`crate::writer::Archiver::add_compute_pipeline`].
#[derive(Debug, Clone, Default)]
pub struct ComputePipelineCreateInfo {
    /// The pipeline descriptor.
    pub desc: ComputePipelineDesc,
    /// Signatures the pipeline binds; empty to derive a default signature.
    pub signatures: Vec<SignatureDesc>,
    /// Flat resource layout used when `signatures` is empty.
    pub resource_layout: ResourceLayoutDesc,
    /// The compute shader (exactly one, [`ShaderStage::Compute`]).
    pub shaders: Vec<ShaderData>,
}

/// Input to [`crate::writer::Archiver::add_tile_pipeline`].
#[derive(Debug, Clone, Default)]
pub struct TilePipelineCreateInfo {
    /// The pipeline descriptor.
    pub desc: TilePipelineDesc,
    /// Signatures the pipeline binds; empty to derive a default signature.
    pub signatures: Vec<SignatureDesc>,
    /// Flat resource layout used when `signatures` is empty.
    pub resource_layout: ResourceLayoutDesc,
    /// The tile shader (exactly one, [`ShaderStage::Tile`]).
    pub shaders: Vec<ShaderData>,
}

/// Input to [`crate::writer::Archiver::add_ray_tracing_pipeline`].
///
/// Shader groups in `desc` reference `shaders` by index.
#[derive(Debug, Clone, Default)]
pub struct RayTracingPipelineCreateInfo {
    /// The pipeline descriptor.
    pub desc: RayTracingPipelineDesc,
    /// Signatures the pipeline binds; empty to derive a default signature.
    pub signatures: Vec<SignatureDesc>,
    /// Flat resource layout used when `signatures` is empty.
    pub resource_layout: ResourceLayoutDesc,
    /// Device-agnostic shaders, indexed by the descriptor's groups. Each
    /// backend's patcher must produce exactly one compiled record per entry,
    /// in the same order.
    pub shaders: Vec<ShaderData>,
}

/// Writer version info stored in the DebugInfo chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveDebugInfo {
    /// API version of the engine that wrote the archive.
    pub api_version: u32,
    /// Git hash of the writing engine, empty when unknown.
    pub git_hash: String,
}

impl Serialize for ArchiveDebugInfo {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.u32(&mut self.api_version)?;
        ser.str(&mut self.git_hash)
    }
}

// --- Unpack overrides ---

bitflags::bitflags! {
    /// Which attachment fields an [`AttachmentOverride`] replaces.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AttachmentOverrideFlags: u32 {
        /// Replace the format.
        const FORMAT = 1 << 0;
        /// Replace the sample count.
        const SAMPLE_COUNT = 1 << 1;
        /// Replace the load op.
        const LOAD_OP = 1 << 2;
        /// Replace the store op.
        const STORE_OP = 1 << 3;
        /// Replace the stencil load op.
        const STENCIL_LOAD_OP = 1 << 4;
        /// Replace the stencil store op.
        const STENCIL_STORE_OP = 1 << 5;
        /// Replace the initial state.
        const INITIAL_STATE = 1 << 6;
        /// Replace the final state.
        const FINAL_STATE = 1 << 7;
    }
}

/// A partial replacement of one render-pass attachment at unpack time.
#[derive(Debug, Clone, Default)]
pub struct AttachmentOverride {
    /// Index of the attachment to modify.
    pub attachment_index: u32,
    /// Which fields to replace.
    pub flags: AttachmentOverrideFlags,
    /// Source of the replacement values.
    pub desc: AttachmentDesc,
}

bitflags::bitflags! {
    /// Which fields a [`GraphicsPipelineOverrides`] replaces.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct GraphicsOverrideFlags: u32 {
        /// Replace the pipeline name.
        const NAME = 1 << 0;
        /// Replace the rasterizer state.
        const RASTERIZER = 1 << 1;
        /// Replace the blend state.
        const BLEND_STATE = 1 << 2;
        /// Replace the sample mask.
        const SAMPLE_MASK = 1 << 3;
        /// Replace the depth-stencil state.
        const DEPTH_STENCIL = 1 << 4;
        /// Replace the input layout.
        const INPUT_LAYOUT = 1 << 5;
        /// Replace the primitive topology.
        const PRIMITIVE_TOPOLOGY = 1 << 6;
        /// Replace the viewport count.
        const NUM_VIEWPORTS = 1 << 7;
        /// Replace the render-target formats.
        const RENDER_TARGETS = 1 << 8;
        /// Replace the render pass reference and subpass index.
        const RENDER_PASS = 1 << 9;
        /// Replace the shading-rate flags.
        const SHADING_RATE = 1 << 10;
        /// Replace the depth-stencil format.
        const DEPTH_STENCIL_TARGET = 1 << 11;
        /// Replace the sample desc.
        const SAMPLE_DESC = 1 << 12;
    }
}

/// Partial fixed-function replacement applied when unpacking a graphics
/// pipeline.
///
/// `desc` supplies the replacement values for every flagged field. Fields
/// are applied in ascending bit order. Overridden unpacks bypass the cache
/// in both directions.
#[derive(Debug, Clone, Default)]
pub struct GraphicsPipelineOverrides {
    /// Which fields to replace.
    pub flags: GraphicsOverrideFlags,
    /// Source of the replacement values.
    pub desc: GraphicsPipelineDesc,
}

bitflags::bitflags! {
    /// Which fields a [`TilePipelineOverrides`] replaces.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct TileOverrideFlags: u32 {
        /// Replace the pipeline name.
        const NAME = 1 << 0;
        /// Replace the sample count.
        const SAMPLE_COUNT = 1 << 1;
        /// Replace the render-target formats.
        const RENDER_TARGETS = 1 << 2;
    }
}

/// Partial replacement applied when unpacking a tile pipeline.
#[derive(Debug, Clone, Default)]
pub struct TilePipelineOverrides {
    /// Which fields to replace.
    pub flags: TileOverrideFlags,
    /// Source of the replacement values.
    pub desc: TilePipelineDesc,
}
