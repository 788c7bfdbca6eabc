//! Texture, render target, blend and flag types referenced by technique files,
//! together with the identifier tables the parser resolves them through.

use std::fmt;

use serde::Serialize;

/// Looks up an identifier in one of the resolution tables below.
pub fn lookup<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    table
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

pub fn lookup_ignore_case<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    table
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| *value)
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct TechniqueFlags: u32 {
        const DISABLE_INTERIORS = 1 << 0;
        const DISABLE_EXTERIORS = 1 << 1;
        const DISABLE_UNDERWATER = 1 << 2;
        const DISABLE_ABOVEWATER = 1 << 3;
        const DISABLE_SUNGLARE = 1 << 4;
        const HIDDEN = 1 << 5;
    }
}

pub const TECHNIQUE_FLAGS: &[(&str, TechniqueFlags)] = &[
    ("disable_interiors", TechniqueFlags::DISABLE_INTERIORS),
    ("disable_exteriors", TechniqueFlags::DISABLE_EXTERIORS),
    ("disable_underwater", TechniqueFlags::DISABLE_UNDERWATER),
    ("disable_abovewater", TechniqueFlags::DISABLE_ABOVEWATER),
    ("disable_sunglare", TechniqueFlags::DISABLE_SUNGLARE),
    ("hidden", TechniqueFlags::HIDDEN),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Linear,
    LinearMipmapLinear,
    LinearMipmapNearest,
    Nearest,
    NearestMipmapLinear,
    NearestMipmapNearest,
}

pub const FILTER_MODES: &[(&str, FilterMode)] = &[
    ("linear", FilterMode::Linear),
    ("linear_mipmap_linear", FilterMode::LinearMipmapLinear),
    ("linear_mipmap_nearest", FilterMode::LinearMipmapNearest),
    ("nearest", FilterMode::Nearest),
    ("nearest_mipmap_linear", FilterMode::NearestMipmapLinear),
    ("nearest_mipmap_nearest", FilterMode::NearestMipmapNearest),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    Clamp,
    ClampToEdge,
    ClampToBorder,
    Repeat,
    Mirror,
}

pub const WRAP_MODES: &[(&str, WrapMode)] = &[
    ("clamp", WrapMode::Clamp),
    ("clamp_to_edge", WrapMode::ClampToEdge),
    ("clamp_to_border", WrapMode::ClampToBorder),
    ("repeat", WrapMode::Repeat),
    ("mirror", WrapMode::Mirror),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalFormat {
    Red,
    R16f,
    R32f,
    Rg,
    Rg16f,
    Rg32f,
    Rgb,
    Rgb16f,
    Rgb32f,
    Rgba,
    Rgba16f,
    Rgba32f,
    DepthComponent16,
    DepthComponent24,
    DepthComponent32,
    DepthComponent32f,
}

pub const INTERNAL_FORMATS: &[(&str, InternalFormat)] = &[
    ("red", InternalFormat::Red),
    ("r16f", InternalFormat::R16f),
    ("r32f", InternalFormat::R32f),
    ("rg", InternalFormat::Rg),
    ("rg16f", InternalFormat::Rg16f),
    ("rg32f", InternalFormat::Rg32f),
    ("rgb", InternalFormat::Rgb),
    ("rgb16f", InternalFormat::Rgb16f),
    ("rgb32f", InternalFormat::Rgb32f),
    ("rgba", InternalFormat::Rgba),
    ("rgba16f", InternalFormat::Rgba16f),
    ("rgba32f", InternalFormat::Rgba32f),
    ("depth_component16", InternalFormat::DepthComponent16),
    ("depth_component24", InternalFormat::DepthComponent24),
    ("depth_component32", InternalFormat::DepthComponent32),
    ("depth_component32f", InternalFormat::DepthComponent32f),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    UnsignedInt24_8,
    Float,
    Double,
}

pub const SOURCE_TYPES: &[(&str, SourceType)] = &[
    ("byte", SourceType::Byte),
    ("unsigned_byte", SourceType::UnsignedByte),
    ("short", SourceType::Short),
    ("unsigned_short", SourceType::UnsignedShort),
    ("int", SourceType::Int),
    ("unsigned_int", SourceType::UnsignedInt),
    ("unsigned_int_24_8", SourceType::UnsignedInt24_8),
    ("float", SourceType::Float),
    ("double", SourceType::Double),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Red,
    Rg,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    DepthComponent,
    DepthStencil,
    Alpha,
    Luminance,
}

pub const SOURCE_FORMATS: &[(&str, SourceFormat)] = &[
    ("red", SourceFormat::Red),
    ("rg", SourceFormat::Rg),
    ("rgb", SourceFormat::Rgb),
    ("bgr", SourceFormat::Bgr),
    ("rgba", SourceFormat::Rgba),
    ("bgra", SourceFormat::Bgra),
    ("depth_component", SourceFormat::DepthComponent),
    ("depth_stencil", SourceFormat::DepthStencil),
    ("alpha", SourceFormat::Alpha),
    ("luminance", SourceFormat::Luminance),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendFunc {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

pub const BLEND_FUNCS: &[(&str, BlendFunc)] = &[
    ("zero", BlendFunc::Zero),
    ("one", BlendFunc::One),
    ("src_color", BlendFunc::SrcColor),
    ("one_minus_src_color", BlendFunc::OneMinusSrcColor),
    ("src_alpha", BlendFunc::SrcAlpha),
    ("one_minus_src_alpha", BlendFunc::OneMinusSrcAlpha),
    ("dst_alpha", BlendFunc::DstAlpha),
    ("one_minus_dst_alpha", BlendFunc::OneMinusDstAlpha),
    ("dst_color", BlendFunc::DstColor),
    ("one_minus_dst_color", BlendFunc::OneMinusDstColor),
    ("src_alpha_saturate", BlendFunc::SrcAlphaSaturate),
    ("constant_color", BlendFunc::ConstantColor),
    ("one_minus_constant_color", BlendFunc::OneMinusConstantColor),
    ("constant_alpha", BlendFunc::ConstantAlpha),
    ("one_minus_constant_alpha", BlendFunc::OneMinusConstantAlpha),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    RgbaMin,
    RgbaMax,
    AlphaMin,
    AlphaMax,
    LogicOp,
}

pub const BLEND_EQUATIONS: &[(&str, BlendEquation)] = &[
    ("add", BlendEquation::Add),
    ("subtract", BlendEquation::Subtract),
    ("reverse_subtract", BlendEquation::ReverseSubtract),
    ("rgba_min", BlendEquation::RgbaMin),
    ("rgba_max", BlendEquation::RgbaMax),
    ("alpha_min", BlendEquation::AlphaMin),
    ("alpha_max", BlendEquation::AlphaMax),
    ("logic_op", BlendEquation::LogicOp),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlendState {
    pub equation: BlendEquation,
    pub source: BlendFunc,
    pub destination: BlendFunc,
}

/// Sampling and storage parameters shared by render targets, samplers and
/// the main scene texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TextureTemplate {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
    pub internal_format: InternalFormat,
    pub source_type: SourceType,
    pub source_format: SourceFormat,
}

impl TextureTemplate {
    /// The scene colour texture used when no `main_pass` block overrides it.
    pub const fn scene() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            wrap_r: WrapMode::ClampToEdge,
            internal_format: InternalFormat::Rgba,
            source_type: SourceType::UnsignedByte,
            source_format: SourceFormat::Rgba,
        }
    }

    pub const fn render_target() -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            wrap_r: WrapMode::ClampToEdge,
            internal_format: InternalFormat::Rgb,
            source_type: SourceType::UnsignedByte,
            source_format: SourceFormat::Rgb,
        }
    }

    pub const fn sampler() -> Self {
        Self {
            min_filter: FilterMode::LinearMipmapLinear,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            wrap_r: WrapMode::ClampToEdge,
            internal_format: InternalFormat::Rgba,
            source_type: SourceType::UnsignedByte,
            source_format: SourceFormat::Rgba,
        }
    }
}

impl Default for TextureTemplate {
    fn default() -> Self {
        Self::scene()
    }
}

/// Resolution policy for a render target.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SizeProxy {
    pub width_ratio: Option<f32>,
    pub height_ratio: Option<f32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl SizeProxy {
    /// Resolves against the back buffer. Ratios win over absolute sizes and
    /// the result is never smaller than 1x1.
    pub fn get(&self, width: u32, height: u32) -> (u32, u32) {
        let scaled_width = match (self.width_ratio, self.width) {
            (Some(ratio), _) => (width as f32 * ratio) as u32,
            (None, Some(absolute)) => absolute,
            (None, None) => width,
        };
        let scaled_height = match (self.height_ratio, self.height) {
            (Some(ratio), _) => (height as f32 * ratio) as u32,
            (None, Some(absolute)) => absolute,
            (None, None) => height,
        };
        (scaled_width.max(1), scaled_height.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderTarget {
    pub name: String,
    pub template: TextureTemplate,
    pub size: SizeProxy,
    pub mipmaps: bool,
}

impl RenderTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: TextureTemplate::render_target(),
            size: SizeProxy::default(),
            mipmaps: false,
        }
    }

    pub fn mip_levels(&self, width: u32, height: u32) -> u32 {
        if self.mipmaps {
            mip_levels(width, height)
        } else {
            1
        }
    }
}

/// Length of a full mip chain for a `width` x `height` texture.
pub fn mip_levels(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerType {
    Sampler1D,
    Sampler2D,
    Sampler3D,
}

impl SamplerType {
    pub const fn glsl_name(self) -> &'static str {
        match self {
            SamplerType::Sampler1D => "sampler1D",
            SamplerType::Sampler2D => "sampler2D",
            SamplerType::Sampler3D => "sampler3D",
        }
    }

    pub const fn block_name(self) -> &'static str {
        match self {
            SamplerType::Sampler1D => "sampler_1d",
            SamplerType::Sampler2D => "sampler_2d",
            SamplerType::Sampler3D => "sampler_3d",
        }
    }
}

impl fmt::Display for SamplerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.block_name())
    }
}

/// A texture sampled from an image file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sampler {
    pub name: String,
    pub kind: SamplerType,
    pub source: String,
    pub template: TextureTemplate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_lookup_is_case_insensitive() {
        assert_eq!(
            lookup_ignore_case(TECHNIQUE_FLAGS, "Disable_Underwater"),
            Some(TechniqueFlags::DISABLE_UNDERWATER)
        );
        assert_eq!(lookup_ignore_case(TECHNIQUE_FLAGS, "disable_everything"), None);
    }

    #[test]
    fn flags_combine() {
        let flags = TechniqueFlags::HIDDEN | TechniqueFlags::DISABLE_INTERIORS;
        assert!(flags.contains(TechniqueFlags::HIDDEN));
        assert!(flags.intersects(TechniqueFlags::DISABLE_INTERIORS));
        assert!(!flags.intersects(TechniqueFlags::DISABLE_EXTERIORS));
        assert_eq!(flags.bits(), 0b100001);
        assert!(TechniqueFlags::default().is_empty());
        assert_eq!(
            TechniqueFlags::from_bits(0b1000000),
            None,
            "unknown bits are rejected"
        );
    }

    #[test]
    fn size_proxy_prefers_ratio() {
        let proxy = SizeProxy {
            width_ratio: Some(0.5),
            width: Some(100),
            height: Some(64),
            ..SizeProxy::default()
        };
        assert_eq!(proxy.get(1920, 1080), (960, 64));
        assert_eq!(SizeProxy::default().get(800, 600), (800, 600));
    }

    #[test]
    fn size_proxy_never_collapses() {
        let proxy = SizeProxy {
            width_ratio: Some(0.0),
            height_ratio: Some(0.0001),
            ..SizeProxy::default()
        };
        assert_eq!(proxy.get(1920, 1080), (1, 1));
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(mip_levels(1, 1), 1);
        assert_eq!(mip_levels(256, 128), 9);
        assert_eq!(mip_levels(1920, 1080), 11);
    }
}
