//! Scene luminance for HDR techniques.
//!
//! Average luminance is approximated by rendering log-luminance into a
//! mipmapped texture and sampling its smallest level. The adaptation pass
//! then blends towards that value from the previous frame's result.

use fx::{
    FilterMode, InternalFormat, ProgramDesc, ShaderStage, SourceFormat, SourceType, StageSource,
    TextureTemplate, WrapMode,
};

use crate::backend::{
    Attachment, FramebufferDesc, FramebufferId, ProgramId, RenderBackend, TextureDesc, TextureId,
    TextureSource,
};

const FULLSCREEN_VERTEX: &str = r"#version 120
varying vec2 uv;
void main()
{
    gl_Position = vec4(gl_Vertex.xy, 0.0, 1.0);
    uv = gl_Position.xy * 0.5 + 0.5;
}
";

const LUMINANCE_FRAGMENT: &str = r"#version 120
varying vec2 uv;
uniform sampler2D sceneTex;
void main()
{
    float lum = dot(texture2D(sceneTex, uv).rgb, vec3(0.2126, 0.7152, 0.0722));
    gl_FragColor.r = log(max(lum, 0.0001));
}
";

const ADAPTATION_FRAGMENT: &str = r"#version 120
varying vec2 uv;
uniform sampler2D luminanceSceneTex;
uniform sampler2D prevLuminanceSceneTex;
uniform int mipmapLevel;
void main()
{
    float prev = texture2D(prevLuminanceSceneTex, vec2(0.5)).r;
    float current = exp(texture2D(luminanceSceneTex, vec2(0.5), float(mipmapLevel)).r);
    gl_FragColor.r = mix(prev, current, 0.05);
}
";

fn luminance_template(min_filter: FilterMode) -> TextureTemplate {
    TextureTemplate {
        min_filter,
        mag_filter: FilterMode::Linear,
        wrap_s: WrapMode::ClampToEdge,
        wrap_t: WrapMode::ClampToEdge,
        wrap_r: WrapMode::ClampToEdge,
        internal_format: InternalFormat::R16f,
        source_type: SourceType::Float,
        source_format: SourceFormat::Red,
    }
}

fn program(label: &str, fragment: &str) -> ProgramDesc {
    ProgramDesc {
        label: label.to_owned(),
        stages: vec![
            StageSource {
                stage: ShaderStage::Vertex,
                source: FULLSCREEN_VERTEX.to_owned(),
            },
            StageSource {
                stage: ShaderStage::Fragment,
                source: fragment.to_owned(),
            },
        ],
        uniform_block: None,
        attribute_bindings: Vec::new(),
        frag_data_bindings: Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HdrSlot {
    luminance: TextureId,
    luminance_fbo: FramebufferId,
    adapted: TextureId,
    adapted_fbo: FramebufferId,
}

fn create_slot(
    backend: &mut dyn RenderBackend,
    index: usize,
    mip_levels: u32,
    width: u32,
    height: u32,
) -> HdrSlot {
    let luminance = backend.create_texture(&TextureDesc {
        label: format!("hdr_luminance[{index}]"),
        source: TextureSource::Blank { width, height },
        template: luminance_template(FilterMode::LinearMipmapNearest),
        mip_levels,
    });
    let luminance_fbo = backend.create_framebuffer(&FramebufferDesc {
        label: format!("hdr_luminance[{index}]"),
        color: Some(Attachment::Texture(luminance)),
        depth: None,
    });
    let adapted = backend.create_texture(&TextureDesc {
        label: format!("hdr_adapted[{index}]"),
        source: TextureSource::Blank { width: 1, height: 1 },
        template: luminance_template(FilterMode::Linear),
        mip_levels: 1,
    });
    let adapted_fbo = backend.create_framebuffer(&FramebufferDesc {
        label: format!("hdr_adapted[{index}]"),
        color: Some(Attachment::Texture(adapted)),
        depth: None,
    });
    HdrSlot {
        luminance,
        luminance_fbo,
        adapted,
        adapted_fbo,
    }
}

#[derive(Debug, Default)]
pub struct HdrDriver {
    slots: Option<[HdrSlot; 2]>,
    mip_levels: u32,
    size: (u32, u32),
    luminance_program: Option<ProgramId>,
    adaptation_program: Option<ProgramId>,
}

impl HdrDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_compiled_for(&self, width: u32, height: u32) -> bool {
        self.slots.is_some() && self.size == (width, height)
    }

    /// Creates the luminance chain for a `width` x `height` scene.
    pub fn compile(
        &mut self,
        backend: &mut dyn RenderBackend,
        mip_levels: u32,
        width: u32,
        height: u32,
    ) {
        self.slots = Some([
            create_slot(backend, 0, mip_levels, width, height),
            create_slot(backend, 1, mip_levels, width, height),
        ]);

        let luminance = program("hdr/luminance", LUMINANCE_FRAGMENT);
        let adaptation = program("hdr/adaptation", ADAPTATION_FRAGMENT);
        self.luminance_program = Some(Self::build(backend, &luminance));
        self.adaptation_program = Some(Self::build(backend, &adaptation));
        self.mip_levels = mip_levels;
        self.size = (width, height);
        tracing::debug!(width, height, mip_levels, "compiled hdr luminance chain");
    }

    fn build(backend: &mut dyn RenderBackend, desc: &ProgramDesc) -> ProgramId {
        backend.create_program(desc).unwrap_or_else(|err| {
            tracing::warn!(%err, "hdr program failed; using fallback");
            backend.fallback_program()
        })
    }

    /// Reduces `scene` to an adapted luminance value for `slot`.
    pub fn draw(&self, backend: &mut dyn RenderBackend, scene: TextureId, slot: usize) {
        let (Some(slots), Some(luminance_program), Some(adaptation_program)) =
            (&self.slots, self.luminance_program, self.adaptation_program)
        else {
            return;
        };
        let current = slots[slot % 2];
        let previous = slots[(slot + 1) % 2];

        backend.bind_framebuffer(Some(current.luminance_fbo));
        backend.set_viewport(self.size.0, self.size.1);
        backend.set_blend(None);
        backend.use_program(luminance_program);
        backend.bind_texture(0, scene);
        backend.set_sampler("sceneTex", 0);
        backend.draw_fullscreen();
        backend.generate_mipmap(current.luminance);

        backend.bind_framebuffer(Some(current.adapted_fbo));
        backend.set_viewport(1, 1);
        backend.use_program(adaptation_program);
        backend.bind_texture(0, current.luminance);
        backend.bind_texture(1, previous.adapted);
        backend.set_sampler("luminanceSceneTex", 0);
        backend.set_sampler("prevLuminanceSceneTex", 1);
        backend.set_uniform(
            "mipmapLevel",
            fx::UniformValue::Int(self.mip_levels.saturating_sub(1) as i32),
        );
        backend.draw_fullscreen();
    }

    pub fn luminance_texture(&self, slot: usize) -> Option<TextureId> {
        self.slots.map(|slots| slots[slot % 2].adapted)
    }
}
