//! A single render pass of a technique and the GLSL it compiles to.

use std::fmt::Write as _;

use fxconfig::SettingsMode;
use serde::Serialize;

use crate::error::PassError;
use crate::state::{uniform_block_glsl, UNIFORM_BLOCK_BINDING, UNIFORM_BLOCK_NAME};
use crate::technique::Technique;
use crate::types::BlendState;

/// Techniques targeting an older GLSL version get the legacy aliases.
pub const MODERN_GLSL_VERSION: u32 = 330;

pub const VERTEX_ATTRIBUTE: &str = "_omw_Vertex";
pub const FRAG_DATA_OUTPUT: &str = "_omw_FragColor";

/// Used for pixel passes that only declare a fragment shader.
pub const DEFAULT_VERTEX_SHADER: &str = r"
#if OMW_USE_BINDINGS
omw_In vec2 omw_Vertex;
#endif
omw_Out vec2 omw_TexCoord;

void main()
{
    omw_Position = vec4(omw_Vertex.xy, 0.0, 1.0);
    omw_TexCoord = omw_Position.xy * 0.5 + 0.5;
}
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassType {
    Pixel,
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub const fn block_name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSource {
    pub stage: ShaderStage,
    pub source: String,
}

/// Everything a backend needs to build the program object of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramDesc {
    pub label: String,
    pub stages: Vec<StageSource>,
    pub uniform_block: Option<(String, u32)>,
    pub attribute_bindings: Vec<(String, u32)>,
    pub frag_data_bindings: Vec<(String, u32)>,
}

/// Render state of a compiled pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassState {
    pub technique: String,
    pub pass: String,
    pub kind: PassType,
    pub program: ProgramDesc,
    pub blend: Option<BlendState>,
    pub clear_color: Option<[f32; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    name: String,
    vertex: Option<String>,
    fragment: Option<String>,
    compute: Option<String>,
    pub target: Option<String>,
    pub blend: Option<BlendState>,
    pub clear_color: Option<[f32; 4]>,
    compiled: Option<Vec<StageSource>>,
    use_ubo: bool,
    legacy: bool,
}

impl Pass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex: None,
            fragment: None,
            compute: None,
            target: None,
            blend: None,
            clear_color: None,
            compiled: None,
            use_ubo: false,
            legacy: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PassType {
        if self.compute.is_some() {
            PassType::Compute
        } else {
            PassType::Pixel
        }
    }

    pub fn stage_source(&self, stage: ShaderStage) -> Option<&str> {
        match stage {
            ShaderStage::Vertex => self.vertex.as_deref(),
            ShaderStage::Fragment => self.fragment.as_deref(),
            ShaderStage::Compute => self.compute.as_deref(),
        }
    }

    pub fn has_stage(&self, stage: ShaderStage) -> bool {
        self.stage_source(stage).is_some()
    }

    /// Stores the raw body of a shader block; compiled output is discarded.
    pub fn set_stage_source(&mut self, stage: ShaderStage, source: String) {
        let slot = match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
            ShaderStage::Compute => &mut self.compute,
        };
        *slot = Some(source);
        self.dirty();
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn compiled_stages(&self) -> &[StageSource] {
        self.compiled.as_deref().unwrap_or(&[])
    }

    pub fn dirty(&mut self) {
        self.compiled = None;
    }

    /// Assembles the final GLSL of every stage. A no-op once compiled.
    pub fn compile(&mut self, technique: &Technique, mode: SettingsMode) -> Result<(), PassError> {
        if self.compiled.is_some() {
            return Ok(());
        }

        let preamble = technique.shared();
        let mut stages = Vec::with_capacity(2);
        match self.kind() {
            PassType::Compute => {
                if self.vertex.is_some() || self.fragment.is_some() {
                    return Err(PassError::AmbiguousKind(self.name.clone()));
                }
                let body = self.compute.as_deref().unwrap_or_default();
                stages.push(self.assemble(technique, mode, ShaderStage::Compute, preamble, body));
            }
            PassType::Pixel => {
                let fragment = self
                    .fragment
                    .as_deref()
                    .ok_or_else(|| PassError::MissingFragment(self.name.clone()))?;
                let vertex = self.vertex.as_deref().unwrap_or(DEFAULT_VERTEX_SHADER);
                stages.push(self.assemble(technique, mode, ShaderStage::Vertex, preamble, vertex));
                stages.push(self.assemble(technique, mode, ShaderStage::Fragment, preamble, fragment));
            }
        }

        self.use_ubo = technique.options().use_ubo;
        self.legacy = technique.glsl_version() < MODERN_GLSL_VERSION;
        self.compiled = Some(stages);
        Ok(())
    }

    fn assemble(
        &self,
        technique: &Technique,
        mode: SettingsMode,
        stage: ShaderStage,
        preamble: &str,
        body: &str,
    ) -> StageSource {
        let mut source = self.header(technique, mode, stage);
        source.push_str(preamble);
        source.push('\n');
        source.push_str(body);
        StageSource { stage, source }
    }

    /// Generated prologue for `stage`: version, extensions, the shared
    /// uniform block, compatibility macros, built-in samplers and helpers,
    /// and the technique's own uniform declarations.
    pub fn header(&self, technique: &Technique, mode: SettingsMode, stage: ShaderStage) -> String {
        let options = technique.options();
        let legacy = technique.glsl_version() < MODERN_GLSL_VERSION;
        let flag = |on: bool| if on { "1" } else { "0" };

        let mut out = String::new();
        let _ = writeln!(
            out,
            "#version {} {}",
            technique.glsl_version(),
            technique.glsl_profile()
        );
        for extension in technique.glsl_extensions() {
            let _ = writeln!(out, "#ifdef {extension}\n\t#extension {extension}: enable\n#endif");
        }
        out.push('\n');
        out.push_str(&uniform_block_glsl(options.use_ubo));
        out.push_str("\n\n");

        let _ = writeln!(out, "#define OMW_REVERSE_Z {}", flag(options.reverse_z));
        let _ = writeln!(out, "#define OMW_RADIAL_FOG {}", flag(options.radial_fog));
        let _ = writeln!(out, "#define OMW_HDR {}", flag(technique.hdr()));
        let _ = writeln!(out, "#define OMW_USE_BINDINGS {}", flag(!legacy));

        let aliases: [(&str, &str, &str); 8] = [
            ("omw_In", "varying", "in"),
            ("omw_Out", "varying", "out"),
            ("omw_Position", "gl_Position", "gl_Position"),
            ("omw_Texture1D", "texture1D", "texture"),
            ("omw_Texture2D", "texture2D", "texture"),
            ("omw_Texture3D", "texture3D", "texture"),
            ("omw_Vertex", "gl_Vertex", VERTEX_ATTRIBUTE),
            ("omw_FragColor", "gl_FragColor", FRAG_DATA_OUTPUT),
        ];
        for (alias, old, new) in aliases {
            let _ = writeln!(out, "#define {alias} {}", if legacy { old } else { new });
        }
        out.push('\n');

        if !legacy && stage == ShaderStage::Fragment {
            out.push_str("out vec4 omw_FragColor;\n");
        }

        out.push_str(
            "uniform sampler2D omw_SamplerLastShader;\n\
             uniform sampler2D omw_SamplerLastPass;\n\
             uniform sampler2D omw_SamplerDepth;\n\
             #if OMW_HDR\n\
             uniform sampler2D omw_EyeAdaptation;\n\
             #endif\n",
        );
        for target in technique.render_targets().keys() {
            let _ = writeln!(out, "uniform sampler2D {target};");
        }

        out.push_str(HELPERS);

        for uniform in technique.uniforms() {
            out.push_str(&uniform.glsl(mode));
            out.push('\n');
        }
        out
    }

    /// Describes the program and render state of a compiled pass.
    pub fn prepare_state(&self, technique: &str) -> PassState {
        let mut attribute_bindings = Vec::new();
        let mut frag_data_bindings = Vec::new();
        if !self.legacy && self.kind() == PassType::Pixel {
            attribute_bindings.push((VERTEX_ATTRIBUTE.to_owned(), 0));
            frag_data_bindings.push((FRAG_DATA_OUTPUT.to_owned(), 0));
        }

        PassState {
            technique: technique.to_owned(),
            pass: self.name.clone(),
            kind: self.kind(),
            program: ProgramDesc {
                label: format!("{technique}/{}", self.name),
                stages: self.compiled_stages().to_vec(),
                uniform_block: self
                    .use_ubo
                    .then(|| (UNIFORM_BLOCK_NAME.to_owned(), UNIFORM_BLOCK_BINDING)),
                attribute_bindings,
                frag_data_bindings,
            },
            blend: self.blend,
            clear_color: self.clear_color,
        }
    }
}

const HELPERS: &str = r"
float omw_GetDepth(vec2 uv)
{
#if OMW_REVERSE_Z
    return 1.0 - omw_Texture2D(omw_SamplerDepth, uv).r;
#else
    return omw_Texture2D(omw_SamplerDepth, uv).r;
#endif
}

float omw_GetEyeAdaptation()
{
#if OMW_HDR
    return omw_Texture2D(omw_EyeAdaptation, vec2(0.5, 0.5)).r;
#else
    return 1.0;
#endif
}

";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::technique::{CompileOptions, Technique};
    use fxconfig::ShaderSettings;

    const SOURCE: &str = r##"
uniform_float gain { default = 2.0; static = true; header = "#define HAS_GAIN 1"; }
render_target RT_Blur { width_ratio = 0.25; height_ratio = 0.25; }
fragment blur(target = RT_Blur) { void main() { omw_FragColor = vec4(gain); } }
vertex final {
    omw_In vec2 omw_Vertex;
    void main() { omw_Position = vec4(omw_Vertex, 0.0, 1.0); }
}
fragment final { void main() { omw_FragColor = omw_Texture2D(RT_Blur, vec2(0.5)); } }
technique { passes = blur, final; glsl_version = GLSL; hdr = HDR; }
"##;

    fn build(glsl: u32, hdr: bool, use_ubo: bool) -> Technique {
        let text = SOURCE
            .replace("GLSL", &glsl.to_string())
            .replace("HDR", if hdr { "true" } else { "false" });
        let mut source = MemorySource::new();
        source.insert("blur", text);
        let options = CompileOptions {
            use_ubo,
            reverse_z: true,
            radial_fog: false,
        };
        let mut technique = Technique::new("blur", options);
        assert!(technique.compile(&source, &ShaderSettings::new()), "{:?}", technique.last_error());
        technique
    }

    #[test]
    fn header_sections_appear_in_order() {
        let technique = build(330, true, true);
        let header = technique.passes()[0].header(&technique, SettingsMode::Normal, ShaderStage::Fragment);
        let order = [
            "#version 330 compatibility",
            "struct _omw_data {",
            "layout(std140) uniform _data",
            "#define OMW_REVERSE_Z 1",
            "#define OMW_RADIAL_FOG 0",
            "#define OMW_HDR 1",
            "#define OMW_USE_BINDINGS 1",
            "#define omw_In in",
            "out vec4 omw_FragColor;",
            "uniform sampler2D omw_SamplerLastShader;",
            "uniform sampler2D RT_Blur;",
            "float omw_GetDepth(vec2 uv)",
            "const float gain = 2.0;\n#define HAS_GAIN 1",
        ];
        let mut cursor = 0;
        for needle in order {
            let found = header[cursor..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing or out of order: {needle}"));
            cursor += found + needle.len();
        }
    }

    #[test]
    fn legacy_versions_use_old_aliases() {
        let technique = build(120, false, false);
        let header = technique.passes()[0].header(&technique, SettingsMode::Normal, ShaderStage::Vertex);
        assert!(header.starts_with("#version 120 compatibility\n"));
        assert!(header.contains("#define omw_In varying\n"));
        assert!(header.contains("#define omw_FragColor gl_FragColor\n"));
        assert!(header.contains("#define OMW_USE_BINDINGS 0\n"));
        assert!(header.contains("uniform _omw_data omw;"));
        assert!(!header.contains("_omw_Vertex"));
    }

    #[test]
    fn debug_mode_keeps_static_uniforms_live() {
        let technique = build(330, false, true);
        let header = technique.passes()[0].header(&technique, SettingsMode::Debug, ShaderStage::Fragment);
        assert!(header.contains("uniform float gain;"));
        assert!(!header.contains("const float gain"));
    }

    #[test]
    fn fragment_only_pass_gets_default_vertex_shader() {
        let technique = build(330, false, true);
        let blur = &technique.passes()[0];
        let stages = blur.compiled_stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].stage, ShaderStage::Vertex);
        assert!(stages[0].source.ends_with(DEFAULT_VERTEX_SHADER));
        assert!(DEFAULT_VERTEX_SHADER.contains("#if OMW_USE_BINDINGS\nomw_In vec2 omw_Vertex;\n#endif"));
    }

    #[test]
    fn user_vertex_shader_declares_the_attribute_once() {
        let technique = build(330, false, true);
        let last = &technique.passes()[1];
        let vertex = &last.compiled_stages()[0];
        assert_eq!(vertex.stage, ShaderStage::Vertex);
        assert!(vertex.source.contains("omw_In vec2 omw_Vertex;"));
        assert_eq!(vertex.source.matches("omw_Vertex;").count(), 1);
        assert!(!vertex.source.contains("vec4 _omw_Vertex"));

        let header = last.header(&technique, SettingsMode::Normal, ShaderStage::Vertex);
        assert!(!header.contains("in vec4"));
        assert!(header.contains("#define omw_Vertex _omw_Vertex\n"));
    }

    #[test]
    fn prepared_state_carries_bindings() {
        let technique = build(330, false, true);
        let state = technique.passes()[0].prepare_state(technique.name());
        assert_eq!(state.program.label, "blur/blur");
        assert_eq!(state.kind, PassType::Pixel);
        assert_eq!(state.program.uniform_block, Some(("_data".to_owned(), 0)));
        assert_eq!(state.program.attribute_bindings, vec![("_omw_Vertex".to_owned(), 0)]);
        assert_eq!(state.program.frag_data_bindings, vec![("_omw_FragColor".to_owned(), 0)]);

        let legacy = build(120, false, false);
        let state = legacy.passes()[0].prepare_state(legacy.name());
        assert!(state.program.uniform_block.is_none());
        assert!(state.program.attribute_bindings.is_empty());
    }

    #[test]
    fn compile_rejects_ambiguous_pass() {
        let technique = build(330, false, true);
        let mut pass = Pass::new("mixed");
        pass.set_stage_source(ShaderStage::Fragment, "void main() {}".into());
        pass.set_stage_source(ShaderStage::Compute, "void main() {}".into());
        assert_eq!(
            pass.compile(&technique, SettingsMode::Normal),
            Err(PassError::AmbiguousKind("mixed".into()))
        );

        let mut vertex_only = Pass::new("lonely");
        vertex_only.set_stage_source(ShaderStage::Vertex, "void main() {}".into());
        assert_eq!(
            vertex_only.compile(&technique, SettingsMode::Normal),
            Err(PassError::MissingFragment("lonely".into()))
        );
    }
}
