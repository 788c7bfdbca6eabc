use anyhow::{anyhow, bail, Result};
use fx::{ShaderStage, Technique};
use fxconfig::SettingsMode;

use crate::cli::GlslArgs;
use crate::environment::Environment;

pub fn compile(env: &Environment, name: &str, debug: bool) -> Result<Technique> {
    let library = env.library()?;
    let mut settings = env.settings.clone();
    if debug {
        settings.set_mode(SettingsMode::Debug);
    }

    let mut technique = Technique::new(name, env.compile_options());
    if !technique.compile(&library, &settings) {
        let error = technique.last_error().unwrap_or("unknown error");
        return Err(anyhow!("failed to compile technique '{name}': {error}"));
    }
    Ok(technique)
}

/// Generated sources as `(pass, stage, source)` in pass order.
pub fn sources<'a>(
    technique: &'a Technique,
    pass: Option<&str>,
    stage: Option<ShaderStage>,
) -> Vec<(&'a str, ShaderStage, &'a str)> {
    technique
        .passes()
        .iter()
        .filter(|p| pass.map_or(true, |wanted| p.name() == wanted))
        .flat_map(|p| {
            p.compiled_stages()
                .iter()
                .map(move |s| (p.name(), s.stage, s.source.as_str()))
        })
        .filter(|(_, s, _)| stage.map_or(true, |wanted| *s == wanted))
        .collect()
}

pub fn run(env: &Environment, args: GlslArgs) -> Result<()> {
    let technique = compile(env, &args.name, args.debug)?;
    let stage = args.stage.map(ShaderStage::from);
    let sources = sources(&technique, args.pass.as_deref(), stage);
    if sources.is_empty() {
        bail!(
            "technique '{}' has no matching pass or stage",
            technique.name()
        );
    }

    for (pass, stage, source) in sources {
        println!("// {} :: {pass} ({})", technique.name(), stage.block_name());
        println!("{source}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use fxconfig::{FxConfig, ShaderSettings};
    use postprocess::Capabilities;
    use tempfile::TempDir;

    const TWO_PASS: &str = r#"
uniform_float gain { default = 2.0; static = true; }
fragment first { void main() { omw_FragColor = vec4(gain); } }
fragment second { void main() { omw_FragColor = omw_Texture2D(omw_SamplerLastPass, omw_TexCoord); } }
technique { passes = first, second; }
"#;

    fn environment(dir: &TempDir) -> Environment {
        fs::write(dir.path().join("gain.omwfx"), TWO_PASS).unwrap();
        Environment {
            shader_dir: dir.path().to_path_buf(),
            config: FxConfig::default(),
            settings: ShaderSettings::new(),
            capabilities: Capabilities::default(),
        }
    }

    #[test]
    fn filters_by_pass_and_stage() {
        let dir = TempDir::new().unwrap();
        let technique = compile(&environment(&dir), "gain", false).unwrap();

        let all = sources(&technique, None, None);
        assert_eq!(all.len(), 4);

        let fragments = sources(&technique, Some("second"), Some(ShaderStage::Fragment));
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].2.contains("omw_Texture2D(omw_SamplerLastPass, omw_TexCoord)"));
    }

    #[test]
    fn debug_mode_turns_static_uniforms_live() {
        let dir = TempDir::new().unwrap();
        let env = environment(&dir);

        let normal = compile(&env, "gain", false).unwrap();
        let (_, _, source) = sources(&normal, Some("first"), Some(ShaderStage::Fragment))[0];
        assert!(source.contains("const float gain"));

        let debug = compile(&env, "gain", true).unwrap();
        let (_, _, source) = sources(&debug, Some("first"), Some(ShaderStage::Fragment))[0];
        assert!(source.contains("uniform float gain"));
    }

    #[test]
    fn missing_technique_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = compile(&environment(&dir), "absent", false).unwrap_err();
        assert!(err.to_string().contains("absent"));
    }
}
