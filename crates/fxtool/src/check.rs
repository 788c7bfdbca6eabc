use anyhow::{bail, Result};
use fx::{SourceProvider, Status, Technique, TechniqueFlags};
use serde::Serialize;

use crate::cli::CheckArgs;
use crate::environment::Environment;

#[derive(Debug, Serialize)]
pub struct TechniqueReport {
    pub name: String,
    pub file: String,
    pub status: Status,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub glsl_version: u32,
    pub hdr: bool,
    pub flags: TechniqueFlags,
    pub passes: Vec<String>,
    pub uniforms: Vec<String>,
    pub render_targets: Vec<String>,
}

impl TechniqueReport {
    fn from_technique(technique: &Technique, supported_glsl: u32) -> Self {
        let mut valid = technique.is_valid();
        let mut error = technique.last_error().map(str::to_owned);
        if valid && technique.glsl_version() > supported_glsl {
            valid = false;
            error = Some(format!(
                "requires GLSL {} but the driver supports {}",
                technique.glsl_version(),
                supported_glsl
            ));
        }

        Self {
            name: technique.name().to_owned(),
            file: technique.file_name().to_owned(),
            status: technique.status(),
            valid,
            error,
            glsl_version: technique.glsl_version(),
            hdr: technique.hdr(),
            flags: technique.flags(),
            passes: technique
                .passes()
                .iter()
                .map(|pass| pass.name().to_owned())
                .collect(),
            uniforms: technique
                .uniforms()
                .iter()
                .map(|uniform| uniform.name.clone())
                .collect(),
            render_targets: technique.render_targets().keys().cloned().collect(),
        }
    }
}

pub fn compile_all(env: &Environment, names: &[String]) -> Result<Vec<TechniqueReport>> {
    let library = env.library()?;
    let names = if names.is_empty() {
        library.names()
    } else {
        names.to_vec()
    };

    let options = env.compile_options();
    let reports = names
        .iter()
        .map(|name| {
            let mut technique = Technique::new(name.as_str(), options);
            technique.compile(&library, &env.settings);
            TechniqueReport::from_technique(&technique, env.capabilities.glsl_version)
        })
        .collect();
    Ok(reports)
}

pub fn run(env: &Environment, args: CheckArgs) -> Result<()> {
    let reports = compile_all(env, &args.names)?;
    if reports.is_empty() {
        tracing::warn!(dir = %env.shader_dir.display(), "no techniques found");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        let width = reports.iter().map(|r| r.name.len()).max().unwrap_or(0);
        for report in &reports {
            match &report.error {
                None => println!(
                    "ok      {:width$}  {} pass(es), glsl {}",
                    report.name,
                    report.passes.len(),
                    report.glsl_version
                ),
                Some(error) => println!("FAILED  {:width$}  {error}", report.name),
            }
        }
    }

    let failed = reports.iter().filter(|r| !r.valid).count();
    if failed > 0 {
        bail!("{failed} of {} technique(s) failed to compile", reports.len());
    }
    Ok(())
}
