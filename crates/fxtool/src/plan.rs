//! One simulated frame through the real registry and canvas, recorded
//! instead of rendered.

use std::time::Instant;

use anyhow::{Context, Result};
use fx::{PassType, StateUpdater};
use glam::{Mat4, Vec3};
use postprocess::{
    Command, DrawOutcome, PingPongCull, PostProcessor, RecordingBackend, TechniqueId, ViewInfo,
};
use serde::Serialize;

use crate::cli::PlanArgs;
use crate::environment::Environment;

const FRAME: u64 = 1;

#[derive(Debug, Serialize)]
pub struct PassSummary {
    pub name: String,
    pub kind: PassType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub size: (u32, u32),
}

#[derive(Debug, Serialize)]
pub struct NodeSummary {
    pub id: TechniqueId,
    pub technique: String,
    pub generation: u64,
    pub hdr: bool,
    pub passes: Vec<PassSummary>,
}

#[derive(Debug, Serialize)]
pub struct Skipped {
    pub technique: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct Plan {
    pub outcome: DrawOutcome,
    pub enabled: bool,
    pub size: (u32, u32),
    pub hdr: bool,
    pub sunglare: bool,
    pub dispatch: Vec<NodeSummary>,
    pub skipped: Vec<Skipped>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<Command>>,
}

pub fn simulate(env: &Environment, args: &PlanArgs) -> Result<Plan> {
    let library = env.library()?;

    let mut config = env.config.clone();
    config.enabled = true;
    if let Some(chain) = &args.chain {
        config.chain = chain.clone();
    }
    if let Some(samples) = args.antialiasing {
        config.antialiasing = samples;
    }
    config.validate().context("invalid post-processing config")?;

    let (width, height) = args.size;
    let (mut processor, mut canvas) = PostProcessor::new(
        config,
        env.settings.clone(),
        Box::new(library),
        env.capabilities,
        width,
        height,
    );
    processor.set_underwater(args.underwater);
    processor.set_exterior(!args.interior);

    let mut state = StateUpdater::new(processor.uses_ubo());
    state.set_is_underwater(args.underwater);
    state.set_is_interior(args.interior);
    let mut backend = RecordingBackend::with_capabilities(env.capabilities);
    let mut cull = PingPongCull::new();
    let view = ViewInfo {
        view_matrix: Mat4::IDENTITY,
        eye_pos: Vec3::ZERO,
        look: Vec3::NEG_Z,
        viewport: (width, height),
    };

    processor.update(FRAME, Instant::now());
    canvas.prepare(FRAME, &mut backend);
    cull.cull(
        FRAME,
        0.0,
        &view,
        canvas.attachments(FRAME),
        processor.is_enabled(),
        &mut state,
    );
    let outcome = canvas.draw(FRAME, &state, &mut backend);
    tracing::debug!(?outcome, commands = backend.commands().len(), "simulated frame");

    let dispatch = canvas
        .dispatch(FRAME)
        .iter()
        .map(|node| NodeSummary {
            id: node.id,
            technique: node.technique.clone(),
            generation: node.generation,
            hdr: node.hdr,
            passes: node
                .passes
                .iter()
                .map(|pass| PassSummary {
                    name: pass.state.pass.clone(),
                    kind: pass.state.kind,
                    target: pass.target.as_ref().map(|t| t.name.clone()),
                    size: pass
                        .target
                        .as_ref()
                        .map_or((width, height), |t| (t.width, t.height)),
                })
                .collect(),
        })
        .collect();

    let skipped = processor
        .chain()
        .iter()
        .filter_map(|&id| processor.technique(id))
        .filter_map(|technique| {
            let reason = if !technique.is_valid() {
                technique.last_error().unwrap_or("invalid").to_owned()
            } else if technique.glsl_version() > env.capabilities.glsl_version {
                format!("requires GLSL {}", technique.glsl_version())
            } else {
                return None;
            };
            Some(Skipped {
                technique: technique.name().to_owned(),
                reason,
            })
        })
        .collect();

    Ok(Plan {
        outcome,
        enabled: processor.is_enabled(),
        size: (width, height),
        hdr: processor.hdr(),
        sunglare: processor.sunglare(),
        dispatch,
        skipped,
        commands: args.commands.then(|| backend.take_commands()),
    })
}

pub fn run(env: &Environment, args: PlanArgs) -> Result<()> {
    let plan = simulate(env, &args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let (width, height) = plan.size;
    match plan.outcome {
        DrawOutcome::Rendered { passes } => {
            println!("frame {FRAME}: rendered {passes} pass(es) at {width}x{height}")
        }
        DrawOutcome::Blit => println!("frame {FRAME}: no technique ran; scene blitted"),
        DrawOutcome::NoSurface => println!("frame {FRAME}: no attachments"),
    }
    if plan.hdr {
        println!("hdr: eye adaptation on");
    }
    for node in &plan.dispatch {
        println!("  {} (generation {})", node.technique, node.generation);
        for pass in &node.passes {
            let target = pass.target.as_deref().unwrap_or("chain");
            let (w, h) = pass.size;
            println!("    {:<16} {:?} -> {target} {w}x{h}", pass.name, pass.kind);
        }
    }
    for skipped in &plan.skipped {
        println!("skipped {}: {}", skipped.technique, skipped.reason);
    }
    if let Some(commands) = &plan.commands {
        for command in commands {
            println!("{command:?}");
        }
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

    const MAIN: &str = "fragment main { void main() { omw_FragColor = omw_Texture2D(omw_SamplerLastShader, omw_TexCoord); } }\ntechnique { passes = main; }";
    const DRY: &str = "fragment dry { void main() {} }\ntechnique { passes = dry; flags = disable_underwater; }";

    fn environment(dir: &TempDir) -> Environment {
        fs::write(dir.path().join("main.omwfx"), MAIN).unwrap();
        fs::write(dir.path().join("dry.omwfx"), DRY).unwrap();
        Environment {
            shader_dir: dir.path().to_path_buf(),
            config: FxConfig::default(),
            settings: ShaderSettings::new(),
            capabilities: Capabilities::default(),
        }
    }

    fn args(chain: &[&str]) -> PlanArgs {
        PlanArgs {
            chain: Some(chain.iter().map(|s| s.to_string()).collect()),
            size: (640, 480),
            antialiasing: None,
            underwater: false,
            interior: false,
            commands: false,
            json: false,
        }
    }

    #[test]
    fn chain_runs_after_main() {
        let dir = TempDir::new().unwrap();
        let plan = simulate(&environment(&dir), &args(&["dry"])).unwrap();
        assert_eq!(plan.outcome, DrawOutcome::Rendered { passes: 2 });
        let names: Vec<&str> = plan.dispatch.iter().map(|n| n.technique.as_str()).collect();
        assert_eq!(names, ["main", "dry"]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn underwater_filters_flagged_techniques() {
        let dir = TempDir::new().unwrap();
        let mut underwater = args(&["dry"]);
        underwater.underwater = true;
        let plan = simulate(&environment(&dir), &underwater).unwrap();
        assert_eq!(plan.outcome, DrawOutcome::Rendered { passes: 1 });
        // the dispatch still carries the node; only the draw skipped it
        assert_eq!(plan.dispatch.len(), 2);
    }

    #[test]
    fn missing_techniques_are_reported() {
        let dir = TempDir::new().unwrap();
        let mut with_commands = args(&["nope"]);
        with_commands.commands = true;
        let plan = simulate(&environment(&dir), &with_commands).unwrap();
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].technique, "nope");
        assert!(plan.commands.is_some_and(|c| !c.is_empty()));
    }
}
