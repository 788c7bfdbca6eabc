use std::path::PathBuf;

use anyhow::{Context, Result};
use fx::pass::MODERN_GLSL_VERSION;
use fx::{CompileOptions, TechniqueLibrary};
use fxconfig::{FxConfig, ShaderSettings};
use postprocess::Capabilities;

use crate::cli::EnvArgs;
use crate::paths::AppPaths;

/// Everything a subcommand needs to compile techniques the way the engine
/// would.
#[derive(Debug)]
pub struct Environment {
    pub shader_dir: PathBuf,
    pub config: FxConfig,
    pub settings: ShaderSettings,
    pub capabilities: Capabilities,
}

impl Environment {
    pub fn resolve(args: &EnvArgs) -> Result<Self> {
        let paths = if args.shaders.is_some() && args.config.is_some() && args.settings.is_some() {
            None
        } else {
            Some(AppPaths::discover()?)
        };

        let shader_dir = args
            .shaders
            .clone()
            .or_else(|| paths.as_ref().map(AppPaths::shader_dir))
            .unwrap_or_default();
        let config_path = args
            .config
            .clone()
            .or_else(|| paths.as_ref().map(AppPaths::config_file))
            .unwrap_or_default();
        let settings_path = args
            .settings
            .clone()
            .or_else(|| paths.as_ref().map(AppPaths::settings_file))
            .unwrap_or_default();

        let config = FxConfig::load(&config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?;
        let settings = ShaderSettings::load(&settings_path)
            .with_context(|| format!("failed to load settings {}", settings_path.display()))?;

        let capabilities = Capabilities {
            glsl_version: args.glsl_version,
            uniform_buffers: !args.no_ubo,
            ..Capabilities::default()
        };

        tracing::debug!(
            shaders = %shader_dir.display(),
            config = %config_path.display(),
            settings = %settings_path.display(),
            glsl_version = capabilities.glsl_version,
            ubo = capabilities.uniform_buffers,
            "resolved fxtool environment"
        );

        Ok(Self {
            shader_dir,
            config,
            settings,
            capabilities,
        })
    }

    pub fn library(&self) -> Result<TechniqueLibrary> {
        let library = TechniqueLibrary::scan(&self.shader_dir).with_context(|| {
            format!(
                "failed to scan technique directory {}",
                self.shader_dir.display()
            )
        })?;
        tracing::debug!(techniques = library.len(), "scanned technique library");
        Ok(library)
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            use_ubo: self.capabilities.uniform_buffers
                && self.capabilities.glsl_version >= MODERN_GLSL_VERSION,
            reverse_z: self.config.reverse_z,
            radial_fog: self.config.radial_fog,
        }
    }
}
