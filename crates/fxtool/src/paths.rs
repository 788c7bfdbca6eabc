//! Config and data locations, overridable per directory from the
//! environment.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "FXTOOL_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "FXTOOL_DATA_DIR";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let project = ProjectDirs::from("org", "fx", "fxtool");
        Ok(Self {
            config_dir: dir(ENV_CONFIG_DIR, project.as_ref().map(ProjectDirs::config_dir))?,
            data_dir: dir(ENV_DATA_DIR, project.as_ref().map(ProjectDirs::data_dir))?,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(fxconfig::CONFIG_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(fxconfig::SHADER_SETTINGS_FILE)
    }

    pub fn shader_dir(&self) -> PathBuf {
        self.data_dir.join(fx::source::SHADER_SUBDIR)
    }
}

// An empty variable counts as unset.
fn dir(var: &str, fallback: Option<&Path>) -> Result<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| fallback.map(Path::to_path_buf))
        .with_context(|| format!("{var} is not set and no home directory was found"))
}
