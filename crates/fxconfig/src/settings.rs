//! Persisted uniform overrides keyed by technique and uniform name.
//!
//! Types:
//!
//! - `ShaderSettings` holds the `(technique, uniform) -> value` table and the
//!   normal/debug mode switch.
//! - `SettingValue` is the untyped TOML representation of a stored value.
//! - `FromSettingValue` converts stored values back into typed uniform values.
//!
//! The on-disk format is one table per technique:
//!
//! ```toml
//! [bloom]
//! strength = 0.75
//! tint = [1.0, 0.9, 0.8]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub const SHADER_SETTINGS_FILE: &str = "shader_settings.toml";

/// In debug mode static uniforms are compiled as live uniforms so they can
/// be tweaked without recompiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsMode {
    #[default]
    Normal,
    Debug,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Vector(Vec<f64>),
}

pub trait FromSettingValue: Sized {
    fn from_setting(value: &SettingValue) -> Option<Self>;
}

impl FromSettingValue for bool {
    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromSettingValue for i32 {
    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Int(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromSettingValue for f32 {
    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Float(v) => Some(*v as f32),
            SettingValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl<const N: usize> FromSettingValue for [f32; N] {
    fn from_setting(value: &SettingValue) -> Option<Self> {
        let SettingValue::Vector(items) = value else {
            return None;
        };
        if items.len() != N {
            return None;
        }
        let mut out = [0.0; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = *item as f32;
        }
        Some(out)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(i64::from(value))
    }
}

impl From<f32> for SettingValue {
    fn from(value: f32) -> Self {
        SettingValue::Float(f64::from(value))
    }
}

impl<const N: usize> From<[f32; N]> for SettingValue {
    fn from(value: [f32; N]) -> Self {
        SettingValue::Vector(value.iter().map(|v| f64::from(*v)).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderSettings {
    mode: SettingsMode,
    values: BTreeMap<String, BTreeMap<String, SettingValue>>,
}

impl ShaderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SettingsMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SettingsMode) {
        self.mode = mode;
    }

    pub fn toggle_mode(&mut self) -> SettingsMode {
        self.mode = match self.mode {
            SettingsMode::Normal => SettingsMode::Debug,
            SettingsMode::Debug => SettingsMode::Normal,
        };
        self.mode
    }

    pub fn get(&self, technique: &str, uniform: &str) -> Option<&SettingValue> {
        self.values.get(technique)?.get(uniform)
    }

    /// Typed lookup; a stored value of the wrong shape reads as absent.
    pub fn get_value<T: FromSettingValue>(&self, technique: &str, uniform: &str) -> Option<T> {
        self.get(technique, uniform).and_then(T::from_setting)
    }

    pub fn set_value(&mut self, technique: &str, uniform: &str, value: impl Into<SettingValue>) {
        self.values
            .entry(technique.to_owned())
            .or_default()
            .insert(uniform.to_owned(), value.into());
    }

    pub fn remove(&mut self, technique: &str, uniform: &str) -> Option<SettingValue> {
        let table = self.values.get_mut(technique)?;
        let removed = table.remove(uniform);
        if table.is_empty() {
            self.values.remove(technique);
        }
        removed
    }

    pub fn techniques(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let values = toml::from_str(input)?;
        Ok(Self {
            mode: SettingsMode::Normal,
            values,
        })
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self.values)?)
    }

    /// Loads overrides from disk; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no shader settings file; starting empty");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&raw)?;
        tracing::debug!(
            path = %path.display(),
            techniques = settings.values.len(),
            "loaded shader settings"
        );
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialised = self.to_toml_string()?;
        fs::write(path, serialised).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_values_survive_a_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SHADER_SETTINGS_FILE);

        let mut settings = ShaderSettings::new();
        settings.set_value("bloom", "strength", 0.75_f32);
        settings.set_value("bloom", "passes", 3_i32);
        settings.set_value("bloom", "enabled", true);
        settings.set_value("tint", "color", [1.0_f32, 0.5, 0.25]);
        settings.save(&path).expect("save settings");

        let loaded = ShaderSettings::load(&path).expect("load settings");
        assert_eq!(loaded.get_value::<f32>("bloom", "strength"), Some(0.75));
        assert_eq!(loaded.get_value::<i32>("bloom", "passes"), Some(3));
        assert_eq!(loaded.get_value::<bool>("bloom", "enabled"), Some(true));
        assert_eq!(
            loaded.get_value::<[f32; 3]>("tint", "color"),
            Some([1.0, 0.5, 0.25])
        );
    }

    #[test]
    fn integers_promote_to_floats() {
        let settings = ShaderSettings::from_toml_str("[fog]\ndensity = 2\n").unwrap();
        assert_eq!(settings.get_value::<f32>("fog", "density"), Some(2.0));
        assert_eq!(settings.get_value::<i32>("fog", "density"), Some(2));
    }

    #[test]
    fn mismatched_shape_reads_as_absent() {
        let settings = ShaderSettings::from_toml_str("[fog]\ncolor = [1.0, 2.0]\n").unwrap();
        assert_eq!(settings.get_value::<[f32; 3]>("fog", "color"), None);
        assert_eq!(settings.get_value::<bool>("fog", "color"), None);
        assert_eq!(settings.get_value::<f32>("fog", "missing"), None);
    }

    #[test]
    fn removing_last_value_drops_the_table() {
        let mut settings = ShaderSettings::new();
        settings.set_value("fog", "density", 1.0_f32);
        assert!(settings.remove("fog", "density").is_some());
        assert!(settings.is_empty());
    }

    #[test]
    fn toggles_between_modes() {
        let mut settings = ShaderSettings::new();
        assert_eq!(settings.toggle_mode(), SettingsMode::Debug);
        assert_eq!(settings.toggle_mode(), SettingsMode::Normal);
    }
}
