use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

mod settings;

pub use settings::{
    FromSettingValue, SettingValue, SettingsMode, ShaderSettings, SHADER_SETTINGS_FILE,
};

pub const CONFIG_FILE: &str = "postprocess.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialise configuration: {0}")]
    Serialise(#[from] toml::ser::Error),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Engine-wide post-processing settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FxConfig {
    pub enabled: bool,
    pub live_reload: bool,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub live_reload_interval: Duration,
    #[serde(deserialize_with = "deserialize_chain")]
    pub chain: Vec<String>,
    pub transparent_postpass: bool,
    pub radial_fog: bool,
    pub soft_particles: bool,
    pub reverse_z: bool,
    pub antialiasing: u32,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            live_reload: false,
            live_reload_interval: default_reload_interval(),
            chain: Vec::new(),
            transparent_postpass: true,
            radial_fog: false,
            soft_particles: false,
            reverse_z: false,
            antialiasing: 0,
        }
    }
}

fn default_reload_interval() -> Duration {
    Duration::from_secs(1)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Accepts either a TOML array or a single comma separated string.
fn deserialize_chain<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Joined(String),
        List(Vec<String>),
    }

    let names = match Helper::deserialize(deserializer)? {
        Helper::Joined(raw) => raw.split(',').map(str::to_owned).collect(),
        Helper::List(list) => list,
    };
    Ok(names
        .into_iter()
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .collect())
}

impl FxConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FxConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no post-processing config; using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Number of multisample samples requested; 0 and 1 both mean none.
    pub fn samples(&self) -> u32 {
        self.antialiasing.max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.antialiasing, 0 | 1 | 2 | 4 | 8 | 16) {
            return Err(ConfigError::Invalid(format!(
                "antialiasing must be one of 0, 1, 2, 4, 8 or 16 (got {})",
                self.antialiasing
            )));
        }

        if self.live_reload && self.live_reload_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "live_reload_interval must be greater than zero when live_reload is on".into(),
            ));
        }

        for name in &self.chain {
            if name.chars().any(|ch| ch == '/' || ch == '\\' || ch.is_whitespace()) {
                return Err(ConfigError::Invalid(format!(
                    "chain entry '{name}' is not a technique name"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
enabled = true
live_reload = true
live_reload_interval = "250ms"
chain = ["bloom", "vignette"]
radial_fog = true
antialiasing = 4
"#;

    #[test]
    fn parses_sample_config() {
        let config = FxConfig::from_toml_str(SAMPLE).expect("parse config");
        assert!(config.live_reload);
        assert_eq!(config.live_reload_interval, Duration::from_millis(250));
        assert_eq!(config.chain, vec!["bloom", "vignette"]);
        assert!(config.radial_fog);
        assert!(config.transparent_postpass);
        assert_eq!(config.samples(), 4);
    }

    #[test]
    fn accepts_comma_separated_chain() {
        let config = FxConfig::from_toml_str(r#"chain = "bloom, ,vignette""#).unwrap();
        assert_eq!(config.chain, vec!["bloom", "vignette"]);
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = FxConfig::from_toml_str("").unwrap();
        assert_eq!(config, FxConfig::default());
        assert_eq!(config.samples(), 1);
    }

    #[test]
    fn rejects_unsupported_sample_count() {
        let err = FxConfig::from_toml_str("antialiasing = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_reload_interval() {
        let err = FxConfig::from_toml_str(
            r#"
live_reload = true
live_reload_interval = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn serialises_back_to_toml() {
        let config = FxConfig::from_toml_str(SAMPLE).unwrap();
        let text = config.to_toml_string().unwrap();
        let reparsed = FxConfig::from_toml_str(&text).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FxConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert!(config.enabled);
        assert!(config.chain.is_empty());
    }
}
