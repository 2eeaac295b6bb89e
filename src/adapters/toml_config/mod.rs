// TOML config adapter - configuration hierarchy: defaults < file < environment
//
// Command line overrides are applied last by the CLI layer.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::CutlistConfig;
use crate::error::{CutlistError, CutlistResult};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "CUTLIST_CONFIG";
/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cutlist.toml";

/// Loads [`CutlistConfig`] from TOML files and the environment
#[derive(Debug, Clone, Default)]
pub struct TomlConfigAdapter {
    explicit: Option<PathBuf>,
}

impl TomlConfigAdapter {
    /// `explicit` is the `--config` argument, if given
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// Config file to read, if any
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    }

    /// Defaults, then the config file, then `CUTLIST_*` variables
    pub fn load(&self) -> CutlistResult<CutlistConfig> {
        let mut config = match self.config_path() {
            Some(path) => load_file(&path)?,
            None => {
                debug!("No config file, using defaults");
                CutlistConfig::default()
            }
        };

        let applied = apply_env_overrides(&mut config, std::env::vars())?;
        if applied > 0 {
            info!("Applied {} environment overrides", applied);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Read and parse one config file
pub fn load_file(path: &Path) -> CutlistResult<CutlistConfig> {
    let content = fs::read_to_string(path).map_err(|e| CutlistError::Config {
        message: format!("cannot read {}: {}", path.display(), e),
    })?;
    info!("Loading configuration from {}", path.display());
    parse_config(&content).map_err(|e| match e {
        CutlistError::Config { message } => CutlistError::Config {
            message: format!("{}: {}", path.display(), message),
        },
        other => other,
    })
}

pub fn parse_config(content: &str) -> CutlistResult<CutlistConfig> {
    toml::from_str(content).map_err(|e| CutlistError::Config {
        message: e.to_string(),
    })
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> CutlistResult<T> {
    value.trim().parse().map_err(|_| CutlistError::Config {
        message: format!("invalid value for {}: {:?}", key, value),
    })
}

/// Apply recognised `CUTLIST_*` variables; returns how many were applied
pub fn apply_env_overrides<I>(config: &mut CutlistConfig, vars: I) -> CutlistResult<usize>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut applied = 0;
    for (key, value) in vars {
        match key.as_str() {
            "CUTLIST_FFMPEG" => config.encoder.ffmpeg_path = value.clone(),
            "CUTLIST_FFPROBE" => config.encoder.ffprobe_path = value.clone(),
            "CUTLIST_VIDEO_CODEC" => config.encoder.video_codec = value.clone(),
            "CUTLIST_CRF" => config.encoder.crf = parse_var(&key, &value)?,
            "CUTLIST_SCRATCH_DIR" => config.export.scratch_dir = Some(PathBuf::from(&value)),
            "CUTLIST_WORKERS" => config.export.workers = parse_var(&key, &value)?,
            "CUTLIST_LOG_LEVEL" => config.logging.level = value.clone(),
            _ => continue,
        }
        debug!("Environment override {} = {}", key, value);
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [encoder]
            crf = 23

            [smart_cut]
            margin = 3.0

            [transitions.sounds]
            flash = "sounds/flash.wav"
            "#,
        )
        .unwrap();
        assert_eq!(config.encoder.crf, 23);
        assert_eq!(config.encoder.preset, "medium");
        assert_eq!(config.smart_cut.margin, 3.0);
        assert_eq!(config.concat.batch_size, 25);
        assert_eq!(config.transitions.sounds.len(), 1);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            parse_config("[encoder\ncrf = "),
            Err(CutlistError::Config { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CutlistConfig::default();
        let applied = apply_env_overrides(
            &mut config,
            vars(&[
                ("CUTLIST_CRF", "28"),
                ("CUTLIST_WORKERS", "3"),
                ("CUTLIST_FFMPEG", "/opt/ffmpeg/bin/ffmpeg"),
                ("HOME", "/root"),
            ]),
        )
        .unwrap();
        assert_eq!(applied, 3);
        assert_eq!(config.encoder.crf, 28);
        assert_eq!(config.export.workers, 3);
        assert_eq!(config.encoder.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let mut config = CutlistConfig::default();
        assert!(apply_env_overrides(&mut config, vars(&[("CUTLIST_CRF", "high")])).is_err());
    }

    #[test]
    fn test_load_file_round_trips_serialized_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cutlist.toml");
        let mut config = CutlistConfig::default();
        config.concat.batch_size = 10;
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(load_file(&path).unwrap(), config);
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let adapter = TomlConfigAdapter::new(Some(PathBuf::from("/nonexistent/cutlist.toml")));
        assert!(adapter.load().is_err());
    }
}
