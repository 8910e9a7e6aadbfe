use std::path::{Path, PathBuf};

use autospark_core::MixConfig;

#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub mix: MixConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to the platform cache directory
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, dir: None }
    }
}

impl CacheConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("autospark")
        })
    }
}

fn default_true() -> bool {
    true
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autospark")
        .join("config.toml")
}

/// Read `path` (or the default location). Missing or broken files give defaults.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    match std::fs::read_to_string(&path) {
        Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "Ignoring unparsable config: {e}");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use autospark_core::TempoSource;

    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.mix, MixConfig::default());
        assert!(config.cache.enabled);
        assert!(config.cache.dir.is_none());
    }

    #[test]
    fn test_partial_mix_table() {
        let config: AppConfig = toml::from_str(
            r#"
            [mix]
            sample_rate = 48000
            headroom_db = -6.0
            tempo_source = "instrument"

            [cache]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.mix.sample_rate, 48000);
        assert_eq!(config.mix.headroom_db, -6.0);
        assert_eq!(config.mix.vocal_input_db, -4.0);
        assert_eq!(config.mix.tempo_source, TempoSource::Instrument);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = load_config(Some(Path::new("/no/such/autospark.toml")));
        assert_eq!(config.mix.bit_depth, 16);
    }
}
