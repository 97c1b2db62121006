use crate::app_dirs::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// CSV path or published spreadsheet URL; the embedded list when unset.
    pub words_source: Option<String>,
    pub db_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            words_source: None,
            db_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Command-line values win over the stored file.
    pub fn with_overrides(
        mut self,
        words_source: Option<String>,
        db_path: Option<PathBuf>,
        log_level: Option<String>,
    ) -> Self {
        if words_source.is_some() {
            self.words_source = words_source;
        }
        if db_path.is_some() {
            self.db_path = db_path;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("spellathon_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        assert_eq!(cfg, store.load());
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested").join("config.json"));
        let cfg = Config {
            words_source: Some("https://example.com/words.csv".into()),
            db_path: Some(PathBuf::from("/tmp/spellathon.db")),
            log_level: "debug".into(),
        };
        store.save(&cfg).unwrap();
        assert_eq!(cfg, store.load());
    }

    #[test]
    fn missing_or_corrupt_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());

        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"words_source":"words.csv"}"#).unwrap();

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.words_source.as_deref(), Some("words.csv"));
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let cfg = Config {
            words_source: Some("a.csv".into()),
            db_path: None,
            log_level: "warn".into(),
        }
        .with_overrides(None, Some(PathBuf::from("x.db")), Some("debug".into()));

        assert_eq!(cfg.words_source.as_deref(), Some("a.csv"));
        assert_eq!(cfg.db_path, Some(PathBuf::from("x.db")));
        assert_eq!(cfg.log_level, "debug");
    }
}
