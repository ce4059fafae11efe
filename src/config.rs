//! Persisted settings.
//!
//! Stored as TOML at `<config dir>/config.toml`, where the config dir is
//! `$AICOMMIT_CONFIG_DIR` or the platform config dir plus `aicommit`.
//! Edits keep the file's formatting and are written atomically.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use tempfile::NamedTempFile;
use toml_edit::{DocumentMut, value};

use crate::error::ConfigError;
use crate::llm::{ChatEndpoint, ModelFilter};

/// Overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "AICOMMIT_CONFIG_DIR";

/// Diff budget (characters) when `maxToken` is unset.
pub const DEFAULT_MAX_TOKEN: usize = 128_000;

const DEVICE_ID_LENGTH: usize = 64;

pub const KEY_BASE_URL: &str = "baseURL";
pub const KEY_API_KEY: &str = "key";
pub const KEY_MODEL: &str = "model";
pub const KEY_MAX_TOKEN: &str = "maxToken";
pub const KEY_DEVICE_ID: &str = "deviceId";
pub const KEY_MODEL_EXCLUDE: &str = "modelExclude";

/// Directory holding `config.toml` and the `logs/` tree.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join("aicommit"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Split a comma-separated setting into trimmed, non-empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Uniformly random entry.
pub fn pick_random(items: &[String]) -> Option<&String> {
    items.choose(&mut rand::thread_rng())
}

/// The settings file, loaded into memory.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    doc: DocumentMut,
}

impl Settings {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(config_dir()?.join("config.toml"))
    }

    /// Load from `path`. A missing file yields empty settings.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let doc = match fs::read_to_string(&path) {
            Ok(content) => content.parse::<DocumentMut>()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DocumentMut::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw value, including an empty string.
    fn raw(&self, key: &str) -> Option<String> {
        let item = self.doc.get(key)?;
        item.as_str()
            .map(str::to_string)
            .or_else(|| item.as_integer().map(|n| n.to_string()))
    }

    /// Non-empty value of `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.raw(key).filter(|v| !v.trim().is_empty())
    }

    /// Comma-separated entries of `key`.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key).map(|v| split_list(&v)).unwrap_or_default()
    }

    /// One entry of `key`, chosen at random.
    pub fn pick(&self, key: &str) -> Option<String> {
        pick_random(&self.list(key)).cloned()
    }

    /// Store `value` under `key`; an empty value removes the key.
    pub fn set(&mut self, key: &str, new_value: &str) -> Result<(), ConfigError> {
        let trimmed = new_value.trim();
        if trimmed.is_empty() {
            self.doc.remove(key);
        } else {
            self.doc[key] = value(trimmed);
        }
        self.save()
    }

    pub fn max_token(&self) -> usize {
        self.get(KEY_MAX_TOKEN)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_TOKEN)
    }

    /// Stored device id, generating and persisting one on first use.
    pub fn device_id(&mut self) -> Result<String, ConfigError> {
        if let Some(id) = self.get(KEY_DEVICE_ID) {
            return Ok(id);
        }
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(DEVICE_ID_LENGTH)
            .map(char::from)
            .collect();
        self.set(KEY_DEVICE_ID, &id)?;
        Ok(id)
    }

    /// Model-list filter; an explicitly empty `modelExclude` disables it.
    pub fn model_filter(&self) -> ModelFilter {
        ModelFilter::from_setting(self.raw(KEY_MODEL_EXCLUDE).as_deref())
    }

    pub fn chat_endpoint(&self) -> ChatEndpoint {
        ChatEndpoint {
            base_urls: self.list(KEY_BASE_URL),
            keys: self.list(KEY_API_KEY),
            models: self.list(KEY_MODEL),
            filter: self.model_filter(),
            device_id: self.get(KEY_DEVICE_ID),
        }
    }

    fn save(&self) -> Result<(), ConfigError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(self.doc.to_string().as_bytes())?;
        tmp.persist(&self.path).map_err(|e| ConfigError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn settings_in(dir: &Path) -> Settings {
        Settings::load_from(dir.join("config.toml")).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        assert!(settings.get(KEY_MODEL).is_none());
        assert_eq!(settings.max_token(), DEFAULT_MAX_TOKEN);
        assert!(!dir.path().join("config.toml").exists());
    }

    #[test]
    fn test_set_persists_and_empty_clears() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.set(KEY_BASE_URL, " https://api.example.com/v1 ").unwrap();

        let reloaded = settings_in(dir.path());
        assert_eq!(
            reloaded.get(KEY_BASE_URL).as_deref(),
            Some("https://api.example.com/v1")
        );

        settings.set(KEY_BASE_URL, "").unwrap();
        assert!(settings_in(dir.path()).get(KEY_BASE_URL).is_none());
    }

    #[test]
    fn test_set_preserves_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "# my settings\nmodel = \"a\"\n").unwrap();

        let mut settings = Settings::load_from(&path).unwrap();
        settings.set(KEY_MAX_TOKEN, "4000").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# my settings\n"));
        assert!(content.contains("maxToken = \"4000\""));
        assert_eq!(Settings::load_from(&path).unwrap().max_token(), 4000);
    }

    #[test]
    fn test_list_and_pick() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        settings.set(KEY_API_KEY, "k1, k2,,k3").unwrap();
        assert_eq!(settings.list(KEY_API_KEY), vec!["k1", "k2", "k3"]);
        let picked = settings.pick(KEY_API_KEY).unwrap();
        assert!(["k1", "k2", "k3"].contains(&picked.as_str()));
        assert!(settings.pick(KEY_MODEL).is_none());
    }

    #[test]
    fn test_invalid_max_token_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "maxToken = \"lots\"\n").unwrap();
        assert_eq!(Settings::load_from(&path).unwrap().max_token(), DEFAULT_MAX_TOKEN);

        fs::write(&path, "maxToken = 9000\n").unwrap();
        assert_eq!(Settings::load_from(&path).unwrap().max_token(), 9000);
    }

    #[test]
    fn test_device_id_generated_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        let id = settings.device_id().unwrap();
        assert_eq!(id.len(), DEVICE_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(settings_in(dir.path()).device_id().unwrap(), id);
    }

    #[test]
    fn test_model_filter_setting() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings_in(dir.path());
        assert!(!settings.model_filter().allows("text-embedding-3"));

        fs::write(dir.path().join("config.toml"), "modelExclude = \"\"\n").unwrap();
        settings = settings_in(dir.path());
        assert!(settings.model_filter().allows("text-embedding-3"));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = [unclosed\n").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    #[serial]
    fn test_config_dir_env_override() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_var(CONFIG_DIR_ENV, Some(dir.path()), || {
            assert_eq!(config_dir().unwrap(), dir.path());
            let settings = Settings::load().unwrap();
            assert_eq!(settings.path(), dir.path().join("config.toml"));
        });
    }
}
