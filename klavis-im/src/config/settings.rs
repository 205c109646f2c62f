//! Settings configuration
//!
//! Manages user-configurable settings for the completion subsystem.
//! Default values are defined in `config/default.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default configuration TOML embedded from config/default.toml
const DEFAULT_CONFIG_TOML: &str = include_str!("../../config/default.toml");

/// Configuration settings for the completion subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Engine selection and completion-bar settings
    pub completion: CompletionSettings,
    /// Dictionary (spellcheck) backend settings
    pub dictionary: DictionarySettings,
    /// Transliteration backend settings
    pub transliteration: TransliterationSettings,
    /// Predictive backend settings
    pub predictive: PredictiveSettings,
    /// External-command ("pipe") backend settings
    pub pipe: PipeSettings,
    /// Fuzzy-match backend settings
    pub fuzzy: FuzzySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// Engine used when a layout does not name one
    pub default_engine: Option<String>,
    /// Upper bound on completions returned per query
    pub max_completions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionarySettings {
    /// Colon-separated directories searched for `<lang>_<REGION>.dic/.aff`
    pub search_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransliterationSettings {
    /// Built-in scheme used until a layout switch selects one by language
    pub scheme: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveSettings {
    /// Directory holding read-only `database_<lang>.db` models
    pub resource_dir: String,
    /// Directory for writable `lm_<lang>.db` models; defaults to the
    /// per-user data directory
    pub user_data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeSettings {
    /// Shell-parsed external completion command; empty disables the engine
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzySettings {
    /// Word list filtered by the matcher
    pub word_list: String,
    /// Fuzzy matcher invocation, e.g. `fzf --filter`
    pub matcher: String,
    /// Cap on pipeline output lines
    pub max_results: usize,
}

impl Default for Settings {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("embedded default.toml must be valid")
    }
}

/// Recursively merge `overlay` TOML values on top of `base`.
fn merge_toml(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(key) {
                    merge_toml(base_value, value);
                } else {
                    base_table.insert(key.clone(), value.clone());
                }
            }
        }
        (base, _) => {
            *base = overlay.clone();
        }
    }
}

/// Parse user TOML content merged on top of default.toml.
fn parse_with_defaults(user_content: &str) -> Result<Settings> {
    let mut base: toml::Value = toml::from_str(DEFAULT_CONFIG_TOML)?;
    let user: toml::Value = toml::from_str(user_content)?;
    merge_toml(&mut base, &user);
    let settings: Settings = base.try_into()?;
    Ok(settings)
}

/// Get the project directories for klavis.
fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "klavis", "klavis")
}

impl Settings {
    /// Get the data directory path
    pub fn data_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Dictionary search path split into directories.
    pub fn dictionary_search_dirs(&self) -> Vec<PathBuf> {
        self.dictionary
            .search_path
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Directory holding read-only predictive models.
    pub fn predict_resource_dir(&self) -> PathBuf {
        PathBuf::from(&self.predictive.resource_dir)
    }

    /// Directory for writable per-user predictive models.
    ///
    /// Default: `~/.local/share/klavis/predict/`
    pub fn predict_user_dir(&self) -> PathBuf {
        match &self.predictive.user_data_dir {
            Some(dir) => PathBuf::from(dir),
            None => Self::data_dir()
                .unwrap_or_else(|| PathBuf::from(".klavis"))
                .join("predict"),
        }
    }

    /// Load settings from the default configuration file.
    /// Falls back to embedded default.toml if the config file does not exist.
    pub fn load() -> Result<Self> {
        let Some(config_file) = Self::config_file() else {
            warn!("Could not determine config directory, using defaults");
            return Ok(Self::default());
        };

        if !config_file.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        debug!("Loading config from {:?}", config_file);
        let content = fs::read_to_string(&config_file)?;
        parse_with_defaults(&content)
    }

    /// Load settings from a specific file, merged on top of defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        parse_with_defaults(&content)
    }

    /// Save settings to the default configuration file
    pub fn save(&self) -> Result<()> {
        let Some(config_file) = Self::config_file() else {
            anyhow::bail!("Could not determine config directory");
        };

        if let Some(parent) = config_file.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!("Saving config to {:?}", config_file);
        let content = toml::to_string_pretty(self)?;
        fs::write(&config_file, content)?;
        Ok(())
    }

    /// Save settings to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.completion.default_engine.as_deref(), Some("dictionary"));
        assert_eq!(settings.completion.max_completions, 3);
        assert_eq!(settings.fuzzy.max_results, 6);
        assert!(settings.pipe.command.is_empty());
    }

    #[test]
    fn test_serialize_deserialize() {
        let settings = Settings::default();
        let toml_str = toml::to_string(&settings).unwrap();
        let loaded: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            loaded.completion.max_completions,
            settings.completion.max_completions
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[completion]
default_engine = "predictive"
max_completions = 5
"#
        )
        .unwrap();

        let path = file.path().to_path_buf();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.completion.default_engine.as_deref(), Some("predictive"));
        assert_eq!(settings.completion.max_completions, 5);
    }

    #[test]
    fn test_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[fuzzy]
max_results = 10
"#
        )
        .unwrap();

        let path = file.path().to_path_buf();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.fuzzy.max_results, 10);
        // Should use defaults for unspecified values
        assert_eq!(settings.fuzzy.matcher, "fzf --filter");
        assert_eq!(settings.completion.max_completions, 3);
    }

    #[test]
    fn test_dictionary_search_dirs() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[dictionary]
search_path = "/a/b::/c"
"#
        )
        .unwrap();

        let path = file.path().to_path_buf();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(
            settings.dictionary_search_dirs(),
            vec![PathBuf::from("/a/b"), PathBuf::from("/c")]
        );
    }

    #[test]
    fn test_predict_user_dir_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[predictive]
user_data_dir = "/tmp/klavis-test"
"#
        )
        .unwrap();

        let path = file.path().to_path_buf();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.predict_user_dir(), PathBuf::from("/tmp/klavis-test"));
    }
}
