//! Completer registry, instance cache, and default-engine selection.
//!
//! The registry of constructors is fixed at construction; instances are
//! built lazily on first request and cached for the manager's lifetime so
//! dictionaries and model state stay loaded across layout switches.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::core::backends::{
    DictionaryBackend, FuzzyBackend, PipeBackend, PredictiveBackend, TransliterationBackend,
};
use crate::core::completer::{Completer, CompleterRef};
use crate::core::error::{CompletionError, EngineInitError};

/// Environment override naming the engine to force. Used by tests and
/// development shells; takes precedence over the configured default.
pub const COMPLETER_ENV: &str = "KLAVIS_COMPLETER";

/// Engine tried last when nothing else constructs.
const FALLBACK_ENGINE: &str = DictionaryBackend::NAME;

type Constructor = Box<dyn Fn() -> Result<CompleterRef, EngineInitError> + Send>;

fn into_ref<C: Completer + 'static>(completer: C) -> CompleterRef {
    Arc::new(Mutex::new(completer))
}

/// The resolved binding of an engine instance to a language, handed to the
/// shell on a layout switch. The underlying completer stays cached; the
/// info itself is owned by the caller.
pub struct CompletionInfo {
    pub completer: CompleterRef,
    pub lang: String,
    pub region: Option<String>,
    pub display_name: String,
}

pub struct CompleterManager {
    registry: HashMap<&'static str, Constructor>,
    cache: HashMap<String, CompleterRef>,
    default: Option<String>,
}

impl CompleterManager {
    /// Build the registry from configuration and resolve the default
    /// engine.
    pub fn new(settings: &Settings) -> Self {
        let mut registry: HashMap<&'static str, Constructor> = HashMap::new();

        let dirs = settings.dictionary_search_dirs();
        let max = settings.completion.max_completions;
        registry.insert(
            DictionaryBackend::NAME,
            Box::new(move || DictionaryBackend::new(dirs.clone(), max).map(into_ref)),
        );

        let scheme = settings.transliteration.scheme.clone();
        registry.insert(
            TransliterationBackend::NAME,
            Box::new(move || TransliterationBackend::new(&scheme, max).map(into_ref)),
        );

        let resource_dir = settings.predict_resource_dir();
        let user_dir = settings.predict_user_dir();
        registry.insert(
            PredictiveBackend::NAME,
            Box::new(move || {
                PredictiveBackend::new(resource_dir.clone(), user_dir.clone(), max).map(into_ref)
            }),
        );

        let command = settings.pipe.command.clone();
        registry.insert(
            PipeBackend::NAME,
            Box::new(move || PipeBackend::new(&command).map(into_ref)),
        );

        let word_list = std::path::PathBuf::from(&settings.fuzzy.word_list);
        let matcher = settings.fuzzy.matcher.clone();
        let max_results = settings.fuzzy.max_results;
        registry.insert(
            FuzzyBackend::NAME,
            Box::new(move || {
                FuzzyBackend::new(word_list.clone(), matcher.clone(), max_results).map(into_ref)
            }),
        );

        let mut manager = Self {
            registry,
            cache: HashMap::new(),
            default: None,
        };
        manager.resolve_default(settings.completion.default_engine.as_deref());
        manager
    }

    /// Look up a cached instance or construct one from the registry.
    pub fn get_or_init(&mut self, name: &str) -> Result<CompleterRef, EngineInitError> {
        if let Some(completer) = self.cache.get(name) {
            return Ok(completer.clone());
        }
        let constructor = self
            .registry
            .get(name)
            .ok_or_else(|| EngineInitError::NotFound(name.to_string()))?;
        let completer = constructor()?;
        self.cache.insert(name.to_string(), completer.clone());
        debug!(engine = name, "completer initialized");
        Ok(completer)
    }

    /// Re-resolve the default engine: environment override, then the
    /// configured default, then the hard-coded fallback. If nothing
    /// constructs, completion stays disabled.
    pub fn resolve_default(&mut self, configured: Option<&str>) {
        let env_override = std::env::var(COMPLETER_ENV).ok();
        self.resolve_default_from(env_override.as_deref(), configured);
    }

    fn resolve_default_from(&mut self, env_override: Option<&str>, configured: Option<&str>) {
        for name in [env_override, configured, Some(FALLBACK_ENGINE)]
            .into_iter()
            .flatten()
        {
            match self.get_or_init(name) {
                Ok(_) => {
                    debug!(engine = name, "default completer selected");
                    self.default = Some(name.to_string());
                    return;
                }
                Err(e) => warn!(engine = name, error = %e, "completer unavailable, trying next"),
            }
        }
        warn!("no completion engine available; completion disabled");
        self.default = None;
    }

    /// The default completer, if one resolved.
    pub fn default_completer(&self) -> Option<CompleterRef> {
        self.default
            .as_ref()
            .and_then(|name| self.cache.get(name))
            .cloned()
    }

    /// Resolve `engine` for a layout: construct or fetch it, switch it to
    /// the requested language, and bundle the result.
    pub fn get_info(
        &mut self,
        engine: &str,
        lang: &str,
        region: Option<&str>,
    ) -> Result<CompletionInfo, CompletionError> {
        let completer = self.get_or_init(engine)?;
        let display_name = {
            let mut guard = completer.lock();
            guard.set_language(lang, region)?;
            guard.display_name().unwrap_or_else(|| lang.to_string())
        };
        Ok(CompletionInfo {
            completer: completer.clone(),
            lang: lang.to_string(),
            region: region.map(str::to_string),
            display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_dictionary(dir: &Path, name: &str, words: &[&str]) {
        let mut dic = format!("{}\n", words.len());
        for w in words {
            dic.push_str(w);
            dic.push('\n');
        }
        fs::write(dir.join(format!("{name}.dic")), dic).unwrap();
        fs::write(dir.join(format!("{name}.aff")), "SET UTF-8\nTRY abcdefgh\n").unwrap();
    }

    fn settings(dir: &Path) -> Settings {
        write_dictionary(dir, "en", &["hello", "world"]);
        write_dictionary(dir, "de_DE", &["hallo", "welt"]);
        fs::write(dir.join("words"), "alpha\nbeta\n").unwrap();

        let mut settings = Settings::default();
        settings.dictionary.search_path = dir.to_string_lossy().into_owned();
        settings.fuzzy.word_list = dir.join("words").to_string_lossy().into_owned();
        settings.fuzzy.matcher = "grep -i".to_string();
        settings.pipe.command = "cat".to_string();
        settings.predictive.resource_dir = dir.to_string_lossy().into_owned();
        settings.predictive.user_data_dir =
            Some(dir.join("user").to_string_lossy().into_owned());
        settings
    }

    #[test]
    fn test_get_or_init_caches_instances() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CompleterManager::new(&settings(dir.path()));

        let first = manager.get_or_init("dictionary").unwrap();
        let second = manager.get_or_init("dictionary").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_engine_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CompleterManager::new(&settings(dir.path()));
        assert!(matches!(
            manager.get_or_init("x"),
            Err(EngineInitError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_info_unknown_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CompleterManager::new(&settings(dir.path()));
        assert!(matches!(
            manager.get_info("unknown-engine", "en", None),
            Err(CompletionError::Init(EngineInitError::NotFound(_)))
        ));
    }

    #[test]
    fn test_get_info_binds_language_and_display_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CompleterManager::new(&settings(dir.path()));

        let info = manager.get_info("dictionary", "de", Some("DE")).unwrap();
        assert_eq!(info.lang, "de");
        assert_eq!(info.region.as_deref(), Some("DE"));
        // the dictionary backend has no display name of its own
        assert_eq!(info.display_name, "de");

        let info = manager.get_info("transliteration", "hi", None).unwrap();
        assert_eq!(info.display_name, "देवनागरी");
    }

    #[test]
    fn test_get_info_language_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CompleterManager::new(&settings(dir.path()));
        assert!(matches!(
            manager.get_info("dictionary", "fr", None),
            Err(CompletionError::Language(_))
        ));
    }

    #[test]
    fn test_default_resolution_prefers_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CompleterManager::new(&settings(dir.path()));
        manager.resolve_default_from(Some("fuzzy"), Some("dictionary"));
        let default = manager.default_completer().unwrap();
        assert_eq!(default.lock().name(), "fuzzy");
    }

    #[test]
    fn test_default_resolution_falls_through_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = settings(dir.path());
        cfg.pipe.command = String::new();
        let mut manager = CompleterManager::new(&cfg);
        // the configured engine cannot construct; the fallback wins
        manager.resolve_default_from(None, Some("pipe"));
        let default = manager.default_completer().unwrap();
        assert_eq!(default.lock().name(), "dictionary");
    }

    #[test]
    fn test_all_failures_disable_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Settings::default();
        cfg.dictionary.search_path = dir.path().join("empty").to_string_lossy().into_owned();
        cfg.pipe.command = String::new();
        cfg.fuzzy.word_list = dir.path().join("missing").to_string_lossy().into_owned();
        cfg.predictive.resource_dir = dir.path().join("missing").to_string_lossy().into_owned();
        let mut manager = CompleterManager::new(&cfg);
        manager.resolve_default_from(None, Some("pipe"));
        assert!(manager.default_completer().is_none());
    }

    #[test]
    fn test_default_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CompleterManager::new(&settings(dir.path()));
        manager.resolve_default_from(None, Some("pipe"));
        let default = manager.default_completer().unwrap();
        assert_eq!(default.lock().name(), "pipe");
    }
}
