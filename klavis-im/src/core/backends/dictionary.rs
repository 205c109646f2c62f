//! Spellcheck completion backend.
//!
//! Wraps a hunspell-style lexicon resolved from a configurable search path.
//! The composed word leads the completion list when it is spelled
//! correctly, followed by a bounded suggestion list.

use std::path::PathBuf;

use klavis_engine::spell::Lexicon;
use tracing::debug;

use crate::core::completer::{Completer, CompleterCore};
use crate::core::error::{EngineInitError, LanguageError};

pub struct DictionaryBackend {
    core: CompleterCore,
    search_dirs: Vec<PathBuf>,
    max_completions: usize,
    lexicon: Lexicon,
}

impl std::fmt::Debug for DictionaryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryBackend")
            .field("core", &self.core)
            .field("search_dirs", &self.search_dirs)
            .field("max_completions", &self.max_completions)
            .finish_non_exhaustive()
    }
}

impl DictionaryBackend {
    pub const NAME: &'static str = "dictionary";

    /// Language bound at construction, before any layout switch.
    const DEFAULT_LANG: &'static str = "en";

    pub fn new(search_dirs: Vec<PathBuf>, max_completions: usize) -> Result<Self, EngineInitError> {
        let (dic, aff) = find_pair(&search_dirs, Self::DEFAULT_LANG, None).ok_or_else(|| {
            EngineInitError::MissingDictionary {
                lang: Self::DEFAULT_LANG.to_string(),
            }
        })?;
        let lexicon =
            Lexicon::load(&dic, &aff).map_err(|e| EngineInitError::Engine(Box::new(e)))?;
        let core = CompleterCore::new(Self::NAME);
        core.set_language_tag(Self::DEFAULT_LANG, None);
        Ok(Self {
            core,
            search_dirs,
            max_completions,
            lexicon,
        })
    }
}

/// Probe the search path for a `<name>.dic`/`<name>.aff` pair; first match
/// wins. Without a region, `<lang>` is tried before `<lang>_<LANG>`.
fn find_pair(
    dirs: &[PathBuf],
    lang: &str,
    region: Option<&str>,
) -> Option<(PathBuf, PathBuf)> {
    let names = match region {
        Some(region) => vec![format!("{lang}_{}", region.to_uppercase())],
        None => vec![lang.to_string(), format!("{lang}_{}", lang.to_uppercase())],
    };
    for dir in dirs {
        for name in &names {
            let dic = dir.join(format!("{name}.dic"));
            let aff = dir.join(format!("{name}.aff"));
            if dic.is_file() && aff.is_file() {
                return Some((dic, aff));
            }
        }
    }
    None
}

impl Completer for DictionaryBackend {
    fn core(&self) -> &CompleterCore {
        &self.core
    }

    fn refresh(&mut self) -> bool {
        let word = self.core.preedit();
        if word.is_empty() {
            self.core.set_completions(None);
            return true;
        }
        let mut completions = Vec::with_capacity(self.max_completions + 1);
        if self.lexicon.check(&word) {
            completions.push(word.clone());
        }
        for suggestion in self.lexicon.suggest(&word, self.max_completions) {
            if !completions.contains(&suggestion) {
                completions.push(suggestion);
            }
        }
        self.core.set_completions(Some(completions));
        true
    }

    fn set_language(&mut self, lang: &str, region: Option<&str>) -> Result<(), LanguageError> {
        let current = self.core.language();
        if current.lang == lang && current.region.as_deref() == region {
            return Ok(());
        }
        let (dic, aff) =
            find_pair(&self.search_dirs, lang, region).ok_or_else(|| LanguageError::MissingModel {
                lang: lang.to_string(),
            })?;
        self.lexicon =
            Lexicon::load(&dic, &aff).map_err(|e| LanguageError::Engine(Box::new(e)))?;
        self.core.set_language_tag(lang, region);
        debug!(lang, ?region, dic = %dic.display(), "dictionary loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    const AFF: &str = "SET UTF-8\nTRY esianrtolcdughm\nREP 1\nREP teh the\n";

    fn write_pair(dir: &Path, name: &str, words: &[&str]) {
        let mut dic = format!("{}\n", words.len());
        for w in words {
            dic.push_str(w);
            dic.push('\n');
        }
        fs::write(dir.join(format!("{name}.dic")), dic).unwrap();
        fs::write(dir.join(format!("{name}.aff")), AFF).unwrap();
    }

    fn backend(dir: &Path) -> DictionaryBackend {
        write_pair(dir, "en", &["the", "hello", "help", "world"]);
        write_pair(dir, "de_DE", &["hallo", "welt"]);
        DictionaryBackend::new(vec![dir.to_path_buf()], 3).unwrap()
    }

    #[test]
    fn test_construction_requires_a_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let err = DictionaryBackend::new(vec![dir.path().to_path_buf()], 3).unwrap_err();
        assert!(matches!(err, EngineInitError::MissingDictionary { .. }));
    }

    #[test]
    fn test_correct_word_leads_completions() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(dir.path());
        for sym in ["h", "e", "l", "l", "o"] {
            assert!(b.feed_symbol(sym));
        }
        let completions = b.completions().unwrap();
        assert_eq!(completions.first().map(String::as_str), Some("hello"));
    }

    #[test]
    fn test_misspelling_yields_suggestions() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(dir.path());
        b.set_preedit(Some("teh"));
        assert!(b.refresh());
        let completions = b.completions().unwrap();
        assert_eq!(completions.first().map(String::as_str), Some("the"));
    }

    #[test]
    fn test_language_switch_and_missing_language() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(dir.path());
        b.set_language("de", Some("DE")).unwrap();
        b.set_preedit(Some("hallo"));
        b.refresh();
        assert_eq!(
            b.completions().unwrap().first().map(String::as_str),
            Some("hallo")
        );

        let err = b.set_language("fr", None).unwrap_err();
        assert!(matches!(err, LanguageError::MissingModel { .. }));
    }

    #[test]
    fn test_language_switch_same_language_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(dir.path());
        assert!(b.set_language("en", None).is_ok());
    }

    #[test]
    fn test_empty_preedit_clears_completions() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(dir.path());
        b.set_preedit(Some("h"));
        b.refresh();
        assert!(b.completions().is_some());
        b.set_preedit(None);
        assert!(b.completions().is_none());
    }
}
