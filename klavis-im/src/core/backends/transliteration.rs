//! Transliteration completion backend.
//!
//! Drives a scheme-table transliteration session. The literal preedit is
//! always the first candidate; ranked transliterations follow. A prior
//! in-flight request is cancelled by id before a new one is issued —
//! single-threaded ordering discipline rather than true concurrency.

use klavis_engine::translit::{TranslitError, Transliterator};
use tracing::{debug, warn};

use crate::core::completer::{Completer, CompleterCore};
use crate::core::error::{EngineInitError, LanguageError};

pub struct TransliterationBackend {
    core: CompleterCore,
    session: Transliterator,
    pending: Option<u64>,
    max_completions: usize,
}

impl TransliterationBackend {
    pub const NAME: &'static str = "transliteration";

    pub fn new(scheme: &str, max_completions: usize) -> Result<Self, EngineInitError> {
        let session =
            Transliterator::builtin(scheme).map_err(|e| EngineInitError::Engine(Box::new(e)))?;
        Ok(Self {
            core: CompleterCore::new(Self::NAME),
            session,
            pending: None,
            max_completions,
        })
    }
}

impl Completer for TransliterationBackend {
    fn core(&self) -> &CompleterCore {
        &self.core
    }

    fn display_name(&self) -> Option<String> {
        Some(self.session.display_name().to_string())
    }

    fn refresh(&mut self) -> bool {
        if let Some(prev) = self.pending.take() {
            self.session.cancel(prev);
        }
        let preedit = self.core.preedit();
        if preedit.is_empty() {
            self.core.set_completions(None);
            return true;
        }

        let request = self.session.begin_request();
        self.pending = Some(request);
        let mut completions = vec![preedit.clone()];
        match self
            .session
            .transliterate(request, &preedit, self.max_completions.saturating_sub(1))
        {
            Ok(ranked) => {
                for candidate in ranked {
                    if !completions.contains(&candidate) {
                        completions.push(candidate);
                    }
                }
            }
            Err(e) => warn!(error = %e, "transliteration failed"),
        }
        self.pending = None;
        self.core.set_completions(Some(completions));
        true
    }

    fn set_language(&mut self, lang: &str, region: Option<&str>) -> Result<(), LanguageError> {
        if self.core.language().lang == lang {
            return Ok(());
        }
        match Transliterator::builtin(lang) {
            Ok(session) => {
                self.session = session;
                self.core.set_language_tag(lang, region);
                debug!(lang, scheme = self.session.scheme_name(), "scheme selected");
                Ok(())
            }
            Err(TranslitError::UnknownScheme(_)) => Err(LanguageError::MissingModel {
                lang: lang.to_string(),
            }),
            Err(e) => Err(LanguageError::Engine(Box::new(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> TransliterationBackend {
        TransliterationBackend::new("deva", 3).unwrap()
    }

    #[test]
    fn test_unknown_scheme_fails_construction() {
        assert!(matches!(
            TransliterationBackend::new("xx", 3),
            Err(EngineInitError::Engine(_))
        ));
    }

    #[test]
    fn test_literal_preedit_is_first_candidate() {
        let mut b = backend();
        for sym in ["k", "a"] {
            assert!(b.feed_symbol(sym));
        }
        let completions = b.completions().unwrap();
        assert_eq!(completions[0], "ka");
        assert_eq!(completions[1], "क");
    }

    #[test]
    fn test_alternates_fill_remaining_slots() {
        let mut b = backend();
        b.set_preedit(Some("sha"));
        b.refresh();
        let completions = b.completions().unwrap();
        assert_eq!(completions, vec!["sha", "श", "ष"]);
    }

    #[test]
    fn test_language_switch() {
        let mut b = backend();
        assert!(b.set_language("hi", None).is_ok());
        assert!(matches!(
            b.set_language("fr", None),
            Err(LanguageError::MissingModel { .. })
        ));
    }

    #[test]
    fn test_display_name_comes_from_scheme() {
        let b = backend();
        assert_eq!(b.display_name().as_deref(), Some("देवनागरी"));
    }

    #[test]
    fn test_backspace_to_empty_clears_completions() {
        let mut b = backend();
        b.feed_symbol("k");
        assert!(b.completions().is_some());
        b.feed_symbol("KEY_BACKSPACE");
        assert!(b.completions().is_none());
    }
}
