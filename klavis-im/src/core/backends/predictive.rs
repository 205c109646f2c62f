//! N-gram predictive completion backend.
//!
//! Binds per-language model pairs: a read-only system database from the
//! resource directory and a writable user database created on first use of
//! a language. Predictions are scored against the text before the cursor
//! and re-cased to match the user's typed prefix.

use std::path::PathBuf;

use klavis_engine::predict::{Predictor, SystemModel, UserModel};
use tracing::{debug, warn};

use crate::core::completer::{Completer, CompleterCore};
use crate::core::error::{EngineInitError, LanguageError};
use crate::core::event::CompleterEvent;
use crate::core::preedit;
use crate::core::symbol;

pub struct PredictiveBackend {
    core: CompleterCore,
    resource_dir: PathBuf,
    user_data_dir: PathBuf,
    max_completions: usize,
    predictor: Option<Predictor>,
    active_lang: Option<String>,
}

impl PredictiveBackend {
    pub const NAME: &'static str = "predictive";

    pub fn new(
        resource_dir: PathBuf,
        user_data_dir: PathBuf,
        max_completions: usize,
    ) -> Result<Self, EngineInitError> {
        if !resource_dir.is_dir() {
            return Err(EngineInitError::Engine(Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("model resource dir {}", resource_dir.display()),
            ))));
        }
        Ok(Self {
            core: CompleterCore::new(Self::NAME),
            resource_dir,
            user_data_dir,
            max_completions,
            predictor: None,
            active_lang: None,
        })
    }

    /// Flush learned counts to the user database.
    pub fn save_user_model(&mut self) {
        if let Some(predictor) = &mut self.predictor
            && let Err(e) = predictor.user_mut().save()
        {
            warn!(error = %e, "failed to save user language model");
        }
    }

    fn run_prediction(&mut self) {
        let Some(predictor) = &self.predictor else {
            self.core.set_completions(None);
            return;
        };
        let prefix = self.core.preedit();
        let before = self.core.before_text();
        // the context word is the last complete word before the prefix
        let trimmed = before.trim_end_matches(symbol::is_separator_char);
        let context = preedit::grab_last_word(trimmed).map(|(_, word)| word.to_lowercase());
        // model entries are lowercase; the typed casing is restored below
        let raw = predictor.predict(
            context.as_deref(),
            &prefix.to_lowercase(),
            self.max_completions,
        );
        let completions = preedit::capitalize_by_template(&prefix, &raw);
        self.core.set_completions(Some(completions));
    }
}

impl Completer for PredictiveBackend {
    fn core(&self) -> &CompleterCore {
        &self.core
    }

    fn refresh(&mut self) -> bool {
        self.run_prediction();
        true
    }

    fn set_language(&mut self, lang: &str, region: Option<&str>) -> Result<(), LanguageError> {
        if self.active_lang.as_deref() == Some(lang) {
            return Ok(());
        }

        let system_path = self.resource_dir.join(format!("database_{lang}.db"));
        if !system_path.is_file() {
            return Err(LanguageError::MissingModel {
                lang: lang.to_string(),
            });
        }
        let system =
            SystemModel::load(&system_path).map_err(|e| LanguageError::Engine(Box::new(e)))?;

        std::fs::create_dir_all(&self.user_data_dir).map_err(LanguageError::UserData)?;
        let user_path = self.user_data_dir.join(format!("lm_{lang}.db"));
        let user = UserModel::open(&user_path).map_err(|e| LanguageError::Engine(Box::new(e)))?;

        // keep learned counts from the previous language
        self.save_user_model();

        self.predictor = Some(Predictor::new(system, user));
        self.active_lang = Some(lang.to_string());
        self.core.set_language_tag(lang, region);
        debug!(lang, system = %system_path.display(), "language models loaded");
        Ok(())
    }

    /// Reclaim the word the cursor sits directly after: it becomes the head
    /// of the preedit and an `Update` asks the shell to delete it from the
    /// document before prediction runs again.
    fn set_surrounding_text(&mut self, before: &str, after: &str) {
        match preedit::grab_last_word(before) {
            Some((new_before, word)) => {
                let delete_before = word.len();
                let mut new_preedit = word;
                new_preedit.push_str(&self.core.preedit());
                self.core
                    .set_surrounding(new_before.as_deref().unwrap_or(""), after);
                self.core.set_preedit(Some(&new_preedit));
                self.core.emit(CompleterEvent::Update {
                    preedit: new_preedit,
                    delete_before,
                    delete_after: 0,
                });
                self.run_prediction();
            }
            None => self.core.set_surrounding(before, after),
        }
    }

    fn on_commit(&mut self, text: &str) {
        let word = text.trim_end_matches(|c| symbol::is_separator_char(c) || c == '\n');
        if word.is_empty() {
            return;
        }
        let before = self.core.before_text();
        let trimmed = before.trim_end_matches(symbol::is_separator_char);
        let context = preedit::grab_last_word(trimmed).map(|(_, w)| w.to_lowercase());
        if let Some(predictor) = &mut self.predictor {
            predictor.user_mut().record(context.as_deref(), word);
        }
    }
}

impl Drop for PredictiveBackend {
    fn drop(&mut self) {
        self.save_user_model();
    }
}
