//! The polymorphic completer contract.
//!
//! Every backend embeds a [`CompleterCore`] — the shared preedit, completion
//! list, surrounding-text, and event state — and implements [`Completer`]
//! on top of it. The async backends clone the core handle into their query
//! tasks; with a single logical caller per instance the lock is
//! uncontended.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::error::LanguageError;
use super::event::{CompleterEvent, EventBus};
use super::preedit::{self, SymbolOutcome};

/// Language tag: language code plus optional region ("en" + "US").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Language {
    pub lang: String,
    pub region: Option<String>,
}

#[derive(Debug, Default)]
struct CoreState {
    preedit: String,
    completions: Option<Vec<String>>,
    before_text: String,
    after_text: String,
    language: Language,
    bus: EventBus,
}

/// Shared handle to one backend instance's state.
#[derive(Debug, Clone)]
pub struct CompleterCore {
    name: &'static str,
    state: Arc<Mutex<CoreState>>,
}

impl CompleterCore {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(CoreState::default())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn preedit(&self) -> String {
        self.state.lock().preedit.clone()
    }

    /// Replace the preedit. `None` clears it together with the current
    /// completions.
    pub fn set_preedit(&self, preedit: Option<&str>) {
        let mut state = self.state.lock();
        match preedit {
            Some(text) => {
                if state.preedit != text {
                    state.preedit = text.to_string();
                    state.bus.emit(CompleterEvent::PreeditChanged);
                }
            }
            None => {
                if !state.preedit.is_empty() {
                    state.preedit.clear();
                    state.bus.emit(CompleterEvent::PreeditChanged);
                }
                if state.completions.is_some() {
                    state.completions = None;
                    state.bus.emit(CompleterEvent::CompletionsChanged);
                }
            }
        }
    }

    pub fn completions(&self) -> Option<Vec<String>> {
        self.state.lock().completions.clone()
    }

    pub fn set_completions(&self, completions: Option<Vec<String>>) {
        let mut state = self.state.lock();
        state.completions = completions;
        state.bus.emit(CompleterEvent::CompletionsChanged);
    }

    pub fn before_text(&self) -> String {
        self.state.lock().before_text.clone()
    }

    pub fn after_text(&self) -> String {
        self.state.lock().after_text.clone()
    }

    pub fn set_surrounding(&self, before: &str, after: &str) {
        let mut state = self.state.lock();
        state.before_text = before.to_string();
        state.after_text = after.to_string();
    }

    pub fn language(&self) -> Language {
        self.state.lock().language.clone()
    }

    pub fn set_language_tag(&self, lang: &str, region: Option<&str>) {
        let mut state = self.state.lock();
        state.language = Language {
            lang: lang.to_string(),
            region: region.map(str::to_string),
        };
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CompleterEvent> {
        self.state.lock().bus.subscribe()
    }

    pub fn emit(&self, event: CompleterEvent) {
        self.state.lock().bus.emit(event);
    }

    /// Commit `text`: emit it, then reset preedit and completions.
    pub fn commit(&self, text: String) {
        trace!(completer = self.name, text = %text, "commit");
        let mut state = self.state.lock();
        state.bus.emit(CompleterEvent::CommitString { text });
        if !state.preedit.is_empty() {
            state.preedit.clear();
            state.bus.emit(CompleterEvent::PreeditChanged);
        }
        if state.completions.is_some() {
            state.completions = None;
            state.bus.emit(CompleterEvent::CompletionsChanged);
        }
    }

    /// Drive the preedit algorithms with one symbol.
    ///
    /// Returns the outcome and whether the buffer changed; a change emits
    /// `PreeditChanged`.
    pub(crate) fn apply_symbol(&self, sym: &str) -> (SymbolOutcome, bool) {
        let mut state = self.state.lock();
        let before_len = state.preedit.len();
        let outcome = preedit::apply_symbol(&mut state.preedit, sym);
        let changed = state.preedit.len() != before_len;
        if changed {
            state.bus.emit(CompleterEvent::PreeditChanged);
        }
        (outcome, changed)
    }
}

/// Reference-counted, shared completer handle held by the manager cache and
/// its callers.
pub type CompleterRef = Arc<Mutex<dyn Completer>>;

/// The contract every completion backend implements.
///
/// The async backends spawn their query tasks onto the ambient tokio
/// runtime; `feed_symbol` itself never blocks.
pub trait Completer: Send {
    /// The shared state handle backing this instance.
    fn core(&self) -> &CompleterCore;

    /// Recompute completions for the current preedit (synchronously or by
    /// starting an async query). Returns `false` only when the query could
    /// not even be started.
    fn refresh(&mut self) -> bool;

    /// Bind the backend to a language/region.
    fn set_language(&mut self, lang: &str, region: Option<&str>) -> Result<(), LanguageError>;

    /// Hook invoked with the committed text before the commit event fires.
    fn on_commit(&mut self, _text: &str) {}

    fn name(&self) -> &'static str {
        self.core().name()
    }

    /// Human-readable engine name; `None` falls back to the language tag.
    fn display_name(&self) -> Option<String> {
        None
    }

    fn preedit(&self) -> String {
        self.core().preedit()
    }

    fn set_preedit(&mut self, preedit: Option<&str>) {
        self.core().set_preedit(preedit);
    }

    fn completions(&self) -> Option<Vec<String>> {
        self.core().completions()
    }

    fn before_text(&self) -> String {
        self.core().before_text()
    }

    fn after_text(&self) -> String {
        self.core().after_text()
    }

    /// Context update from the host text field. Meaningful only to
    /// context-aware backends.
    fn set_surrounding_text(&mut self, _before: &str, _after: &str) {}

    fn subscribe(&self) -> mpsc::UnboundedReceiver<CompleterEvent> {
        self.core().subscribe()
    }

    /// Feed one symbol from the OSK.
    ///
    /// Returns `true` when the symbol was consumed — committed or used to
    /// update the composing word — and `false` when the caller should treat
    /// it as a raw keystroke.
    fn feed_symbol(&mut self, sym: &str) -> bool {
        let (outcome, changed) = self.core().apply_symbol(sym);
        match outcome {
            SymbolOutcome::Handled(text) => {
                self.on_commit(&text);
                self.core().commit(text);
                true
            }
            SymbolOutcome::Composing => {
                if changed { self.refresh() } else { true }
            }
            SymbolOutcome::Unhandled => false,
        }
    }
}
