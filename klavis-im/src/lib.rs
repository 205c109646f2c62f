//! klavis-im: the text-completion subsystem of the klavis on-screen keyboard
//!
//! A shared preedit state machine plus five pluggable completion backends
//! (dictionary spellcheck, transliteration, n-gram prediction, and two
//! external-process engines), orchestrated by a manager that caches and
//! language-switches engine instances. The OSK widget and its Wayland
//! plumbing live elsewhere; this crate speaks plain values and typed
//! events.

pub mod config;
pub mod core;

pub use config::Settings;
pub use core::completer::{Completer, CompleterCore, CompleterRef, Language};
pub use core::error::{CompletionError, EngineInitError, LanguageError};
pub use core::event::CompleterEvent;
pub use core::manager::{CompleterManager, CompletionInfo};
