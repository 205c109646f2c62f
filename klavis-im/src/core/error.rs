//! Error taxonomy for backend construction and language switching.

/// Errors that can occur while constructing a completion backend.
#[derive(Debug, thiserror::Error)]
pub enum EngineInitError {
    #[error("unknown completion engine: '{0}'")]
    NotFound(String),

    #[error("no dictionary for '{lang}' on the search path")]
    MissingDictionary { lang: String },

    #[error("executable not found: '{0}'")]
    MissingExecutable(String),

    #[error("empty command line")]
    EmptyCommand,

    #[error("missing word list: '{0}'")]
    MissingWordList(String),

    #[error("engine init failed")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors that can occur while switching a backend's language.
#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    #[error("no model for language '{lang}'")]
    MissingModel { lang: String },

    #[error("could not prepare the user data directory")]
    UserData(#[source] std::io::Error),

    #[error("language switch failed")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Either failure mode of resolving a completer for a layout.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error(transparent)]
    Init(#[from] EngineInitError),

    #[error(transparent)]
    Language(#[from] LanguageError),
}
