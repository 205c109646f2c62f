//! Completion backend implementations.

mod dictionary;
mod fuzzy;
mod pipe;
mod predictive;
mod transliteration;

pub use dictionary::DictionaryBackend;
pub use fuzzy::FuzzyBackend;
pub use pipe::PipeBackend;
pub use predictive::PredictiveBackend;
pub use transliteration::TransliterationBackend;

use std::env;
use std::path::Path;

/// Check that `program` resolves to an executable file, either as a path or
/// through `PATH`.
pub(crate) fn resolve_executable(program: &str) -> bool {
    let path = Path::new(program);
    if path.is_absolute() || program.contains('/') {
        return path.is_file();
    }
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

/// Quote `text` for inclusion in a `sh -c` pipeline.
pub(crate) fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

/// Split command output on newlines, dropping the trailing empty element a
/// final newline produces.
pub(crate) fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}
