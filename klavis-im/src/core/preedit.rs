//! Preedit editing algorithms
//!
//! Pure functions over the composition buffer: symbol application,
//! codepoint-safe backspace, last-word extraction from surrounding text,
//! and capitalization templates. Buffers are plain `String`s; every
//! mutation happens at a codepoint boundary.

use super::symbol::{self, KEY_BACKSPACE, KEY_ENTER};

/// Outcome of applying one symbol to the preedit buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOutcome {
    /// The symbol finished the word; the carried text should be committed
    /// and the preedit reset by the caller.
    Handled(String),
    /// The buffer changed and composition continues.
    Composing,
    /// A raw key the preedit does not interpret; nothing changed.
    Unhandled,
}

/// Apply one symbol to `preedit`.
///
/// Backspace removes the trailing codepoint; Enter appends a newline and
/// commits; a word separator commits the buffer with one trailing space;
/// any other raw key is left to the caller.
pub fn apply_symbol(preedit: &mut String, sym: &str) -> SymbolOutcome {
    match sym {
        KEY_BACKSPACE => {
            if preedit.pop().is_none() {
                return SymbolOutcome::Unhandled;
            }
            SymbolOutcome::Composing
        }
        KEY_ENTER => {
            preedit.push('\n');
            SymbolOutcome::Handled(preedit.clone())
        }
        _ if symbol::is_raw_key(sym) => SymbolOutcome::Unhandled,
        _ => {
            let (is_separator, is_whitespace) = symbol::word_separator(sym);
            preedit.push_str(sym);
            if is_separator {
                if !is_whitespace {
                    preedit.push(' ');
                }
                SymbolOutcome::Handled(preedit.clone())
            } else {
                SymbolOutcome::Composing
            }
        }
    }
}

/// Extract the word an editor cursor sits directly after.
///
/// Returns `None` when `text` is empty or ends in a separator (no open
/// word). Otherwise returns the text up to and including the nearest
/// separator (`None` when the whole string is one word) and the word
/// itself.
pub fn grab_last_word(text: &str) -> Option<(Option<String>, String)> {
    let last = text.chars().next_back()?;
    if symbol::is_separator_char(last) {
        return None;
    }
    match text.rfind(symbol::is_separator_char) {
        Some(pos) => {
            let sep_end = pos + text[pos..].chars().next().map_or(0, char::len_utf8);
            Some((Some(text[..sep_end].to_string()), text[sep_end..].to_string()))
        }
        None => Some((None, text.to_string())),
    }
}

/// Re-case `words` so each matches the casing pattern of `template`.
///
/// Codepoint `i` of a word follows the case of codepoint `i` of the
/// template; positions past the template's end are copied unchanged.
/// Caseless template positions leave the word untouched, so caseless
/// scripts degrade to the identity transform.
pub fn capitalize_by_template(template: &str, words: &[String]) -> Vec<String> {
    if template.is_empty() {
        return words.to_vec();
    }
    let pattern: Vec<char> = template.chars().collect();
    words
        .iter()
        .map(|word| {
            let mut out = String::with_capacity(word.len());
            for (i, ch) in word.chars().enumerate() {
                match pattern.get(i) {
                    Some(t) if t.is_uppercase() => out.extend(ch.to_uppercase()),
                    Some(t) if t.is_lowercase() => out.extend(ch.to_lowercase()),
                    _ => out.push(ch),
                }
            }
            out
        })
        .collect()
}
