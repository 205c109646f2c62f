//! Spellcheck lexicon backed by a hunspell-style `.dic`/`.aff` pair.
//!
//! Covers exactly the surface an on-screen keyboard needs: exact membership
//! and a small ranked suggestion list. Affix rules are not expanded; the
//! `.aff` file contributes the suggestion alphabet (`TRY`) and the
//! common-mistake replacement table (`REP`).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use yada::DoubleArray;
use yada::builder::DoubleArrayBuilder;

/// Errors that can occur while loading or querying a lexicon.
#[derive(Debug, thiserror::Error)]
pub enum SpellError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid dictionary format: {0}")]
    Format(String),
}

type Result<T> = std::result::Result<T, SpellError>;

/// A replacement pair from a `REP` affix rule ("common mistake" -> fix).
#[derive(Debug, Clone)]
struct RepRule {
    from: String,
    to: String,
}

/// An in-memory spellcheck lexicon.
///
/// Word membership is answered by a double-array trie over the NFC-normalized
/// word list. Suggestions are generated from `REP` rules and edit-distance-1
/// candidates over the `TRY` alphabet, validated against the trie.
pub struct Lexicon {
    trie: DoubleArray<Vec<u8>>,
    try_chars: Vec<char>,
    rep_rules: Vec<RepRule>,
}

/// Fallback suggestion alphabet when the `.aff` file carries no `TRY` line.
const DEFAULT_TRY: &str = "esianrtolcdugmphbyfvkwz";

impl Lexicon {
    /// Load a lexicon from a `.dic`/`.aff` pair.
    pub fn load(dic_path: &Path, aff_path: &Path) -> Result<Self> {
        let (try_chars, rep_rules) = parse_affix(aff_path)?;
        let words = parse_wordlist(dic_path)?;

        let keyset: Vec<(&[u8], u32)> = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.as_bytes(), i as u32))
            .collect();
        let trie_bytes = DoubleArrayBuilder::build(&keyset)
            .ok_or_else(|| SpellError::Format("failed to build double-array trie".to_string()))?;

        debug!(
            words = words.len(),
            rep_rules = rep_rules.len(),
            "lexicon loaded"
        );

        Ok(Lexicon {
            trie: DoubleArray::new(trie_bytes),
            try_chars,
            rep_rules,
        })
    }

    /// Check whether `word` is correctly spelled.
    ///
    /// The lookup is NFC-normalized; a capitalized form of a known lowercase
    /// word ("Hello") is accepted.
    pub fn check(&self, word: &str) -> bool {
        let word: String = word.nfc().collect();
        if word.is_empty() {
            return false;
        }
        if self.contains(&word) {
            return true;
        }
        let lower = word.to_lowercase();
        lower != word && self.contains(&lower)
    }

    /// Suggest up to `limit` corrections for `word`, best first.
    ///
    /// `REP` replacements rank ahead of edit-distance-1 candidates; every
    /// suggestion is a known word and differs from the input.
    pub fn suggest(&self, word: &str, limit: usize) -> Vec<String> {
        if limit == 0 || word.is_empty() {
            return Vec::new();
        }
        let word: String = word.nfc().collect();
        let lower = word.to_lowercase();
        let mut suggestions: Vec<String> = Vec::new();

        let push = |candidate: String, suggestions: &mut Vec<String>| {
            if candidate != word
                && candidate != lower
                && !suggestions.contains(&candidate)
                && self.contains(&candidate)
            {
                suggestions.push(candidate);
            }
        };

        for rule in &self.rep_rules {
            if suggestions.len() >= limit {
                break;
            }
            let mut start = 0;
            while let Some(pos) = lower[start..].find(&rule.from) {
                let at = start + pos;
                let mut candidate = String::with_capacity(lower.len());
                candidate.push_str(&lower[..at]);
                candidate.push_str(&rule.to);
                candidate.push_str(&lower[at + rule.from.len()..]);
                push(candidate, &mut suggestions);
                start = at + rule.from.len();
                if suggestions.len() >= limit {
                    break;
                }
            }
        }

        for candidate in self.edits1(&lower) {
            if suggestions.len() >= limit {
                break;
            }
            push(candidate, &mut suggestions);
        }

        suggestions.truncate(limit);
        suggestions
    }

    fn contains(&self, word: &str) -> bool {
        self.trie.exact_match_search(word.as_bytes()).is_some()
    }

    /// All strings one edit away from `word`: deletions, transpositions,
    /// then substitutions and insertions over the `TRY` alphabet.
    fn edits1(&self, word: &str) -> Vec<String> {
        let chars: Vec<char> = word.chars().collect();
        let mut out = Vec::new();

        for i in 0..chars.len() {
            let mut c = chars.clone();
            c.remove(i);
            out.push(c.into_iter().collect());
        }
        for i in 0..chars.len().saturating_sub(1) {
            let mut c = chars.clone();
            c.swap(i, i + 1);
            out.push(c.into_iter().collect());
        }
        for i in 0..chars.len() {
            for &t in &self.try_chars {
                if t != chars[i] {
                    let mut c = chars.clone();
                    c[i] = t;
                    out.push(c.into_iter().collect());
                }
            }
        }
        for i in 0..=chars.len() {
            for &t in &self.try_chars {
                let mut c = chars.clone();
                c.insert(i, t);
                out.push(c.into_iter().collect());
            }
        }
        out
    }
}

/// Parse the `TRY` alphabet and `REP` table from a `.aff` file.
///
/// Unknown directives are skipped; hunspell affix files carry far more than
/// we consume.
fn parse_affix(path: &Path) -> Result<(Vec<char>, Vec<RepRule>)> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut try_chars: Vec<char> = DEFAULT_TRY.chars().collect();
    let mut rep_rules = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("TRY") => {
                if let Some(alphabet) = fields.next() {
                    try_chars = alphabet.nfc().collect();
                }
            }
            Some("REP") => {
                // the "REP <count>" header has a numeric second field
                if let (Some(from), Some(to)) = (fields.next(), fields.next()) {
                    rep_rules.push(RepRule {
                        from: from.nfc().collect(),
                        to: to.nfc().collect(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok((try_chars, rep_rules))
}

/// Parse the word list from a `.dic` file.
///
/// The first line is the entry count; affix flags after `/` and morphological
/// fields after a tab are stripped. Words are NFC-normalized, sorted, and
/// deduplicated for the trie builder.
fn parse_wordlist(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut words: Vec<String> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let entry = line
            .split(['/', '\t'])
            .next()
            .unwrap_or_default()
            .trim();
        if entry.is_empty() {
            continue;
        }
        if idx == 0 && entry.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        words.push(entry.nfc().collect());
    }
    if words.is_empty() {
        return Err(SpellError::Format("empty word list".to_string()));
    }

    words.sort_unstable();
    words.dedup();
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_pair(dir: &Path, words: &str, aff: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dic = dir.join("test.dic");
        let aff_path = dir.join("test.aff");
        let mut f = File::create(&dic).unwrap();
        write!(f, "{}", words).unwrap();
        let mut f = File::create(&aff_path).unwrap();
        write!(f, "{}", aff).unwrap();
        (dic, aff_path)
    }

    fn sample() -> (tempfile::TempDir, Lexicon) {
        let dir = tempfile::tempdir().unwrap();
        let (dic, aff) = write_pair(
            dir.path(),
            "5\nhello/S\nhelp\nworld\nword\nshell\n",
            "SET UTF-8\nTRY esianrtolcdugmphbyfvkwzESIANRTOLCDUGMPHBYFVKWZ'\nREP 1\nREP wrold world\n",
        );
        let lexicon = Lexicon::load(&dic, &aff).unwrap();
        (dir, lexicon)
    }

    #[test]
    fn test_check_membership() {
        let (_dir, lexicon) = sample();
        assert!(lexicon.check("hello"));
        assert!(lexicon.check("world"));
        assert!(!lexicon.check("helo"));
        assert!(!lexicon.check(""));
    }

    #[test]
    fn test_check_capitalized() {
        let (_dir, lexicon) = sample();
        assert!(lexicon.check("Hello"));
    }

    #[test]
    fn test_flags_are_stripped() {
        let (_dir, lexicon) = sample();
        // "hello/S" is stored as "hello"
        assert!(lexicon.check("hello"));
        assert!(!lexicon.check("hello/S"));
    }

    #[test]
    fn test_suggest_edit_distance_one() {
        let (_dir, lexicon) = sample();
        let suggestions = lexicon.suggest("helo", 3);
        assert!(suggestions.contains(&"hello".to_string()) || suggestions.contains(&"help".to_string()));
    }

    #[test]
    fn test_suggest_rep_rule_first() {
        let (_dir, lexicon) = sample();
        let suggestions = lexicon.suggest("wrold", 3);
        assert_eq!(suggestions.first().map(String::as_str), Some("world"));
    }

    #[test]
    fn test_suggest_excludes_input() {
        let (_dir, lexicon) = sample();
        let suggestions = lexicon.suggest("word", 3);
        assert!(!suggestions.contains(&"word".to_string()));
    }

    #[test]
    fn test_suggest_limit() {
        let (_dir, lexicon) = sample();
        assert!(lexicon.suggest("word", 1).len() <= 1);
        assert!(lexicon.suggest("word", 0).is_empty());
    }

    #[test]
    fn test_empty_wordlist_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (dic, aff) = write_pair(dir.path(), "0\n", "SET UTF-8\n");
        assert!(matches!(
            Lexicon::load(&dic, &aff),
            Err(SpellError::Format(_))
        ));
    }
}
