//! N-gram prediction models.
//!
//! Two stores back the predictive engine: a read-only system model shipped
//! per language (`database_<lang>.db`) and a writable per-user model
//! (`lm_<lang>.db`) that learns from committed text. Both are versioned
//! binary files: a 4-byte magic and a little-endian u32 version, then a
//! bincode payload.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

const SYSTEM_MAGIC: &[u8; 4] = b"KLDB";
const USER_MAGIC: &[u8; 4] = b"KLUM";
const VERSION: u32 = 1;

/// Errors that can occur during model load, save, or lookup.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid model file: {0}")]
    Format(String),

    #[error("model serialization failed")]
    Codec(#[from] bincode::Error),
}

type Result<T> = std::result::Result<T, PredictError>;

fn write_header(w: &mut impl Write, magic: &[u8; 4]) -> Result<()> {
    w.write_all(magic)?;
    w.write_all(&VERSION.to_le_bytes())?;
    Ok(())
}

fn read_header(r: &mut impl Read, magic: &[u8; 4]) -> Result<()> {
    let mut found = [0u8; 4];
    r.read_exact(&mut found)?;
    if &found != magic {
        return Err(PredictError::Format(format!(
            "invalid magic: expected {}",
            String::from_utf8_lossy(magic)
        )));
    }
    let mut buf4 = [0u8; 4];
    r.read_exact(&mut buf4)?;
    let version = u32::from_le_bytes(buf4);
    if version != VERSION {
        return Err(PredictError::Format(format!(
            "unsupported version: {version}"
        )));
    }
    Ok(())
}

/// Entry in a word's follower distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigramEntry {
    pub word: String,
    pub count: u32,
}

/// The read-only per-language system model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemModel {
    /// Unigrams sorted by word for prefix range scans.
    unigrams: Vec<(String, u32)>,
    /// word -> followers, most frequent first.
    bigrams: HashMap<String, Vec<BigramEntry>>,
}

impl SystemModel {
    /// Build a model from raw counts. Used by the model-build tooling and
    /// by tests; runtime code loads the binary file instead.
    pub fn from_counts(
        unigrams: Vec<(String, u32)>,
        bigrams: Vec<(String, String, u32)>,
    ) -> Self {
        let mut unigrams = unigrams;
        unigrams.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        unigrams.dedup_by(|b, a| a.0 == b.0);

        let mut map: HashMap<String, Vec<BigramEntry>> = HashMap::new();
        for (first, second, count) in bigrams {
            map.entry(first)
                .or_default()
                .push(BigramEntry { word: second, count });
        }
        for followers in map.values_mut() {
            followers.sort_unstable_by(|a, b| b.count.cmp(&a.count).then(a.word.cmp(&b.word)));
        }
        Self {
            unigrams,
            bigrams: map,
        }
    }

    /// Load a system model from `database_<lang>.db`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut r = BufReader::new(file);
        read_header(&mut r, SYSTEM_MAGIC)?;
        let model: SystemModel = bincode::deserialize_from(&mut r)?;
        debug!(
            path = %path.as_ref().display(),
            unigrams = model.unigrams.len(),
            "system model loaded"
        );
        Ok(model)
    }

    /// Save the model to a binary file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        write_header(&mut w, SYSTEM_MAGIC)?;
        bincode::serialize_into(&mut w, self)?;
        w.flush()?;
        Ok(())
    }

    /// Unigrams whose word starts with `prefix` (all unigrams when empty).
    fn prefix_range(&self, prefix: &str) -> &[(String, u32)] {
        let start = self
            .unigrams
            .partition_point(|(w, _)| w.as_str() < prefix);
        let len = self.unigrams[start..].partition_point(|(w, _)| w.starts_with(prefix));
        &self.unigrams[start..start + len]
    }

    fn followers(&self, word: &str) -> &[BigramEntry] {
        self.bigrams.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.unigrams.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserData {
    words: HashMap<String, u32>,
    pairs: HashMap<String, HashMap<String, u32>>,
}

/// The writable per-user model (`lm_<lang>.db`).
///
/// Counts are recorded as the user commits text and written back with an
/// explicit `save`; the dirty flag avoids rewriting an unchanged file.
#[derive(Debug)]
pub struct UserModel {
    path: PathBuf,
    data: UserData,
    dirty: bool,
}

impl UserModel {
    /// Open a user model, starting empty if the file does not exist yet.
    /// The file is only created on the first `save`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let file = File::open(&path)?;
            let mut r = BufReader::new(file);
            read_header(&mut r, USER_MAGIC)?;
            bincode::deserialize_from(&mut r)?
        } else {
            UserData::default()
        };
        Ok(Self {
            path,
            data,
            dirty: false,
        })
    }

    /// Record a committed word and, when known, the word preceding it.
    pub fn record(&mut self, previous: Option<&str>, word: &str) {
        if word.is_empty() {
            return;
        }
        *self.data.words.entry(word.to_string()).or_insert(0) += 1;
        if let Some(prev) = previous.filter(|p| !p.is_empty()) {
            *self
                .data
                .pairs
                .entry(prev.to_string())
                .or_default()
                .entry(word.to_string())
                .or_insert(0) += 1;
        }
        self.dirty = true;
    }

    /// Write the model back to disk if it changed since load/save.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let file = File::create(&self.path)?;
        let mut w = BufWriter::new(file);
        write_header(&mut w, USER_MAGIC)?;
        bincode::serialize_into(&mut w, &self.data)?;
        w.flush()?;
        self.dirty = false;
        debug!(path = %self.path.display(), words = self.data.words.len(), "user model saved");
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn words_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, u32)> + 'a {
        self.data
            .words
            .iter()
            .filter(move |(w, _)| w.starts_with(prefix))
            .map(|(w, c)| (w.as_str(), *c))
    }

    fn followers<'a>(&'a self, word: &str) -> impl Iterator<Item = (&'a str, u32)> + 'a {
        self.data
            .pairs
            .get(word)
            .into_iter()
            .flat_map(|m| m.iter().map(|(w, c)| (w.as_str(), *c)))
    }
}

/// Weight applied to user-model counts when merged with system counts.
const USER_WEIGHT: u64 = 16;
/// Weight applied to counts matching the word before the cursor.
const CONTEXT_WEIGHT: u64 = 4;

/// Combined system + user predictor for one language.
#[derive(Debug)]
pub struct Predictor {
    system: SystemModel,
    user: UserModel,
}

impl Predictor {
    pub fn new(system: SystemModel, user: UserModel) -> Self {
        Self { system, user }
    }

    pub fn user_mut(&mut self) -> &mut UserModel {
        &mut self.user
    }

    /// Predict completions of `prefix` — or next words when `prefix` is
    /// empty — given the word before the cursor. Results are ranked by
    /// merged count, capped at `limit`, and never echo the bare prefix.
    pub fn predict(&self, context: Option<&str>, prefix: &str, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(String, u64)> = Vec::new();
        let bump = |scored: &mut Vec<(String, u64)>, word: &str, score: u64| {
            if word == prefix {
                return;
            }
            match scored.iter_mut().find(|(w, _)| w == word) {
                Some((_, s)) => *s += score,
                None => scored.push((word.to_string(), score)),
            }
        };

        if let Some(prev) = context.filter(|p| !p.is_empty()) {
            for entry in self.system.followers(prev) {
                if entry.word.starts_with(prefix) {
                    bump(&mut scored, &entry.word, entry.count as u64 * CONTEXT_WEIGHT);
                }
            }
            for (word, count) in self.user.followers(prev) {
                if word.starts_with(prefix) {
                    bump(&mut scored, word, count as u64 * CONTEXT_WEIGHT * USER_WEIGHT);
                }
            }
        }

        for (word, count) in self.system.prefix_range(prefix) {
            bump(&mut scored, word, *count as u64);
        }
        for (word, count) in self.user.words_with_prefix(prefix) {
            bump(&mut scored, word, count as u64 * USER_WEIGHT);
        }

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored.into_iter().map(|(w, _)| w).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> SystemModel {
        SystemModel::from_counts(
            vec![
                ("the".to_string(), 100),
                ("they".to_string(), 40),
                ("them".to_string(), 30),
                ("theme".to_string(), 5),
                ("world".to_string(), 50),
                ("word".to_string(), 20),
            ],
            vec![
                ("hello".to_string(), "world".to_string(), 10),
                ("hello".to_string(), "there".to_string(), 4),
            ],
        )
    }

    fn predictor(dir: &Path) -> Predictor {
        let user = UserModel::open(dir.join("lm_en.db")).unwrap();
        Predictor::new(system(), user)
    }

    #[test]
    fn test_prefix_completion_ranked_by_count() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(dir.path());
        let out = p.predict(None, "the", 3);
        assert_eq!(out, vec!["they", "them", "theme"]);
    }

    #[test]
    fn test_bare_prefix_is_never_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(dir.path());
        assert!(!p.predict(None, "the", 10).contains(&"the".to_string()));
    }

    #[test]
    fn test_context_boosts_followers() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(dir.path());
        let out = p.predict(Some("hello"), "wor", 2);
        assert_eq!(out.first().map(String::as_str), Some("world"));
    }

    #[test]
    fn test_next_word_prediction_on_empty_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(dir.path());
        let out = p.predict(Some("hello"), "", 2);
        assert_eq!(out.first().map(String::as_str), Some("world"));
    }

    #[test]
    fn test_user_model_outranks_system() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = predictor(dir.path());
        for _ in 0..10 {
            p.user_mut().record(None, "theremin");
        }
        let out = p.predict(None, "the", 1);
        assert_eq!(out, vec!["theremin"]);
    }

    #[test]
    fn test_user_model_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lm_en.db");

        let mut user = UserModel::open(&path).unwrap();
        assert!(!user.is_dirty());
        user.record(Some("good"), "morning");
        assert!(user.is_dirty());
        user.save().unwrap();
        assert!(!user.is_dirty());

        let reloaded = UserModel::open(&path).unwrap();
        assert_eq!(reloaded.followers("good").next(), Some(("morning", 1)));
    }

    #[test]
    fn test_system_model_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database_en.db");
        system().save(&path).unwrap();
        let loaded = SystemModel::load(&path).unwrap();
        assert_eq!(loaded.prefix_range("wor").len(), 2);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database_en.db");
        std::fs::write(&path, b"NOPE....junk").unwrap();
        assert!(matches!(
            SystemModel::load(&path),
            Err(PredictError::Format(_))
        ));
    }
}
