//! Scheme-table transliteration sessions.
//!
//! A `Scheme` is a TOML rule table mapping input sequences in one script to
//! ranked output candidates in another. `Transliterator` wraps a scheme
//! behind a numbered-request session: a caller cancels the previous request
//! id before issuing the next one, so a superseded request can never return
//! results even though the work itself runs synchronously.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::trace;

/// Errors from scheme loading and transliteration requests.
#[derive(Debug, thiserror::Error)]
pub enum TranslitError {
    #[error("no transliteration scheme for '{0}'")]
    UnknownScheme(String),

    #[error("invalid scheme table")]
    Scheme(#[from] toml::de::Error),

    #[error("request {0} superseded")]
    Superseded(u64),
}

type Result<T> = std::result::Result<T, TranslitError>;

/// Devanagari scheme embedded from data/deva.toml
const DEVA_SCHEME: &str = include_str!("../data/deva.toml");

/// A transliteration rule table.
#[derive(Debug, Clone, Deserialize)]
pub struct Scheme {
    pub name: String,
    /// Native-script name shown in engine pickers.
    pub display_name: String,
    /// Language codes this scheme serves.
    pub languages: Vec<String>,
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
struct Rule {
    seq: String,
    /// Primary output first, ranked alternates after.
    out: Vec<String>,
}

impl Scheme {
    /// Parse a scheme from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Look up a built-in scheme by scheme name or language code.
    pub fn builtin(tag: &str) -> Result<Self> {
        let scheme = Self::from_toml_str(DEVA_SCHEME)?;
        if scheme.name == tag || scheme.languages.iter().any(|l| l == tag) {
            Ok(scheme)
        } else {
            Err(TranslitError::UnknownScheme(tag.to_string()))
        }
    }
}

/// A node in the rule trie.
#[derive(Debug, Default)]
struct TrieNode {
    /// Outputs if this node terminates a rule; empty otherwise.
    outputs: Vec<String>,
    children: HashMap<char, TrieNode>,
}

impl TrieNode {
    fn insert(&mut self, seq: &str, outputs: Vec<String>) {
        let mut node = self;
        for ch in seq.chars() {
            node = node.children.entry(ch).or_default();
        }
        node.outputs = outputs;
    }

    /// Longest matching prefix of `input`, as (matched chars, outputs).
    fn search_longest(&self, input: &str) -> Option<(usize, &[String])> {
        let mut node = self;
        let mut last_match: Option<(usize, &[String])> = None;
        for (idx, ch) in input.chars().enumerate() {
            match node.children.get(&ch) {
                Some(child) => {
                    node = child;
                    if !node.outputs.is_empty() {
                        last_match = Some((idx + 1, node.outputs.as_slice()));
                    }
                }
                None => break,
            }
        }
        last_match
    }
}

/// One segment of a transliterated input.
enum Segment<'a> {
    /// Matched a rule; carries the ranked outputs.
    Rule(&'a [String]),
    /// No rule matched; the character passes through.
    Literal(char),
}

/// A transliteration session over a single scheme.
#[derive(Debug)]
pub struct Transliterator {
    scheme_name: String,
    display_name: String,
    trie: TrieNode,
    next_request: u64,
    active: Option<u64>,
}

impl Transliterator {
    pub fn from_scheme(scheme: Scheme) -> Self {
        let mut trie = TrieNode::default();
        for rule in &scheme.rules {
            trie.insert(&rule.seq, rule.out.clone());
        }
        Self {
            scheme_name: scheme.name,
            display_name: scheme.display_name,
            trie,
            next_request: 0,
            active: None,
        }
    }

    /// Create a session for a built-in scheme, looked up by scheme name or
    /// language code.
    pub fn builtin(tag: &str) -> Result<Self> {
        Ok(Self::from_scheme(Scheme::builtin(tag)?))
    }

    pub fn scheme_name(&self) -> &str {
        &self.scheme_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Open a new request and return its id. Only the most recently opened
    /// request may produce results.
    pub fn begin_request(&mut self) -> u64 {
        self.next_request += 1;
        self.active = Some(self.next_request);
        self.next_request
    }

    /// Cancel a request by id. Cancelling a request that is no longer
    /// active is a no-op.
    pub fn cancel(&mut self, request: u64) {
        if self.active == Some(request) {
            trace!(request, "transliteration request cancelled");
            self.active = None;
        }
    }

    /// Transliterate `input` under the given request id.
    ///
    /// Returns up to `limit` candidates, the primary rendering first and
    /// single-segment alternates after it. The request is consumed; a
    /// request that is not the active one yields `Superseded`.
    pub fn transliterate(&mut self, request: u64, input: &str, limit: usize) -> Result<Vec<String>> {
        if self.active != Some(request) {
            return Err(TranslitError::Superseded(request));
        }
        self.active = None;

        if limit == 0 || input.is_empty() {
            return Ok(Vec::new());
        }

        let segments = self.segment(input);
        let primary: String = segments
            .iter()
            .map(|seg| match seg {
                Segment::Rule(outputs) => outputs[0].clone(),
                Segment::Literal(ch) => ch.to_string(),
            })
            .collect();

        let mut results = vec![primary];
        // Alternates diverge from the primary at exactly one segment.
        'outer: for (i, seg) in segments.iter().enumerate() {
            let Segment::Rule(outputs) = seg else { continue };
            for alt in &outputs[1..] {
                if results.len() >= limit {
                    break 'outer;
                }
                let variant: String = segments
                    .iter()
                    .enumerate()
                    .map(|(j, seg)| match seg {
                        Segment::Rule(_) if i == j => alt.clone(),
                        Segment::Rule(outputs) => outputs[0].clone(),
                        Segment::Literal(ch) => ch.to_string(),
                    })
                    .collect();
                if !results.contains(&variant) {
                    results.push(variant);
                }
            }
        }

        results.truncate(limit);
        Ok(results)
    }

    /// Split `input` into greedy longest-match segments.
    fn segment<'a>(&'a self, input: &str) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        let mut rest = input;
        while !rest.is_empty() {
            match self.trie.search_longest(rest) {
                Some((matched, outputs)) => {
                    let bytes: usize = rest.chars().take(matched).map(char::len_utf8).sum();
                    segments.push(Segment::Rule(outputs));
                    rest = &rest[bytes..];
                }
                None => {
                    let ch = rest.chars().next().unwrap();
                    segments.push(Segment::Literal(ch));
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        segments
    }
}
