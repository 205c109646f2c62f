//! Fuzzy-match completion backend.
//!
//! Filters a static word list through an external fuzzy matcher (fzf by
//! default) in a small shell pipeline capped by `head`. A new query first
//! terminates the previous pipeline with SIGTERM; result delivery is gated
//! on a per-query generation stamp, so a just-superseded pipeline's late
//! exit can neither publish stale completions nor clobber the newer
//! query's tracked pid.

use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::warn;

use crate::core::completer::{Completer, CompleterCore};
use crate::core::error::{EngineInitError, LanguageError};

pub struct FuzzyBackend {
    core: CompleterCore,
    word_list: PathBuf,
    matcher: String,
    max_results: usize,
    generation: Arc<AtomicU64>,
    /// Pid of the most recent pipeline, kept only so the next query can
    /// terminate it.
    current_pid: Arc<Mutex<Option<i32>>>,
    utf8_warned: Arc<AtomicBool>,
}

impl FuzzyBackend {
    pub const NAME: &'static str = "fuzzy";

    pub fn new(
        word_list: PathBuf,
        matcher: String,
        max_results: usize,
    ) -> Result<Self, EngineInitError> {
        let words = shlex::split(&matcher).unwrap_or_default();
        let Some(program) = words.first() else {
            return Err(EngineInitError::EmptyCommand);
        };
        if !super::resolve_executable(program) {
            return Err(EngineInitError::MissingExecutable(program.clone()));
        }
        if !word_list.is_file() {
            return Err(EngineInitError::MissingWordList(
                word_list.display().to_string(),
            ));
        }
        Ok(Self {
            core: CompleterCore::new(Self::NAME),
            word_list,
            matcher,
            max_results,
            generation: Arc::new(AtomicU64::new(0)),
            current_pid: Arc::new(Mutex::new(None)),
            utf8_warned: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Completer for FuzzyBackend {
    fn core(&self) -> &CompleterCore {
        &self.core
    }

    fn set_language(&mut self, lang: &str, region: Option<&str>) -> Result<(), LanguageError> {
        // the word list is shared across languages
        self.core.set_language_tag(lang, region);
        Ok(())
    }

    /// A commit invalidates any pipeline still in flight; its late results
    /// would be for a word that no longer exists.
    fn on_commit(&mut self, _text: &str) {
        let mut slot = self.current_pid.lock();
        if let Some(pid) = slot.take() {
            let _ = signal::kill(Pid::from_raw(pid), Signal::SIGTERM);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn refresh(&mut self) -> bool {
        // terminate the previous pipeline before starting a new one
        if let Some(pid) = *self.current_pid.lock() {
            let _ = signal::kill(Pid::from_raw(pid), Signal::SIGTERM);
        }

        let preedit = self.core.preedit();
        if preedit.is_empty() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *self.current_pid.lock() = None;
            self.core.set_completions(None);
            return true;
        }

        let pipeline = format!(
            "{} {} < {} | head -n {}",
            self.matcher,
            super::shell_quote(&preedit),
            super::shell_quote(&self.word_list.to_string_lossy()),
            self.max_results
        );
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&pipeline)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "failed to spawn fuzzy pipeline");
                *self.current_pid.lock() = None;
                return false;
            }
        };

        let pid = child.id().map(|id| id as i32);
        *self.current_pid.lock() = pid;
        let generation = self.generation.clone();
        let this_gen = generation.fetch_add(1, Ordering::SeqCst) + 1;

        let core = self.core.clone();
        let current_pid = self.current_pid.clone();
        let utf8_warned = self.utf8_warned.clone();
        tokio::spawn(async move {
            let mut out = Vec::new();
            if let Some(mut stdout) = child.stdout.take() {
                let mut buf = [0u8; 4096];
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => out.extend_from_slice(&buf[..n]),
                        Err(e) => {
                            warn!(error = %e, "fuzzy pipeline read failed");
                            break;
                        }
                    }
                }
            }
            let mut stderr_out = Vec::new();
            if let Some(mut stderr) = child.stderr.take() {
                let _ = stderr.read_to_end(&mut stderr_out).await;
            }
            let status = child.wait().await;

            if generation.load(Ordering::SeqCst) != this_gen {
                // superseded; a stale pipeline must not touch newer state
                return;
            }
            if let Some(my_pid) = pid {
                let mut slot = current_pid.lock();
                if *slot == Some(my_pid) {
                    *slot = None;
                }
            }

            let status = match status {
                Ok(status) => status,
                Err(e) => {
                    warn!(error = %e, "failed to reap fuzzy pipeline");
                    core.set_completions(None);
                    return;
                }
            };
            if !stderr_out.is_empty() {
                warn!(
                    stderr = %String::from_utf8_lossy(&stderr_out).trim_end(),
                    "fuzzy pipeline wrote to stderr"
                );
            }
            let killed_by_us = status.signal() == Some(Signal::SIGTERM as i32);
            if !status.success() && !killed_by_us {
                warn!(status = %status, "fuzzy pipeline failed");
            }

            if status.success() && !out.is_empty() {
                match std::str::from_utf8(&out) {
                    Ok(text) => core.set_completions(Some(super::split_lines(text))),
                    Err(_) => {
                        if !utf8_warned.swap(true, Ordering::Relaxed) {
                            warn!("fuzzy pipeline produced invalid UTF-8; output discarded");
                        }
                        core.set_completions(None);
                    }
                }
            } else {
                core.set_completions(None);
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::CompleterEvent;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::{Duration, timeout};

    const WORDS: &str = "hello\nhelp\nworld\nword\nwork\n";

    fn word_list(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("words");
        std::fs::write(&path, WORDS).unwrap();
        path
    }

    fn backend(dir: &std::path::Path) -> FuzzyBackend {
        // grep stands in for fzf; the pipeline shape is identical
        FuzzyBackend::new(word_list(dir), "grep -i".to_string(), 6).unwrap()
    }

    async fn next_completions_change(rx: &mut UnboundedReceiver<CompleterEvent>) {
        timeout(Duration::from_secs(5), async {
            while let Some(ev) = rx.recv().await {
                if ev == CompleterEvent::CompletionsChanged {
                    return;
                }
            }
            panic!("event channel closed");
        })
        .await
        .expect("timed out waiting for completions");
    }

    #[test]
    fn test_missing_matcher_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FuzzyBackend::new(word_list(dir.path()), "klavis-no-such-binary".to_string(), 6),
            Err(EngineInitError::MissingExecutable(_))
        ));
    }

    #[test]
    fn test_missing_word_list_fails_construction() {
        assert!(matches!(
            FuzzyBackend::new(PathBuf::from("/no/such/words"), "grep -i".to_string(), 6),
            Err(EngineInitError::MissingWordList(_))
        ));
    }

    #[tokio::test]
    async fn test_matches_become_completions() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(dir.path());
        let mut rx = b.subscribe();
        b.set_preedit(Some("wor"));
        assert!(b.refresh());

        next_completions_change(&mut rx).await;
        let completions = b.completions().unwrap();
        assert_eq!(completions, vec!["world", "word", "work"]);
    }

    #[tokio::test]
    async fn test_no_match_clears_completions() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(dir.path());
        let mut rx = b.subscribe();
        b.set_preedit(Some("zzz"));
        assert!(b.refresh());

        next_completions_change(&mut rx).await;
        assert_eq!(b.completions(), None);
    }

    #[tokio::test]
    async fn test_superseded_query_results_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(dir.path());
        let mut rx = b.subscribe();
        b.set_preedit(Some("hel"));
        assert!(b.refresh());
        b.set_preedit(Some("wor"));
        assert!(b.refresh());

        next_completions_change(&mut rx).await;
        let completions = b.completions().unwrap();
        assert!(completions.contains(&"world".to_string()));
        assert!(!completions.contains(&"hello".to_string()));
    }

    #[tokio::test]
    async fn test_pid_cleared_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(dir.path());
        let mut rx = b.subscribe();
        b.set_preedit(Some("hel"));
        assert!(b.refresh());
        assert!(b.current_pid.lock().is_some());

        next_completions_change(&mut rx).await;
        assert!(b.current_pid.lock().is_none());
    }

    #[tokio::test]
    async fn test_results_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words");
        let many: String = (0..50).map(|i| format!("word{i}\n")).collect();
        std::fs::write(&path, many).unwrap();
        let mut b = FuzzyBackend::new(path, "grep -i".to_string(), 6).unwrap();
        let mut rx = b.subscribe();
        b.set_preedit(Some("word"));
        assert!(b.refresh());

        next_completions_change(&mut rx).await;
        assert_eq!(b.completions().unwrap().len(), 6);
    }
}
