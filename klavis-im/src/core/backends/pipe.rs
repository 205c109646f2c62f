//! External-command completion backend ("pipe").
//!
//! Each query spawns the configured command, writes the full preedit to its
//! stdin, and reads newline-separated completions from its stdout. At most
//! one query is in flight: a new query cancels the previous one's token,
//! and every query carries a generation stamp compared before results are
//! published, so a superseded query can never surface late completions.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::completer::{Completer, CompleterCore};
use crate::core::error::{EngineInitError, LanguageError};

pub struct PipeBackend {
    core: CompleterCore,
    program: String,
    args: Vec<String>,
    generation: Arc<AtomicU64>,
    cancel: Option<CancellationToken>,
    utf8_warned: Arc<AtomicBool>,
}

impl PipeBackend {
    pub const NAME: &'static str = "pipe";

    pub fn new(command_line: &str) -> Result<Self, EngineInitError> {
        let words = shlex::split(command_line).unwrap_or_default();
        let Some((program, args)) = words.split_first() else {
            return Err(EngineInitError::EmptyCommand);
        };
        if !super::resolve_executable(program) {
            return Err(EngineInitError::MissingExecutable(program.clone()));
        }
        Ok(Self {
            core: CompleterCore::new(Self::NAME),
            program: program.clone(),
            args: args.to_vec(),
            generation: Arc::new(AtomicU64::new(0)),
            cancel: None,
            utf8_warned: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Completer for PipeBackend {
    fn core(&self) -> &CompleterCore {
        &self.core
    }

    fn set_language(&mut self, lang: &str, region: Option<&str>) -> Result<(), LanguageError> {
        // the external command decides what language it speaks
        self.core.set_language_tag(lang, region);
        Ok(())
    }

    /// A commit invalidates any query still in flight; its late results
    /// would be for a word that no longer exists.
    fn on_commit(&mut self, _text: &str) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn refresh(&mut self) -> bool {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        let preedit = self.core.preedit();
        if preedit.is_empty() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.core.set_completions(None);
            return true;
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program, error = %e, "failed to spawn completion command");
                return false;
            }
        };

        let generation = self.generation.clone();
        let this_gen = generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());

        let core = self.core.clone();
        let program = self.program.clone();
        let utf8_warned = self.utf8_warned.clone();
        tokio::spawn(async move {
            let output = tokio::select! {
                // dropping the query future reaps the child via kill_on_drop;
                // a cancelled read is not an error worth logging
                _ = token.cancelled() => return,
                result = query(child, preedit) => result,
            };
            if generation.load(Ordering::SeqCst) != this_gen {
                // superseded while completing; results must not surface
                return;
            }
            match output {
                Ok(output) => publish(&core, &program, &utf8_warned, output),
                Err(e) => {
                    warn!(program = %program, error = %e, "completion command I/O failed");
                    core.set_completions(Some(Vec::new()));
                }
            }
        });
        true
    }
}

async fn query(mut child: Child, preedit: String) -> std::io::Result<std::process::Output> {
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(preedit.as_bytes()).await?;
        // dropping stdin closes the pipe so the command sees EOF
    }
    child.wait_with_output().await
}

fn publish(
    core: &CompleterCore,
    program: &str,
    utf8_warned: &AtomicBool,
    output: std::process::Output,
) {
    if !output.stderr.is_empty() {
        warn!(
            program,
            stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
            "completion command wrote to stderr"
        );
    }
    if !output.status.success() {
        warn!(program, status = %output.status, "completion command exited abnormally");
        core.set_completions(Some(Vec::new()));
        return;
    }
    let Ok(text) = std::str::from_utf8(&output.stdout) else {
        if !utf8_warned.swap(true, Ordering::Relaxed) {
            warn!(program, "completion command produced invalid UTF-8; output discarded");
        }
        core.set_completions(Some(Vec::new()));
        return;
    };
    core.set_completions(Some(super::split_lines(text)));
}
