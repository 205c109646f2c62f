//! Completer event channel
//!
//! Backends publish typed events; the OSK shell subscribes a receiver per
//! completer and drains it on its event loop.

use tokio::sync::mpsc;

/// Events emitted by a completer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompleterEvent {
    /// Finalize text into the document.
    CommitString { text: String },
    /// Atomically replace text around the cursor: delete `delete_before`
    /// bytes before and `delete_after` bytes after, then show `preedit`.
    Update {
        preedit: String,
        delete_before: usize,
        delete_after: usize,
    },
    /// The completions list changed.
    CompletionsChanged,
    /// The preedit buffer changed.
    PreeditChanged,
}

/// Fan-out sender list for completer events.
///
/// Dropped receivers are pruned on the next emit.
#[derive(Debug, Default)]
pub struct EventBus {
    senders: Vec<mpsc::UnboundedSender<CompleterEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CompleterEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    pub fn emit(&mut self, event: CompleterEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
