//! Per-document validation runs.
//!
//! At most one run is in flight per URI. Scheduling a new run aborts the
//! previous task, which drops its compiler child (killed on drop) and its
//! snapshot guard (deleted on drop). Every run carries a generation number;
//! a result whose generation has been superseded is never published.

use std::collections::HashMap;
use std::sync::Arc;

use perl6_ls_types::{CompilerSettings, Diagnostic, DiagnosticBatch};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::runner::{CheckOutcome, CompilerRunner};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Result of one finished validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationEvent {
    /// Diagnostics to show for `uri`; empty when the document compiles.
    Published {
        uri: String,
        version: i32,
        generation: u64,
        batch: DiagnosticBatch,
    },
    /// The compiler could not be found or started.
    CompilerUnavailable {
        uri: String,
        generation: u64,
        message: String,
    },
    /// The run failed for a reason unrelated to the document.
    Failed {
        uri: String,
        generation: u64,
        message: String,
    },
}

impl ValidationEvent {
    #[must_use]
    pub fn uri(&self) -> &str {
        match self {
            Self::Published { uri, .. }
            | Self::CompilerUnavailable { uri, .. }
            | Self::Failed { uri, .. } => uri,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            Self::Published { generation, .. }
            | Self::CompilerUnavailable { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }
}

struct InFlight {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct Validator {
    runner: Arc<dyn CompilerRunner>,
    event_tx: mpsc::Sender<ValidationEvent>,
    in_flight: HashMap<String, InFlight>,
    next_generation: u64,
}

impl Validator {
    /// Create a validator and the receiver its runs report to.
    pub fn new(runner: Arc<dyn CompilerRunner>) -> (Self, mpsc::Receiver<ValidationEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let validator = Self {
            runner,
            event_tx,
            in_flight: HashMap::new(),
            next_generation: 0,
        };
        (validator, event_rx)
    }

    /// Start a run for `uri`, aborting any run already in flight for it.
    ///
    /// Returns the generation of the new run.
    pub fn schedule(
        &mut self,
        uri: &str,
        version: i32,
        text: String,
        settings: CompilerSettings,
    ) -> u64 {
        self.cancel(uri);
        self.next_generation += 1;
        let generation = self.next_generation;

        let runner = Arc::clone(&self.runner);
        let event_tx = self.event_tx.clone();
        let task_uri = uri.to_string();
        let handle = tokio::spawn(async move {
            let event = run_check(runner.as_ref(), task_uri, version, generation, &text, &settings).await;
            // Receiver is gone only once the server loop has stopped.
            let _ = event_tx.send(event).await;
        });

        tracing::debug!(uri, version, generation, "Scheduled validation");
        self.in_flight
            .insert(uri.to_string(), InFlight { generation, handle });
        generation
    }

    /// Abort the in-flight run for `uri`, if any.
    pub fn cancel(&mut self, uri: &str) {
        if let Some(previous) = self.in_flight.remove(uri) {
            previous.handle.abort();
            tracing::debug!(uri, generation = previous.generation, "Cancelled validation");
        }
    }

    /// Whether `generation` is the latest run scheduled for `uri`.
    #[must_use]
    pub fn is_current(&self, uri: &str, generation: u64) -> bool {
        self.in_flight
            .get(uri)
            .is_some_and(|run| run.generation == generation)
    }

    /// Forget a finished run if it is still the current one.
    pub fn finish(&mut self, uri: &str, generation: u64) {
        if self.is_current(uri, generation) {
            self.in_flight.remove(uri);
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl Drop for Validator {
    fn drop(&mut self) {
        for run in self.in_flight.values() {
            run.handle.abort();
        }
    }
}

async fn run_check(
    runner: &dyn CompilerRunner,
    uri: String,
    version: i32,
    generation: u64,
    text: &str,
    settings: &CompilerSettings,
) -> ValidationEvent {
    match runner.check(text, settings).await {
        Ok(CheckOutcome::Clean) => ValidationEvent::Published {
            uri,
            version,
            generation,
            batch: DiagnosticBatch::new(),
        },
        Ok(CheckOutcome::Failed { status, stderr }) => ValidationEvent::Published {
            uri,
            version,
            generation,
            batch: failure_batch(settings.compiler(), &status, &stderr),
        },
        Err(e) if e.is_invocation_error() => ValidationEvent::CompilerUnavailable {
            uri,
            generation,
            message: e.to_string(),
        },
        Err(e) => ValidationEvent::Failed {
            uri,
            generation,
            message: e.to_string(),
        },
    }
}

/// Diagnostics for a failed compile. A failure always yields at least one.
pub fn failure_batch(compiler: &str, status: &str, stderr: &str) -> DiagnosticBatch {
    let batch = perl6_ls_extract::extract(stderr);
    // Editors reject diagnostics with an empty message.
    if batch.iter().any(|d| !d.message().trim().is_empty()) {
        return batch;
    }
    tracing::warn!(compiler, status, "Compiler failed without error output");
    DiagnosticBatch::from(vec![Diagnostic::error(
        0,
        format!("{compiler} -c failed ({status}) without printing an error"),
    )])
}
