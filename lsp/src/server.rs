//! The language server event loop.
//!
//! A reader task decodes frames from the editor and forwards them over a
//! channel, so the loop can `select!` between editor messages and finished
//! validation runs without cancelling a half-read frame.

use std::sync::Arc;

use anyhow::{Context, Result};
use perl6_ls_config::RawSettings;
use perl6_ls_types::{CompilerSettings, DiagnosticBatch, TraceLevel};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::codec::{CodecError, MessageReader, MessageWriter};
use crate::documents::DocumentStore;
use crate::protocol::{
    self, DidChangeConfigurationParams, DidChangeParams, DidCloseParams, DidOpenParams, Incoming,
    InitializeParams, MessageType, Outgoing, Response, SetTraceParams,
};
use crate::runner::CompilerRunner;
use crate::validation::{ValidationEvent, Validator};

const INCOMING_CHANNEL_CAPACITY: usize = 64;

/// What the reader task hands the loop.
enum ReaderItem {
    Frame(serde_json::Value),
    /// Body was read but is not JSON; framing is still intact.
    Malformed(String),
    /// Framing is broken; no further frames can be read.
    Fatal(CodecError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Running,
    ShuttingDown,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `exit` received; `after_shutdown` tells whether `shutdown` came first.
    Exit { after_shutdown: bool },
    /// The editor closed the stream without `exit`.
    Disconnected,
}

impl SessionEnd {
    /// Process exit code expected by LSP clients.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            SessionEnd::Exit {
                after_shutdown: true,
            } => 0,
            _ => 1,
        }
    }
}

pub struct LanguageServer {
    validator: Validator,
    events: mpsc::Receiver<ValidationEvent>,
    documents: DocumentStore,
    /// Config file and command-line layers; editor settings go on top.
    base_settings: RawSettings,
    settings: CompilerSettings,
    trace: TraceLevel,
    state: State,
    /// The missing-compiler warning is shown once per configuration.
    warned_unavailable: bool,
}

impl LanguageServer {
    /// Build a server. `base_settings` is resolved immediately so a broken
    /// config file is reported before the editor connects.
    pub fn new(runner: Arc<dyn CompilerRunner>, base_settings: RawSettings) -> Result<Self> {
        let settings = base_settings
            .resolve()
            .context("resolving compiler settings")?;
        let (validator, events) = Validator::new(runner);
        Ok(Self {
            validator,
            events,
            documents: DocumentStore::new(),
            trace: settings.trace(),
            settings,
            base_settings,
            state: State::Uninitialized,
            warned_unavailable: false,
        })
    }

    /// Serve one editor session until `exit` or end of input.
    pub async fn serve<I, O>(mut self, input: I, output: O) -> Result<SessionEnd>
    where
        I: AsyncRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin,
    {
        let (frame_tx, mut frame_rx) = mpsc::channel(INCOMING_CHANNEL_CAPACITY);
        let reader_handle = tokio::spawn(read_frames(input, frame_tx));
        let mut writer = MessageWriter::new(output);

        let end = loop {
            let mut outgoing = Vec::new();
            let mut end = None;

            tokio::select! {
                item = frame_rx.recv() => match item {
                    Some(ReaderItem::Frame(frame)) => {
                        end = self.handle_frame(&frame, &mut outgoing);
                    }
                    Some(ReaderItem::Malformed(message)) => {
                        tracing::warn!("Malformed message from editor: {message}");
                        outgoing.push(Outgoing::Response(Response::error(
                            serde_json::Value::Null,
                            protocol::PARSE_ERROR,
                            message,
                        )));
                    }
                    Some(ReaderItem::Fatal(e)) => {
                        reader_handle.abort();
                        return Err(e).context("reading from editor");
                    }
                    None => end = Some(SessionEnd::Disconnected),
                },
                Some(event) = self.events.recv() => self.handle_event(event, &mut outgoing),
            }

            for message in &outgoing {
                writer
                    .write_message(message)
                    .await
                    .context("writing to editor")?;
            }
            if let Some(end) = end {
                break end;
            }
        };

        reader_handle.abort();
        tracing::info!(?end, "Session ended");
        Ok(end)
    }

    fn handle_frame(
        &mut self,
        frame: &serde_json::Value,
        out: &mut Vec<Outgoing>,
    ) -> Option<SessionEnd> {
        match Incoming::classify(frame) {
            Some(Incoming::Request { id, method, params }) => {
                out.push(Outgoing::Response(self.handle_request(id, &method, params)));
                None
            }
            Some(Incoming::Notification { method, params }) => {
                self.handle_notification(&method, params, out)
            }
            Some(Incoming::Response { id }) => {
                tracing::debug!(%id, "Ignoring response from editor");
                None
            }
            None => {
                tracing::warn!("Ignoring invalid JSON-RPC frame");
                if let Some(id) = frame.get("id").filter(|id| !id.is_null()) {
                    out.push(Outgoing::Response(Response::error(
                        id.clone(),
                        protocol::INVALID_REQUEST,
                        "invalid JSON-RPC message",
                    )));
                }
                None
            }
        }
    }

    fn handle_request(
        &mut self,
        id: serde_json::Value,
        method: &str,
        params: serde_json::Value,
    ) -> Response {
        tracing::debug!(method, "Request");
        match (self.state, method) {
            (State::ShuttingDown, _) => Response::error(
                id,
                protocol::INVALID_REQUEST,
                format!("server is shutting down; '{method}' refused"),
            ),
            (State::Uninitialized, "initialize") => {
                let params: InitializeParams = match parse_params(params) {
                    Ok(params) => params,
                    Err(e) => return Response::error(id, protocol::INVALID_PARAMS, e.to_string()),
                };
                self.initialize(params);
                Response::ok(id, protocol::initialize_result())
            }
            (State::Uninitialized, _) => Response::error(
                id,
                protocol::SERVER_NOT_INITIALIZED,
                "server not initialized",
            ),
            (State::Running, "initialize") => {
                Response::error(id, protocol::INVALID_REQUEST, "server already initialized")
            }
            (State::Running, "shutdown") => {
                self.state = State::ShuttingDown;
                for (uri, _) in self.documents.iter() {
                    self.validator.cancel(uri);
                }
                Response::ok(id, serde_json::Value::Null)
            }
            (State::Running, _) => Response::error(
                id,
                protocol::METHOD_NOT_FOUND,
                format!("method not found: {method}"),
            ),
        }
    }

    fn initialize(&mut self, params: InitializeParams) {
        if let Some(options) = &params.initialization_options {
            self.apply_editor_settings(options, &mut Vec::new());
        }
        if let Some(trace) = params.trace.as_deref().and_then(TraceLevel::parse) {
            self.trace = trace;
        }
        self.state = State::Running;
        tracing::info!(
            compiler = self.settings.compiler(),
            libs = self.settings.libs().len(),
            trace = ?self.trace,
            "Initialized"
        );
    }

    fn handle_notification(
        &mut self,
        method: &str,
        params: serde_json::Value,
        out: &mut Vec<Outgoing>,
    ) -> Option<SessionEnd> {
        if method == "exit" {
            return Some(SessionEnd::Exit {
                after_shutdown: self.state == State::ShuttingDown,
            });
        }
        if self.state != State::Running {
            tracing::debug!(method, state = ?self.state, "Dropping notification");
            return None;
        }

        match method {
            "initialized" => {}
            "textDocument/didOpen" => {
                if let Some(params) = notification_params::<DidOpenParams>(method, params) {
                    let doc = params.text_document;
                    self.documents.open(doc.uri.clone(), doc.version, doc.text.clone());
                    tracing::debug!(uri = %doc.uri, open = self.documents.len(), "Opened document");
                    self.validator
                        .schedule(&doc.uri, doc.version, doc.text, self.settings.clone());
                }
            }
            "textDocument/didChange" => {
                if let Some(params) = notification_params::<DidChangeParams>(method, params) {
                    let uri = params.text_document.uri.clone();
                    let version = params.text_document.version;
                    let Some(text) = params.into_text() else {
                        tracing::debug!(uri = %uri, "didChange without content changes");
                        return None;
                    };
                    if self.documents.change(&uri, version, text.clone()) {
                        self.validator
                            .schedule(&uri, version, text, self.settings.clone());
                    }
                }
            }
            "textDocument/didClose" => {
                if let Some(params) = notification_params::<DidCloseParams>(method, params) {
                    let uri = params.text_document.uri;
                    self.validator.cancel(&uri);
                    self.documents.close(&uri);
                    out.push(Outgoing::Notification(protocol::publish_diagnostics(
                        &uri,
                        None,
                        &DiagnosticBatch::new(),
                    )));
                }
            }
            "workspace/didChangeConfiguration" => {
                if let Some(params) =
                    notification_params::<DidChangeConfigurationParams>(method, params)
                {
                    self.apply_editor_settings(&params.settings, out);
                    self.warned_unavailable = false;
                    self.revalidate_all();
                }
            }
            "$/setTrace" => {
                if let Some(params) = notification_params::<SetTraceParams>(method, params) {
                    match TraceLevel::parse(&params.value) {
                        Some(trace) => self.trace = trace,
                        None => tracing::warn!(value = %params.value, "Unknown trace level"),
                    }
                }
            }
            _ => tracing::debug!(method, "Ignoring notification"),
        }
        None
    }

    /// Layer editor settings over the base layers. On error the previous
    /// settings stay in effect and the user is told why.
    fn apply_editor_settings(&mut self, value: &serde_json::Value, out: &mut Vec<Outgoing>) {
        let resolved = RawSettings::from_lsp(value)
            .map_err(anyhow::Error::from)
            .and_then(|editor| {
                self.base_settings
                    .clone()
                    .overlay(editor)
                    .resolve()
                    .map_err(anyhow::Error::from)
            });

        match resolved {
            Ok(settings) => {
                tracing::info!(
                    compiler = settings.compiler(),
                    libs = ?settings.libs(),
                    "Settings updated"
                );
                self.trace = settings.trace();
                self.settings = settings;
            }
            Err(e) => {
                tracing::warn!("Rejected editor settings: {e:#}");
                out.push(Outgoing::Notification(protocol::show_message(
                    MessageType::Warning,
                    &format!("perl6-ls: ignoring settings: {e:#}"),
                )));
            }
        }
    }

    fn revalidate_all(&mut self) {
        let docs: Vec<(String, i32, String)> = self
            .documents
            .iter()
            .into_iter()
            .map(|(uri, doc)| (uri.to_string(), doc.version, doc.text.clone()))
            .collect();
        tracing::debug!(count = docs.len(), "Re-validating open documents");
        for (uri, version, text) in docs {
            self.validator
                .schedule(&uri, version, text, self.settings.clone());
        }
    }

    fn handle_event(&mut self, event: ValidationEvent, out: &mut Vec<Outgoing>) {
        let uri = event.uri().to_string();
        let generation = event.generation();
        if !self.validator.is_current(&uri, generation) {
            tracing::debug!(uri = %uri, generation, "Dropping superseded result");
            return;
        }
        self.validator.finish(&uri, generation);

        match event {
            ValidationEvent::Published {
                uri,
                version,
                batch,
                ..
            } => {
                tracing::debug!(uri = %uri, version, count = batch.len(), "Publishing diagnostics");
                if self.trace == TraceLevel::Verbose {
                    out.push(Outgoing::Notification(protocol::log_message(
                        MessageType::Log,
                        &format!("{uri} (v{version}): {} diagnostic(s)", batch.len()),
                    )));
                }
                out.push(Outgoing::Notification(protocol::publish_diagnostics(
                    &uri,
                    Some(version),
                    &batch,
                )));
            }
            ValidationEvent::CompilerUnavailable { message, .. } => {
                tracing::warn!(uri = %uri, "Compiler unavailable: {message}");
                if !self.warned_unavailable {
                    self.warned_unavailable = true;
                    out.push(Outgoing::Notification(protocol::show_message(
                        MessageType::Warning,
                        &message,
                    )));
                }
            }
            ValidationEvent::Failed { message, .. } => {
                tracing::error!(uri = %uri, "Validation failed: {message}");
                if self.trace.is_enabled() {
                    out.push(Outgoing::Notification(protocol::log_message(
                        MessageType::Error,
                        &format!("{uri}: {message}"),
                    )));
                }
            }
        }
    }
}

async fn read_frames<I>(input: I, frame_tx: mpsc::Sender<ReaderItem>)
where
    I: AsyncRead + Unpin,
{
    let mut reader = MessageReader::new(input);
    loop {
        let item = match reader.read_message().await {
            Ok(Some(frame)) => ReaderItem::Frame(frame),
            Ok(None) => {
                tracing::info!("Editor closed input");
                break;
            }
            Err(CodecError::Json(e)) => ReaderItem::Malformed(e.to_string()),
            Err(e) => {
                let _ = frame_tx.send(ReaderItem::Fatal(e)).await;
                break;
            }
        };
        if frame_tx.send(item).await.is_err() {
            break;
        }
    }
}

/// `null` params deserialize as the type's default when it has one.
fn parse_params<T: DeserializeOwned + Default>(params: serde_json::Value) -> serde_json::Result<T> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params)
}

fn notification_params<T: DeserializeOwned>(method: &str, params: serde_json::Value) -> Option<T> {
    match serde_json::from_value(params) {
        Ok(params) => Some(params),
        Err(e) => {
            tracing::warn!(method, "Invalid notification params: {e}");
            None
        }
    }
}
