//! JSON-RPC / LSP message types exchanged with the editor.

use perl6_ls_types::{Diagnostic, DiagnosticBatch};
use serde::{Deserialize, Serialize};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const SERVER_NOT_INITIALIZED: i64 = -32002;

/// `TextDocumentSyncKind.Full`: every change carries the whole document.
const SYNC_FULL: u8 = 1;

/// A classified message from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request {
        id: serde_json::Value,
        method: String,
        params: serde_json::Value,
    },
    Notification {
        method: String,
        params: serde_json::Value,
    },
    /// Reply to a server-initiated request; the server sends none, so these
    /// are only logged.
    Response { id: serde_json::Value },
}

impl Incoming {
    /// Classify a raw JSON-RPC frame. Returns `None` for frames that are
    /// neither a request, a notification nor a response.
    #[must_use]
    pub fn classify(frame: &serde_json::Value) -> Option<Self> {
        let id = frame.get("id").filter(|id| !id.is_null()).cloned();
        let method = frame
            .get("method")
            .and_then(serde_json::Value::as_str)
            .map(String::from);
        let params = frame
            .get("params")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let is_response = frame.get("result").is_some() || frame.get("error").is_some();

        match (id, method) {
            (Some(id), Some(method)) => Some(Self::Request { id, method, params }),
            (None, Some(method)) => Some(Self::Notification { method, params }),
            (Some(id), None) if is_response => Some(Self::Response { id }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    #[must_use]
    pub fn ok(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: serde_json::Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: serde_json::Value,
}

impl Notification {
    #[must_use]
    pub fn new(method: &'static str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Anything the server writes to the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Response(Response),
    Notification(Notification),
}

// ── Incoming params ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub initialization_options: Option<serde_json::Value>,
    #[serde(default)]
    pub trace: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentItem {
    pub uri: String,
    #[serde(default)]
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidOpenParams {
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Deserialize)]
pub struct VersionedTextDocumentIdentifier {
    pub uri: String,
    pub version: i32,
}

#[derive(Debug, Deserialize)]
pub struct ContentChange {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeParams {
    pub text_document: VersionedTextDocumentIdentifier,
    pub content_changes: Vec<ContentChange>,
}

impl DidChangeParams {
    /// Full text after the change. With full sync the last change wins.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        self.content_changes.into_iter().last().map(|c| c.text)
    }
}

#[derive(Debug, Deserialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCloseParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Deserialize)]
pub struct DidChangeConfigurationParams {
    #[serde(default)]
    pub settings: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct SetTraceParams {
    pub value: String,
}

// ── Outgoing params ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct LspPosition {
    line: u32,
    character: u32,
}

#[derive(Debug, Serialize)]
struct LspRange {
    start: LspPosition,
    end: LspPosition,
}

#[derive(Debug, Serialize)]
struct LspDiagnostic<'a> {
    range: LspRange,
    severity: u8,
    source: &'a str,
    message: &'a str,
}

impl<'a> From<&'a Diagnostic> for LspDiagnostic<'a> {
    fn from(diag: &'a Diagnostic) -> Self {
        Self {
            range: LspRange {
                start: LspPosition {
                    line: diag.line(),
                    character: diag.col_start(),
                },
                end: LspPosition {
                    line: diag.line(),
                    character: diag.col_end(),
                },
            },
            severity: diag.severity().to_lsp(),
            source: diag.source(),
            message: diag.message(),
        }
    }
}

/// `window/showMessage` / `window/logMessage` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Error = 1,
    Warning = 2,
    Info = 3,
    Log = 4,
}

pub fn initialize_result() -> serde_json::Value {
    serde_json::json!({
        "capabilities": {
            "textDocumentSync": {
                "openClose": true,
                "change": SYNC_FULL
            }
        },
        "serverInfo": {
            "name": "perl6-ls",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

pub fn publish_diagnostics(
    uri: &str,
    version: Option<i32>,
    batch: &DiagnosticBatch,
) -> Notification {
    let diagnostics: Vec<LspDiagnostic<'_>> = batch.iter().map(LspDiagnostic::from).collect();
    let mut params = serde_json::json!({
        "uri": uri,
        "diagnostics": diagnostics,
    });
    if let Some(version) = version {
        params["version"] = serde_json::json!(version);
    }
    Notification::new("textDocument/publishDiagnostics", params)
}

pub fn show_message(kind: MessageType, message: &str) -> Notification {
    Notification::new(
        "window/showMessage",
        serde_json::json!({ "type": kind as u8, "message": message }),
    )
}

pub fn log_message(kind: MessageType, message: &str) -> Notification {
    Notification::new(
        "window/logMessage",
        serde_json::json!({ "type": kind as u8, "message": message }),
    )
}
