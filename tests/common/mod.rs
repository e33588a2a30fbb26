//! Shared test utilities and fixtures
//!
//! An in-memory editor that drives a [`LanguageServer`] over a duplex pipe,
//! and a compiler runner answering from a closure.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use perl6_ls_config::RawSettings;
use perl6_ls_lsp::codec::{MessageReader, MessageWriter};
use perl6_ls_lsp::{CheckFuture, CheckOutcome, CompilerRunner, LanguageServer, RunError, SessionEnd};
use perl6_ls_types::CompilerSettings;
use serde_json::{Value, json};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

type Script = dyn Fn(&str, &CompilerSettings) -> Result<CheckOutcome, RunError> + Send + Sync;

/// Compiler stand-in. Records the settings of every run.
pub struct ScriptedRunner {
    script: Box<Script>,
    seen: Arc<Mutex<Vec<CompilerSettings>>>,
}

impl ScriptedRunner {
    pub fn new(
        script: impl Fn(&str, &CompilerSettings) -> Result<CheckOutcome, RunError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            seen: Arc::default(),
        }
    }

    /// Settings passed to each run so far.
    pub fn seen(&self) -> Arc<Mutex<Vec<CompilerSettings>>> {
        Arc::clone(&self.seen)
    }
}

impl CompilerRunner for ScriptedRunner {
    fn check<'a>(&'a self, text: &'a str, settings: &'a CompilerSettings) -> CheckFuture<'a> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(settings.clone());
            (self.script)(text, settings)
        })
    }
}

/// Fails every document containing `oops` with a generic Rakudo error on
/// the first line holding it.
pub fn rakudo_like(text: &str, _settings: &CompilerSettings) -> Result<CheckOutcome, RunError> {
    let Some(line) = text.lines().position(|l| l.contains("oops")) else {
        return Ok(CheckOutcome::Clean);
    };
    Ok(CheckOutcome::Failed {
        status: "exit status: 1".into(),
        stderr: format!(
            "===SORRY!=== Error while compiling /tmp/perl6-ls-abc.p6\nTwo terms in a row\nat /tmp/perl6-ls-abc.p6:{}\n------> say 1⏏ oops\n",
            line + 1
        ),
    })
}

/// The editor side of a session.
pub struct Client {
    reader: MessageReader<ReadHalf<DuplexStream>>,
    writer: MessageWriter<WriteHalf<DuplexStream>>,
    next_id: i64,
    /// Notifications read while waiting for a response.
    pending: VecDeque<Value>,
    server: JoinHandle<anyhow::Result<SessionEnd>>,
}

impl Client {
    pub fn start(runner: ScriptedRunner) -> Self {
        Self::start_with(runner, RawSettings::default())
    }

    pub fn start_with(runner: ScriptedRunner, base: RawSettings) -> Self {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (client_read, client_write) = tokio::io::split(client_io);

        let server = LanguageServer::new(Arc::new(runner), base).unwrap();
        let server = tokio::spawn(server.serve(server_read, server_write));

        Self {
            reader: MessageReader::new(client_read),
            writer: MessageWriter::new(client_write),
            next_id: 1,
            pending: VecDeque::new(),
            server,
        }
    }

    pub async fn send(&mut self, message: &Value) {
        self.writer.write_message(message).await.unwrap();
    }

    async fn read(&mut self) -> Value {
        tokio::time::timeout(REPLY_TIMEOUT, self.reader.read_message())
            .await
            .expect("server replied in time")
            .unwrap()
            .expect("server still connected")
    }

    /// Send a request and return the full response frame.
    pub async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await;

        loop {
            let frame = self.read().await;
            if frame.get("id") == Some(&json!(id)) {
                return frame;
            }
            self.pending.push_back(frame);
        }
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        self.send(&json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await;
    }

    /// Next server notification with `method`, skipping others.
    pub async fn expect_notification(&mut self, method: &str) -> Value {
        if let Some(pos) = self.pending.iter().position(|f| f["method"] == method) {
            return self.pending.remove(pos).unwrap_or_default();
        }
        loop {
            let frame = self.read().await;
            if frame["method"] == method {
                return frame;
            }
            self.pending.push_back(frame);
        }
    }

    /// Next `publishDiagnostics` params for `uri`.
    pub async fn diagnostics_for(&mut self, uri: &str) -> Value {
        loop {
            let frame = self.expect_notification("textDocument/publishDiagnostics").await;
            if frame["params"]["uri"] == uri {
                return frame["params"].clone();
            }
        }
    }

    pub async fn initialize(&mut self, options: Value) -> Value {
        let reply = self
            .request(
                "initialize",
                json!({ "processId": null, "capabilities": {}, "initializationOptions": options }),
            )
            .await;
        self.notify("initialized", json!({})).await;
        reply
    }

    pub async fn open(&mut self, uri: &str, version: i32, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({ "textDocument": { "uri": uri, "languageId": "perl6", "version": version, "text": text } }),
        )
        .await;
    }

    pub async fn change(&mut self, uri: &str, version: i32, text: &str) {
        self.notify(
            "textDocument/didChange",
            json!({ "textDocument": { "uri": uri, "version": version }, "contentChanges": [{ "text": text }] }),
        )
        .await;
    }

    /// `shutdown` then `exit`; returns how the server saw the session end.
    pub async fn finish(mut self) -> SessionEnd {
        let reply = self.request("shutdown", Value::Null).await;
        assert!(reply["result"].is_null());
        self.notify("exit", Value::Null).await;
        self.join().await
    }

    pub async fn join(self) -> SessionEnd {
        tokio::time::timeout(REPLY_TIMEOUT, self.server)
            .await
            .expect("server stopped in time")
            .unwrap()
            .unwrap()
    }

    /// Whether no notification arrives within `wait`.
    pub async fn is_quiet(&mut self, wait: Duration) -> bool {
        self.pending.is_empty()
            && tokio::time::timeout(wait, self.reader.read_message())
                .await
                .is_err()
    }
}
