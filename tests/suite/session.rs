//! End-to-end editor sessions against a scripted compiler.

use std::time::Duration;

use perl6_ls_config::RawSettings;
use perl6_ls_lsp::{CheckOutcome, RunError, SessionEnd};
use serde_json::{Value, json};

use crate::common::{Client, ScriptedRunner, rakudo_like};

const URI: &str = "file:///home/u/project/bin/app.p6";

#[tokio::test]
async fn test_edit_cycle_publishes_and_clears() {
    let mut client = Client::start(ScriptedRunner::new(rakudo_like));
    let init = client.initialize(Value::Null).await;
    assert_eq!(init["result"]["capabilities"]["textDocumentSync"]["change"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "perl6-ls");
    assert!(init["result"]["capabilities"].get("completionProvider").is_none());

    client.open(URI, 1, "use v6;\nsay 'hi';\noops();\n").await;
    let published = client.diagnostics_for(URI).await;
    assert_eq!(published["version"], 1);
    let diagnostics = published["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["message"], "Two terms in a row");
    assert_eq!(diagnostics[0]["severity"], 1);
    assert_eq!(diagnostics[0]["source"], "perl6");
    assert_eq!(diagnostics[0]["range"]["start"], json!({ "line": 2, "character": 0 }));
    assert_eq!(diagnostics[0]["range"]["end"]["line"], 2);

    client.change(URI, 2, "use v6;\nsay 'hi';\n").await;
    let published = client.diagnostics_for(URI).await;
    assert_eq!(published["version"], 2);
    assert_eq!(published["diagnostics"], json!([]));

    client
        .notify("textDocument/didClose", json!({ "textDocument": { "uri": URI } }))
        .await;
    let published = client.diagnostics_for(URI).await;
    assert_eq!(published["diagnostics"], json!([]));
    assert!(published.get("version").is_none());

    assert_eq!(
        client.finish().await,
        SessionEnd::Exit {
            after_shutdown: true
        }
    );
}

#[tokio::test]
async fn test_request_before_initialize_rejected() {
    let mut client = Client::start(ScriptedRunner::new(rakudo_like));
    let reply = client.request("textDocument/hover", json!({})).await;
    assert_eq!(reply["error"]["code"], -32002);

    client.initialize(Value::Null).await;
    let reply = client.request("textDocument/hover", json!({})).await;
    assert_eq!(reply["error"]["code"], -32601);
    client.finish().await;
}

#[tokio::test]
async fn test_missing_compiler_warns_once() {
    let mut client = Client::start(ScriptedRunner::new(|_, settings| {
        Err(RunError::CompilerNotFound {
            command: settings.compiler().to_string(),
        })
    }));
    client.initialize(Value::Null).await;

    client.open("file:///a.p6", 1, "say 1").await;
    let warning = client.expect_notification("window/showMessage").await;
    assert_eq!(warning["params"]["type"], 2);
    assert!(warning["params"]["message"].as_str().unwrap().contains("perl6"));

    client.open("file:///b.p6", 1, "say 2").await;
    assert!(client.is_quiet(Duration::from_millis(200)).await);
}

#[tokio::test]
async fn test_settings_flow_into_runs() {
    let runner = ScriptedRunner::new(|_, _| Ok(CheckOutcome::Clean));
    let seen = runner.seen();
    let mut client = Client::start_with(runner, RawSettings::with_compiler("/usr/bin/perl6"));
    client
        .initialize(json!({ "perl6": { "libs": ["lib"] } }))
        .await;

    client.open(URI, 1, "say 1").await;
    client.diagnostics_for(URI).await;
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].compiler(), "/usr/bin/perl6");
        assert_eq!(seen[0].libs(), ["lib"]);
    }

    client
        .notify(
            "workspace/didChangeConfiguration",
            json!({ "settings": { "perl6": { "path": "/opt/rakudo/bin/raku", "libs": [] } } }),
        )
        .await;
    client.diagnostics_for(URI).await;
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].compiler(), "/opt/rakudo/bin/raku");
        assert!(seen[1].libs().is_empty());
    }
    client.finish().await;
}

#[tokio::test]
async fn test_non_object_message_ignored() {
    let mut client = Client::start(ScriptedRunner::new(rakudo_like));
    client.initialize(Value::Null).await;

    // Valid JSON, but not a JSON-RPC message.
    client.send(&json!("not an object")).await;
    let reply = client.request("textDocument/definition", json!({})).await;
    assert_eq!(reply["error"]["code"], -32601);
    client.finish().await;
}

#[tokio::test]
async fn test_exit_without_shutdown() {
    let mut client = Client::start(ScriptedRunner::new(rakudo_like));
    client.initialize(Value::Null).await;
    client.notify("exit", Value::Null).await;
    let end = client.join().await;
    assert_eq!(end.exit_code(), 1);
}
