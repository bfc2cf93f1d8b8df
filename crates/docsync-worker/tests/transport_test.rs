//! Newline-delimited JSON transport, end to end.

mod common;

use common::*;
use serde_json::{json, Value};

fn host_lines(messages: &[Value]) -> Vec<u8> {
    let mut input = String::new();
    for message in messages {
        input.push_str(&message.to_string());
        input.push('\n');
    }
    input.into_bytes()
}

fn worker_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_serve_over_lines() {
    let packages = [("pkgA", "1.0")];
    let edit = json!({"events": [
        {"kind": "ModelChanged", "model": {"id": "m1"}, "attr": "value", "new": "hi"}
    ]});
    let input = host_lines(&[
        json!({"type": "rendered"}),
        json!({"type": "patch", "patch": edit.to_string()}),
        json!({"type": "bogus"}),
        json!({"type": "location", "location": {"hash": "#x", "z": 1}}),
        // Inline objects are accepted as well as encoded strings.
        json!({"type": "patch", "patch": {"events": []}}),
    ]);
    let mut output = Vec::new();

    docsync_worker::serve(
        manifest("mirror", &packages),
        loader(&packages),
        &input[..],
        &mut output,
    )
    .await
    .unwrap();

    let lines = worker_lines(&output);
    let kinds: Vec<&str> = lines
        .iter()
        .map(|line| line["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        vec!["status", "status", "status", "render", "patch", "idle", "idle"]
    );
    assert_eq!(lines[0]["msg"], "Loading native runtime");
    assert_eq!(lines[1]["msg"], "Installing pkgA");
    assert_eq!(lines[2]["msg"], "Executing code");

    let patch = &lines[4];
    assert_eq!(patch["msg_id"], "patch-1");
    assert_eq!(patch["buffers"], json!([]));
    assert_eq!(
        patch["patch"]["events"][0],
        json!({"kind": "ModelChanged", "model": {"id": "m2"}, "attr": "object", "new": "HI"})
    );
}

#[tokio::test]
async fn test_serve_reports_bootstrap_failure() {
    let input = host_lines(&[json!({"type": "rendered"})]);
    let mut output = Vec::new();

    // pkgA is declared but not served.
    let err = docsync_worker::serve(
        manifest("mirror", &[("pkgA", "1.0")]),
        loader(&[]),
        &input[..],
        &mut output,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, docsync_worker::Error::PackageInstall { .. }));

    let lines = worker_lines(&output);
    let last = lines.last().unwrap();
    assert_eq!(last["type"], "error");
    assert_eq!(last["phase"], "installing_packages");
    assert!(lines.iter().all(|line| line["type"] != "render"));
}
