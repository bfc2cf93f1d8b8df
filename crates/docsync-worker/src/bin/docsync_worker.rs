//! docsync-worker: run the bundled worker over stdio.
//!
//! Host messages are read from stdin and worker messages written to stdout,
//! one JSON object per line. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! docsync-worker --verbose < host-messages.jsonl
//! ```

use anyhow::Context;
use clap::Parser;
use docsync_bundle::WorkerManifest;
use docsync_worker::application::{self, ApplicationContext};
use docsync_worker::{ApplicationRegistry, DocumentState, HttpSource, NativeLoader, Setter};
use env_logger::Env;
use log::{error, info};
use serde_json::{json, Map, Value};

/// Build-time worker configuration.
const WORKER_MANIFEST: &[u8] = include_bytes!("../../bundle/worker.toml");

/// Run the bundled docsync worker over stdio.
#[derive(Parser, Debug)]
#[command(name = "docsync-worker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let manifest =
        WorkerManifest::from_toml(WORKER_MANIFEST).context("bundled worker.toml is invalid")?;
    info!(
        "Starting worker {} ({} packages)",
        manifest.worker.name,
        manifest.packages.len()
    );

    let source = HttpSource::new()?;
    let loader =
        NativeLoader::new(source, registry()).with_label(manifest.worker.runtime.clone());

    if let Err(e) =
        docsync_worker::serve(manifest, loader, tokio::io::stdin(), tokio::io::stdout()).await
    {
        error!("Worker stopped: {}", e);
        return Err(e.into());
    }

    info!("Host closed the connection");
    Ok(())
}

fn registry() -> ApplicationRegistry {
    ApplicationRegistry::new().with("mirror", application::from_fn(build_mirror))
}

/// Editor whose contents are echoed, annotated, into a result pane.
fn build_mirror(doc: &mut DocumentState, ctx: &ApplicationContext<'_>) -> docsync_worker::Result<()> {
    let title: String = ctx
        .binding("title")?
        .unwrap_or_else(|| "docsync".to_string());
    let placeholder: String = ctx.binding("placeholder")?.unwrap_or_default();
    doc.set_title(title, Setter::Runtime);

    let editor = doc.add_root(
        "TextAreaInput",
        attributes(json!({ "name": "Source", "value": placeholder })),
        Setter::Runtime,
    );
    let result = doc.add_root(
        "Markdown",
        attributes(json!({ "object": annotate(&placeholder) })),
        Setter::Runtime,
    );

    doc.watch(&editor, "value", move |doc, new| {
        let text = new.as_str().unwrap_or_default();
        doc.set_attr(&result, "object", Value::String(annotate(text)), Setter::Runtime)?;
        Ok(())
    });
    Ok(())
}

fn annotate(source: &str) -> String {
    format!(
        "```python\n{}\n```\n\n_{} lines_",
        source,
        source.lines().count()
    )
}

fn attributes(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
