use alb_indexer::{
    parse_trigger_event, BatchOutcome, Config, Dispatcher, DispatcherSettings, DocumentSink,
    FsDocumentSink, FsObjectSource, HttpDocumentSink, HttpObjectSource, ObjectSource, SinkConfig,
    SourceConfig,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("failed to load configuration from environment")?;

    let raw_event = read_trigger_document()
        .await
        .context("failed to read trigger event")?;
    let objects = parse_trigger_event(&raw_event)?;

    let source = build_source(&config)?;
    let sink = build_sink(&config)?;

    info!(
        object_count = objects.len(),
        index = %config.index,
        doctype = %config.doctype,
        region = config.region.as_deref().unwrap_or("unset"),
        "starting ingestion batch"
    );

    let dispatcher = Dispatcher::new(source, sink, DispatcherSettings::from_config(&config));
    match dispatcher.run(objects).await {
        BatchOutcome::Succeeded { documents } => {
            info!(documents, "batch succeeded");
            Ok(())
        }
        BatchOutcome::Failed { reason } => {
            error!(reason = %reason, "batch failed; reporting failure to trigger");
            std::process::exit(1);
        }
    }
}

/// The trigger event document comes from the first argument (a file path) or,
/// absent that, from stdin.
async fn read_trigger_document() -> Result<String> {
    if let Some(path) = std::env::args().nth(1) {
        return tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read trigger event from {path}"));
    }

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("failed to read trigger event from stdin")?;
    Ok(raw)
}

fn build_source(config: &Config) -> Result<Arc<dyn ObjectSource>> {
    let source: Arc<dyn ObjectSource> = match &config.source {
        SourceConfig::Http { endpoint } => {
            info!(endpoint = %endpoint, "configured HTTP object source");
            Arc::new(HttpObjectSource::new(endpoint.clone(), config.http_timeout)?)
        }
        SourceConfig::Fs { root } => {
            info!(root = %root.display(), "configured local object source");
            Arc::new(FsObjectSource::new(root.clone()))
        }
    };
    Ok(source)
}

fn build_sink(config: &Config) -> Result<Arc<dyn DocumentSink>> {
    let sink: Arc<dyn DocumentSink> = match &config.sink {
        SinkConfig::Http {
            endpoint,
            username,
            password,
        } => {
            info!(endpoint = %endpoint, "configured search store sink");
            Arc::new(HttpDocumentSink::new(
                endpoint.clone(),
                username.clone(),
                password.clone(),
                config.http_timeout,
            )?)
        }
        SinkConfig::Fs { output_dir } => {
            info!(output_dir = %output_dir.display(), "configured local document sink");
            Arc::new(FsDocumentSink::new(output_dir.clone()))
        }
    };
    Ok(sink)
}

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
