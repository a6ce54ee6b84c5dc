//! Batch orchestration.
//!
//! One invocation processes one batch of object references. Every object gets
//! its own pipeline task; every record becomes an independent, semaphore-gated
//! document write. The shared [`BatchContext`] observes production and
//! acknowledgment across all objects and resolves the batch exactly once.

use crate::batch::{BatchContext, BatchOutcome};
use crate::config::Config;
use crate::event::ObjectRef;
use crate::pipeline;
use crate::sink::{DocumentSink, IndexTarget};
use crate::source::ObjectSource;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// The batch-scoped knobs the dispatcher needs from [`Config`].
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub index: String,
    pub doctype: String,
    pub time_offset: f64,
    pub max_inflight_writes: usize,
}

impl DispatcherSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            index: config.index.clone(),
            doctype: config.doctype.clone(),
            time_offset: config.time_offset,
            max_inflight_writes: config.max_inflight_writes,
        }
    }
}

pub struct Dispatcher {
    source: Arc<dyn ObjectSource>,
    sink: Arc<dyn DocumentSink>,
    settings: DispatcherSettings,
    write_permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn ObjectSource>,
        sink: Arc<dyn DocumentSink>,
        settings: DispatcherSettings,
    ) -> Self {
        let write_permits = Arc::new(Semaphore::new(settings.max_inflight_writes));
        Self {
            source,
            sink,
            settings,
            write_permits,
        }
    }

    /// Processes the batch to its terminal outcome. Returns after the batch
    /// resolves; writes still in flight after a failure are left to finish on
    /// their own, matching the fail-fast contract.
    pub async fn run(&self, objects: Vec<ObjectRef>) -> BatchOutcome {
        let (context, outcome_rx) = BatchContext::new(objects.len());
        info!(object_count = objects.len(), "dispatching batch");

        for object in objects {
            tokio::spawn(process_object(
                object,
                self.source.clone(),
                self.sink.clone(),
                self.settings.clone(),
                self.write_permits.clone(),
                context.clone(),
            ));
        }

        let outcome = outcome_rx.await.unwrap_or_else(|_| BatchOutcome::Failed {
            reason: "batch resolution channel closed before an outcome was reached".to_string(),
        });

        let (produced, acknowledged) = context.counts();
        match &outcome {
            BatchOutcome::Succeeded { documents } => {
                info!(documents = *documents, "all log records indexed");
            }
            BatchOutcome::Failed { reason } => {
                error!(produced, acknowledged, reason = %reason, "batch failed");
            }
        }
        outcome
    }
}

/// Drains one object's record stream, dispatching a write per record.
async fn process_object(
    object: ObjectRef,
    source: Arc<dyn ObjectSource>,
    sink: Arc<dyn DocumentSink>,
    settings: DispatcherSettings,
    write_permits: Arc<Semaphore>,
    context: Arc<BatchContext>,
) {
    debug!(bucket = %object.bucket, key = %object.key, "opening object stream");
    let reader = match source.open(&object).await {
        Ok(reader) => reader,
        Err(err) => {
            context.fail(format!(
                "failed to open object {}/{}: {err:#}",
                object.bucket, object.key
            ));
            return;
        }
    };

    let records = pipeline::record_stream(reader, settings.time_offset);
    tokio::pin!(records);

    while let Some(item) = records.next().await {
        let document = match item {
            Ok(document) => document,
            Err(err) => {
                context.fail(format!(
                    "stream for object {}/{} failed: {err:#}",
                    object.bucket, object.key
                ));
                return;
            }
        };
        context.record_produced();

        // Gate outbound writes so concurrency is bounded by configuration
        // rather than by line-production rate.
        let permit = match write_permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                context.fail("write semaphore closed while batch was in flight");
                return;
            }
        };

        let target = match IndexTarget::for_instant(
            &settings.index,
            &settings.doctype,
            Utc::now(),
            settings.time_offset,
        ) {
            Some(target) => target,
            None => {
                context.fail("configured time offset produced no index target");
                return;
            }
        };

        let sink = sink.clone();
        let write_context = context.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match sink.write_document(&target, &document).await {
                Ok(()) => write_context.record_acknowledged(),
                Err(err) => {
                    warn!(error = %err, index = %target.index, "document write failed");
                    write_context.fail(format!("document write failed: {err:#}"));
                }
            }
        });
    }

    debug!(bucket = %object.bucket, key = %object.key, "object stream drained");
    context.object_finished();
}
