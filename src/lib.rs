//! Event-triggered ingestion of ALB access logs into a search store.
//!
//! One invocation receives a batch of compressed log objects, streams each
//! one through decompress → split-lines → parse, posts one document per log
//! line, and reports success only once every document has been accepted.

pub mod batch;
pub mod config;
pub mod dispatcher;
pub mod event;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod source;
pub mod timefmt;
pub mod tokenizer;

pub use batch::{BatchContext, BatchOutcome};
pub use config::{Config, SinkConfig, SourceConfig};
pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use event::{parse_trigger_event, ObjectRef};
pub use record::AlbLogRecord;
pub use sink::{DocumentSink, FsDocumentSink, HttpDocumentSink, IndexTarget};
pub use source::{FsObjectSource, HttpObjectSource, ObjectSource};
