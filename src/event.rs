//! Trigger payload model.
//!
//! An invocation is handed an object-store notification document listing the
//! newly created log objects. Object keys arrive URL-encoded with `+`
//! standing in for literal spaces and must be decoded before the object can
//! be fetched.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// One object reference extracted from the trigger event, key already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

#[derive(Deserialize)]
struct TriggerEvent {
    #[serde(rename = "Records", default)]
    records: Vec<TriggerRecord>,
}

#[derive(Deserialize)]
struct TriggerRecord {
    s3: ObjectEntity,
}

#[derive(Deserialize)]
struct ObjectEntity {
    bucket: BucketEntity,
    object: KeyEntity,
}

#[derive(Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Deserialize)]
struct KeyEntity {
    key: String,
}

/// Parses a raw trigger document into the batch of object references.
///
/// An event with no records is a valid empty batch.
pub fn parse_trigger_event(raw: &str) -> Result<Vec<ObjectRef>> {
    let event: TriggerEvent =
        serde_json::from_str(raw).context("failed to parse trigger event document")?;

    let mut objects = Vec::with_capacity(event.records.len());
    for record in event.records {
        if record.s3.bucket.name.is_empty() {
            bail!("trigger event record has an empty bucket name");
        }
        objects.push(ObjectRef {
            bucket: record.s3.bucket.name,
            key: decode_object_key(&record.s3.object.key),
        });
    }
    Ok(objects)
}

/// Decodes a URL-encoded object key: `+` becomes a space, `%XX` escapes are
/// unescaped, and malformed escapes are left verbatim rather than rejected.
pub fn decode_object_key(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut idx = 0;

    while idx < bytes.len() {
        match bytes[idx] {
            b'+' => {
                decoded.push(b' ');
                idx += 1;
            }
            b'%' => match hex_pair(bytes.get(idx + 1).copied(), bytes.get(idx + 2).copied()) {
                Some(byte) => {
                    decoded.push(byte);
                    idx += 3;
                }
                None => {
                    decoded.push(b'%');
                    idx += 1;
                }
            },
            byte => {
                decoded.push(byte);
                idx += 1;
            }
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_pair(high: Option<u8>, low: Option<u8>) -> Option<u8> {
    let high = (high? as char).to_digit(16)?;
    let low = (low? as char).to_digit(16)?;
    Some((high * 16 + low) as u8)
}
