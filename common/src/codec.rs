//! Intermediate record encoding.
//!
//! Each record is a self-describing JSON object `{"key": .., "value": ..}`
//! followed by a newline. Files are append-ordered and decoded by streaming
//! until the input is exhausted.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::KeyValue;

#[derive(Serialize)]
struct RecordRef<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Deserialize)]
struct Record {
    key: String,
    value: String,
}

/// Append one record to `writer`.
///
/// Keys and values must be valid UTF-8.
pub fn write_record<W: Write>(writer: &mut W, kv: &KeyValue) -> Result<()> {
    let record = RecordRef {
        key: std::str::from_utf8(&kv.key).context("intermediate key is not utf-8")?,
        value: std::str::from_utf8(&kv.value).context("intermediate value is not utf-8")?,
    };
    serde_json::to_writer(&mut *writer, &record)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Decode every record from `reader`, appending them to `out`.
pub fn read_records<R: Read>(reader: R, out: &mut Vec<KeyValue>) -> Result<()> {
    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<Record>();
    for record in stream {
        let record = record.context("malformed intermediate record")?;
        out.push(KeyValue::new(record.key, record.value));
    }
    Ok(())
}
