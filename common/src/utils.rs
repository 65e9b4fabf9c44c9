use anyhow::Result;
use bytes::Bytes;

use crate::KeyValue;

/// Convert bytes to an owned string, failing on invalid UTF-8.
pub fn string_from_bytes(bytes: Bytes) -> Result<String> {
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Sort records by key. The sort is stable, so values keep their arrival
/// order within a key.
pub fn sort_by_key(records: &mut [KeyValue]) {
    records.sort_by(|a, b| a.key.cmp(&b.key));
}

/// Iterator over runs of consecutive records sharing a key.
///
/// Run it over [`sort_by_key`]-ed input to get exactly one run per key.
pub struct KeyGroups<'a> {
    records: &'a [KeyValue],
}

/// Group consecutive equal keys of `records`.
pub fn group_by_key(records: &[KeyValue]) -> KeyGroups<'_> {
    KeyGroups { records }
}

impl<'a> Iterator for KeyGroups<'a> {
    type Item = (&'a Bytes, &'a [KeyValue]);

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.records.first()?;
        let len = self
            .records
            .iter()
            .position(|kv| kv.key != first.key)
            .unwrap_or(self.records.len());
        let (group, rest) = self.records.split_at(len);
        self.records = rest;
        Some((&first.key, group))
    }
}
