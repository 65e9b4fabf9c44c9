//! Distributed grep. `aux` holds a regular expression; every matching line
//! is emitted keyed by `<file>:<line number>`.

use anyhow::{anyhow, Result};
use bytes::Bytes;
use regex::Regex;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let pattern = string_from_bytes(aux)?;
    if pattern.is_empty() {
        return Err(anyhow!("grep requires a pattern argument"));
    }
    let re = Regex::new(&pattern)?;

    let file = string_from_bytes(kv.key)?;
    let contents = string_from_bytes(kv.value)?;

    let matches = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| re.is_match(line))
        .map(|(n, line)| KeyValue::new(format!("{}:{}", file, n + 1), line.to_string()))
        .collect::<Vec<_>>();

    Ok(Box::new(matches.into_iter().map(Ok::<_, anyhow::Error>)))
}

pub fn reduce(
    _key: Bytes,
    mut values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    // A (file, line) key is produced by exactly one map task.
    values
        .next()
        .ok_or_else(|| anyhow!("reduce called with no values"))
}
