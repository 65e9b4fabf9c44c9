//! Word count: one `(word, "1")` per whitespace-separated token, summed per
//! word.

use anyhow::Result;
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let contents = string_from_bytes(kv.value)?;
    let words = contents
        .split_whitespace()
        .map(|w| w.to_string())
        .collect::<Vec<_>>();

    let iter = words
        .into_iter()
        .map(|word| Ok::<_, anyhow::Error>(KeyValue::new(word, Bytes::from_static(b"1"))));
    Ok(Box::new(iter))
}

pub fn reduce(
    _key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let mut count = 0u64;
    for value in values {
        count += string_from_bytes(value)?.parse::<u64>()?;
    }
    Ok(Bytes::from(count.to_string()))
}
