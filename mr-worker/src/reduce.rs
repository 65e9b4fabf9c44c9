use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Write};

use anyhow::{anyhow, Context, Result};
use glob::{glob, Pattern};
use tracing::{debug, info};

use common::coordinator::{ReduceReport, ReduceTask};
use common::{codec, naming, utils, Workload};

use crate::core::WorkerConfig;
use crate::staging::StagedFile;

/// Collect every published intermediate record of `bucket`.
fn collect_bucket(config: &WorkerConfig, bucket: u32) -> Result<Vec<common::KeyValue>> {
    let dir = config
        .work_dir
        .to_str()
        .ok_or_else(|| anyhow!("work dir {} is not utf-8", config.work_dir.display()))?;
    let pattern = format!("{}/{}", Pattern::escape(dir), naming::intermediate_glob(bucket));

    let mut records = Vec::new();
    for entry in glob(&pattern)? {
        let path = entry?;
        let canonical = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(naming::parse_intermediate);
        if !matches!(canonical, Some((_, b)) if b == bucket) {
            continue;
        }

        let file = File::open(&path).with_context(|| format!("cannot open {}", path.display()))?;
        codec::read_records(BufReader::new(file), &mut records)
            .with_context(|| format!("cannot decode {}", path.display()))?;
        debug!("Read {}", path.display());
    }

    Ok(records)
}

/// Group the bucket's records by key, reduce every group and stage
/// `result-<bucket>` with one `<key> <output>` line per key, in key order.
pub fn perform_reduce(
    task: ReduceTask,
    workload: Workload,
    config: &WorkerConfig,
) -> Result<ReduceReport> {
    let index = task.index;
    info!("Received reduce task {index}");

    let mut records = collect_bucket(config, index)?;
    utils::sort_by_key(&mut records);

    let final_name = naming::result_file(index);
    let mut out = StagedFile::create(&config.work_dir, &final_name)?;

    let mut keys = 0usize;
    for (key, group) in utils::group_by_key(&records) {
        let values = group.iter().map(|kv| kv.value());
        let output = (workload.reduce_fn)(key.clone(), Box::new(values), config.aux.clone())
            .with_context(|| format!("reduce function failed on key {:?}", key))?;

        let writer = out.writer();
        writer.write_all(key)?;
        writer.write_all(b" ")?;
        writer.write_all(&output)?;
        writer.write_all(b"\n")?;
        keys += 1;
    }
    info!("Reduce task {index} wrote {keys} keys from {} records", records.len());

    Ok(ReduceReport {
        index,
        staged_output: HashMap::from([(final_name, out.finish()?)]),
    })
}
