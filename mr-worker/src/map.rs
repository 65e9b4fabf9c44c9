use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use common::coordinator::{MapReport, MapTask};
use common::{codec, naming, KeyValue, Workload};

use crate::core::WorkerConfig;
use crate::staging::StagedFile;

/// Run the map function over one input file and stage its output, one file
/// per touched reduce bucket.
pub fn perform_map(task: MapTask, workload: Workload, config: &WorkerConfig) -> Result<MapReport> {
    let MapTask {
        index,
        file_name,
        n_reduce,
    } = task;
    info!("Received map task {index} over `{file_name}` for {n_reduce} buckets");

    if n_reduce == 0 {
        bail!("map task {index} has no reduce buckets");
    }

    let content = fs::read(&file_name).with_context(|| format!("cannot read {file_name}"))?;
    let records = (workload.map_fn)(KeyValue::new(file_name.clone(), content), config.aux.clone())
        .with_context(|| format!("map function failed on {file_name}"))?;

    let mut staged: HashMap<u32, StagedFile> = HashMap::new();
    let mut emitted = 0usize;
    for kv in records {
        let kv = kv.with_context(|| format!("map function failed on {file_name}"))?;
        let bucket = common::bucket(&kv.key, n_reduce);

        let file = match staged.entry(bucket) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(StagedFile::create(
                &config.work_dir,
                &naming::intermediate_file(index, bucket),
            )?),
        };
        codec::write_record(file.writer(), &kv)?;
        emitted += 1;
    }
    debug!("Map task {index} emitted {emitted} records into {} buckets", staged.len());

    let mut staged_output = HashMap::with_capacity(staged.len());
    for (bucket, file) in staged {
        staged_output.insert(naming::intermediate_file(index, bucket), file.finish()?);
    }

    Ok(MapReport {
        index,
        file_name,
        staged_output,
    })
}
