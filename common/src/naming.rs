//! Canonical names of files on the shared work directory.
//!
//! `(map index, bucket)` uniquely determines an intermediate file, and the
//! bucket uniquely determines a result file, so published names never
//! collide. Staged files start with a `.` and carry a random suffix, which
//! keeps them out of every canonical pattern.

const INTERMEDIATE_PREFIX: &str = "intermediate";
const RESULT_PREFIX: &str = "result";

/// `intermediate-<map_index>-<bucket>`
pub fn intermediate_file(map_index: u32, bucket: u32) -> String {
    format!("{INTERMEDIATE_PREFIX}-{map_index}-{bucket}")
}

/// `result-<bucket>`
pub fn result_file(bucket: u32) -> String {
    format!("{RESULT_PREFIX}-{bucket}")
}

/// Glob pattern that matches every intermediate file of `bucket`, to be
/// narrowed with [`parse_intermediate`].
pub fn intermediate_glob(bucket: u32) -> String {
    format!("{INTERMEDIATE_PREFIX}-*-{bucket}")
}

/// Prefix for the private temporary file staging `final_name`.
pub fn staging_prefix(final_name: &str) -> String {
    format!(".{final_name}-")
}

/// Parse `intermediate-<map_index>-<bucket>` into its indices.
///
/// Anything else (including staged temporaries) returns `None`.
pub fn parse_intermediate(name: &str) -> Option<(u32, u32)> {
    let rest = name.strip_prefix(INTERMEDIATE_PREFIX)?.strip_prefix('-')?;
    let (map_index, bucket) = rest.split_once('-')?;
    Some((parse_index(map_index)?, parse_index(bucket)?))
}

fn parse_index(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
