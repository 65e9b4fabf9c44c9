//! Built-in MapReduce applications, selectable by name.

use common::Workload;

pub mod grep;
pub mod vertex_degree;
pub mod wc;

/// Names accepted by [`try_named`].
pub const NAMES: &[&str] = &["wc", "grep", "vertex-degree"];

/// Look up a workload by name.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wc" => Some(Workload {
            map_fn: wc::map,
            reduce_fn: wc::reduce,
        }),
        "grep" => Some(Workload {
            map_fn: grep::map,
            reduce_fn: grep::reduce,
        }),
        "vertex-degree" => Some(Workload {
            map_fn: vertex_degree::map,
            reduce_fn: vertex_degree::reduce,
        }),
        _ => None,
    }
}
