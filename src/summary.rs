use serde::Serialize;

/// What a successful run did. Failed runs log this and return the error instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub items: usize,
    pub max_parallel: usize, // effective budget, after clamping to `items`
    pub dispatched: usize,
    pub completed: usize,
    pub peak_in_flight: usize,
    pub elapsed_ms: u64,
}
