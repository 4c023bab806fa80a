use serde::{Deserialize, Serialize};

/// Number of live tasks per queue state, plus how many tasks have finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub running: usize,
    pub retry_scheduled: usize,
    /// The remote answered (recorded or not).
    pub succeeded: usize,
    /// Abandoned or failed permanently.
    pub dead: usize,
}
