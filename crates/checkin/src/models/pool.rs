use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::lock::Mutex;
use iso8601_timestamp::Timestamp;

/// Copy of an event's allocated codes for peer-to-peer validation
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct CodeSnapshot {
    /// Event these codes belong to
    pub event_id: String,

    /// Every code allocated to the event when the snapshot was taken
    pub codes: HashSet<String>,

    /// When this snapshot was built
    pub built_at: Timestamp,
}

#[derive(Default, Debug)]
pub struct PoolState {
    /// Every code ever drawn, across all events
    pub minted: HashSet<String>,

    /// Codes allocated to each event
    pub events: HashMap<String, HashSet<String>>,

    /// Snapshots built for peer-to-peer validation
    pub snapshots: HashMap<String, CodeSnapshot>,
}

/// Process-wide allocator of short numeric codes
#[derive(Default, Clone)]
pub struct CodePool(pub(crate) Arc<Mutex<PoolState>>);
