#[derive(Serialize, Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "schemas", derive(JsonSchema))]
#[serde(tag = "type")]
pub enum Error {
    IncorrectData {
        with: &'static str,
    },
    DatabaseError {
        operation: &'static str,
        with: &'static str,
    },
    InternalError,

    /// Presented credential is not known
    NotFound,
    /// Credential or its session has lapsed
    Expired,
    /// Ticket has used up its reentry allowance
    PolicyViolation,
    /// No unallocated code remains for this event
    PoolExhausted {
        event_id: String,
    },
    /// Ticket kept changing underneath a commit
    ConcurrentModification,

    UnknownTicket,
    UnknownEvent,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
pub type Success = Result<()>;
