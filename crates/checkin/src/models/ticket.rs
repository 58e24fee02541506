use iso8601_timestamp::Timestamp;

/// Event ticket
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "schemas", derive(JsonSchema))]
pub struct Ticket {
    /// Unique Id
    #[serde(rename = "_id")]
    pub id: String,

    /// Event this ticket admits to
    pub event_id: String,

    /// Whether this ticket has been validated at least once
    pub validated: bool,

    /// Time of first validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<Timestamp>,

    /// Code presented at first validation, suffixed with the reentry policy letter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_code: Option<String>,

    /// Number of successful validations
    #[serde(default)]
    pub use_count: u32,

    /// Whether this ticket won the golden ticket draw
    #[serde(default)]
    pub golden: bool,
}

/// Where a ticket sits in its validation lifecycle
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "schemas", derive(JsonSchema))]
#[serde(tag = "state")]
pub enum TicketState {
    /// Never validated
    Unvalidated,
    /// Validated and still allowed back in
    Validated { uses: u32 },
    /// Reentry allowance used up
    Exhausted,
}
