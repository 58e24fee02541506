use super::Ticket;

/// Reason a presented credential was refused
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "schemas", derive(JsonSchema))]
pub enum Rejection {
    /// Credential is not known
    NotFound,
    /// Credential or its session has lapsed
    Expired,
    /// Ticket has used up its reentry allowance
    PolicyViolation,
}

/// Outcome of presenting a credential at the gate
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "schemas", derive(JsonSchema))]
#[serde(tag = "result")]
pub enum Validation {
    Valid {
        ticket_id: String,
        /// Ticket after the validation was committed
        #[serde(skip_serializing_if = "Option::is_none")]
        ticket: Option<Ticket>,
    },
    Invalid {
        reason: Rejection,
    },
}
