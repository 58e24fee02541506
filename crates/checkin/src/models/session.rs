use std::collections::HashMap;
use std::sync::Arc;

use futures::lock::Mutex;
use iso8601_timestamp::Timestamp;

/// Credential presented at the gate
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Credential {
    /// Short numeric code typed or read off a screen
    Code(String),
    /// Opaque token, usually scanned
    Token(String),
}

/// Code held by a live credential, as `(event_id, code)`
pub type HeldCode = (String, String);

/// Live code or token and what it resolves to
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Issued {
    pub ticket_id: String,
    pub event_id: String,
    /// Code minted together with this credential
    pub code: String,
    pub issued_at: Timestamp,
}

/// Ephemeral check-in window for a ticket
#[derive(Debug, Clone)]
pub struct ValidationSession {
    /// Ticket this session belongs to
    pub ticket_id: String,

    /// Event the ticket admits to
    pub event_id: String,

    /// Absolute deadline of the session
    pub expires_at: Timestamp,

    /// Tokens minted by this session and when
    pub tokens: HashMap<String, Timestamp>,

    /// Codes minted by this session and when
    pub codes: HashMap<String, Timestamp>,
}

#[derive(Default, Debug)]
pub struct SessionState {
    /// Current session for each ticket
    pub sessions: HashMap<String, ValidationSession>,

    /// Live tokens, including those minted by superseded sessions
    pub tokens: HashMap<String, Issued>,

    /// Live codes keyed by (event id, code)
    pub codes: HashMap<(String, String), Issued>,
}

/// In-memory registry of validation sessions and their credentials
#[derive(Default, Clone)]
pub struct SessionStore(pub(crate) Arc<Mutex<SessionState>>);

/// Credentials handed to the ticket holder for display
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct SessionCredentials {
    pub ticket_id: String,

    /// Opaque token, for QR display
    pub token: String,

    /// Short code, for manual entry
    pub code: String,

    /// When this token and code stop validating
    pub valid_until: Timestamp,

    /// When the session itself closes
    pub expires_at: Timestamp,
}
