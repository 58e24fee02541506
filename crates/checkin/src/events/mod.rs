use iso8601_timestamp::Timestamp;

use crate::models::Ticket;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event_type")]
pub enum CheckinEvent {
    SessionOpened {
        ticket_id: String,
        expires_at: Timestamp,
    },
    CredentialsRotated {
        ticket_id: String,
    },
    TicketValidated {
        ticket: Ticket,
    },
    GoldenTicketAwarded {
        ticket_id: String,
        event_id: String,
    },
    EventCodesCleared {
        event_id: String,
    },
}
