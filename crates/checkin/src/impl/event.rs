use crate::{
    models::{Event, GoldenTicket, ReentryPolicy},
    Checkin, Success,
};

impl Event {
    /// Create a new event with the golden ticket promotion switched off
    pub fn new(reentry: ReentryPolicy) -> Event {
        Event {
            id: ulid::Ulid::new().to_string(),
            reentry,
            golden_ticket: GoldenTicket::default(),
        }
    }

    /// Save model
    pub async fn save(&self, checkin: &Checkin) -> Success {
        checkin.database.save_event(self).await
    }
}
