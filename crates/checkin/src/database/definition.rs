use crate::{
    models::{Event, Ticket},
    Result, Success,
};

use super::Migration;

#[async_trait]
pub trait AbstractDatabase: std::marker::Sync {
    /// Run a database migration
    async fn run_migration(&self, migration: Migration) -> Success;

    /// Find ticket by id
    async fn find_ticket(&self, id: &str) -> Result<Ticket>;

    /// Find ticket by the code stored at its first validation
    async fn find_ticket_by_code(
        &self,
        event_id: &str,
        validation_code: &str,
    ) -> Result<Option<Ticket>>;

    /// Find tickets for an event
    async fn find_tickets_by_event(&self, event_id: &str) -> Result<Vec<Ticket>>;

    /// Find event by id
    async fn find_event(&self, id: &str) -> Result<Event>;

    /// Save ticket
    async fn save_ticket(&self, ticket: &Ticket) -> Success;

    /// Save event
    async fn save_event(&self, event: &Event) -> Success;

    /// Write back a validated ticket if nobody else has validated it since it was read
    ///
    /// Returns false when the stored use count no longer matches.
    async fn update_ticket_validation(
        &self,
        ticket: &Ticket,
        expected_use_count: u32,
    ) -> Result<bool>;
}
