use crate::{
    models::{Event, Ticket},
    Error, Result, Success,
};

use futures::lock::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{definition::AbstractDatabase, Migration};

#[derive(Default, Clone)]
pub struct DummyDb {
    pub events: Arc<Mutex<HashMap<String, Event>>>,
    pub tickets: Arc<Mutex<HashMap<String, Ticket>>>,
    stale_writes: Arc<AtomicUsize>,
}

impl DummyDb {
    /// Report the next `count` validation writes as lost to a concurrent update
    pub fn reject_validation_writes(&self, count: usize) {
        self.stale_writes.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl AbstractDatabase for DummyDb {
    /// Run a database migration
    async fn run_migration(&self, migration: Migration) -> Success {
        debug!("skip migration {:?}", migration);
        Ok(())
    }

    /// Find ticket by id
    async fn find_ticket(&self, id: &str) -> Result<Ticket> {
        let tickets = self.tickets.lock().await;
        tickets.get(id).cloned().ok_or(Error::UnknownTicket)
    }

    /// Find ticket by the code stored at its first validation
    async fn find_ticket_by_code(
        &self,
        event_id: &str,
        validation_code: &str,
    ) -> Result<Option<Ticket>> {
        let tickets = self.tickets.lock().await;
        Ok(tickets
            .values()
            .find(|ticket| {
                ticket.event_id == event_id
                    && ticket.validation_code.as_deref() == Some(validation_code)
            })
            .cloned())
    }

    /// Find tickets for an event
    async fn find_tickets_by_event(&self, event_id: &str) -> Result<Vec<Ticket>> {
        let tickets = self.tickets.lock().await;
        Ok(tickets
            .values()
            .filter(|ticket| ticket.event_id == event_id)
            .cloned()
            .collect())
    }

    /// Find event by id
    async fn find_event(&self, id: &str) -> Result<Event> {
        let events = self.events.lock().await;
        events.get(id).cloned().ok_or(Error::UnknownEvent)
    }

    /// Save ticket
    async fn save_ticket(&self, ticket: &Ticket) -> Success {
        let mut tickets = self.tickets.lock().await;
        tickets.insert(ticket.id.to_string(), ticket.clone());
        Ok(())
    }

    /// Save event
    async fn save_event(&self, event: &Event) -> Success {
        let mut events = self.events.lock().await;
        events.insert(event.id.to_string(), event.clone());
        Ok(())
    }

    /// Write back a validated ticket if its use count is unchanged
    async fn update_ticket_validation(
        &self,
        ticket: &Ticket,
        expected_use_count: u32,
    ) -> Result<bool> {
        let mut tickets = self.tickets.lock().await;
        let stored = tickets.get_mut(&ticket.id).ok_or(Error::UnknownTicket)?;
        let rejected = self
            .stale_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok();

        if rejected || stored.use_count != expected_use_count {
            return Ok(false);
        }

        *stored = ticket.clone();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::database::definition::AbstractDatabase;
    use crate::models::Ticket;
    use crate::Error;

    use super::DummyDb;

    #[async_std::test]
    async fn it_rejects_stale_validation_writes() {
        let db = DummyDb::default();
        let ticket = Ticket::new("event".into());
        db.save_ticket(&ticket).await.unwrap();

        let mut first = ticket.clone();
        first.use_count = 1;
        assert!(db.update_ticket_validation(&first, 0).await.unwrap());

        let mut second = ticket.clone();
        second.use_count = 1;
        assert!(!db.update_ticket_validation(&second, 0).await.unwrap());

        assert_eq!(db.find_ticket(&ticket.id).await.unwrap().use_count, 1);
    }

    #[async_std::test]
    async fn it_rejects_requested_number_of_writes() {
        let db = DummyDb::default();
        let mut ticket = Ticket::new("event".into());
        db.save_ticket(&ticket).await.unwrap();
        db.reject_validation_writes(2);

        ticket.use_count = 1;
        assert!(!db.update_ticket_validation(&ticket, 0).await.unwrap());
        assert!(!db.update_ticket_validation(&ticket, 0).await.unwrap());
        assert!(db.update_ticket_validation(&ticket, 0).await.unwrap());
        assert_eq!(db.find_ticket(&ticket.id).await.unwrap().use_count, 1);
    }

    #[async_std::test]
    async fn it_fails_to_update_unknown_ticket() {
        let db = DummyDb::default();
        let ticket = Ticket::new("event".into());
        assert_eq!(
            db.update_ticket_validation(&ticket, 0).await,
            Err(Error::UnknownTicket)
        );
    }

    #[async_std::test]
    async fn it_finds_ticket_by_stored_code() {
        let db = DummyDb::default();
        let mut ticket = Ticket::new("event".into());
        ticket.validation_code = Some("0042S".into());
        db.save_ticket(&ticket).await.unwrap();
        db.save_ticket(&Ticket::new("other".into())).await.unwrap();

        assert_eq!(
            db.find_ticket_by_code("event", "0042S").await.unwrap(),
            Some(ticket)
        );
        assert_eq!(db.find_ticket_by_code("other", "0042S").await.unwrap(), None);
        assert_eq!(db.find_tickets_by_event("other").await.unwrap().len(), 1);
    }
}
