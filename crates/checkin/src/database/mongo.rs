use bson::{to_document, Document};
use futures::stream::TryStreamExt;
use mongodb::options::UpdateOptions;
use std::ops::Deref;

use crate::{
    models::{Event, Ticket},
    Error, Result, Success,
};

use super::{definition::AbstractDatabase, Migration};

#[derive(Clone)]
pub struct MongoDb(pub mongodb::Database);

impl Deref for MongoDb {
    type Target = mongodb::Database;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl AbstractDatabase for MongoDb {
    /// Run a database migration
    async fn run_migration(&self, migration: Migration) -> Success {
        match migration {
            Migration::M2026_10_19CreateTicketIndexes => {
                if self
                    .collection::<Document>("tickets")
                    .list_index_names()
                    .await
                    .unwrap_or_default()
                    .contains(&"event_validation_code".to_owned())
                {
                    return Ok(());
                }

                info!("Creating ticket indexes.");

                // Make sure all collections exist
                let list =
                    self.list_collection_names()
                        .await
                        .map_err(|_| Error::DatabaseError {
                            operation: "list_collection_names",
                            with: "database",
                        })?;

                for name in ["events", "tickets"] {
                    if !list.contains(&name.to_string()) {
                        self.create_collection(name)
                            .await
                            .map_err(|_| Error::DatabaseError {
                                operation: "create_collection",
                                with: "database",
                            })?;
                    }
                }

                self.run_command(doc! {
                    "createIndexes": "tickets",
                    "indexes": [
                        {
                            "key": {
                                "event_id": 1
                            },
                            "name": "event_id"
                        },
                        {
                            "key": {
                                "event_id": 1,
                                "validation_code": 1
                            },
                            "name": "event_validation_code"
                        }
                    ]
                })
                .await
                .map_err(|_| Error::DatabaseError {
                    operation: "create_indexes",
                    with: "tickets",
                })?;
            }
        }

        Ok(())
    }

    /// Find ticket by id
    async fn find_ticket(&self, id: &str) -> Result<Ticket> {
        self.collection("tickets")
            .find_one(doc! {
                "_id": id
            })
            .await
            .map_err(|_| Error::DatabaseError {
                operation: "find_one",
                with: "ticket",
            })?
            .ok_or(Error::UnknownTicket)
    }

    /// Find ticket by the code stored at its first validation
    async fn find_ticket_by_code(
        &self,
        event_id: &str,
        validation_code: &str,
    ) -> Result<Option<Ticket>> {
        self.collection("tickets")
            .find_one(doc! {
                "event_id": event_id,
                "validation_code": validation_code
            })
            .await
            .map_err(|_| Error::DatabaseError {
                operation: "find_one",
                with: "ticket",
            })
    }

    /// Find tickets for an event
    async fn find_tickets_by_event(&self, event_id: &str) -> Result<Vec<Ticket>> {
        self.collection::<Ticket>("tickets")
            .find(doc! {
                "event_id": event_id
            })
            .await
            .map_err(|_| Error::DatabaseError {
                operation: "find",
                with: "tickets",
            })?
            .try_collect()
            .await
            .map_err(|_| Error::DatabaseError {
                operation: "collect",
                with: "tickets",
            })
    }

    /// Find event by id
    async fn find_event(&self, id: &str) -> Result<Event> {
        self.collection("events")
            .find_one(doc! {
                "_id": id
            })
            .await
            .map_err(|_| Error::DatabaseError {
                operation: "find_one",
                with: "event",
            })?
            .ok_or(Error::UnknownEvent)
    }

    /// Save ticket
    async fn save_ticket(&self, ticket: &Ticket) -> Success {
        self.collection::<Ticket>("tickets")
            .update_one(
                doc! {
                    "_id": &ticket.id
                },
                doc! {
                    "$set": to_document(ticket).map_err(|_| Error::DatabaseError {
                        operation: "to_document",
                        with: "ticket",
                    })?,
                },
            )
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await
            .map_err(|_| Error::DatabaseError {
                operation: "upsert_one",
                with: "ticket",
            })
            .map(|_| ())
    }

    /// Save event
    async fn save_event(&self, event: &Event) -> Success {
        self.collection::<Event>("events")
            .update_one(
                doc! {
                    "_id": &event.id
                },
                doc! {
                    "$set": to_document(event).map_err(|_| Error::DatabaseError {
                        operation: "to_document",
                        with: "event",
                    })?,
                },
            )
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await
            .map_err(|_| Error::DatabaseError {
                operation: "upsert_one",
                with: "event",
            })
            .map(|_| ())
    }

    /// Write back a validated ticket if its use count is unchanged
    async fn update_ticket_validation(
        &self,
        ticket: &Ticket,
        expected_use_count: u32,
    ) -> Result<bool> {
        self.collection::<Ticket>("tickets")
            .update_one(
                doc! {
                    "_id": &ticket.id,
                    "use_count": expected_use_count as i64
                },
                doc! {
                    "$set": to_document(ticket).map_err(|_| Error::DatabaseError {
                        operation: "to_document",
                        with: "ticket",
                    })?,
                },
            )
            .await
            .map_err(|_| Error::DatabaseError {
                operation: "update_one",
                with: "ticket",
            })
            .map(|result| result.matched_count == 1)
    }
}
