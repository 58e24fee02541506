#[macro_use]
extern crate serde;
#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate nanoid;
#[macro_use]
extern crate log;

#[cfg(feature = "schemas")]
#[macro_use]
extern crate schemars;
#[cfg(feature = "database-mongodb")]
#[macro_use]
extern crate bson;

mod result;
pub use result::*;

pub mod clock;
pub mod config;
pub mod database;
pub mod events;
pub mod r#impl;
pub mod models;
pub mod util;


pub use clock::Clock;
pub use config::Config;
pub use database::{Database, Migration};
pub use events::CheckinEvent;
pub use models::{CodePool, SessionStore};

use async_std::channel::Sender;

/// Check-in state
///
/// Constructed once per process and shared by reference with request handlers.
/// Code registries and validation sessions live in memory only, so a deployment
/// must run a single instance per event.
#[derive(Default, Clone)]
pub struct Checkin {
    pub config: Config,
    pub database: Database,
    pub clock: Clock,
    pub pool: CodePool,
    pub sessions: SessionStore,
    pub event_channel: Option<Sender<CheckinEvent>>,
}

impl Checkin {
    pub async fn publish_event(&self, event: CheckinEvent) {
        if let Some(sender) = &self.event_channel {
            if let Err(err) = sender.send(event).await {
                error!("Failed to publish a check-in event: {:?}", err);
            }
        }
    }
}
