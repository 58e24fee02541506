use iso8601_timestamp::Timestamp;
use rand::Rng;

use crate::{
    config::CodePoolConfig,
    models::{CodePool, CodeSnapshot, HeldCode, PoolState, Ticket},
    util::{format_code, is_code, split_stored_code},
    CheckinEvent, Checkin, Error, Result, Success,
};

impl PoolState {
    /// Allocate a code not yet used by the event
    fn allocate<R: Rng>(
        &mut self,
        config: &CodePoolConfig,
        event_id: &str,
        rng: &mut R,
    ) -> Option<String> {
        let space = config.space();
        let PoolState {
            minted,
            events,
            snapshots,
        } = self;

        let allocated = events.entry(event_id.to_string()).or_default();

        let mut code = None;
        for _ in 0..config.random_attempts {
            let draw = format_code(rng.gen_range(0..space), config.digits);
            minted.insert(draw.clone());

            if !allocated.contains(&draw) {
                code = Some(draw);
                break;
            }
        }

        if code.is_none() {
            debug!(
                "Random draws exhausted for event {}, sweeping {} codes.",
                event_id, space
            );

            code = (0..space)
                .map(|value| format_code(value, config.digits))
                .find(|candidate| !allocated.contains(candidate));

            if let Some(code) = &code {
                minted.insert(code.clone());
            }
        }

        let code = code?;
        allocated.insert(code.clone());

        // Server-side snapshots follow the registry so fresh codes are never refused
        if let Some(snapshot) = snapshots.get_mut(event_id) {
            snapshot.codes.insert(code.clone());
        }

        Some(code)
    }
}

impl CodePool {
    /// Allocate a code unique within the event, if one is free
    pub async fn try_generate_code(&self, config: &CodePoolConfig, event_id: &str) -> Option<String> {
        self.0
            .lock()
            .await
            .allocate(config, event_id, &mut rand::thread_rng())
    }

    /// Allocate a code unique within the event
    pub async fn generate_code(&self, config: &CodePoolConfig, event_id: &str) -> Result<String> {
        let code = self.try_generate_code(config, event_id).await;

        code.ok_or_else(|| {
            error!(
                "Code pool exhausted for event {}: more codes requested than the {} available.",
                event_id,
                config.space()
            );

            Error::PoolExhausted {
                event_id: event_id.to_string(),
            }
        })
    }

    /// Register a code minted elsewhere, such as one stored on an imported ticket
    ///
    /// Returns whether the code was not already allocated to the event.
    pub async fn add_code(&self, config: &CodePoolConfig, event_id: &str, code: &str) -> Result<bool> {
        if !is_code(code, config.digits) {
            return Err(Error::IncorrectData { with: "code" });
        }

        let mut state = self.0.lock().await;
        state.minted.insert(code.to_string());

        if let Some(snapshot) = state.snapshots.get_mut(event_id) {
            snapshot.codes.insert(code.to_string());
        }

        Ok(state
            .events
            .entry(event_id.to_string())
            .or_default()
            .insert(code.to_string()))
    }

    /// Hand codes back to their events once no live credential carries them
    ///
    /// Codes stay in the registry of every code ever drawn. Returns the number
    /// of codes released.
    pub async fn release(&self, codes: &[HeldCode]) -> usize {
        if codes.is_empty() {
            return 0;
        }

        let mut state = self.0.lock().await;
        let PoolState {
            events, snapshots, ..
        } = &mut *state;

        let mut released = 0;
        for (event_id, code) in codes {
            if let Some(allocated) = events.get_mut(event_id) {
                if allocated.remove(code) {
                    released += 1;
                }
            }

            if let Some(snapshot) = snapshots.get_mut(event_id) {
                snapshot.codes.remove(code);
            }
        }

        released
    }

    /// Whether the code belongs to the event
    ///
    /// Reads the snapshot when one has been built, otherwise the live registry.
    pub async fn contains(&self, event_id: &str, code: &str) -> bool {
        let state = self.0.lock().await;
        if let Some(snapshot) = state.snapshots.get(event_id) {
            snapshot.contains(code)
        } else {
            state
                .events
                .get(event_id)
                .map(|codes| codes.contains(code))
                .unwrap_or_default()
        }
    }

    /// Build or refresh the peer-to-peer snapshot for an event
    pub async fn build_snapshot(&self, event_id: &str, built_at: Timestamp) -> CodeSnapshot {
        let mut state = self.0.lock().await;
        let snapshot = CodeSnapshot {
            event_id: event_id.to_string(),
            codes: state.events.get(event_id).cloned().unwrap_or_default(),
            built_at,
        };

        state
            .snapshots
            .insert(event_id.to_string(), snapshot.clone());

        snapshot
    }

    /// Fetch the current snapshot for an event
    pub async fn snapshot(&self, event_id: &str) -> Option<CodeSnapshot> {
        self.0.lock().await.snapshots.get(event_id).cloned()
    }

    /// Forget every code and the snapshot of an event
    ///
    /// Returns the number of codes released.
    pub async fn clear_event(&self, event_id: &str) -> usize {
        let mut state = self.0.lock().await;
        state.snapshots.remove(event_id);
        state
            .events
            .remove(event_id)
            .map(|codes| codes.len())
            .unwrap_or_default()
    }

    /// Number of codes allocated to an event
    pub async fn allocated_count(&self, event_id: &str) -> usize {
        self.0
            .lock()
            .await
            .events
            .get(event_id)
            .map(|codes| codes.len())
            .unwrap_or_default()
    }

    /// Number of distinct codes ever drawn
    pub async fn minted_count(&self) -> usize {
        self.0.lock().await.minted.len()
    }
}

impl CodeSnapshot {
    /// Whether the code was allocated when this snapshot was taken
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }
}

impl Checkin {
    /// Allocate a code for an event
    pub async fn generate_code(&self, event_id: &str) -> Result<String> {
        self.pool
            .generate_code(&self.config.code_pool, event_id)
            .await
    }

    /// Build the snapshot handed out for peer-to-peer validation
    pub async fn build_snapshot(&self, event_id: &str) -> CodeSnapshot {
        let snapshot = self.pool.build_snapshot(event_id, self.clock.now()).await;
        info!(
            "Built code snapshot for event {} with {} codes.",
            event_id,
            snapshot.codes.len()
        );

        snapshot
    }

    /// Back-fill the pool from codes stored on already validated tickets
    ///
    /// Returns the number of codes newly registered.
    pub async fn import_event_codes(&self, event_id: &str) -> Result<usize> {
        let mut imported = 0;
        for ticket in self.database.find_tickets_by_event(event_id).await? {
            let Some(stored) = &ticket.validation_code else {
                continue;
            };

            let Some((code, _)) = split_stored_code(stored) else {
                warn!(
                    "Skipping malformed stored code {:?} on ticket {}.",
                    stored, ticket.id
                );
                continue;
            };

            match self
                .pool
                .add_code(&self.config.code_pool, event_id, code)
                .await
            {
                Ok(true) => imported += 1,
                Ok(false) => {}
                Err(_) => warn!(
                    "Skipping stored code {:?} on ticket {}: wrong width.",
                    stored, ticket.id
                ),
            }
        }

        info!("Imported {} codes for event {}.", imported, event_id);
        Ok(imported)
    }

    /// Look up the ticket a stored code (including its policy letter) belongs to
    pub async fn find_by_stored_code(
        &self,
        event_id: &str,
        stored_code: &str,
    ) -> Result<Option<Ticket>> {
        self.database
            .find_ticket_by_code(event_id, stored_code)
            .await
    }

    /// Discard everything held for an archived event
    pub async fn clear_event(&self, event_id: &str) -> Success {
        let released = self.pool.clear_event(event_id).await;
        let closed = self.sessions.teardown_event(event_id).await;
        info!(
            "Cleared event {}: released {} codes and closed {} sessions.",
            event_id, released, closed
        );

        self.publish_event(CheckinEvent::EventCodesCleared {
            event_id: event_id.to_string(),
        })
        .await;

        Ok(())
    }
}
