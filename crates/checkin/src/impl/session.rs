use std::collections::HashMap;
use std::time::Duration;

use iso8601_timestamp::Timestamp;

use crate::{
    models::{
        Credential, HeldCode, Issued, SessionCredentials, SessionState, SessionStore,
        ValidationSession,
    },
    util::{is_live, later},
    CheckinEvent, Checkin, Error, Result,
};

impl SessionState {
    /// Record a new token and code under the ticket's current session
    fn issue(&mut self, ticket_id: &str, token: &str, code: &str, now: Timestamp) -> Result<()> {
        let session = self.sessions.get_mut(ticket_id).ok_or(Error::NotFound)?;
        session.tokens.insert(token.to_string(), now);
        session.codes.insert(code.to_string(), now);

        let issued = Issued {
            ticket_id: ticket_id.to_string(),
            event_id: session.event_id.clone(),
            code: code.to_string(),
            issued_at: now,
        };

        self.codes
            .insert((issued.event_id.clone(), code.to_string()), issued.clone());
        self.tokens.insert(token.to_string(), issued);

        Ok(())
    }

    /// Resolve a presented credential to what it was issued for
    fn resolve(
        &self,
        event_id: &str,
        credential: &Credential,
        now: Timestamp,
        credential_ttl: Duration,
    ) -> Result<Issued> {
        let issued = match credential {
            Credential::Code(code) => self.codes.get(&(event_id.to_string(), code.clone())),
            Credential::Token(token) => self
                .tokens
                .get(token)
                .filter(|issued| issued.event_id == event_id),
        }
        .ok_or(Error::NotFound)?;

        if !is_live(issued.issued_at, credential_ttl, now) {
            return Err(Error::Expired);
        }

        // Credentials outlive a swept session only until the next sweep
        let session = self
            .sessions
            .get(&issued.ticket_id)
            .ok_or(Error::Expired)?;

        if now >= session.expires_at {
            return Err(Error::Expired);
        }

        Ok(issued.clone())
    }

    /// Drop the ticket's session and every credential ever issued for it
    ///
    /// Returns the codes the dropped credentials held.
    fn teardown(&mut self, ticket_id: &str) -> Vec<HeldCode> {
        self.sessions.remove(ticket_id);
        self.tokens.retain(|_, issued| issued.ticket_id != ticket_id);

        let mut held = Vec::new();
        self.codes.retain(|key, issued| {
            let keep = issued.ticket_id != ticket_id;
            if !keep {
                held.push(key.clone());
            }
            keep
        });

        held
    }

    /// Resolve a credential and tear down its ticket's credentials in one step
    ///
    /// Once a credential is claimed no sibling of it can be claimed.
    fn claim(
        &mut self,
        event_id: &str,
        credential: &Credential,
        now: Timestamp,
        credential_ttl: Duration,
    ) -> Result<(Issued, Vec<HeldCode>)> {
        let issued = self.resolve(event_id, credential, now, credential_ttl)?;
        let held = self.teardown(&issued.ticket_id);
        Ok((issued, held))
    }

    /// Remove lapsed credentials and sessions
    ///
    /// Returns the number of credentials and sessions removed, and the codes
    /// the removed credentials held.
    fn sweep(&mut self, now: Timestamp, credential_ttl: Duration) -> (usize, usize, Vec<HeldCode>) {
        let SessionState {
            sessions,
            tokens,
            codes,
        } = self;

        let sessions_before = sessions.len();
        sessions.retain(|_, session| now < session.expires_at);

        for session in sessions.values_mut() {
            session
                .tokens
                .retain(|_, issued_at| is_live(*issued_at, credential_ttl, now));
            session
                .codes
                .retain(|_, issued_at| is_live(*issued_at, credential_ttl, now));
        }

        let tokens_before = tokens.len();
        tokens.retain(|_, issued| {
            is_live(issued.issued_at, credential_ttl, now)
                && sessions.contains_key(&issued.ticket_id)
        });

        let mut held = Vec::new();
        codes.retain(|key, issued| {
            let keep = is_live(issued.issued_at, credential_ttl, now)
                && sessions.contains_key(&issued.ticket_id);
            if !keep {
                held.push(key.clone());
            }
            keep
        });

        (
            tokens_before - tokens.len() + held.len(),
            sessions_before - sessions.len(),
            held,
        )
    }
}

impl SessionStore {
    /// Resolve a presented credential without changing anything
    pub async fn resolve(
        &self,
        event_id: &str,
        credential: &Credential,
        now: Timestamp,
        credential_ttl: Duration,
    ) -> Result<Issued> {
        self.0
            .lock()
            .await
            .resolve(event_id, credential, now, credential_ttl)
    }

    /// Resolve a credential and drop its ticket's session and credentials
    ///
    /// Returns what the credential was issued for and the codes that were
    /// held by the dropped credentials.
    pub async fn claim(
        &self,
        event_id: &str,
        credential: &Credential,
        now: Timestamp,
        credential_ttl: Duration,
    ) -> Result<(Issued, Vec<HeldCode>)> {
        self.0
            .lock()
            .await
            .claim(event_id, credential, now, credential_ttl)
    }

    /// Drop every session and credential of an event
    ///
    /// Returns the number of sessions closed.
    pub async fn teardown_event(&self, event_id: &str) -> usize {
        let mut state = self.0.lock().await;
        let before = state.sessions.len();
        state
            .sessions
            .retain(|_, session| session.event_id != event_id);
        state.tokens.retain(|_, issued| issued.event_id != event_id);
        state.codes.retain(|_, issued| issued.event_id != event_id);
        before - state.sessions.len()
    }

    /// Remove lapsed credentials and sessions
    ///
    /// Returns the number of credentials and sessions removed, and the codes
    /// the removed credentials held.
    pub async fn sweep(
        &self,
        now: Timestamp,
        credential_ttl: Duration,
    ) -> (usize, usize, Vec<HeldCode>) {
        self.0.lock().await.sweep(now, credential_ttl)
    }

    /// Current session of a ticket
    pub async fn session(&self, ticket_id: &str) -> Option<ValidationSession> {
        self.0.lock().await.sessions.get(ticket_id).cloned()
    }

    /// Number of live tokens and codes across all tickets
    pub async fn credential_count(&self) -> usize {
        let state = self.0.lock().await;
        state.tokens.len() + state.codes.len()
    }

    /// Codes currently held by credentials of an event
    pub async fn held_codes(&self, event_id: &str) -> Vec<String> {
        self.0
            .lock()
            .await
            .codes
            .keys()
            .filter(|(event, _)| event == event_id)
            .map(|(_, code)| code.clone())
            .collect()
    }
}

impl Checkin {
    /// Allocate a code for a new credential while holding the session lock
    ///
    /// When the event has no free code left, lapsed credentials are swept
    /// and their codes released before trying once more.
    async fn mint_code(
        &self,
        state: &mut SessionState,
        event_id: &str,
        now: Timestamp,
    ) -> Result<String> {
        if let Some(code) = self
            .pool
            .try_generate_code(&self.config.code_pool, event_id)
            .await
        {
            return Ok(code);
        }

        let (credentials, sessions, held) = state.sweep(now, self.config.session.credential_ttl());
        let released = self.pool.release(&held).await;
        debug!(
            "Reclaimed {} codes for event {} from {} lapsed credentials and {} sessions.",
            released, event_id, credentials, sessions
        );

        self.generate_code(event_id).await
    }

    /// Open a validation session for a ticket and mint its first credentials
    ///
    /// Replaces any session the ticket already has. Credentials minted by the
    /// old session keep resolving until their own lifetime runs out.
    pub async fn create_session(&self, ticket_id: &str) -> Result<SessionCredentials> {
        let ticket = self.database.find_ticket(ticket_id).await?;
        let now = self.clock.now();
        let expires_at = later(now, self.config.session.session_ttl());

        // Sessions are always locked before the pool
        let mut state = self.sessions.0.lock().await;
        let code = self.mint_code(&mut state, &ticket.event_id, now).await?;
        let length = self.config.session.token_length;
        let token = nanoid!(length);

        if state.sessions.contains_key(ticket_id) {
            debug!("Superseding validation session for ticket {}.", ticket_id);
        }

        state.sessions.insert(
            ticket.id.clone(),
            ValidationSession {
                ticket_id: ticket.id.clone(),
                event_id: ticket.event_id.clone(),
                expires_at,
                tokens: HashMap::new(),
                codes: HashMap::new(),
            },
        );

        state.issue(&ticket.id, &token, &code, now)?;
        drop(state);

        info!("Opened validation session for ticket {}.", ticket.id);

        self.publish_event(CheckinEvent::SessionOpened {
            ticket_id: ticket.id.clone(),
            expires_at,
        })
        .await;

        Ok(SessionCredentials {
            ticket_id: ticket.id,
            token,
            code,
            valid_until: later(now, self.config.session.credential_ttl()),
            expires_at,
        })
    }

    /// Mint a fresh token and code for the ticket's open session
    ///
    /// Earlier credentials stay valid until their own lifetime runs out. A
    /// ticket without a live session, for example right after a commit, gets
    /// a new one.
    pub async fn rotate_token(&self, ticket_id: &str) -> Result<SessionCredentials> {
        let now = self.clock.now();

        let mut state = self.sessions.0.lock().await;
        let live = state
            .sessions
            .get(ticket_id)
            .filter(|session| now < session.expires_at)
            .map(|session| (session.event_id.clone(), session.expires_at));

        let Some((event_id, expires_at)) = live else {
            drop(state);
            return self.create_session(ticket_id).await;
        };

        let code = self.mint_code(&mut state, &event_id, now).await?;
        let length = self.config.session.token_length;
        let token = nanoid!(length);
        state.issue(ticket_id, &token, &code, now)?;
        drop(state);

        debug!("Rotated credentials for ticket {}.", ticket_id);

        self.publish_event(CheckinEvent::CredentialsRotated {
            ticket_id: ticket_id.to_string(),
        })
        .await;

        Ok(SessionCredentials {
            ticket_id: ticket_id.to_string(),
            token,
            code,
            valid_until: later(now, self.config.session.credential_ttl()),
            expires_at,
        })
    }

    /// Remove lapsed credentials and sessions and release their codes
    ///
    /// Returns the number of credentials and sessions removed.
    pub async fn sweep(&self) -> (usize, usize) {
        let (credentials, sessions, held) = self
            .sessions
            .sweep(self.clock.now(), self.config.session.credential_ttl())
            .await;

        let released = self.pool.release(&held).await;

        if credentials > 0 || sessions > 0 {
            debug!(
                "Swept {} credentials and {} sessions, released {} codes.",
                credentials, sessions, released
            );
        }

        (credentials, sessions)
    }

    /// Run [`Checkin::sweep`] on the configured interval until the process exits
    pub fn spawn_sweeper(&self) -> async_std::task::JoinHandle<()> {
        let checkin = self.clone();
        async_std::task::spawn(async move {
            loop {
                async_std::task::sleep(checkin.config.sweep.interval()).await;
                checkin.sweep().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::config::{CodePoolConfig, Config};
    use crate::models::{Credential, ReentryPolicy};
    use crate::test::*;
    use crate::util::unix_ms;
    use crate::{CheckinEvent, Error};

    #[async_std::test]
    async fn it_opens_session_with_first_credentials() {
        let (checkin, receiver) = for_test().await;
        let (event, ticket) = create_ticket(&checkin, ReentryPolicy::Single).await;

        let credentials = checkin.create_session(&ticket.id).await.unwrap();
        assert_eq!(credentials.code.len(), 4);
        assert_eq!(credentials.token.len(), 32);
        assert_eq!(
            unix_ms(credentials.expires_at),
            TEST_EPOCH_MS + 180_000
        );
        assert_eq!(
            unix_ms(credentials.valid_until),
            TEST_EPOCH_MS + 15_000
        );
        assert!(checkin.pool.contains(&event.id, &credentials.code).await);

        let session = checkin.sessions.session(&ticket.id).await.unwrap();
        assert!(session.codes.contains_key(&credentials.code));
        assert!(session.tokens.contains_key(&credentials.token));

        assert!(matches!(
            receiver.try_recv().expect("an event"),
            CheckinEvent::SessionOpened { .. }
        ));
    }

    #[async_std::test]
    async fn it_refuses_sessions_for_unknown_tickets() {
        let (checkin, _receiver) = for_test().await;
        assert_eq!(
            checkin.create_session("missing").await,
            Err(Error::UnknownTicket)
        );
        assert_eq!(
            checkin.rotate_token("missing").await,
            Err(Error::UnknownTicket)
        );
    }

    #[async_std::test]
    async fn it_keeps_rotated_credentials_valid_together() {
        let (checkin, _receiver) = for_test().await;
        let (event, ticket) = create_ticket(&checkin, ReentryPolicy::Single).await;

        let first = checkin.create_session(&ticket.id).await.unwrap();
        advance(&checkin, 10);
        let second = checkin.rotate_token(&ticket.id).await.unwrap();
        assert_ne!(first.code, second.code);

        let ttl = checkin.config.session.credential_ttl();
        let now = checkin.clock.now();
        for credential in [
            Credential::Code(first.code.clone()),
            Credential::Token(first.token.clone()),
            Credential::Code(second.code.clone()),
            Credential::Token(second.token.clone()),
        ] {
            let issued = checkin
                .sessions
                .resolve(&event.id, &credential, now, ttl)
                .await
                .unwrap();
            assert_eq!(issued.ticket_id, ticket.id);
        }
    }

    #[async_std::test]
    async fn it_expires_codes_before_their_session() {
        let (checkin, _receiver) = for_test().await;
        let (event, ticket) = create_ticket(&checkin, ReentryPolicy::Single).await;
        let first = checkin.create_session(&ticket.id).await.unwrap();

        advance(&checkin, 16);

        let ttl = checkin.config.session.credential_ttl();
        assert_eq!(
            checkin
                .sessions
                .resolve(&event.id, &Credential::Code(first.code), checkin.clock.now(), ttl)
                .await,
            Err(Error::Expired)
        );

        // The session itself is still open
        let second = checkin.rotate_token(&ticket.id).await.unwrap();
        assert!(checkin
            .sessions
            .resolve(&event.id, &Credential::Code(second.code), checkin.clock.now(), ttl)
            .await
            .is_ok());
    }

    #[async_std::test]
    async fn it_closes_sessions_after_three_minutes() {
        let (checkin, _receiver) = for_test().await;
        let (event, ticket) = create_ticket(&checkin, ReentryPolicy::Single).await;
        checkin.create_session(&ticket.id).await.unwrap();

        advance(&checkin, 170);
        let late = checkin.rotate_token(&ticket.id).await.unwrap();

        advance(&checkin, 11);
        assert_eq!(
            checkin
                .sessions
                .resolve(
                    &event.id,
                    &Credential::Token(late.token),
                    checkin.clock.now(),
                    checkin.config.session.credential_ttl()
                )
                .await,
            Err(Error::Expired)
        );

        // Rotating past the deadline opens a new session
        let reopened = checkin.rotate_token(&ticket.id).await.unwrap();
        assert_eq!(
            unix_ms(reopened.expires_at),
            TEST_EPOCH_MS + 181_000 + 180_000
        );
        assert_ne!(reopened.expires_at, late.expires_at);
    }

    #[async_std::test]
    async fn it_supersedes_sessions() {
        let (checkin, _receiver) = for_test().await;
        let (event, ticket) = create_ticket(&checkin, ReentryPolicy::Single).await;

        let old = checkin.create_session(&ticket.id).await.unwrap();
        advance(&checkin, 5);
        let new = checkin.create_session(&ticket.id).await.unwrap();

        let session = checkin.sessions.session(&ticket.id).await.unwrap();
        assert!(!session.codes.contains_key(&old.code));
        assert!(session.codes.contains_key(&new.code));
        assert_eq!(session.expires_at, new.expires_at);

        // Old credentials honour their own lifetime
        let issued = checkin
            .sessions
            .resolve(
                &event.id,
                &Credential::Code(old.code.clone()),
                checkin.clock.now(),
                checkin.config.session.credential_ttl(),
            )
            .await
            .unwrap();
        assert_eq!(issued.ticket_id, ticket.id);

        advance(&checkin, 11);
        assert_eq!(
            checkin
                .sessions
                .resolve(
                    &event.id,
                    &Credential::Code(old.code),
                    checkin.clock.now(),
                    checkin.config.session.credential_ttl()
                )
                .await,
            Err(Error::Expired)
        );
    }

    #[async_std::test]
    async fn it_scopes_tokens_to_their_event() {
        let (checkin, _receiver) = for_test().await;
        let (_, ticket) = create_ticket(&checkin, ReentryPolicy::Single).await;
        let credentials = checkin.create_session(&ticket.id).await.unwrap();

        assert_eq!(
            checkin
                .sessions
                .resolve(
                    "another event",
                    &Credential::Token(credentials.token),
                    checkin.clock.now(),
                    checkin.config.session.credential_ttl()
                )
                .await,
            Err(Error::NotFound)
        );
    }

    #[async_std::test]
    async fn it_sweeps_lapsed_credentials_and_sessions() {
        let (checkin, _receiver) = for_test().await;
        let (event, ticket) = create_ticket(&checkin, ReentryPolicy::Single).await;
        let first = checkin.create_session(&ticket.id).await.unwrap();
        assert_eq!(checkin.sessions.credential_count().await, 2);

        advance(&checkin, 16);
        let second = checkin.rotate_token(&ticket.id).await.unwrap();
        assert_eq!(checkin.pool.allocated_count(&event.id).await, 2);
        assert_eq!(checkin.sweep().await, (2, 0));
        assert_eq!(checkin.sessions.credential_count().await, 2);

        let session = checkin.sessions.session(&ticket.id).await.unwrap();
        assert_eq!(session.codes.len(), 1);

        // Lapsed codes go back to the event
        assert_eq!(checkin.pool.allocated_count(&event.id).await, 1);
        assert!(!checkin.pool.contains(&event.id, &first.code).await);
        assert!(checkin.pool.contains(&event.id, &second.code).await);

        advance(&checkin, 180);
        assert_eq!(checkin.sweep().await, (2, 1));
        assert!(checkin.sessions.session(&ticket.id).await.is_none());
        assert_eq!(checkin.sessions.credential_count().await, 0);
        assert_eq!(checkin.pool.allocated_count(&event.id).await, 0);
    }

    #[async_std::test]
    async fn it_keeps_rotating_long_after_the_code_space_is_used_once() {
        let (checkin, _receiver) = for_test_with_config(Config {
            code_pool: CodePoolConfig {
                digits: 2,
                random_attempts: 10,
            },
            ..Default::default()
        })
        .await;

        let (event, ticket) = create_ticket(&checkin, ReentryPolicy::Single).await;
        checkin.create_session(&ticket.id).await.unwrap();

        // Ten passes over the code space without an explicit sweep
        for _ in 0..1_000 {
            advance(&checkin, 15);
            checkin.rotate_token(&ticket.id).await.unwrap();
        }

        assert!(checkin.pool.allocated_count(&event.id).await < 100);

        let fresh = create_ticket_for(&checkin, &event).await;
        checkin.create_session(&fresh.id).await.unwrap();

        checkin.sweep().await;
        assert_eq!(checkin.pool.allocated_count(&event.id).await, 2);
        assert_eq!(checkin.sessions.held_codes(&event.id).await.len(), 2);
    }

    #[async_std::test]
    async fn it_sweeps_in_the_background() {
        let (mut checkin, _receiver) = for_test().await;
        checkin.config.sweep.interval = 1;

        let (event, ticket) = create_ticket(&checkin, ReentryPolicy::Single).await;
        checkin.create_session(&ticket.id).await.unwrap();
        advance(&checkin, 181);

        let sweeper = checkin.spawn_sweeper();
        for _ in 0..50 {
            if checkin.sessions.session(&ticket.id).await.is_none() {
                break;
            }

            async_std::task::sleep(std::time::Duration::from_millis(100)).await;
        }

        assert!(checkin.sessions.session(&ticket.id).await.is_none());
        assert_eq!(checkin.sessions.credential_count().await, 0);
        assert_eq!(checkin.pool.allocated_count(&event.id).await, 0);
        sweeper.cancel().await;
    }

    #[async_std::test]
    async fn it_never_collides_under_concurrent_rotation() {
        let (checkin, _receiver) = for_test_with_config(Config {
            code_pool: CodePoolConfig {
                digits: 2,
                random_attempts: 10,
            },
            ..Default::default()
        })
        .await;

        let (event, a) = create_ticket(&checkin, ReentryPolicy::Unlimited).await;
        let b = create_ticket_for(&checkin, &event).await;
        checkin.create_session(&a.id).await.unwrap();
        checkin.create_session(&b.id).await.unwrap();

        // 250 rounds of 40 rotations per ticket, each round inside one credential lifetime
        for _ in 0..250 {
            advance(&checkin, 16);
            checkin.sweep().await;

            let tasks: Vec<_> = [a.id.clone(), b.id.clone()]
                .into_iter()
                .map(|ticket_id| {
                    let checkin = checkin.clone();
                    async_std::task::spawn(async move {
                        let mut minted = Vec::new();
                        for _ in 0..40 {
                            minted.push(checkin.rotate_token(&ticket_id).await.unwrap().code);
                        }
                        minted
                    })
                })
                .collect();

            let mut live = Vec::new();
            for task in tasks {
                live.extend(task.await);
            }

            let unique: HashSet<_> = live.iter().collect();
            assert_eq!(unique.len(), 80);

            let held = checkin.sessions.held_codes(&event.id).await;
            let unique_held: HashSet<_> = held.iter().collect();
            assert_eq!(unique_held.len(), held.len());
            assert!(live.iter().all(|code| unique_held.contains(code)));
        }

        assert!(checkin.pool.allocated_count(&event.id).await <= 100);
        assert!(checkin.pool.minted_count().await <= 100);
    }
}
