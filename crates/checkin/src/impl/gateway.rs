use crate::{
    models::{Credential, Event, Issued, Rejection, Ticket, Validation},
    util::{parse_credential, split_stored_code},
    CheckinEvent, Checkin, Error, Result,
};

/// How many times a commit re-reads a ticket that changed underneath it
const COMMIT_ATTEMPTS: usize = 3;

impl Error {
    /// Gate-level reason for refusing a credential, if this error is one
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Error::NotFound => Some(Rejection::NotFound),
            Error::Expired => Some(Rejection::Expired),
            Error::PolicyViolation => Some(Rejection::PolicyViolation),
            _ => None,
        }
    }
}

impl Validation {
    /// Whether the credential was accepted
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }

    /// Turn gate-level errors into an invalid result and let everything else through
    fn refused(err: Error) -> Result<Validation> {
        match err.rejection() {
            Some(reason) => Ok(Validation::Invalid { reason }),
            None => Err(err),
        }
    }
}

impl Checkin {
    /// Resolve a presented code or token to the ticket it was issued for
    async fn resolve(&self, event_id: &str, presented: &str) -> Result<Issued> {
        let credential = parse_credential(presented, self.config.code_pool.digits);

        // Unknown codes never reach the session store
        if let Credential::Code(code) = &credential {
            if !self.pool.contains(event_id, code).await {
                return Err(Error::NotFound);
            }
        }

        self.sessions
            .resolve(
                event_id,
                &credential,
                self.clock.now(),
                self.config.session.credential_ttl(),
            )
            .await
    }

    /// Report whether a credential would currently be accepted
    ///
    /// Changes nothing and does not consult the reentry policy.
    pub async fn check(&self, event_id: &str, presented: &str) -> Result<Validation> {
        match self.resolve(event_id, presented).await {
            Ok(issued) => Ok(Validation::Valid {
                ticket_id: issued.ticket_id,
                ticket: None,
            }),
            Err(err) => Validation::refused(err),
        }
    }

    /// Validate a ticket with a presented credential
    ///
    /// On success every live credential of the ticket is torn down, so sibling
    /// codes from earlier rotations cannot be replayed.
    pub async fn commit(&self, event_id: &str, presented: &str) -> Result<Validation> {
        let issued = match self.resolve(event_id, presented).await {
            Ok(issued) => issued,
            Err(err) => return Validation::refused(err),
        };

        let ticket = self.database.find_ticket(&issued.ticket_id).await?;
        let event = self.database.find_event(&ticket.event_id).await?;

        if !ticket.can_validate(&event) {
            info!(
                "Refused ticket {}: reentry allowance used up after {} uses.",
                ticket.id, ticket.use_count
            );

            return Validation::refused(Error::PolicyViolation);
        }

        // Claiming revokes the siblings, so only one of them gets past here
        let credential = parse_credential(presented, self.config.code_pool.digits);
        let (issued, held) = match self
            .sessions
            .claim(
                event_id,
                &credential,
                self.clock.now(),
                self.config.session.credential_ttl(),
            )
            .await
        {
            Ok(claimed) => claimed,
            Err(err) => return Validation::refused(err),
        };

        let result = self.record_validation(&issued, ticket, &event).await;

        // The code stored on the ticket stays allocated to the event
        let stored = match &result {
            Ok(Validation::Valid {
                ticket: Some(ticket),
                ..
            }) => ticket
                .validation_code
                .as_deref()
                .and_then(split_stored_code)
                .map(|(code, _)| code.to_string()),
            _ => None,
        };

        let held: Vec<_> = held
            .into_iter()
            .filter(|(_, code)| Some(code) != stored.as_ref())
            .collect();
        let released = self.pool.release(&held).await;
        debug!(
            "Revoked credentials of ticket {}, released {} codes.",
            issued.ticket_id, released
        );

        result
    }

    /// Apply a validation to the ticket, re-reading it if a concurrent commit got there first
    async fn record_validation(
        &self,
        issued: &Issued,
        mut ticket: Ticket,
        event: &Event,
    ) -> Result<Validation> {
        for _ in 0..COMMIT_ATTEMPTS {
            if !ticket.can_validate(event) {
                info!(
                    "Refused ticket {}: reentry allowance used up after {} uses.",
                    ticket.id, ticket.use_count
                );

                return Validation::refused(Error::PolicyViolation);
            }

            let expected_use_count = ticket.use_count;
            let golden = ticket.validate(
                &issued.code,
                event,
                self.clock.now(),
                &self.config.lottery,
            );

            if !self
                .database
                .update_ticket_validation(&ticket, expected_use_count)
                .await?
            {
                warn!(
                    "Ticket {} changed during commit, re-reading.",
                    issued.ticket_id
                );

                ticket = self.database.find_ticket(&issued.ticket_id).await?;
                continue;
            }

            info!(
                "Validated ticket {} (use {}).",
                ticket.id, ticket.use_count
            );

            if golden {
                info!("Ticket {} won the golden ticket draw.", ticket.id);
                self.publish_event(CheckinEvent::GoldenTicketAwarded {
                    ticket_id: ticket.id.clone(),
                    event_id: ticket.event_id.clone(),
                })
                .await;
            }

            self.publish_event(CheckinEvent::TicketValidated {
                ticket: ticket.clone(),
            })
            .await;

            return Ok(Validation::Valid {
                ticket_id: ticket.id.clone(),
                ticket: Some(ticket),
            });
        }

        error!(
            "Giving up on ticket {} after {} conflicting commits.",
            issued.ticket_id, COMMIT_ATTEMPTS
        );

        Err(Error::ConcurrentModification)
    }
}
