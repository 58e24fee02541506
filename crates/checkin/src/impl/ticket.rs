use iso8601_timestamp::Timestamp;

use crate::{
    config::LotteryConfig,
    models::{Event, ReentryPolicy, Ticket, TicketState},
    util::{lottery_draw, stored_code, unix_ms},
    Checkin, Success,
};

impl ReentryPolicy {
    /// Letter appended to stored codes so operators can tell which policy produced them
    pub fn suffix(&self) -> char {
        match self {
            ReentryPolicy::Single => 'S',
            ReentryPolicy::Pass { .. } => 'P',
            ReentryPolicy::Unlimited => 'U',
        }
    }

    /// Whether a ticket with this many uses may be validated again
    pub fn allows(&self, use_count: u32) -> bool {
        match self {
            ReentryPolicy::Single => use_count < 1,
            ReentryPolicy::Pass { max_uses } => use_count < *max_uses,
            ReentryPolicy::Unlimited => true,
        }
    }
}

impl Ticket {
    /// Create a new unvalidated ticket
    pub fn new(event_id: String) -> Ticket {
        Ticket {
            id: ulid::Ulid::new().to_string(),
            event_id,
            validated: false,
            validated_at: None,
            validation_code: None,
            use_count: 0,
            golden: false,
        }
    }

    /// Save model
    pub async fn save(&self, checkin: &Checkin) -> Success {
        checkin.database.save_ticket(self).await
    }

    /// Current lifecycle state under the event's reentry policy
    pub fn state(&self, event: &Event) -> TicketState {
        if self.use_count == 0 {
            TicketState::Unvalidated
        } else if event.reentry.allows(self.use_count) {
            TicketState::Validated {
                uses: self.use_count,
            }
        } else {
            TicketState::Exhausted
        }
    }

    /// Whether the event's reentry policy lets this ticket in again
    pub fn can_validate(&self, event: &Event) -> bool {
        event.reentry.allows(self.use_count)
    }

    /// Record a validation with the presented code
    ///
    /// The caller checks the reentry policy first. Returns true if this
    /// validation won the golden ticket draw.
    pub fn validate(
        &mut self,
        code: &str,
        event: &Event,
        now: Timestamp,
        lottery: &LotteryConfig,
    ) -> bool {
        self.use_count += 1;

        if self.validated {
            return false;
        }

        self.validated = true;
        self.validated_at = Some(now);
        self.validation_code = Some(stored_code(code, &event.reentry));

        // Only the first validation enters the draw
        if event.golden_ticket.enabled
            && !self.golden
            && lottery_draw(unix_ms(now), lottery.range)
                == event.golden_ticket.target
        {
            self.golden = true;
            return true;
        }

        false
    }
}
