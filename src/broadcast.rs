//! Operator broadcast fan-out

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger::{Participant, UserId};
use crate::transport::ChatTransport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// Send `content` to every participant except `operator`, one at a time.
///
/// A failed recipient is logged and counted; it never stops the fan-out.
/// `delay` is slept after each attempt; zero disables the pause.
pub async fn broadcast(
    transport: &dyn ChatTransport,
    recipients: &[Participant],
    operator: UserId,
    content: &str,
    delay: Duration,
) -> BroadcastOutcome {
    let mut outcome = BroadcastOutcome::default();

    for participant in recipients.iter().filter(|p| p.user_id != operator) {
        match transport.send_text(participant.user_id, content, None).await {
            Ok(()) => outcome.sent += 1,
            Err(e) => {
                warn!(user_id = participant.user_id, error = %e, "Broadcast delivery failed");
                outcome.failed += 1;
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    info!(sent = outcome.sent, failed = outcome.failed, "Broadcast finished");
    outcome
}
