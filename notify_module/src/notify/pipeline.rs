//! The mention pipeline: extract, resolve, compose, dispatch.

use tracing::{error, info};

use crate::mentions::extract_mentions;
use crate::store::{StoreError, TaskStore};

use super::composer::compose_mention_email;
use super::dispatcher::MailDispatcher;
use super::NotificationContext;

/// Per-invocation tally of the mention pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MentionOutcome {
    pub resolved: usize,
    pub sent: usize,
}

/// Run the full mention pipeline over one content update.
///
/// Each resolved user gets an independent compose+dispatch attempt; one
/// failure never aborts delivery to the others. Store errors are the
/// only thing that propagates; dispatch failures are logged and
/// counted.
///
/// `suppress_self` skips a user whose id equals the context's actor id;
/// with it off the actor is notified of their own mention, which is
/// what the triggering UI historically did.
pub fn process_mentions(
    store: &TaskStore,
    dispatcher: &MailDispatcher,
    content: &str,
    context: &NotificationContext,
    suppress_self: bool,
) -> Result<MentionOutcome, StoreError> {
    let candidates = extract_mentions(content);
    if candidates.is_empty() {
        return Ok(MentionOutcome::default());
    }

    let mut users = store.resolve_candidates(&candidates)?;
    if suppress_self {
        if let Some(actor_id) = context.actor_id {
            users.retain(|user| user.id != actor_id);
        }
    }
    if users.is_empty() {
        return Ok(MentionOutcome {
            resolved: 0,
            sent: 0,
        });
    }

    info!(
        "processing {} mentioned user(s) for '{}'",
        users.len(),
        context.title
    );

    let mut sent = 0;
    for user in &users {
        let email = compose_mention_email(user, context);
        if dispatcher.dispatch(&email) {
            sent += 1;
        } else {
            error!("failed to send mention notification to {}", user.email);
        }
    }

    info!("mention pipeline done: sent {}/{}", sent, users.len());
    Ok(MentionOutcome {
        resolved: users.len(),
        sent,
    })
}
