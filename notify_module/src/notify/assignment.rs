use tracing::info;

use crate::store::ResolvedUser;

use super::composer::compose_assignment_email;
use super::dispatcher::MailDispatcher;
use super::AssignmentDetails;

/// Notify an assignee about a task assigned to them.
///
/// The assignee is already known, so this skips extraction and
/// resolution and goes straight to compose + dispatch. Single send, no
/// fan-out.
pub fn notify_assignment(
    dispatcher: &MailDispatcher,
    assignee: &ResolvedUser,
    details: &AssignmentDetails,
) -> bool {
    info!(
        "sending assignment notification for '{}' to {}",
        details.task_title, assignee.email
    );
    let email = compose_assignment_email(assignee, details);
    dispatcher.dispatch(&email)
}
