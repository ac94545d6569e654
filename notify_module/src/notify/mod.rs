//! Notification pipelines triggered by task and comment writes.

mod assignment;
mod composer;
mod dispatcher;
mod pipeline;

pub use assignment::notify_assignment;
pub use composer::{
    compose_assignment_email, compose_digest_email, compose_mention_email, escape_html,
    strip_html_tags, truncate_excerpt, Priority, EXCERPT_MAX_CHARS,
};
pub use dispatcher::MailDispatcher;
pub use pipeline::{process_mentions, MentionOutcome};

use chrono::NaiveDate;

/// What kind of write triggered a mention notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Comment,
}

/// Details of the triggering write, constructed per request.
#[derive(Debug, Clone)]
pub struct NotificationContext {
    pub entity: EntityKind,
    pub title: String,
    pub project_name: Option<String>,
    pub actor_name: String,
    /// Actor's user id, used only by the self-mention policy.
    pub actor_id: Option<i64>,
    /// Raw HTML the mention appeared in; excerpted for comment emails.
    pub content: Option<String>,
}

/// Inputs for a task-assignment notification.
#[derive(Debug, Clone)]
pub struct AssignmentDetails {
    pub task_title: String,
    pub project_name: Option<String>,
    pub actor_name: String,
    pub priority: String,
    pub due_date: Option<NaiveDate>,
}
