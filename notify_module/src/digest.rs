//! Daily task digest batch job.
//!
//! Invoked by an external scheduler through the cron HTTP surface. For
//! every active user it collects incomplete assigned tasks, buckets them
//! by due-date urgency and sends one summary email. Users are processed
//! strictly sequentially; one failed send never stops the run.

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::notify::{compose_digest_email, MailDispatcher};
use crate::store::{OpenTask, StoreError, TaskStore};

/// Due-date urgency buckets, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestBucket {
    Overdue,
    DueToday,
    DueThisWeek,
    NoDueDate,
}

/// Classify one due date against "today".
///
/// The tests run in order: a missing due date short-circuits to
/// `NoDueDate` before any comparison; then overdue, due-today and
/// this-week (next 7 days inclusive) are tried in turn. A task due
/// exactly today is `DueToday` even though today also falls inside the
/// 7-day window.
pub fn bucket_for(due_date: Option<NaiveDate>, today: NaiveDate) -> DigestBucket {
    let due = match due_date {
        None => return DigestBucket::NoDueDate,
        Some(date) => date,
    };
    if due < today {
        DigestBucket::Overdue
    } else if due == today {
        DigestBucket::DueToday
    } else if due <= today + Duration::days(7) {
        DigestBucket::DueThisWeek
    } else {
        DigestBucket::NoDueDate
    }
}

/// One user's open tasks partitioned into buckets.
#[derive(Debug, Default)]
pub struct DigestBuckets {
    pub overdue: Vec<OpenTask>,
    pub due_today: Vec<OpenTask>,
    pub due_this_week: Vec<OpenTask>,
    pub no_due_date: Vec<OpenTask>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub overdue: usize,
    pub due_today: usize,
    pub due_this_week: usize,
    pub no_due_date: usize,
}

impl DigestBuckets {
    pub fn partition(tasks: Vec<OpenTask>, today: NaiveDate) -> Self {
        let mut buckets = DigestBuckets::default();
        for task in tasks {
            match bucket_for(task.due_date, today) {
                DigestBucket::Overdue => buckets.overdue.push(task),
                DigestBucket::DueToday => buckets.due_today.push(task),
                DigestBucket::DueThisWeek => buckets.due_this_week.push(task),
                DigestBucket::NoDueDate => buckets.no_due_date.push(task),
            }
        }
        buckets
    }

    pub fn total(&self) -> usize {
        self.overdue.len() + self.due_today.len() + self.due_this_week.len() + self.no_due_date.len()
    }

    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            overdue: self.overdue.len(),
            due_today: self.due_today.len(),
            due_this_week: self.due_this_week.len(),
            no_due_date: self.no_due_date.len(),
        }
    }
}

/// Aggregate counts reported at the end of every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DigestSummary {
    pub users_processed: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub users_skipped: usize,
}

/// Run the digest over all active users, or over a single user when
/// `target_user` is set (the cron surface's test mode).
///
/// Always completes and reports a summary; there are no retries within
/// a run. Only a store failure aborts.
pub fn run_digest(
    store: &TaskStore,
    dispatcher: &MailDispatcher,
    target_user: Option<i64>,
) -> Result<DigestSummary, StoreError> {
    run_digest_for_date(store, dispatcher, target_user, Utc::now().date_naive())
}

pub fn run_digest_for_date(
    store: &TaskStore,
    dispatcher: &MailDispatcher,
    target_user: Option<i64>,
    today: NaiveDate,
) -> Result<DigestSummary, StoreError> {
    info!("daily task digest started");

    let users = match target_user {
        Some(id) => store.active_user(id)?.into_iter().collect(),
        None => store.active_users()?,
    };
    info!("found {} active user(s) to process", users.len());

    let mut summary = DigestSummary {
        users_processed: users.len(),
        ..DigestSummary::default()
    };

    for user in &users {
        let tasks = store.incomplete_tasks_for_user(user.id)?;
        if tasks.is_empty() {
            info!("user {} has no incomplete tasks, skipping", user.username);
            summary.users_skipped += 1;
            continue;
        }

        let buckets = DigestBuckets::partition(tasks, today);
        let counts = buckets.counts();
        info!(
            "user {}: {} open task(s) (overdue={}, due_today={}, this_week={}, no_due_date={})",
            user.username,
            buckets.total(),
            counts.overdue,
            counts.due_today,
            counts.due_this_week,
            counts.no_due_date,
        );

        let email = compose_digest_email(user, &buckets);
        if dispatcher.dispatch(&email) {
            summary.emails_sent += 1;
        } else {
            summary.emails_failed += 1;
            error!("failed to send digest to {}", user.email);
        }
    }

    info!(
        "daily task digest completed: processed={} sent={} failed={} skipped={}",
        summary.users_processed,
        summary.emails_sent,
        summary.emails_failed,
        summary.users_skipped,
    );
    Ok(summary)
}
