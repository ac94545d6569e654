pub mod digest;
pub mod mentions;
pub mod notify;
pub mod service;
pub mod store;

pub use digest::{run_digest, DigestBucket, DigestBuckets, DigestSummary};
pub use mentions::{extract_mentions, MentionCandidates};
pub use notify::{
    process_mentions, AssignmentDetails, EntityKind, MailDispatcher, MentionOutcome,
    NotificationContext, Priority,
};
pub use store::{ResolvedUser, StoreError, TaskStore};
