//! # mailfade-core
//!
//! Core logic for the `mailfade` disposable-inbox client.
//!
//! This crate provides:
//! - Account lifecycle (create, poll, expire, delete)
//! - Local storage (`SQLite`): accounts, audit log, cleanup log, session
//! - **Cleanup scheduler** - batched, retried deletion of expired
//!   accounts on the remote provider
//! - **Audit trail** - capped append-only record of lifecycle events
//! - The [`provider::MailProvider`] port over the REST client so tests
//!   can substitute fakes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod audit;
pub mod cleanup;
mod error;
pub mod inbox;
pub mod provider;
mod retry;
pub mod session;
mod store;

pub use account::{Account, AccountId, AccountRepository};
pub use audit::{AuditAction, AuditEntry, AuditLogRepository};
pub use cleanup::{
    CleanupAttempt, CleanupConfig, CleanupLogRepository, CleanupService, CleanupStats,
    SchedulerHandle, SweepReport,
};
pub use error::{Error, Result};
pub use inbox::{ActiveInbox, InboxConfig, InboxPhase, InboxService, InboxState};
pub use provider::MailProvider;
pub use session::{SessionRepository, StoredSession};
pub use store::Store;
