//! Inbox lifecycle: state machine, configuration, and the service that
//! drives them against the remote provider.

mod model;
mod service;

pub use model::{ActiveInbox, DEFAULT_TTL_SECS, InboxConfig, InboxPhase, InboxState};
pub use service::InboxService;
