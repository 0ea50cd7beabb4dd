//! # mailfade-api
//!
//! Typed REST client for disposable mail providers speaking the mail.tm
//! API shape.
//!
//! ## Features
//!
//! - **Domain listing**: discover which sending domains accept accounts
//! - **Account lifecycle**: create accounts, obtain bearer tokens, delete
//! - **Messages**: list, fetch, mark seen, delete
//! - **Error taxonomy**: distinguishes transient failures (retryable)
//!   from authoritative ones such as a deleted account
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailfade_api::MailClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MailClient::public()?;
//!
//!     let domains = client.list_domains().await?;
//!     let domain = domains.iter().find(|d| d.is_usable()).ok_or("no domains")?;
//!
//!     let address = format!("someone@{}", domain.domain);
//!     let account = client.create_account(&address, "hunter2hunter2").await?;
//!     let token = client.request_token(&address, "hunter2hunter2").await?;
//!
//!     for message in client.list_messages(&token.token).await? {
//!         println!("{}: {}", message.from.address, message.subject);
//!     }
//!
//!     client.delete_account(&token.token, &account.id).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod types;

pub use client::{DEFAULT_BASE_URL, MailClient};
pub use error::{Error, Result};
pub use types::{
    Address, Attachment, Collection, Domain, Message, MessageSummary, RemoteAccount, TokenResponse,
};
