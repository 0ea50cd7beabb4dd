//! The remote mail provider port.
//!
//! Services depend on this trait rather than the concrete HTTP client so
//! tests can substitute an in-process fake.

use async_trait::async_trait;
use mailfade_api::{Domain, MailClient, Message, MessageSummary, RemoteAccount, TokenResponse};

#[cfg(test)]
pub(crate) mod fake;

/// Operations the core needs from a remote mail provider.
///
/// Authenticated operations take the bearer token explicitly; a single
/// provider handle serves concurrent callers acting on different
/// accounts.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Lists the sending domains offered by the provider.
    async fn list_domains(&self) -> mailfade_api::Result<Vec<Domain>>;

    /// Creates a new account.
    async fn create_account(
        &self,
        address: &str,
        password: &str,
    ) -> mailfade_api::Result<RemoteAccount>;

    /// Exchanges credentials for a bearer token.
    async fn request_token(
        &self,
        address: &str,
        password: &str,
    ) -> mailfade_api::Result<TokenResponse>;

    /// Fetches the canonical account record.
    async fn get_account(&self, token: &str) -> mailfade_api::Result<RemoteAccount>;

    /// Lists inbox messages.
    async fn list_messages(&self, token: &str) -> mailfade_api::Result<Vec<MessageSummary>>;

    /// Fetches a full message.
    async fn get_message(&self, token: &str, id: &str) -> mailfade_api::Result<Message>;

    /// Marks a message as seen.
    async fn mark_seen(&self, token: &str, id: &str) -> mailfade_api::Result<()>;

    /// Deletes a message.
    async fn delete_message(&self, token: &str, id: &str) -> mailfade_api::Result<()>;

    /// Deletes the account itself.
    async fn delete_account(&self, token: &str, id: &str) -> mailfade_api::Result<()>;
}

#[async_trait]
impl MailProvider for MailClient {
    async fn list_domains(&self) -> mailfade_api::Result<Vec<Domain>> {
        Self::list_domains(self).await
    }

    async fn create_account(
        &self,
        address: &str,
        password: &str,
    ) -> mailfade_api::Result<RemoteAccount> {
        Self::create_account(self, address, password).await
    }

    async fn request_token(
        &self,
        address: &str,
        password: &str,
    ) -> mailfade_api::Result<TokenResponse> {
        Self::request_token(self, address, password).await
    }

    async fn get_account(&self, token: &str) -> mailfade_api::Result<RemoteAccount> {
        Self::get_account(self, token).await
    }

    async fn list_messages(&self, token: &str) -> mailfade_api::Result<Vec<MessageSummary>> {
        Self::list_messages(self, token).await
    }

    async fn get_message(&self, token: &str, id: &str) -> mailfade_api::Result<Message> {
        Self::get_message(self, token, id).await
    }

    async fn mark_seen(&self, token: &str, id: &str) -> mailfade_api::Result<()> {
        Self::mark_seen(self, token, id).await
    }

    async fn delete_message(&self, token: &str, id: &str) -> mailfade_api::Result<()> {
        Self::delete_message(self, token, id).await
    }

    async fn delete_account(&self, token: &str, id: &str) -> mailfade_api::Result<()> {
        Self::delete_account(self, token, id).await
    }
}
