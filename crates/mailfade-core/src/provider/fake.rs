//! In-process fake provider for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use mailfade_api::{
    Domain, Error as ApiError, Message, MessageSummary, RemoteAccount, TokenResponse,
};

use super::MailProvider;

/// Builds a domain record for tests.
pub(crate) fn domain(name: &str, is_active: bool, is_private: bool) -> Domain {
    Domain {
        id: format!("dom-{name}"),
        domain: name.to_string(),
        is_active,
        is_private,
        created_at: Some(Utc::now()),
        updated_at: None,
    }
}

#[derive(Default)]
struct Inner {
    domains: Vec<Domain>,
    next_id: u32,
    accounts: HashMap<String, RemoteAccount>,
    tokens: HashMap<String, String>,
    messages: Vec<MessageSummary>,
    full_messages: HashMap<String, Message>,
    fail_polls_remaining: u32,
    fail_all_polls: bool,
    fail_deletes: bool,
    delete_gone: bool,
    create_calls: u32,
    poll_calls: u32,
    delete_calls: u32,
}

/// Scriptable in-memory provider.
pub(crate) struct FakeProvider {
    inner: Mutex<Inner>,
}

#[allow(clippy::unwrap_used)]
impl FakeProvider {
    /// A fake with a single usable domain.
    pub(crate) fn new() -> Self {
        Self::with_domains(vec![domain("fade.test", true, false)])
    }

    pub(crate) fn with_domains(domains: Vec<Domain>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                domains,
                ..Inner::default()
            }),
        }
    }

    /// Drops an account and its tokens, as if the provider purged it.
    pub(crate) fn forget_account(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.accounts.remove(id);
        inner.tokens.retain(|_, account_id| account_id != id);
    }

    pub(crate) fn set_messages(&self, messages: Vec<MessageSummary>) {
        self.inner.lock().unwrap().messages = messages;
    }

    pub(crate) fn put_full_message(&self, message: Message) {
        self.inner
            .lock()
            .unwrap()
            .full_messages
            .insert(message.id.clone(), message);
    }

    /// The next `n` polls fail with a retryable server error.
    pub(crate) fn fail_next_polls(&self, n: u32) {
        self.inner.lock().unwrap().fail_polls_remaining = n;
    }

    /// Every poll fails with a retryable server error.
    pub(crate) fn fail_all_polls(&self, fail: bool) {
        self.inner.lock().unwrap().fail_all_polls = fail;
    }

    /// Every account deletion fails with a retryable server error.
    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_deletes = fail;
    }

    /// Account deletions report the account as already gone.
    pub(crate) fn set_delete_gone(&self, gone: bool) {
        self.inner.lock().unwrap().delete_gone = gone;
    }

    pub(crate) fn create_calls(&self) -> u32 {
        self.inner.lock().unwrap().create_calls
    }

    pub(crate) fn poll_calls(&self) -> u32 {
        self.inner.lock().unwrap().poll_calls
    }

    pub(crate) fn delete_calls(&self) -> u32 {
        self.inner.lock().unwrap().delete_calls
    }
}

#[allow(clippy::unwrap_used, clippy::significant_drop_tightening)]
#[async_trait]
impl MailProvider for FakeProvider {
    async fn list_domains(&self) -> mailfade_api::Result<Vec<Domain>> {
        Ok(self.inner.lock().unwrap().domains.clone())
    }

    async fn create_account(
        &self,
        address: &str,
        _password: &str,
    ) -> mailfade_api::Result<RemoteAccount> {
        let mut inner = self.inner.lock().unwrap();
        inner.create_calls += 1;
        inner.next_id += 1;
        let id = format!("acc-{}", inner.next_id);
        let account = RemoteAccount {
            id: id.clone(),
            address: address.to_string(),
            quota: 40_000_000,
            used: 0,
            is_disabled: false,
            is_deleted: false,
            created_at: Some(Utc::now()),
            updated_at: None,
        };
        inner.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn request_token(
        &self,
        address: &str,
        _password: &str,
    ) -> mailfade_api::Result<TokenResponse> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner
            .accounts
            .values()
            .find(|a| a.address == address)
            .map(|a| a.id.clone())
            .ok_or(ApiError::AccountGone)?;
        let token = format!("tok-{id}");
        inner.tokens.insert(token.clone(), id.clone());
        Ok(TokenResponse { token, id })
    }

    async fn get_account(&self, token: &str) -> mailfade_api::Result<RemoteAccount> {
        let inner = self.inner.lock().unwrap();
        let id = inner.tokens.get(token).ok_or(ApiError::AccountGone)?;
        inner
            .accounts
            .get(id)
            .cloned()
            .ok_or(ApiError::AccountGone)
    }

    async fn list_messages(&self, token: &str) -> mailfade_api::Result<Vec<MessageSummary>> {
        let mut inner = self.inner.lock().unwrap();
        inner.poll_calls += 1;
        if inner.fail_all_polls {
            return Err(ApiError::api(503, "provider unavailable"));
        }
        if inner.fail_polls_remaining > 0 {
            inner.fail_polls_remaining -= 1;
            return Err(ApiError::api(503, "provider unavailable"));
        }
        if !inner.tokens.contains_key(token) {
            return Err(ApiError::AccountGone);
        }
        Ok(inner.messages.clone())
    }

    async fn get_message(&self, _token: &str, id: &str) -> mailfade_api::Result<Message> {
        self.inner
            .lock()
            .unwrap()
            .full_messages
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::api(404, "message not found"))
    }

    async fn mark_seen(&self, _token: &str, _id: &str) -> mailfade_api::Result<()> {
        Ok(())
    }

    async fn delete_message(&self, _token: &str, id: &str) -> mailfade_api::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.messages.retain(|m| m.id != id);
        inner.full_messages.remove(id);
        Ok(())
    }

    async fn delete_account(&self, _token: &str, id: &str) -> mailfade_api::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.delete_calls += 1;
        if inner.delete_gone {
            return Err(ApiError::AccountGone);
        }
        if inner.fail_deletes {
            return Err(ApiError::api(503, "provider unavailable"));
        }
        inner.accounts.remove(id);
        Ok(())
    }
}
