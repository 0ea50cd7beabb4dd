//! The inbox lifecycle service.
//!
//! Owns the current inbox's state machine and keeps it synchronized
//! with the remote provider: creation, adaptive polling, message
//! operations, expiry, and teardown.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use mailfade_api::{Domain, Message, MessageSummary};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::model::{ActiveInbox, InboxConfig, InboxPhase, InboxState};
use crate::account::{Account, AccountId};
use crate::audit::AuditAction;
use crate::error::{Error, Result};
use crate::provider::MailProvider;
use crate::session::StoredSession;
use crate::store::Store;
use crate::retry::backoff_delay;

/// Manages the single current inbox.
pub struct InboxService {
    provider: Arc<dyn MailProvider>,
    store: Arc<Store>,
    config: InboxConfig,
    state: InboxState,
}

impl InboxService {
    /// Create an inbox service starting in the anonymous state.
    pub fn new(provider: Arc<dyn MailProvider>, store: Arc<Store>, config: InboxConfig) -> Self {
        Self {
            provider,
            store,
            config,
            state: InboxState::Anonymous,
        }
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &InboxState {
        &self.state
    }

    /// The current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> InboxPhase {
        self.state.phase()
    }

    /// The current inbox address, if there is one.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        match &self.state {
            InboxState::Active(active) => Some(&active.account.address),
            InboxState::Expired { address } | InboxState::Deleted { address } => Some(address),
            _ => None,
        }
    }

    /// The cached message list (empty unless active).
    #[must_use]
    pub fn messages(&self) -> &[MessageSummary] {
        match &self.state {
            InboxState::Active(active) => &active.messages,
            _ => &[],
        }
    }

    /// Reload a persisted session from the store, if one exists and its
    /// account is still live. An already-expired session is expired on
    /// the spot (best-effort remote delete, local state cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if called outside the anonymous state or if the
    /// store fails.
    pub async fn restore_session(&mut self) -> Result<bool> {
        if !matches!(self.state, InboxState::Anonymous) {
            return Err(Error::InvalidState("session already initialized"));
        }

        let Some(session) = self.store.session().current().await? else {
            return Ok(false);
        };

        let Some(account) = self.store.accounts().get(&session.account_id).await? else {
            warn!(
                "Session references unknown account {}, clearing",
                session.account_id
            );
            self.store.session().clear_current().await?;
            return Ok(false);
        };

        if account.deleted {
            self.store.session().clear_current().await?;
            return Ok(false);
        }

        debug!("Restored session for {}", account.address);
        self.state = InboxState::Active(ActiveInbox {
            account,
            messages: Vec::new(),
        });

        if self.expire_if_due().await {
            return Ok(false);
        }
        Ok(true)
    }

    /// Create a new inbox: pick a random usable domain, generate
    /// credentials, provision the remote account, and persist it with
    /// `expires_at = now + ttl`.
    ///
    /// On any failure the state resets to anonymous and no partial
    /// local state survives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDomainsAvailable`] when the provider offers
    /// no active, non-private domain; [`Error::InvalidState`] when an
    /// inbox is already active; otherwise provider or store errors.
    pub async fn create_inbox(&mut self) -> Result<&Account> {
        if matches!(self.phase(), InboxPhase::Active | InboxPhase::Creating) {
            return Err(Error::InvalidState("an inbox is already active"));
        }

        self.state = InboxState::Creating;
        match self.provision().await {
            Ok(active) => {
                self.state = InboxState::Active(active);
                let InboxState::Active(active) = &self.state else {
                    unreachable!()
                };
                Ok(&active.account)
            }
            Err(e) => {
                self.state = InboxState::Anonymous;
                Err(e)
            }
        }
    }

    async fn provision(&self) -> Result<ActiveInbox> {
        let domains = self.provider.list_domains().await?;
        let usable: Vec<Domain> = domains.into_iter().filter(Domain::is_usable).collect();
        let Some(domain) = usable.choose(&mut rand::thread_rng()) else {
            return Err(Error::NoDomainsAvailable);
        };

        let local_part = random_token(self.config.local_part_len).to_lowercase();
        let password = random_token(self.config.password_len);
        let address = format!("{local_part}@{}", domain.domain);

        self.provider.create_account(&address, &password).await?;
        let token = self.provider.request_token(&address, &password).await?;
        let canonical = self.provider.get_account(&token.token).await?;

        let now = Utc::now();
        let expires_at = now + self.config.ttl;
        let account = Account::new(
            AccountId::new(canonical.id),
            canonical.address,
            password,
            token.token,
            now,
            expires_at,
        );

        self.store.accounts().save(&account).await?;
        self.store
            .audit()
            .append(&account.id, AuditAction::Created, Some(&account.address))
            .await?;
        self.store
            .session()
            .set_current(&StoredSession {
                account_id: account.id.clone(),
                address: account.address.clone(),
                token: account.token.clone(),
                expires_at,
            })
            .await?;

        info!("Created inbox {} (expires {expires_at})", account.address);
        Ok(ActiveInbox {
            account,
            messages: Vec::new(),
        })
    }

    /// Poll the provider for the message list.
    ///
    /// Transient failures are retried up to the configured count with
    /// capped exponential backoff. An "account gone" answer is
    /// authoritative: local state resets and the error is surfaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when no unexpired inbox is
    /// active, or the last provider error once retries are exhausted.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn refresh_messages(&mut self) -> Result<&[MessageSummary]> {
        let now = Utc::now();
        let (token, account_id, expired) = match &self.state {
            InboxState::Active(active) => (
                active.account.token.clone(),
                active.account.id.clone(),
                active.account.is_expired(now),
            ),
            _ => return Err(Error::InvalidState("no active inbox")),
        };

        // Polling suspends once expiry passes
        if expired {
            return Err(Error::InvalidState("inbox has expired"));
        }

        let mut attempt = 0u32;
        let messages = loop {
            match self.provider.list_messages(&token).await {
                Ok(messages) => break messages,
                Err(mailfade_api::Error::AccountGone) => {
                    warn!("Account {account_id} no longer exists on the provider");
                    self.reset_gone(&account_id).await;
                    return Err(Error::Api(mailfade_api::Error::AccountGone));
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_poll_retries => {
                    let delay = backoff_delay(
                        self.config.retry_base_delay,
                        self.config.retry_max_delay,
                        attempt,
                    );
                    debug!("Poll failed ({e}), retry {} in {delay:?}", attempt + 1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let count = messages.len() as u32;
        let fresh = {
            let InboxState::Active(active) = &mut self.state else {
                unreachable!()
            };
            let known: HashSet<&str> = active.messages.iter().map(|m| m.id.as_str()).collect();
            let fresh = messages
                .iter()
                .filter(|m| !known.contains(m.id.as_str()))
                .count();
            active.messages = messages;
            active.account.message_count = count;
            active.account.last_accessed_at = Some(now);
            fresh
        };

        self.store.accounts().record_access(&account_id, count).await?;
        if fresh > 0 {
            self.store
                .audit()
                .append(
                    &account_id,
                    AuditAction::Accessed,
                    Some(&format!("{fresh} new message(s)")),
                )
                .await?;
        }

        let InboxState::Active(active) = &self.state else {
            unreachable!()
        };
        Ok(&active.messages)
    }

    /// Poll interval for the current state: tighter while the inbox is
    /// empty, relaxed once mail exists.
    #[must_use]
    pub fn poll_interval(&self) -> StdDuration {
        match &self.state {
            InboxState::Active(active) if !active.messages.is_empty() => {
                self.config.poll_interval_active
            }
            _ => self.config.poll_interval_empty,
        }
    }

    /// Fetch a full message, marking it seen on the provider
    /// (best-effort) and in the cached list.
    ///
    /// # Errors
    ///
    /// Returns an error if no inbox is active or the fetch fails.
    pub async fn read_message(&mut self, id: &str) -> Result<Message> {
        let token = self.active_token()?;
        let message = self.provider.get_message(&token, id).await?;

        if let Err(e) = self.provider.mark_seen(&token, id).await {
            debug!("Failed to mark message {id} seen: {e}");
        }
        if let InboxState::Active(active) = &mut self.state
            && let Some(summary) = active.messages.iter_mut().find(|m| m.id == id)
        {
            summary.seen = true;
        }

        Ok(message)
    }

    /// Delete one message and drop it from the cached list.
    ///
    /// # Errors
    ///
    /// Returns an error if no inbox is active or the deletion fails.
    pub async fn delete_message(&mut self, id: &str) -> Result<()> {
        let token = self.active_token()?;
        self.provider.delete_message(&token, id).await?;

        if let InboxState::Active(active) = &mut self.state {
            active.messages.retain(|m| m.id != id);
        }
        Ok(())
    }

    /// Explicit user-initiated deletion.
    ///
    /// The remote delete is attempted once and logged; local state is
    /// cleared regardless of the remote outcome. A failed remote delete
    /// leaves the account eligible for the cleanup sweeps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when no inbox is active.
    pub async fn delete_inbox(&mut self) -> Result<()> {
        let InboxState::Active(active) = &self.state else {
            return Err(Error::InvalidState("no active inbox"));
        };
        let account = active.account.clone();
        let address = account.address.clone();

        self.teardown(&account, "user-requested").await;
        self.state = InboxState::Deleted { address };
        Ok(())
    }

    /// Extend the inbox's lifetime. The one sanctioned expiry mutation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when no inbox is active, or a
    /// store error.
    pub async fn extend_inbox(&mut self, extra: Duration) -> Result<DateTime<Utc>> {
        let InboxState::Active(active) = &mut self.state else {
            return Err(Error::InvalidState("no active inbox"));
        };
        active.account.extend(extra);
        let account = active.account.clone();

        self.store
            .accounts()
            .extend_expiry(&account.id, account.expires_at)
            .await?;
        self.store
            .session()
            .set_current(&StoredSession {
                account_id: account.id.clone(),
                address: account.address.clone(),
                token: account.token.clone(),
                expires_at: account.expires_at,
            })
            .await?;

        Ok(account.expires_at)
    }

    /// Time left before the active inbox expires.
    #[must_use]
    pub fn time_remaining(&self) -> Option<Duration> {
        match &self.state {
            InboxState::Active(active) => Some(active.account.time_remaining(Utc::now())),
            _ => None,
        }
    }

    /// The expiry instant of the active inbox, for use with
    /// `tokio::time::sleep_until`. Dropping the sleep cancels the watch.
    #[must_use]
    pub fn expiry_deadline(&self) -> Option<tokio::time::Instant> {
        match &self.state {
            InboxState::Active(active) => {
                let remaining = active
                    .account
                    .time_remaining(Utc::now())
                    .to_std()
                    .unwrap_or_default();
                Some(tokio::time::Instant::now() + remaining)
            }
            _ => None,
        }
    }

    /// Run the expiry path if the active inbox is past its deadline.
    ///
    /// Shares the teardown with explicit deletion: best-effort remote
    /// delete, logged either way, and local state (including the
    /// session key) cleared even when the remote call fails.
    pub async fn expire_if_due(&mut self) -> bool {
        let now = Utc::now();
        let account = match &self.state {
            InboxState::Active(active) if active.account.is_expired(now) => active.account.clone(),
            _ => return false,
        };
        let address = account.address.clone();
        info!("Inbox {address} expired");

        if let Err(e) = self
            .store
            .audit()
            .append(&account.id, AuditAction::Expired, None)
            .await
        {
            warn!("Failed to audit expiry of {}: {e}", account.id);
        }

        self.teardown(&account, "expired").await;
        self.state = InboxState::Expired { address };
        true
    }

    /// Shared teardown for deletion and expiry. Returns whether the
    /// remote delete succeeded; local cleanup always happens.
    async fn teardown(&self, account: &Account, reason: &str) -> bool {
        if let Err(e) = self
            .store
            .audit()
            .append(&account.id, AuditAction::CleanupAttempted, Some(reason))
            .await
        {
            warn!("Failed to record teardown attempt for {}: {e}", account.id);
        }

        let deleted = match self
            .provider
            .delete_account(&account.token, account.id.as_str())
            .await
        {
            Ok(()) | Err(mailfade_api::Error::AccountGone) => true,
            Err(e) => {
                let detail = e.to_string();
                warn!("Remote delete of {} failed: {detail}", account.id);
                if let Err(e) = self.store.accounts().record_cleanup_attempt(&account.id).await {
                    warn!("Failed to bump attempt counter for {}: {e}", account.id);
                }
                if let Err(e) = self
                    .store
                    .audit()
                    .append(&account.id, AuditAction::CleanupFailed, Some(&detail))
                    .await
                {
                    warn!("Failed to audit teardown failure of {}: {e}", account.id);
                }
                if let Err(e) = self
                    .store
                    .cleanup()
                    .record(&account.id, reason, false, Some(&detail))
                    .await
                {
                    warn!("Failed to log teardown failure of {}: {e}", account.id);
                }
                false
            }
        };

        if deleted {
            if let Err(e) = self.store.accounts().mark_deleted(&account.id).await {
                warn!("Failed to mark {} deleted: {e}", account.id);
            }
            if let Err(e) = self
                .store
                .audit()
                .append(&account.id, AuditAction::Deleted, Some(reason))
                .await
            {
                warn!("Failed to audit deletion of {}: {e}", account.id);
            }
            if let Err(e) = self
                .store
                .cleanup()
                .record(&account.id, reason, true, None)
                .await
            {
                warn!("Failed to log deletion of {}: {e}", account.id);
            }
        }

        // Local teardown always succeeds
        if let Err(e) = self.store.session().clear_current().await {
            warn!("Failed to clear session: {e}");
        }

        deleted
    }

    /// Local reset after the provider reports the account gone.
    async fn reset_gone(&mut self, account_id: &AccountId) {
        let address = self.address().unwrap_or_default().to_string();

        if let Err(e) = self.store.accounts().mark_deleted(account_id).await {
            warn!("Failed to mark {account_id} deleted: {e}");
        }
        if let Err(e) = self
            .store
            .audit()
            .append(
                account_id,
                AuditAction::Expired,
                Some("account no longer exists"),
            )
            .await
        {
            warn!("Failed to audit remote expiry of {account_id}: {e}");
        }
        if let Err(e) = self.store.session().clear_current().await {
            warn!("Failed to clear session: {e}");
        }

        self.state = InboxState::Expired { address };
    }

    fn active_token(&self) -> Result<String> {
        match &self.state {
            InboxState::Active(active) => Ok(active.account.token.clone()),
            _ => Err(Error::InvalidState("no active inbox")),
        }
    }
}

/// Random alphanumeric string for local parts and passwords.
fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
