//! HTTP client for the provider REST API.

use reqwest::{Response, StatusCode, header};
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::types::{
    Collection, Domain, ErrorBody, Message, MessageSummary, RemoteAccount, TokenResponse,
};

/// Default public provider endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.mail.tm";

/// Request body for account creation and token issuance.
#[derive(Debug, Serialize)]
struct CredentialsRequest<'a> {
    address: &'a str,
    password: &'a str,
}

/// Client for a mail.tm-compatible REST provider.
///
/// Authenticated calls take the bearer token explicitly, so one client
/// can serve concurrent callers acting on different accounts without
/// shared mutable state.
#[derive(Debug, Clone)]
pub struct MailClient {
    http: reqwest::Client,
    base_url: String,
}

impl MailClient {
    /// Creates a client against the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse.
    pub fn new(base_url: &str) -> Result<Self> {
        Url::parse(base_url)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client against the default public provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in URL fails to parse (it does not).
    pub fn public() -> Result<Self> {
        Self::new(DEFAULT_BASE_URL)
    }

    /// The base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Lists the sending domains offered by the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn list_domains(&self) -> Result<Vec<Domain>> {
        let response = self.http.get(self.url("domains")).send().await?;
        let collection: Collection<Domain> = check(response).await?.json().await?;
        Ok(collection.into_items())
    }

    /// Creates a new account with the given address and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; a 422 typically means the
    /// address is already taken or the domain is not accepted.
    pub async fn create_account(&self, address: &str, password: &str) -> Result<RemoteAccount> {
        let response = self
            .http
            .post(self.url("accounts"))
            .json(&CredentialsRequest { address, password })
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Exchanges account credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the credentials are rejected.
    pub async fn request_token(&self, address: &str, password: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.url("token"))
            .json(&CredentialsRequest { address, password })
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fetches the canonical account record for the token's account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountGone`] if the account no longer exists.
    pub async fn get_account(&self, token: &str) -> Result<RemoteAccount> {
        let response = self
            .http
            .get(self.url("me"))
            .bearer_auth(token)
            .send()
            .await?;
        let response = check(response).await.map_err(gone_when_unauthorized)?;
        Ok(response.json().await?)
    }

    /// Lists messages in the token's inbox, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountGone`] if the account no longer exists.
    pub async fn list_messages(&self, token: &str) -> Result<Vec<MessageSummary>> {
        let response = self
            .http
            .get(self.url("messages"))
            .bearer_auth(token)
            .send()
            .await?;
        let response = check(response).await.map_err(gone_when_expired)?;
        let collection: Collection<MessageSummary> = response.json().await?;
        Ok(collection.into_items())
    }

    /// Fetches a full message by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountGone`] if the token's account no longer
    /// exists; a missing message surfaces as a 404 API error.
    pub async fn get_message(&self, token: &str, id: &str) -> Result<Message> {
        let response = self
            .http
            .get(self.url(&format!("messages/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        let response = check(response).await.map_err(gone_when_expired)?;
        Ok(response.json().await?)
    }

    /// Marks a message as seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn mark_seen(&self, token: &str, id: &str) -> Result<()> {
        let response = self
            .http
            .patch(self.url(&format!("messages/{id}")))
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/merge-patch+json")
            .body(r#"{"seen":true}"#)
            .send()
            .await?;
        check(response).await.map_err(gone_when_expired)?;
        Ok(())
    }

    /// Deletes a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_message(&self, token: &str, id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("messages/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        check(response).await.map_err(gone_when_expired)?;
        Ok(())
    }

    /// Deletes the account itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountGone`] if the account was already removed.
    pub async fn delete_account(&self, token: &str, id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("accounts/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        check(response).await.map_err(gone_when_unauthorized)?;
        Ok(())
    }
}

/// Turns a non-success response into a typed error.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(Error::RateLimited { retry_after });
    }

    let body: ErrorBody = response.json().await.unwrap_or_default();
    Err(Error::api(status.as_u16(), body.message()))
}

/// On account-scoped endpoints both 401 and 404 mean the account is gone.
fn gone_when_unauthorized(err: Error) -> Error {
    match err {
        Error::Api {
            status: 401 | 404, ..
        } => Error::AccountGone,
        other => other,
    }
}

/// On message endpoints only 401 is authoritative; 404 is a missing message.
fn gone_when_expired(err: Error) -> Error {
    match err {
        Error::Api { status: 401, .. } => Error::AccountGone,
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = MailClient::new("https://api.example.test/").unwrap();
        assert_eq!(client.base_url(), "https://api.example.test");
        assert_eq!(client.url("domains"), "https://api.example.test/domains");
    }

    #[test]
    fn test_client_rejects_invalid_base_url() {
        assert!(MailClient::new("not a url").is_err());
    }

    #[test]
    fn test_public_client() {
        let client = MailClient::public().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_gone_mapping() {
        assert!(matches!(
            gone_when_unauthorized(Error::api(404, "not found")),
            Error::AccountGone
        ));
        assert!(matches!(
            gone_when_unauthorized(Error::api(401, "unauthorized")),
            Error::AccountGone
        ));
        assert!(matches!(
            gone_when_expired(Error::api(404, "not found")),
            Error::Api { status: 404, .. }
        ));
        assert!(matches!(
            gone_when_expired(Error::api(401, "unauthorized")),
            Error::AccountGone
        ));
    }
}
