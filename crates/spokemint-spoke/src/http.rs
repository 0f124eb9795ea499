//! http spoke client.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use spokemint_types::Token;

use crate::client::{IssuedToken, SpokeClient};
use crate::error::{Result, SpokeError};

/// client for a remote spoke speaking the json issuance api.
///
/// - `POST {base}/namespaces/{ns}/identities` registers an identity
/// - `POST {base}/namespaces/{ns}/identities/{name}/token` mints a token
#[derive(Debug, Clone)]
pub struct HttpSpoke {
    client: reqwest::Client,
    base_url: String,
    bearer: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct CreateIdentityRequest {
    name: String,
    labels: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct IssueTokenRequest {
    validity_secs: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

impl HttpSpoke {
    /// create a client for the spoke at `base_url`.
    pub fn new(base_url: impl Into<String>, bearer: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer,
        }
    }

    fn post(&self, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url);
        if let Some(bearer) = &self.bearer {
            builder = builder.bearer_auth(bearer.expose_secret());
        }
        builder
    }
}

impl SpokeClient for HttpSpoke {
    async fn create_identity(
        &self,
        namespace: String,
        name: String,
        labels: HashMap<String, String>,
    ) -> Result<()> {
        let url = format!("{}/namespaces/{namespace}/identities", self.base_url);
        let response = self
            .post(url)
            .json(&CreateIdentityRequest {
                name: name.clone(),
                labels,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(identity = %format!("{namespace}/{name}"), "spoke identity created");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            Err(SpokeError::AlreadyExists(format!("{namespace}/{name}")))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(SpokeError::Denied(format!("{status}: {body}")))
        } else {
            Err(SpokeError::Api(format!(
                "identity creation failed: {status}: {body}"
            )))
        }
    }

    async fn issue_token(
        &self,
        namespace: String,
        identity: String,
        validity_secs: u64,
    ) -> Result<IssuedToken> {
        let url = format!(
            "{}/namespaces/{namespace}/identities/{identity}/token",
            self.base_url
        );
        let response = self
            .post(url)
            .json(&IssueTokenRequest { validity_secs })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let granted: TokenResponse = response.json().await?;
            return Ok(IssuedToken {
                token: Token::new(granted.token),
                expires_at: granted.expires_at,
            });
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            Err(SpokeError::IdentityNotFound(format!(
                "{namespace}/{identity}"
            )))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(SpokeError::Denied(format!("{status}: {body}")))
        } else {
            Err(SpokeError::Api(format!(
                "token issuance failed: {status}: {body}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use spokemint_types::managed_labels;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn spoke_against(server: &MockServer) -> HttpSpoke {
        HttpSpoke::new(server.uri(), Some(SecretString::from("hub-credential")))
    }

    #[tokio::test]
    async fn create_identity_posts_name_and_labels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/namespaces/fleet/identities"))
            .and(header("authorization", "Bearer hub-credential"))
            .and(body_json(serde_json::json!({
                "name": "agent-a",
                "labels": { "spokemint.dev/managed": "true" },
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let spoke = spoke_against(&server).await;
        spoke
            .create_identity("fleet".to_string(), "agent-a".to_string(), managed_labels())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_identity_conflict_maps_to_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/namespaces/fleet/identities"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let spoke = spoke_against(&server).await;
        let err = spoke
            .create_identity("fleet".to_string(), "agent-a".to_string(), managed_labels())
            .await
            .unwrap_err();
        assert!(err.is_already_exists(), "expected already-exists: {err:?}");
    }

    #[tokio::test]
    async fn issue_token_parses_the_granted_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/namespaces/fleet/identities/agent-a/token"))
            .and(body_json(serde_json::json!({ "validity_secs": 3600 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "smt-remote-token",
                "expires_at": "2026-09-25T12:00:00Z",
            })))
            .mount(&server)
            .await;

        let spoke = spoke_against(&server).await;
        let issued = spoke
            .issue_token("fleet".to_string(), "agent-a".to_string(), 3600)
            .await
            .unwrap();
        assert_eq!(issued.token.as_str(), "smt-remote-token");
        assert_eq!(
            issued.expires_at,
            "2026-09-25T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[tokio::test]
    async fn issue_token_404_maps_to_identity_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/namespaces/fleet/identities/ghost/token"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let spoke = spoke_against(&server).await;
        let err = spoke
            .issue_token("fleet".to_string(), "ghost".to_string(), 3600)
            .await
            .unwrap_err();
        assert!(matches!(err, SpokeError::IdentityNotFound(_)));
    }

    #[tokio::test]
    async fn issue_token_403_maps_to_denied_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/namespaces/fleet/identities/agent-a/token"))
            .respond_with(ResponseTemplate::new(403).set_body_string("credential revoked"))
            .mount(&server)
            .await;

        let spoke = spoke_against(&server).await;
        let err = spoke
            .issue_token("fleet".to_string(), "agent-a".to_string(), 3600)
            .await
            .unwrap_err();
        match err {
            SpokeError::Denied(detail) => assert!(detail.contains("credential revoked")),
            other => panic!("expected denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unexpected_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/namespaces/fleet/identities/agent-a/token"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let spoke = spoke_against(&server).await;
        let err = spoke
            .issue_token("fleet".to_string(), "agent-a".to_string(), 3600)
            .await
            .unwrap_err();
        match err {
            SpokeError::Api(detail) => {
                assert!(detail.contains("500"));
                assert!(detail.contains("boom"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn requests_without_a_bearer_omit_the_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/namespaces/fleet/identities"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let spoke = HttpSpoke::new(server.uri(), None);
        spoke
            .create_identity("fleet".to_string(), "agent-a".to_string(), managed_labels())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].headers.contains_key("authorization"));
    }
}
