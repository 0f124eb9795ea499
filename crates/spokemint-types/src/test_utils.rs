//! shared test fixtures.
//!
//! only compiled into downstream test builds; nothing here is part of the
//! runtime api.

use chrono::{DateTime, Duration, Utc};

use crate::request::{DEFAULT_VALIDITY_SECS, Request, RequestStatus};
use crate::token::Token;

/// builder for [`Request`] fixtures.
///
/// ```
/// use spokemint_types::test_utils::TestRequestBuilder;
///
/// let request = TestRequestBuilder::new("agent-a")
///     .with_namespace("prod")
///     .issued_expiring_in(chrono::Duration::days(30))
///     .build();
/// assert!(request.status.is_issued());
/// ```
#[derive(Debug, Clone)]
pub struct TestRequestBuilder {
    namespace: String,
    name: String,
    revision: u64,
    validity_secs: u64,
    token: Option<Token>,
    expires_at: Option<DateTime<Utc>>,
    ca_certificate: Option<Vec<u8>>,
}

impl TestRequestBuilder {
    /// start a builder for a request named `name` in the `default` namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: "default".to_string(),
            name: name.into(),
            revision: 1,
            validity_secs: DEFAULT_VALIDITY_SECS,
            token: None,
            expires_at: None,
            ca_certificate: None,
        }
    }

    /// place the request in `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// set the hub revision.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// set the requested validity in seconds.
    pub fn with_validity_secs(mut self, validity_secs: u64) -> Self {
        self.validity_secs = validity_secs;
        self
    }

    /// record a token in the status without touching the other fields.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Token::new(token));
        self
    }

    /// record an absolute expiry in the status.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// record a ca bundle in the status.
    pub fn with_ca_certificate(mut self, ca_certificate: impl Into<Vec<u8>>) -> Self {
        self.ca_certificate = Some(ca_certificate.into());
        self
    }

    /// fill the whole status with a token that expires `lifetime` from now.
    pub fn issued_expiring_in(self, lifetime: Duration) -> Self {
        let expires_at = Utc::now() + lifetime;
        self.with_token("smt-test-token")
            .with_expires_at(expires_at)
            .with_ca_certificate(b"test-ca-bundle".as_slice())
    }

    /// build the [`Request`].
    pub fn build(self) -> Request {
        let now = Utc::now();
        Request {
            namespace: self.namespace,
            name: self.name,
            revision: self.revision,
            validity_secs: self.validity_secs,
            status: RequestStatus {
                token: self.token,
                expires_at: self.expires_at,
                ca_certificate: self.ca_certificate,
            },
            created_at: now,
            updated_at: now,
        }
    }
}
