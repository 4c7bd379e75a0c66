//! Triplestore gateway: scoped and sudo SPARQL over HTTP.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use sema_config::AllowedGroup;

use crate::error::{Result, SparqlError};
use crate::results::SparqlResults;

/// Header carrying the JSON-serialized group set on scoped calls.
pub const ALLOWED_GROUPS_HEADER: &str = "mu-auth-allowed-groups";

/// Header marking administrative calls that bypass authorization.
pub const SUDO_HEADER: &str = "mu-auth-sudo";

/// Authorization scope attached to every gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthScope {
    /// Catalog-maintenance calls that bypass authorization
    Sudo,
    /// Calls evaluated under an authorization-group set
    Groups(Vec<AllowedGroup>),
}

impl AuthScope {
    /// Scope for a group set.
    pub fn groups(groups: &[AllowedGroup]) -> Self {
        AuthScope::Groups(groups.to_vec())
    }

    /// The `mu-auth-allowed-groups` header value, if this scope carries
    /// groups.
    pub fn groups_header_value(&self) -> Option<String> {
        match self {
            AuthScope::Sudo => None,
            // Serializing Vec<AllowedGroup> cannot fail.
            AuthScope::Groups(groups) => {
                Some(serde_json::to_string(groups).expect("group descriptors serialize infallibly"))
            }
        }
    }
}

/// The narrow triplestore interface the pipeline consumes.
#[async_trait]
pub trait Triplestore: Send + Sync + fmt::Debug {
    /// Run a `SELECT` query and decode the results.
    async fn select(&self, query: &str, scope: &AuthScope) -> Result<SparqlResults>;

    /// Run an `ASK` query.
    async fn ask(&self, query: &str, scope: &AuthScope) -> Result<bool>;

    /// Run a SPARQL Update.
    async fn update(&self, query: &str, scope: &AuthScope) -> Result<()>;
}

/// SPARQL 1.1 Query/Update over HTTP.
///
/// Connections come from the shared `reqwest` pool; scoped calls attach the
/// authorization-group header, sudo calls the sudo header. No retries here.
pub struct HttpTriplestore {
    http: reqwest::Client,
    query_endpoint: String,
    update_endpoint: String,
}

impl HttpTriplestore {
    /// Create a gateway against a single query+update endpoint.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_pool_size(endpoint, 16)
    }

    /// Create a gateway with an explicit connection-pool size.
    pub fn with_pool_size(endpoint: impl Into<String>, pool_size: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(pool_size)
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        let endpoint = endpoint.into();
        Ok(Self {
            http,
            query_endpoint: endpoint.clone(),
            update_endpoint: endpoint,
        })
    }

    /// Builder method to route updates to a separate endpoint.
    pub fn with_update_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.update_endpoint = endpoint.into();
        self
    }

    fn apply_scope(&self, request: reqwest::RequestBuilder, scope: &AuthScope) -> reqwest::RequestBuilder {
        match scope.groups_header_value() {
            Some(groups) => request.header(ALLOWED_GROUPS_HEADER, groups),
            None => request.header(SUDO_HEADER, "true"),
        }
    }

    async fn send_query(&self, query: &str, scope: &AuthScope) -> Result<reqwest::Response> {
        let request = self
            .http
            .post(&self.query_endpoint)
            .header("Content-Type", "application/sparql-query")
            .header("Accept", "application/sparql-results+json")
            .body(query.to_string());

        let response = self.apply_scope(request, scope).send().await?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SparqlError::Auth(format!("{status}: {body}")));
        }
        Err(SparqlError::Query {
            status: status.as_u16(),
            body,
        })
    }
}

impl fmt::Debug for HttpTriplestore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTriplestore")
            .field("query_endpoint", &self.query_endpoint)
            .field("update_endpoint", &self.update_endpoint)
            .finish()
    }
}

#[async_trait]
impl Triplestore for HttpTriplestore {
    async fn select(&self, query: &str, scope: &AuthScope) -> Result<SparqlResults> {
        let response = self.send_query(query, scope).await?;
        let value: serde_json::Value = response.json().await?;
        Ok(SparqlResults::from_json(value)?)
    }

    async fn ask(&self, query: &str, scope: &AuthScope) -> Result<bool> {
        #[derive(Deserialize)]
        struct AskWire {
            boolean: bool,
        }

        let response = self.send_query(query, scope).await?;
        let wire: AskWire = serde_json::from_value(response.json().await?)?;
        Ok(wire.boolean)
    }

    async fn update(&self, query: &str, scope: &AuthScope) -> Result<()> {
        let request = self
            .http
            .post(&self.update_endpoint)
            .header("Content-Type", "application/sparql-update")
            .body(query.to_string());

        let response = self.apply_scope(request, scope).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
