//! HTTP client for the GLPI REST API
//!
//! [`GlpiClient`] is the only place that knows the wire conventions:
//! the `/{Type}` / `/search/{Type}` / `/{Type}/{id}/{Related}` path scheme,
//! the `App-Token` / `Authorization` / `Session-Token` headers, and the
//! `{"input": ...}` write envelope. It speaks through the [`Transport`]
//! trait so tests can substitute a scripted transport.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::models::{CreateOutcome, Credentials, ResourceType, SessionToken};
use super::search::{Criterion, SearchReply, criteria_params};

/// HTTP method subset the API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// One request at the transport seam.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub session: Option<String>,
}

/// Raw response: status plus body text. The body is kept as text because
/// several error paths need the unparsed payload for duplicate-signature
/// classification.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Transport seam between the client and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// reqwest-backed transport carrying the credential headers.
pub struct HttpTransport {
    http: reqwest::Client,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.credentials.url.trim_end_matches('/'), request.path);

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self
            .http
            .request(method, &url)
            .header("App-Token", &self.credentials.app_token)
            .header(
                "Authorization",
                format!("user_token {}", self.credentials.user_token),
            );

        if let Some(session) = &request.session {
            builder = builder.header("Session-Token", session);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading response body from {} failed", url))?;

        Ok(ApiResponse { status, body })
    }
}

/// High-level GLPI API client.
#[derive(Clone)]
pub struct GlpiClient {
    transport: Arc<dyn Transport>,
}

impl GlpiClient {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            transport: Arc::new(HttpTransport::new(credentials)),
        }
    }

    /// Build a client over an arbitrary transport (used by tests).
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub(super) async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.transport.execute(request).await
    }

    /// Fetch the full collection of a resource type.
    ///
    /// A non-list body (some servers answer an object or an error string
    /// when the collection is empty) degrades to an empty listing.
    pub async fn list(&self, session: &SessionToken, resource: ResourceType) -> Result<Vec<Value>> {
        let response = self
            .execute(ApiRequest {
                method: Method::Get,
                path: resource.endpoint().to_string(),
                query: Vec::new(),
                body: None,
                session: Some(session.0.clone()),
            })
            .await?;

        if !response.is_success() {
            log::debug!(
                "listing {} answered HTTP {}; treating as empty",
                resource,
                response.status
            );
            return Ok(Vec::new());
        }

        match response.json() {
            Some(Value::Array(items)) => Ok(items),
            other => {
                log::debug!("listing {} returned a non-list shape: {:?}", resource, other);
                Ok(Vec::new())
            }
        }
    }

    /// Run an indexed-criteria search and normalize the reply.
    pub async fn search(
        &self,
        session: &SessionToken,
        resource: ResourceType,
        criteria: &[Criterion],
    ) -> Result<SearchReply> {
        let response = self
            .execute(ApiRequest {
                method: Method::Get,
                path: format!("search/{}", resource.endpoint()),
                query: criteria_params(criteria),
                body: None,
                session: Some(session.0.clone()),
            })
            .await?;

        // 206 is a partial listing, still a valid envelope
        if !response.is_success() {
            log::debug!(
                "search {} answered HTTP {}: {}",
                resource,
                response.status,
                response.body
            );
        }
        Ok(SearchReply::parse(response.json().unwrap_or(Value::Null)))
    }

    /// Create a resource; the payload is wrapped in the `input` envelope.
    pub async fn create(
        &self,
        session: &SessionToken,
        resource: ResourceType,
        input: Value,
    ) -> Result<CreateOutcome> {
        self.create_at(session, resource.endpoint(), input).await
    }

    /// Create against an arbitrary endpoint (join records like
    /// `Profile_User` have no [`ResourceType`] of their own).
    pub async fn create_at(
        &self,
        session: &SessionToken,
        endpoint: &str,
        input: Value,
    ) -> Result<CreateOutcome> {
        let response = self
            .execute(ApiRequest {
                method: Method::Post,
                path: endpoint.to_string(),
                query: Vec::new(),
                body: Some(serde_json::json!({ "input": input })),
                session: Some(session.0.clone()),
            })
            .await?;
        Ok(CreateOutcome::classify(response.status, &response.body))
    }

    /// Full overwrite of an existing resource.
    pub async fn update(
        &self,
        session: &SessionToken,
        endpoint: &str,
        id: i64,
        input: Value,
    ) -> Result<ApiResponse> {
        self.execute(ApiRequest {
            method: Method::Put,
            path: format!("{}/{}", endpoint, id),
            query: Vec::new(),
            body: Some(serde_json::json!({ "input": input })),
            session: Some(session.0.clone()),
        })
        .await
    }

    /// Fetch sub-resources of a record (`/{Type}/{id}/{Related}`).
    pub async fn children(
        &self,
        session: &SessionToken,
        resource: ResourceType,
        id: i64,
        related: &str,
    ) -> Result<Vec<Value>> {
        let response = self
            .execute(ApiRequest {
                method: Method::Get,
                path: format!("{}/{}/{}", resource.endpoint(), id, related),
                query: Vec::new(),
                body: None,
                session: Some(session.0.clone()),
            })
            .await?;

        if !response.is_success() {
            return Ok(Vec::new());
        }
        match response.json() {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Object(map)) => Ok(vec![Value::Object(map)]),
            _ => Ok(Vec::new()),
        }
    }
}
