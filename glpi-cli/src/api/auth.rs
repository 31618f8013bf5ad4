//! Session lifecycle against `/initSession` and `/killSession`

use anyhow::{Context, Result, bail};
use serde_json::Value;

use super::client::{ApiRequest, GlpiClient, Method};
use super::models::SessionToken;

impl GlpiClient {
    /// Authenticate and allocate a remote session.
    ///
    /// This is the one failure in the system that aborts a run: without a
    /// session token nothing downstream can proceed.
    pub async fn open_session(&self) -> Result<SessionToken> {
        let response = self
            .execute(ApiRequest {
                method: Method::Get,
                path: "initSession".to_string(),
                query: Vec::new(),
                body: None,
                session: None,
            })
            .await
            .context("could not reach the GLPI API")?;

        if !response.is_success() {
            bail!(
                "authentication rejected (HTTP {}): {}",
                response.status,
                response.body
            );
        }

        let token = response
            .json()
            .as_ref()
            .and_then(|v| v.get("session_token"))
            .and_then(Value::as_str)
            .map(|s| SessionToken(s.to_string()))
            .context("initSession response carried no session_token")?;

        log::info!("session opened");
        Ok(token)
    }

    /// Release the session. Best-effort: the server expires sessions on
    /// its own, so failures are logged and swallowed.
    pub async fn close_session(&self, session: &SessionToken) {
        let result = self
            .execute(ApiRequest {
                method: Method::Get,
                path: "killSession".to_string(),
                query: Vec::new(),
                body: None,
                session: Some(session.0.clone()),
            })
            .await;

        match result {
            Ok(response) if response.is_success() => log::info!("session closed"),
            Ok(response) => log::warn!("killSession answered HTTP {}", response.status),
            Err(e) => log::warn!("killSession failed: {e:#}"),
        }
    }
}
