//! User provisioning
//!
//! Users are keyed by a login derived from a mandatory email address.
//! Validation happens before any network call; an existing login
//! short-circuits without updates; profile, group and email are attached
//! as separate join records, each independently best-effort.

use serde_json::{Map, Value, json};

use crate::api::search::{Criterion, FIELD_NAME};
use crate::api::{CreateOutcome, ResourceType};

use super::catalog::{catalog_id, outcome_ok};
use super::outcome::ErrorReason;
use super::Context;

/// Fixed temporary password for accounts created without a national id.
/// Documented, not secret: the account must change it at first login.
const DEFAULT_PASSWORD: &str = "Ch@nge.me123";

/// One user to provision.
#[derive(Debug, Clone)]
pub struct UserRequest {
    pub full_name: String,
    /// Raw email cell; a single leading `@` marker is tolerated
    pub email: String,
    pub entity_id: i64,
    pub profile_id: i64,
    pub group_id: i64,
    /// Status category; unset means active
    pub active: bool,
    pub national_id: Option<String>,
    pub mobile: Option<String>,
    pub title: Option<String>,
    pub comment: Option<String>,
}

impl UserRequest {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>, entity_id: i64) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            entity_id,
            profile_id: 1,
            group_id: 0,
            active: true,
            national_id: None,
            mobile: None,
            title: None,
            comment: None,
        }
    }
}

/// Create or find a user, returning its id.
pub async fn provision_user(ctx: &Context, request: &UserRequest) -> Result<i64, ErrorReason> {
    // validation is local: no network call happens for a bad row
    let (first_name, last_name) =
        split_name(&request.full_name).ok_or(ErrorReason::NameInvalid)?;
    let login = derive_login(&request.email)?;

    log::info!("provisioning user '{}' (login {login})", request.full_name);

    // idempotent short-circuit: an existing login is reused as-is
    if let Some(id) = search_by_login(ctx, &login).await? {
        log::info!("user '{login}' already exists (id {id})");
        return Ok(id);
    }

    // optional job title, resolved through the catalog machinery
    let title_id = match request.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => match catalog_id(ctx, ResourceType::UserTitle, title).await {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("title '{title}' unresolved, creating the user without it: {e}");
                None
            }
        },
        None => None,
    };

    let password = derive_password(request.national_id.as_deref());

    let mut input = Map::new();
    input.insert("name".to_string(), Value::from(login.clone()));
    input.insert("firstname".to_string(), Value::from(first_name.clone()));
    input.insert("realname".to_string(), Value::from(last_name.clone()));
    input.insert("password".to_string(), Value::from(password.clone()));
    input.insert("password2".to_string(), Value::from(password));
    input.insert("entities_id".to_string(), Value::from(request.entity_id));
    input.insert("profiles_id".to_string(), Value::from(request.profile_id));
    input.insert("is_active".to_string(), Value::from(if request.active { 1 } else { 0 }));
    input.insert("authtype".to_string(), Value::from(1));
    input.insert("groups_id".to_string(), Value::from(request.group_id));
    if let Some(cpf) = request.national_id.as_deref().and_then(normalize_national_id) {
        input.insert("registration_number".to_string(), Value::from(cpf));
    }
    if let Some(mobile) = request.mobile.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        input.insert("mobile".to_string(), Value::from(mobile));
    }
    if let Some(title_id) = title_id {
        input.insert("usertitles_id".to_string(), Value::from(title_id));
    }
    if let Some(comment) = request.comment.as_deref().filter(|c| !c.is_empty()) {
        input.insert("comment".to_string(), Value::from(comment));
    }

    let user_id = match ctx
        .client
        .create(&ctx.session, ResourceType::User, Value::Object(input))
        .await
        .map_err(|e| ErrorReason::unexpected(format!("{e:#}")))?
    {
        CreateOutcome::Created(id) => {
            log::info!("user '{login}' created (id {id})");
            id
        }
        CreateOutcome::CreatedNoId | CreateOutcome::AlreadyExists => {
            recover_user(ctx, &login, &first_name, &last_name).await?
        }
        CreateOutcome::Failed { status, body } => {
            log::error!("creating user '{login}' failed (HTTP {status}): {body}");
            return Err(ErrorReason::CreateFailed { status });
        }
    };

    // linkage is best-effort: a failed link never invalidates the user
    link_profile(ctx, user_id, request).await;
    link_group(ctx, user_id, request).await;
    link_email(ctx, user_id, &login).await;

    Ok(user_id)
}

/// Split a full name into first name and remainder-as-last-name.
fn split_name(full_name: &str) -> Option<(String, String)> {
    let mut parts = full_name.split_whitespace();
    let first = parts.next()?.to_string();
    let rest: Vec<&str> = parts.collect();
    Some((first, rest.join(" ")))
}

/// Derive the login from the email cell.
///
/// The sheet convention marks emails with a leading `@`; after stripping
/// one marker the remainder must still look like `user@domain`.
fn derive_login(raw_email: &str) -> Result<String, ErrorReason> {
    let trimmed = raw_email.trim();
    if trimmed.is_empty() {
        return Err(ErrorReason::EmailMissing);
    }
    let login = trimmed.strip_prefix('@').unwrap_or(trimmed);
    if login.is_empty() {
        return Err(ErrorReason::EmailMissing);
    }
    if !login.contains('@') {
        return Err(ErrorReason::EmailMalformed);
    }
    Ok(login.to_string())
}

/// Temporary password: deterministic from the first three digits of the
/// national id when one is given, the fixed default otherwise. Either way
/// the account is forced to change it at first login.
fn derive_password(national_id: Option<&str>) -> String {
    let digits: String = national_id
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if digits.len() >= 3 {
        format!("Tmp@{}.glpi", &digits[..3])
    } else {
        DEFAULT_PASSWORD.to_string()
    }
}

/// Digit-normalize a national id and left-pad to the 11-digit format.
fn normalize_national_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.len() > 11 {
        return None;
    }
    Some(format!("{digits:0>11}"))
}

async fn search_by_login(ctx: &Context, login: &str) -> Result<Option<i64>, ErrorReason> {
    let reply = ctx
        .client
        .search(
            &ctx.session,
            ResourceType::User,
            &[Criterion::equals(FIELD_NAME, login)],
        )
        .await
        .map_err(|e| ErrorReason::unexpected(format!("{e:#}")))?;
    Ok(reply.locate(login))
}

/// The server reported the login as taken (or answered a create without
/// an id); chase the record down through progressively wider lookups.
async fn recover_user(
    ctx: &Context,
    login: &str,
    first_name: &str,
    last_name: &str,
) -> Result<i64, ErrorReason> {
    log::warn!("user '{login}' reported as existing; locating the record");

    // (a) by login on the name column
    if let Some(id) = search_by_login(ctx, login).await? {
        return Ok(id);
    }

    // (b) by the alternate login field name
    let reply = ctx
        .client
        .search(
            &ctx.session,
            ResourceType::User,
            &[Criterion::equals("name", login)],
        )
        .await
        .map_err(|e| ErrorReason::unexpected(format!("{e:#}")))?;
    if let Some(id) = reply.find_matching(login, None) {
        return Ok(id);
    }

    // (c) by first + last name conjunction
    let reply = ctx
        .client
        .search(
            &ctx.session,
            ResourceType::User,
            &[
                Criterion::equals("firstname", first_name),
                Criterion::and("realname", last_name),
            ],
        )
        .await
        .map_err(|e| ErrorReason::unexpected(format!("{e:#}")))?;
    if let Some(id) = match &reply {
        crate::api::SearchReply::Envelope { total, hits } if *total > 0 => {
            hits.first().and_then(crate::api::search::SearchHit::id)
        }
        _ => None,
    } {
        return Ok(id);
    }

    // (d) full listing, case-insensitive login scan
    let users = ctx
        .client
        .list(&ctx.session, ResourceType::User)
        .await
        .map_err(|e| ErrorReason::unexpected(format!("{e:#}")))?;
    for user in users {
        let matches = user
            .get("name")
            .and_then(Value::as_str)
            .map(|name| name.eq_ignore_ascii_case(login))
            .unwrap_or(false);
        if matches {
            if let Some(id) = user.get("id").and_then(crate::api::search::coerce_id) {
                return Ok(id);
            }
        }
    }

    log::error!("user '{login}' reported as duplicate but no fallback found it");
    Err(ErrorReason::DuplicateNotFound)
}

async fn link_profile(ctx: &Context, user_id: i64, request: &UserRequest) {
    let input = json!({
        "users_id": user_id,
        "profiles_id": request.profile_id,
        "entities_id": request.entity_id,
        "is_recursive": 0,
    });
    match ctx.client.create_at(&ctx.session, "Profile_User", input).await {
        Ok(outcome) if outcome_ok(&outcome) => log::debug!("profile linked to user {user_id}"),
        Ok(outcome) => log::warn!("linking profile to user {user_id} failed: {outcome:?}"),
        Err(e) => log::warn!("linking profile to user {user_id} failed: {e:#}"),
    }
}

async fn link_group(ctx: &Context, user_id: i64, request: &UserRequest) {
    let input = json!({
        "users_id": user_id,
        "groups_id": request.group_id,
        "entities_id": request.entity_id,
    });
    match ctx.client.create_at(&ctx.session, "Group_User", input).await {
        Ok(outcome) if outcome_ok(&outcome) => log::debug!("group linked to user {user_id}"),
        Ok(outcome) => log::warn!("linking group to user {user_id} failed: {outcome:?}"),
        Err(e) => log::warn!("linking group to user {user_id} failed: {e:#}"),
    }
}

/// Attach the contact email: a dedicated sub-resource first, a direct
/// field update on the user record as fallback.
async fn link_email(ctx: &Context, user_id: i64, email: &str) {
    let input = json!({
        "users_id": user_id,
        "email": email,
        "is_default": 1,
    });
    match ctx.client.create_at(&ctx.session, "UserEmail", input).await {
        Ok(outcome) if outcome_ok(&outcome) => {
            log::debug!("email linked to user {user_id}");
            return;
        }
        Ok(outcome) => log::warn!("UserEmail for user {user_id} failed: {outcome:?}"),
        Err(e) => log::warn!("UserEmail for user {user_id} failed: {e:#}"),
    }

    let fallback = json!({ "_useremails": [{ "email": email }] });
    match ctx.client.update(&ctx.session, "User", user_id, fallback).await {
        Ok(response) if response.is_success() => {
            log::debug!("email attached to user {user_id} via direct update")
        }
        Ok(response) => log::warn!(
            "email fallback update for user {user_id} failed (HTTP {})",
            response.status
        ),
        Err(e) => log::warn!("email fallback update for user {user_id} failed: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Method;
    use crate::api::testing::{MockTransport, empty_search, ok};
    use crate::provision::testing::mock_context;
    use serde_json::json;
    use std::sync::Arc;

    fn request() -> UserRequest {
        UserRequest {
            full_name: "Jane Doe".to_string(),
            email: "@jane@acme.com".to_string(),
            entity_id: 12,
            profile_id: 1,
            group_id: 136,
            active: true,
            national_id: None,
            mobile: None,
            title: None,
            comment: None,
        }
    }

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name("Jane Doe"),
            Some(("Jane".to_string(), "Doe".to_string()))
        );
        assert_eq!(
            split_name("Ana Maria da Silva"),
            Some(("Ana".to_string(), "Maria da Silva".to_string()))
        );
        assert_eq!(split_name("Cher"), Some(("Cher".to_string(), String::new())));
        assert_eq!(split_name("   "), None);
    }

    #[test]
    fn test_derive_login() {
        assert_eq!(derive_login("@jane@acme.com").unwrap(), "jane@acme.com");
        assert_eq!(derive_login("jane@acme.com").unwrap(), "jane@acme.com");
        assert_eq!(derive_login("").unwrap_err(), ErrorReason::EmailMissing);
        assert_eq!(derive_login("@").unwrap_err(), ErrorReason::EmailMissing);
        assert_eq!(derive_login("@janeacme").unwrap_err(), ErrorReason::EmailMalformed);
    }

    #[test]
    fn test_derive_password() {
        assert_eq!(derive_password(None), DEFAULT_PASSWORD);
        assert_eq!(derive_password(Some("123.456.789-01")), "Tmp@123.glpi");
        assert_eq!(derive_password(Some("98765432100")), "Tmp@987.glpi");
        // too few digits falls back to the default
        assert_eq!(derive_password(Some("1a")), DEFAULT_PASSWORD);
    }

    #[test]
    fn test_normalize_national_id() {
        assert_eq!(
            normalize_national_id("123.456.789-01"),
            Some("12345678901".to_string())
        );
        assert_eq!(normalize_national_id("1234567"), Some("00001234567".to_string()));
        assert_eq!(normalize_national_id("no digits"), None);
    }

    #[tokio::test]
    async fn test_validation_failures_make_no_network_call() {
        let transport = Arc::new(MockTransport::new(|req| {
            panic!("unexpected request to {}", req.path)
        }));
        let ctx = mock_context(transport.clone());

        let mut bad_name = request();
        bad_name.full_name = "  ".to_string();
        assert_eq!(
            provision_user(&ctx, &bad_name).await.unwrap_err(),
            ErrorReason::NameInvalid
        );

        let mut no_email = request();
        no_email.email = String::new();
        assert_eq!(
            provision_user(&ctx, &no_email).await.unwrap_err(),
            ErrorReason::EmailMissing
        );

        let mut bad_email = request();
        bad_email.email = "@janeacme".to_string();
        assert_eq!(
            provision_user(&ctx, &bad_email).await.unwrap_err(),
            ErrorReason::EmailMalformed
        );

        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_user_short_circuits() {
        let transport = Arc::new(MockTransport::new(|req| {
            assert_eq!(req.path, "search/User");
            ok(json!({"totalcount": 1, "data": [{"1": "jane@acme.com", "2": 40}]}))
        }));
        let ctx = mock_context(transport.clone());

        let id = provision_user(&ctx, &request()).await.unwrap();
        assert_eq!(id, 40);
        // lookup only: no creation, no linkage on the reuse path
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_create_attaches_linkages() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/User") => empty_search(),
            (Method::Post, "User") => {
                let input = &req.body.as_ref().unwrap()["input"];
                assert_eq!(input["name"], "jane@acme.com");
                assert_eq!(input["firstname"], "Jane");
                assert_eq!(input["realname"], "Doe");
                assert_eq!(input["password"], input["password2"]);
                assert_eq!(input["entities_id"], 12);
                assert_eq!(input["is_active"], 1);
                ok(json!({"id": 88}))
            }
            (Method::Post, "Profile_User") => ok(json!({"id": 1})),
            (Method::Post, "Group_User") => ok(json!({"id": 2})),
            (Method::Post, "UserEmail") => {
                let input = &req.body.as_ref().unwrap()["input"];
                assert_eq!(input["email"], "jane@acme.com");
                ok(json!({"id": 3}))
            }
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport.clone());

        let id = provision_user(&ctx, &request()).await.unwrap();
        assert_eq!(id, 88);
        assert_eq!(
            transport.paths(),
            vec!["search/User", "User", "Profile_User", "Group_User", "UserEmail"]
        );
    }

    #[tokio::test]
    async fn test_optional_fields_only_when_present() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/User") => empty_search(),
            (Method::Get, "UserTitle") => ok(json!([{"id": 6, "name": "Analyst"}])),
            (Method::Post, "User") => {
                let input = &req.body.as_ref().unwrap()["input"];
                assert_eq!(input["registration_number"], "12345678901");
                assert_eq!(input["mobile"], "+55 11 90000-0000");
                assert_eq!(input["usertitles_id"], 6);
                assert_eq!(input["password"], "Tmp@123.glpi");
                ok(json!({"id": 89}))
            }
            (Method::Post, _) => ok(json!({"id": 1})),
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport);

        let mut full = request();
        full.national_id = Some("123.456.789-01".to_string());
        full.mobile = Some("+55 11 90000-0000".to_string());
        full.title = Some("Analyst".to_string());

        let id = provision_user(&ctx, &full).await.unwrap();
        assert_eq!(id, 89);
    }

    #[tokio::test]
    async fn test_duplicate_create_recovered_by_login_search() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let searches = AtomicU32::new(0);
        let transport = Arc::new(MockTransport::new(move |req| {
            match (req.method, req.path.as_str()) {
                (Method::Get, "search/User") => {
                    // first search (pre-create lookup) misses; the
                    // post-duplicate search hits
                    if searches.fetch_add(1, Ordering::SeqCst) == 0 {
                        empty_search()
                    } else {
                        ok(json!({"totalcount": 1, "data": [{"1": "jane@acme.com", "2": 51}]}))
                    }
                }
                (Method::Post, "User") => crate::api::ApiResponse {
                    status: 400,
                    body: "Duplicate entry 'jane@acme.com'".to_string(),
                },
                (Method::Post, _) => ok(json!({"id": 1})),
                other => panic!("unexpected request {other:?}"),
            }
        }));
        let ctx = mock_context(transport);

        let id = provision_user(&ctx, &request()).await.unwrap();
        assert_eq!(id, 51);
    }

    #[tokio::test]
    async fn test_duplicate_exhaustion_reports_reason() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/User") => empty_search(),
            (Method::Get, "User") => ok(json!([{"id": 2, "name": "someone-else"}])),
            (Method::Post, "User") => crate::api::ApiResponse {
                status: 400,
                body: "Duplicate entry".to_string(),
            },
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport);

        assert_eq!(
            provision_user(&ctx, &request()).await.unwrap_err(),
            ErrorReason::DuplicateNotFound
        );
    }

    #[tokio::test]
    async fn test_email_fallback_on_useremail_failure() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/User") => empty_search(),
            (Method::Post, "User") => ok(json!({"id": 90})),
            (Method::Post, "UserEmail") => crate::api::ApiResponse {
                status: 500,
                body: "boom".to_string(),
            },
            (Method::Post, _) => ok(json!({"id": 1})),
            (Method::Put, "User/90") => {
                let input = &req.body.as_ref().unwrap()["input"];
                assert_eq!(input["_useremails"][0]["email"], "jane@acme.com");
                ok(json!(true))
            }
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport.clone());

        let id = provision_user(&ctx, &request()).await.unwrap();
        assert_eq!(id, 90);
        assert!(transport.paths().contains(&"User/90".to_string()));
    }
}
