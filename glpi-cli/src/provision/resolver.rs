//! Get-or-create resolution against an eventually-consistent remote
//!
//! The crux of the tool: given a resource type, a natural-key value and an
//! optional parent scope, return the id of an existing record or create
//! one, without ever producing duplicates across retried or concurrent
//! runs. The remote search index can lag a fresh creation, the search
//! endpoint answers in several shapes, and uniqueness is not reliably
//! enforced server-side; the layered strategy below is what makes the
//! whole pipeline safe to re-run against a partially populated store.
//!
//! Strategy order:
//! 1. full-listing scan for listing-first types
//! 2. indexed-criteria search (name, plus parent scope where supported)
//! 3. pre-creation listing re-check for entity-like types
//! 4. creation, classified into a typed [`CreateOutcome`]
//! 5. duplicate recovery: bounded rounds of re-search, candidate-field
//!    listing scans and candidate-field searches

use serde_json::{Map, Value};
use std::fmt;

use crate::api::search::{
    Criterion, FIELD_NAME, FIELD_SCOPE_PRIMARY, FIELD_SCOPE_RECOVERY, RECOVERY_FIELDS, SearchHit,
};
use crate::api::{CreateOutcome, ResourceType};

use super::Context;
use super::outcome::ErrorReason;

/// One get-or-create request.
#[derive(Debug, Clone)]
pub struct ResolveSpec {
    pub resource: ResourceType,
    /// Natural-key field used in the creation payload
    pub field: &'static str,
    pub value: String,
    /// Parent entity id narrowing the lookup
    pub scope: Option<i64>,
    /// Extra creation attributes
    pub extra: Map<String, Value>,
}

impl ResolveSpec {
    pub fn new(resource: ResourceType, value: impl Into<String>) -> Self {
        Self {
            resource,
            field: "name",
            value: value.into(),
            scope: None,
            extra: Map::new(),
        }
    }

    /// Scope the lookup under a parent entity; the parent also lands in
    /// the creation payload.
    pub fn scoped(mut self, parent_id: i64) -> Self {
        self.scope = Some(parent_id);
        self.extra
            .insert("entities_id".to_string(), Value::from(parent_id));
        self
    }

    /// Additional creation attribute.
    pub fn attr(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Failure of a resolution after every strategy was exhausted.
#[derive(Debug)]
pub enum ResolveError {
    /// Created-as-duplicate but no fallback could locate the record
    Exhausted { resource: ResourceType, value: String },
    /// Creation rejected with a non-duplicate failure
    CreateRejected {
        resource: ResourceType,
        value: String,
        status: u16,
    },
    /// The transport itself failed
    Transport(anyhow::Error),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { resource, value } => {
                write!(f, "{resource} '{value}' not found after exhausting every strategy")
            }
            Self::CreateRejected {
                resource,
                value,
                status,
            } => write!(f, "creating {resource} '{value}' failed (HTTP {status})"),
            Self::Transport(e) => write!(f, "transport failure: {e:#}"),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<anyhow::Error> for ResolveError {
    fn from(e: anyhow::Error) -> Self {
        Self::Transport(e)
    }
}

impl ResolveError {
    /// Short status-cell rendition.
    pub fn to_reason(&self) -> ErrorReason {
        match self {
            Self::Exhausted { resource, value } => ErrorReason::Unresolved {
                resource: resource.endpoint(),
                value: value.clone(),
            },
            Self::CreateRejected { status, .. } => ErrorReason::CreateFailed { status: *status },
            Self::Transport(e) => ErrorReason::unexpected(format!("{e:#}")),
        }
    }
}

/// Find or create a resource, returning its id.
pub async fn resolve(ctx: &Context, spec: &ResolveSpec) -> Result<i64, ResolveError> {
    // 1. listing fast path: the search endpoint answers ambiguous
    // positionally-keyed records for these types
    if spec.resource.listing_first() {
        if let Some(id) = scan_listing(ctx, spec, false).await? {
            log::info!("{} '{}' found in listing (id {id})", spec.resource, spec.value);
            return Ok(id);
        }
    }

    // 2. indexed search on the name column
    if let Some(id) = primary_search(ctx, spec).await? {
        log::info!("{} '{}' found via search (id {id})", spec.resource, spec.value);
        return Ok(id);
    }

    // 3. the search index may lag a concurrent creation; re-check the
    // listing right before creating
    if spec.resource.precheck_before_create() {
        if let Some(id) = scan_listing(ctx, spec, false).await? {
            log::info!(
                "{} '{}' surfaced in the pre-create listing check (id {id})",
                spec.resource,
                spec.value
            );
            return Ok(id);
        }
    }

    // 4. create
    let mut payload = Map::new();
    payload.insert(spec.field.to_string(), Value::from(spec.value.clone()));
    for (key, value) in &spec.extra {
        payload.insert(key.clone(), value.clone());
    }

    log::info!("creating {} '{}'", spec.resource, spec.value);
    match ctx
        .client
        .create(&ctx.session, spec.resource, Value::Object(payload))
        .await?
    {
        CreateOutcome::Created(id) => {
            log::info!("{} '{}' created (id {id})", spec.resource, spec.value);
            Ok(id)
        }
        CreateOutcome::CreatedNoId => {
            log::warn!(
                "{} '{}' created but the response carried no id; locating it",
                spec.resource,
                spec.value
            );
            recover(ctx, spec).await
        }
        CreateOutcome::AlreadyExists => {
            log::warn!(
                "{} '{}' rejected as duplicate; recovering the existing id",
                spec.resource,
                spec.value
            );
            recover(ctx, spec).await
        }
        CreateOutcome::Failed { status, body } => {
            log::error!(
                "creating {} '{}' failed (HTTP {status}): {body}",
                spec.resource,
                spec.value
            );
            Err(ResolveError::CreateRejected {
                resource: spec.resource,
                value: spec.value.clone(),
                status,
            })
        }
    }
}

/// Step 2: search by name, narrowed by the parent scope where the type
/// supports it.
async fn primary_search(ctx: &Context, spec: &ResolveSpec) -> Result<Option<i64>, ResolveError> {
    let mut criteria = vec![Criterion::equals(FIELD_NAME, spec.value.clone())];
    if spec.resource.scoped_search() {
        if let Some(scope) = spec.scope {
            criteria.push(Criterion::equals(FIELD_SCOPE_PRIMARY, scope.to_string()));
        }
    }
    let reply = ctx
        .client
        .search(&ctx.session, spec.resource, &criteria)
        .await?;
    Ok(reply.locate(&spec.value))
}

/// Scan the full collection for a name + scope match.
///
/// `candidates` widens the name match to the positional keys and the
/// `completename` suffix (used during duplicate recovery).
async fn scan_listing(
    ctx: &Context,
    spec: &ResolveSpec,
    candidates: bool,
) -> Result<Option<i64>, ResolveError> {
    let items = ctx.client.list(&ctx.session, spec.resource).await?;
    for item in items {
        let Value::Object(fields) = item else { continue };
        let hit = SearchHit::new(fields);
        let name_match = if candidates {
            hit.name_matches(&spec.value) || hit.field_equals("2", &spec.value)
        } else {
            hit.field_equals("name", &spec.value)
        };
        if name_match && hit.scope_matches(spec.scope) {
            if let Some(id) = hit.id() {
                return Ok(Some(id));
            }
        }
    }
    Ok(None)
}

/// Step 5: the server said "duplicate" (or answered a create without an
/// id) but the search index may not show the record yet. Bounded rounds
/// of progressively wider lookups.
async fn recover(ctx: &Context, spec: &ResolveSpec) -> Result<i64, ResolveError> {
    let rounds = ctx.retry.max_attempts.max(1);
    for round in 0..rounds {
        ctx.retry.pause(round).await;

        // (a) name + scope search, scope on the recovery field index
        let mut criteria = vec![Criterion::equals(FIELD_NAME, spec.value.clone())];
        if spec.resource.scoped_search() {
            if let Some(scope) = spec.scope {
                criteria.push(Criterion::equals(FIELD_SCOPE_RECOVERY, scope.to_string()));
            }
        }
        let reply = ctx
            .client
            .search(&ctx.session, spec.resource, &criteria)
            .await?;
        if let Some(id) = reply.find_matching(&spec.value, spec.scope) {
            log::info!("{} '{}' recovered via search (id {id})", spec.resource, spec.value);
            return Ok(id);
        }

        // (b) full-listing scan with widened name matching
        if let Some(id) = scan_listing(ctx, spec, true).await? {
            log::info!("{} '{}' recovered via listing (id {id})", spec.resource, spec.value);
            return Ok(id);
        }

        // (c) searches varying the criterion field
        for field in RECOVERY_FIELDS {
            let mut criteria = vec![Criterion::equals(field, spec.value.clone())];
            if let Some(scope) = spec.scope {
                criteria.push(Criterion::and("entities_id", scope.to_string()));
            }
            let reply = ctx
                .client
                .search(&ctx.session, spec.resource, &criteria)
                .await?;
            if let Some(id) = reply.find_matching(&spec.value, spec.scope) {
                log::info!(
                    "{} '{}' recovered via field '{field}' search (id {id})",
                    spec.resource,
                    spec.value
                );
                return Ok(id);
            }
        }
    }

    Err(ResolveError::Exhausted {
        resource: spec.resource,
        value: spec.value.clone(),
    })
}
