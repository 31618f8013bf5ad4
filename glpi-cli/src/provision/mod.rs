//! Idempotent provisioning against the GLPI API
//!
//! The engine: get-or-create resolution, the entity hierarchy builder, and
//! the user/asset provisioners, all threaded through an explicit run
//! [`Context`] (client, session token, retry policy, per-run catalog cache)
//! instead of process-wide state.

pub mod asset;
pub mod catalog;
pub mod contract;
pub mod hierarchy;
pub mod infocom;
pub mod outcome;
pub mod resolver;
pub mod user;

pub use asset::{AssetKind, AssetRequest, provision_asset};
pub use hierarchy::build_hierarchy;
pub use outcome::{ErrorReason, StepStatus};
pub use resolver::{ResolveError, ResolveSpec, resolve};
pub use user::{UserRequest, provision_user};

use std::cell::RefCell;
use std::collections::HashMap;

use crate::api::{GlpiClient, ResourceType, RetryPolicy, SessionToken};

/// Defaults applied to every provisioned user.
#[derive(Debug, Clone)]
pub struct Defaults {
    /// Group every user is attached to
    pub group_id: i64,
    /// Profile for new users (Self-Service unless configured otherwise)
    pub profile_id: i64,
}

/// Run-wide context passed explicitly through every provisioning call.
pub struct Context {
    pub client: GlpiClient,
    pub session: SessionToken,
    pub retry: RetryPolicy,
    pub defaults: Defaults,
    /// Per-run catalog cache; an optimization only, every miss falls
    /// through to the full resolver. Never held across an await.
    catalog: RefCell<HashMap<(ResourceType, String), i64>>,
}

impl Context {
    pub fn new(
        client: GlpiClient,
        session: SessionToken,
        retry: RetryPolicy,
        defaults: Defaults,
    ) -> Self {
        Self {
            client,
            session,
            retry,
            defaults,
            catalog: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn cached(&self, resource: ResourceType, name: &str) -> Option<i64> {
        self.catalog.borrow().get(&(resource, name.to_string())).copied()
    }

    pub(crate) fn remember(&self, resource: ResourceType, name: &str, id: i64) {
        self.catalog.borrow_mut().insert((resource, name.to_string()), id);
    }
}
