//! Entity hierarchy materialization
//!
//! Rows name up to four nested organizational levels. Each level is
//! resolved scoped under its parent; the deepest resolved id is what the
//! rest of the row (user, assets) attaches to.

use crate::api::ResourceType;

use super::resolver::{ResolveSpec, resolve};
use super::Context;

/// Resolve a chain of up to four nested entities and return the deepest
/// resolved id.
///
/// Level A is resolved unscoped (parent = root). If A cannot be resolved
/// nothing else can exist, so the whole hierarchy fails (`None`). A
/// failure at a deeper level is not fatal: the deepest successfully
/// resolved id is returned so the caller can proceed with a shallower
/// entity. Empty names are skipped, never materialized as placeholders.
pub async fn build_hierarchy(
    ctx: &Context,
    level_a: &str,
    level_b: Option<&str>,
    level_c: Option<&str>,
    level_d: Option<&str>,
    comment: Option<&str>,
) -> Option<i64> {
    let level_a = level_a.trim();
    if level_a.is_empty() {
        return None;
    }

    let mut current = match resolve(ctx, &entity_spec(level_a, None, comment)).await {
        Ok(id) => id,
        Err(e) => {
            log::error!("entity '{level_a}' unresolved, hierarchy aborted: {e}");
            return None;
        }
    };

    for name in [level_b, level_c, level_d].into_iter().flatten() {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match resolve(ctx, &entity_spec(name, Some(current), comment)).await {
            Ok(id) => current = id,
            Err(e) => {
                log::warn!(
                    "entity '{name}' unresolved under parent {current}, keeping the shallower level: {e}"
                );
                return Some(current);
            }
        }
    }

    Some(current)
}

fn entity_spec(name: &str, parent: Option<i64>, comment: Option<&str>) -> ResolveSpec {
    let mut spec = ResolveSpec::new(ResourceType::Entity, name);
    if let Some(parent) = parent {
        spec = spec.scoped(parent);
    }
    if let Some(comment) = comment {
        spec = spec.attr("comment", comment.into());
    }
    spec
}
