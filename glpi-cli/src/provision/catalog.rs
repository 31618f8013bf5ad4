//! Catalog resources: manufacturers, models, hardware components, titles
//!
//! Simple named lookup records with a global natural key, resolved through
//! the same engine as everything else and cached for the duration of a
//! run. The cache is purely an optimization; a miss always falls through
//! to the full resolver.

use serde_json::json;

use crate::api::ResourceType;

use super::resolver::{ResolveError, ResolveSpec, resolve};
use super::Context;

/// Find or create a catalog record by name.
pub async fn catalog_id(
    ctx: &Context,
    resource: ResourceType,
    name: &str,
) -> Result<i64, ResolveError> {
    let name = name.trim();
    if let Some(id) = ctx.cached(resource, name) {
        log::debug!("{resource} '{name}' served from cache (id {id})");
        return Ok(id);
    }

    let mut spec = ResolveSpec::new(resource, name);
    if is_device(resource) {
        // device catalogs live at the root entity, visible everywhere,
        // and carry the designation column GLPI displays
        spec = spec
            .attr("designation", name.into())
            .attr("entities_id", json!(0))
            .attr("is_recursive", json!(1));
    }

    let id = resolve(ctx, &spec).await?;
    ctx.remember(resource, name, id);
    Ok(id)
}

fn is_device(resource: ResourceType) -> bool {
    matches!(
        resource,
        ResourceType::DeviceHardDrive | ResourceType::DeviceProcessor | ResourceType::DeviceMemory
    )
}

/// Hardware components named on a notebook row.
#[derive(Debug, Clone, Default)]
pub struct ComponentSpec {
    pub storage: Option<String>,
    pub processor: Option<String>,
    pub memory: Option<String>,
}

impl ComponentSpec {
    pub fn is_empty(&self) -> bool {
        self.storage.is_none() && self.processor.is_none() && self.memory.is_none()
    }
}

/// Resolve each named component and join-link it to the computer.
///
/// Every component is independently best-effort: a failure is logged and
/// the remaining components are still attempted.
pub async fn attach_components(ctx: &Context, computer_id: i64, components: &ComponentSpec) {
    let slots: [(&Option<String>, ResourceType); 3] = [
        (&components.storage, ResourceType::DeviceHardDrive),
        (&components.processor, ResourceType::DeviceProcessor),
        (&components.memory, ResourceType::DeviceMemory),
    ];

    for (name, resource) in slots {
        let Some(name) = name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        match catalog_id(ctx, resource, name).await {
            Ok(device_id) => link_component(ctx, computer_id, resource, device_id, name).await,
            Err(e) => log::warn!("component '{name}' unresolved, skipping link: {e}"),
        }
    }
}

async fn link_component(
    ctx: &Context,
    computer_id: i64,
    resource: ResourceType,
    device_id: i64,
    name: &str,
) {
    let (endpoint, id_field) = match resource {
        ResourceType::DeviceHardDrive => ("Item_DeviceHardDrive", "deviceharddrives_id"),
        ResourceType::DeviceProcessor => ("Item_DeviceProcessor", "deviceprocessors_id"),
        ResourceType::DeviceMemory => ("Item_DeviceMemory", "devicememories_id"),
        _ => return,
    };

    let mut input = json!({
        "items_id": computer_id,
        "itemtype": "Computer",
        id_field: device_id,
    });
    if resource == ResourceType::DeviceMemory {
        if let Some(size) = memory_size(name) {
            input["size"] = json!(size);
        }
    }

    match ctx.client.create_at(&ctx.session, endpoint, input).await {
        Ok(outcome) if outcome_ok(&outcome) => {
            log::debug!("linked {name} to computer {computer_id}")
        }
        Ok(outcome) => log::warn!("linking {name} to computer {computer_id} failed: {outcome:?}"),
        Err(e) => log::warn!("linking {name} to computer {computer_id} failed: {e:#}"),
    }
}

/// A join record that already exists is a success.
pub fn outcome_ok(outcome: &crate::api::CreateOutcome) -> bool {
    use crate::api::CreateOutcome::*;
    matches!(outcome, Created(_) | CreatedNoId | AlreadyExists)
}

/// Memory sizes arrive as display names like `16GB`; the link record
/// carries the bare number.
fn memory_size(name: &str) -> Option<String> {
    let stripped = name
        .trim()
        .trim_end_matches("GB")
        .trim_end_matches("gb")
        .trim();
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(stripped.to_string())
}
