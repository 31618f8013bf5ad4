//! Supplier and contract resolution plus asset linkage
//!
//! Contracts are global: they always live at the root entity, marked
//! recursive so every child entity sees them. Suppliers are many-to-many
//! with contracts via `Contract_Supplier`, assets via `Contract_Item`;
//! both join records are idempotent (an existing link is a success).

use serde_json::json;

use crate::api::ResourceType;

use super::asset::AssetKind;
use super::catalog::outcome_ok;
use super::resolver::{ResolveError, ResolveSpec, resolve};
use super::Context;

/// Find or create a supplier at the root entity.
pub async fn ensure_supplier(ctx: &Context, name: &str) -> Result<i64, ResolveError> {
    let name = name.trim();
    if let Some(id) = ctx.cached(ResourceType::Supplier, name) {
        return Ok(id);
    }
    let spec = ResolveSpec::new(ResourceType::Supplier, name)
        .attr("entities_id", json!(0))
        .attr("is_recursive", json!(1));
    let id = resolve(ctx, &spec).await?;
    ctx.remember(ResourceType::Supplier, name, id);
    Ok(id)
}

/// Find or create a contract at the root entity, and make sure the
/// supplier (when given) is linked to it.
pub async fn ensure_contract(
    ctx: &Context,
    name: &str,
    supplier_id: Option<i64>,
) -> Result<i64, ResolveError> {
    let name = name.trim();
    let contract_id = match ctx.cached(ResourceType::Contract, name) {
        Some(id) => id,
        None => {
            let spec = ResolveSpec::new(ResourceType::Contract, name)
                .attr("entities_id", json!(0))
                .attr("is_recursive", json!(1));
            let id = resolve(ctx, &spec).await?;
            ctx.remember(ResourceType::Contract, name, id);
            id
        }
    };

    if let Some(supplier_id) = supplier_id {
        link_supplier(ctx, contract_id, supplier_id).await;
    }
    Ok(contract_id)
}

/// Link a supplier to a contract unless the link already exists.
/// Best-effort: a failure here never fails the asset.
async fn link_supplier(ctx: &Context, contract_id: i64, supplier_id: i64) {
    let existing = ctx
        .client
        .children(&ctx.session, ResourceType::Contract, contract_id, "Contract_Supplier")
        .await
        .unwrap_or_default();
    let already_linked = existing.iter().any(|link| {
        link.get("suppliers_id")
            .and_then(crate::api::search::coerce_id)
            == Some(supplier_id)
    });
    if already_linked {
        return;
    }

    let input = json!({
        "contracts_id": contract_id,
        "suppliers_id": supplier_id,
    });
    match ctx.client.create_at(&ctx.session, "Contract_Supplier", input).await {
        Ok(outcome) if outcome_ok(&outcome) => {}
        Ok(outcome) => log::warn!(
            "linking supplier {supplier_id} to contract {contract_id} failed: {outcome:?}"
        ),
        Err(e) => log::warn!(
            "linking supplier {supplier_id} to contract {contract_id} failed: {e:#}"
        ),
    }
}

/// Link a contract to an asset via `Contract_Item`.
///
/// Only lines and computers carry contracts on the target server; other
/// asset types are skipped.
pub async fn link_contract_to_asset(
    ctx: &Context,
    kind: AssetKind,
    asset_id: i64,
    contract_id: i64,
) -> bool {
    if !kind.contract_linkable() {
        log::debug!("{} assets do not carry contracts, skipping link", kind.endpoint());
        return false;
    }

    let input = json!({
        "contracts_id": contract_id,
        "items_id": asset_id,
        "itemtype": kind.endpoint(),
    });
    match ctx.client.create_at(&ctx.session, "Contract_Item", input).await {
        Ok(outcome) if outcome_ok(&outcome) => true,
        Ok(outcome) => {
            log::warn!(
                "linking contract {contract_id} to {} {asset_id} failed: {outcome:?}",
                kind.endpoint()
            );
            false
        }
        Err(e) => {
            log::warn!(
                "linking contract {contract_id} to {} {asset_id} failed: {e:#}",
                kind.endpoint()
            );
            false
        }
    }
}
