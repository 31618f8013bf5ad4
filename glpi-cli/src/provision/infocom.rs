//! Financial/management records (GLPI `Infocom`)
//!
//! One-to-one with an asset: created when absent, updated in place when
//! present. Input normalization is deliberately forgiving — dates arrive
//! as `DD/MM/YYYY` or datetime-with-space, monetary values with a decimal
//! comma; anything unparseable is logged and omitted rather than failing
//! the asset.

use chrono::NaiveDate;
use serde_json::{Map, Value, json};

use crate::api::search::coerce_id;

use super::asset::AssetKind;
use super::catalog::outcome_ok;
use super::Context;

/// Financial fields captured from a row.
#[derive(Debug, Clone, Default)]
pub struct FinanceSpec {
    pub purchase_date: Option<String>,
    pub purchase_value: Option<String>,
}

impl FinanceSpec {
    pub fn is_empty(&self) -> bool {
        self.purchase_date.is_none() && self.purchase_value.is_none()
    }
}

/// Create or update the Infocom record of an asset. Best-effort: failures
/// are logged, the asset id stays valid.
pub async fn upsert_infocom(
    ctx: &Context,
    kind: AssetKind,
    asset_id: i64,
    entity_id: i64,
    finance: &FinanceSpec,
    supplier_id: Option<i64>,
) {
    let mut fields = Map::new();
    if let Some(raw) = finance.purchase_date.as_deref() {
        match normalize_date(raw) {
            Some(date) => {
                fields.insert("buy_date".to_string(), Value::from(date));
            }
            None => log::warn!("purchase date '{raw}' is not a recognizable date, omitting"),
        }
    }
    if let Some(raw) = finance.purchase_value.as_deref() {
        match parse_money(raw) {
            Some(value) => {
                fields.insert("value".to_string(), json!(value));
            }
            None => log::warn!("purchase value '{raw}' is not numeric, omitting"),
        }
    }
    if let Some(supplier_id) = supplier_id {
        fields.insert("suppliers_id".to_string(), Value::from(supplier_id));
    }
    if fields.is_empty() {
        return;
    }

    let existing = ctx
        .client
        .children(&ctx.session, kind.resource(), asset_id, "Infocom")
        .await
        .unwrap_or_default();
    let existing_id = existing.first().and_then(|v| v.get("id")).and_then(coerce_id);

    if let Some(infocom_id) = existing_id {
        match ctx
            .client
            .update(&ctx.session, "Infocom", infocom_id, Value::Object(fields))
            .await
        {
            Ok(response) if response.is_success() => {
                log::info!("infocom {infocom_id} updated for {} {asset_id}", kind.endpoint())
            }
            Ok(response) => log::warn!(
                "updating infocom {infocom_id} failed (HTTP {}): {}",
                response.status,
                response.body
            ),
            Err(e) => log::warn!("updating infocom {infocom_id} failed: {e:#}"),
        }
        return;
    }

    fields.insert("items_id".to_string(), Value::from(asset_id));
    fields.insert("itemtype".to_string(), Value::from(kind.endpoint()));
    fields.insert("entities_id".to_string(), Value::from(entity_id));

    match ctx
        .client
        .create_at(&ctx.session, "Infocom", Value::Object(fields))
        .await
    {
        Ok(outcome) if outcome_ok(&outcome) => {
            log::info!("infocom created for {} {asset_id}", kind.endpoint())
        }
        Ok(outcome) => log::warn!(
            "creating infocom for {} {asset_id} failed: {outcome:?}",
            kind.endpoint()
        ),
        Err(e) => log::warn!("creating infocom for {} {asset_id} failed: {e:#}", kind.endpoint()),
    }
}

/// Normalize a spreadsheet date to `YYYY-MM-DD`.
///
/// Accepts `DD/MM/YYYY`, an already-normalized `YYYY-MM-DD`, and either
/// followed by a time component separated by a space.
pub fn normalize_date(raw: &str) -> Option<String> {
    let date_part = raw.trim().split_whitespace().next()?;
    if let Ok(date) = NaiveDate::parse_from_str(date_part, "%d/%m/%Y") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    None
}

/// Coerce a locale decimal (comma separator, stray spaces) to a float.
pub fn parse_money(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}
