//! Asset provisioning (lines, phones, computers)
//!
//! Assets are keyed by `name` for lookup: an existing asset is fully
//! overwritten in place, an absent one is created. Manufacturer, model,
//! operator, components, contract and the financial record are resolved
//! around the core upsert, each tolerating failure on its own.

use serde_json::{Map, Value};

use crate::api::search::{Criterion, FIELD_NAME, SearchHit};
use crate::api::{CreateOutcome, ResourceType};

use super::catalog::{ComponentSpec, attach_components, catalog_id};
use super::contract::{ensure_contract, ensure_supplier, link_contract_to_asset};
use super::infocom::{FinanceSpec, upsert_infocom};
use super::outcome::ErrorReason;
use super::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Line,
    Phone,
    Computer,
}

impl AssetKind {
    pub fn resource(&self) -> ResourceType {
        match self {
            Self::Line => ResourceType::Line,
            Self::Phone => ResourceType::Phone,
            Self::Computer => ResourceType::Computer,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.resource().endpoint()
    }

    /// Catalog type of this asset's model, where one exists.
    pub fn model_resource(&self) -> Option<ResourceType> {
        match self {
            Self::Line => None,
            Self::Phone => Some(ResourceType::PhoneModel),
            Self::Computer => Some(ResourceType::ComputerModel),
        }
    }

    /// Payload key the model id lands in.
    pub fn model_field(&self) -> Option<&'static str> {
        match self {
            Self::Line => None,
            Self::Phone => Some("phonemodels_id"),
            Self::Computer => Some("computermodels_id"),
        }
    }

    /// Asset types that carry contracts on the target server.
    pub fn contract_linkable(&self) -> bool {
        matches!(self, Self::Line | Self::Computer)
    }
}

/// One asset to provision.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub kind: AssetKind,
    /// Natural key for lookup
    pub name: String,
    pub entity_id: i64,
    /// Owning user; `None` provisions the asset unowned (`users_id: 0`)
    pub owner_id: Option<i64>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    /// Serial number, or IMEI for phones
    pub serial: Option<String>,
    /// Line operator (lines only)
    pub operator: Option<String>,
    pub components: ComponentSpec,
    pub contract: Option<String>,
    pub supplier: Option<String>,
    pub finance: FinanceSpec,
    pub comment: Option<String>,
}

impl AssetRequest {
    pub fn new(kind: AssetKind, name: impl Into<String>, entity_id: i64) -> Self {
        Self {
            kind,
            name: name.into(),
            entity_id,
            owner_id: None,
            manufacturer: None,
            model: None,
            serial: None,
            operator: None,
            components: ComponentSpec::default(),
            contract: None,
            supplier: None,
            finance: FinanceSpec::default(),
            comment: None,
        }
    }
}

/// Create or update an asset, returning its id.
pub async fn provision_asset(ctx: &Context, request: &AssetRequest) -> Result<i64, ErrorReason> {
    let kind = request.kind;
    log::info!("provisioning {} '{}'", kind.endpoint(), request.name);

    let payload = build_payload(ctx, request).await;

    let asset_id = upsert(ctx, request, payload).await?;

    // post-creation attachments, each independently best-effort
    if kind == AssetKind::Computer && !request.components.is_empty() {
        attach_components(ctx, asset_id, &request.components).await;
    }

    let supplier_id = match request.supplier.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => match ensure_supplier(ctx, name).await {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("supplier '{name}' unresolved: {e}");
                None
            }
        },
        None => None,
    };

    if let Some(contract) = request.contract.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        match ensure_contract(ctx, contract, supplier_id).await {
            Ok(contract_id) => {
                link_contract_to_asset(ctx, kind, asset_id, contract_id).await;
            }
            Err(e) => log::warn!("contract '{contract}' unresolved: {e}"),
        }
    }

    if !request.finance.is_empty() || supplier_id.is_some() {
        upsert_infocom(ctx, kind, asset_id, request.entity_id, &request.finance, supplier_id).await;
    }

    Ok(asset_id)
}

/// Merge the request and its resolved enrichments into the write payload.
/// Enrichment failures degrade to an absent field, never to a failed row.
async fn build_payload(ctx: &Context, request: &AssetRequest) -> Map<String, Value> {
    let kind = request.kind;
    let mut payload = Map::new();
    payload.insert("name".to_string(), Value::from(request.name.clone()));
    payload.insert("entities_id".to_string(), Value::from(request.entity_id));
    payload.insert("users_id".to_string(), Value::from(request.owner_id.unwrap_or(0)));
    if kind == AssetKind::Computer {
        payload.insert("is_dynamic".to_string(), Value::from(0));
    }
    if let Some(serial) = request.serial.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        payload.insert("serial".to_string(), Value::from(serial));
    }
    if let Some(comment) = request.comment.as_deref().filter(|c| !c.is_empty()) {
        payload.insert("comment".to_string(), Value::from(comment));
    }

    if let Some(name) = request.manufacturer.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        match catalog_id(ctx, ResourceType::Manufacturer, name).await {
            Ok(id) => {
                payload.insert("manufacturers_id".to_string(), Value::from(id));
            }
            Err(e) => log::warn!("manufacturer '{name}' unresolved, omitting: {e}"),
        }
    }

    if let (Some(model), Some(resource), Some(field)) = (
        request.model.as_deref().map(str::trim).filter(|m| !m.is_empty()),
        kind.model_resource(),
        kind.model_field(),
    ) {
        match catalog_id(ctx, resource, model).await {
            Ok(id) => {
                payload.insert(field.to_string(), Value::from(id));
            }
            Err(e) => log::warn!("model '{model}' unresolved, omitting: {e}"),
        }
    }

    if kind == AssetKind::Line {
        if let Some(operator) = request.operator.as_deref().map(str::trim).filter(|o| !o.is_empty())
        {
            match catalog_id(ctx, ResourceType::LineOperator, operator).await {
                Ok(id) => {
                    payload.insert("lineoperators_id".to_string(), Value::from(id));
                }
                Err(e) => log::warn!("operator '{operator}' unresolved, omitting: {e}"),
            }
        }
    }

    payload
}

/// The update-or-create core: search by name, PUT when found, POST when
/// absent. A failed PUT is logged but the existing id stays valid.
async fn upsert(
    ctx: &Context,
    request: &AssetRequest,
    payload: Map<String, Value>,
) -> Result<i64, ErrorReason> {
    let kind = request.kind;
    let reply = ctx
        .client
        .search(
            &ctx.session,
            kind.resource(),
            &[Criterion::equals(FIELD_NAME, request.name.clone())],
        )
        .await
        .map_err(|e| ErrorReason::unexpected(format!("{e:#}")))?;

    if let Some(asset_id) = reply.locate(&request.name) {
        log::info!(
            "{} '{}' already exists (id {asset_id}), overwriting",
            kind.endpoint(),
            request.name
        );
        match ctx
            .client
            .update(&ctx.session, kind.endpoint(), asset_id, Value::Object(payload))
            .await
        {
            Ok(response) if response.is_success() => {}
            Ok(response) => log::warn!(
                "updating {} {asset_id} failed (HTTP {}): {}",
                kind.endpoint(),
                response.status,
                response.body
            ),
            Err(e) => log::warn!("updating {} {asset_id} failed: {e:#}", kind.endpoint()),
        }
        return Ok(asset_id);
    }

    log::info!("creating {} '{}'", kind.endpoint(), request.name);
    match ctx
        .client
        .create(&ctx.session, kind.resource(), Value::Object(payload))
        .await
        .map_err(|e| ErrorReason::unexpected(format!("{e:#}")))?
    {
        CreateOutcome::Created(id) => {
            log::info!("{} '{}' created (id {id})", kind.endpoint(), request.name);
            Ok(id)
        }
        CreateOutcome::CreatedNoId | CreateOutcome::AlreadyExists => {
            locate_after_create(ctx, request).await
        }
        CreateOutcome::Failed { status, body } => {
            log::error!(
                "creating {} '{}' failed (HTTP {status}): {body}",
                kind.endpoint(),
                request.name
            );
            Err(ErrorReason::CreateFailed { status })
        }
    }
}

/// The create answered without a usable id (or claimed a duplicate):
/// find the record by name through search, then the full listing.
async fn locate_after_create(ctx: &Context, request: &AssetRequest) -> Result<i64, ErrorReason> {
    let kind = request.kind;
    let reply = ctx
        .client
        .search(
            &ctx.session,
            kind.resource(),
            &[Criterion::equals(FIELD_NAME, request.name.clone())],
        )
        .await
        .map_err(|e| ErrorReason::unexpected(format!("{e:#}")))?;
    if let Some(id) = reply.find_matching(&request.name, None) {
        return Ok(id);
    }

    let items = ctx
        .client
        .list(&ctx.session, kind.resource())
        .await
        .map_err(|e| ErrorReason::unexpected(format!("{e:#}")))?;
    for item in items {
        let Value::Object(fields) = item else { continue };
        let hit = SearchHit::new(fields);
        if hit.name_matches(&request.name) {
            if let Some(id) = hit.id() {
                return Ok(id);
            }
        }
    }

    log::error!(
        "{} '{}' created but no id could be located",
        kind.endpoint(),
        request.name
    );
    Err(ErrorReason::CreatedWithoutId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Method;
    use crate::api::testing::{MockTransport, empty_search, ok};
    use crate::provision::testing::mock_context;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_existing_asset_is_updated_in_place() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/Line") => {
                ok(json!({"totalcount": 1, "data": [{"1": "+55 11 91234-5678", "2": 30}]}))
            }
            (Method::Put, "Line/30") => {
                let input = &req.body.as_ref().unwrap()["input"];
                assert_eq!(input["name"], "+55 11 91234-5678");
                assert_eq!(input["users_id"], 7);
                ok(json!({"id": 30}))
            }
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport.clone());

        let mut request = AssetRequest::new(AssetKind::Line, "+55 11 91234-5678", 12);
        request.owner_id = Some(7);
        let id = provision_asset(&ctx, &request).await.unwrap();
        assert_eq!(id, 30);
        assert_eq!(transport.paths(), vec!["search/Line", "Line/30"]);
    }

    #[tokio::test]
    async fn test_failed_update_still_returns_existing_id() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/Line") => {
                ok(json!({"totalcount": 1, "data": [{"1": "line-1", "2": 30}]}))
            }
            (Method::Put, "Line/30") => crate::api::ApiResponse {
                status: 500,
                body: "boom".to_string(),
            },
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport);

        let request = AssetRequest::new(AssetKind::Line, "line-1", 12);
        assert_eq!(provision_asset(&ctx, &request).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_absent_asset_is_created_with_enrichment() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/Phone") => empty_search(),
            (Method::Get, "Manufacturer") => ok(json!([{"id": 3, "name": "Google"}])),
            (Method::Get, "PhoneModel") => ok(json!([{"id": 5, "name": "Pixel 7"}])),
            (Method::Post, "Phone") => {
                let input = &req.body.as_ref().unwrap()["input"];
                assert_eq!(input["name"], "Pixel 7 - 123456789012345");
                assert_eq!(input["serial"], "123456789012345");
                assert_eq!(input["manufacturers_id"], 3);
                assert_eq!(input["phonemodels_id"], 5);
                assert_eq!(input["users_id"], 0);
                ok(json!({"id": 61}))
            }
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport);

        let mut request = AssetRequest::new(AssetKind::Phone, "Pixel 7 - 123456789012345", 12);
        request.manufacturer = Some("Google".to_string());
        request.model = Some("Pixel 7".to_string());
        request.serial = Some("123456789012345".to_string());

        let id = provision_asset(&ctx, &request).await.unwrap();
        assert_eq!(id, 61);
    }

    #[tokio::test]
    async fn test_unresolved_model_is_omitted_not_fatal() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/Phone") => empty_search(),
            (Method::Get, "PhoneModel") => ok(json!([])),
            (Method::Get, "search/PhoneModel") => empty_search(),
            (Method::Post, "PhoneModel") => crate::api::ApiResponse {
                status: 500,
                body: "boom".to_string(),
            },
            (Method::Post, "Phone") => {
                let input = &req.body.as_ref().unwrap()["input"];
                assert!(input.get("phonemodels_id").is_none());
                ok(json!({"id": 62}))
            }
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport);

        let mut request = AssetRequest::new(AssetKind::Phone, "X100", 12);
        request.model = Some("X100".to_string());
        assert_eq!(provision_asset(&ctx, &request).await.unwrap(), 62);
    }

    #[tokio::test]
    async fn test_duplicate_create_located_by_search() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let searches = AtomicU32::new(0);
        let transport = Arc::new(MockTransport::new(move |req| {
            match (req.method, req.path.as_str()) {
                (Method::Get, "search/Computer") => {
                    if searches.fetch_add(1, Ordering::SeqCst) == 0 {
                        empty_search()
                    } else {
                        ok(json!({"totalcount": 1, "data": [{"1": "NB-01", "2": 70}]}))
                    }
                }
                (Method::Post, "Computer") => crate::api::ApiResponse {
                    status: 400,
                    body: "Duplicate entry 'NB-01'".to_string(),
                },
                other => panic!("unexpected request {other:?}"),
            }
        }));
        let ctx = mock_context(transport);

        let request = AssetRequest::new(AssetKind::Computer, "NB-01", 12);
        assert_eq!(provision_asset(&ctx, &request).await.unwrap(), 70);
    }

    #[tokio::test]
    async fn test_contract_and_infocom_attach_to_computer() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/Computer") => empty_search(),
            (Method::Post, "Computer") => ok(json!({"id": 80})),
            (Method::Get, "Supplier") => ok(json!([{"id": 4, "name": "Dell BR"}])),
            (Method::Get, "Contract") => ok(json!([{"id": 9, "name": "HW-2024"}])),
            (Method::Get, "Contract/9/Contract_Supplier") => ok(json!([])),
            (Method::Post, "Contract_Supplier") => ok(json!({"id": 1})),
            (Method::Post, "Contract_Item") => {
                let input = &req.body.as_ref().unwrap()["input"];
                assert_eq!(input["itemtype"], "Computer");
                assert_eq!(input["items_id"], 80);
                ok(json!({"id": 2}))
            }
            (Method::Get, "Computer/80/Infocom") => ok(json!([])),
            (Method::Post, "Infocom") => {
                let input = &req.body.as_ref().unwrap()["input"];
                assert_eq!(input["buy_date"], "2024-03-01");
                assert_eq!(input["suppliers_id"], 4);
                ok(json!({"id": 3}))
            }
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport.clone());

        let mut request = AssetRequest::new(AssetKind::Computer, "NB-02", 12);
        request.contract = Some("HW-2024".to_string());
        request.supplier = Some("Dell BR".to_string());
        request.finance = FinanceSpec {
            purchase_date: Some("01/03/2024".to_string()),
            purchase_value: None,
        };

        let id = provision_asset(&ctx, &request).await.unwrap();
        assert_eq!(id, 80);
        assert!(transport.paths().contains(&"Contract_Item".to_string()));
        assert!(transport.paths().contains(&"Infocom".to_string()));
    }

    #[tokio::test]
    async fn test_create_failure_maps_to_reason() {
        let transport = Arc::new(MockTransport::new(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "search/Line") => empty_search(),
            (Method::Post, "Line") => crate::api::ApiResponse {
                status: 422,
                body: "bad payload".to_string(),
            },
            other => panic!("unexpected request {other:?}"),
        }));
        let ctx = mock_context(transport);

        let request = AssetRequest::new(AssetKind::Line, "line-9", 12);
        assert_eq!(
            provision_asset(&ctx, &request).await.unwrap_err(),
            ErrorReason::CreateFailed { status: 422 }
        );
    }
}
