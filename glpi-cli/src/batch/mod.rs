//! Row orchestration
//!
//! One row fully completes (entities, then user, then assets) before the
//! next starts: hierarchy creation is order-dependent and write-heavy, so
//! there is deliberately no parallelism across rows. A failed row never
//! aborts the batch; every category gets its own status cell.

use colored::*;

use crate::provision::asset::{AssetKind, AssetRequest};
use crate::provision::catalog::ComponentSpec;
use crate::provision::infocom::FinanceSpec;
use crate::provision::outcome::{ErrorReason, StepStatus};
use crate::provision::user::UserRequest;
use crate::provision::{Context, build_hierarchy, provision_asset, provision_user};
use crate::sheet::{RowRecord, col};

/// Per-category outcome of one row.
#[derive(Debug, Clone)]
pub struct RowStatus {
    pub user: StepStatus,
    pub line: StepStatus,
    pub mobile: StepStatus,
    pub notebook: StepStatus,
}

impl RowStatus {
    fn skipped() -> Self {
        Self {
            user: StepStatus::Skipped,
            line: StepStatus::Skipped,
            mobile: StepStatus::Skipped,
            notebook: StepStatus::Skipped,
        }
    }

    /// Mark every category the row actually asked for with one reason,
    /// used when a precondition shared by all of them failed.
    fn fail_requested(row: &RowRecord, reason: ErrorReason) -> Self {
        let mark = |wanted: bool| {
            if wanted {
                StepStatus::Failed(reason.clone())
            } else {
                StepStatus::Skipped
            }
        };
        Self {
            user: mark(row.wants_user()),
            line: mark(row.wants_line()),
            mobile: mark(row.wants_phone()),
            notebook: mark(row.wants_notebook()),
        }
    }

    pub fn is_failure(&self) -> bool {
        [&self.user, &self.line, &self.mobile, &self.notebook]
            .iter()
            .any(|s| s.is_failure())
    }
}

/// Batch totals.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunStats {
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.processed as f64 * 100.0
        }
    }
}

/// Process every row sequentially, returning per-row statuses (parallel
/// to the input slice) and the run totals.
pub async fn run_batch(ctx: &Context, rows: &[RowRecord]) -> (Vec<RowStatus>, RunStats) {
    let mut statuses = Vec::with_capacity(rows.len());
    let mut stats = RunStats::default();

    for row in rows {
        println!("{}", format!("row {}: processing", row.sheet_row).blue());
        let status = process_row(ctx, row).await;

        stats.processed += 1;
        if status.is_failure() {
            stats.failed += 1;
            println!("{}", format!("row {}: completed with failures", row.sheet_row).red());
        } else {
            stats.succeeded += 1;
            println!("{}", format!("row {}: done", row.sheet_row).green());
        }
        statuses.push(status);
    }

    (statuses, stats)
}

async fn process_row(ctx: &Context, row: &RowRecord) -> RowStatus {
    // level A is the root of everything on the row
    let Some(entity_a) = row.entity_a() else {
        log::error!("row {}: entity A column is empty, skipping row", row.sheet_row);
        return RowStatus::fail_requested(row, ErrorReason::EntityMissing);
    };

    let entity_id = build_hierarchy(
        ctx,
        entity_a,
        row.entity_b(),
        row.entity_c(),
        row.entity_d(),
        None,
    )
    .await;
    let Some(entity_id) = entity_id else {
        log::error!("row {}: entity hierarchy unresolved", row.sheet_row);
        return RowStatus::fail_requested(row, ErrorReason::HierarchyFailed);
    };

    let mut status = RowStatus::skipped();

    // user before assets: assets reference the owner id
    let mut user_id = None;
    if row.wants_user() {
        let request = UserRequest {
            full_name: row.full_name().to_string(),
            email: row.email().to_string(),
            entity_id,
            profile_id: ctx.defaults.profile_id,
            group_id: ctx.defaults.group_id,
            active: true,
            national_id: row.opt(col::NATIONAL_ID).map(str::to_string),
            mobile: row.opt(col::MOBILE).map(str::to_string),
            title: row.opt(col::TITLE).map(str::to_string),
            comment: None,
        };
        match provision_user(ctx, &request).await {
            Ok(id) => {
                user_id = Some(id);
                status.user = StepStatus::Ok;
            }
            Err(reason) => {
                log::error!("row {}: user failed: {reason}", row.sheet_row);
                status.user = StepStatus::Failed(reason);
            }
        }
    }

    if row.wants_line() {
        let mut request = AssetRequest::new(
            AssetKind::Line,
            row.opt(col::LINE_NUMBER).unwrap_or_default(),
            entity_id,
        );
        request.owner_id = user_id;
        request.operator = row.opt(col::LINE_OPERATOR).map(str::to_string);
        request.contract = row.opt(col::CONTRACT).map(str::to_string);
        request.supplier = row.opt(col::SUPPLIER).map(str::to_string);
        request.finance = row_finance(row);
        status.line = asset_status(ctx, row, request).await;
    }

    if row.wants_phone() {
        let mut request = AssetRequest::new(
            AssetKind::Phone,
            phone_asset_name(
                row.opt(col::PHONE_BRAND),
                row.opt(col::PHONE_MODEL),
                row.opt(col::PHONE_IMEI),
            ),
            entity_id,
        );
        request.owner_id = user_id;
        request.manufacturer = row.opt(col::PHONE_BRAND).map(str::to_string);
        request.model = row.opt(col::PHONE_MODEL).map(str::to_string);
        request.serial = row.opt(col::PHONE_IMEI).map(str::to_string);
        status.mobile = asset_status(ctx, row, request).await;
    }

    if row.wants_notebook() {
        let mut request = AssetRequest::new(
            AssetKind::Computer,
            notebook_asset_name(
                row.opt(col::NB_BRAND),
                row.opt(col::NB_MODEL),
                row.opt(col::NB_SERIAL),
            ),
            entity_id,
        );
        request.owner_id = user_id;
        request.manufacturer = row.opt(col::NB_BRAND).map(str::to_string);
        request.model = row.opt(col::NB_MODEL).map(str::to_string);
        request.serial = row.opt(col::NB_SERIAL).map(str::to_string);
        request.components = ComponentSpec {
            storage: row.opt(col::NB_STORAGE).map(str::to_string),
            processor: row.opt(col::NB_PROCESSOR).map(str::to_string),
            memory: row.opt(col::NB_MEMORY).map(str::to_string),
        };
        request.contract = row.opt(col::CONTRACT).map(str::to_string);
        request.supplier = row.opt(col::SUPPLIER).map(str::to_string);
        request.finance = row_finance(row);
        status.notebook = asset_status(ctx, row, request).await;
    }

    status
}

async fn asset_status(ctx: &Context, row: &RowRecord, request: AssetRequest) -> StepStatus {
    let kind = request.kind;
    match provision_asset(ctx, &request).await {
        Ok(_) => StepStatus::Ok,
        Err(reason) => {
            log::error!("row {}: {} failed: {reason}", row.sheet_row, kind.endpoint());
            StepStatus::Failed(reason)
        }
    }
}

fn row_finance(row: &RowRecord) -> FinanceSpec {
    FinanceSpec {
        purchase_date: row.opt(col::PURCHASE_DATE).map(str::to_string),
        purchase_value: row.opt(col::PURCHASE_VALUE).map(str::to_string),
    }
}

/// Phone assets are named from model and IMEI so the natural key stays
/// unique across identical models.
fn phone_asset_name(brand: Option<&str>, model: Option<&str>, imei: Option<&str>) -> String {
    let base = match (brand, model) {
        (Some(brand), Some(model)) => format!("{brand} {model}"),
        (None, Some(model)) => model.to_string(),
        (Some(brand), None) => brand.to_string(),
        (None, None) => "Phone".to_string(),
    };
    match imei {
        Some(imei) => format!("{base} - {imei}"),
        None => base,
    }
}

/// Notebooks follow the same convention with the serial number.
fn notebook_asset_name(brand: Option<&str>, model: Option<&str>, serial: Option<&str>) -> String {
    let base = match (brand, model) {
        (Some(brand), Some(model)) => format!("{brand} {model}"),
        (None, Some(model)) => model.to_string(),
        (Some(brand), None) => brand.to_string(),
        (None, None) => "Notebook".to_string(),
    };
    match serial {
        Some(serial) => format!("{base} - {serial}"),
        None => base,
    }
}
