//! Read-only lookup handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use filer_core::{FilingPlan, RecordContext, Selection, StoredFile};

use crate::{AppError, AppState};

/// Query parameters naming one row
#[derive(Debug, Deserialize)]
pub struct RowQuery {
    pub sheet: String,
    /// 1-based row; row 1 is the header
    pub row: usize,
}

/// Active record plus where its documents would go
#[derive(Debug, Serialize)]
pub struct ContextResponse {
    /// Absent on the header row or an excluded sheet
    pub context: Option<RecordContext>,
    pub plan: Vec<FilingPlan>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /api/health - Liveness check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/context?sheet=&row= - Record context for a selected row
pub async fn context(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RowQuery>,
) -> Result<Json<ContextResponse>, AppError> {
    let selection = Selection {
        sheet: params.sheet,
        row: params.row,
    };

    let response = state
        .run(Some(selection), |filer| {
            let context = filer.active_context();
            let plan = context
                .as_ref()
                .map(|ctx| filer.filing_plan(ctx))
                .unwrap_or_default();
            Ok(ContextResponse { context, plan })
        })
        .await?;

    Ok(Json(response))
}

/// GET /api/files?sheet=&row= - Documents filed for a row
pub async fn files(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RowQuery>,
) -> Result<Json<Vec<StoredFile>>, AppError> {
    let files = state
        .run(None, move |filer| filer.files_for_row(&params.sheet, params.row))
        .await?;

    Ok(Json(files))
}
