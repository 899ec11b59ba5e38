//! Upload, change-notification and refresh handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Serialize;
use tracing::{error, info};

use filer_core::{EditEvent, RefreshSummary, UploadRequest, UploadResponse};

use crate::{AppError, AppState};

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// POST /api/upload - File a document for a record
///
/// Always answers 200; the body's `success` flag carries the outcome,
/// including for bodies that do not parse.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Json<UploadResponse> {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let reason = rejection.body_text();
            error!("Rejected upload request: {}", reason);
            return Json(UploadResponse {
                success: false,
                file_id: String::new(),
                message: format!("Upload failed: {}", reason),
            });
        }
    };

    let sheet = req.sheet.clone();
    let row = req.record.row_index;

    let response = match state
        .run(None, move |filer| Ok(filer.handle_upload(&req)))
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!(sheet = %sheet, row, "Upload failed: {}", e.message());
            UploadResponse {
                success: false,
                file_id: String::new(),
                message: format!("Upload failed: {}", e.message()),
            }
        }
    };

    if response.success {
        info!(sheet = %sheet, row, file = %response.file_id, "Upload complete");
    }

    Json(response)
}

/// POST /api/edit - Change notification for edited cells
///
/// Failures are logged, never returned.
pub async fn edit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EditEvent>, JsonRejection>,
) -> Json<SuccessResponse> {
    let event = match payload {
        Ok(Json(event)) => event,
        Err(rejection) => {
            error!("Rejected edit notification: {}", rejection.body_text());
            return Json(SuccessResponse { success: true });
        }
    };

    let sheet = event.sheet.clone();

    if let Err(e) = state
        .run(None, move |filer| {
            filer.handle_edit(&event);
            Ok(())
        })
        .await
    {
        error!(sheet = %sheet, "Error handling edit: {}", e.message());
    }

    Json(SuccessResponse { success: true })
}

/// POST /api/refresh/:sheet - Re-file every document of a year sheet
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(sheet): Path<String>,
) -> Result<Json<RefreshSummary>, AppError> {
    let summary = state
        .run(None, move |filer| filer.refresh_sheet(&sheet))
        .await?;

    Ok(Json(summary))
}
