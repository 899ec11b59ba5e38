//! Filer Web Server
//!
//! Axum-based JSON API exposing the filing entry points:
//! - Upload a document for a record
//! - Change notifications for edited cells
//! - Full-sheet refresh and read-only lookups
//!
//! Every invocation builds its own filer from the config and runs on the
//! blocking pool while holding a process-wide lock, so at most one
//! upload or reconciliation touches the store at a time.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

use filer_core::{Config, CsvWorkbook, Filer, LocalFileStore, Selection};

mod handlers;

/// Filer backed by the local store and CSV workbook
pub type LocalFiler = Filer<LocalFileStore, CsvWorkbook>;

/// Shared application state
pub struct AppState {
    pub config: Config,
    /// Held for the whole of each invocation
    invocation: Mutex<()>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            invocation: Mutex::new(()),
        }
    }

    /// Run `f` against a freshly opened filer, one invocation at a time
    pub async fn run<T, F>(&self, selection: Option<Selection>, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&LocalFiler) -> filer_core::Result<T> + Send + 'static,
    {
        let _guard = self.invocation.lock().await;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let filer = Filer::open(&config, selection)?;
            f(&filer)
        })
        .await?
        .map_err(AppError::from_core)
    }
}

/// Create the application router
pub fn create_router(config: Config) -> Router {
    let body_limit = config.server.max_upload_bytes;
    let state = Arc::new(AppState::new(config));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::upload))
        .route("/edit", post(handlers::edit))
        .route("/refresh/:sheet", post(handlers::refresh))
        .route("/context", get(handlers::context))
        .route("/files", get(handlers::files));

    // Same-origin only
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    info!(
        "Filing into {} (workbook: {})",
        config.store.root_dir.display(),
        config.sheets.workbook_dir.display()
    );

    let app = create_router(config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map core errors: caller mistakes keep their message, the rest are hidden
    pub fn from_core(err: filer_core::Error) -> Self {
        use filer_core::Error;

        if matches!(err, Error::NotFound(_) | Error::SheetNotFound(_)) {
            Self::not_found(&err.to_string())
        } else if matches!(err, Error::InvalidData(_) | Error::Decode(_)) {
            Self::bad_request(&err.to_string())
        } else {
            err.into()
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
