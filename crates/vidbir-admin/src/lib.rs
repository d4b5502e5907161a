//! Web panel for staff: browse, filter, update, and delete applications
//! outside Telegram.
//!
//! A thin axum app over the same store and Status Coordinator the bot uses,
//! so a panel update tears threads down exactly like a button press would.
//! Every request carries a short-lived token issued via `/panel` in the
//! staff group.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Form, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use vidbir_core::{
    current_unix_timestamp, AcceptanceDetails, ApplicantStatus, ChatId, OperatorId,
};
use vidbir_relay::StatusCoordinator;
use vidbir_storage::IntakeStore;
use vidbir_telegram::TelegramApiClient;

mod panel_page;

pub use panel_page::render_panel_page;

/// Settings for the panel process.
#[derive(Debug, Clone)]
pub struct AdminServerConfig {
    pub bind: String,
    pub group_id: ChatId,
    /// When set, a token must also belong to a current member of the staff
    /// group; revoked staff lose panel access with their membership.
    pub enforce_membership: bool,
    pub token_ttl_seconds: u64,
}

/// Shared request state.
pub struct AdminServerState {
    pub config: AdminServerConfig,
    pub store: Arc<dyn IntakeStore>,
    pub coordinator: StatusCoordinator,
    pub client: TelegramApiClient,
}

/// Runs the panel HTTP server until ctrl-c.
pub async fn run_admin_server(state: AdminServerState) -> Result<()> {
    let bind_addr = state
        .config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid admin bind address '{}'", state.config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind admin server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound admin server address")?;
    info!(addr = %local_addr, "admin panel listening");

    let app = build_admin_router(Arc::new(state));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("admin server exited unexpectedly")?;
    Ok(())
}

fn build_admin_router(state: Arc<AdminServerState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/update", post(handle_update))
        .route("/delete", post(handle_delete))
        .with_state(state)
}

/// Operator-facing request failure.
#[derive(Debug)]
struct PanelError {
    status: StatusCode,
    message: String,
}

impl PanelError {
    fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.to_string(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for PanelError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Resolves the request token (query/form field or bearer header) to an
/// operator, optionally enforcing staff-group membership.
async fn authorize(
    state: &AdminServerState,
    headers: &HeaderMap,
    token_field: Option<&str>,
) -> Result<OperatorId, PanelError> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    let Some(token) = token_field
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .or(bearer)
    else {
        return Err(PanelError::unauthorized("missing panel token"));
    };

    let operator_id = state
        .store
        .resolve_admin_token(token, current_unix_timestamp(), state.config.token_ttl_seconds)
        .await
        .map_err(|error| PanelError::internal(format!("token lookup failed: {error}")))?
        .ok_or_else(|| PanelError::unauthorized("unknown or expired panel token"))?;

    if state.config.enforce_membership {
        let status = state
            .client
            .get_chat_member(state.config.group_id, operator_id)
            .await
            .map_err(|error| {
                warn!(operator_id, error = %error, "membership check failed");
                PanelError::unauthorized("could not verify group membership")
            })?;
        if !matches!(status.as_str(), "creator" | "administrator" | "member") {
            return Err(PanelError::unauthorized("not a member of the staff group"));
        }
    }
    Ok(operator_id)
}

#[derive(Debug, Deserialize, Default)]
struct IndexQuery {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

async fn handle_index(
    State(state): State<Arc<AdminServerState>>,
    headers: HeaderMap,
    Query(query): Query<IndexQuery>,
) -> Response {
    if let Err(error) = authorize(&state, &headers, query.token.as_deref()).await {
        return error.into_response();
    }

    let filter = query
        .status
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .and_then(ApplicantStatus::parse);
    let applicants = match state.store.list_applicants(filter).await {
        Ok(applicants) => applicants,
        Err(error) => {
            return PanelError::internal(format!("failed to list applicants: {error}"))
                .into_response();
        }
    };

    let token = query.token.unwrap_or_default();
    match render_panel_page(&applicants, filter, &token) {
        Ok(page) => Html(page).into_response(),
        Err(error) => PanelError::internal(format!("failed to render page: {error}")).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct UpdateForm {
    token: String,
    telegram_id: i64,
    status: String,
    #[serde(default)]
    accepted_city: Option<String>,
    #[serde(default)]
    accepted_date: Option<String>,
}

async fn handle_update(
    State(state): State<Arc<AdminServerState>>,
    headers: HeaderMap,
    Form(form): Form<UpdateForm>,
) -> Response {
    if let Err(error) = authorize(&state, &headers, Some(&form.token)).await {
        return error.into_response();
    }
    let Some(status) = ApplicantStatus::parse(&form.status) else {
        return PanelError::bad_request(format!("unknown status '{}'", form.status))
            .into_response();
    };

    let details = match status {
        ApplicantStatus::Accepted => {
            let city = form
                .accepted_city
                .as_deref()
                .map(str::trim)
                .filter(|city| !city.is_empty());
            let date = form
                .accepted_date
                .as_deref()
                .map(str::trim)
                .filter(|date| !date.is_empty());
            let (Some(city), Some(date)) = (city, date) else {
                return PanelError::bad_request(
                    "acceptance requires місто and дата (РРРР-ММ-ДД)",
                )
                .into_response();
            };
            match AcceptanceDetails::parse(&format!("{city}:{date}")) {
                Ok(details) => Some(details),
                Err(error) => return PanelError::bad_request(error.to_string()).into_response(),
            }
        }
        _ => None,
    };

    if let Err(error) = state
        .coordinator
        .apply_panel_update(form.telegram_id, status, details)
        .await
    {
        return PanelError::internal(format!("update failed: {error}")).into_response();
    }
    Redirect::to(&format!("/?token={}", form.token)).into_response()
}

#[derive(Debug, Deserialize)]
struct DeleteForm {
    token: String,
    telegram_id: i64,
}

async fn handle_delete(
    State(state): State<Arc<AdminServerState>>,
    headers: HeaderMap,
    Form(form): Form<DeleteForm>,
) -> Response {
    if let Err(error) = authorize(&state, &headers, Some(&form.token)).await {
        return error.into_response();
    }
    if let Err(error) = state.coordinator.delete_applicant(form.telegram_id).await {
        return PanelError::internal(format!("delete failed: {error}")).into_response();
    }
    Redirect::to(&format!("/?token={}", form.token)).into_response()
}
