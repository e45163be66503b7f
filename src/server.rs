//! HTTP surface: polling, session control, settings, history and the MJPEG
//! preview stream.

use std::convert::Infallible;

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use futures::stream;
use log::info;
use serde::Deserialize;
use serde_json::json;
use tokio::{net::TcpListener, sync::broadcast::error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::session::{
    commands::{self, StartSessionRequest},
    SessionController,
};
use crate::settings::AnalyticsSettings;
use crate::{log_debug, report::REPORT_FILE_NAME};

const ENABLE_LOGS: bool = false;
const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

#[derive(Clone)]
struct ServerState {
    controller: SessionController,
    shutdown: CancellationToken,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Deserialize)]
struct ThresholdRequest {
    threshold: i64,
}

pub fn router(controller: SessionController, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/stats", get(get_stats))
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/current", delete(cancel_session))
        .route("/api/threshold", post(set_threshold))
        .route("/api/settings", get(get_settings).put(update_settings))
        .route("/api/history", get(get_history))
        .route("/download_report", get(download_report))
        .route("/video_feed", get(video_feed))
        .with_state(ServerState {
            controller,
            shutdown,
        })
}

/// Serves until `shutdown` fires. Open MJPEG streams end on the same signal.
pub async fn serve(
    listener: TcpListener,
    controller: SessionController,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("Serving crowd analytics on http://{addr}");

    let app = router(controller, shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("http server failed")
}

async fn get_stats(State(state): State<ServerState>) -> impl IntoResponse {
    Json(commands::get_stats(&state.controller))
}

async fn start_session(
    State(state): State<ServerState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = commands::start_session(&state.controller, request)
        .await
        .map_err(ApiError::bad_request)?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn cancel_session(State(state): State<ServerState>) -> Result<StatusCode, ApiError> {
    commands::cancel_session(&state.controller)
        .await
        .map_err(ApiError::internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_threshold(
    State(state): State<ServerState>,
    Json(request): Json<ThresholdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let threshold = commands::set_threshold(&state.controller, request.threshold)
        .map_err(ApiError::bad_request)?;
    Ok(Json(json!({ "threshold": threshold })))
}

async fn get_settings(State(state): State<ServerState>) -> impl IntoResponse {
    Json(commands::get_settings(&state.controller))
}

async fn update_settings(
    State(state): State<ServerState>,
    Json(settings): Json<AnalyticsSettings>,
) -> Result<impl IntoResponse, ApiError> {
    let applied =
        commands::update_settings(&state.controller, settings).map_err(ApiError::bad_request)?;
    Ok(Json(applied))
}

async fn get_history(State(state): State<ServerState>) -> Result<impl IntoResponse, ApiError> {
    let history = commands::get_history(&state.controller)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(history))
}

async fn download_report(State(state): State<ServerState>) -> Result<Response, ApiError> {
    let csv = commands::download_report(&state.controller)
        .await
        .map_err(ApiError::internal)?;
    let disposition = format!("attachment; filename=\"{REPORT_FILE_NAME}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

async fn video_feed(State(state): State<ServerState>) -> Response {
    let frames = state.controller.subscribe_frames();
    let parts = stream::unfold(
        (frames, state.shutdown),
        |(mut frames, shutdown)| async move {
            loop {
                let received = tokio::select! {
                    received = frames.recv() => received,
                    _ = shutdown.cancelled() => return None,
                };
                match received {
                    Ok(jpeg) => {
                        let part = mjpeg_part(&jpeg);
                        return Some((Ok::<_, Infallible>(part), (frames, shutdown)));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log_debug!("MJPEG client lagged; dropped {skipped} frames");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        },
    );

    ([(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)], Body::from_stream(parts)).into_response()
}

fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let mut part = Vec::with_capacity(jpeg.len() + 64);
    part.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}
