//! Control endpoints for host frameworks.
//!
//! Mounting this router into the host service's axum application exposes
//! in-band monitoring control: each route translates to the corresponding
//! queue message.

use crate::verification::Verification;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

/// Router exposing stop, pause and resume under `/monitoring/`.
pub fn control_router(verification: Arc<Verification>) -> Router {
    Router::new()
        .route("/monitoring/stop-monitoring/", get(stop_monitoring))
        .route("/monitoring/pause-monitoring/", get(pause_monitoring))
        .route("/monitoring/resume-monitoring/", get(resume_monitoring))
        .with_state(verification)
}

async fn stop_monitoring(State(verification): State<Arc<Verification>>) -> &'static str {
    let _ = verification.stop().await;
    "Monitoring loop exited. Restart the service to turn monitoring back on.\n"
}

async fn pause_monitoring(State(verification): State<Arc<Verification>>) -> &'static str {
    verification.pause_monitoring().await;
    "Monitoring paused. The loop is still running.\n"
}

async fn resume_monitoring(State(verification): State<Arc<Verification>>) -> &'static str {
    verification.resume_monitoring().await;
    "Monitoring resumed.\n"
}
