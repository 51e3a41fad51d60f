use crate::services::pinning::PinError;
use crate::AppState;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    response::{IntoResponse, Response},
};

/// Acknowledgement body for a deployed update.
pub const ACK_BODY: &str = "Ok\n";

/// Webhook entry point for every path and method.
///
/// Every outcome answers with the default success status; only a completed
/// update carries a body. Failures are visible in the logs only.
pub async fn receive_push(State(state): State<AppState>, body: Body) -> Response {
    let bytes = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            PinError::UnreadableBody(e.to_string()).log();
            return ().into_response();
        }
    };

    match state.pinner.pin(&bytes).await {
        Ok(outcome) => {
            tracing::info!(
                image = %outcome.image,
                "deployed an update with new image: {}",
                outcome.image
            );
            ACK_BODY.into_response()
        }
        Err(e) => {
            e.log();
            ().into_response()
        }
    }
}
