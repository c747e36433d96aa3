use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{error, warn};

/// Log 4xx and 5xx responses.
///
/// Only the path is recorded: the query string may carry a token.
pub async fn log_request_errors(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let response = next.run(req).await;
    let status = response.status();
    if status.is_client_error() {
        // 4xx error
        warn!(
            method = %method,
            path = %path,
            status = %status,
            "Client error"
        );
    } else if status.is_server_error() {
        // 5xx error
        error!(
            method = %method,
            path = %path,
            status = %status,
            "Server error"
        );
    }

    response
}
