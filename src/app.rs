use crate::auth;
use crate::response::{envelope, ApiResponse};
use crate::state::AppState;
use axum::{http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .nest("/api/auth", auth::router())
        .fallback(not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn root() -> &'static str {
    "Welcome to Cherry Blossom Backend API"
}

async fn not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    envelope(StatusCode::NOT_FOUND, None, "Endpoint tidak ditemukan")
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "5000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unmatched_routes_get_the_envelope() {
        let (status, Json(body)) = not_found().await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], 404);
        assert!(json["data"].is_null());
        assert_eq!(json["message"], "Endpoint tidak ditemukan");
    }
}
