use axum::{Router, response::Html};
use http::StatusCode;

const MAINTENANCE_PAGE: &str = include_str!("maintenance.html");

/// Router mounted instead of the gateway when maintenance mode is on:
/// every method on every path gets the fixed 503 page.
pub fn maintenance_router() -> Router {
    Router::new().fallback(maintenance_page)
}

async fn maintenance_page() -> (StatusCode, Html<&'static str>) {
    (StatusCode::SERVICE_UNAVAILABLE, Html(MAINTENANCE_PAGE))
}
