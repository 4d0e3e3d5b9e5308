use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

pub const API_VERSION: &str = "1";

pub async fn add_response_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Deckbridge-Api-Version", HeaderValue::from_static(API_VERSION));
    response
}
