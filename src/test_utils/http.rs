use axum::{body::Body, http::StatusCode, response::Response};

#[track_caller]
pub(crate) fn get_header(response: &Response<Body>, header_name: &str) -> String {
    match response.headers().get(header_name) {
        Some(value) => value
            .to_str()
            .unwrap_or_else(|_| panic!("Header {header_name} is not visible ASCII"))
            .to_owned(),
        None => panic!("Headers missing {header_name}, got {:?}", response.headers()),
    }
}

#[track_caller]
pub(crate) fn assert_status_ok(response: &Response<Body>) {
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "want 200 OK, got {}",
        response.status()
    );
}

#[track_caller]
pub(crate) fn assert_content_type(response: &Response<Body>, content_type: &str) {
    assert_eq!(get_header(response, "content-type"), content_type);
}

/// Check the redirect HTMX follows after a successful form submission.
#[track_caller]
pub(crate) fn assert_hx_redirect(response: &Response<Body>, endpoint: &str) {
    assert_eq!(get_header(response, "hx-redirect"), endpoint);
}
