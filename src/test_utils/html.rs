//! Parsing rendered pages and fragments with `scraper`.

use axum::{body::Body, response::Response};
use scraper::Html;

/// The response body as text, replacing invalid UTF-8.
pub(crate) async fn response_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Could not get response body");

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Parse a full page, e.g. the output of `base`.
pub(crate) async fn parse_html_document(response: Response<Body>) -> Html {
    Html::parse_document(&response_text(response).await)
}

/// Parse an HTMX fragment such as an alert or a re-rendered form.
pub(crate) async fn parse_html_fragment(response: Response<Body>) -> Html {
    Html::parse_fragment(&response_text(response).await)
}

#[track_caller]
pub(crate) fn assert_valid_html(html: &Html) {
    assert!(
        html.errors.is_empty(),
        "Got HTML parsing errors: {:?}",
        html.errors
    );
}
