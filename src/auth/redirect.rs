//! Where to send the user after logging in.
//!
//! Only same-origin paths are accepted as redirect targets, and never the
//! log-in or log-out routes themselves.

use axum::{extract::Request, http::Uri};

use crate::endpoints;

fn is_safe_redirect_url(redirect_url: &str) -> bool {
    if !redirect_url.starts_with('/') || redirect_url.starts_with("//") {
        return false;
    }

    let path = redirect_url
        .split_once('?')
        .map_or(redirect_url, |(path, _)| path);

    path != endpoints::LOG_IN_VIEW && path != endpoints::LOG_OUT
}

fn path_and_query(raw_url: &str) -> Option<String> {
    let uri = raw_url.parse::<Uri>().ok()?;
    let path_and_query = uri.path_and_query()?.as_str();

    is_safe_redirect_url(path_and_query).then(|| path_and_query.to_owned())
}

/// Accept `raw_url` as a redirect target if it is a local path.
pub fn normalize_redirect_url(raw_url: &str) -> Option<String> {
    let uri = raw_url.parse::<Uri>().ok()?;

    if uri.scheme().is_some() || uri.authority().is_some() {
        return None;
    }

    path_and_query(raw_url)
}

/// The log-in URL that sends the user back to what `request` asked for.
///
/// Requests to `/api` come from HTMX, so the page the user was on is taken
/// from the `HX-Current-URL` header rather than the request URI.
pub fn build_log_in_redirect_url(request: &Request) -> Option<String> {
    let redirect_target = if request.uri().path().starts_with("/api") {
        redirect_target_from_hx_request(request)?
    } else {
        normalize_redirect_url(request.uri().path_and_query()?.as_str())?
    };

    build_log_in_redirect_url_from_target(&redirect_target)
}

pub(super) fn build_log_in_redirect_url_from_target(redirect_target: &str) -> Option<String> {
    match serde_urlencoded::to_string([("redirect_url", redirect_target)]) {
        Ok(param) => Some(format!("{}?{}", endpoints::LOG_IN_VIEW, param)),
        Err(error) => {
            tracing::error!("Could not encode redirect URL {redirect_target}: {error}");
            None
        }
    }
}

fn redirect_target_from_hx_request(request: &Request) -> Option<String> {
    let headers = request.headers();
    let is_hx_request = headers
        .get("hx-request")
        .and_then(|header| header.to_str().ok())
        .is_some_and(|header| header.eq_ignore_ascii_case("true"));

    if !is_hx_request {
        tracing::warn!("Missing HX-Request header for /api request.");
        return None;
    }

    let Some(current_url) = headers
        .get("hx-current-url")
        .and_then(|header| header.to_str().ok())
    else {
        tracing::warn!("Missing HX-Current-URL header for /api request.");
        return None;
    };

    // HX-Current-URL is absolute, so only its path and query are kept.
    let redirect_url = path_and_query(current_url);
    if redirect_url.is_none() {
        tracing::warn!("Invalid HX-Current-URL header value: {current_url}");
    }

    redirect_url
}
