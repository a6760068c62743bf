//! Alert system for displaying success and error messages to users.
//!
//! Alerts are rendered as an out-of-band swap of the `#alert-container` element
//! in [base](crate::html::base), so they work both as the response to a form
//! submission (`hx-target-error="#alert-container"`) and alongside swaps that
//! discard the response body (e.g. `hx-swap="delete"`).

use axum::response::{IntoResponse, Response};
use maud::{Markup, html};

/// A message shown to the user after an HTMX request.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// A success message with additional details.
    Success { message: String, details: String },
    /// A success message on its own.
    SuccessSimple { message: String },
    /// An error message and how to fix it.
    Error { message: String, details: String },
}

impl Alert {
    pub fn into_html(self) -> Markup {
        let (is_error, message, details) = match self {
            Alert::Success { message, details } => (false, message, details),
            Alert::SuccessSimple { message } => (false, message, String::new()),
            Alert::Error { message, details } => (true, message, details),
        };

        let container_style = if is_error {
            "flex items-start gap-3 p-4 rounded-lg shadow border text-red-800 \
            bg-red-50 border-red-300 dark:bg-gray-800 dark:text-red-400 \
            dark:border-red-800"
        } else {
            "flex items-start gap-3 p-4 rounded-lg shadow border text-green-800 \
            bg-green-50 border-green-300 dark:bg-gray-800 dark:text-green-400 \
            dark:border-green-800"
        };

        html! {
            div
                id="alert-container"
                hx-swap-oob="true"
                class="w-full max-w-md px-4"
                style="position: fixed; bottom: 1rem; left: 50%; transform: translateX(-50%); z-index: 9999;"
            {
                div class=(container_style) role="alert"
                {
                    div class="flex-1"
                    {
                        p class="font-semibold" { (message) }

                        @if !details.is_empty() {
                            p class="text-sm mt-1" { (details) }
                        }
                    }

                    button
                        type="button"
                        aria-label="Fechar"
                        class="text-sm font-bold bg-transparent border-none cursor-pointer"
                        onclick="this.closest('#alert-container').classList.add('hidden')"
                    {
                        "×"
                    }
                }
            }
        }
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use scraper::Selector;

    use crate::test_utils::{assert_valid_html, parse_html_fragment};

    use super::Alert;

    #[tokio::test]
    async fn error_alert_swaps_alert_container() {
        let response = Alert::Error {
            message: "Crédito insuficiente".to_owned(),
            details: "Saldo de R$ 10,00".to_owned(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        assert_valid_html(&html);
        let container = html
            .select(&Selector::parse("#alert-container").unwrap())
            .next()
            .expect("alert container missing");
        assert_eq!(container.value().attr("hx-swap-oob"), Some("true"));
        let text = container.text().collect::<String>();
        assert!(text.contains("Crédito insuficiente"));
        assert!(text.contains("Saldo de R$ 10,00"));
    }

    #[tokio::test]
    async fn simple_alert_has_no_details_paragraph() {
        let response = Alert::SuccessSimple {
            message: "Lançamento excluído".to_owned(),
        }
        .into_response();

        let html = parse_html_fragment(response).await;
        let paragraphs = html.select(&Selector::parse("p").unwrap()).count();
        assert_eq!(paragraphs, 1);
    }
}
