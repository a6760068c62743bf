//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/cooperados/{member_id}/editar', use [format_endpoint].

/// The root route which redirects to the home page of the logged in role.
pub const ROOT: &str = "/";
/// The landing page for administrators.
pub const DASHBOARD_VIEW: &str = "/dashboard";
/// The landing page for establishments.
pub const ESTABLISHMENT_PANEL_VIEW: &str = "/painel_estabelecimento";
/// The landing page for members.
pub const MEMBER_PANEL_VIEW: &str = "/painel_cooperado";
/// The page for listing members.
pub const MEMBERS_VIEW: &str = "/cooperados";
/// The page for creating a member.
pub const NEW_MEMBER_VIEW: &str = "/cooperados/novo";
/// The page for editing a member.
pub const EDIT_MEMBER_VIEW: &str = "/cooperados/{member_id}/editar";
/// The route that serves a member's photo.
pub const MEMBER_PHOTO: &str = "/cooperados/foto/{member_id}";
/// The page for listing establishments.
pub const ESTABLISHMENTS_VIEW: &str = "/estabelecimentos";
/// The page for creating an establishment.
pub const NEW_ESTABLISHMENT_VIEW: &str = "/estabelecimentos/novo";
/// The page for editing an establishment.
pub const EDIT_ESTABLISHMENT_VIEW: &str = "/estabelecimentos/{establishment_id}/editar";
/// The route that serves an establishment's logo.
pub const ESTABLISHMENT_LOGO: &str = "/estabelecimentos/logo/{establishment_id}";
/// The page for listing ledger entries.
pub const ENTRIES_VIEW: &str = "/lancamentos";
/// The route that downloads the filtered ledger entries as a spreadsheet.
pub const EXPORT_ENTRIES: &str = "/lancamentos/exportar";
/// The page for editing a ledger entry.
pub const EDIT_ENTRY_VIEW: &str = "/lancamentos/{entry_id}/editar";
/// The route for getting the log in page.
pub const LOG_IN_VIEW: &str = "/login";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/logout";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/erro";
/// The route for static files.
pub const STATIC: &str = "/static";

/// The route for logging in a user.
pub const LOG_IN_API: &str = "/api/login";
/// The route to create members.
pub const MEMBERS_API: &str = "/api/cooperados";
/// The route to update or delete a member.
pub const MEMBER_API: &str = "/api/cooperados/{member_id}";
/// The route for an administrator to set a member's credit.
pub const MEMBER_CREDIT_API: &str = "/api/cooperados/{member_id}/credito";
/// The route to create establishments.
pub const ESTABLISHMENTS_API: &str = "/api/estabelecimentos";
/// The route to update or delete an establishment.
pub const ESTABLISHMENT_API: &str = "/api/estabelecimentos/{establishment_id}";
/// The route to create ledger entries.
pub const ENTRIES_API: &str = "/api/lancamentos";
/// The route to update or delete a ledger entry.
pub const ENTRY_API: &str = "/api/lancamentos/{entry_id}";
/// The route that returns the ID of the newest ledger entry as JSON.
pub const LAST_ENTRY_API: &str = "/api/ultimo-lancamento";
/// The route that returns a summary of a ledger entry as JSON.
pub const ENTRY_INFO_API: &str = "/api/lancamento-info";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/cooperados/{member_id}/editar', '{member_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok(), "{uri} is not a valid URI");
    }

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::ROOT,
            endpoints::DASHBOARD_VIEW,
            endpoints::ESTABLISHMENT_PANEL_VIEW,
            endpoints::MEMBER_PANEL_VIEW,
            endpoints::MEMBERS_VIEW,
            endpoints::NEW_MEMBER_VIEW,
            endpoints::ESTABLISHMENTS_VIEW,
            endpoints::NEW_ESTABLISHMENT_VIEW,
            endpoints::ENTRIES_VIEW,
            endpoints::EXPORT_ENTRIES,
            endpoints::LOG_IN_VIEW,
            endpoints::LOG_OUT,
            endpoints::INTERNAL_ERROR_VIEW,
            endpoints::STATIC,
            endpoints::LOG_IN_API,
            endpoints::MEMBERS_API,
            endpoints::ESTABLISHMENTS_API,
            endpoints::ENTRIES_API,
            endpoints::LAST_ENTRY_API,
            endpoints::ENTRY_INFO_API,
        ] {
            assert_endpoint_is_valid_uri(endpoint);
        }

        for endpoint in [
            endpoints::EDIT_MEMBER_VIEW,
            endpoints::MEMBER_PHOTO,
            endpoints::EDIT_ESTABLISHMENT_VIEW,
            endpoints::ESTABLISHMENT_LOGO,
            endpoints::EDIT_ENTRY_VIEW,
            endpoints::MEMBER_API,
            endpoints::MEMBER_CREDIT_API,
            endpoints::ESTABLISHMENT_API,
            endpoints::ENTRY_API,
        ] {
            assert_endpoint_is_valid_uri(&format_endpoint(endpoint, 1));
        }
    }

    #[test]
    fn format_endpoint_replaces_parameter() {
        assert_eq!(
            format_endpoint(endpoints::EDIT_MEMBER_VIEW, 42),
            "/cooperados/42/editar"
        );
        assert_eq!(format_endpoint(endpoints::ENTRY_API, 7), "/api/lancamentos/7");
    }

    #[test]
    fn format_endpoint_without_parameter_is_unchanged() {
        assert_eq!(
            format_endpoint(endpoints::ENTRIES_VIEW, 1),
            endpoints::ENTRIES_VIEW
        );
    }
}
