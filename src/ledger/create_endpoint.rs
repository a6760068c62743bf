//! Defines the endpoint establishments use to record a ledger entry.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    cache::LastEntryCache,
    endpoints,
    ledger::{
        form::EntryFormData,
        mutation::{Actor, LedgerChange, LedgerPolicy, NewEntry, apply},
    },
};

/// The state needed to record a ledger entry.
#[derive(Debug, Clone)]
pub struct EntryChangeState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub policy: LedgerPolicy,
    pub last_entry_cache: Arc<LastEntryCache>,
}

impl FromRef<AppState> for EntryChangeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            policy: LedgerPolicy {
                credit: state.credit_policy,
                edit_window: state.edit_window,
            },
            last_entry_cache: state.last_entry_cache.clone(),
        }
    }
}

/// The form an establishment submits to debit a member.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntryForm {
    /// The member's ID, as text so a blank selection can be reported.
    #[serde(default)]
    pub member_id: String,
    #[serde(flatten)]
    pub entry: EntryFormData,
}

impl CreateEntryForm {
    fn to_new_entry(&self) -> Result<NewEntry, Error> {
        let member_id = self
            .member_id
            .trim()
            .parse()
            .map_err(|_| Error::MissingField("Cooperado"))?;

        Ok(NewEntry {
            member_id,
            amount: self.entry.parse_amount()?,
            order_number: self.entry.order_number.clone(),
            description: self.entry.description.clone(),
        })
    }
}

/// A route handler for recording a ledger entry, redirects to the
/// establishment panel on success.
pub async fn create_entry_endpoint(
    State(state): State<EntryChangeState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<CreateEntryForm>,
) -> Response {
    let new_entry = match form.to_new_entry() {
        Ok(new_entry) => new_entry,
        Err(error) => return error.into_alert_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match apply(
        LedgerChange::Create(new_entry),
        Actor::from(&user),
        &state.policy,
        OffsetDateTime::now_utc(),
        &connection,
        &state.last_entry_cache,
    ) {
        Ok(_) => (
            HxRedirect(endpoints::ESTABLISHMENT_PANEL_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::warn!("Could not create ledger entry for {user:?}: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Form, extract::State, http::StatusCode};
    use rusqlite::Connection;

    use crate::{
        cache::LastEntryCache,
        endpoints,
        ledger::{form::EntryFormData, mutation::LedgerPolicy},
        member::get_member,
        money::Money,
        test_utils::{
            admin_user, assert_hx_redirect, establishment_user, get_test_connection,
            parse_html_fragment, seed_establishment, seed_member,
        },
    };

    use super::{CreateEntryForm, EntryChangeState, create_entry_endpoint};

    fn form(member_id: &str, amount: &str) -> CreateEntryForm {
        CreateEntryForm {
            member_id: member_id.to_owned(),
            entry: EntryFormData {
                amount: amount.to_owned(),
                order_number: "OS-123".to_owned(),
                description: Some("Almoço".to_owned()),
            },
        }
    }

    fn state(connection: Connection) -> EntryChangeState {
        EntryChangeState {
            db_connection: Arc::new(Mutex::new(connection)),
            policy: LedgerPolicy::default(),
            last_entry_cache: Arc::new(LastEntryCache::default()),
        }
    }

    #[tokio::test]
    async fn creates_entry_and_redirects_to_panel() {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::from_reais(100), &connection);
        let establishment = seed_establishment("Padaria", "padaria", &connection);
        let state = state(connection);

        let response = create_entry_endpoint(
            State(state.clone()),
            Extension(establishment_user(establishment)),
            Form(form(&member.to_string(), "12,50")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::ESTABLISHMENT_PANEL_VIEW);
        let connection = state.db_connection.lock().unwrap();
        assert_eq!(
            get_member(member, &connection).unwrap().credit,
            Money::from_cents(8750)
        );
    }

    #[tokio::test]
    async fn insufficient_credit_shows_alert() {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::from_reais(10), &connection);
        let establishment = seed_establishment("Padaria", "padaria", &connection);
        let state = state(connection);

        let response = create_entry_endpoint(
            State(state.clone()),
            Extension(establishment_user(establishment)),
            Form(form(&member.to_string(), "10,01")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = parse_html_fragment(response).await;
        let text = html.root_element().text().collect::<String>();
        assert!(text.contains("Crédito insuficiente"), "got alert {text:?}");
        assert!(text.contains("R$ 10,00"), "got alert {text:?}");
    }

    #[tokio::test]
    async fn invalid_amount_shows_alert() {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::from_reais(10), &connection);
        let establishment = seed_establishment("Padaria", "padaria", &connection);

        let response = create_entry_endpoint(
            State(state(connection)),
            Extension(establishment_user(establishment)),
            Form(form(&member.to_string(), "dez reais")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_member_shows_alert() {
        let connection = get_test_connection();
        let establishment = seed_establishment("Padaria", "padaria", &connection);

        let response = create_entry_endpoint(
            State(state(connection)),
            Extension(establishment_user(establishment)),
            Form(form("", "1")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_cannot_create_entries() {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::from_reais(10), &connection);

        let response = create_entry_endpoint(
            State(state(connection)),
            Extension(admin_user()),
            Form(form(&member.to_string(), "1")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
