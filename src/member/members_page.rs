//! Displays the members and their credit.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::{CurrentUser, Role},
    endpoints::{self, format_endpoint},
    html::{
        LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        base, edit_delete_action_links,
    },
    member::core::{Member, list_members},
    navigation::NavBar,
    timezone::format_local,
};

/// The state needed for the [get_members_page] route handler.
#[derive(Debug, Clone)]
pub struct MembersPageState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for MembersPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The member data to display in the view
#[derive(Debug, PartialEq)]
struct MemberTableRow {
    name: String,
    username: String,
    credit: String,
    credit_updated_at: String,
    photo_url: Option<String>,
    edit_url: String,
    delete_url: String,
}

fn to_table_row(member: Member, timezone: &str) -> MemberTableRow {
    MemberTableRow {
        credit: member.credit.to_string(),
        credit_updated_at: member
            .credit_updated_at
            .map(|instant| format_local(instant, timezone))
            .unwrap_or_default(),
        photo_url: member
            .has_photo
            .then(|| format_endpoint(endpoints::MEMBER_PHOTO, member.id)),
        edit_url: format_endpoint(endpoints::EDIT_MEMBER_VIEW, member.id),
        delete_url: format_endpoint(endpoints::MEMBER_API, member.id),
        name: member.name,
        username: member.username,
    }
}

fn members_view(members: &[MemberTableRow], role: Role) -> Markup {
    let can_manage = role == Role::Admin;
    let column_count = if can_manage { 6 } else { 5 };

    let table_row = |member: &MemberTableRow| {
        html!(
            tr class=(TABLE_ROW_STYLE)
            {
                td class=(TABLE_CELL_STYLE)
                {
                    @if let Some(photo_url) = &member.photo_url {
                        img
                            src=(photo_url)
                            alt=(member.name)
                            class="w-10 h-10 rounded-full object-cover";
                    }
                }

                th
                    scope="row"
                    class="px-6 py-4 font-medium text-gray-900 whitespace-nowrap dark:text-white"
                {
                    (member.name)
                }

                td class=(TABLE_CELL_STYLE) { (member.username) }

                td class="px-6 py-4 text-right tabular-nums" { (member.credit) }

                td class=(TABLE_CELL_STYLE) { (member.credit_updated_at) }

                @if can_manage {
                    td class=(TABLE_CELL_STYLE)
                    {
                        (edit_delete_action_links(
                            Some(&member.edit_url),
                            Some(&member.delete_url),
                            &format!(
                                "Excluir o cooperado '{}'? Esta ação não pode ser desfeita.",
                                member.name
                            ),
                            "closest tr",
                            "delete",
                        ))
                    }
                }
            }
        )
    };

    let content = html!(
        (NavBar::new(endpoints::MEMBERS_VIEW, role).into_html())

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-5xl"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Cooperados" }

                    @if can_manage {
                        a href=(endpoints::NEW_MEMBER_VIEW) class=(LINK_STYLE) { "Novo cooperado" }
                    }
                }

                div class="w-full overflow-x-auto dark:bg-gray-800"
                {
                    table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "Foto" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Nome" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Usuário" }
                                th scope="col" class="px-6 py-3 text-right" { "Crédito" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Atualizado em" }
                                @if can_manage {
                                    th scope="col" class=(TABLE_CELL_STYLE) { "Ações" }
                                }
                            }
                        }

                        tbody
                        {
                            @for member in members {
                                (table_row(member))
                            }

                            @if members.is_empty() {
                                tr
                                {
                                    td
                                        colspan=(column_count)
                                        class="px-6 py-4 text-center text-gray-500 dark:text-gray-400"
                                    {
                                        "Nenhum cooperado cadastrado."
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    );

    base("Cooperados", &[], &content)
}

/// Renders the member list. Establishments see it read-only.
pub async fn get_members_page(
    State(state): State<MembersPageState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, Error> {
    user.require_any(&[Role::Admin, Role::Establishment])?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let members: Vec<MemberTableRow> = list_members(&connection)
        .inspect_err(|error| tracing::error!("could not get members: {error}"))?
        .into_iter()
        .map(|member| to_table_row(member, &state.local_timezone))
        .collect();

    Ok(members_view(&members, user.role).into_response())
}
