//! Authentication: credentials, session cookies, the auth middleware and the
//! log-in and log-out routes.

mod cookie;
mod current_user;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod redirect;
mod token;
mod user;

pub use cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie};
pub use current_user::CurrentUser;
pub use log_in::{get_log_in_page, post_log_in};
pub use log_out::get_log_out;
pub use middleware::{auth_guard, auth_guard_hx};
pub use password::{PasswordHash, ValidatedPassword};
pub(crate) use redirect::normalize_redirect_url;
pub(super) use token::Token;
pub use user::{
    Role, User, UserID, count_users, create_admin, create_admin_table, create_user_table,
    delete_user_for_link, find_user_by_identifier, get_user_by_id, get_user_for_link,
    set_email_for_link, update_password, upsert_user,
};

#[cfg(test)]
pub use cookie::COOKIE_TOKEN;

#[cfg(test)]
pub use middleware::AuthState;
