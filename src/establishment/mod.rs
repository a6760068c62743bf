//! Partner establishments, which record ledger entries against members' credit.

mod core;
mod create_endpoint;
mod create_page;
mod delete_endpoint;
mod edit_endpoint;
mod edit_page;
mod establishments_page;
mod form;
mod logo;
mod panel;

pub use core::{
    Establishment, NewEstablishment, count_establishments, create_establishment,
    create_establishment_table, get_establishment, list_establishments,
};
pub use create_endpoint::create_establishment_endpoint;
pub use create_page::get_create_establishment_page;
pub use delete_endpoint::delete_establishment_endpoint;
pub use edit_endpoint::edit_establishment_endpoint;
pub use edit_page::get_edit_establishment_page;
pub use establishments_page::get_establishments_page;
pub use logo::get_establishment_logo_endpoint;
pub use panel::get_establishment_panel;
