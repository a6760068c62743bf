//! The ledger of debits ("lançamentos") establishments record against
//! members' credit.
//!
//! This module contains:
//! - The `Entry` model and the filtered queries over it
//! - `apply`, the only place member credit and entries change together
//! - The listing, edit and export pages and the JSON polling endpoints

mod api;
mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod edit_page;
mod entries_page;
mod export;
mod filter;
mod form;
mod mutation;

pub use api::{get_entry_info, get_last_entry_id};
pub use core::{
    Entry, EntryDetails, count_entries, create_entry_table, get_entry, latest_entry_id,
    query_entries, sum_entries, top_members_by_amount,
};
pub use create_endpoint::{EntryChangeState, create_entry_endpoint};
pub use delete_endpoint::delete_entry_endpoint;
pub use edit_endpoint::edit_entry_endpoint;
pub use edit_page::get_edit_entry_page;
pub use entries_page::{describe_period, get_entries_page};
pub use export::export_entries;
pub use filter::{DefaultPeriod, EntryFilter, EntryQuery, Period};
pub use form::entry_form_fields;
pub use mutation::{
    Actor, CreditPolicy, EditWindow, LedgerChange, LedgerOutcome, LedgerPolicy, NewEntry, apply,
};
