//! Cooperative members and the credit they hold.
//!
//! This module contains:
//! - The `Member` model and its database functions
//! - The administrator pages for listing, creating and editing members
//! - The credit override endpoint and photo serving
//! - The panel members see after logging in

mod core;
mod create_endpoint;
mod create_page;
mod credit_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod edit_page;
mod form;
mod members_page;
mod panel;
mod photo;

pub use core::{
    Member, MemberUpdate, NewMember, count_members, create_member, create_member_table,
    get_member, list_members,
};
pub(crate) use core::write_member_credit;
pub use create_endpoint::create_member_endpoint;
pub use create_page::get_create_member_page;
pub use credit_endpoint::set_member_credit_endpoint;
pub use delete_endpoint::delete_member_endpoint;
pub use edit_endpoint::edit_member_endpoint;
pub use edit_page::get_edit_member_page;
pub use members_page::get_members_page;
pub use panel::get_member_panel;
pub use photo::get_member_photo_endpoint;
