//! Dashboard module
//!
//! Provides the administrator's overview page: ledger totals, the month's
//! largest consumers and the latest entries, which the page polls for.

mod charts;
mod handlers;

pub use handlers::get_dashboard_page;
