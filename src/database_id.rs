//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// The ID of a cooperative member.
pub type MemberId = i64;
/// The ID of an establishment.
pub type EstablishmentId = i64;
/// The ID of a ledger entry.
pub type EntryId = i64;
