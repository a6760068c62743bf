//! The only way to change ledger entries and member credit.
//!
//! Every change runs in a single SQLite transaction. A member's credit always
//! equals their initial credit minus the amounts of their existing entries,
//! give or take administrator overrides, because nothing else writes either.

use rusqlite::{Connection, params};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{CurrentUser, Role},
    cache::LastEntryCache,
    database_id::{EntryId, EstablishmentId, MemberId},
    establishment::get_establishment,
    ledger::core::{Entry, get_entry},
    member::{get_member, write_member_credit},
    money::Money,
};

/// Whether an entry may take a member's credit below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreditPolicy {
    /// Reject entries larger than the member's credit.
    #[default]
    RequireSufficientCredit,
    /// Let balances go negative.
    AllowNegative,
}

/// How long after creation an establishment may edit or delete its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditWindow(Duration);

impl EditWindow {
    pub fn from_hours(hours: u32) -> Self {
        Self(Duration::hours(hours.into()))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Whether an entry created at `created_at` can still be changed at `now`.
    pub fn is_open(&self, created_at: OffsetDateTime, now: OffsetDateTime) -> bool {
        now - created_at <= self.0
    }
}

impl Default for EditWindow {
    fn default() -> Self {
        Self::from_hours(10)
    }
}

/// The rules a ledger change is checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerPolicy {
    pub credit: CreditPolicy,
    pub edit_window: EditWindow,
}

/// Who is asking for a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin,
    Establishment(EstablishmentId),
    Member(MemberId),
}

impl From<&CurrentUser> for Actor {
    fn from(user: &CurrentUser) -> Self {
        match user.role {
            Role::Admin => Actor::Admin,
            Role::Establishment => Actor::Establishment(user.link_id),
            Role::Member => Actor::Member(user.link_id),
        }
    }
}

/// A debit an establishment wants to record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub member_id: MemberId,
    pub amount: Money,
    pub order_number: String,
    pub description: Option<String>,
}

/// The new values for an existing entry. The member cannot be changed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryUpdate {
    pub amount: Money,
    pub order_number: String,
    pub description: Option<String>,
}

/// A requested change to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerChange {
    Create(NewEntry),
    Edit { entry_id: EntryId, update: EntryUpdate },
    Delete { entry_id: EntryId },
    /// Set a member's credit directly, bypassing entry arithmetic.
    AdminOverride { member_id: MemberId, credit: Money },
}

/// What a successful change did.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    Created(Entry),
    Edited(Entry),
    /// The entry as it was before it was deleted.
    Deleted(Entry),
    CreditSet { member_id: MemberId, credit: Money },
}

/// Check and apply `change` on behalf of `actor`.
///
/// On success the change is committed and `cache` is invalidated. On error
/// nothing is written.
///
/// # Errors
///
/// - [Error::Forbidden] if the actor's role may not make the change.
/// - [Error::InvalidAmount] for a non-positive amount, a negative override,
///   or a change that would take an amount or credit past [Money::MAX].
/// - [Error::MissingField] for a blank order number.
/// - [Error::MemberNotFound] or [Error::EstablishmentNotFound] for unknown references.
/// - [Error::InsufficientCredit] if the policy requires credit the member does not have.
/// - [Error::NotEntryOwner] if an establishment changes another establishment's entry.
/// - [Error::EditWindowExpired] if the entry is too old to change.
/// - [Error::UpdateMissingEntry] or [Error::DeleteMissingEntry] for unknown entries.
pub fn apply(
    change: LedgerChange,
    actor: Actor,
    policy: &LedgerPolicy,
    now: OffsetDateTime,
    connection: &Connection,
    cache: &LastEntryCache,
) -> Result<LedgerOutcome, Error> {
    let transaction = connection.unchecked_transaction()?;

    let outcome = match change {
        LedgerChange::Create(new_entry) => {
            create_entry(new_entry, actor, policy, now, &transaction)?
        }
        LedgerChange::Edit { entry_id, update } => {
            edit_entry(entry_id, update, actor, policy, now, &transaction)?
        }
        LedgerChange::Delete { entry_id } => {
            delete_entry(entry_id, actor, policy, now, &transaction)?
        }
        LedgerChange::AdminOverride { member_id, credit } => {
            override_credit(member_id, credit, actor, now, &transaction)?
        }
    };

    transaction.commit()?;
    cache.invalidate();

    Ok(outcome)
}

fn require_positive(amount: Money) -> Result<(), Error> {
    if amount.is_positive() && amount.is_in_range() {
        Ok(())
    } else {
        Err(Error::InvalidAmount(amount.to_string()))
    }
}

fn clean_order_number(order_number: &str) -> Result<String, Error> {
    let order_number = order_number.trim();

    if order_number.is_empty() {
        Err(Error::MissingField("Nº OS"))
    } else {
        Ok(order_number.to_owned())
    }
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|description| description.trim().to_owned())
        .filter(|description| !description.is_empty())
}

/// The member's credit after paying `amount` more, which may be negative.
fn debit(credit: Money, amount: Money) -> Result<Money, Error> {
    credit
        .checked_sub(amount)
        .ok_or_else(|| Error::InvalidAmount(amount.to_string()))
}

/// Check that a member with `credit` can pay `amount` more.
fn check_credit(credit: Money, amount: Money, policy: &LedgerPolicy) -> Result<(), Error> {
    match policy.credit {
        CreditPolicy::RequireSufficientCredit if amount.is_positive() && credit < amount => {
            Err(Error::InsufficientCredit {
                available: credit,
                requested: amount,
            })
        }
        _ => Ok(()),
    }
}

fn create_entry(
    new_entry: NewEntry,
    actor: Actor,
    policy: &LedgerPolicy,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<LedgerOutcome, Error> {
    let Actor::Establishment(establishment_id) = actor else {
        return Err(Error::Forbidden);
    };

    require_positive(new_entry.amount)?;
    let order_number = clean_order_number(&new_entry.order_number)?;
    let description = clean_description(new_entry.description);

    let member = get_member(new_entry.member_id, connection)?;
    get_establishment(establishment_id, connection)?;
    check_credit(member.credit, new_entry.amount, policy)?;

    let credit = debit(member.credit, new_entry.amount)?;
    write_member_credit(member.id, credit, now, connection)?;
    connection.execute(
        "INSERT INTO entry (created_at, order_number, amount, description, member_id, establishment_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            now.unix_timestamp(),
            order_number,
            new_entry.amount,
            description,
            member.id,
            establishment_id
        ],
    )?;
    let entry = get_entry(connection.last_insert_rowid(), connection)?;

    tracing::info!(
        "Establishment {establishment_id} debited {} from member {} (entry {}, OS {})",
        entry.amount,
        member.id,
        entry.id,
        entry.order_number
    );

    Ok(LedgerOutcome::Created(entry))
}

/// Get the entry and check that `actor` may change it at `now`.
fn get_changeable_entry(
    entry_id: EntryId,
    actor: Actor,
    policy: &LedgerPolicy,
    now: OffsetDateTime,
    missing_error: Error,
    connection: &Connection,
) -> Result<Entry, Error> {
    let entry = match get_entry(entry_id, connection) {
        Ok(entry) => entry,
        Err(Error::NotFound) => return Err(missing_error),
        Err(error) => return Err(error),
    };

    match actor {
        Actor::Establishment(establishment_id) if establishment_id != entry.establishment_id => {
            Err(Error::NotEntryOwner)
        }
        Actor::Establishment(_) if !policy.edit_window.is_open(entry.created_at, now) => {
            Err(Error::EditWindowExpired)
        }
        Actor::Establishment(_) => Ok(entry),
        Actor::Admin | Actor::Member(_) => Err(Error::Forbidden),
    }
}

fn edit_entry(
    entry_id: EntryId,
    update: EntryUpdate,
    actor: Actor,
    policy: &LedgerPolicy,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<LedgerOutcome, Error> {
    if let Actor::Admin | Actor::Member(_) = actor {
        return Err(Error::Forbidden);
    }

    let old_entry = get_changeable_entry(
        entry_id,
        actor,
        policy,
        now,
        Error::UpdateMissingEntry,
        connection,
    )?;

    require_positive(update.amount)?;
    let order_number = clean_order_number(&update.order_number)?;
    let description = clean_description(update.description);

    let member = get_member(old_entry.member_id, connection)?;
    let delta = update.amount - old_entry.amount;
    check_credit(member.credit, delta, policy)?;

    if delta != Money::ZERO {
        let credit = debit(member.credit, delta)?;
        write_member_credit(member.id, credit, now, connection)?;
    }

    connection.execute(
        "UPDATE entry SET amount = ?1, order_number = ?2, description = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            update.amount,
            order_number,
            description,
            now.unix_timestamp(),
            entry_id
        ],
    )?;
    let entry = get_entry(entry_id, connection)?;

    tracing::info!(
        "Entry {entry_id} changed from {} to {} by {actor:?}",
        old_entry.amount,
        entry.amount
    );

    Ok(LedgerOutcome::Edited(entry))
}

fn delete_entry(
    entry_id: EntryId,
    actor: Actor,
    policy: &LedgerPolicy,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<LedgerOutcome, Error> {
    let entry = match actor {
        // Administrators may delete any entry at any time.
        Actor::Admin => match get_entry(entry_id, connection) {
            Err(Error::NotFound) => return Err(Error::DeleteMissingEntry),
            result => result?,
        },
        Actor::Establishment(_) => get_changeable_entry(
            entry_id,
            actor,
            policy,
            now,
            Error::DeleteMissingEntry,
            connection,
        )?,
        Actor::Member(_) => return Err(Error::Forbidden),
    };

    let member = get_member(entry.member_id, connection)?;
    let credit = member
        .credit
        .checked_add(entry.amount)
        .ok_or_else(|| Error::InvalidAmount(entry.amount.to_string()))?;
    write_member_credit(member.id, credit, now, connection)?;
    connection.execute("DELETE FROM entry WHERE id = ?1", [entry_id])?;

    tracing::info!(
        "Entry {entry_id} deleted by {actor:?}, {} returned to member {}",
        entry.amount,
        member.id
    );

    Ok(LedgerOutcome::Deleted(entry))
}

fn override_credit(
    member_id: MemberId,
    credit: Money,
    actor: Actor,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<LedgerOutcome, Error> {
    if actor != Actor::Admin {
        return Err(Error::Forbidden);
    }

    if credit.is_negative() || !credit.is_in_range() {
        return Err(Error::InvalidAmount(credit.to_string()));
    }

    let member = get_member(member_id, connection)?;
    write_member_credit(member_id, credit, now, connection)?;

    tracing::info!(
        "Administrator set the credit of member {member_id} from {} to {credit}",
        member.credit
    );

    Ok(LedgerOutcome::CreditSet { member_id, credit })
}
