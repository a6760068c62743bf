use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use coopex::{
    DEFAULT_TIMEZONE, LastEntryCache, Money, PasswordHash, ValidatedPassword,
    admin_tools::{
        Actor, LedgerChange, LedgerPolicy, NewEntry, NewEstablishment, NewMember, apply,
        create_admin, create_establishment, create_member, print_error, validate_db_path,
    },
    initialize_db,
};

/// A utility for creating a test database for the coopex server.
///
/// Every user it creates logs in with the password "test".
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let output_path = Path::new(&args.output_path);

    if let Err(message) = validate_db_path(output_path, false) {
        print_error(message);
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let connection = Connection::open(output_path)?;
    initialize_db(&connection, DEFAULT_TIMEZONE)?;

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("test"),
        PasswordHash::DEFAULT_COST,
    )?;

    println!("Creating administrator \"admin\"...");
    create_admin("Administrador", "admin", None, &password_hash, &connection)?;

    println!("Creating establishment \"padaria\"...");
    let establishment = create_establishment(
        &NewEstablishment {
            name: "Padaria Central".to_owned(),
            username: "padaria".to_owned(),
            email: None,
            password_hash: password_hash.clone(),
            logo: None,
        },
        &connection,
    )?;

    println!("Creating member \"maria\"...");
    let member = create_member(
        &NewMember {
            name: "Maria da Silva".to_owned(),
            username: "maria".to_owned(),
            initial_credit: Money::from_reais(500),
            email: Some("maria@example.com".to_owned()),
            password_hash: Some(password_hash),
            photo: None,
        },
        &connection,
    )?;

    println!("Recording ledger entries...");
    let cache = LastEntryCache::default();
    let now = OffsetDateTime::now_utc();
    let entries = [(2350, 2), (1299, 30), (8000, 24 * 9)];
    for (order, (amount, hours_ago)) in entries.into_iter().enumerate() {
        apply(
            LedgerChange::Create(NewEntry {
                member_id: member.id,
                amount: Money::from_cents(amount),
                order_number: format!("OS-{:04}", order + 1),
                description: None,
            }),
            Actor::Establishment(establishment.id),
            &LedgerPolicy::default(),
            now - Duration::hours(hours_ago),
            &connection,
            &cache,
        )?;
    }

    println!("Success!");

    Ok(())
}
