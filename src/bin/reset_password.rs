use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;

use coopex::{
    Role,
    admin_tools::{
        find_user_by_identifier, print_error, prompt_new_password, update_user_password,
        validate_db_path,
    },
};

/// A utility for changing the password of an administrator, establishment or member.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The email address or username the user logs in with.
    #[arg(long)]
    identifier: String,

    /// Only look the identifier up among users with this role: admin, establishment or member.
    #[arg(long, value_parser = parse_role)]
    role: Option<Role>,
}

fn parse_role(value: &str) -> Result<Role, String> {
    Role::from_db(value).ok_or_else(|| {
        format!("\"{value}\" is not a role, expected admin, establishment or member")
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);

    if let Err(message) = validate_db_path(db_path, true) {
        print_error(message);
        exit(1);
    }

    println!("Loading user from {db_path:#?}");
    let connection = Connection::open(db_path)?;

    let user = match find_user_by_identifier(&args.identifier, args.role, &connection) {
        Ok(user) => user,
        Err(error) => {
            print_error(format!("Could not find \"{}\": {error}", args.identifier));
            exit(1);
        }
    };
    println!("Resetting password for the {} \"{}\"", user.role, args.identifier);

    let Some(password_hash) = prompt_new_password(&[&args.identifier])? else {
        return Ok(());
    };

    update_user_password(user.id, &password_hash, &connection)?;

    println!("Password updated successfully!");

    Ok(())
}
