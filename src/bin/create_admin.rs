use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;

use coopex::{
    DEFAULT_TIMEZONE,
    admin_tools::{create_admin, print_error, prompt_new_password, validate_db_path},
    initialize_db,
};

/// A utility for creating an administrator who can log in to coopex.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database. It is created if it does not exist.
    #[arg(long)]
    db_path: String,

    /// The administrator's display name.
    #[arg(long)]
    name: String,

    /// The username the administrator logs in with.
    #[arg(long)]
    username: String,

    /// An email address the administrator may also log in with.
    #[arg(long)]
    email: Option<String>,

    /// The canonical name of the timezone used to read legacy timestamps.
    #[arg(long, default_value_t = DEFAULT_TIMEZONE.to_owned())]
    timezone: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);

    if let Err(message) = validate_db_path(db_path, db_path.is_file()) {
        print_error(message);
        exit(1);
    }

    println!("Creating administrator {} in {db_path:#?}", args.username);

    let Some(password_hash) = prompt_new_password(&[&args.name, &args.username])? else {
        return Ok(());
    };

    let connection = Connection::open(db_path)?;
    initialize_db(&connection, &args.timezone)?;

    match create_admin(
        &args.name,
        &args.username,
        args.email.as_deref(),
        &password_hash,
        &connection,
    ) {
        Ok(user) => {
            println!("Administrator created with user ID {}.", user.id.as_i64());
            Ok(())
        }
        Err(error) => {
            print_error(format!("Could not create administrator: {error}"));
            exit(1);
        }
    }
}
