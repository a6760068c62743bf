//! Command line helpers shared by the binaries.

use std::{
    io::{self, ErrorKind},
    path::Path,
};

use crate::{Error, PasswordHash, ValidatedPassword};

pub use crate::auth::{
    create_admin, find_user_by_identifier, update_password as update_user_password,
};
pub use crate::establishment::{NewEstablishment, create_establishment};
pub use crate::ledger::{Actor, LedgerChange, LedgerPolicy, NewEntry, apply};
pub use crate::member::{NewMember, create_member};

/// Check that `db_path` names a file with an extension, e.g. 'coopex.db'.
///
/// # Errors
///
/// Returns a message for the user when the path has no file extension, or
/// when `must_exist` does not match whether the file exists.
pub fn validate_db_path(db_path: &Path, must_exist: bool) -> Result<(), String> {
    match db_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            return Err(
                "Database path must include a file extension (e.g., 'coopex.db').".to_owned(),
            );
        }
    }

    match (must_exist, db_path.is_file()) {
        (true, false) => Err(format!("File does not exist at {db_path:#?}!")),
        (false, true) => Err(format!("File already exists at {db_path:#?}!")),
        _ => Ok(()),
    }
}

/// Ask for a new password twice on the terminal until the user enters a
/// strong password the same way both times.
///
/// `user_inputs` are words the password must not be built from.
/// Returns `Ok(None)` if the user closes stdin.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn prompt_new_password(user_inputs: &[&str]) -> io::Result<Option<PasswordHash>> {
    loop {
        println!();

        let Some(first_password) = prompt("Enter a new password: ")? else {
            return Ok(None);
        };

        if let Err(error) = ValidatedPassword::new(&first_password, user_inputs) {
            print_error(error);
            continue;
        }

        let Some(second_password) = prompt("Enter the same password again: ")? else {
            return Ok(None);
        };

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        let password_hash = PasswordHash::from_raw_password(
            &first_password,
            user_inputs,
            PasswordHash::DEFAULT_COST,
        );
        match password_hash {
            Ok(password_hash) => return Ok(Some(password_hash)),
            Err(Error::TooWeak(feedback)) => print_error(feedback),
            Err(error) => print_error(format!("Could not hash password: {error}. Try again.")),
        }
    }
}

fn prompt(text: &str) -> io::Result<Option<String>> {
    match rpassword::prompt_password(text) {
        Ok(password) => Ok(Some(password)),
        Err(error) if error.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(error) => Err(error),
    }
}

/// Print `error` to stderr in bold red with its first letter capitalised.
pub fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{capitalise_first_char, validate_db_path};

    #[test]
    fn db_path_needs_extension() {
        assert!(validate_db_path(Path::new("coopex"), false).is_err());
        assert!(validate_db_path(Path::new("coopex."), false).is_err());
    }

    #[test]
    fn db_path_existence_is_checked() {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");

        assert!(validate_db_path(&manifest, true).is_ok());
        assert!(validate_db_path(&manifest, false).is_err());
        assert!(validate_db_path(Path::new("nao-existe.db"), true).is_err());
        assert!(validate_db_path(Path::new("nao-existe.db"), false).is_ok());
    }

    #[test]
    fn capitalises_first_character() {
        assert_eq!(capitalise_first_char("senha fraca"), "Senha fraca");
        assert_eq!(capitalise_first_char("ética"), "Ética");
        assert_eq!(capitalise_first_char(""), "");
    }
}
