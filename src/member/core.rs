use rusqlite::{Connection, OptionalExtension, Row, params};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{PasswordHash, Role, delete_user_for_link, set_email_for_link, upsert_user},
    database_id::MemberId,
    db::get_optional_timestamp,
    image::Image,
    money::Money,
};

/// A cooperative member and the credit they hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// The id for the member.
    pub id: MemberId,
    /// The member's full name.
    pub name: String,
    /// The name the member logs in with.
    pub username: String,
    /// The credit left for the member to spend.
    pub credit: Money,
    /// Whether a photo is stored in the database or on disk.
    pub has_photo: bool,
    /// When the credit last changed.
    pub credit_updated_at: Option<OffsetDateTime>,
}

/// The data needed to register a member.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    pub name: String,
    pub username: String,
    /// The credit the member starts with.
    pub initial_credit: Money,
    /// Lets the member log in with an email address as well as the username.
    pub email: Option<String>,
    /// Creates a member credential when set.
    pub password_hash: Option<PasswordHash>,
    pub photo: Option<Image>,
}

/// The changes an administrator can make to a member.
///
/// The credit is not here: it only changes through the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberUpdate {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    /// Replaces the member's password, creating a credential if needed.
    pub password_hash: Option<PasswordHash>,
    /// Replaces the stored photo. `None` keeps the current one.
    pub photo: Option<Image>,
}

/// Where a member's photo can be found.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberPhoto {
    /// The image is stored in the database.
    Stored(Image),
    /// An older release saved the image to this file.
    File(String),
    /// The member has no photo.
    Missing,
}

pub fn create_member_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS member (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            credit INTEGER NOT NULL DEFAULT 0,
            photo BLOB,
            photo_mime TEXT,
            photo_path TEXT,
            credit_updated_at INTEGER
        )",
        (),
    )?;

    Ok(())
}

const MEMBER_COLUMNS: &str = "id, name, username, credit, \
    (photo IS NOT NULL OR photo_path IS NOT NULL), credit_updated_at";

fn map_member_row(row: &Row) -> Result<Member, rusqlite::Error> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        credit: row.get(3)?,
        has_photo: row.get(4)?,
        credit_updated_at: get_optional_timestamp(row, 5)?,
    })
}

fn map_duplicate_username(username: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |error| match Error::from(error) {
        Error::DuplicateUsername(_) => Error::DuplicateUsername(username.to_owned()),
        error => error,
    }
}

fn require_name_and_username(name: &str, username: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::MissingField("Nome"));
    }

    if username.trim().is_empty() {
        return Err(Error::MissingField("Usuário"));
    }

    Ok(())
}

/// Register a member, and a credential for them when a password is given.
///
/// # Errors
///
/// Returns an error if:
/// - the name or username is blank ([Error::MissingField]),
/// - the initial credit is negative or above [Money::MAX] ([Error::InvalidAmount]),
/// - the username or email is taken,
/// - or some other SQL error occurred.
pub fn create_member(new_member: &NewMember, connection: &Connection) -> Result<Member, Error> {
    require_name_and_username(&new_member.name, &new_member.username)?;

    if new_member.initial_credit.is_negative() || !new_member.initial_credit.is_in_range() {
        return Err(Error::InvalidAmount(new_member.initial_credit.to_string()));
    }

    let name = new_member.name.trim();
    let username = new_member.username.trim();
    let (photo, photo_mime) = match &new_member.photo {
        Some(image) => (Some(image.bytes.as_slice()), Some(image.mime_type.as_str())),
        None => (None, None),
    };
    let now = OffsetDateTime::now_utc().unix_timestamp();

    let transaction = connection.unchecked_transaction()?;

    transaction
        .execute(
            "INSERT INTO member (name, username, credit, photo, photo_mime, credit_updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                username,
                new_member.initial_credit,
                photo,
                photo_mime,
                now
            ],
        )
        .map_err(map_duplicate_username(username))?;
    let id = transaction.last_insert_rowid();

    if let Some(password_hash) = &new_member.password_hash {
        upsert_user(
            Role::Member,
            id,
            new_member.email.as_deref(),
            password_hash,
            &transaction,
        )?;
    }

    let member = get_member(id, &transaction)?;
    transaction.commit()?;

    Ok(member)
}

/// Get a member by ID.
///
/// # Errors
///
/// Returns [Error::MemberNotFound] if there is no member with `id`.
pub fn get_member(id: MemberId, connection: &Connection) -> Result<Member, Error> {
    connection
        .prepare(&format!("SELECT {MEMBER_COLUMNS} FROM member WHERE id = ?1"))?
        .query_row([id], map_member_row)
        .map_err(|error| match Error::from(error) {
            Error::NotFound => Error::MemberNotFound(id),
            error => error,
        })
}

/// Get every member ordered by name.
pub fn list_members(connection: &Connection) -> Result<Vec<Member>, Error> {
    connection
        .prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM member ORDER BY name COLLATE NOCASE ASC, id ASC"
        ))?
        .query_map([], map_member_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

pub fn count_members(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM member", [], |row| row.get(0))
        .map_err(Error::from)
}

/// Update a member's details.
///
/// # Errors
///
/// Returns [Error::UpdateMissingMember] if there is no member with `id`,
/// [Error::DuplicateUsername] or [Error::DuplicateEmail] on conflicts.
pub fn update_member(
    id: MemberId,
    update: &MemberUpdate,
    connection: &Connection,
) -> Result<Member, Error> {
    require_name_and_username(&update.name, &update.username)?;

    let username = update.username.trim();
    let transaction = connection.unchecked_transaction()?;

    let rows_affected = transaction
        .execute(
            "UPDATE member SET name = ?1, username = ?2 WHERE id = ?3",
            params![update.name.trim(), username, id],
        )
        .map_err(map_duplicate_username(username))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingMember);
    }

    if let Some(image) = &update.photo {
        transaction.execute(
            "UPDATE member SET photo = ?1, photo_mime = ?2, photo_path = NULL WHERE id = ?3",
            params![image.bytes, image.mime_type, id],
        )?;
    }

    match &update.password_hash {
        Some(password_hash) => {
            upsert_user(
                Role::Member,
                id,
                update.email.as_deref(),
                password_hash,
                &transaction,
            )?;
        }
        None => {
            set_email_for_link(Role::Member, id, update.email.as_deref(), &transaction)?;
        }
    }

    let member = get_member(id, &transaction)?;
    transaction.commit()?;

    Ok(member)
}

/// Whether any ledger entry refers to the member.
pub fn member_has_entries(id: MemberId, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM entry WHERE member_id = ?1)",
            [id],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Delete a member and their credential.
///
/// # Errors
///
/// Returns [Error::HasLedgerEntries] if entries still refer to the member, or
/// [Error::DeleteMissingMember] if there is no member with `id`.
pub fn delete_member(id: MemberId, connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    if member_has_entries(id, &transaction)? {
        return Err(Error::HasLedgerEntries);
    }

    let rows_affected = transaction.execute("DELETE FROM member WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingMember);
    }

    delete_user_for_link(Role::Member, id, &transaction)?;
    transaction.commit()?;

    Ok(())
}

/// Find a member's photo.
///
/// # Errors
///
/// Returns [Error::MemberNotFound] if there is no member with `id`.
pub fn get_member_photo(id: MemberId, connection: &Connection) -> Result<MemberPhoto, Error> {
    let (bytes, mime_type, path): (Option<Vec<u8>>, Option<String>, Option<String>) = connection
        .query_row(
            "SELECT photo, photo_mime, photo_path FROM member WHERE id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?
        .ok_or(Error::MemberNotFound(id))?;

    let photo = match (bytes, path) {
        (Some(bytes), _) if !bytes.is_empty() => MemberPhoto::Stored(Image {
            // Photos saved before the MIME type was recorded were always JPEG.
            mime_type: mime_type.unwrap_or_else(|| "image/jpeg".to_owned()),
            bytes,
        }),
        (_, Some(path)) if !path.trim().is_empty() => MemberPhoto::File(path),
        _ => MemberPhoto::Missing,
    };

    Ok(photo)
}

/// Overwrite a member's credit. Only the ledger should call this, so that
/// every change to a balance goes through its checks.
pub(crate) fn write_member_credit(
    id: MemberId,
    credit: Money,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE member SET credit = ?1, credit_updated_at = ?2 WHERE id = ?3",
        params![credit, now.unix_timestamp(), id],
    )?;

    match rows_affected {
        0 => Err(Error::MemberNotFound(id)),
        _ => Ok(()),
    }
}


#[cfg(test)]
mod member_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Error,
        auth::{PasswordHash, Role, find_user_by_identifier, get_user_for_link},
        db::initialize,
        image::Image,
        money::Money,
    };

    use super::{
        MemberPhoto, MemberUpdate, NewMember, count_members, create_member, delete_member,
        get_member, get_member_photo, list_members, update_member, write_member_credit,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection, "Etc/UTC").unwrap();
        connection
    }

    fn new_member(name: &str, username: &str, credit: Money) -> NewMember {
        NewMember {
            name: name.to_owned(),
            username: username.to_owned(),
            initial_credit: credit,
            email: None,
            password_hash: None,
            photo: None,
        }
    }

    fn png() -> Image {
        Image {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".to_owned(),
        }
    }

    #[test]
    fn create_member_sets_initial_credit() {
        let connection = get_test_connection();

        let member = create_member(
            &new_member(" Maria Silva ", "maria", Money::from_reais(1000)),
            &connection,
        )
        .unwrap();

        assert_eq!(member.name, "Maria Silva");
        assert_eq!(member.credit, Money::from_reais(1000));
        assert!(!member.has_photo);
        assert!(member.credit_updated_at.is_some());
        assert_eq!(get_member(member.id, &connection), Ok(member));
    }

    #[test]
    fn create_member_with_password_creates_credential() {
        let connection = get_test_connection();
        let mut data = new_member("Maria", "maria", Money::ZERO);
        data.email = Some("Maria@Coopex.com".to_owned());
        data.password_hash = Some(PasswordHash::new_unchecked("hash"));

        let member = create_member(&data, &connection).unwrap();

        let user = get_user_for_link(Role::Member, member.id, &connection)
            .unwrap()
            .expect("member should have a credential");
        assert_eq!(user.email.as_deref(), Some("maria@coopex.com"));
        assert_eq!(
            find_user_by_identifier("maria", Some(Role::Member), &connection),
            Ok(user)
        );
    }

    #[test]
    fn create_member_without_password_has_no_credential() {
        let connection = get_test_connection();

        let member =
            create_member(&new_member("Maria", "maria", Money::ZERO), &connection).unwrap();

        assert_eq!(get_user_for_link(Role::Member, member.id, &connection), Ok(None));
    }

    #[test]
    fn create_member_rejects_duplicate_username() {
        let connection = get_test_connection();
        create_member(&new_member("Maria", "maria", Money::ZERO), &connection).unwrap();

        let result = create_member(&new_member("Outra Maria", "maria", Money::ZERO), &connection);

        assert_eq!(result, Err(Error::DuplicateUsername("maria".to_owned())));
        assert_eq!(count_members(&connection), Ok(1));
    }

    #[test]
    fn create_member_rejects_blank_name() {
        let connection = get_test_connection();

        let result = create_member(&new_member("  ", "maria", Money::ZERO), &connection);

        assert_eq!(result, Err(Error::MissingField("Nome")));
    }

    #[test]
    fn failed_credential_rolls_back_member() {
        let connection = get_test_connection();
        let mut first = new_member("Ana", "ana", Money::ZERO);
        first.email = Some("ana@coopex.com".to_owned());
        first.password_hash = Some(PasswordHash::new_unchecked("hash"));
        create_member(&first, &connection).unwrap();
        let mut second = new_member("Bia", "bia", Money::ZERO);
        second.email = Some("ana@coopex.com".to_owned());
        second.password_hash = Some(PasswordHash::new_unchecked("hash"));

        let result = create_member(&second, &connection);

        assert_eq!(result, Err(Error::DuplicateEmail));
        assert_eq!(count_members(&connection), Ok(1));
    }

    #[test]
    fn get_missing_member_returns_member_not_found() {
        let connection = get_test_connection();

        assert_eq!(get_member(42, &connection), Err(Error::MemberNotFound(42)));
    }

    #[test]
    fn list_members_orders_by_name() {
        let connection = get_test_connection();
        create_member(&new_member("Zé", "ze", Money::ZERO), &connection).unwrap();
        create_member(&new_member("ana", "ana", Money::ZERO), &connection).unwrap();
        create_member(&new_member("Bruno", "bruno", Money::ZERO), &connection).unwrap();

        let names: Vec<String> = list_members(&connection)
            .unwrap()
            .into_iter()
            .map(|member| member.name)
            .collect();

        assert_eq!(names, vec!["ana", "Bruno", "Zé"]);
    }

    #[test]
    fn update_member_keeps_credit() {
        let connection = get_test_connection();
        let member =
            create_member(&new_member("Maria", "maria", Money::from_reais(50)), &connection)
                .unwrap();

        let updated = update_member(
            member.id,
            &MemberUpdate {
                name: "Maria Souza".to_owned(),
                username: "msouza".to_owned(),
                email: None,
                password_hash: None,
                photo: Some(png()),
            },
            &connection,
        )
        .unwrap();

        assert_eq!(updated.name, "Maria Souza");
        assert_eq!(updated.username, "msouza");
        assert_eq!(updated.credit, Money::from_reais(50));
        assert!(updated.has_photo);
    }

    #[test]
    fn update_missing_member_fails() {
        let connection = get_test_connection();

        let result = update_member(
            7,
            &MemberUpdate {
                name: "Maria".to_owned(),
                username: "maria".to_owned(),
                email: None,
                password_hash: None,
                photo: None,
            },
            &connection,
        );

        assert_eq!(result, Err(Error::UpdateMissingMember));
    }

    #[test]
    fn delete_member_removes_credential() {
        let connection = get_test_connection();
        let mut data = new_member("Maria", "maria", Money::ZERO);
        data.password_hash = Some(PasswordHash::new_unchecked("hash"));
        let member = create_member(&data, &connection).unwrap();

        delete_member(member.id, &connection).unwrap();

        assert_eq!(get_member(member.id, &connection), Err(Error::MemberNotFound(member.id)));
        assert_eq!(get_user_for_link(Role::Member, member.id, &connection), Ok(None));
    }

    #[test]
    fn delete_member_with_entries_is_rejected() {
        let connection = get_test_connection();
        let member =
            create_member(&new_member("Maria", "maria", Money::ZERO), &connection).unwrap();
        connection
            .execute(
                "INSERT INTO establishment (id, name, username, created_at) VALUES (1, 'Loja', 'loja', 0)",
                (),
            )
            .unwrap();
        connection
            .execute(
                "INSERT INTO entry (created_at, order_number, amount, member_id, establishment_id)
                 VALUES (0, 'OS-1', 100, ?1, 1)",
                [member.id],
            )
            .unwrap();

        assert_eq!(delete_member(member.id, &connection), Err(Error::HasLedgerEntries));
        assert!(get_member(member.id, &connection).is_ok());
    }

    #[test]
    fn delete_missing_member_fails() {
        let connection = get_test_connection();

        assert_eq!(delete_member(3, &connection), Err(Error::DeleteMissingMember));
    }

    #[test]
    fn photo_prefers_stored_image_over_file() {
        let connection = get_test_connection();
        let mut data = new_member("Maria", "maria", Money::ZERO);
        data.photo = Some(png());
        let member = create_member(&data, &connection).unwrap();
        connection
            .execute(
                "UPDATE member SET photo_path = 'fotos/maria.jpg' WHERE id = ?1",
                [member.id],
            )
            .unwrap();

        assert_eq!(
            get_member_photo(member.id, &connection),
            Ok(MemberPhoto::Stored(png()))
        );
    }

    #[test]
    fn photo_falls_back_to_legacy_file() {
        let connection = get_test_connection();
        let member =
            create_member(&new_member("Maria", "maria", Money::ZERO), &connection).unwrap();
        connection
            .execute(
                "UPDATE member SET photo_path = 'fotos/maria.jpg' WHERE id = ?1",
                [member.id],
            )
            .unwrap();

        assert_eq!(
            get_member_photo(member.id, &connection),
            Ok(MemberPhoto::File("fotos/maria.jpg".to_owned()))
        );
        assert!(get_member(member.id, &connection).unwrap().has_photo);
    }

    #[test]
    fn photo_is_missing_without_image_or_file() {
        let connection = get_test_connection();
        let member =
            create_member(&new_member("Maria", "maria", Money::ZERO), &connection).unwrap();

        assert_eq!(get_member_photo(member.id, &connection), Ok(MemberPhoto::Missing));
        assert_eq!(get_member_photo(99, &connection), Err(Error::MemberNotFound(99)));
    }

    #[test]
    fn write_member_credit_stamps_update_time() {
        let connection = get_test_connection();
        let member =
            create_member(&new_member("Maria", "maria", Money::ZERO), &connection).unwrap();
        let now = datetime!(2024-03-02 02:30 UTC);

        write_member_credit(member.id, Money::from_reais(12), now, &connection).unwrap();

        let member = get_member(member.id, &connection).unwrap();
        assert_eq!(member.credit, Money::from_reais(12));
        assert_eq!(member.credit_updated_at, Some(now));
    }
}
