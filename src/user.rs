//! Code for creating the user table and resolving callers to users.
//!
//! Users are issued an opaque identity by the hosted auth provider. The
//! identity is stored as `external_id` and mapped to the integer [UserId]
//! that owns accounts and transactions.

use rusqlite::{Connection, ErrorCode};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::UserId};

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserId,
    /// The identity issued by the auth provider.
    pub external_id: String,
    /// The user's display name.
    pub name: String,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::ValidationFailed] if `external_id` is empty or already taken,
/// - [Error::SqlError] if an SQL related error occurred.
pub fn create_user(external_id: &str, name: &str, connection: &Connection) -> Result<User, Error> {
    let external_id = external_id.trim();

    if external_id.is_empty() {
        return Err(Error::ValidationFailed(
            "user identity must not be empty".to_owned(),
        ));
    }

    connection
        .execute(
            "INSERT INTO user (external_id, name) VALUES (?1, ?2)",
            (external_id, name),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.code == ErrorCode::ConstraintViolation =>
            {
                Error::ValidationFailed(format!("the identity {external_id} is already registered"))
            }
            error => error.into(),
        })?;

    Ok(User {
        id: connection.last_insert_rowid(),
        external_id: external_id.to_owned(),
        name: name.to_owned(),
    })
}

/// Get the user whose auth provider identity is `external_id`.
///
/// # Errors
///
/// Returns a [Error::NotFound] if no user has the identity.
pub fn get_user_by_external_id(external_id: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, external_id, name FROM user WHERE external_id = :external_id")?
        .query_row(&[(":external_id", &external_id)], |row| {
            Ok(User {
                id: row.get(0)?,
                external_id: row.get(1)?,
                name: row.get(2)?,
            })
        })
        .map_err(|error| error.into())
}

/// Map the caller identity of a request to the ID of the user that owns the data.
///
/// # Errors
///
/// Returns [Error::Unauthorized] if there is no identity or no user has the
/// identity.
pub fn resolve_owner(identity: Option<&str>, connection: &Connection) -> Result<UserId, Error> {
    let identity = identity
        .map(str::trim)
        .filter(|identity| !identity.is_empty())
        .ok_or(Error::Unauthorized)?;

    match get_user_by_external_id(identity, connection) {
        Ok(user) => Ok(user.id),
        Err(Error::NotFound) => Err(Error::Unauthorized),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::Error;

    use super::{create_user, create_user_table, get_user_by_external_id, resolve_owner};

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    #[test]
    fn insert_user_succeeds() {
        let connection = get_db_connection();

        let user = create_user("user_2abc", "Alice", &connection).unwrap();

        assert!(user.id > 0);
        assert_eq!(user.external_id, "user_2abc");
        assert_eq!(user.name, "Alice");
    }

    #[test]
    fn insert_duplicate_identity_fails() {
        let connection = get_db_connection();
        create_user("user_2abc", "Alice", &connection).unwrap();

        let result = create_user("user_2abc", "Mallory", &connection);

        assert!(matches!(result, Err(Error::ValidationFailed(_))));
    }

    #[test]
    fn insert_empty_identity_fails() {
        let connection = get_db_connection();

        let result = create_user("  ", "Nobody", &connection);

        assert!(matches!(result, Err(Error::ValidationFailed(_))));
    }

    #[test]
    fn get_user_by_external_id_succeeds() {
        let connection = get_db_connection();
        let inserted = create_user("user_2abc", "Alice", &connection).unwrap();

        let selected = get_user_by_external_id("user_2abc", &connection).unwrap();

        assert_eq!(inserted, selected);
    }

    #[test]
    fn resolve_owner_returns_user_id() {
        let connection = get_db_connection();
        let user = create_user("user_2abc", "Alice", &connection).unwrap();

        assert_eq!(resolve_owner(Some("user_2abc"), &connection), Ok(user.id));
    }

    #[test]
    fn resolve_owner_without_identity_is_unauthorized() {
        let connection = get_db_connection();

        assert_eq!(resolve_owner(None, &connection), Err(Error::Unauthorized));
        assert_eq!(resolve_owner(Some(""), &connection), Err(Error::Unauthorized));
    }

    #[test]
    fn resolve_owner_with_unknown_identity_is_unauthorized() {
        let connection = get_db_connection();

        assert_eq!(
            resolve_owner(Some("user_unknown"), &connection),
            Err(Error::Unauthorized)
        );
    }
}
