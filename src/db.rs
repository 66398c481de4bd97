//! Schema creation and per-connection setup for the SQLite database.

use std::time::Duration;

use rusqlite::{Connection, functions::FunctionFlags};

use crate::{
    Error, account::create_account_table, transaction::create_transaction_table,
    user::create_user_table,
};

/// How long a connection waits on a locked database before giving up with `SQLITE_BUSY`.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Name of the SQL function used for case-insensitive text search.
pub const CASEFOLD_FUNCTION: &str = "casefold";

/// Create the tables for the domain models if they do not exist.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    create_user_table(&transaction)?;
    create_account_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Apply the settings every connection in the pool needs.
///
/// Foreign keys are per-connection in SQLite, so this must run for each new
/// connection, not just once per database file.
pub fn configure_connection(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    connection.create_scalar_function(
        CASEFOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |context| {
            let text: String = context.get(0)?;
            Ok(casefold(&text))
        },
    )?;

    Ok(())
}

/// Normalise `text` for case-insensitive comparisons.
///
/// Used both by the `casefold` SQL function and by in-memory filters so the
/// two always agree.
pub fn casefold(text: &str) -> String {
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::{configure_connection, initialize};

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        configure_connection(&connection).unwrap();
        connection
    }

    #[test]
    fn sql_is_valid() {
        let connection = get_test_connection();

        assert_eq!(Ok(()), initialize(&connection));
    }

    #[test]
    fn initialize_is_idempotent() {
        let connection = get_test_connection();
        initialize(&connection).unwrap();

        assert_eq!(Ok(()), initialize(&connection));
    }

    #[test]
    fn casefold_function_lowercases_unicode() {
        let connection = get_test_connection();

        let folded: String = connection
            .query_row("SELECT casefold('ÉCOLE Coffee')", [], |row| row.get(0))
            .unwrap();

        assert_eq!(folded, "école coffee");
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let connection = get_test_connection();

        let enabled: bool = connection
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert!(enabled);
    }
}
