//! The account model and the queries that create and read accounts.

use rusqlite::{
    Connection, Row, ToSql, TransactionBehavior,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{AccountId, UserId},
    money::{from_cents, to_cents},
    transaction::{Transaction, get_account_transactions},
};

/// The kind of bank account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountKind {
    /// An everyday transaction account.
    Current,
    /// A savings account.
    Savings,
    /// A cheque account.
    Checking,
}

impl AccountKind {
    /// The name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Current => "CURRENT",
            AccountKind::Savings => "SAVINGS",
            AccountKind::Checking => "CHECKING",
        }
    }
}

impl ToSql for AccountKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for AccountKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "CURRENT" => Ok(AccountKind::Current),
            "SAVINGS" => Ok(AccountKind::Savings),
            "CHECKING" => Ok(AccountKind::Checking),
            other => Err(FromSqlError::Other(
                format!("unknown account kind {other}").into(),
            )),
        }
    }
}

/// A bank account and its running balance.
///
/// The balance always equals the opening balance plus the net effect of the
/// transactions that reference the account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub user_id: UserId,
    /// The display name of the account.
    pub name: String,
    /// The kind of account.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// The balance.
    pub balance: Decimal,
    /// Whether this is the owner's default account.
    pub is_default: bool,
}

/// The data for creating an account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    /// The display name of the account.
    pub name: String,
    /// The kind of account.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// The opening balance.
    #[serde(default)]
    pub balance: Decimal,
    /// Whether the account should become the owner's default account.
    #[serde(default)]
    pub is_default: bool,
}

/// An account together with its full transaction history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountWithTransactions {
    /// The account.
    #[serde(flatten)]
    pub account: Account,
    /// Every transaction of the account, newest first.
    pub transactions: Vec<Transaction>,
    /// The number of transactions of the account.
    pub transaction_count: usize,
}

pub(crate) const ACCOUNT_COLUMNS: &str = "id, user_id, name, kind, balance_cents, is_default";

/// Create the account table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            balance_cents INTEGER NOT NULL DEFAULT 0,
            is_default INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_user ON account(user_id)",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let name = row.get(2)?;
    let kind = row.get(3)?;
    let balance_cents = row.get(4)?;
    let is_default = row.get(5)?;

    Ok(Account {
        id,
        user_id,
        name,
        kind,
        balance: from_cents(balance_cents),
        is_default,
    })
}

/// Get the account `account_id` if it belongs to `owner`.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to
/// another user.
pub fn get_account(
    owner: UserId,
    account_id: AccountId,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((account_id, owner), map_account_row)
        .map_err(|error| error.into())
}

/// Get the accounts of `owner`, in the order they were created.
///
/// # Errors
/// Returns [Error::SqlError] if the query failed.
pub fn get_user_accounts(owner: UserId, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE user_id = ?1 ORDER BY id"
        ))?
        .query_map([owner], map_account_row)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Get the default account of `owner`, if they have any accounts.
///
/// # Errors
/// Returns [Error::SqlError] if the query failed.
#[cfg(test)]
pub(crate) fn get_default_account(
    owner: UserId,
    connection: &Connection,
) -> Result<Option<Account>, Error> {
    use rusqlite::OptionalExtension;

    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE user_id = ?1 AND is_default = 1"
        ))?
        .query_row([owner], map_account_row)
        .optional()
        .map_err(|error| error.into())
}

/// Add `delta_cents` to the balance of `account_id`.
///
/// The increment is applied relative to the stored value, so concurrent
/// increments commute.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist.
pub fn increment_account_balance(
    account_id: AccountId,
    delta_cents: i64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET balance_cents = balance_cents + ?1 WHERE id = ?2",
        (delta_cents, account_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Create an account for `owner`.
///
/// The first account of an owner always becomes the default account. When
/// `is_default` is requested, the owner's previous default is cleared in
/// the same transaction.
///
/// # Errors
/// Returns [Error::ValidationFailed] if the name is empty or the balance has
/// more than two decimal places.
pub fn create_account(
    owner: UserId,
    new_account: &NewAccount,
    connection: &mut Connection,
) -> Result<Account, Error> {
    let name = new_account.name.trim();

    if name.is_empty() {
        return Err(Error::ValidationFailed(
            "account name must not be empty".to_owned(),
        ));
    }

    let balance_cents = to_cents(new_account.balance)?;

    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let account_count: i64 = transaction.query_row(
        "SELECT COUNT(id) FROM account WHERE user_id = ?1",
        [owner],
        |row| row.get(0),
    )?;
    let is_default = new_account.is_default || account_count == 0;

    if is_default {
        transaction.execute(
            "UPDATE account SET is_default = 0 WHERE user_id = ?1 AND is_default = 1",
            [owner],
        )?;
    }

    transaction.execute(
        "INSERT INTO account (user_id, name, kind, balance_cents, is_default)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        (owner, name, new_account.kind, balance_cents, is_default),
    )?;
    let id = transaction.last_insert_rowid();

    transaction.commit()?;

    Ok(Account {
        id,
        user_id: owner,
        name: name.to_owned(),
        kind: new_account.kind,
        balance: from_cents(balance_cents),
        is_default,
    })
}

/// Get the account `account_id` with every one of its transactions, newest first.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to
/// another user.
pub fn get_account_with_transactions(
    owner: UserId,
    account_id: AccountId,
    connection: &Connection,
) -> Result<AccountWithTransactions, Error> {
    let snapshot = connection.unchecked_transaction()?;

    let account = get_account(owner, account_id, &snapshot)?;
    let transactions = get_account_transactions(account_id, &snapshot)?;

    snapshot.commit()?;

    Ok(AccountWithTransactions {
        account,
        transaction_count: transactions.len(),
        transactions,
    })
}


#[cfg(test)]
mod create_account_tests {
    use rust_decimal::Decimal;

    use crate::{
        Error,
        test_utils::{amount, get_test_connection, insert_user},
    };

    use super::{
        AccountKind, NewAccount, create_account, get_default_account, get_user_accounts,
    };

    fn new_account(name: &str, is_default: bool) -> NewAccount {
        NewAccount {
            name: name.to_owned(),
            kind: AccountKind::Current,
            balance: amount("100.00"),
            is_default,
        }
    }

    #[test]
    fn first_account_becomes_default() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");

        let account = create_account(owner, &new_account("Everyday", false), &mut connection)
            .unwrap();

        assert!(account.is_default);
        assert_eq!(account.balance, amount("100.00"));
        assert_eq!(account.user_id, owner);
    }

    #[test]
    fn later_accounts_are_not_default_unless_requested() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let first = create_account(owner, &new_account("Everyday", false), &mut connection)
            .unwrap();

        let second = create_account(owner, &new_account("Savings", false), &mut connection)
            .unwrap();

        assert!(!second.is_default);
        assert_eq!(
            get_default_account(owner, &connection).unwrap().map(|a| a.id),
            Some(first.id)
        );
    }

    #[test]
    fn requesting_default_clears_previous_default() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        create_account(owner, &new_account("Everyday", false), &mut connection).unwrap();

        let second =
            create_account(owner, &new_account("Savings", true), &mut connection).unwrap();

        let defaults: Vec<_> = get_user_accounts(owner, &connection)
            .unwrap()
            .into_iter()
            .filter(|account| account.is_default)
            .map(|account| account.id)
            .collect();
        assert_eq!(defaults, [second.id]);
    }

    #[test]
    fn default_of_other_owner_is_untouched() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let other = insert_user(&connection, "other");
        let others_account =
            create_account(other, &new_account("Theirs", false), &mut connection).unwrap();

        create_account(owner, &new_account("Mine", true), &mut connection).unwrap();

        assert_eq!(
            get_default_account(other, &connection).unwrap().map(|a| a.id),
            Some(others_account.id)
        );
    }

    #[test]
    fn rejects_empty_name() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");

        let result = create_account(owner, &new_account("   ", false), &mut connection);

        assert!(matches!(result, Err(Error::ValidationFailed(_))));
    }

    #[test]
    fn rejects_sub_cent_balance() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let mut account = new_account("Everyday", false);
        account.balance = Decimal::new(10_005, 3);

        let result = create_account(owner, &account, &mut connection);

        assert!(matches!(result, Err(Error::ValidationFailed(_))));
    }
}
