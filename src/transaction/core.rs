//! Defines the core data models and database queries for transactions.

use rusqlite::{
    Connection, Row, ToSql, TransactionBehavior,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, OffsetDateTime};

use crate::{
    Error,
    account::{Account, get_account, increment_account_balance},
    database_id::{AccountId, TransactionId, UserId},
    money::{from_cents, to_cents},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Money paid into the account.
    Income,
    /// Money paid out of the account.
    Expense,
}

impl TransactionKind {
    /// The name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "INCOME",
            TransactionKind::Expense => "EXPENSE",
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "INCOME" => Ok(TransactionKind::Income),
            "EXPENSE" => Ok(TransactionKind::Expense),
            other => Err(FromSqlError::Other(
                format!("unknown transaction kind {other}").into(),
            )),
        }
    }
}

/// How often a recurring transaction repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurringInterval {
    /// Every day.
    Daily,
    /// Every seven days.
    Weekly,
    /// On the same day each month, or the last day of shorter months.
    Monthly,
    /// On the same date each year, 28 February for 29 February in common years.
    Yearly,
}

impl RecurringInterval {
    /// The name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringInterval::Daily => "DAILY",
            RecurringInterval::Weekly => "WEEKLY",
            RecurringInterval::Monthly => "MONTHLY",
            RecurringInterval::Yearly => "YEARLY",
        }
    }

    /// The next occurrence after `date`, or `None` if it is out of the supported range.
    pub fn next_date(&self, date: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            RecurringInterval::Daily => date.checked_add(Duration::days(1)),
            RecurringInterval::Weekly => date.checked_add(Duration::weeks(1)),
            RecurringInterval::Monthly => add_months(date, 1),
            RecurringInterval::Yearly => add_months(date, 12),
        }
    }
}

/// Add calendar months, clamping the day to the end of shorter months.
fn add_months(date: OffsetDateTime, months: i32) -> Option<OffsetDateTime> {
    let month_index = date.year() * 12 + i32::from(u8::from(date.month())) - 1 + months;
    let year = month_index.div_euclid(12);
    let month = Month::try_from(u8::try_from(month_index.rem_euclid(12) + 1).ok()?).ok()?;

    let new_date = (date.day().min(28)..=date.day())
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())?;

    Some(date.replace_date(new_date))
}

impl ToSql for RecurringInterval {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RecurringInterval {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "DAILY" => Ok(RecurringInterval::Daily),
            "WEEKLY" => Ok(RecurringInterval::Weekly),
            "MONTHLY" => Ok(RecurringInterval::Monthly),
            "YEARLY" => Ok(RecurringInterval::Yearly),
            other => Err(FromSqlError::Other(
                format!("unknown recurring interval {other}").into(),
            )),
        }
    }
}

/// An expense or income recorded against an account.
///
/// The amount is stored unsigned, the sign of its effect on the account
/// balance is derived from `kind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserId,
    /// The account the transaction was recorded against.
    pub account_id: AccountId,
    /// The amount of money spent or earned, never negative.
    pub amount: Decimal,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The category of the transaction, e.g. "groceries".
    pub category: String,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// Whether the transaction repeats.
    pub is_recurring: bool,
    /// How often the transaction repeats, only set for recurring transactions.
    pub recurring_interval: Option<RecurringInterval>,
    /// When the transaction is next due, only set for recurring transactions.
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_recurring_date: Option<OffsetDateTime>,
}

impl Transaction {
    /// Start building a new transaction.
    ///
    /// Shortcut for [NewTransaction::new] for discoverability.
    pub fn build(
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        date: OffsetDateTime,
    ) -> NewTransaction {
        NewTransaction::new(account_id, kind, amount, date)
    }

    /// How creating this transaction changed the balance of its account.
    pub fn balance_effect(&self) -> Decimal {
        from_cents(signed_cents(self.kind, self.amount_cents()))
    }

    /// How deleting this transaction changes the balance of its account,
    /// the exact inverse of [Transaction::balance_effect].
    pub fn deletion_balance_change(&self) -> Decimal {
        -self.balance_effect()
    }

    pub(crate) fn amount_cents(&self) -> i64 {
        (self.amount * Decimal::ONE_HUNDRED)
            .trunc()
            .try_into()
            .unwrap_or_default()
    }
}

/// The signed balance effect of creating a transaction of `kind` worth `amount_cents`.
pub(crate) fn signed_cents(kind: TransactionKind, amount_cents: i64) -> i64 {
    match kind {
        TransactionKind::Income => amount_cents,
        TransactionKind::Expense => -amount_cents,
    }
}

/// The data for creating a transaction.
///
/// Use the builder methods to set the optional fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    /// The account to record the transaction against.
    pub account_id: AccountId,
    /// The amount of money spent or earned, must be greater than zero.
    pub amount: Decimal,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The category of the transaction.
    pub category: String,
    /// A text description of what the transaction was for.
    #[serde(default)]
    pub description: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// Whether the transaction repeats.
    #[serde(default)]
    pub is_recurring: bool,
    /// How often the transaction repeats, required for recurring transactions.
    #[serde(default)]
    pub recurring_interval: Option<RecurringInterval>,
    /// When the transaction is next due.
    ///
    /// Computed from `date` and `recurring_interval` when not given.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub next_recurring_date: Option<OffsetDateTime>,
}

impl NewTransaction {
    /// The default category for transactions created without one.
    pub const DEFAULT_CATEGORY: &'static str = "other-expense";

    /// Create a one-off transaction with an empty description.
    pub fn new(
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        date: OffsetDateTime,
    ) -> Self {
        Self {
            account_id,
            amount,
            kind,
            category: Self::DEFAULT_CATEGORY.to_owned(),
            description: String::new(),
            date,
            is_recurring: false,
            recurring_interval: None,
            next_recurring_date: None,
        }
    }

    /// Set the category.
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    /// Make the transaction repeat every `interval`.
    pub fn recurring(mut self, interval: RecurringInterval) -> Self {
        self.is_recurring = true;
        self.recurring_interval = Some(interval);
        self
    }
}

/// A transaction that passed validation, with its amount in cents and the
/// recurring schedule resolved.
#[derive(Debug)]
pub(crate) struct ValidatedTransaction<'a> {
    new: &'a NewTransaction,
    amount_cents: i64,
    date: OffsetDateTime,
    next_recurring_date: Option<OffsetDateTime>,
}

impl ValidatedTransaction<'_> {
    pub(crate) fn account_id(&self) -> AccountId {
        self.new.account_id
    }

    pub(crate) fn balance_effect_cents(&self) -> i64 {
        signed_cents(self.new.kind, self.amount_cents)
    }
}

/// Check `new` before it is written to the database.
///
/// # Errors
/// Returns [Error::ValidationFailed] if:
/// - the amount is not greater than zero or has more than two decimal places,
/// - the category is empty,
/// - a recurring transaction has no interval,
/// - a one-off transaction has an interval or next date.
pub(crate) fn validate(new: &NewTransaction) -> Result<ValidatedTransaction<'_>, Error> {
    let amount_cents = to_cents(new.amount)?;

    if amount_cents <= 0 {
        return Err(Error::ValidationFailed(format!(
            "amount must be greater than zero, got {}",
            new.amount
        )));
    }

    if new.category.trim().is_empty() {
        return Err(Error::ValidationFailed(
            "category must not be empty".to_owned(),
        ));
    }

    let date = truncate_to_seconds(new.date)?;

    let next_recurring_date = match (new.is_recurring, new.recurring_interval) {
        (true, None) => {
            return Err(Error::ValidationFailed(
                "recurring transactions need a recurring interval".to_owned(),
            ));
        }
        (true, Some(interval)) => match new.next_recurring_date {
            Some(next_date) => Some(truncate_to_seconds(next_date)?),
            None => Some(interval.next_date(date).ok_or_else(|| {
                Error::ValidationFailed(format!("no {} date follows {date}", interval.as_str()))
            })?),
        },
        (false, None) if new.next_recurring_date.is_none() => None,
        (false, _) => {
            return Err(Error::ValidationFailed(
                "only recurring transactions may have a recurring interval or next date"
                    .to_owned(),
            ));
        }
    };

    Ok(ValidatedTransaction {
        new,
        amount_cents,
        date,
        next_recurring_date,
    })
}

/// Dates are stored with second precision, in UTC.
fn truncate_to_seconds(date: OffsetDateTime) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp(date.unix_timestamp())
        .map_err(|error| Error::ValidationFailed(format!("invalid date {date}: {error}")))
}

/// A newly created transaction and its account with the updated balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTransaction {
    /// The transaction as stored.
    pub transaction: Transaction,
    /// The account after the balance was adjusted.
    pub account: Account,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, account_id, amount_cents, kind, \
    category, description, date, is_recurring, recurring_interval, next_recurring_date";

/// Create a transaction for `owner` and apply its effect to the account balance.
///
/// The insert and the balance update are committed together.
///
/// # Errors
/// This function will return a:
/// - [Error::ValidationFailed] if `new` fails validation,
/// - [Error::NotFound] if the account does not exist or belongs to another user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    owner: UserId,
    new: &NewTransaction,
    connection: &mut Connection,
) -> Result<CreatedTransaction, Error> {
    let validated = validate(new)?;

    let db_transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    get_account(owner, validated.account_id(), &db_transaction)?;
    let transaction = insert_transaction(owner, &validated, &db_transaction)?;
    increment_account_balance(
        validated.account_id(),
        validated.balance_effect_cents(),
        &db_transaction,
    )?;
    let account = get_account(owner, validated.account_id(), &db_transaction)?;

    db_transaction.commit()?;

    Ok(CreatedTransaction {
        transaction,
        account,
    })
}

/// Insert a validated transaction without touching the account balance.
///
/// Callers are responsible for adjusting the balance in the same database
/// transaction.
pub(crate) fn insert_transaction(
    owner: UserId,
    validated: &ValidatedTransaction<'_>,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let new = validated.new;

    connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (user_id, account_id, amount_cents, kind, category, \
                description, date, is_recurring, recurring_interval, next_recurring_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                owner,
                new.account_id,
                validated.amount_cents,
                new.kind,
                new.category.trim(),
                new.description.trim(),
                validated.date.unix_timestamp(),
                new.is_recurring,
                new.recurring_interval,
                validated
                    .next_recurring_date
                    .map(|date| date.unix_timestamp()),
            ),
            map_transaction_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve the transaction `id` if it belongs to `owner`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction of `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    owner: UserId,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_one((id, owner), map_transaction_row)?;

    Ok(transaction)
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
                kind TEXT NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                date INTEGER NOT NULL,
                is_recurring INTEGER NOT NULL DEFAULT 0,
                recurring_interval TEXT,
                next_recurring_date INTEGER,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Serves the per-account history and paging queries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_account_date ON \"transaction\"(account_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Transaction].
///
/// The row must contain the columns of `TRANSACTION_COLUMNS`, in order.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let account_id = row.get(2)?;
    let amount_cents = row.get(3)?;
    let kind = row.get(4)?;
    let category = row.get(5)?;
    let description = row.get(6)?;
    let date = timestamp_to_date(7, row.get(7)?)?;
    let is_recurring = row.get(8)?;
    let recurring_interval = row.get(9)?;
    let next_recurring_date = row
        .get::<_, Option<i64>>(10)?
        .map(|timestamp| timestamp_to_date(10, timestamp))
        .transpose()?;

    Ok(Transaction {
        id,
        user_id,
        account_id,
        amount: from_cents(amount_cents),
        kind,
        category,
        description,
        date,
        is_recurring,
        recurring_interval,
        next_recurring_date,
    })
}

fn timestamp_to_date(column: usize, timestamp: i64) -> Result<OffsetDateTime, rusqlite::Error> {
    OffsetDateTime::from_unix_timestamp(timestamp).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(error))
    })
}
