//! Generates realistic-looking transactions for trying out the charts and paging.

use rand::{Rng, seq::SliceRandom};
use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    account::{Account, get_account, increment_account_balance},
    database_id::{AccountId, UserId},
    money::from_cents,
    transaction::{
        NewTransaction, Transaction, TransactionKind,
        core::{insert_transaction, validate},
    },
};

/// The number of most recent days that get at least one transaction.
pub const GUARANTEED_DAYS: u32 = 30;

/// The number of most recent days the remaining transactions are spread over.
pub const SPREAD_DAYS: i64 = 60;

/// The most transactions that can be generated in one request.
pub const MAX_TEST_TRANSACTIONS: u32 = 5_000;

/// The categories assigned to generated transactions.
pub const TEST_CATEGORIES: [&str; 12] = [
    "food",
    "transportation",
    "shopping",
    "entertainment",
    "utilities",
    "healthcare",
    "education",
    "travel",
    "investments",
    "salary",
    "freelance",
    "business",
];

const TEST_DESCRIPTIONS: [&str; 20] = [
    "Grocery shopping",
    "Gas station",
    "Restaurant dinner",
    "Online purchase",
    "Monthly subscription",
    "Utility bill",
    "Medical checkup",
    "Movie tickets",
    "Book purchase",
    "Coffee shop",
    "Taxi ride",
    "Salary deposit",
    "Freelance payment",
    "Investment return",
    "Business expense",
    "Internet bill",
    "Phone bill",
    "Rent payment",
    "Insurance premium",
    "Gym membership",
];

/// The outcome of inserting generated transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTestData {
    /// The number of transactions inserted.
    pub count: usize,
    /// The net amount added to the account balance.
    pub balance_change: Decimal,
    /// The account after the balance was adjusted.
    pub account: Account,
}

/// Generate `count` random transactions for `account_id`.
///
/// The first transactions fall on each of the last [GUARANTEED_DAYS] days
/// so every day of the recent chart has data, the rest are spread over the
/// last [SPREAD_DAYS] days. About 70% are expenses of $10 to $509, the rest
/// income of $100 to $2,099.
pub fn generate_test_transactions<R: Rng + ?Sized>(
    account_id: AccountId,
    count: u32,
    now: OffsetDateTime,
    rng: &mut R,
) -> Vec<NewTransaction> {
    let guaranteed = count.min(GUARANTEED_DAYS);

    (0..count)
        .map(|i| {
            let days_back = if i < guaranteed {
                i64::from(i)
            } else {
                rng.gen_range(0..SPREAD_DAYS)
            };

            generate_transaction(account_id, i + 1, now - Duration::days(days_back), rng)
        })
        .collect()
}

fn generate_transaction<R: Rng + ?Sized>(
    account_id: AccountId,
    sequence_number: u32,
    date: OffsetDateTime,
    rng: &mut R,
) -> NewTransaction {
    let (kind, dollars) = if rng.gen_bool(0.7) {
        (TransactionKind::Expense, rng.gen_range(10..510))
    } else {
        (TransactionKind::Income, rng.gen_range(100..2100))
    };
    let category = TEST_CATEGORIES.choose(rng).copied().unwrap_or("food");
    let description = TEST_DESCRIPTIONS
        .choose(rng)
        .copied()
        .unwrap_or("Test transaction");

    Transaction::build(account_id, kind, Decimal::from(dollars), date)
        .category(category)
        .description(&format!("{description} #{sequence_number}"))
}

/// Insert generated transactions into the account `account_id` of `owner`.
///
/// The account balance is adjusted by the net amount in the same database
/// transaction, so the balance stays consistent with the transactions.
///
/// # Errors
/// Returns a:
/// - [Error::NotFound] if the account does not exist or belongs to another user,
/// - [Error::ValidationFailed] if a transaction is invalid or does not belong to `account_id`.
pub fn insert_test_transactions(
    owner: UserId,
    account_id: AccountId,
    transactions: &[NewTransaction],
    connection: &mut Connection,
) -> Result<CreatedTestData, Error> {
    let validated = transactions
        .iter()
        .map(validate)
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(stray) = validated
        .iter()
        .find(|transaction| transaction.account_id() != account_id)
    {
        return Err(Error::ValidationFailed(format!(
            "test transaction for account {} cannot be added to account {account_id}",
            stray.account_id()
        )));
    }

    let db_transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    get_account(owner, account_id, &db_transaction)?;

    let mut net_cents = 0;
    for transaction in &validated {
        insert_transaction(owner, transaction, &db_transaction)?;
        net_cents += transaction.balance_effect_cents();
    }

    increment_account_balance(account_id, net_cents, &db_transaction)?;
    let account = get_account(owner, account_id, &db_transaction)?;

    db_transaction.commit()?;

    tracing::info!(
        "Created {} test transactions for account {account_id}",
        validated.len()
    );

    Ok(CreatedTestData {
        count: validated.len(),
        balance_change: from_cents(net_cents),
        account,
    })
}

/// Check the number of requested test transactions.
///
/// # Errors
/// Returns [Error::ValidationFailed] if `count` is zero or above [MAX_TEST_TRANSACTIONS].
pub fn validate_test_transaction_count(count: u32) -> Result<u32, Error> {
    if count == 0 || count > MAX_TEST_TRANSACTIONS {
        return Err(Error::ValidationFailed(format!(
            "the number of test transactions must be between 1 and {MAX_TEST_TRANSACTIONS}, got {count}"
        )));
    }

    Ok(count)
}
