//! Deleting transactions together with the inverse balance adjustment.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    Error,
    account::{Account, get_account, increment_account_balance},
    database_id::{AccountId, TransactionId, UserId},
    money::from_cents,
    transaction::{Transaction, core::signed_cents, get_transaction},
};

/// The result of deleting a single transaction.
///
/// Carries everything a client needs to update a cached list and balance
/// without querying again.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedTransaction {
    /// The transaction as it was before it was deleted.
    pub transaction: Transaction,
    /// The account after the balance was adjusted.
    pub account: Account,
    /// The amount that was added to the account balance.
    pub balance_change: Decimal,
}

/// The result of deleting a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteOutcome {
    /// The number of rows that were deleted.
    pub deleted_count: usize,
    /// The transactions that were deleted.
    pub applied: Vec<Transaction>,
    /// The requested IDs that do not exist or belong to another user.
    pub skipped: Vec<TransactionId>,
    /// The amount added to the balance of each affected account.
    pub balance_changes: BTreeMap<AccountId, Decimal>,
    /// The affected accounts after their balances were adjusted.
    pub accounts: Vec<Account>,
}

/// Delete the transaction `id` of `owner` and undo its effect on the account balance.
///
/// Deleting an expense adds its amount back to the balance, deleting an
/// income subtracts it. The delete and the balance update are committed
/// together.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist or belongs to
/// another user.
pub fn delete_transaction(
    owner: UserId,
    id: TransactionId,
    connection: &mut Connection,
) -> Result<DeletedTransaction, Error> {
    let db_transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let transaction = get_transaction(owner, id, &db_transaction)?;
    let change_cents = -signed_cents(transaction.kind, transaction.amount_cents());

    db_transaction.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, owner),
    )?;
    increment_account_balance(transaction.account_id, change_cents, &db_transaction)?;
    let account = get_account(owner, transaction.account_id, &db_transaction)?;

    db_transaction.commit()?;

    tracing::debug!(
        "Deleted transaction {id} of account {}, balance changed by {}",
        account.id,
        from_cents(change_cents)
    );

    Ok(DeletedTransaction {
        transaction,
        account,
        balance_change: from_cents(change_cents),
    })
}

/// Delete every transaction in `ids` that belongs to `owner`.
///
/// IDs that do not exist or belong to another user are skipped rather than
/// treated as errors. Duplicate IDs are counted once. The balance changes are
/// summed per account and applied in the same database transaction as the
/// deletes, so no partial state is ever visible.
///
/// # Errors
/// Returns [Error::ValidationFailed] if the summed change for an account does
/// not fit in an `i64` number of cents, or an error if the database fails. In
/// both cases nothing is deleted.
pub fn bulk_delete_transactions(
    owner: UserId,
    ids: &[TransactionId],
    connection: &mut Connection,
) -> Result<BulkDeleteOutcome, Error> {
    let requested_ids: BTreeSet<TransactionId> = ids.iter().copied().collect();

    let db_transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for id in requested_ids {
        match get_transaction(owner, id, &db_transaction) {
            Ok(transaction) => applied.push(transaction),
            Err(Error::NotFound) => skipped.push(id),
            Err(error) => return Err(error),
        }
    }

    let mut change_cents_by_account: BTreeMap<AccountId, i64> = BTreeMap::new();
    let mut deleted_count = 0;

    {
        let mut delete_statement = db_transaction
            .prepare("DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2")?;

        for transaction in &applied {
            deleted_count += delete_statement.execute((transaction.id, owner))?;
            let change_cents = change_cents_by_account
                .entry(transaction.account_id)
                .or_default();
            *change_cents = change_cents
                .checked_sub(signed_cents(transaction.kind, transaction.amount_cents()))
                .ok_or_else(|| {
                    Error::ValidationFailed(format!(
                        "the balance change for account {} is out of range",
                        transaction.account_id
                    ))
                })?;
        }
    }

    let mut accounts = Vec::with_capacity(change_cents_by_account.len());

    for (&account_id, &change_cents) in &change_cents_by_account {
        increment_account_balance(account_id, change_cents, &db_transaction)?;
        accounts.push(get_account(owner, account_id, &db_transaction)?);
    }

    db_transaction.commit()?;

    tracing::debug!(
        "Bulk deleted {deleted_count} transactions across {} accounts, skipped {}",
        accounts.len(),
        skipped.len()
    );

    Ok(BulkDeleteOutcome {
        deleted_count,
        applied,
        skipped,
        balance_changes: change_cents_by_account
            .into_iter()
            .map(|(account_id, cents)| (account_id, from_cents(cents)))
            .collect(),
        accounts,
    })
}


#[cfg(test)]
mod bulk_delete_tests {
    use std::collections::BTreeMap;

    use time::macros::datetime;

    use crate::{
        Error, TransactionKind,
        account::get_account,
        test_utils::{amount, get_test_connection, insert_account, insert_transaction, insert_user},
        transaction::get_transaction,
    };

    use super::{bulk_delete_transactions, delete_transaction_tests::LOCK_BALANCES};

    #[test]
    fn deletes_only_owned_existing_transactions() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let other = insert_user(&connection, "other");
        let mine = insert_account(&mut connection, owner, "Mine", amount("100.00"));
        let theirs = insert_account(&mut connection, other, "Theirs", amount("100.00"));
        let my_expense = insert_transaction(
            &mut connection,
            owner,
            mine.id,
            TransactionKind::Expense,
            amount("30.00"),
            datetime!(2025-06-01 12:00 UTC),
        );
        let their_expense = insert_transaction(
            &mut connection,
            other,
            theirs.id,
            TransactionKind::Expense,
            amount("40.00"),
            datetime!(2025-06-01 12:00 UTC),
        );
        let missing_id = 9_999;

        let outcome = bulk_delete_transactions(
            owner,
            &[my_expense.id, missing_id, their_expense.id],
            &mut connection,
        )
        .unwrap();

        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(outcome.applied, [my_expense.clone()]);
        assert_eq!(outcome.skipped, [their_expense.id, missing_id]);
        assert_eq!(
            outcome.balance_changes,
            BTreeMap::from([(mine.id, amount("30.00"))])
        );
        assert_eq!(
            get_account(owner, mine.id, &connection).unwrap().balance,
            amount("100.00")
        );
        assert_eq!(
            get_account(other, theirs.id, &connection).unwrap().balance,
            amount("60.00")
        );
    }

    #[test]
    fn sums_changes_per_account() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let everyday = insert_account(&mut connection, owner, "Everyday", amount("0.00"));
        let savings = insert_account(&mut connection, owner, "Savings", amount("0.00"));
        let date = datetime!(2025-06-01 12:00 UTC);
        let ids: Vec<_> = [
            (everyday.id, TransactionKind::Expense, "20.00"),
            (everyday.id, TransactionKind::Income, "5.50"),
            (savings.id, TransactionKind::Income, "100.00"),
        ]
        .into_iter()
        .map(|(account_id, kind, value)| {
            insert_transaction(&mut connection, owner, account_id, kind, amount(value), date).id
        })
        .collect();

        let outcome = bulk_delete_transactions(owner, &ids, &mut connection).unwrap();

        assert_eq!(outcome.deleted_count, 3);
        assert_eq!(
            outcome.balance_changes,
            BTreeMap::from([
                (everyday.id, amount("14.50")),
                (savings.id, amount("-100.00"))
            ])
        );
        let balances: Vec<_> = outcome
            .accounts
            .iter()
            .map(|account| (account.id, account.balance))
            .collect();
        assert_eq!(
            balances,
            [(everyday.id, amount("0.00")), (savings.id, amount("0.00"))]
        );
    }

    #[test]
    fn duplicate_ids_are_deleted_once() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let account = insert_account(&mut connection, owner, "Everyday", amount("10.00"));
        let expense = insert_transaction(
            &mut connection,
            owner,
            account.id,
            TransactionKind::Expense,
            amount("10.00"),
            datetime!(2025-06-01 12:00 UTC),
        );

        let outcome =
            bulk_delete_transactions(owner, &[expense.id, expense.id], &mut connection).unwrap();

        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(
            get_account(owner, account.id, &connection).unwrap().balance,
            amount("10.00")
        );
    }

    #[test]
    fn empty_request_changes_nothing() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");

        let outcome = bulk_delete_transactions(owner, &[], &mut connection).unwrap();

        assert_eq!(outcome.deleted_count, 0);
        assert!(outcome.applied.is_empty());
        assert!(outcome.skipped.is_empty());
        assert!(outcome.accounts.is_empty());
    }

    #[test]
    fn failed_balance_update_keeps_every_transaction() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let account = insert_account(&mut connection, owner, "Everyday", amount("100.00"));
        let date = datetime!(2025-06-01 12:00 UTC);
        let expense = insert_transaction(
            &mut connection,
            owner,
            account.id,
            TransactionKind::Expense,
            amount("30.00"),
            date,
        );
        let income = insert_transaction(
            &mut connection,
            owner,
            account.id,
            TransactionKind::Income,
            amount("5.00"),
            date,
        );
        connection
            .execute_batch(LOCK_BALANCES)
            .expect("Could not create trigger");

        let result = bulk_delete_transactions(owner, &[expense.id, income.id], &mut connection);

        assert!(result.is_err());
        assert_eq!(get_transaction(owner, expense.id, &connection), Ok(expense));
        assert_eq!(get_transaction(owner, income.id, &connection), Ok(income));
        assert_eq!(
            get_account(owner, account.id, &connection).unwrap().balance,
            amount("75.00")
        );
    }

    #[test]
    fn balance_change_out_of_range_deletes_nothing() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let account = insert_account(&mut connection, owner, "Everyday", amount("0.00"));
        let date = datetime!(2025-06-01 12:00 UTC);
        let expenses: Vec<_> = (0..2)
            .map(|_| {
                insert_transaction(
                    &mut connection,
                    owner,
                    account.id,
                    TransactionKind::Expense,
                    amount("46116860184273879.04"),
                    date,
                )
            })
            .collect();
        let balance_before = get_account(owner, account.id, &connection).unwrap().balance;
        assert_eq!(balance_before, crate::money::from_cents(i64::MIN));

        let ids: Vec<_> = expenses.iter().map(|expense| expense.id).collect();
        let result = bulk_delete_transactions(owner, &ids, &mut connection);

        assert!(matches!(result, Err(Error::ValidationFailed(_))));
        for expense in expenses {
            assert_eq!(get_transaction(owner, expense.id, &connection), Ok(expense));
        }
        assert_eq!(
            get_account(owner, account.id, &connection).unwrap().balance,
            balance_before
        );
    }
}
