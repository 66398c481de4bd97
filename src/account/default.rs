//! Switching the default account of a user.

use rusqlite::{Connection, TransactionBehavior};

use crate::{
    Error,
    account::{Account, get_account},
    database_id::{AccountId, UserId},
};

/// Make `account_id` the only default account of `owner`.
///
/// Clearing the previous default and setting the new one happen in a single
/// transaction, so the owner never has zero or multiple default accounts.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to
/// another user. Nothing is changed in that case.
pub fn set_default_account(
    owner: UserId,
    account_id: AccountId,
    connection: &mut Connection,
) -> Result<Account, Error> {
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    get_account(owner, account_id, &transaction)?;

    transaction.execute(
        "UPDATE account SET is_default = 0 WHERE user_id = ?1 AND is_default = 1",
        [owner],
    )?;
    transaction.execute(
        "UPDATE account SET is_default = 1 WHERE id = ?1 AND user_id = ?2",
        (account_id, owner),
    )?;

    let account = get_account(owner, account_id, &transaction)?;

    transaction.commit()?;

    Ok(account)
}
