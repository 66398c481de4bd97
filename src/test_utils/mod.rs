#![allow(missing_docs)]

pub(crate) mod http;

use std::str::FromStr;

use rusqlite::Connection;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::{
    account::{Account, AccountKind, NewAccount, create_account},
    database_id::{AccountId, UserId},
    db::{configure_connection, initialize},
    transaction::{NewTransaction, Transaction, TransactionKind, create_transaction},
    user::create_user,
};

pub(crate) use http::{
    TEST_IDENTITY, assert_failure, assert_success, authorized, get_test_server,
};

#[track_caller]
pub(crate) fn amount(text: &str) -> Decimal {
    Decimal::from_str(text).expect("Could not parse decimal")
}

pub(crate) fn get_test_connection() -> Connection {
    let connection =
        Connection::open_in_memory().expect("Could not create in-memory SQLite database");
    configure_connection(&connection).expect("Could not configure connection");
    initialize(&connection).expect("Could not initialize database");
    connection
}

#[track_caller]
pub(crate) fn insert_user(connection: &Connection, external_id: &str) -> UserId {
    create_user(external_id, external_id, connection)
        .expect("Could not create user")
        .id
}

#[track_caller]
pub(crate) fn insert_account(
    connection: &mut Connection,
    owner: UserId,
    name: &str,
    balance: Decimal,
) -> Account {
    create_account(
        owner,
        &NewAccount {
            name: name.to_owned(),
            kind: AccountKind::Current,
            balance,
            is_default: false,
        },
        connection,
    )
    .expect("Could not create account")
}

#[track_caller]
pub(crate) fn insert_transaction(
    connection: &mut Connection,
    owner: UserId,
    account_id: AccountId,
    kind: TransactionKind,
    amount: Decimal,
    date: OffsetDateTime,
) -> Transaction {
    insert_new_transaction(
        connection,
        owner,
        &Transaction::build(account_id, kind, amount, date),
    )
}

#[track_caller]
pub(crate) fn insert_new_transaction(
    connection: &mut Connection,
    owner: UserId,
    new: &NewTransaction,
) -> Transaction {
    create_transaction(owner, new, connection)
        .expect("Could not create transaction")
        .transaction
}
