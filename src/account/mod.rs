//! Bank accounts: creating them, reading them and choosing the default one.

mod core;
mod default;
mod endpoints;

pub use core::{
    Account, AccountKind, AccountWithTransactions, NewAccount, create_account,
    create_account_table, get_account, get_account_with_transactions,
    get_user_accounts, increment_account_balance,
};
pub use default::set_default_account;
pub use endpoints::{
    create_account_endpoint, get_account_endpoint, get_accounts_endpoint,
    set_default_account_endpoint,
};
