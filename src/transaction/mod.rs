//! Transactions and the operations that keep account balances in step with them.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `NewTransaction` builder
//! - Creating and deleting transactions together with the balance adjustment
//! - Paged and unpaged queries over an account's transactions
//! - Test data generation and category maintenance
//! - The route handlers for the transaction API

mod categories;
mod core;
mod delete;
mod endpoints;
mod query;
mod test_data;

pub use categories::{
    CategoryFixReport, CategorySuggestion, fix_transaction_categories, get_problematic_categories,
};
pub use core::{
    CreatedTransaction, NewTransaction, RecurringInterval, Transaction, TransactionKind,
    create_transaction, create_transaction_table, get_transaction,
};
pub use delete::{
    BulkDeleteOutcome, DeletedTransaction, bulk_delete_transactions, delete_transaction,
};
pub use endpoints::{
    bulk_delete_transactions_endpoint, create_test_transactions_endpoint,
    create_transaction_endpoint, delete_transaction_endpoint, fix_categories_endpoint,
    get_chart_endpoint, get_problematic_categories_endpoint, get_transactions_page_endpoint,
    query_all_transactions_endpoint,
};
pub use query::{
    PageRequest, TransactionFilter, TransactionPage, query_all_for_aggregation, query_page,
};
pub use test_data::{
    CreatedTestData, generate_test_transactions, insert_test_transactions,
    validate_test_transaction_count,
};

pub(crate) use query::get_account_transactions;
