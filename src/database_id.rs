//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of a user, i.e. the owner of accounts and transactions.
pub type UserId = DatabaseId;

/// The ID of a bank account.
pub type AccountId = DatabaseId;

/// The ID of a transaction.
pub type TransactionId = DatabaseId;
