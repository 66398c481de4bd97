//! The entry point for every store operation.
//!
//! [Ledger] runs each operation on a pooled connection, retries it on
//! transient failures through the [ConnectionMonitor], and announces
//! mutations so cached views can be invalidated.

use rusqlite::Connection;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::broadcast;

use crate::{
    Error,
    account::{self, Account, AccountWithTransactions, NewAccount},
    database_id::{AccountId, TransactionId, UserId},
    pagination::PaginationConfig,
    pool::ConnectionPool,
    resilience::{ConnectionMonitor, ConnectionStatus},
    transaction::{
        self, BulkDeleteOutcome, CategoryFixReport, CategorySuggestion, CreatedTestData,
        CreatedTransaction, DeletedTransaction, NewTransaction, PageRequest, Transaction,
        TransactionPage, generate_test_transactions, validate_test_transaction_count,
    },
    user::{self, User},
};

/// How many unread events a slow subscriber may fall behind by.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A notification that data shown to a user has changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LedgerEvent {
    /// The accounts or balances on the user's dashboard changed.
    DashboardInvalidated {
        /// The user whose dashboard changed.
        owner: UserId,
    },
    /// The transactions or balance of an account changed.
    AccountInvalidated {
        /// The user that owns the account.
        owner: UserId,
        /// The account that changed.
        account_id: AccountId,
    },
}

/// The store operations of the application.
///
/// Cloning is cheap, clones share the pool, the connectivity status and the
/// event channel.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: ConnectionPool,
    monitor: ConnectionMonitor,
    pagination: PaginationConfig,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    /// Create a ledger that uses the default pagination settings.
    pub fn new(pool: ConnectionPool, monitor: ConnectionMonitor) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            pool,
            monitor,
            pagination: PaginationConfig::default(),
            events,
        }
    }

    /// Use `pagination` for paged queries.
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// The connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// The resilience wrapper and connectivity status.
    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    /// The pagination settings.
    pub fn pagination(&self) -> &PaginationConfig {
        &self.pagination
    }

    /// A snapshot of the connectivity status.
    pub fn status(&self) -> ConnectionStatus {
        self.monitor.status()
    }

    /// Receive the events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Ping the database, updating the connectivity status.
    pub async fn check_connection(&self) -> bool {
        self.monitor.check_connection(&self.pool).await
    }

    /// Run `operation` on a pooled connection, retrying transient failures.
    async fn run<F, T>(&self, operation: F) -> Result<T, Error>
    where
        F: Fn(&mut Connection) -> Result<T, Error> + Clone + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();

        self.monitor
            .retry_operation(move || {
                let pool = pool.clone();
                let operation = operation.clone();

                async move { pool.interact(operation).await }
            })
            .await
    }

    fn emit(&self, event: LedgerEvent) {
        tracing::debug!("Emitting {event:?}");
        // Sending only fails when nobody is subscribed.
        let _ = self.events.send(event);
    }

    fn emit_account_changed(&self, owner: UserId, account_id: AccountId) {
        self.emit(LedgerEvent::AccountInvalidated { owner, account_id });
        self.emit(LedgerEvent::DashboardInvalidated { owner });
    }

    /// Map the caller identity of a request to a user ID.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if there is no identity or it is unknown.
    pub async fn resolve_owner(&self, identity: Option<String>) -> Result<UserId, Error> {
        self.run(move |connection| user::resolve_owner(identity.as_deref(), connection))
            .await
    }

    /// Register a user for the auth provider identity `external_id`.
    ///
    /// # Errors
    /// Returns [Error::ValidationFailed] if the identity is empty or taken.
    pub async fn create_user(&self, external_id: &str, name: &str) -> Result<User, Error> {
        let external_id = external_id.to_owned();
        let name = name.to_owned();

        self.run(move |connection| user::create_user(&external_id, &name, connection))
            .await
    }

    /// Create an account for `owner`.
    ///
    /// # Errors
    /// See [account::create_account].
    pub async fn create_account(
        &self,
        owner: UserId,
        new_account: NewAccount,
    ) -> Result<Account, Error> {
        let account = self
            .run(move |connection| account::create_account(owner, &new_account, connection))
            .await?;

        self.emit(LedgerEvent::DashboardInvalidated { owner });

        Ok(account)
    }

    /// Get the accounts of `owner`, in the order they were created.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn get_user_accounts(&self, owner: UserId) -> Result<Vec<Account>, Error> {
        self.run(move |connection| account::get_user_accounts(owner, connection))
            .await
    }

    /// Get an account with its full transaction history.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the account does not exist or belongs to another user.
    pub async fn get_account_with_transactions(
        &self,
        owner: UserId,
        account_id: AccountId,
    ) -> Result<AccountWithTransactions, Error> {
        self.run(move |connection| {
            account::get_account_with_transactions(owner, account_id, connection)
        })
        .await
    }

    /// Make `account_id` the only default account of `owner`.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the account does not exist or belongs to another user.
    pub async fn set_default_account(
        &self,
        owner: UserId,
        account_id: AccountId,
    ) -> Result<Account, Error> {
        let account = self
            .run(move |connection| account::set_default_account(owner, account_id, connection))
            .await?;

        self.emit(LedgerEvent::DashboardInvalidated { owner });

        Ok(account)
    }

    /// Create a transaction and apply it to the account balance.
    ///
    /// # Errors
    /// See [transaction::create_transaction].
    pub async fn create_transaction(
        &self,
        owner: UserId,
        new_transaction: NewTransaction,
    ) -> Result<CreatedTransaction, Error> {
        let created = self
            .run(move |connection| {
                transaction::create_transaction(owner, &new_transaction, connection)
            })
            .await?;

        self.emit_account_changed(owner, created.account.id);

        Ok(created)
    }

    /// Delete a transaction and undo its effect on the account balance.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the transaction does not exist or belongs to another user.
    pub async fn delete_transaction(
        &self,
        owner: UserId,
        transaction_id: TransactionId,
    ) -> Result<DeletedTransaction, Error> {
        let deleted = self
            .run(move |connection| {
                transaction::delete_transaction(owner, transaction_id, connection)
            })
            .await?;

        self.emit_account_changed(owner, deleted.account.id);

        Ok(deleted)
    }

    /// Delete the transactions in `transaction_ids` that belong to `owner`.
    ///
    /// # Errors
    /// Returns an error if the store fails, in which case nothing is deleted.
    pub async fn bulk_delete_transactions(
        &self,
        owner: UserId,
        transaction_ids: Vec<TransactionId>,
    ) -> Result<BulkDeleteOutcome, Error> {
        let outcome = self
            .run(move |connection| {
                transaction::bulk_delete_transactions(owner, &transaction_ids, connection)
            })
            .await?;

        for account in &outcome.accounts {
            self.emit(LedgerEvent::AccountInvalidated {
                owner,
                account_id: account.id,
            });
        }

        if outcome.deleted_count > 0 {
            self.emit(LedgerEvent::DashboardInvalidated { owner });
        }

        Ok(outcome)
    }

    /// Get one page of an account's transactions.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the account does not exist or belongs to another user.
    pub async fn query_page(
        &self,
        owner: UserId,
        account_id: AccountId,
        request: PageRequest,
    ) -> Result<TransactionPage, Error> {
        let unbounded_limit = self.pagination.unbounded_limit;

        self.run(move |connection| {
            transaction::query_page(owner, account_id, &request, unbounded_limit, connection)
        })
        .await
    }

    /// Get every transaction of an account, newest first.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the account does not exist or belongs to another user.
    pub async fn query_all_for_aggregation(
        &self,
        owner: UserId,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, Error> {
        self.run(move |connection| {
            transaction::query_all_for_aggregation(owner, account_id, connection)
        })
        .await
    }

    /// Generate `count` random transactions for an account.
    ///
    /// The transactions are generated once, so a retried attempt inserts the
    /// same data.
    ///
    /// # Errors
    /// Returns a:
    /// - [Error::ValidationFailed] if `count` is out of range,
    /// - [Error::NotFound] if the account does not exist or belongs to another user.
    pub async fn create_test_transactions(
        &self,
        owner: UserId,
        account_id: AccountId,
        count: u32,
    ) -> Result<CreatedTestData, Error> {
        let count = validate_test_transaction_count(count)?;
        let transactions = generate_test_transactions(
            account_id,
            count,
            OffsetDateTime::now_utc(),
            &mut rand::thread_rng(),
        );

        let created = self
            .run(move |connection| {
                transaction::insert_test_transactions(owner, account_id, &transactions, connection)
            })
            .await?;

        self.emit_account_changed(owner, account_id);

        Ok(created)
    }

    /// Rewrite legacy category names of `owner`'s transactions.
    ///
    /// # Errors
    /// Returns an error if the store fails, in which case nothing is changed.
    pub async fn fix_transaction_categories(
        &self,
        owner: UserId,
    ) -> Result<CategoryFixReport, Error> {
        let report = self
            .run(move |connection| transaction::fix_transaction_categories(owner, connection))
            .await?;

        if report.fixed_transactions > 0 {
            self.emit(LedgerEvent::DashboardInvalidated { owner });
        }

        Ok(report)
    }

    /// List the invalid categories of `owner`'s transactions.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn get_problematic_categories(
        &self,
        owner: UserId,
    ) -> Result<Vec<CategorySuggestion>, Error> {
        self.run(move |connection| transaction::get_problematic_categories(owner, connection))
            .await
    }
}
