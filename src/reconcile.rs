//! Keeping a cached page of transactions in step with mutations without
//! querying the store again.
//!
//! A client that splices results into its cached page must also adjust the
//! filtered count by the exact number of rows it removed, otherwise the page
//! navigation drifts from the real result set. [CachedAccountView]
//! implements that bookkeeping.

use crate::{
    account::Account,
    pagination::PageInfo,
    transaction::{
        BulkDeleteOutcome, CreatedTransaction, DeletedTransaction, Transaction,
        TransactionFilter, TransactionPage,
    },
};

/// A page of an account's transactions as last seen by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAccountView {
    /// The account, with the balance as the client believes it to be.
    pub account: Account,
    /// The filter the page was queried with.
    pub filter: TransactionFilter,
    /// The transactions on the page, newest first.
    pub items: Vec<Transaction>,
    /// The position of the page in the filtered set.
    pub page_info: PageInfo,
    stale: bool,
}

impl CachedAccountView {
    /// Cache `page` of `account`'s transactions queried with `filter`.
    pub fn new(account: Account, filter: TransactionFilter, page: TransactionPage) -> Self {
        Self {
            account,
            filter,
            items: page.items,
            page_info: page.page_info,
            stale: false,
        }
    }

    /// Apply the result of deleting a single transaction.
    pub fn apply_deletion(&mut self, deleted: &DeletedTransaction) {
        if deleted.transaction.account_id != self.account.id {
            return;
        }

        self.account.balance += deleted.balance_change;
        self.remove_items(std::slice::from_ref(&deleted.transaction));
    }

    /// Apply the result of deleting a set of transactions.
    ///
    /// Only the transactions of this view's account are considered.
    pub fn apply_bulk_deletion(&mut self, outcome: &BulkDeleteOutcome) {
        if let Some(change) = outcome.balance_changes.get(&self.account.id) {
            self.account.balance += *change;
        }

        self.remove_items(&outcome.applied);
    }

    /// Apply the result of creating a transaction.
    ///
    /// New rows are spliced into the first page. Any other page has shifted
    /// by one row, so it is marked stale instead.
    pub fn apply_creation(&mut self, created: &CreatedTransaction) {
        let transaction = &created.transaction;

        if transaction.account_id != self.account.id {
            return;
        }

        self.account.balance += transaction.balance_effect();

        if !self.filter.matches(transaction) {
            return;
        }

        self.page_info = self
            .page_info
            .with_total(self.page_info.total_filtered_count + 1);

        if self.page_info.current_page != 1 {
            self.stale = true;
            return;
        }

        let position = self
            .items
            .iter()
            .position(|item| (item.date, item.id) < (transaction.date, transaction.id))
            .unwrap_or(self.items.len());
        self.items.insert(position, transaction.clone());

        if !self.page_info.unbounded {
            let limit = usize::try_from(self.page_info.limit).unwrap_or(usize::MAX);
            self.items.truncate(limit);
        }
    }

    /// Record that a mutation timed out on the client side.
    ///
    /// The store may still have applied it, so the view can no longer be
    /// trusted.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Whether the view must be queried again before it is shown.
    ///
    /// True after [CachedAccountView::mark_stale], or when every row on the
    /// page was removed while matching rows remain on other pages.
    pub fn needs_refresh(&self) -> bool {
        self.stale || (self.items.is_empty() && self.page_info.total_filtered_count > 0)
    }

    fn remove_items(&mut self, removed: &[Transaction]) {
        let removed_matching = removed
            .iter()
            .filter(|transaction| {
                transaction.account_id == self.account.id && self.filter.matches(transaction)
            })
            .count() as u64;

        self.items
            .retain(|item| !removed.iter().any(|transaction| transaction.id == item.id));

        self.page_info = self.page_info.with_total(
            self.page_info
                .total_filtered_count
                .saturating_sub(removed_matching),
        );
    }
}
