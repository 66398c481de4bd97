//! Database queries for paging through and aggregating an account's transactions.

use rusqlite::{Connection, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::get_account,
    database_id::{AccountId, UserId},
    db::{CASEFOLD_FUNCTION, casefold},
    pagination::PageInfo,
    transaction::{
        Transaction, TransactionKind,
        core::{TRANSACTION_COLUMNS, map_transaction_row},
    },
};

/// Newest first. Ties are broken by ID so the order never depends on the
/// query plan.
const ORDER_CLAUSE: &str = "ORDER BY date DESC, id DESC";

/// Optional conditions that transactions must all satisfy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    /// Only transactions of this kind.
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    /// Only recurring or only one-off transactions.
    pub is_recurring: Option<bool>,
    /// Only transactions whose description contains this text, ignoring case.
    pub search: Option<String>,
}

impl TransactionFilter {
    /// The search text, if there is any after trimming whitespace.
    pub fn search_text(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
    }

    /// Whether `transaction` satisfies the filter.
    ///
    /// Agrees with the SQL predicate used by [query_page].
    pub fn matches(&self, transaction: &Transaction) -> bool {
        if self.kind.is_some_and(|kind| kind != transaction.kind) {
            return false;
        }

        if self
            .is_recurring
            .is_some_and(|is_recurring| is_recurring != transaction.is_recurring)
        {
            return false;
        }

        match self.search_text() {
            Some(search) => casefold(&transaction.description).contains(&casefold(search)),
            None => true,
        }
    }

    /// Build the `WHERE` clause and its parameters for the transactions of
    /// `account_id` owned by `owner` that satisfy the filter.
    fn where_clause(&self, owner: UserId, account_id: AccountId) -> (String, Vec<Value>) {
        let search_condition =
            format!("instr({CASEFOLD_FUNCTION}(description), {CASEFOLD_FUNCTION}(?)) > 0");
        let mut conditions = vec!["user_id = ?", "account_id = ?"];
        let mut parameters = vec![Value::Integer(owner), Value::Integer(account_id)];

        if let Some(kind) = self.kind {
            conditions.push("kind = ?");
            parameters.push(Value::Text(kind.as_str().to_owned()));
        }

        if let Some(is_recurring) = self.is_recurring {
            conditions.push("is_recurring = ?");
            parameters.push(Value::Integer(i64::from(is_recurring)));
        }

        if let Some(search) = self.search_text() {
            conditions.push(&search_condition);
            parameters.push(Value::Text(search.to_owned()));
        }

        (conditions.join(" AND "), parameters)
    }
}

/// A request for one page of an account's transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// The page number, starting at 1.
    pub page: u64,
    /// The maximum number of transactions per page.
    pub limit: u64,
    /// The conditions transactions on the page must satisfy.
    pub filter: TransactionFilter,
}

impl PageRequest {
    /// Request page `page` of size `limit` without any filter.
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            filter: TransactionFilter::default(),
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: TransactionFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// One page of transactions and where it sits in the filtered set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    /// The transactions on the page, newest first.
    pub items: Vec<Transaction>,
    /// The position of the page in the filtered set.
    pub page_info: PageInfo,
}

/// Get one page of the transactions of `account_id` that satisfy the request's filter.
///
/// Windowing is done in SQL. A `limit` at or above `unbounded_limit` returns
/// every matching transaction as page 1 of 1. The count and the rows are
/// read from the same snapshot with the same predicate. A page past the end
/// is empty rather than an error.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to
/// another user.
pub fn query_page(
    owner: UserId,
    account_id: AccountId,
    request: &PageRequest,
    unbounded_limit: u64,
    connection: &Connection,
) -> Result<TransactionPage, Error> {
    let snapshot = connection.unchecked_transaction()?;

    get_account(owner, account_id, &snapshot)?;

    let (where_clause, parameters) = request.filter.where_clause(owner, account_id);

    let total_filtered_count: i64 = snapshot.query_row(
        &format!("SELECT COUNT(id) FROM \"transaction\" WHERE {where_clause}"),
        params_from_iter(parameters.iter()),
        |row| row.get(0),
    )?;
    let total_filtered_count = u64::try_from(total_filtered_count).unwrap_or_default();

    let (page_info, window_clause, parameters) = if request.limit >= unbounded_limit {
        (
            PageInfo::unbounded(request.limit, total_filtered_count),
            String::new(),
            parameters,
        )
    } else {
        let page_info = PageInfo::new(request.page, request.limit, total_filtered_count);
        let mut parameters = parameters;
        parameters.push(Value::Integer(to_sql_integer(page_info.limit)));
        parameters.push(Value::Integer(to_sql_integer(page_info.offset())));

        (page_info, "LIMIT ? OFFSET ?".to_owned(), parameters)
    };

    let items = snapshot
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE {where_clause} \
            {ORDER_CLAUSE} {window_clause}"
        ))?
        .query_map(params_from_iter(parameters.iter()), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect::<Result<Vec<_>, _>>()?;

    snapshot.commit()?;

    Ok(TransactionPage { items, page_info })
}

fn to_sql_integer(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Get every transaction of `account_id`, newest first, for charting.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to
/// another user.
pub fn query_all_for_aggregation(
    owner: UserId,
    account_id: AccountId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let snapshot = connection.unchecked_transaction()?;

    get_account(owner, account_id, &snapshot)?;
    let transactions = get_account_transactions(account_id, &snapshot)?;

    snapshot.commit()?;

    Ok(transactions)
}

/// Get every transaction of `account_id`, newest first, without checking ownership.
pub(crate) fn get_account_transactions(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE account_id = ?1 {ORDER_CLAUSE}"
        ))?
        .query_map([account_id], map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}
