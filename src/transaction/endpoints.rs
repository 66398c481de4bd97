//! Defines the route handlers for the transaction API.

use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::{
    AppState, Error,
    aggregation::{ChartData, DateRangePreset, aggregate_daily},
    auth::Owner,
    database_id::{AccountId, TransactionId},
    ledger::Ledger,
    pagination::{PaginationConfig, PaginationIndicator},
    response::{ApiResponse, with_timeout},
    timezone::get_local_offset,
    transaction::{
        BulkDeleteOutcome, CategoryFixReport, CategorySuggestion, CreatedTestData,
        CreatedTransaction, DeletedTransaction, NewTransaction, PageRequest, Transaction,
        TransactionFilter, TransactionKind, TransactionPage,
    },
};

/// The number of test transactions generated when the request does not say.
const DEFAULT_TEST_TRANSACTION_COUNT: u32 = 150;

/// The state needed by the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The store operations.
    pub ledger: Ledger,
    /// How long to wait for the store.
    pub operation_timeout: Duration,
    /// The config that controls how to page transactions.
    pub pagination_config: PaginationConfig,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            ledger: state.ledger.clone(),
            operation_timeout: state.operation_timeout,
            pagination_config: state.pagination_config.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The query parameters for paging an account's transactions.
///
/// Pages and page sizes below 1 fall back to the configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionsQuery {
    /// The page number, starting at 1.
    pub page: Option<i64>,
    /// The maximum number of transactions per page.
    pub limit: Option<i64>,
    /// Only transactions of this kind.
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    /// Only recurring or only one-off transactions.
    pub recurring: Option<bool>,
    /// Only transactions whose description contains this text.
    pub search: Option<String>,
}

impl TransactionsQuery {
    fn into_page_request(self, config: &PaginationConfig) -> PageRequest {
        let positive = |value: Option<i64>| value.and_then(|value| u64::try_from(value).ok());
        let (page, limit) = config.normalize(positive(self.page), positive(self.limit));

        PageRequest::new(page, limit).with_filter(TransactionFilter {
            kind: self.kind,
            is_recurring: self.recurring,
            search: self.search,
        })
    }
}

/// A page of transactions with the controls for moving between pages.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsPageResponse {
    /// The page and where it sits in the filtered set.
    #[serde(flatten)]
    pub page: TransactionPage,
    /// The page links to show.
    pub indicators: Vec<PaginationIndicator>,
    /// The page sizes a client may offer.
    pub page_size_options: Vec<u64>,
}

/// A route handler for one page of an account's transactions.
pub async fn get_transactions_page_endpoint(
    State(state): State<TransactionState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Path(account_id), _): WithRejection<Path<AccountId>, Error>,
    WithRejection(Query(query), _): WithRejection<Query<TransactionsQuery>, Error>,
) -> Result<ApiResponse<TransactionsPageResponse>, Error> {
    let request = query.into_page_request(&state.pagination_config);
    let ledger = state.ledger;

    let page = with_timeout(state.operation_timeout, async move {
        ledger.query_page(owner, account_id, request).await
    })
    .await?;

    Ok(ApiResponse::success(TransactionsPageResponse {
        indicators: page
            .page_info
            .indicators(state.pagination_config.max_pages),
        page_size_options: state.pagination_config.page_size_options,
        page,
    }))
}

/// A route handler for every transaction of an account, newest first.
pub async fn query_all_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Path(account_id), _): WithRejection<Path<AccountId>, Error>,
) -> Result<ApiResponse<Vec<Transaction>>, Error> {
    let ledger = state.ledger;

    with_timeout(state.operation_timeout, async move {
        ledger.query_all_for_aggregation(owner, account_id).await
    })
    .await
    .map(ApiResponse::success)
}

/// The query parameters for the account chart.
#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    /// The period to chart, one month if not given.
    #[serde(default)]
    pub range: DateRangePreset,
}

/// A route handler for the daily income and expense totals of an account.
pub async fn get_chart_endpoint(
    State(state): State<TransactionState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Path(account_id), _): WithRejection<Path<AccountId>, Error>,
    WithRejection(Query(query), _): WithRejection<Query<ChartQuery>, Error>,
) -> Result<ApiResponse<ChartData>, Error> {
    let ledger = state.ledger;

    let transactions = with_timeout(state.operation_timeout, async move {
        ledger.query_all_for_aggregation(owner, account_id).await
    })
    .await?;

    let local_offset = get_local_offset(&state.local_timezone).unwrap_or_else(|| {
        tracing::error!(
            "Invalid timezone {}, using UTC for the chart",
            state.local_timezone
        );
        UtcOffset::UTC
    });

    Ok(ApiResponse::success(aggregate_daily(
        &transactions,
        query.range,
        OffsetDateTime::now_utc(),
        local_offset,
    )))
}

/// A route handler for creating a transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Json(new_transaction), _): WithRejection<Json<NewTransaction>, Error>,
) -> Result<(StatusCode, ApiResponse<CreatedTransaction>), Error> {
    let ledger = state.ledger;

    let created = with_timeout(state.operation_timeout, async move {
        ledger.create_transaction(owner, new_transaction).await
    })
    .await?;

    Ok((StatusCode::CREATED, ApiResponse::success(created)))
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Path(transaction_id), _): WithRejection<Path<TransactionId>, Error>,
) -> Result<ApiResponse<DeletedTransaction>, Error> {
    let ledger = state.ledger;

    with_timeout(state.operation_timeout, async move {
        ledger.delete_transaction(owner, transaction_id).await
    })
    .await
    .map(ApiResponse::success)
}

/// The request body for deleting many transactions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    /// The transactions to delete.
    pub transaction_ids: Vec<TransactionId>,
}

/// A route handler for deleting many transactions at once.
pub async fn bulk_delete_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Json(request), _): WithRejection<Json<BulkDeleteRequest>, Error>,
) -> Result<ApiResponse<BulkDeleteOutcome>, Error> {
    let ledger = state.ledger;

    with_timeout(state.operation_timeout, async move {
        ledger
            .bulk_delete_transactions(owner, request.transaction_ids)
            .await
    })
    .await
    .map(ApiResponse::success)
}

/// The query parameters for generating test transactions.
#[derive(Debug, Deserialize)]
pub struct TestDataQuery {
    /// How many transactions to generate.
    #[serde(default = "default_test_transaction_count")]
    pub count: u32,
}

fn default_test_transaction_count() -> u32 {
    DEFAULT_TEST_TRANSACTION_COUNT
}

/// A route handler for filling an account with random transactions.
pub async fn create_test_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Path(account_id), _): WithRejection<Path<AccountId>, Error>,
    WithRejection(Query(query), _): WithRejection<Query<TestDataQuery>, Error>,
) -> Result<(StatusCode, ApiResponse<CreatedTestData>), Error> {
    let ledger = state.ledger;

    let created = with_timeout(state.operation_timeout, async move {
        ledger
            .create_test_transactions(owner, account_id, query.count)
            .await
    })
    .await?;

    Ok((StatusCode::CREATED, ApiResponse::success(created)))
}

/// A route handler for rewriting legacy category names.
pub async fn fix_categories_endpoint(
    State(state): State<TransactionState>,
    Extension(Owner(owner)): Extension<Owner>,
) -> Result<ApiResponse<CategoryFixReport>, Error> {
    let ledger = state.ledger;

    with_timeout(state.operation_timeout, async move {
        ledger.fix_transaction_categories(owner).await
    })
    .await
    .map(ApiResponse::success)
}

/// A route handler for listing categories that are not valid.
pub async fn get_problematic_categories_endpoint(
    State(state): State<TransactionState>,
    Extension(Owner(owner)): Extension<Owner>,
) -> Result<ApiResponse<Vec<CategorySuggestion>>, Error> {
    let ledger = state.ledger;

    with_timeout(state.operation_timeout, async move {
        ledger.get_problematic_categories(owner).await
    })
    .await
    .map(ApiResponse::success)
}
