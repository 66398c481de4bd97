//! Defines the endpoints for reading accounts, creating them and choosing the default one.

use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;

use crate::{
    AppState, Error,
    account::{Account, AccountWithTransactions, NewAccount},
    auth::Owner,
    database_id::AccountId,
    ledger::Ledger,
    response::{ApiResponse, with_timeout},
};

/// The state needed by the account endpoints.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The store operations.
    pub ledger: Ledger,
    /// How long to wait for the store.
    pub operation_timeout: Duration,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            ledger: state.ledger.clone(),
            operation_timeout: state.operation_timeout,
        }
    }
}

/// A route handler for listing the caller's accounts.
pub async fn get_accounts_endpoint(
    State(state): State<AccountState>,
    Extension(Owner(owner)): Extension<Owner>,
) -> Result<ApiResponse<Vec<Account>>, Error> {
    let ledger = state.ledger;

    with_timeout(state.operation_timeout, async move {
        ledger.get_user_accounts(owner).await
    })
    .await
    .map(ApiResponse::success)
}

/// A route handler for creating an account.
pub async fn create_account_endpoint(
    State(state): State<AccountState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Json(new_account), _): WithRejection<Json<NewAccount>, Error>,
) -> Result<(StatusCode, ApiResponse<Account>), Error> {
    let ledger = state.ledger;

    let account = with_timeout(state.operation_timeout, async move {
        ledger.create_account(owner, new_account).await
    })
    .await?;

    Ok((StatusCode::CREATED, ApiResponse::success(account)))
}

/// A route handler for an account with its transactions and their count.
pub async fn get_account_endpoint(
    State(state): State<AccountState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Path(account_id), _): WithRejection<Path<AccountId>, Error>,
) -> Result<ApiResponse<AccountWithTransactions>, Error> {
    let ledger = state.ledger;

    with_timeout(state.operation_timeout, async move {
        ledger.get_account_with_transactions(owner, account_id).await
    })
    .await
    .map(ApiResponse::success)
}

/// A route handler for making an account the caller's default account.
pub async fn set_default_account_endpoint(
    State(state): State<AccountState>,
    Extension(Owner(owner)): Extension<Owner>,
    WithRejection(Path(account_id), _): WithRejection<Path<AccountId>, Error>,
) -> Result<ApiResponse<Account>, Error> {
    let ledger = state.ledger;

    with_timeout(state.operation_timeout, async move {
        ledger.set_default_account(owner, account_id).await
    })
    .await
    .map(ApiResponse::success)
}
