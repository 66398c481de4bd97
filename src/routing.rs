//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    account::{
        create_account_endpoint, get_account_endpoint, get_accounts_endpoint,
        set_default_account_endpoint,
    },
    auth::auth_guard,
    endpoints,
    ledger::Ledger,
    logging::logging_middleware,
    resilience::ConnectionStatus,
    response::ApiResponse,
    transaction::{
        bulk_delete_transactions_endpoint, create_test_transactions_endpoint,
        create_transaction_endpoint, delete_transaction_endpoint, fix_categories_endpoint,
        get_chart_endpoint, get_problematic_categories_endpoint, get_transactions_page_endpoint,
        query_all_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new().route(endpoints::HEALTH, get(get_health));

    let protected_routes = Router::new()
        .route(
            endpoints::ACCOUNTS,
            get(get_accounts_endpoint).post(create_account_endpoint),
        )
        .route(endpoints::ACCOUNT, get(get_account_endpoint))
        .route(
            endpoints::DEFAULT_ACCOUNT,
            put(set_default_account_endpoint),
        )
        .route(
            endpoints::ACCOUNT_TRANSACTIONS,
            get(get_transactions_page_endpoint),
        )
        .route(
            endpoints::ALL_ACCOUNT_TRANSACTIONS,
            get(query_all_transactions_endpoint),
        )
        .route(endpoints::ACCOUNT_CHART, get(get_chart_endpoint))
        .route(
            endpoints::ACCOUNT_TEST_DATA,
            post(create_test_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_API,
            post(create_transaction_endpoint),
        )
        .route(
            endpoints::BULK_DELETE_TRANSACTIONS,
            post(bulk_delete_transactions_endpoint),
        )
        .route(endpoints::TRANSACTION, delete(delete_transaction_endpoint))
        .route(endpoints::FIX_CATEGORIES, post(fix_categories_endpoint))
        .route(
            endpoints::PROBLEMATIC_CATEGORIES,
            get(get_problematic_categories_endpoint),
        )
        .layer(middleware::from_fn_with_state(
            state.ledger.clone(),
            auth_guard,
        ));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// Report whether the server can reach the database.
///
/// Pings the database so the answer is current, and responds with 503 while
/// the database is unreachable.
async fn get_health(State(ledger): State<Ledger>) -> (StatusCode, ApiResponse<ConnectionStatus>) {
    ledger.check_connection().await;
    let status = ledger.status();

    let status_code = if status.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, ApiResponse::success(status))
}

async fn get_404_not_found() -> (StatusCode, ApiResponse<()>) {
    (
        StatusCode::NOT_FOUND,
        ApiResponse::failure("There is no API route at this path"),
    )
}
