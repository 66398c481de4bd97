//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/accounts/{account_id}', use [format_endpoint].

/// The route for checking that the server can reach the database.
pub const HEALTH: &str = "/api/health";
/// The route to list and create accounts.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route to get a single account with its transactions.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";
/// The route to make an account the default account.
pub const DEFAULT_ACCOUNT: &str = "/api/accounts/{account_id}/default";
/// The route to get a page of an account's transactions.
pub const ACCOUNT_TRANSACTIONS: &str = "/api/accounts/{account_id}/transactions";
/// The route to get every transaction of an account.
pub const ALL_ACCOUNT_TRANSACTIONS: &str = "/api/accounts/{account_id}/transactions/all";
/// The route to get the daily totals of an account.
pub const ACCOUNT_CHART: &str = "/api/accounts/{account_id}/chart";
/// The route to generate test transactions for an account.
pub const ACCOUNT_TEST_DATA: &str = "/api/accounts/{account_id}/test_data";
/// The route to create transactions.
pub const TRANSACTIONS_API: &str = "/api/transactions";
/// The route to delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to delete many transactions at once.
pub const BULK_DELETE_TRANSACTIONS: &str = "/api/transactions/bulk_delete";
/// The route to rewrite legacy category names.
pub const FIX_CATEGORIES: &str = "/api/categories/fix";
/// The route to list categories that are not valid.
pub const PROBLEMATIC_CATEGORIES: &str = "/api/categories/problematic";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
