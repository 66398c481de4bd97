//! Maintenance of transaction categories.
//!
//! Older versions stored display names such as "Food & Dining" as the
//! category. Categories are now stored as short identifiers.

use std::collections::BTreeMap;

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::{Error, database_id::UserId};

/// The category identifiers the application understands.
pub const VALID_CATEGORIES: [&str; 21] = [
    "salary",
    "freelance",
    "investments",
    "business",
    "rental",
    "other-income",
    "housing",
    "transportation",
    "groceries",
    "utilities",
    "entertainment",
    "food",
    "shopping",
    "healthcare",
    "education",
    "personal",
    "travel",
    "insurance",
    "gifts",
    "bills",
    "other-expense",
];

/// The replacement for categories that have no known mapping.
pub const FALLBACK_CATEGORY: &str = "other-expense";

/// Map a legacy category name to its identifier.
pub fn legacy_category_mapping(category: &str) -> Option<&'static str> {
    let mapped = match category {
        "Food & Dining" => "food",
        "Transportation" => "transportation",
        "Shopping" => "shopping",
        "Entertainment" => "entertainment",
        "Bills & Utilities" => "utilities",
        "Healthcare" => "healthcare",
        "Education" => "education",
        "Travel" => "travel",
        "Investment" => "investments",
        "Salary" => "salary",
        "Freelance" => "freelance",
        "Business" => "business",
        "Grocery shopping" => "groceries",
        "Gas station" => "transportation",
        "Restaurant dinner" => "food",
        "Online purchase" => "shopping",
        "Monthly subscription" => "utilities",
        "Utility bill" => "utilities",
        "Medical checkup" => "healthcare",
        "Movie tickets" => "entertainment",
        "Book purchase" => "education",
        "Coffee shop" => "food",
        "Taxi ride" => "transportation",
        "Salary deposit" => "salary",
        "Freelance payment" => "freelance",
        "Investment return" => "investments",
        "Business expense" => "business",
        "Internet bill" => "utilities",
        "Phone bill" => "utilities",
        "Rent payment" => "housing",
        "Insurance premium" => "insurance",
        "Gym membership" => "personal",
        _ => return None,
    };

    Some(mapped)
}

/// The outcome of [fix_transaction_categories].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFixReport {
    /// The number of transactions the user has.
    pub total_transactions: usize,
    /// The number of transactions whose category was rewritten.
    pub fixed_transactions: usize,
}

/// A category that is not a valid identifier and what it should be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySuggestion {
    /// The category as stored.
    pub current: String,
    /// The suggested identifier.
    pub suggested: String,
}

/// Rewrite every legacy category name of `owner`'s transactions to its identifier.
///
/// All rewrites are committed together.
///
/// # Errors
/// Returns an error if the database fails, in which case nothing is changed.
pub fn fix_transaction_categories(
    owner: UserId,
    connection: &mut Connection,
) -> Result<CategoryFixReport, Error> {
    let db_transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let category_counts = count_categories(owner, &db_transaction)?;
    let total_transactions = category_counts.values().sum();
    let mut fixed_transactions = 0;

    for (category, count) in &category_counts {
        let Some(replacement) = legacy_category_mapping(category) else {
            continue;
        };

        if replacement == category {
            continue;
        }

        db_transaction.execute(
            "UPDATE \"transaction\" SET category = ?1 WHERE user_id = ?2 AND category = ?3",
            (replacement, owner, category),
        )?;
        fixed_transactions += count;
    }

    db_transaction.commit()?;

    tracing::info!("Fixed {fixed_transactions} of {total_transactions} transaction categories");

    Ok(CategoryFixReport {
        total_transactions,
        fixed_transactions,
    })
}

/// List the distinct categories of `owner`'s transactions that are not
/// valid identifiers, with a suggested replacement for each.
///
/// # Errors
/// Returns [Error::SqlError] if the query failed.
pub fn get_problematic_categories(
    owner: UserId,
    connection: &Connection,
) -> Result<Vec<CategorySuggestion>, Error> {
    let suggestions = count_categories(owner, connection)?
        .into_keys()
        .filter(|category| !VALID_CATEGORIES.contains(&category.as_str()))
        .map(|category| CategorySuggestion {
            suggested: legacy_category_mapping(&category)
                .unwrap_or(FALLBACK_CATEGORY)
                .to_owned(),
            current: category,
        })
        .collect();

    Ok(suggestions)
}

fn count_categories(
    owner: UserId,
    connection: &Connection,
) -> Result<BTreeMap<String, usize>, Error> {
    connection
        .prepare(
            "SELECT category, COUNT(id) FROM \"transaction\" WHERE user_id = ?1 GROUP BY category",
        )?
        .query_map([owner], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .map(|result| {
            let (category, count) = result?;
            let count = usize::try_from(count).map_err(|error| {
                Error::Internal(format!("invalid count {count} for category {category}: {error}"))
            })?;
            Ok((category, count))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{
        Transaction, TransactionKind,
        test_utils::{amount, get_test_connection, insert_account, insert_new_transaction, insert_user},
        transaction::get_account_transactions,
    };

    use super::{
        CategoryFixReport, CategorySuggestion, fix_transaction_categories,
        get_problematic_categories,
    };

    fn insert_with_category(
        connection: &mut rusqlite::Connection,
        owner: i64,
        account_id: i64,
        category: &str,
    ) {
        let new = Transaction::build(
            account_id,
            TransactionKind::Expense,
            amount("1.00"),
            datetime!(2025-01-01 09:00 UTC),
        )
        .category(category);

        insert_new_transaction(connection, owner, &new);
    }

    #[test]
    fn rewrites_legacy_names() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let account = insert_account(&mut connection, owner, "Everyday", amount("0.00"));
        for category in ["Food & Dining", "Food & Dining", "Rent payment", "food", "Mystery"] {
            insert_with_category(&mut connection, owner, account.id, category);
        }

        let report = fix_transaction_categories(owner, &mut connection).unwrap();

        assert_eq!(
            report,
            CategoryFixReport {
                total_transactions: 5,
                fixed_transactions: 3,
            }
        );
        let mut categories: Vec<_> = get_account_transactions(account.id, &connection)
            .unwrap()
            .into_iter()
            .map(|t| t.category)
            .collect();
        categories.sort();
        assert_eq!(categories, ["Mystery", "food", "food", "food", "housing"]);
    }

    #[test]
    fn leaves_other_owners_untouched() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let other = insert_user(&connection, "other");
        let theirs = insert_account(&mut connection, other, "Theirs", amount("0.00"));
        insert_with_category(&mut connection, other, theirs.id, "Salary");

        let report = fix_transaction_categories(owner, &mut connection).unwrap();

        assert_eq!(report.fixed_transactions, 0);
        assert_eq!(
            get_account_transactions(theirs.id, &connection).unwrap()[0].category,
            "Salary"
        );
    }

    #[test]
    fn lists_problematic_categories_with_suggestions() {
        let mut connection = get_test_connection();
        let owner = insert_user(&connection, "owner");
        let account = insert_account(&mut connection, owner, "Everyday", amount("0.00"));
        for category in ["Coffee shop", "groceries", "Mystery", "Coffee shop"] {
            insert_with_category(&mut connection, owner, account.id, category);
        }

        let got = get_problematic_categories(owner, &connection).unwrap();

        assert_eq!(
            got,
            [
                CategorySuggestion {
                    current: "Coffee shop".to_owned(),
                    suggested: "food".to_owned(),
                },
                CategorySuggestion {
                    current: "Mystery".to_owned(),
                    suggested: "other-expense".to_owned(),
                },
            ]
        );
    }
}
