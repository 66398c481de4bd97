//! Daily income and expense totals for the account chart.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};

use crate::transaction::{Transaction, TransactionKind};

/// The period covered by the chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateRangePreset {
    /// The last 7 days.
    #[serde(rename = "7D")]
    SevenDays,
    /// The last 30 days.
    #[default]
    #[serde(rename = "1M")]
    OneMonth,
    /// The last 90 days.
    #[serde(rename = "3M")]
    ThreeMonths,
    /// The last 180 days.
    #[serde(rename = "6M")]
    SixMonths,
    /// Every day that has transactions.
    #[serde(rename = "ALL")]
    All,
}

impl DateRangePreset {
    /// The number of days covered, `None` for [DateRangePreset::All].
    pub fn days(&self) -> Option<i64> {
        match self {
            DateRangePreset::SevenDays => Some(7),
            DateRangePreset::OneMonth => Some(30),
            DateRangePreset::ThreeMonths => Some(90),
            DateRangePreset::SixMonths => Some(180),
            DateRangePreset::All => None,
        }
    }
}

/// The totals of a single calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotals {
    /// The day as `YYYY-MM-DD`.
    pub date: String,
    /// The day as shown on the chart axis, e.g. "05 Jan".
    pub label: String,
    /// The sum of the day's income.
    pub income: Decimal,
    /// The sum of the day's expenses.
    pub expense: Decimal,
}

impl DailyTotals {
    fn empty(date: Date) -> Self {
        Self {
            date: date.to_string(),
            label: format_day_label(date),
            income: Decimal::ZERO,
            expense: Decimal::ZERO,
        }
    }
}

/// The totals over every day of the chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeriodTotals {
    /// The sum of income.
    pub income: Decimal,
    /// The sum of expenses.
    pub expense: Decimal,
    /// Income minus expenses.
    pub net: Decimal,
}

/// The data behind the account chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartData {
    /// The period covered.
    pub range: DateRangePreset,
    /// One entry per day, oldest first.
    pub days: Vec<DailyTotals>,
    /// The totals over `days`.
    pub totals: PeriodTotals,
}

/// Bucket `transactions` by calendar day in the timezone `offset`.
///
/// Bounded presets produce one zero-filled bucket for each day of the range
/// ending today. [DateRangePreset::All] produces a bucket for each day that
/// has transactions. Transactions dated after today are left out.
pub fn aggregate_daily(
    transactions: &[Transaction],
    range: DateRangePreset,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> ChartData {
    let today = now.to_offset(offset).date();
    let first_day = range
        .days()
        .map(|days| today - Duration::days(days - 1));

    let mut buckets: BTreeMap<Date, DailyTotals> = BTreeMap::new();

    if let Some(first_day) = first_day {
        let mut day = first_day;
        while day <= today {
            buckets.insert(day, DailyTotals::empty(day));
            let Some(next_day) = day.next_day() else {
                break;
            };
            day = next_day;
        }
    }

    for transaction in transactions {
        let day = transaction.date.to_offset(offset).date();

        if day > today || first_day.is_some_and(|first_day| day < first_day) {
            continue;
        }

        let bucket = buckets
            .entry(day)
            .or_insert_with(|| DailyTotals::empty(day));

        match transaction.kind {
            TransactionKind::Income => bucket.income += transaction.amount,
            TransactionKind::Expense => bucket.expense += transaction.amount,
        }
    }

    let days: Vec<DailyTotals> = buckets.into_values().collect();
    let income: Decimal = days.iter().map(|day| day.income).sum();
    let expense: Decimal = days.iter().map(|day| day.expense).sum();

    ChartData {
        range,
        days,
        totals: PeriodTotals {
            income,
            expense,
            net: income - expense,
        },
    }
}

/// Formats a date as the day of the month and a three-letter month, e.g. "05 Jan".
pub fn format_day_label(date: Date) -> String {
    format!("{:02} {}", date.day(), month_abbreviation(date.month()))
}

fn month_abbreviation(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

#[cfg(test)]
mod tests {
    use time::{OffsetDateTime, UtcOffset, macros::datetime};

    use crate::{
        Transaction, TransactionKind,
        test_utils::amount,
    };

    use super::{DateRangePreset, aggregate_daily, format_day_label};

    fn transaction(kind: TransactionKind, value: &str, date: OffsetDateTime) -> Transaction {
        Transaction {
            id: 1,
            user_id: 1,
            account_id: 1,
            amount: amount(value),
            kind,
            category: "food".to_owned(),
            description: String::new(),
            date,
            is_recurring: false,
            recurring_interval: None,
            next_recurring_date: None,
        }
    }

    #[test]
    fn bounded_range_is_zero_filled_oldest_first() {
        let now = datetime!(2025-01-10 15:00 UTC);

        let chart = aggregate_daily(&[], DateRangePreset::SevenDays, now, UtcOffset::UTC);

        let labels: Vec<_> = chart.days.iter().map(|day| day.label.as_str()).collect();
        assert_eq!(
            labels,
            ["04 Jan", "05 Jan", "06 Jan", "07 Jan", "08 Jan", "09 Jan", "10 Jan"]
        );
        assert_eq!(chart.days[0].date, "2025-01-04");
        assert_eq!(chart.totals.net, amount("0"));
    }

    #[test]
    fn sums_income_and_expense_per_day() {
        let now = datetime!(2025-01-10 15:00 UTC);
        let transactions = [
            transaction(TransactionKind::Income, "100.00", datetime!(2025-01-10 09:00 UTC)),
            transaction(TransactionKind::Expense, "20.50", datetime!(2025-01-10 10:00 UTC)),
            transaction(TransactionKind::Expense, "4.50", datetime!(2025-01-09 10:00 UTC)),
            // Outside the range.
            transaction(TransactionKind::Expense, "999.00", datetime!(2025-01-01 10:00 UTC)),
            // In the future.
            transaction(TransactionKind::Income, "999.00", datetime!(2025-01-11 10:00 UTC)),
        ];

        let chart = aggregate_daily(&transactions, DateRangePreset::SevenDays, now, UtcOffset::UTC);

        let today = chart.days.last().unwrap();
        assert_eq!(today.income, amount("100.00"));
        assert_eq!(today.expense, amount("20.50"));
        assert_eq!(chart.days[5].expense, amount("4.50"));
        assert_eq!(chart.totals.income, amount("100.00"));
        assert_eq!(chart.totals.expense, amount("25.00"));
        assert_eq!(chart.totals.net, amount("75.00"));
    }

    #[test]
    fn one_month_has_thirty_days() {
        let chart = aggregate_daily(
            &[],
            DateRangePreset::OneMonth,
            datetime!(2025-03-01 00:00 UTC),
            UtcOffset::UTC,
        );

        assert_eq!(chart.days.len(), 30);
        assert_eq!(chart.days[0].date, "2025-01-31");
    }

    #[test]
    fn all_time_only_has_days_with_transactions() {
        let transactions = [
            transaction(TransactionKind::Income, "1.00", datetime!(2024-12-25 09:00 UTC)),
            transaction(TransactionKind::Expense, "2.00", datetime!(2023-06-01 09:00 UTC)),
        ];

        let chart = aggregate_daily(
            &transactions,
            DateRangePreset::All,
            datetime!(2025-01-10 15:00 UTC),
            UtcOffset::UTC,
        );

        let dates: Vec<_> = chart.days.iter().map(|day| day.date.as_str()).collect();
        assert_eq!(dates, ["2023-06-01", "2024-12-25"]);
        assert_eq!(chart.totals.net, amount("-1.00"));
    }

    #[test]
    fn buckets_by_local_day() {
        let offset = UtcOffset::from_hms(13, 0, 0).unwrap();
        // 2025-01-10 14:00 in UTC+13.
        let late_utc = datetime!(2025-01-10 01:00 UTC);
        let transactions = [transaction(TransactionKind::Expense, "5.00", late_utc)];

        let chart = aggregate_daily(
            &transactions,
            DateRangePreset::SevenDays,
            datetime!(2025-01-10 02:00 UTC),
            offset,
        );

        assert_eq!(chart.days.last().unwrap().date, "2025-01-10");
        assert_eq!(chart.days.last().unwrap().expense, amount("5.00"));
    }

    #[test]
    fn formats_labels() {
        assert_eq!(format_day_label(time::macros::date!(2025 - 11 - 05)), "05 Nov");
    }

    #[test]
    fn preset_deserializes_from_short_name() {
        let preset: DateRangePreset = serde_json::from_str("\"3M\"").unwrap();

        assert_eq!(preset, DateRangePreset::ThreeMonths);
        assert_eq!(DateRangePreset::default(), DateRangePreset::OneMonth);
    }
}
