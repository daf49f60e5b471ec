//! # Sales History & Credit Ledger
//!
//! Date-range filters for the history screen and the per-customer grouping
//! of outstanding credit sales.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{SaleType, SaleWithItems};

// =============================================================================
// Date Range
// =============================================================================

/// Half-open day range `[start, end)`; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "Option<String>")]
    pub start: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn unbounded() -> Self {
        DateRange::default()
    }

    /// Midnight-UTC instants for querying timestamp columns.
    pub fn utc_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (self.start.map(start_of_day), self.end.map(start_of_day))
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start.map_or(true, |s| day >= s) && self.end.map_or(true, |e| day < e)
    }
}

/// Midnight UTC at the start of `day`.
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

// =============================================================================
// History Filter
// =============================================================================

/// Preset ranges for the sales history screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFilter {
    #[default]
    Today,
    /// Monday-start calendar week containing today.
    Week,
    /// Calendar month containing today.
    Month,
    All,
}

impl HistoryFilter {
    /// Reads the `filter` query parameter: missing or blank means today, and
    /// an unrecognised value shows everything.
    ///
    /// ```rust
    /// use pharma_core::history::HistoryFilter;
    ///
    /// assert_eq!(HistoryFilter::from_param(None), HistoryFilter::Today);
    /// assert_eq!(HistoryFilter::from_param(Some("Month")), HistoryFilter::Month);
    /// assert_eq!(HistoryFilter::from_param(Some("year")), HistoryFilter::All);
    /// ```
    pub fn from_param(raw: Option<&str>) -> HistoryFilter {
        match raw.map(str::trim) {
            None | Some("") => HistoryFilter::default(),
            Some(value) => value.parse().unwrap_or(HistoryFilter::All),
        }
    }

    /// Resolves the filter against `today`.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use pharma_core::history::HistoryFilter;
    ///
    /// // Thursday 2024-02-15
    /// let today = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
    /// let week = HistoryFilter::Week.date_range(today);
    /// assert_eq!(week.start, NaiveDate::from_ymd_opt(2024, 2, 12));
    /// assert_eq!(week.end, NaiveDate::from_ymd_opt(2024, 2, 19));
    /// ```
    pub fn date_range(&self, today: NaiveDate) -> DateRange {
        match self {
            HistoryFilter::Today => DateRange::new(today, today + Duration::days(1)),
            HistoryFilter::Week => {
                let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
                DateRange::new(monday, monday + Duration::days(7))
            }
            HistoryFilter::Month => {
                let first = today.with_day(1).unwrap_or(today);
                let next = if first.month() == 12 {
                    NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
                };
                DateRange {
                    start: Some(first),
                    end: next,
                }
            }
            HistoryFilter::All => DateRange::unbounded(),
        }
    }
}

impl FromStr for HistoryFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(HistoryFilter::Today),
            "week" => Ok(HistoryFilter::Week),
            "month" => Ok(HistoryFilter::Month),
            "all" => Ok(HistoryFilter::All),
            _ => Err(ValidationError::NotAllowed {
                field: "filter".to_string(),
                allowed: ["today", "week", "month", "all"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Sales History
// =============================================================================

/// Sales in a range, newest first, with totals over the same set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesHistory {
    pub filter: HistoryFilter,
    pub date_range: DateRange,
    pub total_sales: i64,
    pub total_revenue_cents: i64,
    pub sales: Vec<SaleWithItems>,
}

impl SalesHistory {
    pub fn build(filter: HistoryFilter, date_range: DateRange, sales: Vec<SaleWithItems>) -> Self {
        let total_revenue: Money = sales.iter().map(|s| Money::from_cents(s.sale.total_cents)).sum();
        SalesHistory {
            filter,
            date_range,
            total_sales: sales.len() as i64,
            total_revenue_cents: total_revenue.cents(),
            sales,
        }
    }
}

// =============================================================================
// Credit Ledger
// =============================================================================

/// Outstanding credit for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreditCustomer {
    pub name: String,
    pub total_owed_cents: i64,
    pub sales_count: i64,
    pub sales: Vec<SaleWithItems>,
}

/// All outstanding credit, grouped by customer name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreditLedger {
    /// Highest balance first.
    pub customers: Vec<CreditCustomer>,
    pub total_outstanding_cents: i64,
    pub total_customers: i64,
}

impl CreditLedger {
    /// Groups credit sales by exact customer name.
    ///
    /// Paid sales and sales without a customer name are ignored. Within a
    /// customer, sales keep the order they were passed in.
    pub fn build(sales: Vec<SaleWithItems>) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, CreditCustomer> = HashMap::new();

        for sale in sales {
            if sale.sale.sale_type != SaleType::Credit {
                continue;
            }
            let name = match sale.sale.customer_name.as_deref().map(str::trim) {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => continue,
            };

            let entry = grouped.entry(name.clone()).or_insert_with(|| {
                order.push(name.clone());
                CreditCustomer {
                    name,
                    total_owed_cents: 0,
                    sales_count: 0,
                    sales: Vec::new(),
                }
            });
            entry.total_owed_cents += sale.sale.total_cents;
            entry.sales_count += 1;
            entry.sales.push(sale);
        }

        let mut customers: Vec<CreditCustomer> = order
            .into_iter()
            .filter_map(|name| grouped.remove(&name))
            .collect();
        customers.sort_by(|a, b| {
            b.total_owed_cents
                .cmp(&a.total_owed_cents)
                .then_with(|| a.name.cmp(&b.name))
        });

        let total_outstanding_cents = customers.iter().map(|c| c.total_owed_cents).sum();
        CreditLedger {
            total_customers: customers.len() as i64,
            total_outstanding_cents,
            customers,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sale;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(id: &str, sale_type: SaleType, customer: Option<&str>, total: i64) -> SaleWithItems {
        SaleWithItems {
            sale: Sale {
                id: id.to_string(),
                receipt_number: format!("V-20240101-{}", id),
                sale_type,
                total_cents: total,
                customer_name: customer.map(String::from),
                sold_at: Utc::now(),
            },
            items: vec![],
        }
    }

    #[test]
    fn test_today_range() {
        let r = HistoryFilter::Today.date_range(day(2024, 2, 29));
        assert_eq!(r, DateRange::new(day(2024, 2, 29), day(2024, 3, 1)));
        assert!(r.contains(day(2024, 2, 29)));
        assert!(!r.contains(day(2024, 3, 1)));
    }

    #[test]
    fn test_week_starts_monday() {
        // Monday stays Monday, Sunday goes back six days
        let r = HistoryFilter::Week.date_range(day(2024, 2, 12));
        assert_eq!(r.start, Some(day(2024, 2, 12)));
        let r = HistoryFilter::Week.date_range(day(2024, 2, 18));
        assert_eq!(r.start, Some(day(2024, 2, 12)));
        assert_eq!(r.end, Some(day(2024, 2, 19)));
    }

    #[test]
    fn test_month_range_handles_december() {
        let r = HistoryFilter::Month.date_range(day(2024, 12, 31));
        assert_eq!(r, DateRange::new(day(2024, 12, 1), day(2025, 1, 1)));
        let r = HistoryFilter::Month.date_range(day(2024, 2, 10));
        assert_eq!(r, DateRange::new(day(2024, 2, 1), day(2024, 3, 1)));
    }

    #[test]
    fn test_all_is_unbounded() {
        let r = HistoryFilter::All.date_range(day(2024, 1, 1));
        assert_eq!(r.utc_bounds(), (None, None));
        assert!(r.contains(day(1999, 1, 1)));
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("WEEK".parse::<HistoryFilter>().unwrap(), HistoryFilter::Week);
        assert!("yesterday".parse::<HistoryFilter>().is_err());
    }

    #[test]
    fn test_unknown_param_falls_back_to_all() {
        assert_eq!(HistoryFilter::from_param(Some("  ")), HistoryFilter::Today);
        assert_eq!(HistoryFilter::from_param(Some("week")), HistoryFilter::Week);
        assert_eq!(HistoryFilter::from_param(Some("yesterday")), HistoryFilter::All);
    }

    #[test]
    fn test_history_totals() {
        let h = SalesHistory::build(
            HistoryFilter::All,
            DateRange::unbounded(),
            vec![sale("1", SaleType::Paid, None, 500), sale("2", SaleType::Credit, Some("A"), 250)],
        );
        assert_eq!(h.total_sales, 2);
        assert_eq!(h.total_revenue_cents, 750);
    }

    #[test]
    fn test_credit_ledger_grouping() {
        let ledger = CreditLedger::build(vec![
            sale("1", SaleType::Credit, Some("Awa"), 1000),
            sale("2", SaleType::Credit, Some("Moussa"), 3000),
            sale("3", SaleType::Credit, Some("Awa"), 500),
            sale("4", SaleType::Paid, None, 9999),
            sale("5", SaleType::Credit, Some("  "), 700),
        ]);

        assert_eq!(ledger.total_customers, 2);
        assert_eq!(ledger.total_outstanding_cents, 4500);
        assert_eq!(ledger.customers[0].name, "Moussa");
        assert_eq!(ledger.customers[1].name, "Awa");
        assert_eq!(ledger.customers[1].sales_count, 2);
        assert_eq!(ledger.customers[1].total_owed_cents, 1500);
        assert_eq!(ledger.customers[1].sales[0].sale.id, "1");
    }
}
