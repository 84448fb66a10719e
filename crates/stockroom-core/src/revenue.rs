//! # Revenue Rollups
//!
//! Period windows, calendar buckets and aggregation over slices of the sales
//! stream. Everything here is pure: the database layer fetches the sales for
//! a window and hands them to these functions.
//!
//! ## Windows vs Buckets
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Period (summaries)          lookback from `now`, by date arithmetic    │
//! │  ─────────────────           ───────────────────────────────────────   │
//! │  daily                       [now - 1 day,    now]                      │
//! │  weekly                      [now - 7 days,   now]                      │
//! │  monthly                     [now - 1 month,  now]  (Mar 31 → Feb 29)   │
//! │  yearly                      [now - 12 months, now]                     │
//! │                                                                         │
//! │  Granularity (trends/compare)  calendar-aligned buckets                 │
//! │  ───────────────────────────   ───────────────────────                  │
//! │  day    key {year, ordinal day}      compare Δ = 1 day                  │
//! │  week   key {ISO year, ISO week}     compare Δ = 7 days                 │
//! │  month  key {year, month}            compare Δ = 1 month                │
//! │  year   key {year, 0}                compare Δ = 12 months              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All calendar math is in UTC.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Product, SaleRecord};

// =============================================================================
// Period
// =============================================================================

/// Lookback window for revenue summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Period {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Yearly => "yearly",
        }
    }

    /// First instant of the lookback window ending at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
        let start = match self {
            Period::Daily => now.checked_sub_signed(Duration::days(1)),
            Period::Weekly => now.checked_sub_signed(Duration::days(7)),
            Period::Monthly => now.checked_sub_months(Months::new(1)),
            Period::Yearly => now.checked_sub_months(Months::new(12)),
        };
        start.ok_or_else(|| CoreError::DateOutOfRange(format!("{} before {}", self, now)))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            "yearly" | "annual" => Ok(Period::Yearly),
            _ => Err(ValidationError::not_allowed(
                "period",
                &["daily", "weekly", "monthly", "yearly"],
            )),
        }
    }
}

/// `[now - days, now]`.
pub fn trailing_days(now: DateTime<Utc>, days: u32) -> CoreResult<DateTime<Utc>> {
    now.checked_sub_signed(Duration::days(days as i64))
        .ok_or_else(|| CoreError::DateOutOfRange(format!("{} days before {}", days, now)))
}

// =============================================================================
// Granularity
// =============================================================================

/// Calendar bucket size for trends and period comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

/// Bucket identity: `{year, index}`. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BucketKey {
    pub year: i32,
    /// Ordinal day, ISO week, month, or 0 for yearly buckets.
    pub index: u32,
}

impl Granularity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }

    /// End (exclusive) of the comparison window starting at `start`.
    pub fn advance(&self, start: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
        let end = match self {
            Granularity::Day => start.checked_add_signed(Duration::days(1)),
            Granularity::Week => start.checked_add_signed(Duration::days(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
            Granularity::Year => start.checked_add_months(Months::new(12)),
        };
        end.ok_or_else(|| CoreError::DateOutOfRange(format!("{} after {}", self, start)))
    }

    /// Bucket the instant `at` falls into.
    pub fn bucket_key(&self, at: DateTime<Utc>) -> BucketKey {
        match self {
            Granularity::Day => BucketKey {
                year: at.year(),
                index: at.ordinal(),
            },
            Granularity::Week => {
                let week = at.iso_week();
                BucketKey {
                    year: week.year(),
                    index: week.week(),
                }
            }
            Granularity::Month => BucketKey {
                year: at.year(),
                index: at.month(),
            },
            Granularity::Year => BucketKey {
                year: at.year(),
                index: 0,
            },
        }
    }

    /// First instant of the bucket containing `at`.
    pub fn bucket_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let date = at.date_naive();
        let first_day = match self {
            Granularity::Day => Some(date),
            Granularity::Week => {
                date.checked_sub_signed(Duration::days(date.weekday().num_days_from_monday() as i64))
            }
            Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }
        .unwrap_or(date);
        Utc.from_utc_datetime(&first_day.and_time(NaiveTime::MIN))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            "year" | "yearly" | "annual" => Ok(Granularity::Year),
            _ => Err(ValidationError::not_allowed(
                "granularity",
                &["day", "week", "month", "year"],
            )),
        }
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Running totals over a set of sales.
#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    revenue: Money,
    sales: i64,
    quantity: i64,
    fees: Money,
}

impl Totals {
    fn push(&mut self, sale: &SaleRecord) {
        self.revenue += sale.final_amount();
        self.sales += 1;
        self.quantity += sale.quantity;
        self.fees += sale.total_fees();
    }

    fn finish(self) -> RevenueAggregate {
        RevenueAggregate {
            total_revenue: self.revenue,
            total_sales: self.sales,
            total_quantity: self.quantity,
            average_order_value: self.revenue.average_over(self.sales),
            total_fees: self.fees,
            net_revenue: self.revenue - self.fees,
        }
    }
}

/// Revenue summary over a window. All-zero when the window holds no sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RevenueAggregate {
    /// Σ final amount.
    pub total_revenue: Money,
    /// Number of sales.
    pub total_sales: i64,
    /// Σ quantity.
    pub total_quantity: i64,
    /// `total_revenue / total_sales`, 0 for no sales.
    pub average_order_value: Money,
    pub total_fees: Money,
    /// `total_revenue - total_fees`.
    pub net_revenue: Money,
}

impl RevenueAggregate {
    pub fn zero() -> Self {
        RevenueAggregate::default()
    }

    pub fn from_sales<'a, I>(sales: I) -> Self
    where
        I: IntoIterator<Item = &'a SaleRecord>,
    {
        let mut totals = Totals::default();
        for sale in sales {
            totals.push(sale);
        }
        totals.finish()
    }
}

/// One calendar bucket of a trend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RevenueBucket {
    pub key: BucketKey,
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    pub total_revenue: Money,
    pub total_sales: i64,
    pub total_quantity: i64,
    pub average_order_value: Money,
}

/// Groups sales into calendar buckets, oldest bucket first.
///
/// Empty buckets are omitted.
pub fn bucket_sales(sales: &[SaleRecord], granularity: Granularity) -> Vec<RevenueBucket> {
    let mut buckets: BTreeMap<BucketKey, (DateTime<Utc>, Totals)> = BTreeMap::new();

    for sale in sales {
        let key = granularity.bucket_key(sale.sale_date);
        buckets
            .entry(key)
            .or_insert_with(|| (granularity.bucket_start(sale.sale_date), Totals::default()))
            .1
            .push(sale);
    }

    buckets
        .into_iter()
        .map(|(key, (start, totals))| {
            let aggregate = totals.finish();
            RevenueBucket {
                key,
                start,
                total_revenue: aggregate.total_revenue,
                total_sales: aggregate.total_sales,
                total_quantity: aggregate.total_quantity,
                average_order_value: aggregate.average_order_value,
            }
        })
        .collect()
}

// =============================================================================
// Period Comparison
// =============================================================================

/// An aggregate together with the window it covers.
///
/// Summaries include `end`; comparison windows stop just before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    #[ts(as = "String")]
    pub end: DateTime<Utc>,
    #[serde(flatten)]
    #[ts(flatten)]
    pub aggregate: RevenueAggregate,
}

/// Period A measured against baseline period B.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RevenueDeltas {
    pub revenue_change: Money,
    /// Percent change against B's revenue; 0 when B's revenue is 0.
    pub revenue_change_percent: f64,
    pub sales_change: i64,
    pub quantity_change: i64,
}

impl RevenueDeltas {
    pub fn between(a: &RevenueAggregate, baseline: &RevenueAggregate) -> Self {
        RevenueDeltas {
            revenue_change: a.total_revenue - baseline.total_revenue,
            revenue_change_percent: a.total_revenue.percent_change_from(baseline.total_revenue),
            sales_change: a.total_sales - baseline.total_sales,
            quantity_change: a.total_quantity - baseline.total_quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparison {
    pub granularity: Granularity,
    pub period_a: PeriodSummary,
    pub period_b: PeriodSummary,
    pub deltas: RevenueDeltas,
}

impl PeriodComparison {
    pub fn new(granularity: Granularity, period_a: PeriodSummary, period_b: PeriodSummary) -> Self {
        let deltas = RevenueDeltas::between(&period_a.aggregate, &period_b.aggregate);
        PeriodComparison {
            granularity,
            period_a,
            period_b,
            deltas,
        }
    }
}

// =============================================================================
// Product Ranking
// =============================================================================

/// Quantity and revenue sold for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: String,
    pub total_quantity: i64,
    pub total_revenue: Money,
}

/// Groups sales by product, ordered by quantity sold (highest first).
///
/// Products with equal quantity keep the order in which they first appear in
/// `sales`, so repeated calls over unchanged data give identical output.
pub fn rank_products(sales: &[SaleRecord]) -> Vec<ProductSales> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut ranked: Vec<ProductSales> = Vec::new();

    for sale in sales {
        let slot = *index.entry(sale.product_id.as_str()).or_insert_with(|| {
            ranked.push(ProductSales {
                product_id: sale.product_id.clone(),
                total_quantity: 0,
                total_revenue: Money::zero(),
            });
            ranked.len() - 1
        });
        ranked[slot].total_quantity += sale.quantity;
        ranked[slot].total_revenue += sale.final_amount();
    }

    // sort_by is stable
    ranked.sort_by(|a, b| b.total_quantity.cmp(&a.total_quantity));
    ranked
}

/// A ranked product joined with its catalog data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub total_quantity: i64,
    pub total_revenue: Money,
}

impl TopProduct {
    pub fn new(product: &Product, sales: ProductSales) -> Self {
        TopProduct {
            product_id: sales.product_id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            total_quantity: sales.total_quantity,
            total_revenue: sales.total_revenue,
        }
    }
}

// =============================================================================
// Marketplace Breakdown
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceRevenue {
    pub marketplace: String,
    #[serde(flatten)]
    #[ts(flatten)]
    pub aggregate: RevenueAggregate,
}

/// Per-marketplace aggregates, highest revenue first (ties by name).
///
/// Names are grouped trimmed and lowercased, the same way the marketplace
/// filter matches them.
pub fn breakdown_by_marketplace(sales: &[SaleRecord]) -> Vec<MarketplaceRevenue> {
    let mut groups: BTreeMap<String, Totals> = BTreeMap::new();
    for sale in sales {
        groups
            .entry(sale.marketplace.trim().to_lowercase())
            .or_default()
            .push(sale);
    }

    let mut breakdown: Vec<MarketplaceRevenue> = groups
        .into_iter()
        .map(|(marketplace, totals)| MarketplaceRevenue {
            marketplace,
            aggregate: totals.finish(),
        })
        .collect();

    breakdown.sort_by(|a, b| b.aggregate.total_revenue.cmp(&a.aggregate.total_revenue));
    breakdown
}

// =============================================================================
// Unit Tests
// =============================================================================
