//! # Revenue Aggregator
//!
//! Read-only rollups over the sales stream.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  summarize(period)          [now - period, now]     → PeriodSummary     │
//! │  trend(granularity, days)   [now - days, now]       → Vec<RevenueBucket>│
//! │  compare(a, b, granularity) [a, a+Δ) vs [b, b+Δ)    → PeriodComparison  │
//! │  top_products(days, limit)  [now - days, now]       → Vec<TopProduct>   │
//! │  marketplace_breakdown      [now - period, now]     → per marketplace   │
//! │                                                                         │
//! │  Each call: cache? ─hit─► answer                                        │
//! │               │ miss                                                    │
//! │               ▼                                                         │
//! │          SaleRepository::list_between → stockroom_core::revenue fn      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `now` is always passed in, so the same arguments over the same sales give
//! the same answer. The cache key includes `now` exactly as given, so only
//! callers that pin it (a dashboard rounding to the minute, say) get hits;
//! passing a fresh `Utc::now()` each call always misses. A recorded sale
//! clears the cache.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::error::LedgerResult;
use crate::repository::product::ProductRepository;
use crate::repository::sale::{SaleRepository, WindowEnd};
use stockroom_core::revenue::{
    bucket_sales, breakdown_by_marketplace, rank_products, trailing_days, MarketplaceRevenue,
    PeriodComparison, PeriodSummary, TopProduct,
};
use stockroom_core::validation::{normalize_optional, validate_limit, validate_window_days};
use stockroom_core::{Granularity, Period, RevenueAggregate, RevenueBucket, SaleRecord};

/// Cache key: the operation and every argument that shapes its answer.
///
/// `now` is compared to the nanosecond; it is not rounded here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RevenueQuery {
    Summary {
        period: Period,
        marketplace: Option<String>,
        now: DateTime<Utc>,
    },
    Trend {
        granularity: Granularity,
        window_days: u32,
        marketplace: Option<String>,
        now: DateTime<Utc>,
    },
    Comparison {
        a_start: DateTime<Utc>,
        b_start: DateTime<Utc>,
        granularity: Granularity,
    },
    TopProducts {
        window_days: u32,
        limit: u32,
        marketplace: Option<String>,
        now: DateTime<Utc>,
    },
    Breakdown {
        period: Period,
        now: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub enum RevenueAnswer {
    Summary(PeriodSummary),
    Trend(Vec<RevenueBucket>),
    Comparison(PeriodComparison),
    TopProducts(Vec<TopProduct>),
    Breakdown(Vec<MarketplaceRevenue>),
}

pub type RevenueCache = TtlCache<RevenueQuery, RevenueAnswer>;

/// Revenue rollups over the sales stream.
///
/// Answers are cached per [`RevenueQuery`] when the cache TTL is non-zero.
/// Round `now` before calling to share answers between requests.
#[derive(Debug, Clone)]
pub struct RevenueAggregator {
    sales: SaleRepository,
    products: ProductRepository,
    cache: RevenueCache,
}

impl RevenueAggregator {
    pub fn new(pool: SqlitePool, cache: RevenueCache) -> Self {
        RevenueAggregator {
            sales: SaleRepository::new(pool.clone()),
            products: ProductRepository::new(pool),
            cache,
        }
    }

    /// Totals for the lookback window ending at `now` (inclusive).
    ///
    /// A window with no sales yields all-zero figures.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let daily = db.revenue().summarize(Period::Daily, None, Utc::now()).await?;
    /// println!("{} over {} sales", daily.aggregate.total_revenue, daily.aggregate.total_sales);
    /// ```
    pub async fn summarize(
        &self,
        period: Period,
        marketplace: Option<&str>,
        now: DateTime<Utc>,
    ) -> LedgerResult<PeriodSummary> {
        let marketplace = normalize_marketplace(marketplace);
        let key = RevenueQuery::Summary {
            period,
            marketplace: marketplace.clone(),
            now,
        };
        if let Some(RevenueAnswer::Summary(hit)) = self.cache.get(&key).await {
            debug!(period = %period, "Revenue summary served from cache");
            return Ok(hit);
        }

        let start = period.window_start(now)?;
        let sales = self
            .sales
            .list_between(start, now, WindowEnd::Inclusive, marketplace.as_deref())
            .await?;

        let summary = PeriodSummary {
            start,
            end: now,
            aggregate: RevenueAggregate::from_sales(&sales),
        };

        self.cache.insert(key, RevenueAnswer::Summary(summary.clone())).await;
        Ok(summary)
    }

    /// Per-bucket totals over the trailing `window_days`, oldest bucket first.
    /// Buckets with no sales are left out.
    pub async fn trend(
        &self,
        granularity: Granularity,
        window_days: u32,
        marketplace: Option<&str>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<RevenueBucket>> {
        validate_window_days(window_days)?;
        let marketplace = normalize_marketplace(marketplace);
        let key = RevenueQuery::Trend {
            granularity,
            window_days,
            marketplace: marketplace.clone(),
            now,
        };
        if let Some(RevenueAnswer::Trend(hit)) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let start = trailing_days(now, window_days)?;
        let sales = self
            .sales
            .list_between(start, now, WindowEnd::Inclusive, marketplace.as_deref())
            .await?;
        let buckets = bucket_sales(&sales, granularity);

        debug!(
            granularity = %granularity,
            window_days,
            buckets = buckets.len(),
            "Revenue trend computed"
        );

        self.cache.insert(key, RevenueAnswer::Trend(buckets.clone())).await;
        Ok(buckets)
    }

    /// Compares `[a_start, a_start + Δ)` against the baseline
    /// `[b_start, b_start + Δ)`, where Δ is one `granularity` unit.
    ///
    /// Deltas are A minus B. The percent change is 0 when B has no revenue.
    pub async fn compare(
        &self,
        a_start: DateTime<Utc>,
        b_start: DateTime<Utc>,
        granularity: Granularity,
    ) -> LedgerResult<PeriodComparison> {
        let key = RevenueQuery::Comparison {
            a_start,
            b_start,
            granularity,
        };
        if let Some(RevenueAnswer::Comparison(hit)) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let period_a = self.half_open_summary(a_start, granularity).await?;
        let period_b = self.half_open_summary(b_start, granularity).await?;
        let comparison = PeriodComparison::new(granularity, period_a, period_b);

        self.cache
            .insert(key, RevenueAnswer::Comparison(comparison.clone()))
            .await;
        Ok(comparison)
    }

    async fn half_open_summary(
        &self,
        start: DateTime<Utc>,
        granularity: Granularity,
    ) -> LedgerResult<PeriodSummary> {
        let end = granularity.advance(start)?;
        let sales = self
            .sales
            .list_between(start, end, WindowEnd::Exclusive, None)
            .await?;

        Ok(PeriodSummary {
            start,
            end,
            aggregate: RevenueAggregate::from_sales(&sales),
        })
    }

    /// Best sellers by quantity over the trailing `window_days`.
    ///
    /// Sales for products no longer in the catalog are skipped; the result is
    /// at most `limit` long.
    pub async fn top_products(
        &self,
        window_days: u32,
        limit: u32,
        marketplace: Option<&str>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<TopProduct>> {
        validate_window_days(window_days)?;
        validate_limit(limit)?;
        let marketplace = normalize_marketplace(marketplace);
        let key = RevenueQuery::TopProducts {
            window_days,
            limit,
            marketplace: marketplace.clone(),
            now,
        };
        if let Some(RevenueAnswer::TopProducts(hit)) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let start = trailing_days(now, window_days)?;
        let sales = self
            .sales
            .list_between(start, now, WindowEnd::Inclusive, marketplace.as_deref())
            .await?;

        let mut top = Vec::new();
        for ranked in rank_products(&sales) {
            if top.len() >= limit as usize {
                break;
            }
            match self.products.get_by_id(&ranked.product_id).await? {
                Some(product) => top.push(TopProduct::new(&product, ranked)),
                None => debug!(product_id = %ranked.product_id, "Skipping sales for unknown product"),
            }
        }

        self.cache.insert(key, RevenueAnswer::TopProducts(top.clone())).await;
        Ok(top)
    }

    /// Totals per marketplace for the lookback window ending at `now`.
    pub async fn marketplace_breakdown(
        &self,
        period: Period,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<MarketplaceRevenue>> {
        let key = RevenueQuery::Breakdown { period, now };
        if let Some(RevenueAnswer::Breakdown(hit)) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let start = period.window_start(now)?;
        let sales = self
            .sales
            .list_between(start, now, WindowEnd::Inclusive, None)
            .await?;
        let breakdown = breakdown_by_marketplace(&sales);

        self.cache
            .insert(key, RevenueAnswer::Breakdown(breakdown.clone()))
            .await;
        Ok(breakdown)
    }

    /// Appends a completed sale and drops cached answers.
    pub async fn record_sale(&self, sale: &SaleRecord) -> LedgerResult<()> {
        self.sales.insert(sale).await?;
        self.cache.invalidate().await;

        info!(
            order_id = %sale.order_id,
            marketplace = %sale.marketplace,
            amount = %sale.final_amount(),
            "Sale recorded"
        );
        Ok(())
    }

    /// Drops every cached answer.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }
}

fn normalize_marketplace(marketplace: Option<&str>) -> Option<String> {
    normalize_optional(marketplace.map(str::to_string)).map(|m| m.to_lowercase())
}
