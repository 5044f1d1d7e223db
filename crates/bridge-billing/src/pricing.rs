//! Plans, Billing Cycles, and Price Recomputation

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Client-supplied prices within this distance of the recomputed
/// quote are treated as agreeing (rounding slack, one cent).
pub const PRICE_TOLERANCE_CENTS: i64 = 1;

/// Hosting plan tiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Starter,
    Standard,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &str {
        match self {
            Plan::Starter => "starter",
            Plan::Standard => "standard",
            Plan::Premium => "premium",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "standard" => Plan::Standard,
            "premium" => Plan::Premium,
            _ => Plan::Starter,
        }
    }

    /// Monthly price per GiB of memory, in cents
    pub fn cents_per_gb_month(&self) -> i64 {
        match self {
            Plan::Starter => 300,  // $3/GB
            Plan::Standard => 450, // $4.50/GB
            Plan::Premium => 600,  // $6/GB
        }
    }
}

/// Prepaid billing term
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl BillingCycle {
    pub fn as_str(&self) -> &str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::Semiannual => "semiannual",
            BillingCycle::Annual => "annual",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "quarterly" => BillingCycle::Quarterly,
            "semiannual" => BillingCycle::Semiannual,
            "annual" | "yearly" => BillingCycle::Annual,
            _ => BillingCycle::Monthly,
        }
    }

    /// Months charged up front
    pub fn months(&self) -> i64 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Quarterly => 3,
            BillingCycle::Semiannual => 6,
            BillingCycle::Annual => 12,
        }
    }

    /// Discount fraction for committing to the term
    pub fn discount(&self) -> Decimal {
        match self {
            BillingCycle::Monthly => dec!(0),
            BillingCycle::Quarterly => dec!(0.05),
            BillingCycle::Semiannual => dec!(0.10),
            BillingCycle::Annual => dec!(0.15),
        }
    }
}

/// Recompute the charge for a configuration, in cents.
///
/// `memory_mb` is billed in whole GiB, rounded up, minimum one.
pub fn quote_cents(plan: Plan, memory_mb: u32, cycle: BillingCycle) -> i64 {
    let gb = i64::from(memory_mb.div_ceil(1024).max(1));
    let monthly = Decimal::from(plan.cents_per_gb_month()) * Decimal::from(gb);
    let total = monthly * Decimal::from(cycle.months()) * (dec!(1) - cycle.discount());
    total.round_dp(0).to_i64().unwrap_or(0)
}
