//! Unit pricing.
//!
//! `unit_cost` is the price of one smallest unit in smallest units of the
//! payment token. A buy credits `payment / unit_cost` units; a sell pays
//! `units * unit_cost`. Selling what a buy credited therefore returns the
//! payment minus at most the floor remainder, and exactly the payment when
//! it was a multiple of `unit_cost`.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// How a buy treats a payment that is not a multiple of the unit cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingPolicy {
    /// Credit the whole units the payment covers. The remainder stays in
    /// the vault.
    #[default]
    Floor,
    /// Refuse any payment that leaves a remainder.
    ExactOnly,
}

impl PricingPolicy {
    /// Units credited for `payment`.
    pub fn units_for_payment(self, payment: u64, unit_cost: u64) -> EngineResult<u64> {
        if unit_cost == 0 {
            return Err(EngineError::InvalidUnitCost);
        }
        let units = payment / unit_cost;
        if units == 0 {
            return Err(EngineError::ZeroUnits { payment, unit_cost });
        }
        if self == PricingPolicy::ExactOnly && payment % unit_cost != 0 {
            return Err(EngineError::InexactPayment { payment, unit_cost });
        }
        Ok(units)
    }

    /// Proceeds paid for selling `units`. Exact; no rounding.
    pub fn proceeds_for_units(self, units: u64, unit_cost: u64) -> EngineResult<u64> {
        units
            .checked_mul(unit_cost)
            .ok_or(EngineError::ArithmeticFault)
    }
}
