use serde::Serialize;

use super::catalog::Tier;

pub const MAX_ADDITIONAL_SEATS: u32 = 40;
pub const MAX_SUPPORT_HOURS: u32 = 100;

const BASIS_POINTS: u64 = 10_000;

/// Add-on pricing knobs. All amounts are minor units (cents).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingPolicy {
    pub seat_surcharge_bps: u64,
    pub support_hourly_rate_cents: u64,
    pub max_additional_seats: u32,
    pub max_support_hours: u32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            seat_surcharge_bps: 1_000,
            support_hourly_rate_cents: 30_000,
            max_additional_seats: MAX_ADDITIONAL_SEATS,
            max_support_hours: MAX_SUPPORT_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("additional seats must be between 0 and {max} (found {found})")]
    SeatsOutOfRange { found: u32, max: u32 },
    #[error("support hours must be between 0 and {max} (found {found})")]
    HoursOutOfRange { found: u32, max: u32 },
    #[error("quote for tier '{tier}' exceeds the representable amount")]
    Overflow { tier: String },
}

/// Amount owed for a tier plus add-ons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingQuote {
    pub tier_base_cents: u64,
    pub per_seat_cents: u64,
    pub additional_seats: u32,
    pub seat_surcharge_cents: u64,
    pub hourly_rate_cents: u64,
    pub support_hours: u32,
    pub support_surcharge_cents: u64,
    pub total_cents: u64,
}

impl PricingPolicy {
    /// Per-seat surcharge, rounded half-up to the cent. `None` when the product overflows.
    pub fn per_seat_cents(&self, tier_base_cents: u64) -> Option<u64> {
        tier_base_cents
            .checked_mul(self.seat_surcharge_bps)?
            .checked_add(BASIS_POINTS / 2)
            .map(|scaled| scaled / BASIS_POINTS)
    }

    pub fn quote(
        &self,
        tier: &Tier,
        additional_seats: u32,
        support_hours: u32,
    ) -> Result<PricingQuote, PricingError> {
        if additional_seats > self.max_additional_seats {
            return Err(PricingError::SeatsOutOfRange {
                found: additional_seats,
                max: self.max_additional_seats,
            });
        }
        if support_hours > self.max_support_hours {
            return Err(PricingError::HoursOutOfRange {
                found: support_hours,
                max: self.max_support_hours,
            });
        }

        let overflow = || PricingError::Overflow {
            tier: tier.key.clone(),
        };
        let per_seat_cents = self.per_seat_cents(tier.base_cents).ok_or_else(overflow)?;
        let seat_surcharge_cents = per_seat_cents
            .checked_mul(u64::from(additional_seats))
            .ok_or_else(overflow)?;
        let support_surcharge_cents = self
            .support_hourly_rate_cents
            .checked_mul(u64::from(support_hours))
            .ok_or_else(overflow)?;
        let total_cents = tier
            .base_cents
            .checked_add(seat_surcharge_cents)
            .and_then(|subtotal| subtotal.checked_add(support_surcharge_cents))
            .ok_or_else(overflow)?;

        Ok(PricingQuote {
            tier_base_cents: tier.base_cents,
            per_seat_cents,
            additional_seats,
            seat_surcharge_cents,
            hourly_rate_cents: self.support_hourly_rate_cents,
            support_hours,
            support_surcharge_cents,
            total_cents,
        })
    }
}

/// Format minor units as a dollar string with thousands separators (`$20,250.00`).
pub fn format_cents(cents: u64) -> String {
    let dollars = (cents / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (index, digit) in dollars.chars().enumerate() {
        if index > 0 && (dollars.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("${}.{:02}", grouped, cents % 100)
}
