use clap::Args;
use serde::Deserialize;
use enrollment_pay::config::AppConfig;
use enrollment_pay::error::AppError;
use enrollment_pay::workflows::enrollment::{
    format_cents, PricingPolicy, PricingQuote, Tier, TierCatalog, ValidationError, BASE_SEATS,
};

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Tier key as submitted by the form (for example "$13,500" or "vip")
    #[arg(long)]
    pub(crate) tier: String,
    /// Seats purchased beyond the included base
    #[arg(long, default_value_t = 0)]
    pub(crate) seats: u32,
    /// Advisory support hours
    #[arg(long, default_value_t = 0)]
    pub(crate) support_hours: u32,
}

/// Body of `POST /api/quote`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuoteRequest {
    pub(crate) tier: String,
    #[serde(default)]
    pub(crate) additional_seats: u32,
    #[serde(default)]
    pub(crate) support_hours: u32,
}

/// Price a tier against the configured catalog and surcharges.
pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = TierCatalog::load(&config.enrollment.catalog)?;
    let policy = config.enrollment.pricing_policy();

    let (tier, quote) = price(&catalog, &policy, &args.tier, args.seats, args.support_hours)?;
    for line in render_quote(tier, &quote) {
        println!("{line}");
    }
    Ok(())
}

/// List every tier in the configured catalog.
pub(crate) fn run_tiers() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = TierCatalog::load(&config.enrollment.catalog)?;
    println!("Program tiers ({BASE_SEATS} seats included)");
    for tier in catalog.tiers() {
        println!(
            "  {:<12} {:<22} {:>12}",
            tier.key,
            tier.label,
            format_cents(tier.base_cents)
        );
    }
    Ok(())
}

pub(crate) fn price<'a>(
    catalog: &'a TierCatalog,
    policy: &PricingPolicy,
    selector: &str,
    seats: u32,
    support_hours: u32,
) -> Result<(&'a Tier, PricingQuote), AppError> {
    let tier = catalog
        .resolve(selector)
        .ok_or_else(|| ValidationError::UnknownTier {
            field: "tier",
            value: selector.to_string(),
        })?;
    let quote = policy.quote(tier, seats, support_hours)?;
    Ok((tier, quote))
}

fn render_quote(tier: &Tier, quote: &PricingQuote) -> Vec<String> {
    let mut lines = vec![
        format!("{} ({})", tier.label, tier.key),
        format!(
            "  Base ({BASE_SEATS} seats)        {:>14}",
            format_cents(quote.tier_base_cents)
        ),
    ];
    if quote.additional_seats > 0 {
        lines.push(format!(
            "  {} extra seats x {}  {:>14}",
            quote.additional_seats,
            format_cents(quote.per_seat_cents),
            format_cents(quote.seat_surcharge_cents)
        ));
    }
    if quote.support_hours > 0 {
        lines.push(format!(
            "  {} support hours x {}  {:>14}",
            quote.support_hours,
            format_cents(quote.hourly_rate_cents),
            format_cents(quote.support_surcharge_cents)
        ));
    }
    lines.push(format!(
        "  Total ({} seats)       {:>14}",
        BASE_SEATS + quote.additional_seats,
        format_cents(quote.total_cents)
    ));
    lines
}
