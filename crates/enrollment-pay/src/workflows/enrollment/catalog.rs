use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::CatalogSource;

/// Upper bound on a tier price: $10,000,000.00.
pub const MAX_TIER_CENTS: u64 = 1_000_000_000;

/// Fixed-price program package selectable by an applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Selector sent by the enrollment form (`"$13,500"` or `"vip"`).
    pub key: String,
    pub label: String,
    pub base_cents: u64,
}

impl Tier {
    pub fn new(key: &str, label: &str, base_cents: u64) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            base_cents,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unable to read tier catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed tier catalog row: {0}")]
    Csv(#[from] csv::Error),
    #[error("tier catalog is empty")]
    Empty,
    #[error("tier key '{0}' appears more than once")]
    DuplicateKey(String),
    #[error("tier '{key}' is priced at {base_cents} cents (maximum {max})")]
    PriceOutOfRange { key: String, base_cents: u64, max: u64 },
}

/// Tiers offered by the current program catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCatalog {
    tiers: Vec<Tier>,
}

impl TierCatalog {
    pub fn new(tiers: Vec<Tier>) -> Result<Self, CatalogError> {
        if tiers.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (index, tier) in tiers.iter().enumerate() {
            if tier.base_cents > MAX_TIER_CENTS {
                return Err(CatalogError::PriceOutOfRange {
                    key: tier.key.clone(),
                    base_cents: tier.base_cents,
                    max: MAX_TIER_CENTS,
                });
            }
            if tiers[..index]
                .iter()
                .any(|earlier| earlier.key.eq_ignore_ascii_case(&tier.key))
            {
                return Err(CatalogError::DuplicateKey(tier.key.clone()));
            }
        }
        Ok(Self { tiers })
    }

    /// Four program fees selected by their formatted price.
    pub fn fixed_dollar() -> Self {
        Self {
            tiers: vec![
                Tier::new("$6,500", "Foundations", 650_000),
                Tier::new("$13,500", "Professional", 1_350_000),
                Tier::new("$21,000", "Enterprise", 2_100_000),
                Tier::new("$35,000", "Executive", 3_500_000),
            ],
        }
    }

    /// Symbolic tiers with scholarship framing.
    pub fn named() -> Self {
        Self {
            tiers: vec![
                Tier::new("scholarship", "Scholarship Cohort", 450_000),
                Tier::new("vip", "VIP Cohort", 2_500_000),
            ],
        }
    }

    /// Read `key,label,base_cents` rows.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let tiers = csv_reader
            .deserialize::<Tier>()
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tiers)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn load(source: &CatalogSource) -> Result<Self, CatalogError> {
        match source {
            CatalogSource::FixedDollar => Ok(Self::fixed_dollar()),
            CatalogSource::Named => Ok(Self::named()),
            CatalogSource::File(path) => Self::from_path(path),
        }
    }

    /// Resolve a selector; keys compare trimmed and case-insensitively.
    pub fn resolve(&self, selector: &str) -> Option<&Tier> {
        let selector = selector.trim();
        self.tiers
            .iter()
            .find(|tier| tier.key.eq_ignore_ascii_case(selector))
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }
}
