use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Canonical subscription durations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlanType {
    #[serde(rename = "1month")]
    OneMonth,
    #[serde(rename = "3months")]
    ThreeMonths,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "1year")]
    OneYear,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::OneMonth => "1month",
            PlanType::ThreeMonths => "3months",
            PlanType::SixMonths => "6months",
            PlanType::OneYear => "1year",
        }
    }

    /// Fail-closed lookup: unknown slugs are an error instead of a raw pass-through.
    pub fn try_from_slug(slug: &str) -> Result<Self, UnknownPlanType> {
        lookup_alias(slug).ok_or_else(|| UnknownPlanType(slug.to_string()))
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlanType(pub String);

impl Display for UnknownPlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown plan type: {}", self.0)
    }
}

impl std::error::Error for UnknownPlanType {}

/// Result of [`PlanTypeMapper::normalize`]. Unrecognized slugs are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedPlanType {
    Canonical(PlanType),
    Unrecognized(String),
}

impl NormalizedPlanType {
    pub fn as_str(&self) -> &str {
        match self {
            NormalizedPlanType::Canonical(plan_type) => plan_type.as_str(),
            NormalizedPlanType::Unrecognized(raw) => raw.as_str(),
        }
    }

    pub fn canonical(&self) -> Option<PlanType> {
        match self {
            NormalizedPlanType::Canonical(plan_type) => Some(*plan_type),
            NormalizedPlanType::Unrecognized(_) => None,
        }
    }
}

const PLAN_TYPE_ALIASES: &[(&str, PlanType)] = &[
    ("1month", PlanType::OneMonth),
    ("1-month", PlanType::OneMonth),
    ("one_month", PlanType::OneMonth),
    ("monthly", PlanType::OneMonth),
    ("month", PlanType::OneMonth),
    ("1", PlanType::OneMonth),
    ("3months", PlanType::ThreeMonths),
    ("3-months", PlanType::ThreeMonths),
    ("three_months", PlanType::ThreeMonths),
    ("quarterly", PlanType::ThreeMonths),
    ("3", PlanType::ThreeMonths),
    ("6months", PlanType::SixMonths),
    ("6-months", PlanType::SixMonths),
    ("six_months", PlanType::SixMonths),
    ("semiannual", PlanType::SixMonths),
    ("half_yearly", PlanType::SixMonths),
    ("6", PlanType::SixMonths),
    ("1year", PlanType::OneYear),
    ("1-year", PlanType::OneYear),
    ("12months", PlanType::OneYear),
    ("one_year", PlanType::OneYear),
    ("yearly", PlanType::OneYear),
    ("annual", PlanType::OneYear),
    ("12", PlanType::OneYear),
];

fn lookup_alias(slug: &str) -> Option<PlanType> {
    let key = slug.trim().to_ascii_lowercase();
    PLAN_TYPE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, plan_type)| *plan_type)
}

/// Maps historical plan slugs onto [`PlanType`].
pub struct PlanTypeMapper;

impl PlanTypeMapper {
    /// Unknown slugs are passed through unchanged with a warning so legacy rows keep working.
    /// Use [`PlanType::try_from_slug`] where a canonical value is required.
    pub fn normalize(slug: &str) -> NormalizedPlanType {
        match lookup_alias(slug) {
            Some(plan_type) => NormalizedPlanType::Canonical(plan_type),
            None => {
                warn!(slug, "plan_types: unrecognized plan slug; using raw value");
                NormalizedPlanType::Unrecognized(slug.to_string())
            }
        }
    }

    pub fn aliases() -> impl Iterator<Item = &'static str> {
        PLAN_TYPE_ALIASES.iter().map(|(alias, _)| *alias)
    }
}
