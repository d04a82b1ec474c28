use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::value_objects::enums::plan_types::PlanType;

pub const PLAN_CURRENCY: &str = "INR";

/// Static catalog entry. Amounts are in minor units (paise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanDetails {
    pub plan_type: PlanType,
    pub amount_minor: i32,
    pub label: &'static str,
    pub duration_days: i64,
}

pub const MONTHLY_PLAN: PlanDetails = PlanDetails {
    plan_type: PlanType::Monthly,
    amount_minor: 29_900,
    label: "Monthly",
    duration_days: 30,
};

pub const YEARLY_PLAN: PlanDetails = PlanDetails {
    plan_type: PlanType::Yearly,
    amount_minor: 299_900,
    label: "Yearly",
    duration_days: 365,
};

pub fn plan_details(plan_type: PlanType) -> PlanDetails {
    match plan_type {
        PlanType::Monthly => MONTHLY_PLAN,
        PlanType::Yearly => YEARLY_PLAN,
    }
}

impl PlanDetails {
    /// Major-unit amount with two decimals, the shape the gateway expects.
    pub fn amount_display(&self) -> String {
        format_minor_amount(self.amount_minor)
    }

    pub fn purpose(&self) -> String {
        format!("SkillForge Premium - {}", self.label)
    }

    /// Subscription window starting at `starts_at`. `None` only on calendar overflow.
    pub fn subscription_window(
        &self,
        starts_at: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let ends_at = starts_at.checked_add_signed(Duration::days(self.duration_days))?;
        Some((starts_at, ends_at))
    }
}

pub fn format_minor_amount(amount_minor: i32) -> String {
    format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDto {
    pub plan_type: PlanType,
    pub label: &'static str,
    pub amount: String,
    pub currency: &'static str,
    pub duration_days: i64,
}

impl From<PlanDetails> for PlanDto {
    fn from(value: PlanDetails) -> Self {
        Self {
            plan_type: value.plan_type,
            label: value.label,
            amount: value.amount_display(),
            currency: PLAN_CURRENCY,
            duration_days: value.duration_days,
        }
    }
}

pub fn list_plans() -> Vec<PlanDto> {
    PlanType::ALL
        .into_iter()
        .map(|plan_type| PlanDto::from(plan_details(plan_type)))
        .collect()
}
