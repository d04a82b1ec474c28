pub mod entitlement_sources;
pub mod payment_statuses;
pub mod plan_types;
pub mod roles;
