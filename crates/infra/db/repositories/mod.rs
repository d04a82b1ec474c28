pub mod entitlements;
pub mod payment_records;
pub mod reconciliation_incidents;
pub mod user_roles;
