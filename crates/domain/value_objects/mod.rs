pub mod challenge_grades;
pub mod entitlements;
pub mod enums;
pub mod payments;
pub mod plans;
