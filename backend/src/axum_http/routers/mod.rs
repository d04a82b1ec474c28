pub mod admin;
pub mod challenges;
pub mod payments;
pub mod premium;
