pub mod domain;
pub mod grading;
pub mod infra;
pub mod observability;
pub mod payments;
