pub mod challenge_grading;
pub mod entitlements;
pub mod payments;

#[cfg(test)]
pub(crate) mod test_support;
