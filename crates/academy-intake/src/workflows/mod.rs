pub mod certificates;
pub mod contact;
pub mod courses;
pub mod dashboard;
pub mod enrollment;
pub mod payments;
pub(crate) mod templates;
#[cfg(test)]
pub(crate) mod test_support;
pub mod verification;
