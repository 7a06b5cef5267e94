pub mod correlation;
pub mod summary;
