pub mod aging;
pub mod summary;
