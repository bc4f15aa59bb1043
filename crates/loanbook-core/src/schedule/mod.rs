pub mod dates;
pub mod generator;
