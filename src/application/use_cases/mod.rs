pub mod compliance;
pub mod extraction;
pub mod generator;
pub mod recovery;
