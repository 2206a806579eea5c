pub mod batches;
pub mod catalog;
pub mod core;
pub mod exchange;
pub mod library;
pub mod performance;
pub mod profile;
pub mod students;
pub mod subjects;
