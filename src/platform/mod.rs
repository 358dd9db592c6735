pub mod coordinator;
pub mod dashboard;
pub mod guardian;
