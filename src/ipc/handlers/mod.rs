pub mod assignments;
pub mod core;
pub mod dashboard;
pub mod notifications;
pub mod subjects;
