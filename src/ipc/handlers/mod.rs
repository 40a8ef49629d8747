pub mod core;
pub mod courses;
pub mod grades;
pub mod reports;
pub mod students;
