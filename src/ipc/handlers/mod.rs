pub mod core;
pub mod grades;
