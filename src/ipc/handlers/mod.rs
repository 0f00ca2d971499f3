pub mod core;
pub mod filters;
pub mod marks;
pub mod session;
pub mod students;
