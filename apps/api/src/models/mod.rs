pub mod candidate;
pub mod context;
pub mod rubric;
