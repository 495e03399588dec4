//! `campushub-courses` — course catalog and enrollment domain.

pub mod course;

pub use course::{Course, CourseId, CourseStatus};
