pub mod analytics;
pub mod backup;
pub mod core;
pub mod exams;
pub mod files;
pub mod quizzes;
pub mod schedules;
pub mod social;
