pub mod courses;
pub mod enrollments;
pub mod lessons;
pub mod quizzes;
pub mod uploads;
