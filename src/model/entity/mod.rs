mod user;
pub use user::{UserEntity, UserEntityCreateUpdate};

mod category;
pub use category::{Category, CategoryCreate};

mod course;
pub use course::{Course, CourseCreate};

mod lesson;
pub use lesson::{Lesson, LessonCreate, LessonVideo, LessonVideoError};

mod enrollment;
pub use enrollment::{Enrollment, PROGRESS_COMPLETE};

mod quiz;
pub use quiz::{Quiz, QuizCreate};

mod question;
pub use question::{
    AnswerDraft, Question, QuestionDraft, QuestionRuleViolation, QuestionType,
    UnknownQuestionType, validate_all,
};

mod answer;
pub use answer::Answer;
