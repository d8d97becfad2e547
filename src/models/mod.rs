pub mod change;
pub mod lesson;
pub mod user;

pub use change::{Change, ChangeType, InsertOutcome, StoredChange};
pub use lesson::{Lesson, SchoolDay, SubjectTeachers};
pub use user::{
    Language, RegisterRequest, TeacherPreferences, TestNotificationRequest,
    UpdatePreferencesRequest, User,
};
