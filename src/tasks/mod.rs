pub mod models;
pub mod organizer;
pub mod persistence;
pub mod store;

pub use models::{Task, TaskStats};
pub use organizer::{organize, AppGroup, OrganizedView, TypeGroup, ViewMode};
pub use persistence::{JsonFilePersistence, TaskPersistence};
pub use store::{ActivityOutcome, MatchKind, TaskStore};
