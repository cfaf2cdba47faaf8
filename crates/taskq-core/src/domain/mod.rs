//! Domain model (ids, status, task, outcome).

pub mod ids;
pub mod outcome;
pub mod state;
pub mod task;

pub use ids::{ParseTaskIdError, TaskId};
pub use outcome::JobOutput;
pub use state::TaskStatus;
pub use task::{Task, TaskRecord};
