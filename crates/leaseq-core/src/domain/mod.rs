//! Domain model (IDs, queue names, tasks, errors).

pub mod errors;
pub mod ids;
pub mod task;

pub use errors::{LeaseqError, PersistError, ValidationError};
pub use ids::{ParseIdError, TaskId};
pub use task::{LeasedTask, QueueName, Sequence, Task};
