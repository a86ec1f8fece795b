//! Job domain — models, completion coordination, and task fan-out.

pub mod coordinator;
pub mod dispatcher;
pub mod model;

pub use coordinator::Coordinator;
pub use dispatcher::Dispatcher;
pub use model::{Job, JobStatus, Operation, TaskOutcome};
