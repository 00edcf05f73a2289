pub mod engine;
pub mod error;
pub mod instance;
pub mod inventory;
pub mod payload;
pub mod persistence;
pub mod queue;
pub mod registry;
pub mod schedule;
pub mod schema;
pub mod time;
pub mod types;
pub mod workflow;

pub use engine::{Clock, FixedClock, SubmissionEngine, SystemClock};
pub use error::{
    PersistenceError, QueueError, RegistryError, Result, SubmissionError, ValidationError,
};
pub use persistence::{MemoryStorage, SeedData, Storage};
pub use queue::{ChannelSink, LogSink, NotificationSink};
pub use registry::{InstanceRegistry, MemoryRegistry};
pub use schedule::SchedulingPolicy;
pub use types::{JobId, JobRecord, JobSubmission, WorkflowDefinition};
