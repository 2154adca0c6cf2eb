pub mod maintenance;
pub mod memory;
pub mod model;
pub mod repository;

pub use maintenance::reset_jobs;
pub use memory::MemoryJobStore;
pub use model::{FileType, Job, JobStatus, JobUpdate, NewJob, NewVideo, Video};
pub use repository::{JobStore, PgJobStore, StoreError, StoreResult};
