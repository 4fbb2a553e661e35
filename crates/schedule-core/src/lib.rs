pub mod calculations;
pub mod calendar;
pub mod graph;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod metadata;
pub mod persistence;
pub mod resource;
pub mod schedule;
pub mod task;
pub(crate) mod task_validation;

pub use calendar::{WorkCalendar, WorkCalendarConfig};
pub use metadata::ScheduleMetadata;
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteScheduleStore;
pub use persistence::{
    PersistenceError, ScheduleStore, load_schedule_from_csv, load_schedule_from_json,
    save_schedule_to_csv, save_schedule_to_json, validate_schedule, validate_tasks,
};
pub use resource::ResourceAllocation;
pub use schedule::{RefreshSummary, Schedule, ScheduleMetadataError};
pub use task::{ProgressMeasurement, ProgressRationaleTemplate, RationaleItem, Task};
