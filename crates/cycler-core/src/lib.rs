pub mod config;
pub mod schedule;
pub mod types;

pub use config::{CyclerConfig, SelectionConfig, TaskConfig};
pub use schedule::{Schedule, ScheduleError};
pub use types::*;
