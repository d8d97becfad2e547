pub mod monitor;
pub mod scheduler;

pub use monitor::{ChangeMonitor, ClassStats, CycleOutcome, CycleStats};
pub use scheduler::MonitorScheduler;
