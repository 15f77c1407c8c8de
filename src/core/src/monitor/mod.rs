mod station;
mod status;
mod supervisor;

pub use station::{
    Clock, CycleOutcome, HistoryOutcome, StationMonitor, SystemClock, TargetOutcome, TargetResult,
    TargetWriter,
};
pub use status::{StatusHandle, StatusRegistry};
pub use supervisor::{Collaborators, MonitorSupervisor};
