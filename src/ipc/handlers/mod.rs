pub mod backup;
pub mod calendar;
pub mod core;
pub mod exports;
pub mod profile;
pub mod schedules;
pub mod sessions;
pub mod stats;
pub mod students;
