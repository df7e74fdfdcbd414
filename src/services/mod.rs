pub mod bootstrap;
pub mod event_planner;
pub mod password;
pub mod scan_checkin;
pub mod token;
