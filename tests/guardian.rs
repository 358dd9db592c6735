#[path = "guardian/restart_schedule.rs"]
mod restart_schedule;
