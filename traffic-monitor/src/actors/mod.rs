// traffic-monitor/src/actors/mod.rs

pub mod monitor_actor;
pub mod session_actor;
