//! Cron scheduling for gosuto's built-in gateways.
//!
//! Two pieces: a 5-field cron parser with a forward-occurrence search
//! ([`cron::CronSchedule`]), and a reconciler ([`manager::GatewayManager`])
//! that keeps one running job per configured cron gateway, posting ticks
//! into the local ACP event endpoint.

pub mod cron;
pub mod manager;

pub use cron::CronSchedule;
pub use manager::GatewayManager;
