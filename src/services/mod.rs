//! Supporting services
//!
//! Local filesystem concerns that sit next to the orchestration core.

pub mod uploads;
