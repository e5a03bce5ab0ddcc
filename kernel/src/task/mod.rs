//! Process table, scheduling decision and admission control.

pub mod admission;
pub mod clock;
pub mod policy;
pub mod process;
pub mod scheduler;
pub mod wait;
