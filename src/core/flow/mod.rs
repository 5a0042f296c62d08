// Flow module - Multi-step command sequences
pub mod report;
pub mod runner;

pub use report::{FlowReport, FlowState};
pub use runner::FlowRunner;
