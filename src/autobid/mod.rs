pub mod discovery;
pub mod executor;
pub mod orchestrator;
pub mod pacing;
