//! The per-turn orchestration pipeline.

pub mod background;
pub mod turn;
pub mod wav;

pub use background::BackgroundTasks;
pub use turn::TurnPipeline;
