pub mod commands;
pub mod controller;
pub mod pipeline;
pub mod state;

pub use controller::{JpegFrame, SessionController};
pub use pipeline::{FrameOutput, PipelineStep, SessionPipeline};
pub use state::{Session, SessionPhase, SessionSnapshot};
