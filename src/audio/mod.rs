pub mod backend;
pub mod encoder;
pub mod probe;
pub mod visualizer;

pub use backend::{AudioFrame, CaptureConstraints, CaptureError, FileBackend, MicrophoneBackend};
pub use encoder::{CaptureEncoder, EncodedFormat, RecordedAudio};
pub use visualizer::{VisualizationSample, Visualizer};
