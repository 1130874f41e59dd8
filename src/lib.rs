pub mod config;
pub mod detection;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod session;

pub use config::DetectorConfig;
pub use detection::{build_standard_pipeline, detect_shapes, ShapeDetector};
pub use error::{DetectError, Result};
pub use models::{
    BoundingBox, Contour, Detection, DetectionResult, HoughCircle, ShapeCounts, ShapeFeatures,
    ShapeLabel,
};
pub use pipeline::{DebugConfig, FrameData, Pipeline, PipelineContext, PipelineStep};
pub use report::{render_histogram, CountsReport};
pub use session::{run_capture, CaptureOptions, CaptureSummary, SharedCounts, StopReason};
