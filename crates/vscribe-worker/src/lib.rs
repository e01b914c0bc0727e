//! Described-video recomposition worker.
//!
//! Takes a source video plus a model-emitted narration script, places
//! each description into the soundtrack's silences (freezing the frame
//! when nothing fits), and renders the recomposited program. Speech
//! synthesis and music generation are supplied by the host through the
//! [`SpeechSynthesizer`] and [`MusicGenerator`] traits.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod music;
pub mod pipeline;
pub mod render;
pub mod script;
pub mod synth;

pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::init_logging;
pub use music::MusicGenerator;
pub use pipeline::{DescribePipeline, PipelineOutput};
pub use script::{parse_script, NarrationScript};
pub use synth::{resolve_cues, SpeechSynthesizer};
