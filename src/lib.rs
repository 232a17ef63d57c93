//! Offline analysis of eye-tracking session logs.
//!
//! A session log is a delimited text file whose header names the columns
//! and whose rows are gaze samples. The library loads such logs, culls
//! them by index range or bounding box, scores every gaze point by local
//! density for heatmap colouring, replays the recorded trajectory on a
//! clock, and writes new session logs.
//!
//! ```text
//!  log file ──► data::loader ──► Dataset ──► data::filter ──► density ──► data::writer
//!                                   │
//!                                   └──────► replay (Stopped / Playing / Paused)
//!
//!  gaze samples ──► logger::GazeRecorder ──► logger::SessionLogger ──► log file
//! ```

pub mod color;
pub mod config;
pub mod data;
pub mod density;
pub mod error;
pub mod logger;
pub mod replay;
pub mod session;

pub use config::AnalysisConfig;
pub use data::model::{ColumnTriple, Dataset, LogFormat, Point3, Record, Value};
pub use error::{AnalysisError, Result};
pub use session::Session;
