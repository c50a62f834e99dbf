//! Scoring engines and their configuration.
//!
//! One engine per task family, all behind the [`ScoringEngine`] contract;
//! [`get_scoring_engine`] maps a competition's configuration to the right
//! engine. Engines never error across `score()`: bad input produces a
//! failed [`ScoringResult`] with the accumulated logs attached.

mod classification;
mod config;
pub mod custom;
mod detection;
mod engine;
mod factory;
mod result;
mod segmentation;

pub use classification::ClassificationEngine;
pub use config::{ConfigError, MetricType, ScoringConfig, ScriptConfig, TaskType};
pub use custom::{CustomEngine, ScoringScript, ScriptHost, ScriptLogger, ScriptOutcome, ScriptRegistry};
pub use detection::DetectionEngine;
pub use engine::{EngineBase, EngineError, LogLevel, ScoringEngine};
pub use factory::get_scoring_engine;
pub use result::ScoringResult;
pub use segmentation::SegmentationEngine;
