use std::path::Path;

use log::info;

use crate::color::{to_hex, HeatColors};
use crate::config::AnalysisConfig;
use crate::data::filter::cull;
use crate::data::loader::load_file;
use crate::data::model::{Dataset, Value};
use crate::data::writer::{save_file, DerivedColumn};
use crate::density::{score_dataset, trail_segments, DensityReport, TrailSegment};
use crate::error::Result;
use crate::replay::Replayer;

// ---------------------------------------------------------------------------
// Analysis session
// ---------------------------------------------------------------------------

/// One loaded log and everything derived from it, independent of any
/// front end.
pub struct Session {
    config: AnalysisConfig,
    colors: HeatColors,
    /// The log as ingested.
    dataset: Dataset,
    /// `dataset` after the configured culls.
    culled: Dataset,
    /// Density scores of `culled`, once computed.
    density: Option<DensityReport>,
}

impl Session {
    /// Take ownership of a dataset and apply the configured culls.
    pub fn new(dataset: Dataset, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let colors = config.heat_colors()?;
        let culled = if config.cull.is_empty() {
            dataset.clone()
        } else {
            let culled = cull(&dataset, &config.cull, &config.columns)?;
            info!("culled {} -> {} records", dataset.len(), culled.len());
            culled
        };
        Ok(Session {
            config,
            colors,
            dataset,
            culled,
            density: None,
        })
    }

    /// Load a log file with the configured separators.
    pub fn load(path: &Path, config: AnalysisConfig) -> Result<Self> {
        let dataset = load_file(path, &config.format)?;
        Self::new(dataset, config)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn culled(&self) -> &Dataset {
        &self.culled
    }

    pub fn density(&self) -> Option<&DensityReport> {
        self.density.as_ref()
    }

    /// Score the culled records. Cached after the first call.
    pub fn score(&mut self) -> Result<&DensityReport> {
        let report = match self.density.take() {
            Some(report) => report,
            None => score_dataset(&self.culled, &self.config.columns, &self.config.density)?,
        };
        Ok(self.density.insert(report))
    }

    /// Trail segments over the culled gaze points.
    pub fn trail(&self) -> Result<Vec<TrailSegment>> {
        let points = self.culled.points(&self.config.columns)?;
        Ok(trail_segments(&points, &self.config.trail))
    }

    /// Score columns appended to the culled records when writing results.
    pub fn derived_columns(&mut self) -> Result<Vec<DerivedColumn>> {
        let colors = self.colors;
        let report = self.score()?;
        let mut neighbors = Vec::with_capacity(report.scores.len());
        let mut nearest = Vec::with_capacity(report.scores.len());
        let mut intensity = Vec::with_capacity(report.scores.len());
        let mut color = Vec::with_capacity(report.scores.len());
        for s in &report.scores {
            neighbors.push(Value::Integer(s.neighbor_count as i64));
            nearest.push(if s.nearest_distance.is_finite() {
                Value::Float(s.nearest_distance)
            } else {
                Value::Text(String::new())
            });
            intensity.push(match s.intensity {
                Some(t) => Value::Float(t),
                None => Value::Text(String::new()),
            });
            color.push(Value::Text(to_hex(colors.color_for(s.intensity))));
        }
        Ok(vec![
            DerivedColumn::new("neighbor_count", neighbors),
            DerivedColumn::new("nearest_distance", nearest),
            DerivedColumn::new("intensity", intensity),
            DerivedColumn::new("color", color),
        ])
    }

    /// Write the culled records plus score columns.
    pub fn save_scored(&mut self, path: &Path) -> Result<()> {
        let derived = self.derived_columns()?;
        save_file(path, &self.culled, &derived, &self.config.format)
    }

    /// Write the culled records unchanged.
    pub fn save_culled(&self, path: &Path) -> Result<()> {
        save_file(path, &self.culled, &[], &self.config.format)
    }

    /// Player over the full log; culls do not apply.
    pub fn replayer(&self) -> Result<Replayer> {
        Replayer::new(&self.dataset, &self.config.replay)
    }
}
