//! Playback of a recorded session against an external clock.
//!
//! The caller drives time: each [`Replayer::advance`] call adds the elapsed
//! wall-clock time (scaled by the playback speed) and moves a row cursor
//! forward over the recorded timestamps. The cursor never moves backwards
//! except through [`Replayer::reset`] or the reset-based
//! [`Replayer::skip_backward`].

use std::collections::VecDeque;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::data::model::{ColumnTriple, Dataset, Point3};
use crate::error::{AnalysisError, Result};

/// Slowest playback speed reachable with [`Replayer::speed_down`].
pub const MIN_SPEED: f64 = 0.1;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which columns hold the replayed quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayColumns {
    pub position: ColumnTriple,
    pub rotation: ColumnTriple,
    pub gaze: ColumnTriple,
    /// Seconds (unix epoch or session relative).
    pub timestamp: String,
    /// Optional millisecond part, added as `ms / 1000`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milliseconds: Option<String>,
}

impl Default for ReplayColumns {
    fn default() -> Self {
        ReplayColumns {
            position: ColumnTriple::position(),
            rotation: ColumnTriple::rotation(),
            gaze: ColumnTriple::gaze(),
            timestamp: "timestamp".to_string(),
            milliseconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub columns: ReplayColumns,
    /// Emit gaze points and the gaze trail.
    pub show_gaze: bool,
    /// Number of recent gaze points kept for the trail (2..=100).
    pub trail_length: usize,
    /// Relative speed change per speed-up / speed-down step.
    pub speed_step: f64,
    /// Default jump for skip forward / backward, in seconds.
    pub skip_seconds: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            columns: ReplayColumns::default(),
            show_gaze: true,
            trail_length: 10,
            speed_step: 0.1,
            skip_seconds: 5.0,
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<()> {
        if !(2..=100).contains(&self.trail_length) {
            return Err(AnalysisError::Config(format!(
                "trail_length must be in [2, 100], got {}",
                self.trail_length
            )));
        }
        if !(self.speed_step > 0.0 && self.speed_step < 1.0) {
            return Err(AnalysisError::Config(format!(
                "speed_step must be in (0, 1), got {}",
                self.speed_step
            )));
        }
        if !(self.skip_seconds.is_finite() && self.skip_seconds > 0.0) {
            return Err(AnalysisError::Config(format!(
                "skip_seconds must be positive, got {}",
                self.skip_seconds
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// State & frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplayState {
    /// At the first row, clock at the first timestamp.
    Stopped,
    Playing,
    /// Stopped with the cursor kept where it was.
    Paused,
}

/// What a renderer needs for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayFrame {
    pub index: usize,
    /// Recorded timestamp of the row under the cursor.
    pub timestamp: f64,
    /// Playback clock relative to the first row.
    pub elapsed: f64,
    pub position: Point3,
    pub rotation: Point3,
    pub gaze: Option<Point3>,
    /// Most recent gaze points, oldest first.
    pub trail: Vec<Point3>,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp: f64,
    position: Point3,
    rotation: Point3,
    gaze: Option<Point3>,
}

// ---------------------------------------------------------------------------
// Replayer
// ---------------------------------------------------------------------------

pub struct Replayer {
    samples: Vec<Sample>,
    state: ReplayState,
    cursor: usize,
    clock: f64,
    speed: f64,
    speed_step: f64,
    skip_seconds: f64,
    show_gaze: bool,
    trail_length: usize,
    trail: VecDeque<Point3>,
}

impl Replayer {
    /// Resolve every configured column up front and copy the replayed
    /// quantities out of the dataset.
    ///
    /// Fails on the first absent column or on a position, rotation or
    /// timestamp that is not a finite number. A non-numeric gaze cell is a
    /// sample without a gaze hit.
    pub fn new(dataset: &Dataset, config: &ReplayConfig) -> Result<Self> {
        config.validate()?;
        let cols = &config.columns;
        let ts_idx = dataset.column_index(&cols.timestamp)?;
        let ms_idx = cols
            .milliseconds
            .as_deref()
            .map(|c| dataset.column_index(c))
            .transpose()?;
        let pos_idx = cols.position.resolve(dataset)?;
        let rot_idx = cols.rotation.resolve(dataset)?;
        let gaze_idx = if config.show_gaze {
            Some(cols.gaze.resolve(dataset)?)
        } else {
            None
        };

        let mut samples = Vec::with_capacity(dataset.len());
        for row in 0..dataset.len() {
            let mut timestamp = dataset.numeric(row, ts_idx)?;
            if let Some(ms) = ms_idx {
                timestamp += dataset.numeric(row, ms)? / 1000.0;
            }
            let gaze = gaze_idx.and_then(|idx| dataset.point_at(row, idx).ok());
            samples.push(Sample {
                timestamp,
                position: dataset.point_at(row, pos_idx)?,
                rotation: dataset.point_at(row, rot_idx)?,
                gaze,
            });
        }
        debug!("replay: {} samples ready", samples.len());

        let mut replayer = Replayer {
            samples,
            state: ReplayState::Stopped,
            cursor: 0,
            clock: 0.0,
            speed: 1.0,
            speed_step: config.speed_step,
            skip_seconds: config.skip_seconds,
            show_gaze: config.show_gaze,
            trail_length: config.trail_length,
            trail: VecDeque::with_capacity(config.trail_length),
        };
        replayer.reset();
        Ok(replayer)
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Cursor on the last row and the clock at or past its timestamp.
    pub fn is_finished(&self) -> bool {
        match self.samples.last() {
            Some(last) => self.cursor + 1 == self.samples.len() && self.clock >= last.timestamp,
            None => true,
        }
    }

    /// Playback clock relative to the first row.
    pub fn elapsed(&self) -> f64 {
        self.clock - self.start_time()
    }

    /// Start / stop toggle: Playing → Paused, Stopped / Paused → Playing.
    pub fn toggle(&mut self) -> ReplayState {
        if self.samples.is_empty() {
            warn!("replay: nothing to play");
            return self.state;
        }
        self.state = match self.state {
            ReplayState::Playing => ReplayState::Paused,
            ReplayState::Stopped | ReplayState::Paused => ReplayState::Playing,
        };
        debug!("replay: {:?} at row {}", self.state, self.cursor);
        self.state
    }

    /// Back to the first row, stopped. Playback speed is kept.
    pub fn reset(&mut self) {
        self.state = ReplayState::Stopped;
        self.cursor = 0;
        self.clock = self.start_time();
        self.trail.clear();
        self.push_trail(0);
    }

    /// Advance the clock by `elapsed` seconds of wall-clock time.
    ///
    /// Returns the frame to show, or `None` when not playing. Reaching the
    /// last row pauses playback.
    pub fn advance(&mut self, elapsed: f64) -> Option<ReplayFrame> {
        if self.state != ReplayState::Playing {
            return None;
        }
        if elapsed.is_finite() && elapsed > 0.0 {
            self.clock += elapsed * self.speed;
        }
        self.move_forward();
        let frame = self.frame();
        self.pause_at_end();
        frame
    }

    /// Frame for the row under the cursor, in any state.
    pub fn frame(&self) -> Option<ReplayFrame> {
        let sample = self.samples.get(self.cursor)?;
        Some(ReplayFrame {
            index: self.cursor,
            timestamp: sample.timestamp,
            elapsed: self.elapsed(),
            position: sample.position,
            rotation: sample.rotation,
            gaze: if self.show_gaze { sample.gaze } else { None },
            trail: self.trail.iter().copied().collect(),
        })
    }

    pub fn speed_up(&mut self) -> f64 {
        self.speed *= 1.0 + self.speed_step;
        self.speed
    }

    pub fn speed_down(&mut self) -> f64 {
        self.speed = (self.speed * (1.0 - self.speed_step)).max(MIN_SPEED);
        self.speed
    }

    /// Jump ahead by `seconds` (the configured skip when `None`).
    pub fn skip_forward(&mut self, seconds: Option<f64>) {
        if self.samples.is_empty() {
            return;
        }
        let seconds = seconds.unwrap_or(self.skip_seconds).max(0.0);
        self.clock += seconds;
        self.move_forward();
        // Stopped means the clock sits on the first row.
        if self.state == ReplayState::Stopped && seconds > 0.0 {
            self.state = ReplayState::Paused;
        }
        self.pause_at_end();
    }

    /// Jump back by `seconds`: reset, then scan forward to the target time.
    /// The play state is kept.
    pub fn skip_backward(&mut self, seconds: Option<f64>) {
        if self.samples.is_empty() {
            return;
        }
        let seconds = seconds.unwrap_or(self.skip_seconds).max(0.0);
        let target = (self.clock - seconds).max(self.start_time());
        let state = self.state;
        self.reset();
        self.clock = target;
        self.move_forward();
        self.state = match state {
            ReplayState::Stopped if self.cursor > 0 => ReplayState::Paused,
            other => other,
        };
    }

    /// Jump to the last row and pause there.
    pub fn seek_end(&mut self) {
        let Some(last) = self.samples.last() else {
            return;
        };
        self.clock = self.clock.max(last.timestamp);
        self.move_forward();
        if self.state != ReplayState::Stopped || self.cursor > 0 {
            self.state = ReplayState::Paused;
        }
    }

    fn start_time(&self) -> f64 {
        self.samples.first().map(|s| s.timestamp).unwrap_or(0.0)
    }

    fn move_forward(&mut self) {
        while self.cursor + 1 < self.samples.len()
            && self.samples[self.cursor + 1].timestamp <= self.clock
        {
            self.cursor += 1;
            self.push_trail(self.cursor);
        }
    }

    fn push_trail(&mut self, row: usize) {
        if !self.show_gaze {
            return;
        }
        if let Some(gaze) = self.samples.get(row).and_then(|s| s.gaze) {
            if self.trail.len() == self.trail_length {
                self.trail.pop_front();
            }
            self.trail.push_back(gaze);
        }
    }

    fn pause_at_end(&mut self) {
        if self.state == ReplayState::Playing && self.is_finished() {
            info!("replay: finished at row {}", self.cursor);
            self.state = ReplayState::Paused;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Value;

    fn session(timestamps: &[f64]) -> Dataset {
        let columns = [
            "timestamp", "xpos", "ypos", "zpos", "upos", "vpos", "wpos", "EtPositionX",
            "EtPositionY", "EtPositionZ",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        let rows = timestamps
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let f = i as f64;
                vec![
                    Value::Float(t),
                    Value::Float(f),
                    Value::Float(1.7),
                    Value::Float(0.0),
                    Value::Float(0.0),
                    Value::Float(f * 10.0),
                    Value::Float(0.0),
                    Value::Float(f),
                    Value::Float(1.0),
                    Value::Float(2.0),
                ]
            })
            .collect();
        Dataset::from_rows(columns, rows)
    }

    fn replayer(timestamps: &[f64]) -> Replayer {
        Replayer::new(&session(timestamps), &ReplayConfig::default()).unwrap()
    }

    #[test]
    fn cursor_moves_once_a_full_second_accumulates() {
        let mut r = replayer(&[0.0, 1.0, 2.0, 3.0]);
        r.toggle();
        assert_eq!(r.advance(0.5).unwrap().index, 0);
        assert_eq!(r.advance(0.5).unwrap().index, 1);
        assert_eq!(r.advance(0.5).unwrap().index, 1);
        assert_eq!(r.advance(0.5).unwrap().index, 2);
    }

    #[test]
    fn absolute_timestamps_are_relative_to_first_row() {
        let mut r = replayer(&[1_650_000_000.0, 1_650_000_001.0]);
        r.toggle();
        let frame = r.advance(1.0).unwrap();
        assert_eq!(frame.index, 1);
        assert_eq!(frame.elapsed, 1.0);
    }

    #[test]
    fn toggle_and_reset_transitions() {
        let mut r = replayer(&[0.0, 1.0, 2.0]);
        assert_eq!(r.state(), ReplayState::Stopped);
        assert!(r.advance(1.0).is_none());

        assert_eq!(r.toggle(), ReplayState::Playing);
        r.advance(1.0);
        assert_eq!(r.toggle(), ReplayState::Paused);
        assert!(r.advance(5.0).is_none());
        assert_eq!(r.cursor(), 1);

        assert_eq!(r.toggle(), ReplayState::Playing);
        r.reset();
        assert_eq!(r.state(), ReplayState::Stopped);
        assert_eq!(r.cursor(), 0);
        assert_eq!(r.elapsed(), 0.0);
    }

    #[test]
    fn playback_pauses_at_last_row() {
        let mut r = replayer(&[0.0, 1.0]);
        r.toggle();
        let frame = r.advance(3.0).unwrap();
        assert_eq!(frame.index, 1);
        assert_eq!(r.state(), ReplayState::Paused);
        assert!(r.is_finished());
    }

    #[test]
    fn negative_elapsed_never_rewinds() {
        let mut r = replayer(&[0.0, 1.0, 2.0]);
        r.toggle();
        r.advance(1.0);
        r.advance(-10.0);
        assert_eq!(r.cursor(), 1);
        assert_eq!(r.elapsed(), 1.0);
    }

    #[test]
    fn trail_window_is_bounded() {
        let timestamps: Vec<f64> = (0..30).map(f64::from).collect();
        let config = ReplayConfig {
            trail_length: 4,
            ..ReplayConfig::default()
        };
        let mut r = Replayer::new(&session(&timestamps), &config).unwrap();
        r.toggle();
        let mut frame = None;
        for _ in 0..10 {
            frame = r.advance(1.0);
        }
        let frame = frame.unwrap();
        assert_eq!(frame.index, 10);
        let xs: Vec<f64> = frame.trail.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![7.0, 8.0, 9.0, 10.0]);
        assert_eq!(frame.gaze, Some(Point3::new(10.0, 1.0, 2.0)));
        assert_eq!(frame.rotation.y, 100.0);
    }

    #[test]
    fn speed_scales_the_clock() {
        let mut r = replayer(&[0.0, 1.0, 2.0, 3.0]);
        r.speed_up();
        assert!((r.speed() - 1.1).abs() < 1e-12);
        for _ in 0..40 {
            r.speed_down();
        }
        assert_eq!(r.speed(), MIN_SPEED);
        r.toggle();
        r.advance(10.0);
        assert_eq!(r.cursor(), 1);
    }

    #[test]
    fn skips_move_the_cursor() {
        let timestamps: Vec<f64> = (0..20).map(f64::from).collect();
        let mut r = replayer(&timestamps);
        r.skip_forward(None);
        assert_eq!(r.cursor(), 5);
        assert_eq!(r.state(), ReplayState::Paused);

        r.skip_forward(Some(7.0));
        assert_eq!(r.cursor(), 12);

        r.skip_backward(Some(4.5));
        assert_eq!(r.cursor(), 7);
        assert_eq!(r.state(), ReplayState::Paused);

        r.seek_end();
        assert_eq!(r.cursor(), 19);
        assert!(r.is_finished());
    }

    #[test]
    fn short_skip_from_stopped_pauses() {
        let mut r = replayer(&[0.0, 10.0]);
        r.skip_forward(Some(2.0));
        assert_eq!(r.cursor(), 0);
        assert_eq!(r.elapsed(), 2.0);
        assert_eq!(r.state(), ReplayState::Paused);
        r.toggle();
        assert_eq!(r.advance(8.0).unwrap().index, 1);
    }

    #[test]
    fn non_finite_timestamps_fail_at_construction() {
        for bad in [f64::NAN, f64::INFINITY] {
            let err = Replayer::new(&session(&[0.0, bad, 2.0]), &ReplayConfig::default())
                .err()
                .unwrap();
            assert!(
                matches!(err, AnalysisError::NonNumeric { row: 1, ref column, .. } if column == "timestamp")
            );
        }
    }

    #[test]
    fn empty_dataset_stays_stopped() {
        let mut r = replayer(&[]);
        assert_eq!(r.toggle(), ReplayState::Stopped);
        assert!(r.advance(1.0).is_none());
        assert!(r.frame().is_none());
        r.seek_end();
        assert_eq!(r.state(), ReplayState::Stopped);
    }

    #[test]
    fn missing_column_fails_at_construction() {
        let config = ReplayConfig {
            columns: ReplayColumns {
                timestamp: "time".to_string(),
                ..ReplayColumns::default()
            },
            ..ReplayConfig::default()
        };
        let err = Replayer::new(&session(&[0.0]), &config).err().unwrap();
        assert!(matches!(err, AnalysisError::MissingColumn(c) if c == "time"));
    }

    #[test]
    fn milliseconds_column_refines_timestamps() {
        let ds = Dataset::from_rows(
            ["timestamp", "ms", "xpos", "ypos", "zpos", "upos", "vpos", "wpos"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            vec![
                [10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
                    .map(Value::Float)
                    .to_vec(),
                [10.0, 500.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]
                    .map(Value::Float)
                    .to_vec(),
            ],
        );
        let config = ReplayConfig {
            show_gaze: false,
            columns: ReplayColumns {
                milliseconds: Some("ms".to_string()),
                ..ReplayColumns::default()
            },
            ..ReplayConfig::default()
        };
        let mut r = Replayer::new(&ds, &config).unwrap();
        r.toggle();
        assert_eq!(r.advance(0.25).unwrap().index, 0);
        let frame = r.advance(0.25).unwrap();
        assert_eq!(frame.index, 1);
        assert!(frame.gaze.is_none());
        assert!(frame.trail.is_empty());
    }

    #[test]
    fn trail_length_is_validated() {
        let config = ReplayConfig {
            trail_length: 1,
            ..ReplayConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
