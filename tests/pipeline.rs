use std::fs;

use gaze_trace::data::filter::{BoundingBox, IndexRange};
use gaze_trace::data::loader::load_file;
use gaze_trace::logger::{gaze_channel, GazeRecorder, GazeSample, LoggerConfig, SessionLogger};
use gaze_trace::replay::ReplayState;
use gaze_trace::{AnalysisConfig, AnalysisError, LogFormat, Point3, Session, Value};
use tempfile::TempDir;

const HEADER: &str =
    "timestamp,xpos,ypos,zpos,upos,vpos,wpos,EtPositionX,EtPositionY,EtPositionZ,FixatedObjectName";

/// Six samples: a tight cluster on the painting, one stray, one on the door.
fn write_session(dir: &TempDir) -> std::path::PathBuf {
    let rows = [
        "0.0,0,1.7,0,0,0,0,1.00,1.00,1.00,Painting",
        "0.5,0,1.7,0,0,0,0,1.01,1.00,1.00,Painting",
        "1.0,0,1.7,0,0,0,0,1.00,1.01,1.00,Painting",
        "1.5,0,1.7,0,0,0,0,1.00,1.00,1.01,Painting",
        "2.0,0,1.7,0,0,0,0,5.00,5.00,5.00,no data",
        "2.5,0,1.7,0,0,0,0,-2.0,1.00,3.00,Door",
    ];
    let path = dir.path().join("session.csv");
    fs::write(&path, format!("{HEADER}\r\n{}\r\n", rows.join("\r\n"))).unwrap();
    path
}

fn config() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.density.min_cluster_size = 3;
    config
}

#[test]
fn heatmap_output_carries_scores() {
    let dir = TempDir::new().unwrap();
    let input = write_session(&dir);
    let output = dir.path().join("scored.csv");

    let mut session = Session::load(&input, config()).unwrap();
    let report = session.score().unwrap();
    assert_eq!(report.clustered, 4);
    assert_eq!(report.below_threshold, 2);
    session.save_scored(&output).unwrap();

    let scored = load_file(&output, &LogFormat::csv()).unwrap();
    assert_eq!(scored.len(), 6);
    let columns = scored.columns();
    assert_eq!(
        &columns[columns.len() - 4..],
        ["neighbor_count", "nearest_distance", "intensity", "color"]
    );
    let first = scored.record(0).unwrap();
    assert_eq!(first.get("FixatedObjectName"), Some(&Value::Text("Painting".into())));
    assert_eq!(first.get("neighbor_count"), Some(&Value::Integer(3)));
    assert_eq!(first.get("intensity"), Some(&Value::Float(1.0)));
    let stray = scored.record(4).unwrap();
    assert_eq!(stray.get("neighbor_count"), Some(&Value::Integer(0)));
    assert_eq!(stray.get("color"), Some(&Value::Text("#808080".into())));
}

#[test]
fn culls_compose_before_scoring() {
    let dir = TempDir::new().unwrap();
    let input = write_session(&dir);
    let mut config = config();
    config.cull.range = Some(IndexRange { from: 1, to: 5 });
    config.cull.bounds = Some(BoundingBox::new(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 2.0, 2.0),
    ));

    let mut session = Session::load(&input, config).unwrap();
    assert_eq!(session.culled().len(), 3);
    // three painting samples left, each with two neighbours
    let report = session.score().unwrap();
    assert_eq!(report.clustered, 0);
    assert_eq!(report.max_neighbor_count, 2);
}

#[test]
fn culled_output_keeps_original_columns() {
    let dir = TempDir::new().unwrap();
    let input = write_session(&dir);
    let output = dir.path().join("culled.csv");
    let mut config = config();
    config.cull.range = Some(IndexRange { from: 4, to: 5 });

    Session::load(&input, config).unwrap().save_culled(&output).unwrap();
    let culled = load_file(&output, &LogFormat::csv()).unwrap();
    assert_eq!(culled.len(), 2);
    assert_eq!(culled.columns().len(), 11);
    assert_eq!(
        culled.record(1).unwrap().get("FixatedObjectName"),
        Some(&Value::Text("Door".into()))
    );
}

#[test]
fn duplicate_header_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dup.csv");
    fs::write(&path, "timestamp,xpos,xpos\n0,1,2\n").unwrap();
    let err = Session::load(&path, config()).err().unwrap();
    assert!(matches!(err, AnalysisError::DuplicateColumn(name) if name == "xpos"));
}

#[test]
fn replay_walks_the_recording() {
    let dir = TempDir::new().unwrap();
    let input = write_session(&dir);
    let session = Session::load(&input, config()).unwrap();
    let mut player = session.replayer().unwrap();

    assert_eq!(player.state(), ReplayState::Stopped);
    assert!(player.advance(0.5).is_none());
    player.toggle();
    assert_eq!(player.advance(0.5).unwrap().index, 1);
    assert_eq!(player.advance(0.5).unwrap().index, 2);

    player.toggle();
    assert_eq!(player.state(), ReplayState::Paused);
    assert!(player.advance(0.5).is_none());

    player.toggle();
    let last = player.advance(60.0).unwrap();
    assert_eq!(last.index, 5);
    assert_eq!(last.gaze, Some(Point3::new(-2.0, 1.0, 3.0)));
    assert_eq!(player.state(), ReplayState::Paused);

    player.reset();
    assert_eq!(player.cursor(), 0);
    assert_eq!(player.state(), ReplayState::Stopped);
}

#[test]
fn recorded_gaze_log_loads_back() {
    let dir = TempDir::new().unwrap();
    let mut logger = SessionLogger::new(LoggerConfig {
        save_location: dir.path().join("logs"),
        ..LoggerConfig::default()
    })
    .unwrap();

    let (tx, rx) = gaze_channel(16);
    let recorder = GazeRecorder::new(rx, "gaze", "tracker");
    recorder.attach(&mut logger).unwrap();
    tx.send(GazeSample {
        hit: true,
        point: Point3::new(1.5, 0.25, -2.0),
        object_name: Some("Painting".to_string()),
    })
    .unwrap();
    tx.send(GazeSample {
        hit: false,
        point: Point3::default(),
        object_name: None,
    })
    .unwrap();
    assert_eq!(recorder.drain(&mut logger).unwrap(), 2);
    logger.flush().unwrap();

    let path = logger.channel_path("gaze").unwrap().to_path_buf();
    let log = load_file(&path, &LogFormat::semicolon()).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log.columns()[0], "userId");
    let first = log.record(0).unwrap();
    assert_eq!(first.get("logId"), Some(&Value::Integer(1)));
    assert_eq!(first.get("origin"), Some(&Value::Text("tracker".into())));
    assert_eq!(first.get("EtPositionX"), Some(&Value::Float(1.5)));
    assert_eq!(first.get("EtPositionZ"), Some(&Value::Float(-2.0)));
    assert_eq!(
        log.record(1).unwrap().get("FixatedObjectName"),
        Some(&Value::Text("no data".into()))
    );
}
