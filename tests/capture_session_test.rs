//! Integration tests for a complete capture session written to disk.

use rig_capture::capture::{CaptureEngine, CaptureState, OutputTarget, Progress, TickOutcome};
use rig_capture::data::CSV_HEADER;
use rig_capture::error::RigError;
use rig_capture::hardware::mock::MockTrigger;
use rig_capture::sensor::{CalibrationStore, FrameParser, LiveValueCache};
use std::path::Path;

/// Helper returning the non-empty lines of a CSV file.
fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("Failed to read CSV file")
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[test]
fn test_two_fps_for_one_second() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("session.csv");
    let mut engine = CaptureEngine::new(OutputTarget::new(dir.path(), "sensor_data"));
    let trigger = MockTrigger::new();
    let mut trigger_handle = trigger.clone();

    let mut parser = FrameParser::new();
    let mut cache = LiveValueCache::new();
    let calibration = CalibrationStore::new();
    let frame = parser.feed(b"10,20,30\n").expect("Frame should parse");
    cache.update(frame);

    engine.start_at(2.0, 1.0, &path).expect("Failed to start capture");

    let first = engine.on_tick(cache.reading(&calibration), &mut trigger_handle);
    assert!(matches!(first, TickOutcome::Captured(_)));
    let second = engine.on_tick(cache.reading(&calibration), &mut trigger_handle);
    assert!(matches!(
        second,
        TickOutcome::Completed(Progress {
            frames_captured: 2,
            total_frames: 2
        })
    ));
    assert_eq!(engine.state(), CaptureState::Completed);
    assert_eq!(trigger.count(), 2);

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 3, "header plus two rows");
    assert_eq!(lines[0], CSV_HEADER.join(","));
    assert_eq!(
        lines[0],
        "Timestamp,Top Left,Top Right,Bottom Left,Top Left w/o Zero,Top Right w/o Zero,Bottom Left w/o Zero"
    );
    for row in &lines[1..] {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 7);
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(fields[0].len(), 23, "timestamp '{}'", fields[0]);
        assert_eq!(&fields[0][19..20], ".");
        // Calibrated then raw, each as top left, top right, bottom left.
        assert_eq!(&fields[1..], ["20", "30", "10", "20", "30", "10"]);
    }
}

#[test]
fn test_zeroed_values_in_calibrated_columns() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("zeroed.csv");
    let mut engine = CaptureEngine::new(OutputTarget::new(dir.path(), "sensor_data"));
    let mut trigger = MockTrigger::new();

    let mut cache = LiveValueCache::new();
    let mut calibration = CalibrationStore::new();
    let mut parser = FrameParser::new();

    cache.update(parser.feed(b"30,50,40").expect("Frame should parse"));
    calibration.zero(cache.calibrated(&calibration));
    cache.update(parser.feed(b"30,55,40").expect("Frame should parse"));

    engine.start_at(1.0, 1.0, &path).expect("Failed to start capture");
    engine.on_tick(cache.reading(&calibration), &mut trigger);

    let lines = read_lines(&path);
    let fields: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(&fields[1..], ["5", "0", "0", "55", "40", "30"]);
}

#[test]
fn test_row_count_matches_rounded_product() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut trigger = MockTrigger::new();

    for (fps, secs, expected) in [(3.3, 3.0, 10u64), (2.5, 1.0, 3), (10.0, 0.55, 6)] {
        let path = dir.path().join(format!("{fps}x{secs}.csv"));
        let mut engine = CaptureEngine::new(OutputTarget::new(dir.path(), "sensor_data"));
        engine.start_at(fps, secs, &path).expect("Failed to start capture");

        let mut ticks = 0;
        while engine.is_running() {
            engine.on_tick(Default::default(), &mut trigger);
            ticks += 1;
            assert!(ticks <= expected + 1, "session did not end");
        }

        assert_eq!(engine.progress().frames_captured, expected);
        assert_eq!(read_lines(&path).len() as u64, expected + 1);
    }
}

#[test]
fn test_restart_cancels_previous_session() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");
    let mut engine = CaptureEngine::new(OutputTarget::new(dir.path(), "sensor_data"));
    let mut trigger = MockTrigger::new();

    engine.start_at(10.0, 1.0, &first).expect("Failed to start first capture");
    for _ in 0..3 {
        engine.on_tick(Default::default(), &mut trigger);
    }
    engine.start_at(2.0, 1.0, &second).expect("Failed to start second capture");

    assert_eq!(read_lines(&first).len(), 4);
    assert_eq!(
        engine.progress(),
        Progress {
            frames_captured: 0,
            total_frames: 2
        }
    );

    engine.on_tick(Default::default(), &mut trigger);
    engine.on_tick(Default::default(), &mut trigger);
    assert_eq!(engine.state(), CaptureState::Completed);
    assert_eq!(read_lines(&first).len(), 4, "old file must not grow");
    assert_eq!(read_lines(&second).len(), 3);
}

#[test]
fn test_open_failure_leaves_engine_idle() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut engine = CaptureEngine::new(OutputTarget::new(dir.path(), "sensor_data"));
    let mut trigger = MockTrigger::new();

    // A directory cannot be opened as a file.
    let err = engine
        .start_at(2.0, 1.0, dir.path())
        .expect_err("Start should fail");
    assert!(matches!(err, RigError::CsvOpen { .. }));
    assert!(err.is_user_visible());
    assert_eq!(engine.state(), CaptureState::Idle);
    assert!(matches!(
        engine.on_tick(Default::default(), &mut trigger),
        TickOutcome::Inactive
    ));
    assert_eq!(trigger.count(), 0);
}

#[test]
fn test_stop_twice_is_harmless() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("stopped.csv");
    let mut engine = CaptureEngine::new(OutputTarget::new(dir.path(), "sensor_data"));
    let mut trigger = MockTrigger::new();

    engine.start_at(5.0, 2.0, &path).expect("Failed to start capture");
    engine.on_tick(Default::default(), &mut trigger);
    assert!(engine.stop());
    assert!(!engine.stop());

    engine.on_tick(Default::default(), &mut trigger);
    assert_eq!(engine.state(), CaptureState::Cancelled);
    assert_eq!(read_lines(&path).len(), 2);
    assert_eq!(trigger.count(), 1);
}
