use std::fs::File;
use std::io::BufWriter;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use talaria_core::config::{WINDOW_SAMPLES, WINDOW_SECS};
use talaria_core::source::{JobInfo, SensorInfo, SensorReading};
use talaria_core::{DateRange, MemorySource, SampleReader, SampleWriter, SamplingConfig, run_project};

const PROJECT: u32 = 7;
const DAYS: i64 = 100;

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
    )
}

fn sensor(id: u32, name: &str) -> SensorInfo {
    SensorInfo {
        id,
        name: name.into(),
        created_at: epoch(),
        modified_at: epoch(),
    }
}

/// Six-hourly readings over `DAYS` days, starting `offset_days` after the epoch
fn readings(offset_days: i64, base: f64) -> Vec<SensorReading> {
    (0..DAYS * 4)
        .map(|i| SensorReading {
            timestamp: epoch() + Duration::days(offset_days) + Duration::hours(6 * i),
            raw: base + (i as f64 * 0.1).sin() * 10.0,
            engineering: base / 100.0,
        })
        .collect()
}

fn group(source: &mut MemorySource, job: u32, first_id: u32, prefix: &str) {
    for (offset, suffix) in ["r1", "r2", "v1", "v2"].iter().enumerate() {
        let id = first_id + offset as u32;
        source.add_sensor(job, sensor(id, &format!("{prefix} {suffix}")));
    }
}

fn project() -> MemorySource {
    let mut source = MemorySource::new();
    source.add_job(PROJECT, JobInfo { id: 1, name: "Bridge".into() });
    source.add_job(PROJECT, JobInfo { id: 2, name: "Bridge (copy)".into() });

    group(&mut source, 1, 1, "Pier A");
    group(&mut source, 2, 1, "Pier A");
    group(&mut source, 2, 10, "Pier B");
    source.add_sensor(1, sensor(20, "Deck r1"));
    source.add_sensor(1, sensor(21, "Thermistor"));

    for id in 1..=4 {
        source.add_readings(id, readings(0, 1000.0 * id as f64));
    }
    source
}

#[test]
fn test_run_project_writes_windows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("samples.bin");
    let config = SamplingConfig::default();

    let mut writer = SampleWriter::new(BufWriter::new(File::create(&path).unwrap()));
    let summary = run_project(&project(), PROJECT, range(), &config, &mut writer).unwrap();
    drop(writer.into_inner().unwrap());

    // Pier A appears in both jobs, Pier B has no readings, Deck is incomplete
    assert_eq!(summary.groups, 2);
    assert_eq!(summary.groups_without_data, 1);
    // 100 days of data leaves room for windows starting on days 0 and 30
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.collisions, 0);

    let records: Vec<_> = SampleReader::new(File::open(&path).unwrap(), WINDOW_SAMPLES)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        summary.bytes_written
    );

    let start = epoch().and_utc().timestamp() as f64;
    for (i, stored) in records.iter().enumerate() {
        assert!(stored.is_intact());
        let record = &stored.record;
        assert_eq!(record.ids, [1, 2, 3, 4]);
        assert_eq!(record.timestamps.len(), WINDOW_SAMPLES);
        assert_eq!(record.timestamps[0], start + i as f64 * WINDOW_SECS / 2.0);
        assert_eq!(
            record.timestamps[WINDOW_SAMPLES - 1],
            record.timestamps[0] + WINDOW_SECS
        );
        for channel in &record.channels {
            assert!(channel.iter().all(|v| v.is_finite()));
        }
        // Channels keep their order: r1 readings sit around 1000, v2 around 4000
        assert!((record.channels[0][0] - 1000.0).abs() < 20.0);
        assert!((record.channels[3][0] - 4000.0).abs() < 20.0);
    }
}

#[test]
fn test_rerun_into_same_writer_deduplicates() {
    let source = project();
    let config = SamplingConfig::default();
    let mut writer = SampleWriter::new(Vec::new());

    let first = run_project(&source, PROJECT, range(), &config, &mut writer).unwrap();
    let second = run_project(&source, PROJECT, range(), &config, &mut writer).unwrap();

    assert_eq!(second.records_written, 0);
    assert_eq!(second.collisions, first.records_written);

    let bytes = writer.into_inner().unwrap();
    let count = SampleReader::new(bytes.as_slice(), WINDOW_SAMPLES).count();
    assert_eq!(count as u64, first.records_written);
}

#[test]
fn test_non_overlapping_channels() {
    let mut source = MemorySource::new();
    source.add_job(PROJECT, JobInfo { id: 1, name: "Tunnel".into() });
    group(&mut source, 1, 1, "Ring 4");
    source.add_readings(1, readings(0, 10.0));
    source.add_readings(2, readings(0, 20.0));
    source.add_readings(3, readings(120, 30.0));
    source.add_readings(4, readings(120, 40.0));

    let config = SamplingConfig {
        channel: talaria_core::Channel::Engineering,
        ..Default::default()
    };
    let mut writer = SampleWriter::new(Vec::new());
    let summary = run_project(&source, PROJECT, range(), &config, &mut writer).unwrap();

    // Windows start every 30 days until the last one would run past day 219
    assert_eq!(summary.groups_without_data, 0);
    assert_eq!(summary.records_written, 6);

    let bytes = writer.into_inner().unwrap();
    for stored in SampleReader::new(bytes.as_slice(), WINDOW_SAMPLES) {
        let record = stored.unwrap().record;
        // Constant engineering values extrapolate to themselves
        assert!(record.channels[2].iter().all(|&v| (v - 0.3).abs() < 1e-9));
        assert!(record.channels[0].iter().all(|&v| (v - 0.1).abs() < 1e-9));
    }
}
