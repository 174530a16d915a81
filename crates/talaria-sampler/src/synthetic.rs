//! Offline data source for `--synthetic` runs.
//!
//! Builds a [`MemorySource`] holding one project with:
//! - "Wall A": a complete inverted group with readings, listed in both jobs
//! - "Wall B": an incomplete group (no v2)
//! - "Wall C": a complete group without readings
//! - "Ambient": a stray sensor that belongs to no group

use std::f64::consts::TAU;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use talaria_core::MemorySource;
use talaria_core::source::{JobInfo, SensorInfo, SensorReading};

/// Spacing of generated readings
const READING_INTERVAL_MINS: i64 = 30;

/// Length of generated history
pub const HISTORY_DAYS: i64 = 180;

/// Scale from raw counts to engineering units
const ENG_PER_RAW: f64 = 0.001;

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Generates deterministic sensor readings with a daily and a seasonal cycle.
struct MockSensorGenerator {
    /// xorshift state
    state: u64,
}

impl MockSensorGenerator {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    /// Next jitter value in `[-1, 1)`
    fn jitter(&mut self) -> f64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state >> 11) as f64 / (1u64 << 52) as f64 - 1.0
    }

    /// Readings every [`READING_INTERVAL_MINS`] over [`HISTORY_DAYS`] days
    fn readings(&mut self, start: NaiveDateTime, base: f64, amplitude: f64) -> Vec<SensorReading> {
        let count = HISTORY_DAYS * 24 * 60 / READING_INTERVAL_MINS;
        (0..count)
            .map(|i| {
                let minutes = i * READING_INTERVAL_MINS;
                let days = minutes as f64 / (24.0 * 60.0);

                // Seasonal drift plus a small daily swing
                let signal = base
                    + amplitude * (TAU * days / 90.0).sin()
                    + 0.1 * amplitude * (TAU * days).sin()
                    + 0.02 * amplitude * self.jitter();
                let raw = signal.round();

                SensorReading {
                    timestamp: start + Duration::minutes(minutes),
                    raw,
                    engineering: raw * ENG_PER_RAW,
                }
            })
            .collect()
    }
}

fn sensor(id: u32, name: &str, created_at: NaiveDateTime) -> SensorInfo {
    SensorInfo {
        id,
        name: name.to_string(),
        created_at,
        modified_at: created_at,
    }
}

/// Generated project whose history begins at midnight on `start`
pub fn project(project_id: u32, start: NaiveDate) -> MemorySource {
    let epoch = start.and_time(chrono::NaiveTime::MIN);
    let mut source = MemorySource::new();
    let mut generator = MockSensorGenerator::new(u64::from(project_id) ^ 0x9E37_79B9_7F4A_7C15);

    source.add_job(project_id, JobInfo { id: 1, name: "Synthetic North".into() });
    source.add_job(project_id, JobInfo { id: 2, name: "Synthetic South".into() });

    let wall_a = [(101, "Wall A r1"), (102, "Wall A r2"), (103, "Wall A v1"), (104, "Wall A v2")];
    for job in [1, 2] {
        for (id, name) in wall_a {
            source.add_sensor(job, sensor(id, name, epoch));
        }
    }
    for (id, name) in [(111, "Wall B r1"), (112, "Wall B r2"), (113, "Wall B v1"), (121, "Ambient")] {
        source.add_sensor(1, sensor(id, name, epoch));
    }
    for (id, name) in [(131, "Wall C R1"), (132, "Wall C R2"), (133, "Wall C V1"), (134, "Wall C V2")] {
        source.add_sensor(2, sensor(id, name, epoch));
    }

    // Resistance channels hover near 10k counts, voltage channels near 2.5k
    for (id, base, amplitude) in [
        (101, 10_000.0, 400.0),
        (102, 10_200.0, 380.0),
        (103, 2_500.0, 60.0),
        (104, 2_450.0, 55.0),
        (111, 9_000.0, 300.0),
        (121, 20_000.0, 5_000.0),
    ] {
        source.add_readings(id, generator.readings(epoch, base, amplitude));
    }

    source
}
