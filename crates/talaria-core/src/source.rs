//! Data source collaborator interface
//!
//! The pipeline never talks to the network directly. It consumes a
//! [`DataSource`], which yields the project/job/sensor catalog and raw sensor
//! readings. `talaria-client` implements it over the monitoring API; the
//! [`MemorySource`] here serves tests and offline runs.

use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which reading value feeds a [`Series`](crate::series::Series)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Raw ADC / counter value
    #[default]
    Raw,
    /// Value converted to engineering units
    Engineering,
}

/// One reading reported by a sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Reading time (UTC)
    pub timestamp: NaiveDateTime,
    /// Raw value
    pub raw: f64,
    /// Value in engineering units
    pub engineering: f64,
}

impl SensorReading {
    /// Reading time as Unix seconds, including the sub-second part
    pub fn unix_seconds(&self) -> f64 {
        let utc = self.timestamp.and_utc();
        utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1e9
    }

    /// Value for the requested channel
    pub fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Raw => self.raw,
            Channel::Engineering => self.engineering,
        }
    }
}

/// Project catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub id: u32,
    pub name: String,
}

impl fmt::Display for ProjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Job catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: u32,
    pub name: String,
}

impl fmt::Display for JobInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Sensor catalog entry. Two entries are the same sensor when their ids match.
#[derive(Debug, Clone)]
pub struct SensorInfo {
    pub id: u32,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

impl PartialEq for SensorInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SensorInfo {}

impl fmt::Display for SensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Inclusive range of calendar days to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Check if `timestamp` falls on a day inside the range
    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        let day = timestamp.date();
        day >= self.start && day <= self.end
    }
}

/// Catalog-level failures a source cannot recover from by retrying
#[derive(Debug, Error)]
pub enum SourceError {
    /// The response could not be understood
    #[error("Malformed response to `{action}`: {details}")]
    MalformedResponse {
        /// Request that produced the response
        action: String,
        /// Parser message
        details: String,
    },

    /// The source rejected the request
    #[error("Request `{action}` rejected: {details}")]
    Rejected {
        /// Request that was rejected
        action: String,
        /// Message returned by the source
        details: String,
    },
}

/// Provider of sensor catalog and readings.
///
/// Transient transport failures are handled inside the implementation;
/// a sensor with no readings in range is reported as `None`.
pub trait DataSource {
    /// Jobs belonging to a project
    fn list_jobs(&self, project_id: u32) -> Result<Vec<JobInfo>, SourceError>;

    /// All sensors belonging to a job
    fn list_sensors(&self, job_id: u32) -> Result<Vec<SensorInfo>, SourceError>;

    /// Readings of one sensor within `range`, or `None` when there are none
    fn fetch_series(&self, sensor_id: u32, range: DateRange) -> Option<Vec<SensorReading>>;
}

/// In-memory [`DataSource`]
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    jobs: HashMap<u32, Vec<JobInfo>>,
    sensors: HashMap<u32, Vec<SensorInfo>>,
    readings: HashMap<u32, Vec<SensorReading>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job under a project
    pub fn add_job(&mut self, project_id: u32, job: JobInfo) {
        self.jobs.entry(project_id).or_default().push(job);
    }

    /// Register a sensor under a job
    pub fn add_sensor(&mut self, job_id: u32, sensor: SensorInfo) {
        self.sensors.entry(job_id).or_default().push(sensor);
    }

    /// Append readings for a sensor
    pub fn add_readings(&mut self, sensor_id: u32, readings: impl IntoIterator<Item = SensorReading>) {
        self.readings.entry(sensor_id).or_default().extend(readings);
    }
}

impl DataSource for MemorySource {
    fn list_jobs(&self, project_id: u32) -> Result<Vec<JobInfo>, SourceError> {
        Ok(self.jobs.get(&project_id).cloned().unwrap_or_default())
    }

    fn list_sensors(&self, job_id: u32) -> Result<Vec<SensorInfo>, SourceError> {
        Ok(self.sensors.get(&job_id).cloned().unwrap_or_default())
    }

    fn fetch_series(&self, sensor_id: u32, range: DateRange) -> Option<Vec<SensorReading>> {
        let readings: Vec<SensorReading> = self
            .readings
            .get(&sensor_id)?
            .iter()
            .filter(|r| range.contains(&r.timestamp))
            .copied()
            .collect();

        if readings.is_empty() { None } else { Some(readings) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs as i64)
    }

    fn reading(day: u32, raw: f64) -> SensorReading {
        SensorReading {
            timestamp: at(day, 0),
            raw,
            engineering: raw / 10.0,
        }
    }

    #[test]
    fn test_unix_seconds() {
        let r = SensorReading {
            timestamp: NaiveDate::from_ymd_opt(1970, 1, 2)
                .unwrap()
                .and_hms_milli_opt(0, 0, 1, 500)
                .unwrap(),
            raw: 0.0,
            engineering: 0.0,
        };
        assert_eq!(r.unix_seconds(), 86_401.5);
    }

    #[test]
    fn test_channel_value() {
        let r = reading(1, 50.0);
        assert_eq!(r.value(Channel::Raw), 50.0);
        assert_eq!(r.value(Channel::Engineering), 5.0);
    }

    #[test]
    fn test_sensor_identity_by_id() {
        let a = SensorInfo {
            id: 7,
            name: "Wall r1".into(),
            created_at: at(1, 0),
            modified_at: at(1, 0),
        };
        let mut b = a.clone();
        b.name = "Renamed".into();
        b.modified_at = at(3, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_memory_source_filters_range() {
        let mut source = MemorySource::new();
        source.add_readings(1, [reading(1, 1.0), reading(5, 2.0), reading(9, 3.0)]);

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 9).unwrap(),
        );
        let readings = source.fetch_series(1, range).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].raw, 2.0);

        let empty = DateRange::new(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
        );
        assert!(source.fetch_series(1, empty).is_none());
        assert!(source.fetch_series(99, range).is_none());
    }

    #[test]
    fn test_memory_source_catalog() {
        let mut source = MemorySource::new();
        source.add_job(
            3,
            JobInfo {
                id: 30,
                name: "North".into(),
            },
        );
        assert_eq!(source.list_jobs(3).unwrap().len(), 1);
        assert!(source.list_jobs(4).unwrap().is_empty());
        assert!(source.list_sensors(30).unwrap().is_empty());
        assert_eq!(source.list_jobs(3).unwrap()[0].to_string(), "North (30)");
    }
}
