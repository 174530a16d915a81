//! Sample generation pipeline
//!
//! For every complete inverted group in a project:
//!
//! 1. Fetch the four channels from the [`DataSource`]
//! 2. Sort, fill gaps on the high-resolution grid, smooth, downsample
//!    ([`prepare_channel`])
//! 3. Slide a window with 50% overlap across the channels ([`WindowStarts`])
//! 4. Evaluate every channel at the window's grid points ([`build_record`])
//! 5. Deduplicate by content hash and append to the output
//!    ([`SampleWriter`])

use std::io::Write;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::SamplingConfig;
use crate::grouping::{InvertedGroup, discover_groups, merge_groups};
use crate::samples::{CHANNELS, SampleError, SampleRecord, SampleWriter};
use crate::series::{Interpolation, Resolution, Series, SeriesError, SeriesResult, Window};
use crate::source::{Channel, DataSource, DateRange, SourceError};

/// Error types for a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Data source error: {0}")]
    Source(#[from] SourceError),
    #[error("Sample error: {0}")]
    Sample(#[from] SampleError),
    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}

/// Counters for one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupSummary {
    pub records_written: u64,
    pub bytes_written: u64,
    pub collisions: u64,
}

/// Counters for a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Complete groups found in the catalog
    pub groups: usize,
    /// Groups skipped because a channel had no readings
    pub groups_without_data: usize,
    pub records_written: u64,
    pub bytes_written: u64,
    pub collisions: u64,
}

/// Bring one raw channel onto the low-resolution grid.
///
/// sort → discard outliers (optional) → fill gaps at the high-resolution
/// period → smooth → downsample to the low-resolution period.
pub fn prepare_channel(series: &mut Series, config: &SamplingConfig) -> SeriesResult<()> {
    series.sort();

    if let Some(threshold) = config.discard_above {
        let discarded = series.discard_above(threshold);
        if discarded > 0 {
            debug!("Discarded {} values above {}", discarded, threshold);
        }
    }

    series.make_continuous(Resolution::Step(config.high_res_period_secs))?;
    series.smooth(Window::Duration(config.smooth_period_secs), config.poly_order)?;
    series.make_continuous(Resolution::Step(config.low_res_period_secs))
}

/// Window start times (whole seconds) across a set of channels.
///
/// Starts at the earliest first key and advances by half the window while
/// the window still ends before the latest last key.
#[derive(Debug, Clone)]
pub struct WindowStarts {
    next: i64,
    stop: i64,
    step: i64,
}

impl WindowStarts {
    pub fn new(channels: &[Series], window_secs: f64) -> SeriesResult<Self> {
        let step = (window_secs / 2.0) as i64;
        if step <= 0 {
            return Err(SeriesError::InvalidArgument {
                param: "window_secs",
                details: "window must span at least 2 seconds",
            });
        }

        if channels.is_empty() {
            return Err(SeriesError::NoData);
        }

        let mut first = f64::INFINITY;
        let mut last = f64::NEG_INFINITY;
        for series in channels {
            let (Some(start), Some(end)) = (series.first_x(), series.last_x()) else {
                return Err(SeriesError::NoData);
            };
            first = first.min(start);
            last = last.max(end);
        }

        Ok(Self {
            next: first as i64,
            stop: (last - window_secs) as i64,
            step,
        })
    }
}

impl Iterator for WindowStarts {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.next >= self.stop {
            return None;
        }
        let start = self.next;
        self.next += self.step;
        Some(start)
    }
}

/// `count` evenly spaced points from `start` to `start + span`, both included
pub fn linspace(start: f64, span: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let last = (count - 1) as f64;
            (0..count)
                .map(|i| start + span * i as f64 / last)
                .collect()
        }
    }
}

/// Evaluate all four channels over the window starting at `start`.
///
/// Missing values are stored as NaN in the record.
pub fn build_record(
    ids: [u32; CHANNELS],
    channels: &[Series; CHANNELS],
    start: f64,
    config: &SamplingConfig,
) -> SeriesResult<SampleRecord> {
    let timestamps = linspace(start, config.window_secs, config.window_samples);

    let mut values: [Vec<f64>; CHANNELS] = Default::default();
    for (out, series) in values.iter_mut().zip(channels) {
        *out = series
            .lookup_many(&timestamps, Interpolation::Linear)?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
    }

    Ok(SampleRecord {
        ids,
        timestamps,
        channels: values,
    })
}

/// Fetch the four channels of a group as unsorted series.
///
/// Returns `None` if any channel has no readings in `range`.
pub fn download_group<S: DataSource>(
    source: &S,
    ids: [u32; CHANNELS],
    range: DateRange,
    channel: Channel,
) -> Option<[Series; CHANNELS]> {
    let mut channels: [Series; CHANNELS] = Default::default();
    for (series, id) in channels.iter_mut().zip(ids) {
        let readings = source.fetch_series(id, range)?;
        *series = Series::from_readings(&readings, channel);
    }
    Some(channels)
}

/// Prepare the channels of one group and write all of its windows.
///
/// Duplicate windows are logged and skipped.
pub fn write_group_samples<W: Write>(
    ids: [u32; CHANNELS],
    channels: &mut [Series; CHANNELS],
    config: &SamplingConfig,
    writer: &mut SampleWriter<W>,
) -> Result<GroupSummary, PipelineError> {
    for series in channels.iter_mut() {
        prepare_channel(series, config)?;
    }

    let mut summary = GroupSummary::default();
    for start in WindowStarts::new(channels.as_slice(), config.window_secs)? {
        let record = build_record(ids, channels, start as f64, config)?;
        match writer.write(&record) {
            Ok(_) => {
                summary.records_written += 1;
                summary.bytes_written += SampleRecord::encoded_len(config.window_samples) as u64;
            }
            Err(SampleError::HashCollision { hash }) => {
                warn!("HASH COLLISION ({hash}), sample dropped");
                summary.collisions += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(summary)
}

/// Complete inverted groups across all jobs of a project, without duplicates
pub fn collect_groups<S: DataSource>(
    source: &S,
    project_id: u32,
) -> Result<Vec<InvertedGroup>, SourceError> {
    let mut groups = Vec::new();
    for job in source.list_jobs(project_id)? {
        let sensors = source.list_sensors(job.id)?;
        let found = discover_groups(job.id, &sensors);
        debug!("Job {}: {} sensors, {} groups", job, sensors.len(), found.len());
        merge_groups(&mut groups, found);
    }
    Ok(groups)
}

/// Generate training samples for every inverted group of a project
pub fn run_project<S: DataSource, W: Write>(
    source: &S,
    project_id: u32,
    range: DateRange,
    config: &SamplingConfig,
    writer: &mut SampleWriter<W>,
) -> Result<RunSummary, PipelineError> {
    config.validate()?;

    info!("Fetching sensors...");
    let groups = collect_groups(source, project_id)?;
    let mut run = RunSummary {
        groups: groups.len(),
        ..Default::default()
    };

    info!("Starting download of {} groups...", groups.len());
    for group in &groups {
        let Some(ids) = group.ids() else {
            continue;
        };

        let Some(mut channels) = download_group(source, ids, range, config.channel) else {
            run.groups_without_data += 1;
            info!(
                "{}: NO DATA, 0 samples ({} total)",
                group.name, run.records_written
            );
            continue;
        };

        let summary = write_group_samples(ids, &mut channels, config, writer)?;
        for series in channels.iter_mut() {
            series.release();
        }

        run.records_written += summary.records_written;
        run.bytes_written += summary.bytes_written;
        run.collisions += summary.collisions;
        info!(
            "{}: {} bytes, {} samples ({} total)",
            group.name, summary.bytes_written, summary.records_written, run.records_written
        );
    }

    writer.flush()?;
    Ok(run)
}
