//! Transport-independent core library for talaria
//!
//! This crate contains the logic that turns raw inverted-sensor readings into
//! fixed-size training samples: the time-series resampling and interpolation
//! engine, Savitzky-Golay smoothing, inverted group discovery, the binary
//! sample format and the pipeline that ties them together.
//!
//! Network access lives in `talaria-client`, which implements
//! [`source::DataSource`] over the monitoring API. Everything here runs
//! against any `DataSource`, including the in-memory [`source::MemorySource`]
//! used by tests and the synthetic mode of the sampler.

pub mod codec;
pub mod config;
pub mod grouping;
pub mod pipeline;
pub mod samples;
pub mod series;
pub mod smoothing;
pub mod source;

pub use config::SamplingConfig;
pub use pipeline::{PipelineError, RunSummary, run_project};
pub use samples::{SampleReader, SampleRecord, SampleWriter};
pub use series::{Interpolation, Resolution, Series, SeriesError, Window};
pub use source::{Channel, DataSource, DateRange, MemorySource};
