use std::thread;
use std::time::Duration;

use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use reqwest::Url;
use roxmltree::Node;
use talaria_core::source::{
    DataSource, DateRange, JobInfo, ProjectInfo, SensorInfo, SensorReading, SourceError,
};
use thiserror::Error;

use crate::transport::{HttpTransport, REQUEST_TIMEOUT, Transport};
use crate::xml::{self, DATE_FORMAT};

/// Analytics host used when none is given
pub const DEFAULT_HOST: &str = "analytics2";

/// Pause between attempts while the API is unreachable
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Error types for the API client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),

    #[error("Invalid API URL \"{url}\": {details}")]
    InvalidUrl { url: String, details: String },

    #[error("Login failed for user \"{username}\"")]
    LoginFailed { username: String },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// API endpoint for a host.
///
/// A bare name such as `analytics2` expands to
/// `https://analytics2.smtresearch.ca/api/`; anything containing `://` is
/// used as given.
pub fn api_url(host: &str) -> Result<Url, ClientError> {
    let url = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}.smtresearch.ca/api/")
    };

    Url::parse(&url).map_err(|e| ClientError::InvalidUrl {
        url,
        details: e.to_string(),
    })
}

/// Client for the sensor monitoring API.
///
/// Requests are `GET <api>?action=<name>&<params>` with XML responses.
/// While the transport fails the client sleeps and retries without bound, so
/// every method either returns a parsed response or a non-transport error.
pub struct ApiClient<T: Transport = HttpTransport> {
    transport: T,
    api: Url,
    retry_delay: Duration,
}

impl ApiClient<HttpTransport> {
    /// Client for `host` over HTTPS with a cookie-backed session
    pub fn connect(host: &str) -> Result<Self, ClientError> {
        let api = api_url(host)?;
        let transport = HttpTransport::new(REQUEST_TIMEOUT)?;
        Ok(Self::with_transport(transport, api))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(transport: T, api: Url) -> Self {
        Self {
            transport,
            api,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Endpoint this client talks to
    pub fn api(&self) -> &Url {
        &self.api
    }

    fn url(&self, action: &str, params: &[(&str, String)]) -> Url {
        let mut url = self.api.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action);
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        url
    }

    /// GET an action, retrying until a response body arrives
    fn request(&self, action: &str, params: &[(&str, String)]) -> String {
        let url = self.url(action, params);
        debug!("GET {}", url);

        let mut failed = false;
        let body = loop {
            match self.transport.get(url.as_str()) {
                Ok(body) => break body,
                Err(e) => {
                    if !failed {
                        error!("Connection failed, attempting to reconnect.");
                        failed = true;
                    }
                    debug!("{}: {}", action, e);
                    thread::sleep(self.retry_delay);
                }
            }
        };

        if failed {
            info!("Reconnected successfully.");
        }
        body
    }

    /// Start a session. The transport keeps the session cookie.
    pub fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let body = self.request(
            "login",
            &[
                ("user_username", username.to_string()),
                ("user_password", password.to_string()),
            ],
        );
        let doc = xml::parse("login", &body)?;

        if xml::has_child(&doc, "error") {
            return Err(ClientError::LoginFailed {
                username: username.to_string(),
            });
        }
        info!("Logged in as {}", username);
        Ok(())
    }

    /// All projects visible to the session
    pub fn list_projects(&self) -> Result<Vec<ProjectInfo>, SourceError> {
        let body = self.request("listProject", &[]);
        let doc = xml::parse("listProject", &body)?;

        Ok(collect_entries(&doc, "projects", "listProject", |entry| {
            Some(ProjectInfo {
                id: xml::child_parse(entry, "projectID")?,
                name: xml::child_text(entry, "name")?.to_string(),
            })
        }))
    }

    /// Time of the first reading recorded in a project
    pub fn earliest_timestamp(&self, project_id: u32) -> Result<NaiveDateTime, SourceError> {
        let body = self.request("getEarliestTimestamp", &[("projectID", project_id.to_string())]);
        let doc = xml::parse("getEarliestTimestamp", &body)?;

        xml::entries(&doc, "projects")
            .next()
            .and_then(|entry| xml::child_text(entry, "ts"))
            .and_then(xml::parse_iso_timestamp)
            .ok_or_else(|| SourceError::MalformedResponse {
                action: "getEarliestTimestamp".to_string(),
                details: format!("no timestamp for project {project_id}"),
            })
    }

    fn list_nodes(&self, job_id: u32) -> Result<Vec<u32>, SourceError> {
        let body = self.request("listNode", &[("jobID", job_id.to_string())]);
        let doc = xml::parse("listNode", &body)?;

        Ok(collect_entries(&doc, "nodes", "listNode", |entry| {
            xml::child_parse(entry, "nodeID")
        }))
    }

    fn list_node_sensors(&self, node_id: u32) -> Result<Vec<SensorInfo>, SourceError> {
        let body = self.request("listSensor", &[("nodeID", node_id.to_string())]);
        let doc = xml::parse("listSensor", &body)?;

        Ok(collect_entries(&doc, "sensors", "listSensor", |entry| {
            Some(SensorInfo {
                id: xml::child_parse(entry, "sensorID")?,
                name: xml::child_text(entry, "name")?.to_string(),
                created_at: xml::parse_timestamp(xml::child_text(entry, "created")?)?,
                modified_at: xml::parse_timestamp(xml::child_text(entry, "modified")?)?,
            })
        }))
    }
}

/// Parse every entry of a collection, skipping entries that do not parse
fn collect_entries<'a, 'i, U>(
    doc: &'a roxmltree::Document<'i>,
    collection: &str,
    action: &str,
    parse: impl Fn(Node<'a, 'i>) -> Option<U>,
) -> Vec<U> {
    xml::entries(doc, collection)
        .filter_map(|entry| {
            let parsed = parse(entry);
            if parsed.is_none() {
                warn!("Skipping malformed {} entry in `{}` response", entry.tag_name().name(), action);
            }
            parsed
        })
        .collect()
}

fn parse_reading(entry: Node<'_, '_>) -> Option<SensorReading> {
    let raw: i64 = xml::child_parse(entry, "raw")?;
    Some(SensorReading {
        raw: raw as f64,
        engineering: xml::child_parse(entry, "engUnit")?,
        timestamp: xml::parse_timestamp(xml::child_text(entry, "timestamp")?)?,
    })
}

impl<T: Transport> DataSource for ApiClient<T> {
    fn list_jobs(&self, project_id: u32) -> Result<Vec<JobInfo>, SourceError> {
        let body = self.request("listJob", &[("projectID", project_id.to_string())]);
        let doc = xml::parse("listJob", &body)?;

        Ok(collect_entries(&doc, "jobs", "listJob", |entry| {
            Some(JobInfo {
                id: xml::child_parse(entry, "jobID")?,
                name: xml::child_text(entry, "name")?.to_string(),
            })
        }))
    }

    fn list_sensors(&self, job_id: u32) -> Result<Vec<SensorInfo>, SourceError> {
        let mut sensors = Vec::new();
        for node_id in self.list_nodes(job_id)? {
            sensors.extend(self.list_node_sensors(node_id)?);
        }
        Ok(sensors)
    }

    fn fetch_series(&self, sensor_id: u32, range: DateRange) -> Option<Vec<SensorReading>> {
        let body = self.request(
            "listSensorData",
            &[
                ("sensorID", sensor_id.to_string()),
                ("startDate", range.start.format(DATE_FORMAT).to_string()),
                ("endDate", range.end.format(DATE_FORMAT).to_string()),
            ],
        );

        let doc = match xml::parse("listSensorData", &body) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Sensor {}: {}", sensor_id, e);
                return None;
            }
        };

        let readings: Vec<SensorReading> = xml::entries(&doc, "readings")
            .filter_map(parse_reading)
            .collect();
        debug!("Sensor {}: {} readings", sensor_id, readings.len());

        if readings.is_empty() { None } else { Some(readings) }
    }
}
