use serde::Deserialize;

/// Reply endpoint used when `source.endpoint` is not set
pub const DEFAULT_ENDPOINT_TEMPLATE: &str =
    "https://api.bilibili.com/x/v2/reply?jsonp=jsonp&type=1&oid={subject}&mode=2&pn=";

/// Video metadata endpoint used to turn a bvid into a subject id
pub const DEFAULT_VIEW_ENDPOINT: &str = "https://api.bilibili.com/x/web-interface/view?bvid=";

/// Highest page index the discoverer probes before giving up
pub const DEFAULT_UPPER_BOUND: u32 = 32768;

/// Main configuration structure for Reply-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Discussion source configuration
///
/// The subject is given either directly as `subject-id` or as a video `bvid`
/// that is resolved to its numeric id before discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Numeric id of the subject whose thread is harvested
    #[serde(rename = "subject-id", default)]
    pub subject_id: Option<u64>,

    /// Video id (`BV...`) to resolve into `subject-id`
    #[serde(default)]
    pub bvid: Option<String>,

    /// URL prefix the bvid is appended to for resolution
    #[serde(rename = "view-endpoint", default)]
    pub view_endpoint: Option<String>,

    /// Page URL prefix; the page index is appended verbatim
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Page index assumed to be past the end of any thread
    #[serde(rename = "upper-bound", default = "default_upper_bound")]
    pub upper_bound: u32,

    /// What to do when the upper bound still has data
    #[serde(default)]
    pub unbounded: UnboundedPolicy,
}

impl SourceConfig {
    /// Returns the page URL prefix for `subject_id`, falling back to the
    /// default template
    pub fn endpoint_for(&self, subject_id: u64) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => DEFAULT_ENDPOINT_TEMPLATE.replace("{subject}", &subject_id.to_string()),
        }
    }

    /// Returns the bvid lookup prefix, falling back to the default
    pub fn view_endpoint(&self) -> String {
        self.view_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_VIEW_ENDPOINT.to_string())
    }
}

/// Handling of a thread whose last page lies beyond the upper bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnboundedPolicy {
    /// Keep fetching until the first empty page
    #[default]
    Follow,

    /// Finish the run without fetching
    Abort,
}

/// Request pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Mean delay before each request (milliseconds)
    #[serde(rename = "average-delay")]
    pub average_delay: u64,

    /// Maximum deviation from the mean (milliseconds), at most `average-delay`
    #[serde(rename = "delay-range")]
    pub delay_range: u64,

    /// Fixed RNG seed; drawn from the OS when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Writer pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Number of concurrent storage writers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Stop the run on the first storage failure
    #[serde(rename = "fail-fast", default)]
    pub fail_fast: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            fail_fast: false,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_upper_bound() -> u32 {
    DEFAULT_UPPER_BOUND
}

fn default_workers() -> usize {
    16
}
