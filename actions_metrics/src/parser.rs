//! Job log scraping: recovers queue/run timing and the exit code from the
//! raw text log of a GitHub Actions job.
//!
//! Lines look like `2023-03-01T10:00:00.1234567Z <message>`. Anything else is
//! ignored. Missing markers are not an error: the corresponding instant stays
//! at the zero time and the derived durations come out degenerate.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use regex::Regex;

static LOG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}.[0-9]{7}Z)\s(.+)$").unwrap()
});
static EXIT_CODE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##\[error\]Process completed with exit code ([0-9])\.").unwrap());

const ERROR_MARKER: &str = "##[error]";
const QUEUED_MARKER: &str = "Waiting for a runner to pick up this job...";
const STARTED_MARKER: &str = "Job is about to start running on the runner:";

/// Exit code reported when the log never mentions one.
pub const EXIT_CODE_NULL: &str = "null";

/// Facts extracted from one job log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    /// A single digit, or [`EXIT_CODE_NULL`].
    pub exit_code: String,
    /// `started - queued`.
    pub queue_time: TimeDelta,
    /// `completed - started`, where completed is the last plain timestamped line.
    pub run_time: TimeDelta,
}

/// `0001-01-01T00:00:00Z`, the stand-in for a marker that never appeared.
pub fn zero_time() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Seconds as a float, keeping sub-second precision.
pub fn as_seconds(delta: TimeDelta) -> f64 {
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
}

/// Incremental parser, fed one line at a time.
#[derive(Debug, Clone)]
pub struct LogParser {
    exit_code: Option<String>,
    queued: DateTime<Utc>,
    started: DateTime<Utc>,
    completed: DateTime<Utc>,
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser {
    pub fn new() -> Self {
        let zero = zero_time();
        Self {
            exit_code: None,
            queued: zero,
            started: zero,
            completed: zero,
        }
    }

    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim_start_matches('\u{feff}').trim_end_matches('\r');
        let Some(caps) = LOG_LINE.captures(line) else {
            return;
        };
        let timestamp = &caps[1];
        let message = &caps[2];

        if message.starts_with(ERROR_MARKER) {
            if let Some(code) = EXIT_CODE_LINE.captures(message) {
                self.exit_code = Some(code[1].to_string());
            }
            return;
        }

        let at = parse_timestamp(timestamp);
        if message.starts_with(QUEUED_MARKER) {
            self.queued = at;
        } else if message.starts_with(STARTED_MARKER) {
            self.started = at;
        } else {
            self.completed = at;
        }
    }

    pub fn finish(self) -> ParseResult {
        ParseResult {
            exit_code: self
                .exit_code
                .unwrap_or_else(|| EXIT_CODE_NULL.to_string()),
            queue_time: bounded_delta(self.started, self.queued),
            run_time: bounded_delta(self.completed, self.started),
        }
    }
}

/// `later - earlier`, saturated to what fits in `i64` nanoseconds (about 292
/// years). A marker missing from the log lands on the bound.
fn bounded_delta(later: DateTime<Utc>, earlier: DateTime<Utc>) -> TimeDelta {
    (later - earlier).clamp(TimeDelta::nanoseconds(i64::MIN), TimeDelta::nanoseconds(i64::MAX))
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| zero_time())
}

/// Parse a whole log held in memory.
pub fn parse_job_log<I, S>(lines: I) -> ParseResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = LogParser::new();
    for line in lines {
        parser.feed_line(line.as_ref());
    }
    parser.finish()
}
