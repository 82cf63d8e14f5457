//! Maintenance window policy
//!
//! [`MaintenanceWindow`] decides whether a template change needs a window
//! and whether one is open. Windows come from a [`WindowResolver`]; the
//! bundled one, [`WindowPolicy`], is read from a JSON document:
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "match": { "region": "europe-.*", "plan": "^trial$" },
//!       "windows": [
//!         { "days": ["Sat", "Sun"], "begin": "22:00:00Z", "end": "02:00:00Z" }
//!       ]
//!     },
//!     {
//!       "match": { "globalAccountID": "^acc-1$" },
//!       "windows": [
//!         { "begin": "2024-06-01T22:00:00Z", "end": "2024-06-02T02:00:00Z" }
//!       ]
//!     }
//!   ],
//!   "default": { "days": ["Mon"], "begin": "00:00:00+02:00", "end": "04:00:00+02:00" }
//! }
//! ```
//!
//! A window with `days` recurs weekly: `begin` and `end` are times of day
//! with an offset, and an `end` not after `begin` crosses midnight. A
//! window without `days` is a single absolute RFC 3339 range.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday,
};
use kube::ResourceExt;
use lifecycle_common::crd::{ModuleSet, ModuleTemplate};
use lifecycle_common::{GLOBAL_ACCOUNT_ID_LABEL, PLAN_LABEL, PLATFORM_REGION_LABEL, REGION_LABEL};
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::MaintenancePolicy;

/// Days scanned for a recurring window: yesterday plus a week and a day
const LOOKAHEAD_DAYS: usize = 9;

/// Default minimum remaining length of an ongoing window, in minutes
pub const DEFAULT_MIN_WINDOW_MINUTES: i64 = 60;

/// Errors answering maintenance window questions
#[derive(Debug, Error)]
pub enum MaintenanceError {
    /// No resolver was configured
    #[error("no maintenance window policy configured")]
    NoPolicyConfigured,

    /// The policy file could not be read
    #[error("failed to read maintenance policy {path}: {reason}")]
    PolicyLoad {
        /// Path of the policy file
        path: String,
        /// I/O failure
        reason: String,
    },

    /// The policy document is malformed
    #[error("invalid maintenance policy: {0}")]
    PolicyParse(String),

    /// Rules matched the runtime but none offered a window
    #[error("matched maintenance rules offer no window for runtime {runtime}")]
    NoWindowInMatchedRules {
        /// Runtime the lookup was for
        runtime: String,
    },

    /// Neither a matching rule nor the default offer a window
    #[error("no maintenance window found for runtime {runtime}")]
    NoWindowFound {
        /// Runtime the lookup was for
        runtime: String,
    },
}

/// Descriptors of the managed cluster a ModuleSet belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeInfo {
    /// Global account id
    pub global_account_id: String,
    /// Service plan
    pub plan: String,
    /// Region
    pub region: String,
    /// Platform region
    pub platform_region: String,
}

impl RuntimeInfo {
    /// Read the runtime descriptors from resource labels
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| labels.get(key).cloned().unwrap_or_default();
        Self {
            global_account_id: get(GLOBAL_ACCOUNT_ID_LABEL),
            plan: get(PLAN_LABEL),
            region: get(REGION_LABEL),
            platform_region: get(PLATFORM_REGION_LABEL),
        }
    }
}

impl fmt::Display for RuntimeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<account={} plan={} region={} platformRegion={}>",
            self.global_account_id, self.plan, self.region, self.platform_region
        )
    }
}

/// A concrete time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    /// Inclusive start
    pub begin: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl ResolvedWindow {
    /// Whether `at` falls inside the window
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.begin <= at && at < self.end
    }
}

/// How a policy picks a window
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Point in time the lookup is for
    pub at: DateTime<Utc>,
    /// Accept windows that already began
    pub ongoing: bool,
    /// Remaining length an ongoing window needs
    pub min_duration: Duration,
    /// Stop at the first matching rule
    pub first_match_only: bool,
    /// Use the default window when matching rules offer none
    pub fallback_default: bool,
}

impl ResolveOptions {
    /// Next window starting after `at`
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            ongoing: false,
            min_duration: Duration::minutes(DEFAULT_MIN_WINDOW_MINUTES),
            first_match_only: true,
            fallback_default: true,
        }
    }

    /// Also accept windows with at least `min_duration` left
    pub fn ongoing(mut self, min_duration: Duration) -> Self {
        self.ongoing = true;
        self.min_duration = min_duration;
        self
    }

    fn admits(&self, begin: DateTime<Utc>, end: DateTime<Utc>) -> Option<ResolvedWindow> {
        let fits = if self.ongoing {
            self.at + self.min_duration < end
        } else {
            self.at < begin
        };
        fits.then_some(ResolvedWindow { begin, end })
    }
}

/// Source of maintenance windows
pub trait WindowResolver: Send + Sync {
    /// Window for the runtime under the given options
    fn resolve(
        &self,
        runtime: &RuntimeInfo,
        options: &ResolveOptions,
    ) -> Result<ResolvedWindow, MaintenanceError>;
}

/// Maintenance policy backed by a window resolver
pub struct MaintenanceWindow {
    resolver: Option<Arc<dyn WindowResolver>>,
    min_duration: Duration,
}

impl MaintenanceWindow {
    /// Policy using the given resolver
    pub fn new(resolver: Arc<dyn WindowResolver>) -> Self {
        Self {
            resolver: Some(resolver),
            min_duration: Duration::minutes(DEFAULT_MIN_WINDOW_MINUTES),
        }
    }

    /// Policy without a resolver; every window query fails
    pub fn unconfigured() -> Self {
        Self {
            resolver: None,
            min_duration: Duration::minutes(DEFAULT_MIN_WINDOW_MINUTES),
        }
    }

    /// Require an open window to last at least `min_duration` longer
    pub fn with_min_duration(mut self, min_duration: Duration) -> Self {
        self.min_duration = min_duration;
        self
    }

    /// Whether a window is open for the ModuleSet at `at`
    pub fn is_active_at(
        &self,
        module_set: &ModuleSet,
        at: DateTime<Utc>,
    ) -> Result<bool, MaintenanceError> {
        let resolver = self
            .resolver
            .as_ref()
            .ok_or(MaintenanceError::NoPolicyConfigured)?;
        let runtime = RuntimeInfo::from_labels(module_set.labels());
        let options = ResolveOptions::at(at).ongoing(self.min_duration);
        let window = resolver.resolve(&runtime, &options)?;
        debug!(
            runtime = %runtime,
            begin = %window.begin,
            end = %window.end,
            "resolved maintenance window"
        );
        Ok(window.is_active_at(at))
    }
}

impl MaintenancePolicy for MaintenanceWindow {
    fn is_required(&self, template: &ModuleTemplate, module_set: &ModuleSet) -> bool {
        if !template.spec.requires_downtime || module_set.spec.skip_maintenance_windows {
            return false;
        }
        module_set
            .tracked_modules()
            .iter()
            .find(|m| template.matches_module(&m.name))
            .is_some_and(|tracked| template.version() != Some(tracked.version.as_str()))
    }

    fn is_active(&self, module_set: &ModuleSet) -> Result<bool, MaintenanceError> {
        self.is_active_at(module_set, Utc::now())
    }
}

/// Compiled regular expression of a rule selector
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile `raw`
    pub fn new(raw: &str) -> Result<Self, regex::Error> {
        Regex::new(raw).map(Self)
    }

    /// Whether the pattern matches anywhere in a non-empty `value`
    pub fn is_match(&self, value: &str) -> bool {
        !value.is_empty() && self.0.is_match(value)
    }
}

/// Empty patterns count as unset
fn optional_pattern<'de, D>(deserializer: D) -> Result<Option<Pattern>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.filter(|r| !r.is_empty())
        .map(|r| Pattern::new(&r).map_err(de::Error::custom))
        .transpose()
}

/// Selector of a policy rule
///
/// A rule applies when any set pattern matches its runtime field. A
/// selector without patterns matches nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleMatch {
    /// Global account id
    #[serde(rename = "globalAccountID", default, deserialize_with = "optional_pattern")]
    pub global_account_id: Option<Pattern>,
    /// Service plan
    #[serde(default, deserialize_with = "optional_pattern")]
    pub plan: Option<Pattern>,
    /// Region
    #[serde(default, deserialize_with = "optional_pattern")]
    pub region: Option<Pattern>,
    /// Platform region
    #[serde(rename = "platformRegion", default, deserialize_with = "optional_pattern")]
    pub platform_region: Option<Pattern>,
}

impl RuleMatch {
    /// Whether any set pattern matches the runtime
    pub fn matches(&self, runtime: &RuntimeInfo) -> bool {
        [
            (&self.global_account_id, &runtime.global_account_id),
            (&self.plan, &runtime.plan),
            (&self.region, &runtime.region),
            (&self.platform_region, &runtime.platform_region),
        ]
        .into_iter()
        .any(|(pattern, value)| pattern.as_ref().is_some_and(|p| p.is_match(value)))
    }
}

/// One bound of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTime {
    /// An absolute instant
    At(DateTime<FixedOffset>),
    /// A time of day in a fixed offset
    Daily {
        /// Wall clock time
        time: NaiveTime,
        /// Offset the time is read in
        offset: FixedOffset,
    },
}

impl WindowTime {
    /// Parse RFC 3339, or a time of day such as `22:00:00Z` or `01:30:00+02:00`
    pub fn parse(raw: &str) -> Result<Self, String> {
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self::At(at));
        }
        DateTime::parse_from_rfc3339(&format!("2000-01-01T{raw}"))
            .map(|t| Self::Daily {
                time: t.time(),
                offset: *t.offset(),
            })
            .map_err(|_| format!("{raw:?} is neither RFC 3339 nor a time of day with offset"))
    }

    fn clock(&self) -> (NaiveTime, FixedOffset) {
        match self {
            Self::At(at) => (at.time(), *at.offset()),
            Self::Daily { time, offset } => (*time, *offset),
        }
    }

    /// This bound's clock time on `date`, read in its own offset
    fn on(&self, date: NaiveDate) -> DateTime<Utc> {
        let (time, offset) = self.clock();
        let local_minus_utc = Duration::seconds(i64::from(offset.local_minus_utc()));
        Utc.from_utc_datetime(&(date.and_time(time) - local_minus_utc))
    }
}

impl<'de> Deserialize<'de> for WindowTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

/// A configured window, weekly when `days` is set, absolute otherwise
#[derive(Debug, Clone, Deserialize)]
pub struct WindowSpec {
    /// Weekday abbreviations the window recurs on, such as `Mon`
    #[serde(default)]
    pub days: Vec<String>,
    /// Start
    pub begin: WindowTime,
    /// End
    pub end: WindowTime,
}

impl WindowSpec {
    fn weekdays(&self) -> Vec<Weekday> {
        self.days.iter().filter_map(|d| d.parse().ok()).collect()
    }

    /// First occurrence the options admit
    pub fn next_window(&self, options: &ResolveOptions) -> Option<ResolvedWindow> {
        if self.days.is_empty() {
            return match (self.begin, self.end) {
                (WindowTime::At(begin), WindowTime::At(end)) => {
                    options.admits(begin.with_timezone(&Utc), end.with_timezone(&Utc))
                }
                _ => None,
            };
        }

        let weekdays = self.weekdays();
        let start = options.at.date_naive() - Duration::days(1);
        start
            .iter_days()
            .take(LOOKAHEAD_DAYS)
            .filter_map(|date| {
                let begin = self.begin.on(date);
                let mut end = self.end.on(date);
                if end <= begin {
                    end += Duration::days(1);
                }
                let weekday = begin.with_timezone(&self.begin.clock().1).weekday();
                weekdays.contains(&weekday).then_some((begin, end))
            })
            .find_map(|(begin, end)| options.admits(begin, end))
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(day) = self.days.iter().find(|d| d.parse::<Weekday>().is_err()) {
            return Err(format!("unknown weekday {day:?}"));
        }
        if !self.days.is_empty() {
            return Ok(());
        }
        match (self.begin, self.end) {
            (WindowTime::At(begin), WindowTime::At(end)) if begin >= end => {
                Err(format!("window begins at {begin} but ends at {end}"))
            }
            (WindowTime::At(_), WindowTime::At(_)) => Ok(()),
            _ => Err("a window without days needs absolute begin and end".to_string()),
        }
    }
}

/// One policy rule
#[derive(Debug, Clone, Deserialize)]
pub struct WindowRule {
    /// Which runtimes the rule applies to
    #[serde(rename = "match", default)]
    pub matcher: RuleMatch,
    /// Windows offered to matching runtimes, first available wins
    #[serde(default)]
    pub windows: Vec<WindowSpec>,
}

/// Maintenance windows configured from a JSON document
///
/// Matching rules are consulted in order. Unless the options say
/// otherwise, only the first matching rule is, and the default window
/// covers runtimes whose rules offer nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowPolicy {
    /// Ordered rules
    #[serde(default)]
    pub rules: Vec<WindowRule>,
    /// Fallback window
    #[serde(default)]
    pub default: Option<WindowSpec>,
}

impl WindowPolicy {
    /// Parse a policy document
    pub fn from_json(raw: &str) -> Result<Self, MaintenanceError> {
        let policy: Self =
            serde_json::from_str(raw).map_err(|e| MaintenanceError::PolicyParse(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read and parse a policy file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MaintenanceError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| MaintenanceError::PolicyLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<(), MaintenanceError> {
        self.rules
            .iter()
            .flat_map(|r| r.windows.iter())
            .chain(self.default.iter())
            .try_for_each(WindowSpec::validate)
            .map_err(MaintenanceError::PolicyParse)
    }
}

impl WindowResolver for WindowPolicy {
    fn resolve(
        &self,
        runtime: &RuntimeInfo,
        options: &ResolveOptions,
    ) -> Result<ResolvedWindow, MaintenanceError> {
        let mut matched = false;
        for rule in self.rules.iter().filter(|r| r.matcher.matches(runtime)) {
            matched = true;
            if let Some(window) = rule.windows.iter().find_map(|w| w.next_window(options)) {
                return Ok(window);
            }
            if options.first_match_only {
                break;
            }
        }

        if matched && !options.fallback_default {
            return Err(MaintenanceError::NoWindowInMatchedRules {
                runtime: runtime.to_string(),
            });
        }

        self.default
            .as_ref()
            .and_then(|w| w.next_window(options))
            .ok_or_else(|| MaintenanceError::NoWindowFound {
                runtime: runtime.to_string(),
            })
    }
}
