//! The seam between the generic scheduler and one external system.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use alerter_core::{CanonicalRecord, IntervalSpec, Properties, TriggerSnapshot};

/// Trigger context key holding the polling interval.
pub const INTERVAL_KEY: &str = "interval";

/// Time range covered by one tick: `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// The window of length `interval` ending at `end`. An interval reaching
    /// past the representable range starts at [`DateTime::<Utc>::MIN_UTC`].
    pub fn ending_at(end: DateTime<Utc>, interval: IntervalSpec) -> Self {
        let start = ChronoDuration::from_std(interval.as_duration())
            .ok()
            .and_then(|span| end.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    pub fn ending_now(interval: IntervalSpec) -> Self {
        Self::ending_at(Utc::now(), interval)
    }
}

/// One external telemetry system.
///
/// A query tick calls, in order: [`configure`](Self::configure) to turn the
/// trigger context plus connector defaults into a typed config,
/// [`resolve_selectors`](Self::resolve_selectors) once per task lifetime (the
/// result is cached until it succeeds), [`fetch`](Self::fetch) for the tick's
/// window, and [`map`](Self::map) for each raw item.
#[async_trait]
pub trait EndpointAdapter: Send + Sync + 'static {
    type Config: Send + Sync + 'static;
    type QuerySet: Send + Sync + 'static;
    type RawItem: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connector name used in logs and property keys.
    fn name(&self) -> &str;

    /// Triggers must carry this tag to be polled by this adapter.
    fn marker_tag(&self) -> &str;

    /// Polling interval for `trigger`.
    fn interval(&self, trigger: &TriggerSnapshot, fallback: IntervalSpec) -> IntervalSpec {
        IntervalSpec::parse_or(trigger.context_value(INTERVAL_KEY), fallback)
    }

    /// Effective configuration: trigger context over connector defaults.
    fn configure(
        &self,
        trigger: &TriggerSnapshot,
        defaults: &Properties,
    ) -> Result<Self::Config, Self::Error>;

    async fn resolve_selectors(&self, config: &Self::Config) -> Result<Self::QuerySet, Self::Error>;

    async fn fetch(
        &self,
        config: &Self::Config,
        query_set: &Self::QuerySet,
        window: &FetchWindow,
    ) -> Result<Vec<Self::RawItem>, Self::Error>;

    /// Translate one raw item. `None` drops it.
    fn map(&self, config: &Self::Config, item: Self::RawItem) -> Option<CanonicalRecord>;
}
