use crate::calendar::{CalendarDate, SortKey};
use crate::config::ReportConfig;
use crate::error::Result;
use crate::schema::ClinicSnapshot;
use crate::{DashboardProcessor, DashboardReport};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
struct CacheKey {
    generation: u64,
    snapshot_version: u64,
    today: SortKey,
    config: ReportConfig,
}

struct Slot<T> {
    inner: RwLock<Option<(CacheKey, T)>>,
}

impl<T: Clone> Slot<T> {
    fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    fn get(&self, key: &CacheKey) -> Option<T> {
        let guard = self.inner.read().ok()?;
        match guard.as_ref() {
            Some((stored, val)) if stored == key => Some(val.clone()),
            _ => None,
        }
    }

    fn set(&self, key: CacheKey, val: T) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some((key, val));
        }
    }
}

/// Memoizes the last dashboard report, keyed by snapshot version, day and
/// report configuration.
///
/// The host bumps `ClinicSnapshot::version` on every data mutation. When the
/// data changes without a version bump, call [`ReportCache::invalidate`].
pub struct ReportCache {
    generation: AtomicU64,
    report: Slot<DashboardReport>,
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportCache {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            report: Slot::new(),
        }
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn key(
        &self,
        snapshot: &ClinicSnapshot,
        config: &ReportConfig,
        today: CalendarDate,
    ) -> CacheKey {
        CacheKey {
            generation: self.generation.load(Ordering::SeqCst),
            snapshot_version: snapshot.version,
            today: today.sort_key(),
            config: config.clone(),
        }
    }

    pub fn get_or_compute(
        &self,
        snapshot: &ClinicSnapshot,
        config: &ReportConfig,
        today: CalendarDate,
    ) -> Result<DashboardReport> {
        let key = self.key(snapshot, config, today);
        if let Some(cached) = self.report.get(&key) {
            debug!("Reusing dashboard report for snapshot v{}", snapshot.version);
            return Ok(cached);
        }

        let report = DashboardProcessor::process(snapshot, config, today)?;
        self.report.set(key, report.clone());
        Ok(report)
    }
}
