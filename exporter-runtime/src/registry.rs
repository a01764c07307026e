//! Metric registry with frozen per-family label schemas.
//!
//! Each family wraps a Prometheus metric vector. The registry only takes its
//! map lock while declaring; writes go straight to the family, whose vector
//! serializes access to its own series, so families never block each other.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, TextEncoder};

use crate::error::RegistryError;

/// Label name to label value, ordered by name.
pub type LabelSet = BTreeMap<String, String>;

/// Kind of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Last value set wins.
    Gauge,
    /// Monotonic, incremented by one.
    Counter,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gauge => write!(f, "gauge"),
            Self::Counter => write!(f, "counter"),
        }
    }
}

#[derive(Clone)]
enum Series {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

struct FamilyInner {
    name: String,
    help: String,
    kind: MetricKind,
    /// Sorted, deduplicated, frozen at declaration.
    label_names: Vec<String>,
    series: Series,
}

/// Handle to a declared metric family. Cheap to clone.
#[derive(Clone)]
pub struct Family {
    inner: Arc<FamilyInner>,
}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("label_names", &self.inner.label_names)
            .finish_non_exhaustive()
    }
}

impl Family {
    fn new(
        name: &str,
        kind: MetricKind,
        label_names: Vec<String>,
        help: &str,
    ) -> Result<Self, RegistryError> {
        let opts = Opts::new(name, help);
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let series = match kind {
            MetricKind::Gauge => Series::Gauge(GaugeVec::new(opts, &names)?),
            MetricKind::Counter => Series::Counter(CounterVec::new(opts, &names)?),
        };

        Ok(Self {
            inner: Arc::new(FamilyInner {
                name: name.to_string(),
                help: help.to_string(),
                kind,
                label_names,
                series,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn help(&self) -> &str {
        &self.inner.help
    }

    pub fn kind(&self) -> MetricKind {
        self.inner.kind
    }

    /// The frozen label names, sorted.
    pub fn label_names(&self) -> &[String] {
        &self.inner.label_names
    }

    /// Whether both handles point at the same family.
    pub fn same_family(&self, other: &Family) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Replace the value of the series identified by `labels`.
    ///
    /// # Errors
    /// `LabelMismatch` if the key set differs from the schema (nothing is
    /// written), `WrongKind` on a counter.
    pub fn set(&self, labels: &LabelSet, value: f64) -> Result<(), RegistryError> {
        let values = self.check_labels(labels)?;
        match &self.inner.series {
            Series::Gauge(vec) => {
                vec.get_metric_with(&values)?.set(value);
                Ok(())
            }
            Series::Counter(_) => Err(self.wrong_kind()),
        }
    }

    /// Add one to the series identified by `labels`, creating it at 1.
    ///
    /// # Errors
    /// `LabelMismatch` if the key set differs from the schema (nothing is
    /// written), `WrongKind` on a gauge.
    pub fn inc(&self, labels: &LabelSet) -> Result<(), RegistryError> {
        let values = self.check_labels(labels)?;
        match &self.inner.series {
            Series::Counter(vec) => {
                vec.get_metric_with(&values)?.inc();
                Ok(())
            }
            Series::Gauge(_) => Err(self.wrong_kind()),
        }
    }

    /// Point-in-time copy of every series in this family.
    pub fn series(&self) -> Vec<(LabelSet, f64)> {
        let families = match &self.inner.series {
            Series::Gauge(vec) => vec.collect(),
            Series::Counter(vec) => vec.collect(),
        };

        families
            .iter()
            .flat_map(MetricFamily::get_metric)
            .map(|metric| {
                let labels: LabelSet = metric
                    .get_label()
                    .iter()
                    .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
                    .collect();
                let value = match self.inner.kind {
                    MetricKind::Gauge => metric.get_gauge().get_value(),
                    MetricKind::Counter => metric.get_counter().get_value(),
                };
                (labels, value)
            })
            .collect()
    }

    /// Value of one series, if it has been written.
    pub fn value(&self, labels: &LabelSet) -> Option<f64> {
        self.series()
            .into_iter()
            .find(|(series_labels, _)| series_labels == labels)
            .map(|(_, value)| value)
    }

    fn check_labels<'a>(
        &self,
        labels: &'a LabelSet,
    ) -> Result<HashMap<&'a str, &'a str>, RegistryError> {
        if !labels.keys().eq(self.inner.label_names.iter()) {
            return Err(RegistryError::LabelMismatch {
                name: self.inner.name.clone(),
                expected: self.inner.label_names.clone(),
                got: labels.keys().cloned().collect(),
            });
        }
        Ok(labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect())
    }

    fn wrong_kind(&self) -> RegistryError {
        RegistryError::WrongKind {
            name: self.inner.name.clone(),
            kind: self.inner.kind,
        }
    }

    fn collector(&self) -> Box<dyn Collector> {
        match &self.inner.series {
            Series::Gauge(vec) => Box::new(vec.clone()),
            Series::Counter(vec) => Box::new(vec.clone()),
        }
    }
}

/// Process-wide registry of metric families.
///
/// Built once at startup and shared through `Arc` with the scheduler and
/// every job run.
pub struct MetricRegistry {
    registry: prometheus::Registry,
    families: RwLock<HashMap<String, Family>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("family_count", &self.len())
            .finish_non_exhaustive()
    }
}

impl MetricRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            registry: prometheus::Registry::new(),
            families: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry that also exposes the baseline process metrics
    /// (CPU, memory, open fds) where the platform supports them.
    pub fn with_process_metrics() -> Self {
        let registry = Self::new();
        registry.register_process_collector();
        registry
    }

    #[cfg(all(feature = "process-metrics", target_os = "linux"))]
    fn register_process_collector(&self) {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        if let Err(e) = self.registry.register(Box::new(collector)) {
            tracing::warn!(error = %e, "Failed to register process metrics");
        }
    }

    #[cfg(not(all(feature = "process-metrics", target_os = "linux")))]
    fn register_process_collector(&self) {
        tracing::debug!("Process metrics not available on this build");
    }

    /// Declare a family, or return the existing one with the same schema.
    ///
    /// The first declaration of a name fixes its kind and label names. A later
    /// call with a different kind or label set fails and changes nothing.
    pub fn declare_or_get<I, S>(
        &self,
        name: &str,
        kind: MetricKind,
        label_names: I,
        help: &str,
    ) -> Result<Family, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let label_names: Vec<String> = label_names
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if let Some(existing) = self.read_families().get(name) {
            return Self::reuse(existing, kind, label_names);
        }

        let mut families = self
            .families
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Another declaration may have won the race for the write lock.
        if let Some(existing) = families.get(name) {
            return Self::reuse(existing, kind, label_names);
        }

        let family = Family::new(name, kind, label_names, help)?;
        self.registry.register(family.collector())?;
        families.insert(name.to_string(), family.clone());

        tracing::debug!(
            metric = %name,
            kind = %kind,
            labels = ?family.label_names(),
            "Metric family declared"
        );
        Ok(family)
    }

    fn reuse(
        existing: &Family,
        kind: MetricKind,
        label_names: Vec<String>,
    ) -> Result<Family, RegistryError> {
        if existing.kind() != kind {
            return Err(RegistryError::KindConflict {
                name: existing.name().to_string(),
                existing: existing.kind(),
                requested: kind,
            });
        }
        if existing.label_names() != label_names.as_slice() {
            return Err(RegistryError::SchemaConflict {
                name: existing.name().to_string(),
                existing: existing.label_names().to_vec(),
                requested: label_names,
            });
        }
        Ok(existing.clone())
    }

    /// Look up a declared family by name.
    pub fn family(&self, name: &str) -> Option<Family> {
        self.read_families().get(name).cloned()
    }

    /// Number of declared families (baseline collectors excluded).
    pub fn len(&self) -> usize {
        self.read_families().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every registered collector, baseline metrics included.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render the current snapshot in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, RegistryError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn read_families(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Family>> {
        self.families.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Content type of [`MetricRegistry::encode_text`] output.
pub fn text_content_type() -> &'static str {
    prometheus::TEXT_FORMAT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_declare_or_get_is_idempotent() {
        let registry = MetricRegistry::new();
        let first = registry
            .declare_or_get("disk_free", MetricKind::Gauge, ["job", "component"], "Free disk")
            .unwrap();
        let second = registry
            .declare_or_get("disk_free", MetricKind::Gauge, ["component", "job"], "Other help")
            .unwrap();

        assert!(first.same_family(&second));
        assert_eq!(second.help(), "Free disk");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_declare_or_get_rejects_other_schema() {
        let registry = MetricRegistry::new();
        registry
            .declare_or_get("disk_free", MetricKind::Gauge, ["job", "component"], "h")
            .unwrap();

        let err = registry
            .declare_or_get("disk_free", MetricKind::Gauge, ["host", "component"], "h")
            .unwrap_err();
        assert!(matches!(err, RegistryError::SchemaConflict { .. }));

        let family = registry.family("disk_free").unwrap();
        assert_eq!(family.label_names(), &["component".to_string(), "job".to_string()]);
    }

    #[test]
    fn test_declare_or_get_rejects_other_kind() {
        let registry = MetricRegistry::new();
        registry
            .declare_or_get("runs", MetricKind::Counter, ["component"], "h")
            .unwrap();

        let err = registry
            .declare_or_get("runs", MetricKind::Gauge, ["component"], "h")
            .unwrap_err();
        assert!(matches!(err, RegistryError::KindConflict { .. }));
        assert_eq!(registry.family("runs").unwrap().kind(), MetricKind::Counter);
    }

    #[test]
    fn test_invalid_metric_name_is_not_registered() {
        let registry = MetricRegistry::new();
        let result = registry.declare_or_get("bad-name", MetricKind::Gauge, ["component"], "h");
        assert!(matches!(result, Err(RegistryError::Prometheus(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_set_replaces_value() {
        let registry = MetricRegistry::new();
        let family = registry
            .declare_or_get("temp", MetricKind::Gauge, ["component"], "h")
            .unwrap();
        let main = labels(&[("component", "main")]);

        family.set(&main, 10.0).unwrap();
        family.set(&main, 3.5).unwrap();

        assert_eq!(family.value(&main), Some(3.5));
        assert_eq!(family.series().len(), 1);
    }

    #[test]
    fn test_set_with_mismatched_labels_writes_nothing() {
        let registry = MetricRegistry::new();
        let family = registry
            .declare_or_get("temp", MetricKind::Gauge, ["component", "job"], "h")
            .unwrap();

        let missing = labels(&[("component", "main")]);
        let extra = labels(&[("component", "main"), ("job", "x"), ("host", "a")]);

        assert!(matches!(
            family.set(&missing, 1.0),
            Err(RegistryError::LabelMismatch { .. })
        ));
        assert!(matches!(
            family.set(&extra, 1.0),
            Err(RegistryError::LabelMismatch { .. })
        ));
        assert!(family.series().is_empty());
    }

    #[test]
    fn test_inc_accumulates() {
        let registry = MetricRegistry::new();
        let family = registry
            .declare_or_get("temp_errors_total", MetricKind::Counter, ["component"], "h")
            .unwrap();
        let main = labels(&[("component", "main")]);

        family.inc(&main).unwrap();
        family.inc(&main).unwrap();

        assert_eq!(family.value(&main), Some(2.0));
    }

    #[test]
    fn test_wrong_operation_for_kind() {
        let registry = MetricRegistry::new();
        let gauge = registry
            .declare_or_get("g", MetricKind::Gauge, ["component"], "h")
            .unwrap();
        let counter = registry
            .declare_or_get("c", MetricKind::Counter, ["component"], "h")
            .unwrap();
        let main = labels(&[("component", "main")]);

        assert!(matches!(gauge.inc(&main), Err(RegistryError::WrongKind { .. })));
        assert!(matches!(counter.set(&main, 1.0), Err(RegistryError::WrongKind { .. })));
    }

    #[test]
    fn test_encode_text_contains_series() {
        let registry = MetricRegistry::new();
        let family = registry
            .declare_or_get("queue_depth", MetricKind::Gauge, ["component"], "Depth")
            .unwrap();
        family.set(&labels(&[("component", "main")]), 7.0).unwrap();

        let text = registry.encode_text().unwrap();
        assert!(text.contains("# HELP queue_depth Depth"));
        assert!(text.contains("# TYPE queue_depth gauge"));
        assert!(text.contains("queue_depth{component=\"main\"} 7"));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let registry = Arc::new(MetricRegistry::new());
        let main = labels(&[("component", "main")]);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let main = main.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        registry
                            .declare_or_get("hits_total", MetricKind::Counter, ["component"], "h")
                            .unwrap()
                            .inc(&main)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let family = registry.family("hits_total").unwrap();
        assert_eq!(family.value(&main), Some(4000.0));
    }
}
