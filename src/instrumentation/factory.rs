//! One facade per (component, version).

use std::fmt;
use std::sync::Arc;

use super::cache::InstrumentCache;
use super::facade::{Instrumentation, DEFAULT_VERSION};
use crate::error::{Result, TelemetryError};

type Builder = dyn Fn(&str, &str) -> Result<Instrumentation> + Send + Sync;

/// Hands out shared [`Instrumentation`] facades keyed by component and version.
///
/// The application owns the factory (usually one per process). Entries live
/// as long as the factory; there is no eviction.
pub struct InstrumentationFactory {
    builder: Box<Builder>,
    instances: InstrumentCache<(String, String), Instrumentation>,
}

impl Default for InstrumentationFactory {
    /// Facades bound to the globally installed OpenTelemetry providers.
    fn default() -> Self {
        Self::with_builder(|component, version| Instrumentation::new(component, Some(version)))
    }
}

impl InstrumentationFactory {
    /// Factory whose facades use the global OpenTelemetry providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `builder` to construct facades on a cache miss.
    pub fn with_builder<F>(builder: F) -> Self
    where
        F: Fn(&str, &str) -> Result<Instrumentation> + Send + Sync + 'static,
    {
        Self {
            builder: Box::new(builder),
            instances: InstrumentCache::new(),
        }
    }

    /// Return the facade for `(component, version)`, building it on first use.
    ///
    /// Concurrent callers with the same key all receive the same instance.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidArgument`] for an empty component, or
    /// whatever the builder fails with. A failed build caches nothing.
    pub fn create(&self, component: &str, version: Option<&str>) -> Result<Arc<Instrumentation>> {
        if component.is_empty() {
            return Err(TelemetryError::empty("component"));
        }
        let version = version.unwrap_or(DEFAULT_VERSION);

        self.instances
            .try_get_or_create((component.to_string(), version.to_string()), || {
                tracing::debug!(component, version, "Building instrumentation");
                (self.builder)(component, version).map(Arc::new)
            })
    }

    /// [`create`](Self::create) with the default version.
    pub fn create_default(&self, component: &str) -> Result<Arc<Instrumentation>> {
        self.create(component, None)
    }

    /// Number of cached facades.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether no facade has been built yet.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl fmt::Debug for InstrumentationFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentationFactory")
            .field("instances", &self.instances.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DisabledSpanEmitter, RecordingMetricEmitter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_factory(builds: Arc<AtomicUsize>) -> InstrumentationFactory {
        InstrumentationFactory::with_builder(move |component, version| {
            builds.fetch_add(1, Ordering::SeqCst);
            Instrumentation::with_emitters(
                component,
                Some(version),
                Arc::new(DisabledSpanEmitter),
                Arc::new(RecordingMetricEmitter::new()),
            )
        })
    }

    #[test]
    fn test_create_returns_same_instance() {
        let builds = Arc::new(AtomicUsize::new(0));
        let factory = recording_factory(builds.clone());

        let first = factory.create("svc", Some("1.0")).unwrap();
        let second = factory.create("svc", Some("1.0")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_version_is_part_of_key() {
        let factory = recording_factory(Arc::new(AtomicUsize::new(0)));

        let v1 = factory.create("svc", Some("1.0")).unwrap();
        let v2 = factory.create("svc", Some("2.0")).unwrap();

        assert!(!Arc::ptr_eq(&v1, &v2));
        assert_eq!(v2.version(), "2.0");
        assert_eq!(factory.len(), 2);
    }

    #[test]
    fn test_create_default_uses_default_version() {
        let factory = recording_factory(Arc::new(AtomicUsize::new(0)));

        let implicit = factory.create_default("svc").unwrap();
        let explicit = factory.create("svc", Some(DEFAULT_VERSION)).unwrap();

        assert_eq!(implicit.version(), DEFAULT_VERSION);
        assert!(Arc::ptr_eq(&implicit, &explicit));
    }

    #[test]
    fn test_empty_component_rejected_before_build() {
        let builds = Arc::new(AtomicUsize::new(0));
        let factory = recording_factory(builds.clone());

        assert!(matches!(
            factory.create("", None),
            Err(TelemetryError::InvalidArgument {
                name: "component",
                ..
            })
        ));
        assert_eq!(builds.load(Ordering::SeqCst), 0);
        assert!(factory.is_empty());
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let factory = InstrumentationFactory::with_builder(|_, _| {
            Err(TelemetryError::Config("unavailable".to_string()))
        });

        assert!(factory.create("svc", None).is_err());
        assert!(factory.is_empty());
    }
}
