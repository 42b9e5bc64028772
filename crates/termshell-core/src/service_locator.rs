//! Lazy service locator.
//!
//! Components register under a name either a ready value or a factory that
//! builds the value on first use. Factories receive the locator itself so
//! they can pull in their own dependencies, which lets components register
//! before whatever they depend on exists.
//!
//! Resolution failures never escape as panics: [`ServiceLocator::get`] logs
//! and returns `None`, and callers degrade gracefully. A factory that (directly
//! or through other factories) asks for the service it is building is cut off
//! at the first re-entry instead of recursing.

use std::any::{Any, type_name};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::ShellError;

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&ServiceLocator) -> Result<Instance, ShellError> + Send + Sync>;

#[derive(Clone)]
struct ServiceEntry {
    instance: Option<Instance>,
    factory: Option<Factory>,
}

#[derive(Default)]
struct Registry {
    services: BTreeMap<String, ServiceEntry>,
    loading: HashSet<String>,
}

/// Name-keyed registry of shared services.
///
/// Values are stored type-erased and handed out by clone, so register cheap
/// handles such as `Arc<T>` or [`EventBus`](crate::event_bus::EventBus).
#[derive(Default)]
pub struct ServiceLocator {
    registry: Mutex<Registry>,
}

impl fmt::Debug for ServiceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceLocator")
            .field("services", &self.names())
            .finish()
    }
}

impl ServiceLocator {
    /// Creates an empty locator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, name: &str, entry: ServiceEntry) {
        if self
            .registry()
            .services
            .insert(name.to_owned(), entry)
            .is_some()
        {
            debug!(service = name, "service registration replaced");
        }
    }

    /// Registers an already-built value.
    pub fn register_instance<T>(&self, name: &str, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.insert(
            name,
            ServiceEntry {
                instance: Some(Arc::new(value)),
                factory: None,
            },
        );
        debug!(service = name, kind = "instance", "service registered");
    }

    /// Registers a factory invoked on the first successful resolution; its
    /// result is cached for the locator's lifetime.
    pub fn register_factory<T, F>(&self, name: &str, factory: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&ServiceLocator) -> Result<T, ShellError> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |locator| {
            factory(locator).map(|value| Arc::new(value) as Instance)
        });
        self.insert(
            name,
            ServiceEntry {
                instance: None,
                factory: Some(factory),
            },
        );
        debug!(service = name, kind = "factory", "service registered");
    }

    /// Returns whether `name` is registered, without resolving it.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.registry().services.contains_key(name)
    }

    /// Registered service names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.registry().services.keys().cloned().collect()
    }

    /// Resolves `name`, logging and returning `None` on any failure.
    #[must_use]
    pub fn get<T>(&self, name: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.try_get(name) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(service = name, error = %err, "service unavailable");
                None
            }
        }
    }

    /// Resolves `name`, reporting why it is unavailable.
    ///
    /// Factory resolution assumes a single resolver: the in-progress set is
    /// shared, so a second thread resolving the same factory at the same
    /// time is reported as `CircularDependency`. Resolve factories up front,
    /// before the locator is shared across tasks.
    ///
    /// # Errors
    ///
    /// - `ShellError::Configuration` if nothing is registered under `name`,
    ///   the factory fails, or the value is not a `T`.
    /// - `ShellError::CircularDependency` if `name` is already being resolved
    ///   further up the call stack; the factory is not invoked again.
    pub fn try_get<T>(&self, name: &str) -> Result<T, ShellError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let factory = {
            let mut registry = self.registry();
            let Some(entry) = registry.services.get(name).cloned() else {
                return Err(ShellError::Configuration(format!(
                    "service `{name}` is not registered"
                )));
            };
            if let Some(instance) = entry.instance {
                return downcast(name, &instance);
            }
            if registry.loading.contains(name) {
                return Err(ShellError::CircularDependency(name.to_owned()));
            }
            let Some(factory) = entry.factory else {
                return Err(ShellError::Configuration(format!(
                    "service `{name}` has neither an instance nor a factory"
                )));
            };
            registry.loading.insert(name.to_owned());
            factory
        };

        debug!(service = name, "resolving service");
        let built = factory(self);

        let mut registry = self.registry();
        registry.loading.remove(name);
        let instance = built.map_err(|err| {
            ShellError::Configuration(format!("factory for `{name}` failed: {err}"))
        })?;
        // Keep the first value if a nested resolution already cached one.
        let cached = match registry.services.get_mut(name) {
            Some(entry) => entry.instance.get_or_insert(instance).clone(),
            None => instance,
        };
        drop(registry);
        downcast(name, &cached)
    }
}

fn downcast<T>(name: &str, instance: &Instance) -> Result<T, ShellError>
where
    T: Clone + Send + Sync + 'static,
{
    instance.downcast_ref::<T>().cloned().ok_or_else(|| {
        ShellError::Configuration(format!(
            "service `{name}` is not a `{}`",
            type_name::<T>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Storage {
        label: &'static str,
    }

    #[test]
    fn test_get_returns_identical_registered_instance() {
        // Arrange
        let locator = ServiceLocator::new();
        let storage = Arc::new(Storage { label: "local" });
        locator.register_instance("storage", Arc::clone(&storage));

        // Act
        let first: Arc<Storage> = locator.get("storage").unwrap();
        let second: Arc<Storage> = locator.get("storage").unwrap();

        // Assert
        assert!(Arc::ptr_eq(&first, &storage));
        assert!(Arc::ptr_eq(&second, &storage));
    }

    #[test]
    fn test_factory_runs_once_and_result_is_cached() {
        // Arrange
        let locator = ServiceLocator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        locator.register_factory("storage", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Storage { label: "lazy" }))
        });

        // Act
        let first: Arc<Storage> = locator.get("storage").unwrap();
        let second: Arc<Storage> = locator.get("storage").unwrap();

        // Assert
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.label, "lazy");
    }

    #[test]
    fn test_registering_does_not_invoke_factory() {
        // Arrange
        let locator = ServiceLocator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        // Act
        locator.register_factory("audio", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(1_u8)
        });

        // Assert
        assert!(locator.has("audio"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_factory_can_resolve_dependencies_registered_later() {
        // Arrange
        let locator = ServiceLocator::new();
        locator.register_factory("greeting", |locator| {
            let name: String = locator.try_get("name")?;
            Ok(format!("hello {name}"))
        });
        locator.register_instance("name", "lab1".to_owned());

        // Act
        let greeting: Option<String> = locator.get("greeting");

        // Assert
        assert_eq!(greeting.as_deref(), Some("hello lab1"));
    }

    #[test]
    fn test_unregistered_service_is_unavailable() {
        let locator = ServiceLocator::new();

        assert_eq!(locator.get::<String>("missing"), None);
        match locator.try_get::<String>("missing") {
            Err(ShellError::Configuration(message)) => assert!(message.contains("missing")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_self_referential_factory_is_cut_off_after_one_detection() {
        // Arrange
        let locator = ServiceLocator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let inner_results = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::clone(&calls);
        let results = Arc::clone(&inner_results);
        locator.register_factory("loop", move |locator| {
            counter.fetch_add(1, Ordering::SeqCst);
            results
                .lock()
                .unwrap()
                .push(locator.try_get::<u32>("loop"));
            Ok(7_u32)
        });

        // Act
        let resolved: Option<u32> = locator.get("loop");

        // Assert
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *inner_results.lock().unwrap(),
            vec![Err(ShellError::CircularDependency("loop".into()))]
        );
        assert_eq!(resolved, Some(7));
    }

    #[test]
    fn test_transitive_cycle_returns_none() {
        // Arrange
        let locator = ServiceLocator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let a_calls = Arc::clone(&calls);
        let b_calls = Arc::clone(&calls);
        locator.register_factory("a", move |locator| {
            a_calls.fetch_add(1, Ordering::SeqCst);
            locator
                .get::<u32>("b")
                .ok_or_else(|| ShellError::Configuration("b unavailable".into()))
        });
        locator.register_factory("b", move |locator| {
            b_calls.fetch_add(1, Ordering::SeqCst);
            locator
                .get::<u32>("a")
                .ok_or_else(|| ShellError::Configuration("a unavailable".into()))
        });

        // Act
        let resolved = locator.get::<u32>("a");

        // Assert
        assert_eq!(resolved, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_factory_clears_loading_state_and_can_retry() {
        // Arrange
        let locator = ServiceLocator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        locator.register_factory("flaky", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ShellError::Transport("backend not ready".into()))
            } else {
                Ok(3_u32)
            }
        });

        // Act
        let first = locator.get::<u32>("flaky");
        let second = locator.get::<u32>("flaky");

        // Assert
        assert_eq!(first, None);
        assert_eq!(second, Some(3));
    }

    #[test]
    fn test_factory_resolved_up_front_serves_concurrent_readers() {
        // Arrange
        let locator = ServiceLocator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        locator.register_factory("shared", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(5_u32))
        });
        let first: Arc<u32> = locator.try_get("shared").unwrap();

        // Act
        let resolved: Vec<Result<Arc<u32>, ShellError>> = std::thread::scope(|scope| {
            let readers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| locator.try_get::<Arc<u32>>("shared")))
                .collect();
            readers.into_iter().map(|r| r.join().unwrap()).collect()
        });

        // Assert
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(
            resolved
                .iter()
                .all(|r| r.as_ref().is_ok_and(|value| Arc::ptr_eq(value, &first)))
        );
    }

    #[test]
    fn test_type_mismatch_is_unavailable() {
        // Arrange
        let locator = ServiceLocator::new();
        locator.register_instance("count", 3_u32);

        // Act
        let result = locator.try_get::<String>("count");

        // Assert
        match result {
            Err(ShellError::Configuration(message)) => assert!(message.contains("String")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_reregistering_replaces_previous_entry() {
        let locator = ServiceLocator::new();
        locator.register_instance("mode", "first".to_owned());
        locator.register_instance("mode", "second".to_owned());

        assert_eq!(locator.get::<String>("mode").as_deref(), Some("second"));
        assert_eq!(locator.names(), vec!["mode".to_owned()]);
    }
}
