use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use log::{debug, warn};
use tokio::sync::OnceCell;

use super::generator::TextGenerator;
use super::rules::{fallback_description, RuleTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionSource {
    Cache,
    Rule,
    Generator,
    Fallback,
}

type Slot = Arc<OnceCell<(String, DescriptionSource)>>;

/// Turns an (application, window) pair into a task description.
///
/// Lookup order: memoized result, rule table, then the remote generator with
/// a fixed fallback. Every pair gets one slot for the life of the process;
/// overlapping callers wait on the same in-flight lookup, so the generator
/// sees each pair at most once and every caller gets the same string.
pub struct DescriptionResolver {
    rules: RuleTable,
    generator: Arc<dyn TextGenerator>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl DescriptionResolver {
    pub fn new(rules: RuleTable, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            rules,
            generator,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, app: &str, window: &str) -> String {
        self.resolve_with_source(app, window).await.0
    }

    /// Callers that waited on another caller's lookup report that lookup's
    /// source; later calls report `Cache`.
    pub async fn resolve_with_source(&self, app: &str, window: &str) -> (String, DescriptionSource) {
        let key = cache_key(app, window);
        let slot = self.slot(&key);
        if let Some((hit, _)) = slot.get() {
            return (hit.clone(), DescriptionSource::Cache);
        }

        let (description, source) = slot.get_or_init(|| self.lookup(app, window, &key)).await;
        (description.clone(), *source)
    }

    pub fn cached_len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    async fn lookup(&self, app: &str, window: &str, key: &str) -> (String, DescriptionSource) {
        let (description, source) = match self.rules.describe(app, window) {
            Some(description) => (description.to_string(), DescriptionSource::Rule),
            None => match self.generator.generate(app, window).await {
                Ok(description) => (description, DescriptionSource::Generator),
                Err(err) => {
                    warn!("Description generation failed for {key}: {err}; using fallback");
                    (fallback_description(window), DescriptionSource::Fallback)
                }
            },
        };
        debug!("Resolved {key} via {source:?}: {description}");
        (description, source)
    }
}

fn cache_key(app: &str, window: &str) -> String {
    format!("{app}:{window}")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::describe::generator::TextGenerator;
    use crate::error::GenerationError;

    /// Answers with `"✨ {window}"` or fails, counting every call.
    #[derive(Default)]
    pub struct CountingGenerator {
        pub calls: AtomicUsize,
        pub fail: bool,
        pub delay: Duration,
    }

    impl CountingGenerator {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Sleeps for `delay` before answering.
        pub fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _app: &str, window: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                Err(GenerationError::Empty)
            } else {
                Ok(format!("✨ {window}"))
            }
        }
    }
}
