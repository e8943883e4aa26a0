use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;

use crate::host::Project;

/// Who a cached project was looked up for: the git host URL and the username the
/// client is scoped to.
pub type Scope = (String, String);

/// Bounded cache of project lookups, partitioned by [`Scope`].
///
/// Only found projects are cached, so a miss always goes back to the git host. Entries
/// are never shared across scopes.
#[derive(Clone)]
pub struct ProjectCache {
    projects: Arc<Mutex<LruCache<(Scope, String), Project>>>,
}

impl ProjectCache {
    /// Creates a new cache of the given size.
    pub fn new(size: NonZeroUsize) -> Self {
        Self {
            projects: Arc::new(Mutex::new(LruCache::new(size))),
        }
    }

    /// Get a cached project, or look it up and cache it if found.
    pub fn get_or_insert<E>(
        &self,
        scope: &Scope,
        namespace_project: &str,
        lookup: impl FnOnce() -> Result<Option<Project>, E>,
    ) -> Result<Option<Project>, E> {
        let key = (scope.clone(), namespace_project.to_owned());
        if let Some(project) = self.lock().get(&key) {
            return Ok(Some(project.clone()));
        }
        // The lock isn't held across the lookup; concurrent misses may both hit the host.
        let project = lookup()?;
        if let Some(project) = &project {
            self.lock().put(key, project.clone());
        }
        Ok(project)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn cap(&self) -> NonZeroUsize {
        self.lock().cap()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<(Scope, String), Project>> {
        // Entries are plain values; a panic elsewhere can't leave them half-written.
        self.projects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
