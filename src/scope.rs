use std::sync::Arc;

use crate::protocol::{Breadcrumb, Event, User, Value};

/// The default number of breadcrumbs a scope retains.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;

/// Holds contextual data for the current unit of work.
///
/// The scope is an object that can be cloned efficiently and stores data
/// that is locally relevant to an event: the user, tags, extra data and the
/// recorded breadcrumbs.  All collections are persistent, so a clone shares
/// structure with its origin until either side is modified, and the two
/// never observe each other's changes.
///
/// Breadcrumbs form a bounded history.  Once `max_breadcrumbs` entries are
/// recorded, adding another evicts the oldest one.
#[derive(Clone, Debug)]
pub struct Scope {
    pub(crate) user: Option<Arc<User>>,
    pub(crate) tags: im::OrdMap<String, String>,
    pub(crate) extra: im::OrdMap<String, Value>,
    pub(crate) breadcrumbs: im::Vector<Breadcrumb>,
    pub(crate) max_breadcrumbs: usize,
}

impl Default for Scope {
    fn default() -> Scope {
        Scope::with_max_breadcrumbs(DEFAULT_MAX_BREADCRUMBS)
    }
}

impl Scope {
    /// Creates an empty scope.
    pub fn new() -> Scope {
        Default::default()
    }

    /// Creates an empty scope that retains at most `max_breadcrumbs`
    /// breadcrumbs.
    pub fn with_max_breadcrumbs(max_breadcrumbs: usize) -> Scope {
        Scope {
            user: None,
            tags: Default::default(),
            extra: Default::default(),
            breadcrumbs: Default::default(),
            max_breadcrumbs,
        }
    }

    /// Clear the scope.
    ///
    /// Removes the user, all tags, extra data and breadcrumbs.  The breadcrumb
    /// capacity is kept.
    pub fn clear(&mut self) {
        statly_debug!("[Scope] Clearing all scope data");
        *self = Scope::with_max_breadcrumbs(self.max_breadcrumbs);
    }

    /// Deletes current breadcrumbs from the scope.
    pub fn clear_breadcrumbs(&mut self) {
        let previous_count = self.breadcrumbs.len();
        self.breadcrumbs = Default::default();
        statly_debug!("[Scope] Cleared {} breadcrumbs", previous_count);
    }

    /// Sets the user for the current scope.
    pub fn set_user(&mut self, user: Option<User>) {
        match (&self.user, &user) {
            (None, Some(new_user)) => statly_debug!(
                "[Scope] Setting user: id={:?}, username={:?}, email={:?}",
                new_user.id,
                new_user.username,
                new_user.email
            ),
            (Some(_), Some(new_user)) => statly_debug!(
                "[Scope] Updating user: id={:?}, username={:?}, email={:?}",
                new_user.id,
                new_user.username,
                new_user.email
            ),
            (Some(_), None) => statly_debug!("[Scope] Removing user"),
            _ => {}
        }
        self.user = user.map(Arc::new);
    }

    /// Retrieves the user of the current scope.
    pub fn user(&self) -> Option<&User> {
        self.user.as_deref()
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&mut self, key: &str, value: V) {
        let value = value.to_string();
        statly_debug!("[Scope] Setting tag: {} = {}", key, value);
        self.tags.insert(key.to_string(), value);
    }

    /// Sets multiple tags at once.
    ///
    /// Tags not named in `tags` are left untouched.
    pub fn set_tags<I, K, V>(&mut self, tags: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        for (key, value) in tags {
            self.set_tag(key.as_ref(), value);
        }
    }

    /// Removes a tag.
    ///
    /// If the tag is not set, does nothing.
    pub fn remove_tag(&mut self, key: &str) {
        if self.tags.remove(key).is_some() {
            statly_debug!("[Scope] Removed tag: {}", key);
        }
    }

    /// Returns the tags of the scope.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sets a extra to a specific value.
    pub fn set_extra(&mut self, key: &str, value: Value) {
        statly_debug!("[Scope] Setting extra: {} = {:?}", key, value);
        self.extra.insert(key.to_string(), value);
    }

    /// Removes a extra.
    pub fn remove_extra(&mut self, key: &str) {
        if self.extra.remove(key).is_some() {
            statly_debug!("[Scope] Removed extra: {}", key);
        }
    }

    /// Returns the extra data of the scope.
    pub fn extra(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.extra.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Records a breadcrumb, evicting the oldest ones beyond capacity.
    pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb) {
        if self.max_breadcrumbs == 0 {
            return;
        }
        self.breadcrumbs.push_back(breadcrumb);
        while self.breadcrumbs.len() > self.max_breadcrumbs {
            self.breadcrumbs.pop_front();
        }
        statly_debug!(
            "[Scope] Added breadcrumb (total: {})",
            self.breadcrumbs.len()
        );
    }

    /// Returns the recorded breadcrumbs, oldest first.
    pub fn breadcrumbs(&self) -> impl Iterator<Item = &Breadcrumb> {
        self.breadcrumbs.iter()
    }

    /// The maximum number of breadcrumbs this scope retains.
    pub fn max_breadcrumbs(&self) -> usize {
        self.max_breadcrumbs
    }

    /// Applies the contained scoped data to fill an event.
    ///
    /// Values already present on the event win over the scope's.  Scope
    /// breadcrumbs are placed before the event's own.
    pub fn apply_to_event(&self, mut event: Event<'static>) -> Event<'static> {
        statly_debug!("[Scope] Applying scope to event {}", event.event_id);

        if event.user.is_none() {
            if let Some(user) = self.user.as_deref() {
                event.user = Some(user.clone());
            }
        }

        if !self.breadcrumbs.is_empty() {
            let own = std::mem::take(&mut event.breadcrumbs.values);
            event.breadcrumbs = self
                .breadcrumbs
                .iter()
                .cloned()
                .chain(own)
                .collect();
        }

        for (key, value) in self.tags.iter() {
            event
                .tags
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        for (key, value) in self.extra.iter() {
            event
                .extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        event
    }
}
