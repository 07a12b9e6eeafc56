//! User data containers
//!
//! Arbitrary ancillary data attached to graph objects by unrelated
//! subsystems (load-time bookkeeping markers, compile markers, editor
//! selections). Containers are never serializable.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a user data container.
///
/// Shallow copies of an object share the same container.
pub type UserData = Arc<UserDataContainer>;

/// Named bag of type-erased values
#[derive(Default)]
pub struct UserDataContainer {
    entries: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl UserDataContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a named value
    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.entries.insert(name.into(), Arc::new(value));
    }

    /// Get a named value of a given type
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.entries.get(name)?.downcast_ref::<T>()
    }

    /// Check whether a named value exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names of all stored values
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wrap into a shareable handle
    pub fn into_shared(self) -> UserData {
        Arc::new(self)
    }
}

impl fmt::Debug for UserDataContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDataContainer")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Graph objects that may carry a user data container
pub trait UserDataHolder {
    /// Current container, if any
    fn user_data(&self) -> Option<&UserData>;

    /// Replace the container
    fn set_user_data(&mut self, data: Option<UserData>);

    /// Detach and return the container
    fn take_user_data(&mut self) -> Option<UserData> {
        let data = self.user_data().cloned();
        self.set_user_data(None);
        data
    }

    /// Check if a container is attached
    fn has_user_data(&self) -> bool {
        self.user_data().is_some()
    }
}

/// Implements [`UserDataHolder`] for a struct with a `user_data: Option<UserData>` field.
macro_rules! impl_user_data_holder {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::user_data::UserDataHolder for $ty {
                fn user_data(&self) -> Option<&$crate::user_data::UserData> {
                    self.user_data.as_ref()
                }

                fn set_user_data(&mut self, data: Option<$crate::user_data::UserData>) {
                    self.user_data = data;
                }
            }
        )*
    };
}

pub(crate) use impl_user_data_holder;
