//! Shared utilities and strongly-typed common values for the relay crates.
//!
//! ```rust
//! use rcommon::{GenerationOptions, SessionId, UserId};
//!
//! let session = SessionId::from("session-1");
//! let user = UserId::new("user-7");
//!
//! let options = GenerationOptions::default()
//!     .with_temperature(0.3)
//!     .with_top_p(0.9)
//!     .with_stop(["\n\n"]);
//! assert_eq!(session.as_str(), "session-1");
//! assert_eq!(user.to_string(), "user-7");
//! assert_eq!(options.stop, vec!["\n\n".to_string()]);
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use rcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Cross-crate identifier newtypes.
    //!
    //! ```rust
    //! use rcommon::{SessionId, TraceId, UserId};
    //!
    //! let session = SessionId::new("session-42");
    //! let user = UserId::from("user-42");
    //! let trace = TraceId::from("trace-42");
    //!
    //! assert_eq!(session.to_string(), "session-42");
    //! assert_eq!(user.as_str(), "user-42");
    //! assert_eq!(trace.as_str(), "trace-42");
    //! ```

    use std::fmt::{Display, Formatter};

    macro_rules! string_id {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        };
    }

    string_id!(
        /// Identifies one conversation; all turns of a session replay in creation order.
        SessionId
    );
    string_id!(
        /// Identifies the account that owns sessions and quota counters.
        UserId
    );
    string_id!(TraceId);
}

pub mod model {
    //! Sampling settings shared by every upstream request.
    //!
    //! ```rust
    //! use rcommon::GenerationOptions;
    //!
    //! let options = GenerationOptions::default()
    //!     .with_temperature(0.2)
    //!     .with_max_tokens(128)
    //!     .with_presence_penalty(0.5);
    //!
    //! assert_eq!(options.temperature, Some(0.2));
    //! assert_eq!(options.max_tokens, Some(128));
    //! assert_eq!(options.presence_penalty, Some(0.5));
    //! ```

    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct GenerationOptions {
        pub temperature: Option<f32>,
        pub max_tokens: Option<u32>,
        pub top_p: Option<f32>,
        pub frequency_penalty: Option<f32>,
        pub presence_penalty: Option<f32>,
        /// Empty means "no stop sequences" and is omitted on the wire.
        pub stop: Vec<String>,
    }

    impl GenerationOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }

        pub fn with_top_p(mut self, top_p: f32) -> Self {
            self.top_p = Some(top_p);
            self
        }

        pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
            self.frequency_penalty = Some(penalty);
            self
        }

        pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
            self.presence_penalty = Some(penalty);
            self
        }

        pub fn with_stop<I, S>(mut self, stop: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.stop = stop.into_iter().map(Into::into).collect();
            self
        }
    }
}

pub mod registry {
    //! Generic registry map wrapper used by runtime registries.
    //!
    //! Iteration follows insertion order so that declarations advertised to the
    //! model are stable between requests.
    //!
    //! ```rust
    //! use rcommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("beta".to_string(), 2_u32);
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert_eq!(registry.values().copied().collect::<Vec<_>>(), vec![2, 1]);
    //! ```

    use std::borrow::Borrow;
    use std::collections::HashMap;
    use std::hash::Hash;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        index: HashMap<K, usize>,
        entries: Vec<(K, V)>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Eq + Hash,
    {
        fn default() -> Self {
            Self {
                index: HashMap::new(),
                entries: Vec::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq + Hash + Clone,
    {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            if let Some(position) = self.index.get(&key) {
                return Some(std::mem::replace(&mut self.entries[*position].1, value));
            }

            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
            None
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.index
                .get(key)
                .map(|position| &self.entries[*position].1)
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            let position = self.index.remove(key)?;
            let (_, value) = self.entries.remove(position);
            for slot in self.index.values_mut() {
                if *slot > position {
                    *slot -= 1;
                }
            }
            Some(value)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.index.contains_key(key)
        }

        pub fn keys(&self) -> impl Iterator<Item = &K> {
            self.entries.iter().map(|(key, _)| key)
        }

        pub fn values(&self) -> impl Iterator<Item = &V> {
            self.entries.iter().map(|(_, value)| value)
        }

        pub fn len(&self) -> usize {
            self.entries.len()
        }

        pub fn is_empty(&self) -> bool {
            self.entries.is_empty()
        }
    }
}

pub use context::{SessionId, TraceId, UserId};
pub use future::BoxFuture;
pub use model::GenerationOptions;
pub use registry::Registry;

#[cfg(test)]
mod tests {
    use super::{GenerationOptions, Registry, SessionId, UserId};

    #[test]
    fn id_newtypes_round_trip_strings() {
        let session = SessionId::new("session-1");
        let user = UserId::from("user-1");

        assert_eq!(session.as_str(), "session-1");
        assert_eq!(user.as_str(), "user-1");
        assert_eq!(session.to_string(), "session-1");
        assert_eq!(user.to_string(), "user-1");
    }

    #[test]
    fn generation_options_builder_helpers_set_values() {
        let options = GenerationOptions::default()
            .with_temperature(0.3)
            .with_max_tokens(123)
            .with_top_p(1.0)
            .with_frequency_penalty(0.1)
            .with_stop(["END", "STOP"]);

        assert_eq!(options.temperature, Some(0.3));
        assert_eq!(options.max_tokens, Some(123));
        assert_eq!(options.top_p, Some(1.0));
        assert_eq!(options.frequency_penalty, Some(0.1));
        assert_eq!(options.presence_penalty, None);
        assert_eq!(options.stop, vec!["END".to_string(), "STOP".to_string()]);
    }

    #[test]
    fn registry_preserves_insertion_order_across_removal() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());

        registry.insert("alpha".to_string(), 1_u32);
        registry.insert("beta".to_string(), 2_u32);
        registry.insert("gamma".to_string(), 3_u32);
        assert_eq!(registry.insert("beta".to_string(), 20), Some(2));

        assert_eq!(registry.remove("alpha"), Some(1));
        assert_eq!(registry.get("gamma"), Some(&3));
        assert_eq!(
            registry.keys().cloned().collect::<Vec<_>>(),
            vec!["beta".to_string(), "gamma".to_string()]
        );
        assert_eq!(registry.len(), 2);
    }
}
