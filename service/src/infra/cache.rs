//! Process-wide [`Cache`] of reference data.

use std::{collections::HashMap, fmt, future::Future, hash::Hash};

use tokio::sync::RwLock;
use tracing as log;

use crate::domain::{
    calculation::Score, discount_code, pricing, property_type, renovation,
    DiscountCode, FormulaSet, PropertyType,
};

/// Key-value [`Cache`] whose entries live until invalidated.
pub struct Cache<K, V> {
    /// Name of this [`Cache`] used in logs.
    name: &'static str,

    /// Cached entries.
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<K, V> Cache<K, V> {
    /// Creates a new empty [`Cache`] with the provided `name`.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + fmt::Debug,
    V: Clone,
{
    /// Returns the value cached for the provided `key`, loading it with the
    /// provided `load` function on a miss.
    ///
    /// # Errors
    ///
    /// If the `load` function fails. Failures are not cached.
    pub async fn get_or_try_load<F, Fut, E>(
        &self,
        key: K,
        load: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(v) = self.entries.read().await.get(&key) {
            return Ok(v.clone());
        }

        let value = load().await?;
        log::trace!("`{}` cache loaded `{key:?}`", self.name);
        drop(self.entries.write().await.insert(key, value.clone()));
        Ok(value)
    }

    /// Removes the value cached for the provided `key`.
    pub async fn invalidate(&self, key: &K) {
        if self.entries.write().await.remove(key).is_some() {
            log::debug!("`{}` cache invalidated `{key:?}`", self.name);
        }
    }

    /// Removes all the cached values.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        if !entries.is_empty() {
            entries.clear();
            log::debug!("`{}` cache cleared", self.name);
        }
    }
}

/// [`Cache`]s of all the reference data lookups.
#[derive(Debug)]
pub struct Reference {
    /// [`PropertyType`]s by their keys.
    pub property_types: Cache<property_type::Key, Option<PropertyType>>,

    /// List of all [`PropertyType`]s.
    pub property_type_list: Cache<(), Vec<PropertyType>>,

    /// List of all [`renovation::Category`]s.
    pub categories: Cache<(), Vec<renovation::Category>>,

    /// Table of [`renovation::ExtentWeights`].
    pub extent_weights: Cache<(), renovation::ExtentWeights>,

    /// [`FormulaSet`]s by their [`Score`]s.
    pub formulas: Cache<Score, Option<FormulaSet>>,

    /// [`pricing::Entry`]s by their keys.
    pub pricing: Cache<pricing::Key, Option<pricing::Entry>>,

    /// Lists of [`pricing::Entry`]s, optionally filtered by a
    /// [`pricing::Category`].
    pub pricing_lists: Cache<Option<pricing::Category>, Vec<pricing::Entry>>,

    /// [`DiscountCode`]s by their codes.
    pub discount_codes: Cache<discount_code::Code, Option<DiscountCode>>,
}

impl Default for Reference {
    fn default() -> Self {
        Self {
            property_types: Cache::new("property_types"),
            property_type_list: Cache::new("property_type_list"),
            categories: Cache::new("renovation_categories"),
            extent_weights: Cache::new("extent_weights"),
            formulas: Cache::new("formula_sets"),
            pricing: Cache::new("pricing"),
            pricing_lists: Cache::new("pricing_lists"),
            discount_codes: Cache::new("discount_codes"),
        }
    }
}

/// Selection of the [`Cache`] holding `W`s by `B`.
pub trait Cached<W, B> {
    /// Returns the [`Cache`] holding `W`s by `B`.
    fn cache(&self) -> &Cache<B, W>;
}

/// Implements [`Cached`] for [`Reference`] fields.
macro_rules! impl_cached {
    ($($field:ident: $b:ty => $w:ty),* $(,)?) => {$(
        impl Cached<$w, $b> for Reference {
            fn cache(&self) -> &Cache<$b, $w> {
                &self.$field
            }
        }
    )*};
}

impl_cached! {
    property_types: property_type::Key => Option<PropertyType>,
    property_type_list: () => Vec<PropertyType>,
    categories: () => Vec<renovation::Category>,
    extent_weights: () => renovation::ExtentWeights,
    formulas: Score => Option<FormulaSet>,
    pricing: pricing::Key => Option<pricing::Entry>,
    pricing_lists: Option<pricing::Category> => Vec<pricing::Entry>,
    discount_codes: discount_code::Code => Option<DiscountCode>,
}

#[cfg(test)]
mod spec {
    use std::{
        convert::Infallible,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::Cache;

    #[tokio::test]
    async fn loads_once_until_invalidated() {
        let cache = Cache::<&str, usize>::new("test");
        let loads = AtomicUsize::new(0);
        let counter = &loads;
        let load = move || async move {
            Ok::<_, Infallible>(counter.fetch_add(1, Ordering::SeqCst) + 1)
        };

        assert_eq!(cache.get_or_try_load("a", load).await, Ok(1));
        assert_eq!(cache.get_or_try_load("a", load).await, Ok(1));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.invalidate(&"a").await;
        assert_eq!(cache.get_or_try_load("a", load).await, Ok(2));

        cache.clear().await;
        assert_eq!(cache.get_or_try_load("a", load).await, Ok(3));
    }

    #[tokio::test]
    async fn does_not_cache_failures() {
        let cache = Cache::<(), u8>::new("test");

        assert_eq!(
            cache.get_or_try_load((), || async { Err("down") }).await,
            Err("down"),
        );
        assert_eq!(
            cache
                .get_or_try_load((), || async { Ok::<_, &str>(7) })
                .await,
            Ok(7),
        );
    }
}
