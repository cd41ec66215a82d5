//! # Items
//!
//! Concrete item instances, their frozen snapshots, and the narrow store
//! interface the matcher reads them through.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A floating attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoubleKeyValue {
    /// Attribute name.
    pub key: String,
    /// Attribute value.
    pub value: f64,
}

/// An integer attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongKeyValue {
    /// Attribute name.
    pub key: String,
    /// Attribute value.
    pub value: i64,
}

/// A string attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringKeyValue {
    /// Attribute name.
    pub key: String,
    /// Attribute value.
    pub value: String,
}

macro_rules! kv_ctor {
    ($name:ident, $ty:ty) => {
        impl $name {
            /// Creates a key/value pair.
            #[must_use]
            pub fn new(key: impl Into<String>, value: impl Into<$ty>) -> Self {
                Self {
                    key: key.into(),
                    value: value.into(),
                }
            }
        }
    };
}

kv_ctor!(DoubleKeyValue, f64);
kv_ctor!(LongKeyValue, i64);
kv_ctor!(StringKeyValue, String);

/// Frozen copy of an item's attributes at match time.
///
/// Completion reads these, never the live item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Item id.
    pub id: String,
    /// Floating attributes.
    #[serde(default)]
    pub doubles: Vec<DoubleKeyValue>,
    /// Integer attributes.
    #[serde(default)]
    pub longs: Vec<LongKeyValue>,
    /// String attributes.
    #[serde(default)]
    pub strings: Vec<StringKeyValue>,
}

impl ItemRecord {
    /// Looks up a floating attribute.
    #[must_use]
    pub fn find_double(&self, key: &str) -> Option<f64> {
        self.doubles.iter().find(|kv| kv.key == key).map(|kv| kv.value)
    }

    /// Looks up an integer attribute.
    #[must_use]
    pub fn find_long(&self, key: &str) -> Option<i64> {
        self.longs.iter().find(|kv| kv.key == key).map(|kv| kv.value)
    }

    /// Looks up a string attribute.
    #[must_use]
    pub fn find_string(&self, key: &str) -> Option<&str> {
        self.strings
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    /// Sets a floating attribute, appending it when absent.
    pub fn set_double(&mut self, key: &str, value: f64) {
        match self.doubles.iter_mut().find(|kv| kv.key == key) {
            Some(kv) => kv.value = value,
            None => self.doubles.push(DoubleKeyValue::new(key, value)),
        }
    }

    /// Sets an integer attribute, appending it when absent.
    pub fn set_long(&mut self, key: &str, value: i64) {
        match self.longs.iter_mut().find(|kv| kv.key == key) {
            Some(kv) => kv.value = value,
            None => self.longs.push(LongKeyValue::new(key, value)),
        }
    }

    /// Sets a string attribute, appending it when absent.
    pub fn set_string(&mut self, key: &str, value: &str) {
        match self.strings.iter_mut().find(|kv| kv.key == key) {
            Some(kv) => value.clone_into(&mut kv.value),
            None => self.strings.push(StringKeyValue::new(key, value)),
        }
    }
}

/// Ownership terms of an item, frozen next to its [`ItemRecord`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTerms {
    /// Owner address at match time.
    #[serde(default)]
    pub owner: String,
    /// Transfer fee at match time.
    #[serde(default)]
    pub transfer_fee: u64,
}

/// A live item instance owned by the item store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Cookbook the item belongs to.
    pub cookbook_id: String,
    /// Current owner address.
    #[serde(default)]
    pub owner: String,
    /// Fee charged when the item is transferred.
    #[serde(default)]
    pub transfer_fee: u64,
    /// Current attributes.
    #[serde(flatten)]
    pub attributes: ItemRecord,
}

impl Item {
    /// Creates an item with no attributes.
    #[must_use]
    pub fn new(cookbook_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            cookbook_id: cookbook_id.into(),
            owner: String::new(),
            transfer_fee: 0,
            attributes: ItemRecord {
                id: id.into(),
                ..ItemRecord::default()
            },
        }
    }

    /// Builder: adds a floating attribute.
    #[must_use]
    pub fn with_double(mut self, key: &str, value: f64) -> Self {
        self.attributes.set_double(key, value);
        self
    }

    /// Builder: adds an integer attribute.
    #[must_use]
    pub fn with_long(mut self, key: &str, value: i64) -> Self {
        self.attributes.set_long(key, value);
        self
    }

    /// Builder: adds a string attribute.
    #[must_use]
    pub fn with_string(mut self, key: &str, value: &str) -> Self {
        self.attributes.set_string(key, value);
        self
    }

    /// Item id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.attributes.id
    }

    /// Freezes the current attributes.
    #[must_use]
    pub fn snapshot(&self) -> ItemRecord {
        self.attributes.clone()
    }

    /// Freezes the current owner and transfer fee.
    #[must_use]
    pub fn terms(&self) -> ItemTerms {
        ItemTerms {
            owner: self.owner.clone(),
            transfer_fee: self.transfer_fee,
        }
    }

    /// Rebuilds a live item from frozen parts.
    #[must_use]
    pub fn from_parts(cookbook_id: impl Into<String>, terms: ItemTerms, attributes: ItemRecord) -> Self {
        Self {
            cookbook_id: cookbook_id.into(),
            owner: terms.owner,
            transfer_fee: terms.transfer_fee,
            attributes,
        }
    }
}

/// Read-only item lookup.
///
/// The matcher calls [`ItemStore::get`] at most once per submitted id.
pub trait ItemStore {
    /// Fetches an item by id, scoped to the recipe being executed.
    fn get(&self, cookbook_id: &str, recipe_id: &str, item_id: &str) -> Option<Item>;
}

/// Thread-safe in-memory store, keyed by `(cookbook_id, item_id)`.
///
/// The recipe id is not part of the key.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: RwLock<HashMap<(String, String), Item>>,
}

impl MemoryItemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an item.
    pub fn put(&self, item: Item) {
        let key = (item.cookbook_id.clone(), item.id().to_string());
        self.items.write().insert(key, item);
    }

    /// Removes an item, returning it if present.
    pub fn remove(&self, cookbook_id: &str, item_id: &str) -> Option<Item> {
        self.items
            .write()
            .remove(&(cookbook_id.to_string(), item_id.to_string()))
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// True when the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Visits every item of a cookbook, in unspecified order.
    pub fn for_each_in_cookbook(&self, cookbook_id: &str, mut f: impl FnMut(&Item)) {
        for item in self.items.read().values() {
            if item.cookbook_id == cookbook_id {
                f(item);
            }
        }
    }
}

impl ItemStore for MemoryItemStore {
    fn get(&self, cookbook_id: &str, _recipe_id: &str, item_id: &str) -> Option<Item> {
        self.items
            .read()
            .get(&(cookbook_id.to_string(), item_id.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_set() {
        let mut rec = Item::new("cb", "sword1")
            .with_string("Name", "sword")
            .with_long("HP", 150)
            .with_double("attack", 2.5)
            .snapshot();

        assert_eq!(rec.find_string("Name"), Some("sword"));
        assert_eq!(rec.find_long("HP"), Some(150));
        assert_eq!(rec.find_double("attack"), Some(2.5));
        assert_eq!(rec.find_long("Name"), None);

        rec.set_long("HP", 10);
        rec.set_long("level", 2);
        assert_eq!(rec.find_long("HP"), Some(10));
        assert_eq!(rec.longs.len(), 2);
    }

    #[test]
    fn test_memory_store_scoping() {
        let store = MemoryItemStore::new();
        store.put(Item::new("cb1", "a"));
        store.put(Item::new("cb2", "a").with_long("HP", 1));

        assert_eq!(store.len(), 2);
        assert!(store.get("cb1", "any", "a").unwrap().attributes.longs.is_empty());
        assert_eq!(store.get("cb2", "any", "a").unwrap().attributes.find_long("HP"), Some(1));
        assert!(store.get("cb3", "any", "a").is_none());

        let mut seen = 0;
        store.for_each_in_cookbook("cb1", |_| seen += 1);
        assert_eq!(seen, 1);

        assert!(store.remove("cb1", "a").is_some());
        assert!(store.get("cb1", "any", "a").is_none());
    }

    #[test]
    fn test_terms_round_trip_through_parts() {
        let mut item = Item::new("cb", "x").with_long("HP", 5);
        item.owner = "bob".into();
        item.transfer_fee = 777;

        let rebuilt = Item::from_parts("cb", item.terms(), item.snapshot());
        assert_eq!(rebuilt, item);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut item = Item::new("cb", "x").with_long("HP", 5);
        let snap = item.snapshot();
        item.attributes.set_long("HP", 99);
        assert_eq!(snap.find_long("HP"), Some(5));
    }
}
