//! Bean property access

use recmap_types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property access to the objects records are mapped to.
///
/// The marshaller reads properties through this trait and the unmarshaller
/// writes them, so any struct can take part by implementing it.
pub trait BeanAccessor {
    /// Declared type used to pick a record when marshalling
    fn bean_type(&self) -> &str;

    /// Current value of a property, `None` when unset
    fn get_property(&self, name: &str) -> Option<Value>;

    /// Set or clear a property
    fn set_property(&mut self, name: &str, value: Option<Value>);
}

/// A bean backed by an ordered property map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapBean {
    bean_type: String,
    properties: BTreeMap<String, Value>,
}

impl MapBean {
    /// Create an empty bean of a type
    pub fn new(bean_type: impl Into<String>) -> Self {
        Self {
            bean_type: bean_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Set a property
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Borrow a property
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Property names and values in name order
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl BeanAccessor for MapBean {
    fn bean_type(&self) -> &str {
        &self.bean_type
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        self.properties.get(name).cloned()
    }

    fn set_property(&mut self, name: &str, value: Option<Value>) {
        match value {
            Some(value) => {
                self.properties.insert(name.to_string(), value);
            }
            None => {
                self.properties.remove(name);
            }
        }
    }
}
