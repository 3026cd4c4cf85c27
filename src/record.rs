//! Generic result row / input record: insertion-ordered column name to JSON scalar.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(Map::new())
    }

    /// Build from a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Record(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Present and not null.
    pub fn has(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(v) if !v.is_null())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Integer value; numeric strings (as returned for some driver types) are accepted.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Truthiness the way stored flags behave: non-zero numbers, `true`, non-empty non-"0" text.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(Value::String(s)) => !s.is_empty() && s != "0",
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            _ => false,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Keep only the listed keys, preserving input order.
    pub fn retain_keys(&mut self, allowed: &[&str]) {
        self.0.retain(|k, _| allowed.contains(&k.as_str()));
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn first_value(&self) -> Option<&Value> {
        self.0.values().next()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Later keys overwrite earlier ones.
    pub fn merge(&mut self, other: Record) {
        for (k, v) in other.0 {
            self.0.insert(k, v);
        }
    }

    /// Decode into a typed row struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Record(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_insertion_order() {
        let r = Record::new().with("b", 2).with("a", 1).with("c", 3);
        let keys: Vec<&String> = r.keys().collect();
        assert_eq!(keys, ["b", "a", "c"]);
        assert_eq!(r.first_value(), Some(&json!(2)));
    }

    #[test]
    fn retain_keys_drops_unlisted() {
        let mut r = Record::from_value(json!({"name": "x", "is_admin": 1, "email": "e"})).unwrap();
        r.retain_keys(&["email", "name"]);
        let keys: Vec<&String> = r.keys().collect();
        assert_eq!(keys, ["name", "email"]);
    }

    #[test]
    fn typed_accessors() {
        let r = Record::from_value(json!({"id": "42", "active": 0, "flag": "1", "n": 7})).unwrap();
        assert_eq!(r.get_i64("id"), Some(42));
        assert_eq!(r.get_i64("n"), Some(7));
        assert!(!r.get_bool("active"));
        assert!(r.get_bool("flag"));
        assert!(!r.get_bool("missing"));
    }

    #[test]
    fn decode_into_struct() {
        #[derive(Deserialize)]
        struct Row {
            id: i64,
            name: String,
        }
        let r = Record::new().with("id", 3).with("name", "EICR");
        let row: Row = r.decode().unwrap();
        assert_eq!(row.id, 3);
        assert_eq!(row.name, "EICR");
    }
}
