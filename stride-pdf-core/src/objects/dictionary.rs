use crate::objects::Object;
use std::collections::BTreeMap;

/// A PDF dictionary. Keys are names without the leading slash.
///
/// Backed by a sorted map so serialization order is deterministic, which
/// keeps repeated saves of the same document byte-identical.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: BTreeMap<String, Object>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Object>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Object)> {
        self.entries.iter_mut()
    }

    /// Fetch a nested dictionary value.
    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        self.get(key).and_then(|obj| obj.as_dict())
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|obj| obj.as_integer())
    }

    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|obj| obj.as_name())
    }

    pub fn get_string_bytes(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(|obj| obj.as_string_bytes())
    }

    pub fn get_reference(&self, key: &str) -> Option<crate::objects::ObjectId> {
        self.get(key).and_then(|obj| obj.as_reference())
    }
}

impl FromIterator<(String, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (String, Object)>>(iter: T) -> Self {
        let mut dict = Dictionary::new();
        for (key, value) in iter {
            dict.set(key, value);
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut dict = Dictionary::new();
        dict.set("Count", 3);
        dict.set("Kids", Object::Array(vec![]));

        assert_eq!(dict.get_integer("Count"), Some(3));
        assert!(dict.get("Missing").is_none());
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut dict = Dictionary::new();
        dict.set("Temp", true);
        assert!(dict.contains_key("Temp"));
        assert_eq!(dict.remove("Temp"), Some(Object::Boolean(true)));
        assert!(!dict.contains_key("Temp"));
    }

    #[test]
    fn test_iteration_is_sorted() {
        let mut dict = Dictionary::new();
        dict.set("Zebra", 1);
        dict.set("Apple", 2);
        dict.set("Mango", 3);

        let keys: Vec<_> = dict.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Apple", "Mango", "Zebra"]);
    }

    #[test]
    fn test_typed_accessors() {
        let mut inner = Dictionary::new();
        inner.set("Deep", Object::name("Value"));

        let mut dict = Dictionary::new();
        dict.set("Child", inner);
        dict.set("Root", Object::Reference(crate::objects::ObjectId::new(1, 0)));
        dict.set("Title", "A title");

        assert_eq!(
            dict.get_dict("Child").and_then(|d| d.get_name("Deep")),
            Some("Value")
        );
        assert_eq!(
            dict.get_reference("Root"),
            Some(crate::objects::ObjectId::new(1, 0))
        );
        assert_eq!(dict.get_string_bytes("Title"), Some(&b"A title"[..]));
    }

    #[test]
    fn test_from_iterator() {
        let dict: Dictionary = vec![
            ("A".to_string(), Object::Integer(1)),
            ("B".to_string(), Object::Integer(2)),
        ]
        .into_iter()
        .collect();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get_integer("B"), Some(2));
    }
}
