use std::collections::BTreeMap;
use std::fmt;

/// A map of OSM-style string key/value pairs. Keys are unique; iteration order is by key, so two
/// maps with the same contents always print and compare the same way.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new(map: BTreeMap<String, String>) -> Tags {
        Tags(map)
    }

    pub fn empty() -> Tags {
        Tags(BTreeMap::new())
    }

    pub fn get(&self, k: &str) -> Option<&String> {
        self.0.get(k)
    }

    pub fn contains_key(&self, k: &str) -> bool {
        self.0.contains_key(k)
    }

    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.contains_key(k))
    }

    pub fn is(&self, k: &str, v: &str) -> bool {
        self.0.get(k).map(|x| x == v).unwrap_or(false)
    }

    pub fn is_any(&self, k: &str, values: &[&str]) -> bool {
        if let Some(v) = self.0.get(k) {
            values.contains(&v.as_ref())
        } else {
            false
        }
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, k: K, v: V) {
        self.0.insert(k.into(), v.into());
    }

    pub fn remove(&mut self, k: &str) -> Option<String> {
        self.0.remove(k)
    }

    /// Copies every tag from `other`, overwriting values on key collision.
    pub fn extend(&mut self, other: &Tags) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn inner(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl fmt::Debug for Tags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tags(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_overwrites() {
        let mut a: Tags = vec![("building", "yes"), ("ref", "1")].into_iter().collect();
        let b: Tags = vec![("building", "retail"), ("addr:housenumber", "3")]
            .into_iter()
            .collect();
        a.extend(&b);
        assert!(a.is("building", "retail"));
        assert!(a.is("ref", "1"));
        assert_eq!(a.len(), 3);
        assert!(a.is_any("addr:housenumber", &["2", "3"]));
        assert!(a.has_any(&["foo", "ref"]));
    }
}
