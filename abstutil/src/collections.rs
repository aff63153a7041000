use std::collections::BTreeMap;

/// Counts occurrences of each key. Keys iterate in ascending order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Counter<T: Ord> {
    map: BTreeMap<T, usize>,
    sum: usize,
}

impl<T: Ord> Counter<T> {
    pub fn new() -> Counter<T> {
        Counter {
            map: BTreeMap::new(),
            sum: 0,
        }
    }

    pub fn add(&mut self, val: T, amount: usize) -> usize {
        let entry = self.map.entry(val).or_insert(0);
        *entry += amount;
        self.sum += amount;
        *entry
    }

    pub fn inc(&mut self, val: T) -> usize {
        self.add(val, 1)
    }

    /// If the key is missing, returns 0
    pub fn get(&self, val: T) -> usize {
        self.map.get(&val).cloned().unwrap_or(0)
    }

    pub fn sum(&self) -> usize {
        self.sum
    }

    pub fn consume(self) -> BTreeMap<T, usize> {
        self.map
    }
}

impl<T: Ord> FromIterator<T> for Counter<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut c = Counter::new();
        for x in iter {
            c.inc(x);
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_sums() {
        let mut a: Counter<i64> = vec![0, 1, 1].into_iter().collect();
        a.add(3, 2);
        assert_eq!(a.get(1), 2);
        assert_eq!(a.get(2), 0);
        assert_eq!(a.sum(), 5);
        assert_eq!(a.consume().into_iter().collect::<Vec<_>>(), vec![(0, 1), (1, 2), (3, 2)]);
    }
}
