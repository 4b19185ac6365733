//! Session-scoped visited set.

use dashmap::DashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    New,
    Duplicate,
    /// Capacity reached; the URL is dropped, never evicted-and-refetched
    Full,
}

/// Normalized URLs seen this session. Membership test and insert are a
/// single atomic operation.
pub struct VisitedSet {
    seen: DashSet<String>,
    capacity: usize,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: DashSet::with_capacity(capacity.min(16_384)),
            capacity,
        }
    }

    pub fn admit(&self, key: &str) -> Admission {
        if self.seen.contains(key) {
            return Admission::Duplicate;
        }
        if self.seen.len() >= self.capacity {
            return Admission::Full;
        }
        if self.seen.insert(key.to_string()) {
            Admission::New
        } else {
            Admission::Duplicate
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_once() {
        let visited = VisitedSet::new(10);
        assert_eq!(visited.admit("https://a.com.br/1"), Admission::New);
        assert_eq!(visited.admit("https://a.com.br/1"), Admission::Duplicate);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let visited = VisitedSet::new(2);
        visited.admit("a");
        visited.admit("b");
        assert_eq!(visited.admit("c"), Admission::Full);
        assert_eq!(visited.admit("a"), Admission::Duplicate);
        assert_eq!(visited.len(), 2);
    }
}
