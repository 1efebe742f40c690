//! Cumulative-weight sampling

/// Entries selected by walking cumulative weight bounds in declared order
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTable<T> {
    entries: Vec<(T, u32)>,
}

impl<T> WeightedTable<T> {
    pub fn new(entries: Vec<(T, u32)>) -> Self {
        Self { entries }
    }

    pub fn total_weight(&self) -> u32 {
        self.entries.iter().map(|(_, w)| *w).sum()
    }

    /// First entry whose cumulative upper bound is >= `roll`
    ///
    /// `None` when `roll` lies beyond the total weight.
    pub fn select(&self, roll: u32) -> Option<&T> {
        let mut cumulative = 0u32;
        for (value, weight) in &self.entries {
            cumulative = cumulative.saturating_add(*weight);
            if roll <= cumulative {
                return Some(value);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_boundaries() {
        let table = WeightedTable::new(vec![('a', 60), ('b', 25), ('c', 10), ('d', 4), ('e', 1)]);
        assert_eq!(table.total_weight(), 100);
        assert_eq!(table.select(1), Some(&'a'));
        assert_eq!(table.select(60), Some(&'a'));
        assert_eq!(table.select(61), Some(&'b'));
        assert_eq!(table.select(85), Some(&'b'));
        assert_eq!(table.select(95), Some(&'c'));
        assert_eq!(table.select(99), Some(&'d'));
        assert_eq!(table.select(100), Some(&'e'));
        assert_eq!(table.select(101), None);
    }

    #[test]
    fn test_zero_weight_entries_are_skipped() {
        let table = WeightedTable::new(vec![("never", 0), ("always", 10)]);
        assert_eq!(table.select(1), Some(&"always"));
    }
}
