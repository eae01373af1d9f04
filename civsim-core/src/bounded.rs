use serde::{Deserialize, Serialize};

/// An integer kept within `[min, max]`. The upper bound may move; the value
/// follows it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundedInt {
    value: i32,
    min: i32,
    max: i32,
}

impl BoundedInt {
    pub const fn new(value: i32, min: i32, max: i32) -> Self {
        let value = if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        };
        Self { value, min, max }
    }

    pub fn get(&self) -> i32 {
        self.value
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn set(&mut self, value: i32) {
        self.value = value.clamp(self.min, self.max);
    }

    /// Move the upper bound, re-clamping the current value.
    pub fn set_max(&mut self, max: i32) {
        self.max = max.max(self.min);
        self.value = self.value.clamp(self.min, self.max);
    }
}

/// City hit points, from 0 up to the city's max health.
pub type Health = BoundedInt;

pub const fn new_health(max: i32) -> Health {
    BoundedInt::new(max, 0, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_health_starts_full() {
        let h = new_health(200);
        assert_eq!(h.get(), 200);
        assert_eq!(h.max(), 200);
    }

    #[test]
    fn test_set_clamps_to_range() {
        let mut h = new_health(200);
        h.set(-40);
        assert_eq!(h.get(), 0);
        h.set(500);
        assert_eq!(h.get(), 200);
    }

    #[test]
    fn test_lowering_max_reclamps_value() {
        let mut h = new_health(250);
        h.set_max(200);
        assert_eq!(h.get(), 200);
        h.set(100);
        h.set_max(300);
        assert_eq!(h.get(), 100);
        h.set_max(-10);
        assert_eq!(h.max(), 0);
        assert_eq!(h.get(), 0);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_health_stays_within_bounds(
            max in 1..1000i32,
            updates in proptest::collection::vec((-1000..1000i32, 0..1000i32), 1..20)
        ) {
            let mut h = new_health(max);
            for (value, new_max) in updates {
                h.set(value);
                prop_assert!(h.get() >= 0 && h.get() <= h.max());
                h.set_max(new_max);
                prop_assert!(h.get() >= 0 && h.get() <= h.max());
            }
        }
    }
}
