/// Integer type backing a [`WrappedCounter`].
pub type Count = u64;

/// A counter over `[0, max]` that wraps at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedCounter {
    value: Count,
    max: Count,
}

impl WrappedCounter {
    pub fn new(max: Count) -> Self {
        Self { value: 0, max }
    }

    /// Counter with an initial value, reduced into range like any transform.
    pub fn with_value(max: Count, value: Count) -> Self {
        let mut counter = Self::new(max);
        counter.transform(|_| value);
        counter
    }

    /// Counter whose range covers every pattern of `led_count` LEDs.
    pub fn for_leds(led_count: u32) -> Self {
        let max = match led_count {
            0 => 0,
            n if n >= Count::BITS => Count::MAX,
            n => (1 << n) - 1,
        };
        Self::new(max)
    }

    pub fn value(&self) -> Count {
        self.value
    }

    pub fn max(&self) -> Count {
        self.max
    }

    pub fn increment(&mut self) -> Count {
        self.value = if self.value == self.max {
            0
        } else {
            self.value + 1
        };
        self.value
    }

    pub fn decrement(&mut self) -> Count {
        self.value = if self.value == 0 {
            self.max
        } else {
            self.value - 1
        };
        self.value
    }

    /// Replaces the value with `f(value) mod (max + 1)`.
    ///
    /// Overflow inside `f` (e.g. shifting bits out of a `Count`) is the
    /// caller's concern; only the result is reduced.
    pub fn transform<F>(&mut self, f: F) -> Count
    where
        F: FnOnce(Count) -> Count,
    {
        let next = f(self.value);
        // max == Count::MAX: every value is already in range.
        self.value = match self.max.checked_add(1) {
            Some(modulus) => next % modulus,
            None => next,
        };
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_starts_at_zero() {
        let counter = WrappedCounter::new(15);
        assert_eq!(counter.value(), 0);
        assert_eq!(counter.max(), 15);
    }

    #[test]
    fn test_increment_wraps_at_max() {
        let mut counter = WrappedCounter::with_value(15, 14);
        assert_eq!(counter.increment(), 15);
        assert_eq!(counter.increment(), 0);
        assert_eq!(counter.increment(), 1);
    }

    #[test]
    fn test_decrement_wraps_at_zero() {
        let mut counter = WrappedCounter::new(15);
        assert_eq!(counter.decrement(), 15);
        assert_eq!(counter.decrement(), 14);
    }

    #[test]
    fn test_zero_max_stays_zero() {
        let mut counter = WrappedCounter::new(0);
        assert_eq!(counter.increment(), 0);
        assert_eq!(counter.decrement(), 0);
        assert_eq!(counter.transform(|_| 99), 0);
    }

    #[test]
    fn test_shifts() {
        let mut counter = WrappedCounter::with_value(15, 15);
        assert_eq!(counter.transform(|x| x >> 1), 7);
        assert_eq!(counter.transform(|x| x << 1), 14);
        assert_eq!(counter.transform(|x| x << 1), 12);
    }

    #[test]
    fn test_transform_reduces_modulo() {
        let mut counter = WrappedCounter::new(1023);
        assert_eq!(counter.transform(|_| 1024), 0);
        assert_eq!(counter.transform(|_| 1025 + 1024), 1);
    }

    #[test]
    fn test_full_width_max() {
        let mut counter = WrappedCounter::new(Count::MAX);
        assert_eq!(counter.transform(|_| Count::MAX), Count::MAX);
        assert_eq!(counter.increment(), 0);
        assert_eq!(counter.decrement(), Count::MAX);
    }

    #[test]
    fn test_for_leds() {
        assert_eq!(WrappedCounter::for_leds(4).max(), 15);
        assert_eq!(WrappedCounter::for_leds(10).max(), 1023);
        assert_eq!(WrappedCounter::for_leds(64).max(), Count::MAX);
        assert_eq!(WrappedCounter::for_leds(0).max(), 0);
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Inc,
        Dec,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Inc), Just(Op::Dec)]
    }

    proptest! {
        #[test]
        fn prop_stays_in_range(max in 0u64..4096, ops in prop::collection::vec(op(), 0..200)) {
            let mut counter = WrappedCounter::new(max);
            for op in ops {
                let v = match op {
                    Op::Inc => counter.increment(),
                    Op::Dec => counter.decrement(),
                };
                prop_assert!(v <= max);
                prop_assert_eq!(v, counter.value());
            }
        }

        #[test]
        fn prop_increment_decrement_inverse(max in 0u64..4096, start in any::<u64>()) {
            let mut counter = WrappedCounter::with_value(max, start);
            let before = counter.value();
            counter.increment();
            prop_assert_eq!(counter.decrement(), before);
            counter.decrement();
            prop_assert_eq!(counter.increment(), before);
        }

        #[test]
        fn prop_transform_in_range(max in any::<u64>(), start in any::<u64>(), out in any::<u64>()) {
            let mut counter = WrappedCounter::with_value(max, start);
            let v = counter.transform(|_| out);
            prop_assert!(v <= max);
            if max < u64::MAX {
                prop_assert_eq!(v, out % (max + 1));
            }
        }
    }
}
