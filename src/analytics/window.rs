use std::collections::VecDeque;

pub const DEFAULT_WINDOW_CAPACITY: usize = 300;

/// Bounded FIFO of per-sample live counts with a rolling mean.
#[derive(Debug, Clone)]
pub struct SlidingWindowStats {
    samples: VecDeque<usize>,
    capacity: usize,
    sum: u64,
}

impl SlidingWindowStats {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0,
        }
    }

    pub fn push(&mut self, live: usize) {
        self.samples.push_back(live);
        self.sum += live as u64;
        if self.samples.len() > self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted as u64;
            }
        }
    }

    /// Mean of the retained samples rounded to two decimals; 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mean = self.sum as f64 / self.samples.len() as f64;
        (mean * 100.0).round() / 100.0
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn oldest(&self) -> Option<usize> {
        self.samples.front().copied()
    }
}

impl Default for SlidingWindowStats {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut window = SlidingWindowStats::default();
        // 1000 first, then 300 ones: the spike must fall out of the mean.
        window.push(1000);
        for _ in 0..300 {
            window.push(1);
        }
        assert_eq!(window.len(), 300);
        assert_eq!(window.oldest(), Some(1));
        assert_eq!(window.average(), 1.0);
    }

    #[test]
    fn average_rounds_to_two_decimals() {
        let mut window = SlidingWindowStats::new(10);
        for value in [1, 2, 2] {
            window.push(value);
        }
        assert_eq!(window.average(), 1.67);
    }

    #[test]
    fn empty_window_averages_zero() {
        let window = SlidingWindowStats::new(5);
        assert!(window.is_empty());
        assert_eq!(window.average(), 0.0);
    }
}
