use heapless::Deque;

/// Moving average over the last `N` values.
#[derive(Debug, Clone, Default)]
pub struct RollingAverage<const N: usize> {
    window: Deque<f32, N>,
}

impl<const N: usize> RollingAverage<N> {
    pub const fn new() -> Self {
        Self {
            window: Deque::new(),
        }
    }

    /// Adds a value, dropping the oldest one when the window is full.
    pub fn push(&mut self, value: f32) {
        if self.window.is_full() {
            self.window.pop_front();
        }
        // cannot fail, a slot was just freed
        let _ = self.window.push_back(value);
    }

    /// Removes and returns the oldest value.
    pub fn pop_oldest(&mut self) -> Option<f32> {
        self.window.pop_front()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Mean of the window, 0 when empty.
    pub fn average(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f32>() / self.window.len() as f32
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.window.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_average_is_zero() {
        let avg = RollingAverage::<5>::new();
        assert!(avg.is_empty());
        assert_eq!(avg.average(), 0.0);
    }

    #[test]
    fn oldest_value_falls_out() {
        let mut avg = RollingAverage::<5>::new();
        for v in 1..=7 {
            avg.push(v as f32);
        }
        assert_eq!(avg.len(), 5);
        assert_eq!(avg.average(), 5.0);
        assert_eq!(avg.pop_oldest(), Some(3.0));
        assert_eq!(avg.len(), 4);
    }

    #[test]
    fn partial_window_averages_what_it_has() {
        let mut avg = RollingAverage::<5>::new();
        avg.push(10.0);
        avg.push(20.0);
        assert_eq!(avg.average(), 15.0);
        assert_eq!(avg.iter().copied().collect::<std::vec::Vec<_>>(), [10.0, 20.0]);
    }
}
