/// Monotonic frame counter; the slot of frame `n` is `n mod frames_in_flight`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounter {
    value: u64,
    frames_in_flight: usize,
}

impl FrameCounter {
    /// `frames_in_flight` must be non-zero (checked by the scheduler)
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            value: 0,
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn slot(&self) -> usize {
        (self.value % self.frames_in_flight as u64) as usize
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Advance by exactly one completed cycle
    pub fn advance(&mut self) {
        self.value += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::FrameCounter;

    #[test]
    fn test_slot_cycles() {
        let mut counter = FrameCounter::new(2);
        let mut slots = Vec::new();
        for _ in 0..5 {
            slots.push(counter.slot());
            counter.advance();
        }
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(counter.value(), 5);
    }

    #[test]
    fn test_three_frames_in_flight() {
        let mut counter = FrameCounter::new(3);
        for _ in 0..4 {
            counter.advance();
        }
        assert_eq!(counter.slot(), 1);
        assert_eq!(counter.frames_in_flight(), 3);
    }
}
