/// Fixed-length sample delay
///
/// A delay of zero samples passes input straight through.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f64>,
    position: usize,
}

impl DelayLine {
    pub fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            position: 0,
        }
    }

    /// Push a sample and return the one pushed `len()` samples ago
    #[inline]
    pub fn process(&mut self, sample: f64) -> f64 {
        if self.buffer.is_empty() {
            return sample;
        }
        let delayed = std::mem::replace(&mut self.buffer[self.position], sample);
        self.position += 1;
        if self.position == self.buffer.len() {
            self.position = 0;
        }
        delayed
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.position = 0;
    }
}
