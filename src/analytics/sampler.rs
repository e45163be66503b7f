/// Decimates the decoded frame sequence down to the inference stride.
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    stride: u64,
}

impl FrameSampler {
    pub fn new(stride: u32) -> Self {
        Self {
            stride: u64::from(stride.max(1)),
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// A frame is forwarded for inference iff `index mod stride == 0`.
    pub fn should_sample(&self, index: u64) -> bool {
        index % self.stride == 0
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(3)
    }
}
