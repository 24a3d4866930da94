//! Double-buffered staging area
//!
//! Two equally sized sample buffers with a write role and a read role.
//! I/O fills the write buffer while compute reads the other; a swap flips
//! the roles in O(1) without copying. Holding a reference across a swap and
//! assuming it still names the same role is a caller error by contract.

/// Two-slot staging buffer with an O(1) role swap
#[derive(Debug)]
pub struct DoubleBuffer {
    buffers: [Vec<f64>; 2],
    write_index: usize,
}

impl DoubleBuffer {
    /// Create a staging area with `bytes` per side, zero-filled
    pub fn new(bytes: usize) -> Self {
        let mut buffer = Self {
            buffers: [Vec::new(), Vec::new()],
            write_index: 0,
        };
        buffer.resize(bytes);
        buffer
    }

    /// Reallocate both sides to `bytes`, zero-filled
    ///
    /// Any previous contents are discarded; the role assignment is kept.
    pub fn resize(&mut self, bytes: usize) {
        let elements = bytes / std::mem::size_of::<f64>();
        for buffer in &mut self.buffers {
            buffer.clear();
            buffer.resize(elements, 0.0);
        }
    }

    /// The buffer currently in the write role
    pub fn write_buffer(&mut self) -> &mut Vec<f64> {
        &mut self.buffers[self.write_index]
    }

    /// The buffer currently in the read role
    pub fn read_buffer(&self) -> &[f64] {
        &self.buffers[1 - self.write_index]
    }

    /// Exchange the read and write roles
    pub fn swap(&mut self) {
        self.write_index = 1 - self.write_index;
    }

    /// Samples per side
    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    /// Whether the staging area holds no samples
    pub fn is_empty(&self) -> bool {
        self.buffers[0].is_empty()
    }
}
