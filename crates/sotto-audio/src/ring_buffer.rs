/// Fixed-capacity circular buffer over mono f32 samples.
///
/// Ingest is amortised O(1) and memory is bounded: once full, the oldest
/// samples are overwritten. Reads (`tail`, `slice`) return freshly allocated
/// contiguous copies so callers never observe the wrap.
pub struct RingBuffer {
    buf: Vec<f32>,
    write_pos: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            buf: vec![0.0; capacity],
            write_pos: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of retained samples, saturating at capacity.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append samples, overwriting the oldest on overflow. An append larger
    /// than the whole buffer keeps only the last `capacity` samples.
    pub fn append(&mut self, audio: &[f32]) {
        let n = audio.len();
        if n == 0 {
            return;
        }

        let cap = self.buf.len();
        if n >= cap {
            self.buf.copy_from_slice(&audio[n - cap..]);
            self.write_pos = 0;
            self.len = cap;
            return;
        }

        let end_pos = self.write_pos + n;
        if end_pos <= cap {
            self.buf[self.write_pos..end_pos].copy_from_slice(audio);
        } else {
            let first = cap - self.write_pos;
            self.buf[self.write_pos..].copy_from_slice(&audio[..first]);
            self.buf[..n - first].copy_from_slice(&audio[first..]);
        }

        self.write_pos = end_pos % cap;
        self.len = (self.len + n).min(cap);
    }

    /// Contiguous copy of the last `min(n, len)` samples.
    pub fn tail(&self, n: usize) -> Vec<f32> {
        let n = n.min(self.len);
        if n == 0 {
            return Vec::new();
        }

        let cap = self.buf.len();
        let end_pos = self.write_pos;
        let start_pos = (end_pos + cap - n % cap) % cap;

        if start_pos < end_pos {
            self.buf[start_pos..end_pos].to_vec()
        } else {
            let mut out = Vec::with_capacity(n);
            out.extend_from_slice(&self.buf[start_pos..]);
            out.extend_from_slice(&self.buf[..end_pos]);
            out
        }
    }

    /// Contiguous copy of all retained samples, oldest first.
    pub fn to_vec(&self) -> Vec<f32> {
        self.tail(self.len)
    }

    /// Contiguous copy of the logical range `[start, end)`, where index 0 is
    /// the oldest retained sample. Out-of-range bounds are clamped; an
    /// inverted range yields an empty vec.
    pub fn slice(&self, start: usize, end: usize) -> Vec<f32> {
        let start = start.min(self.len);
        let end = end.min(self.len);
        if start >= end {
            return Vec::new();
        }

        let cap = self.buf.len();
        let oldest = (self.write_pos + cap - self.len % cap) % cap;
        let abs_start = (oldest + start) % cap;
        let abs_end = (oldest + end) % cap;

        if abs_start < abs_end {
            self.buf[abs_start..abs_end].to_vec()
        } else {
            let mut out = Vec::with_capacity(end - start);
            out.extend_from_slice(&self.buf[abs_start..]);
            out.extend_from_slice(&self.buf[..abs_end]);
            out
        }
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ramp(n: usize, from: f32) -> Vec<f32> {
        (0..n).map(|i| from + i as f32).collect()
    }

    #[test]
    fn append_and_tail_without_wrap() {
        let mut rb = RingBuffer::new(8);
        rb.append(&[1.0, 2.0, 3.0]);
        assert_eq!(rb.len(), 3);
        assert_eq!(rb.tail(2), vec![2.0, 3.0]);
        assert_eq!(rb.tail(10), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn append_wraps_and_keeps_newest() {
        let mut rb = RingBuffer::new(4);
        rb.append(&[1.0, 2.0, 3.0]);
        rb.append(&[4.0, 5.0]);
        assert_eq!(rb.len(), 4);
        assert_eq!(rb.tail(4), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn oversized_append_overwrites_whole_buffer() {
        let mut rb = RingBuffer::new(3);
        rb.append(&[9.0]);
        rb.append(&ramp(7, 1.0));
        assert_eq!(rb.tail(3), vec![5.0, 6.0, 7.0]);
        assert_eq!(rb.len(), 3);
    }

    #[test]
    fn slice_uses_logical_indexing() {
        let mut rb = RingBuffer::new(4);
        rb.append(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        // Retained (oldest first): 3 4 5 6
        assert_eq!(rb.slice(0, 2), vec![3.0, 4.0]);
        assert_eq!(rb.slice(1, 4), vec![4.0, 5.0, 6.0]);
        assert_eq!(rb.slice(2, 2), Vec::<f32>::new());
        assert_eq!(rb.slice(3, 100), vec![6.0]);
    }

    #[test]
    fn clear_resets_state() {
        let mut rb = RingBuffer::new(4);
        rb.append(&[1.0, 2.0]);
        rb.clear();
        assert!(rb.is_empty());
        assert!(rb.tail(4).is_empty());
        rb.append(&[7.0]);
        assert_eq!(rb.tail(4), vec![7.0]);
    }

    proptest! {
        /// tail(n) always equals the last min(n, retained) samples of the
        /// concatenated input, as if the buffer were unbounded.
        #[test]
        fn tail_matches_unbounded_model(
            appends in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 0..40), 1..20),
            cap in 1usize..64,
            n in 0usize..80,
        ) {
            let mut rb = RingBuffer::new(cap);
            let mut model: Vec<f32> = Vec::new();
            for chunk in &appends {
                rb.append(chunk);
                model.extend_from_slice(chunk);
            }
            let retained = model.len().min(cap);
            let want_n = n.min(retained);
            let expected: Vec<f32> = model[model.len() - want_n..].to_vec();
            prop_assert_eq!(rb.tail(n), expected);
            prop_assert_eq!(rb.len(), retained);
        }
    }
}
