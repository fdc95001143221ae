use std::collections::BTreeSet;

/// An ordered set that pops its smallest element first, breaking ties by insertion order.
#[derive(Clone, Debug)]
pub struct FifoHeap<T> {
    seq: usize,
    pub heap: BTreeSet<(T, usize)>,
}

impl<T: Ord> Default for FifoHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FifoHeap<T> {
    pub fn new() -> Self {
        FifoHeap {
            seq: usize::MIN,
            heap: BTreeSet::new(),
        }
    }

    pub fn push(&mut self, val: T) {
        self.seq = self.seq.wrapping_add(1);
        self.heap.insert((val, self.seq));
    }

    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop_first().map(|(val, _)| val)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

impl<T: Ord> FromIterator<T> for FifoHeap<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ret = FifoHeap::new();
        for i in iter {
            ret.push(i);
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::FifoHeap;

    #[test]
    fn pops_smallest_then_oldest() {
        let mut heap: FifoHeap<(usize, &str)> = FifoHeap::new();
        heap.push((2, "b"));
        heap.push((0, "z"));
        heap.push((1, "a"));
        assert_eq!(heap.len(), 3);
        assert_eq!(heap.pop(), Some((0, "z")));
        assert_eq!(heap.pop(), Some((1, "a")));
        assert_eq!(heap.pop(), Some((2, "b")));
        assert!(heap.is_empty());
        assert_eq!(heap.pop(), None);
    }
}
