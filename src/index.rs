/// Ascending work indices `0..len`, each handed out once.
#[derive(Debug)]
pub(crate) struct IndexSource {
    next: usize,
    len: usize,
}

impl IndexSource {
    pub(crate) fn new(len: usize) -> Self {
        Self { next: 0, len }
    }

    /// Number of indices already handed out.
    #[inline]
    pub(crate) fn issued(&self) -> usize {
        self.next
    }

    #[inline]
    pub(crate) fn is_exhausted(&self) -> bool {
        self.next >= self.len
    }
}

impl Iterator for IndexSource {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.is_exhausted() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.len - self.next;
        (rest, Some(rest))
    }
}
