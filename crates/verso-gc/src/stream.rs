/// A lazily produced sequence over a scoped backend resource (a cursor).
///
/// The resource is released exactly once, when the stream is dropped —
/// whether it was fully consumed, partially consumed, or abandoned on an
/// error path. Callers bound the lifetime simply by bounding the scope of
/// the stream value; early `return` and `?` release it like everything
/// else.
pub struct ScopedStream<T> {
    items: Box<dyn Iterator<Item = T> + Send>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> ScopedStream<T> {
    /// Wrap an iterator with the release action for its backing resource.
    pub fn new(
        items: impl Iterator<Item = T> + Send + 'static,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            items: Box::new(items),
            release: Some(Box::new(release)),
        }
    }

    /// A stream over already-materialized items with no resource attached.
    pub fn from_vec(items: Vec<T>) -> Self
    where
        T: Send + 'static,
    {
        Self::new(items.into_iter(), || {})
    }
}

impl<T> Iterator for ScopedStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.items.next()
    }
}

impl<T> Drop for ScopedStream<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
