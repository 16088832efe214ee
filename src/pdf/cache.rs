//! Page cache for rendered PDF pages

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use super::error::RenderError;
use super::types::PageRender;
use super::zoom::Zoom;

/// Cache key for rendered pages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Page number (1-based)
    pub page: usize,
    /// Quantized zoom factor
    pub zoom: Zoom,
}

impl CacheKey {
    #[must_use]
    pub fn new(page: usize, zoom: Zoom) -> Self {
        Self { page, zoom }
    }
}

type Slot = Arc<Mutex<()>>;

/// Rendered pages of the current document, keyed by page and zoom.
///
/// Entries are never evicted individually; the whole map is dropped with
/// [`PageCache::invalidate_all`] when the document changes.
#[derive(Default)]
pub struct PageCache {
    entries: Mutex<HashMap<CacheKey, Arc<PageRender>>>,
    in_flight: Mutex<HashMap<CacheKey, Slot>>,
}

impl PageCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached page
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<PageRender>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Insert a page into the cache, returning an Arc to the data
    pub fn insert(&self, key: CacheKey, data: PageRender) -> Arc<PageRender> {
        let arc = Arc::new(data);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&arc));
        arc
    }

    /// Return the cached page for `key`, computing it with `render` on a miss.
    ///
    /// Concurrent misses for the same key run `render` once: later callers
    /// wait on the key's slot and pick up the stored result. Errors are not
    /// cached, so a waiter behind a failed render tries again itself.
    pub fn get_or_try_insert_with<F>(
        &self,
        key: CacheKey,
        render: F,
    ) -> Result<Arc<PageRender>, RenderError>
    where
        F: FnOnce() -> Result<PageRender, RenderError>,
    {
        if let Some(hit) = self.get(&key) {
            debug!("Cache hit for page {} at zoom {}", key.page, key.zoom);
            return Ok(hit);
        }

        let slot = Arc::clone(
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key)
                .or_default(),
        );

        let result = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            match self.get(&key) {
                Some(hit) => {
                    debug!("Page {} at zoom {} rendered by a concurrent request", key.page, key.zoom);
                    Ok(hit)
                }
                None => {
                    debug!("Cache miss for page {} at zoom {}", key.page, key.zoom);
                    render().map(|data| self.insert(key, data))
                }
            }
        };

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(&key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
            in_flight.remove(&key);
        }

        result
    }

    /// Clear all cached pages
    pub fn invalidate_all(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use image::{DynamicImage, RgbImage};

    use super::*;
    use crate::pdf::error::ErrorKind;

    fn test_page_render(page: usize, zoom: Zoom) -> PageRender {
        let image = Arc::new(DynamicImage::ImageRgb8(RgbImage::new(10, 10)));
        PageRender::new(page, zoom, Arc::clone(&image), image, format!("page {page}"))
    }

    #[test]
    fn cache_insert_and_get() {
        let cache = PageCache::new();
        let key = CacheKey::new(1, Zoom::ACTUAL_SIZE);

        cache.insert(key, test_page_render(1, Zoom::ACTUAL_SIZE));

        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key).unwrap().text, "page 1");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zoom_levels_are_separate_entries() {
        let cache = PageCache::new();
        let key1 = CacheKey::new(1, Zoom::new(1.0));
        let key2 = CacheKey::new(1, Zoom::new(2.0));

        cache.insert(key1, test_page_render(1, key1.zoom));

        assert!(cache.contains(&key1));
        assert!(!cache.contains(&key2));
        assert!(cache.contains(&CacheKey::new(1, Zoom::new(1.001))));
    }

    #[test]
    fn cache_invalidate_all() {
        let cache = PageCache::new();

        for i in 1..=5 {
            let key = CacheKey::new(i, Zoom::ACTUAL_SIZE);
            cache.insert(key, test_page_render(i, key.zoom));
        }

        assert_eq!(cache.len(), 5);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn miss_renders_once_then_hits() {
        let cache = PageCache::new();
        let key = CacheKey::new(2, Zoom::new(1.5));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let page = cache
                .get_or_try_insert_with(key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(test_page_render(2, key.zoom))
                })
                .unwrap();
            assert_eq!(page.page, 2);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_render_is_not_cached() {
        let cache = PageCache::new();
        let key = CacheKey::new(1, Zoom::ACTUAL_SIZE);

        let err = cache
            .get_or_try_insert_with(key, || Err(RenderError::engine("decode failed")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Engine);
        assert!(cache.is_empty());

        let page = cache
            .get_or_try_insert_with(key, || Ok(test_page_render(1, key.zoom)))
            .unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_misses_share_one_render() {
        let cache = Arc::new(PageCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let key = CacheKey::new(3, Zoom::new(2.0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_try_insert_with(key, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(test_page_render(3, key.zoom))
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert!(cache.in_flight.lock().unwrap().is_empty());
    }
}
