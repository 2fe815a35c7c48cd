//! Reuse pools for image buffers and small result objects.
//!
//! Both pools are internally synchronized, so a buffer released by one call
//! may race with a rent from the next without extra locking by the caller.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use image::GrayImage;
use parking_lot::Mutex;
use snapocr_protocol::{BoundingBox, OcrResult};

/// Backing storage for a pooled buffer.
struct Storage<T> {
    rows: usize,
    cols: usize,
    channels: usize,
    data: Vec<T>,
}

impl<T> Default for Storage<T> {
    fn default() -> Self {
        Self {
            rows: 0,
            cols: 0,
            channels: 0,
            data: Vec::new(),
        }
    }
}

impl<T: Copy + Default> Storage<T> {
    fn new(rows: usize, cols: usize, channels: usize) -> Self {
        Self {
            rows,
            cols,
            channels,
            data: vec![T::default(); rows * cols * channels],
        }
    }

    fn fits(&self, rows: usize, cols: usize, channels: usize) -> bool {
        self.channels == channels && self.rows >= rows && self.cols >= cols
    }
}

struct PoolInner<T> {
    entries: Mutex<VecDeque<Storage<T>>>,
    max_entries: usize,
}

impl<T> PoolInner<T> {
    fn give_back(&self, storage: Storage<T>) {
        let mut entries = self.entries.lock();
        if entries.len() < self.max_entries {
            entries.push_back(storage);
        }
    }
}

/// Pool of image buffers keyed by `(rows, cols, channels)` for element type `T`.
///
/// Cloning the pool is cheap and shares the same storage.
pub struct BufferPool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for BufferPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy + Default + Send> BufferPool<T> {
    /// Create a pool that retains at most `max_entries` idle buffers.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                entries: Mutex::new(VecDeque::new()),
                max_entries,
            }),
        }
    }

    /// Rent a zeroed buffer of `rows x cols x channels` elements.
    ///
    /// An idle buffer with the same channel count and at least the requested
    /// rows and columns is reused; when it is larger, the returned buffer is a
    /// view over the front of its storage. Otherwise new storage is allocated.
    pub fn rent(&self, rows: usize, cols: usize, channels: usize) -> PooledBuffer<T> {
        let reused = {
            let mut entries = self.inner.entries.lock();
            entries
                .iter()
                .position(|s| s.fits(rows, cols, channels))
                .and_then(|pos| entries.remove(pos))
        };

        let storage = match reused {
            Some(mut storage) => {
                storage.data[..rows * cols * channels].fill(T::default());
                storage
            }
            None => Storage::new(rows, cols, channels),
        };

        PooledBuffer {
            storage,
            rows,
            cols,
            channels,
            pool: Arc::downgrade(&self.inner),
        }
    }

    /// Number of idle buffers.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop idle buffers beyond `keep`.
    pub fn trim(&self, keep: usize) {
        self.inner.entries.lock().truncate(keep);
    }

    /// Drop all idle buffers.
    pub fn clear(&self) {
        self.inner.entries.lock().clear();
    }
}

/// A buffer rented from a [`BufferPool`].
///
/// The storage goes back to the pool on [`release`](Self::release) or drop.
/// If the pool is full or no longer exists the storage is freed instead.
pub struct PooledBuffer<T> {
    storage: Storage<T>,
    rows: usize,
    cols: usize,
    channels: usize,
    pool: Weak<PoolInner<T>>,
}

impl<T> PooledBuffer<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    fn len(&self) -> usize {
        self.rows * self.cols * self.channels
    }

    /// Whether this buffer views a larger pooled allocation.
    pub fn is_view(&self) -> bool {
        self.storage.rows != self.rows || self.storage.cols != self.cols
    }

    /// Row-major, channel-interleaved contents.
    pub fn as_slice(&self) -> &[T] {
        &self.storage.data[..self.len()]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len();
        &mut self.storage.data[..len]
    }

    /// Return the storage to its pool now.
    pub fn release(self) {
        drop(self);
    }
}

impl PooledBuffer<u8> {
    /// Run `f` with the buffer temporarily wrapped as a [`GrayImage`].
    ///
    /// Requires a single-channel buffer. The storage keeps its allocation.
    pub fn with_gray_image<R>(&mut self, f: impl FnOnce(&mut GrayImage) -> R) -> R {
        debug_assert_eq!(self.channels, 1);
        let (width, height, len) = (self.cols as u32, self.rows as u32, self.len());
        let full_len = self.storage.data.len();

        let mut data = std::mem::take(&mut self.storage.data);
        data.truncate(len);
        // `data` holds exactly width * height bytes, so this never falls back.
        let mut image = GrayImage::from_raw(width, height, data)
            .unwrap_or_else(|| GrayImage::new(width, height));
        let result = f(&mut image);

        let mut data = image.into_raw();
        data.resize(full_len, 0);
        self.storage.data = data;
        result
    }
}

impl<T> Drop for PooledBuffer<T> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.give_back(std::mem::take(&mut self.storage));
        }
    }
}

/// Values that can be reset before going back to an [`ObjectPool`].
pub trait Recycle {
    fn recycle(&mut self);
}

impl Recycle for OcrResult {
    fn recycle(&mut self) {
        self.text.clear();
        self.confidence = 0.0;
        self.bbox = BoundingBox::default();
    }
}

/// Pool of small reusable objects.
pub struct ObjectPool<T> {
    items: Mutex<Vec<T>>,
    max_items: usize,
}

impl<T: Recycle + Default> ObjectPool<T> {
    pub fn new(max_items: usize) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            max_items,
        }
    }

    /// Take an idle object, or a fresh default one.
    pub fn rent(&self) -> T {
        self.items.lock().pop().unwrap_or_default()
    }

    /// Reset `item` and keep it for reuse if there is room.
    pub fn give_back(&self, mut item: T) {
        item.recycle();
        let mut items = self.items.lock();
        if items.len() < self.max_items {
            items.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn trim(&self, keep: usize) {
        self.items.lock().truncate(keep);
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}
