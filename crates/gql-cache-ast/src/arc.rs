use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::BuildHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::OnceLock;

/// A reference-counted smart pointer that caches `Hash` and fast-paths `Eq` on `ptr_eq`.
///
/// Used throughout this crate for selection-set nodes and projection objects, where
/// "is this the same node I handed out before" (`ptr_eq`) is a load-bearing question,
/// not just an optimization: [`crate::Node::ptr_eq`] underlies the reference-equality
/// short-circuit the graph store's `watch` relies on.
///
/// Weak references are not supported.
///
/// For the hash cache to be correct, **`T` is expected to have a stable hash** as long
/// as no `&mut T` exclusive reference is given out. This excludes interior mutability.
pub struct Arc<T>(triomphe::Arc<ArcInner<T>>);

#[derive(Clone)]
struct ArcInner<T> {
    hash_cache: HashCache,
    value: T,
}

struct HashCache(AtomicU64);

impl<T> Arc<T> {
    pub fn new(value: T) -> Self {
        Self(triomphe::Arc::new(ArcInner {
            hash_cache: HashCache::new(),
            value,
        }))
    }

    /// Returns whether two `Arc`s point to the same memory allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        triomphe::Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns a mutable reference to `T`, cloning it if necessary.
    pub fn make_mut(&mut self) -> &mut T
    where
        T: Clone,
    {
        let inner = triomphe::Arc::make_mut(&mut self.0);
        inner.hash_cache.clear();
        &mut inner.value
    }

    /// Returns a mutable reference to `T` if this `Arc` is uniquely owned.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        triomphe::Arc::get_mut(&mut self.0).map(|inner| &mut inner.value)
    }
}

impl<T> std::ops::Deref for Arc<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0.value
    }
}

impl<T> Clone for Arc<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Eq> Eq for Arc<T> {}

impl<T: PartialEq> PartialEq for Arc<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.value == other.0.value
    }
}

impl<T: Hash> Hash for Arc<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_cache.get(&self.0.value).hash(state)
    }
}

impl HashCache {
    const NOT_COMPUTED_YET: u64 = 0;

    fn new() -> Self {
        Self(AtomicU64::new(Self::NOT_COMPUTED_YET))
    }

    fn clear(&mut self) {
        *self.0.get_mut() = Self::NOT_COMPUTED_YET
    }

    fn get<T: ?Sized + Hash>(&self, value: &T) -> u64 {
        let hash = self.0.load(Ordering::Relaxed);
        if hash != Self::NOT_COMPUTED_YET {
            hash
        } else {
            self.get_slow_path(value)
        }
    }

    #[cold]
    fn get_slow_path<T: ?Sized + Hash>(&self, value: &T) -> u64 {
        static SHARED_RANDOM: OnceLock<RandomState> = OnceLock::new();
        let mut hasher = SHARED_RANDOM.get_or_init(RandomState::new).build_hasher();
        value.hash(&mut hasher);
        let mut hash = hasher.finish();
        if hash == Self::NOT_COMPUTED_YET {
            hash += 1
        }
        self.0.store(hash, Ordering::Relaxed);
        hash
    }
}

impl Clone for HashCache {
    fn clone(&self) -> Self {
        Self(AtomicU64::new(self.0.load(Ordering::Relaxed)))
    }
}

impl<T: fmt::Debug> fmt::Debug for Arc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.value.fmt(f)
    }
}

impl<T: Default> Default for Arc<T> {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<T> AsRef<T> for Arc<T> {
    fn as_ref(&self) -> &T {
        self
    }
}
