//! Explicit query cache with generation-tagged refetches.
//!
//! A `QueryCache` holds one server-owned value. Local writes (`update`)
//! apply immediately. Refetches are tagged with a monotonically
//! increasing `Generation`; only the response for the latest issued
//! generation is installed, so an older response that lands late never
//! overwrites a newer one. Invalidation keeps the current value visible
//! until the refetch lands.

/// Tag of one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct QueryCache<T> {
    value: Option<T>,
    issued: u64,
    pending: Option<Generation>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            value: None,
            issued: 0,
            pending: None,
        }
    }
}

impl<T: Clone> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Mutate the cached value in place. Returns false if nothing is cached.
    pub fn update(&mut self, f: impl FnOnce(&mut T)) -> bool {
        match self.value.as_mut() {
            Some(v) => {
                f(v);
                true
            }
            None => false,
        }
    }

    /// Issue a new fetch generation. Any fetch still in flight is superseded.
    pub fn invalidate(&mut self) -> Generation {
        self.issued += 1;
        let generation = Generation(self.issued);
        self.pending = Some(generation);
        generation
    }

    /// Issue a fetch only if nothing is cached and nothing is in flight.
    pub fn ensure(&mut self) -> Option<Generation> {
        if self.value.is_none() && self.pending.is_none() {
            Some(self.invalidate())
        } else {
            None
        }
    }

    /// Install a fetched value. Returns false (and drops the value) if `generation` was superseded.
    pub fn apply(&mut self, generation: Generation, value: T) -> bool {
        if self.pending != Some(generation) {
            return false;
        }
        self.value = Some(value);
        self.pending = None;
        true
    }

    /// Record a failed fetch. The cached value (if any) stays.
    pub fn fail(&mut self, generation: Generation) -> bool {
        if self.pending != Some(generation) {
            return false;
        }
        self.pending = None;
        true
    }

    pub fn is_fetching(&self) -> bool {
        self.pending.is_some()
    }

    /// Copy of the current value, for rolling back an optimistic write.
    pub fn snapshot(&self) -> Option<T> {
        self.value.clone()
    }

    /// Put back a value taken with `snapshot`.
    pub fn restore(&mut self, snapshot: Option<T>) {
        self.value = snapshot;
    }
}
