//! Checksum Algorithm Registry
//!
//! Maps algorithm names to descriptors exposing the incremental
//! `init -> update* -> finalize` contract. The registry is an explicit value
//! built once at startup and handed to whoever needs it; worker processes
//! build their own copy from the same compiled-in backends.
//!
//! Backends behind cargo features (`zlib`, `crc32c`, `xxhash`) are simply absent from
//! [`Registry::with_builtin`] when the feature is disabled.

use thiserror::Error;

/// Errors raised while building or querying a registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No algorithm with that name
    #[error("Unknown checksum algorithm '{name}' (available: {available})")]
    NotFound {
        /// Requested name
        name: String,
        /// Comma-separated registered names
        available: String,
    },

    /// Name registered twice
    #[error("Checksum algorithm '{0}' is already registered")]
    Duplicate(String),
}

/// Running state of a checksum, tagged by the backend that owns it.
///
/// Threaded by value through [`AlgorithmDescriptor::update`]; plug-ins that
/// only need a 32-bit accumulator use [`ChecksumState::Word`].
#[derive(Clone)]
pub enum ChecksumState {
    /// CRC-32 (ISO-HDLC) from `crc32fast`
    Crc32(crc32fast::Hasher),
    /// CRC-32 running value from `zlib-rs`
    #[cfg(feature = "zlib")]
    Crc32z(u32),
    /// Adler-32 from `adler`
    Adler32(adler::Adler32),
    /// CRC-32C running value
    #[cfg(feature = "crc32c")]
    Crc32c(u32),
    /// XXH32 streaming state
    #[cfg(feature = "xxhash")]
    Xxh32(xxhash_rust::xxh32::Xxh32),
    /// Plain 32-bit accumulator for simple plug-ins
    Word(u32),
}

impl ChecksumState {
    /// Variant name, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            ChecksumState::Crc32(_) => "crc32",
            #[cfg(feature = "zlib")]
            ChecksumState::Crc32z(_) => "crc32z",
            ChecksumState::Adler32(_) => "adler32",
            #[cfg(feature = "crc32c")]
            ChecksumState::Crc32c(_) => "crc32c",
            #[cfg(feature = "xxhash")]
            ChecksumState::Xxh32(_) => "xxhash32",
            ChecksumState::Word(_) => "word",
        }
    }
}

impl std::fmt::Debug for ChecksumState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChecksumState::{}", self.kind())
    }
}

/// Creates a fresh running state
pub type InitFn = fn() -> ChecksumState;
/// Folds one chunk into the running state
pub type UpdateFn = fn(ChecksumState, &[u8]) -> ChecksumState;
/// Extracts the 32-bit checksum
pub type FinalizeFn = fn(ChecksumState) -> u32;

/// A registered checksum algorithm
#[derive(Debug, Clone, Copy)]
pub struct AlgorithmDescriptor {
    /// Unique registry key
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    init_fn: InitFn,
    update_fn: UpdateFn,
    finalize_fn: FinalizeFn,
}

impl AlgorithmDescriptor {
    /// Fresh running state
    #[inline]
    pub fn init(&self) -> ChecksumState {
        (self.init_fn)()
    }

    /// Fold `chunk` into `state`
    #[inline]
    pub fn update(&self, state: ChecksumState, chunk: &[u8]) -> ChecksumState {
        (self.update_fn)(state, chunk)
    }

    /// Extract the checksum from `state`
    #[inline]
    pub fn finalize(&self, state: ChecksumState) -> u32 {
        (self.finalize_fn)(state)
    }

    /// One-shot checksum of `data`
    pub fn checksum(&self, data: &[u8]) -> u32 {
        self.finalize(self.update(self.init(), data))
    }
}

/// Ordered collection of checksum algorithms.
///
/// Iteration follows registration order, which is also the row order of the
/// benchmark table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    algorithms: Vec<AlgorithmDescriptor>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every backend compiled into this binary
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for (name, description, init, update, finalize) in builtin_algorithms() {
            // Built-in names are unique
            let _ = registry.register(name, description, init, update, finalize);
        }
        registry
    }

    /// Register a new algorithm under a unique name
    pub fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        init: InitFn,
        update: UpdateFn,
        finalize: FinalizeFn,
    ) -> Result<(), RegistryError> {
        if self.contains(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.algorithms.push(AlgorithmDescriptor {
            name,
            description,
            init_fn: init,
            update_fn: update,
            finalize_fn: finalize,
        });
        Ok(())
    }

    /// Find an algorithm by name
    pub fn lookup(&self, name: &str) -> Result<&AlgorithmDescriptor, RegistryError> {
        self.algorithms
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.algorithms.iter().any(|a| a.name == name)
    }

    /// Sub-registry with the requested algorithms, in the requested order.
    ///
    /// Fails on the first unknown name. Repeated names are kept once.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Registry, RegistryError> {
        let mut selected = Registry::new();
        for name in names {
            let algo = self.lookup(name.as_ref())?;
            if !selected.contains(algo.name) {
                selected.algorithms.push(*algo);
            }
        }
        Ok(selected)
    }

    /// Registered algorithms in registration order
    pub fn iter(&self) -> impl Iterator<Item = &AlgorithmDescriptor> {
        self.algorithms.iter()
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.algorithms.iter().map(|a| a.name).collect()
    }

    /// Number of registered algorithms
    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }
}

type BuiltinEntry = (&'static str, &'static str, InitFn, UpdateFn, FinalizeFn);

fn builtin_algorithms() -> Vec<BuiltinEntry> {
    let mut entries: Vec<BuiltinEntry> = vec![
        (
            "crc32",
            "crc32fast's crc32 implementation",
            crc32_init,
            crc32_update,
            crc32_finalize,
        ),
        (
            "adler32",
            "adler's adler32 implementation",
            adler32_init,
            adler32_update,
            adler32_finalize,
        ),
    ];

    #[cfg(feature = "zlib")]
    entries.insert(
        1,
        (
            "crc32z",
            "zlib-rs's crc32 implementation",
            crc32z_init,
            crc32z_update,
            crc32z_finalize,
        ),
    );

    #[cfg(feature = "crc32c")]
    entries.push((
        "crc32c",
        "crc32c's crc32c implementation",
        crc32c_init,
        crc32c_update,
        crc32c_finalize,
    ));

    #[cfg(feature = "xxhash")]
    entries.push((
        "xxhash32",
        "xxhash-rust's xxhash32 implementation",
        xxh32_init,
        xxh32_update,
        xxh32_finalize,
    ));

    entries
}

fn state_mismatch(expected: &str, got: &ChecksumState) -> ! {
    panic!("{} backend received {} state", expected, got.kind())
}

fn crc32_init() -> ChecksumState {
    ChecksumState::Crc32(crc32fast::Hasher::new())
}

fn crc32_update(state: ChecksumState, chunk: &[u8]) -> ChecksumState {
    match state {
        ChecksumState::Crc32(mut hasher) => {
            hasher.update(chunk);
            ChecksumState::Crc32(hasher)
        }
        other => state_mismatch("crc32", &other),
    }
}

fn crc32_finalize(state: ChecksumState) -> u32 {
    match state {
        ChecksumState::Crc32(hasher) => hasher.finalize(),
        other => state_mismatch("crc32", &other),
    }
}

#[cfg(feature = "zlib")]
fn crc32z_init() -> ChecksumState {
    ChecksumState::Crc32z(0)
}

#[cfg(feature = "zlib")]
fn crc32z_update(state: ChecksumState, chunk: &[u8]) -> ChecksumState {
    match state {
        ChecksumState::Crc32z(crc) => ChecksumState::Crc32z(zlib_rs::crc32(crc, chunk)),
        other => state_mismatch("crc32z", &other),
    }
}

#[cfg(feature = "zlib")]
fn crc32z_finalize(state: ChecksumState) -> u32 {
    match state {
        ChecksumState::Crc32z(crc) => crc,
        other => state_mismatch("crc32z", &other),
    }
}

fn adler32_init() -> ChecksumState {
    ChecksumState::Adler32(adler::Adler32::new())
}

fn adler32_update(state: ChecksumState, chunk: &[u8]) -> ChecksumState {
    match state {
        ChecksumState::Adler32(mut adler) => {
            adler.write_slice(chunk);
            ChecksumState::Adler32(adler)
        }
        other => state_mismatch("adler32", &other),
    }
}

fn adler32_finalize(state: ChecksumState) -> u32 {
    match state {
        ChecksumState::Adler32(adler) => adler.checksum(),
        other => state_mismatch("adler32", &other),
    }
}

#[cfg(feature = "crc32c")]
fn crc32c_init() -> ChecksumState {
    ChecksumState::Crc32c(0)
}

#[cfg(feature = "crc32c")]
fn crc32c_update(state: ChecksumState, chunk: &[u8]) -> ChecksumState {
    match state {
        ChecksumState::Crc32c(crc) => ChecksumState::Crc32c(crc32c::crc32c_append(crc, chunk)),
        other => state_mismatch("crc32c", &other),
    }
}

#[cfg(feature = "crc32c")]
fn crc32c_finalize(state: ChecksumState) -> u32 {
    match state {
        ChecksumState::Crc32c(crc) => crc,
        other => state_mismatch("crc32c", &other),
    }
}

#[cfg(feature = "xxhash")]
fn xxh32_init() -> ChecksumState {
    ChecksumState::Xxh32(xxhash_rust::xxh32::Xxh32::new(0))
}

#[cfg(feature = "xxhash")]
fn xxh32_update(state: ChecksumState, chunk: &[u8]) -> ChecksumState {
    match state {
        ChecksumState::Xxh32(mut hasher) => {
            hasher.update(chunk);
            ChecksumState::Xxh32(hasher)
        }
        other => state_mismatch("xxhash32", &other),
    }
}

#[cfg(feature = "xxhash")]
fn xxh32_finalize(state: ChecksumState) -> u32 {
    match state {
        ChecksumState::Xxh32(hasher) => hasher.digest(),
        other => state_mismatch("xxhash32", &other),
    }
}
