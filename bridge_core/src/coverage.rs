use std::ffi::CStr;
use std::ptr;
use std::slice;
use thiserror::Error;

/// Exported pointer-to-pointer holding the active coverage map base address.
const MAP_POINTER_SYMBOL: &CStr = c"__afl_area_ptr";
/// Exported `u32` holding the coverage map size in bytes.
const MAP_SIZE_SYMBOL: &CStr = c"__afl_map_size";

/// Errors that can occur while resolving the shared coverage map.
///
/// All of these represent contract violations by the hosting environment
/// (the engine's instrumentation runtime is missing or broken) and are
/// treated as fatal by the [`Bridge`](crate::bridge::Bridge) entry points.
#[derive(Error, Debug)]
pub enum CoverageError {
    /// The current process image could not be opened for symbol lookup.
    #[error("Failed to dlopen the current process image")]
    ProcessImage,

    /// An expected exported symbol was not found in the process image.
    #[error("Failed to find symbol {0} in the current process image")]
    SymbolNotFound(&'static str),

    /// The pointer-to-pointer symbol resolved, but the map address it
    /// holds is null (the engine runtime has not set it up yet).
    #[error("Coverage map pointer is null")]
    NullMapPointer,
}

/// Read-only capability over the coverage bitmap owned by an external
/// coverage-guided fuzzing engine.
///
/// The map is a fixed-size byte array where a non-zero byte `i` records
/// that coverage point `i` was hit at least once since the engine last
/// reset the map. Implementations must re-resolve the map on every call:
/// the engine may reassign the underlying pointer across forked workers,
/// so a resolved address must never be memoized across process boundaries.
///
/// The bridge only ever reads the map; the engine owns write access and
/// reset timing.
pub trait CoverageProvider: Send + Sync {
    /// Re-resolves and returns a read-only view of the coverage map.
    fn map(&self) -> Result<&[u8], CoverageError>;

    /// Counts the coverage points hit at least once.
    ///
    /// An O(MapSize) scan with no side effects, recomputed on every query.
    fn coverage_count(&self) -> Result<usize, CoverageError> {
        Ok(self.map()?.iter().filter(|byte| **byte != 0).count())
    }

    /// Returns `coverage_count / MapSize` as a fraction in `[0, 1]`.
    fn coverage_percent(&self) -> Result<f64, CoverageError> {
        let map = self.map()?;
        if map.is_empty() {
            return Ok(0.0);
        }
        let count = map.iter().filter(|byte| **byte != 0).count();
        Ok(count as f64 / map.len() as f64)
    }
}

/// Production [`CoverageProvider`] that locates the engine's coverage map
/// via dynamic symbol lookup in the current process image.
///
/// Both the map pointer and the map size are resolved through `dlsym`, so
/// the crate carries no compile-time link dependency on the engine runtime
/// and fails closed at runtime when the instrumentation is absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DlsymCoverageProvider;

impl DlsymCoverageProvider {
    pub fn new() -> Self {
        DlsymCoverageProvider
    }

    fn resolve(&self) -> Result<(*const u8, usize), CoverageError> {
        // dlopen(NULL) hands back the already-loaded main program; the
        // handle is never closed, matching the lifetime of the image.
        let image = unsafe { libc::dlopen(ptr::null(), libc::RTLD_NOW) };
        if image.is_null() {
            return Err(CoverageError::ProcessImage);
        }

        let map_sym = unsafe { libc::dlsym(image, MAP_POINTER_SYMBOL.as_ptr()) };
        if map_sym.is_null() {
            return Err(CoverageError::SymbolNotFound("__afl_area_ptr"));
        }
        // dlsym returns the address of the exported pointer variable, so
        // one dereference yields the map base address.
        let map_ptr = unsafe { *(map_sym as *const *const u8) };
        if map_ptr.is_null() {
            return Err(CoverageError::NullMapPointer);
        }

        let size_sym = unsafe { libc::dlsym(image, MAP_SIZE_SYMBOL.as_ptr()) };
        if size_sym.is_null() {
            return Err(CoverageError::SymbolNotFound("__afl_map_size"));
        }
        let map_size = unsafe { *(size_sym as *const u32) } as usize;

        Ok((map_ptr, map_size))
    }
}

impl CoverageProvider for DlsymCoverageProvider {
    fn map(&self) -> Result<&[u8], CoverageError> {
        let (map_ptr, map_size) = self.resolve()?;
        // Safety: the engine runtime owns the map allocation for the whole
        // process lifetime and the returned view is read-only.
        Ok(unsafe { slice::from_raw_parts(map_ptr, map_size) })
    }
}

/// A [`CoverageProvider`] over an owned, in-memory byte vector.
///
/// Used by tests and by targets that run without an engine attached.
#[derive(Debug, Default, Clone)]
pub struct FixedCoverageProvider {
    bytes: Vec<u8>,
}

impl FixedCoverageProvider {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl CoverageProvider for FixedCoverageProvider {
    fn map(&self) -> Result<&[u8], CoverageError> {
        Ok(&self.bytes)
    }
}
