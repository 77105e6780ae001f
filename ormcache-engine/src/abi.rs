//! The raw, C-style ABI the Dependency Engine exposes.
//!
//! Every call exchanges JSON payloads through a shared linear memory: the
//! caller `malloc`s a buffer, writes its request into it, invokes the
//! operation with a `(ptr, len)` pair, and on success reads the result from
//! wherever `take_result` says it landed. On failure (`status != 0`),
//! `last_error` points at a JSON-encoded error description instead.
//!
//! Implementors must honor "fresh-buffer discipline": a `(ptr, len)` pair is
//! only valid to read immediately via [`LinearMemory`], never cached across
//! calls, because any call may grow the underlying memory and invalidate
//! previously observed addresses.

/// A view onto the engine's linear memory.
///
/// `read`/`write` take fresh snapshots rather than returning borrowed slices
/// so callers can never accidentally hold a reference across a call that
/// might reallocate the underlying buffer.
pub trait LinearMemory: Send + Sync {
    fn read(&self, ptr: u32, len: u32) -> Vec<u8>;
    fn write(&self, ptr: u32, bytes: &[u8]);
}

/// The engine's raw entry points, addressed by `(ptr, len)` pairs into its
/// linear memory. All operation calls return a `u32` status code: `0` for
/// success, any other value maps to an [`crate::EngineErrorCode`][core] via
/// [`ormcache_core::EngineErrorCode::from_status`].
///
/// [core]: ormcache_core::EngineErrorCode
pub trait RawEngine: Send + Sync {
    /// Produce the engine's `{core, contract, abi}` version triple via
    /// `take_result`. Returns a status code like every other call -- the
    /// version info itself is only available afterward, through
    /// `take_result`.
    fn version(&self) -> u32;

    /// Allocate `len` bytes in the engine's linear memory and return a pointer to them.
    fn malloc(&self, len: u32) -> u32;

    /// Release a buffer previously returned by `malloc`.
    fn free(&self, ptr: u32, len: u32);

    fn set_schema(&self, ptr: u32, len: u32) -> u32;
    fn compute_shape_id(&self, ptr: u32, len: u32) -> u32;
    fn add_query(&self, ptr: u32, len: u32) -> u32;
    fn invalidate(&self, ptr: u32, len: u32) -> u32;
    fn explain_invalidation(&self, ptr: u32, len: u32) -> u32;
    fn reset(&self) -> u32;

    /// The `(ptr, len)` of the JSON result from the most recently completed
    /// successful call on this engine.
    fn take_result(&self) -> (u32, u32);

    /// The `(ptr, len)` of the JSON error description from the most recently
    /// failed call on this engine.
    fn last_error(&self) -> (u32, u32);

    /// The linear memory this engine's pointers are addresses into.
    fn memory(&self) -> &dyn LinearMemory;
}
