//! System-wide constants for the deed escrow ledger.

/// Maximum entries retained in the in-memory event log before the oldest
/// are evicted.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 10_000;

/// Domain separator for settlement receipt payload hashes.
pub const RECEIPT_DOMAIN: &[u8] = b"deed-escrow:receipt:v1:";

/// Prefix carried by every ledger error message.
pub const ERROR_PREFIX: &str = "DE_ERR_";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "DeedEscrow";
