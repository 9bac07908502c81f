//! System-wide constants for the PeerBook offer engine.

/// Decimal places carried by fiat-denominated offer prices.
pub const FIAT_PRICE_PRECISION: u32 = 4;

/// Decimal places carried by non-convertible asset offer prices.
pub const NON_CONVERTIBLE_PRICE_PRECISION: u32 = 8;

/// Calls allowed per window for read operations unless overridden.
pub const DEFAULT_READ_CALLS_PER_WINDOW: u32 = 1;

/// Calls allowed per window for mutating operations unless overridden.
pub const DEFAULT_MUTATING_CALLS_PER_WINDOW: u32 = 1;

/// Service prefix of every fully-qualified operation name.
pub const OPERATION_SERVICE_PREFIX: &str = "peerbook.Offers/";

/// Admission overrides file looked up in the data directory when the
/// configuration does not name one explicitly.
pub const ADMISSION_OVERRIDES_FILE: &str = "ratemeters.json";

/// File (inside the data directory) holding persisted republish intents.
pub const RETRY_JOURNAL_FILE: &str = "republish_intents.json";

/// Default data directory for a node.
pub const DEFAULT_DATA_DIR: &str = "./peerbook-data";

/// Book jobs that may wait for the publisher before edits are refused.
pub const BOOK_QUEUE_CAPACITY: usize = 1024;

/// Default interval between background reconciliation passes.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 30_000;

/// Domain separator prepended to every signed offer payload.
pub const OFFER_SIGNING_DOMAIN: &[u8] = b"peerbook:offer:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "PeerBook";
