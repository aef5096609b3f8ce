pub(crate) const BITGET_API_URL: &str = "https://api.bitget.com";

/// Envelope `code` the exchange returns on success
pub(crate) const SUCCESS_CODE: &str = "00000";

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub(crate) const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;

/// Tolerance for float comparisons on prices and quantities
pub const EPSILON: f64 = 1e-9;

/// Upper bound on grid intervals per session
pub(crate) const MAX_GRID_COUNT: u32 = 1_000;
