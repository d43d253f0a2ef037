/// Default cap on consecutive synchronous match rounds inside one dispatch
pub const DEFAULT_MAX_CASCADE_ROUNDS: usize = 10_000;
/// Default time a snapshot waits for in-flight handlers to settle (30 seconds)
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 30_000;
/// Resume refuses snapshots from a different workflow version unless configured otherwise
pub const DEFAULT_STRICT_VERSION: bool = true;
