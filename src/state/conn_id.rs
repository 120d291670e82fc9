//! Connection identifier generation.

use std::sync::atomic::{AtomicU32, Ordering};

/// Unique identifier for a client connection.
///
/// The id doubles as the extension number the session registers under
/// (the way the original exchange hardware numbered jacks) and as the
/// lock-ordering key for operations that span two telephone units.
pub type ConnId = u32;

/// Generates unique connection ids.
pub struct ConnIdGenerator {
    counter: AtomicU32,
}

/// Ids start at 1; extension numbers are positive on the wire.
const CONN_ID_START: u32 = 1;

impl ConnIdGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self {
            counter: AtomicU32::new(CONN_ID_START),
        }
    }

    /// Generate the next unique connection id.
    pub fn next(&self) -> ConnId {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ConnIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
