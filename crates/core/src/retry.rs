// Retry budget constants (no magic values at call sites)
//
// The statement executor, procedure executor and transaction coordinator
// each consume these independently; there is no shared attempt state.

use std::time::Duration;

/// Maximum attempts for a transiently-failing operation.
pub const MAX_RETRIES: u32 = 5;

/// Fixed delay between attempts (100ms).
pub const RETRY_DELAY: Duration = Duration::from_millis(100);
