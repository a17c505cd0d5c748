//! Search layer: Google Custom Search over HTTP, global pacing with a call
//! budget, and an offline provider that only replays the memo.

pub mod google;
pub mod offline;
pub mod throttle;

pub use google::{ClientError, GoogleSearch};
pub use offline::OfflineProvider;
pub use throttle::{SearchBudget, Throttled};
