pub mod clock;
pub mod timed;

pub use clock::{Clock, ManualClock, SystemClock};
pub use timed::{CacheEntry, TimedCache};
