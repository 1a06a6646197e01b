pub mod gap;
pub mod session;

pub use gap::{Gap, GapStatus};
pub use session::WorkSession;
