pub mod directory;
pub mod dispatcher;
pub mod peer_record;
pub mod prelude;
pub mod retry;

pub use directory::PeerDirectory;
pub use dispatcher::Dispatcher;
pub use peer_record::{PeerId, PeerRecord};
pub use retry::{Backoff, RetryPolicy};
