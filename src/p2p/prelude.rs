pub use crate::{Error, Result};

pub use tokio::time::{sleep, timeout, Duration};
pub use tokio_util::sync::CancellationToken;

pub use crate::colored::Colorize;

pub use tracing::{debug, error, info, warn};
