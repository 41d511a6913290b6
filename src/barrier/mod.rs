pub mod coordinator;

pub use coordinator::{BarrierReport, Coordinator, State};
