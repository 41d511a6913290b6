pub mod collector;
pub mod node;
pub mod settings;

pub use collector::*;
pub use settings::*;
