pub mod dimensions;
pub mod tiers;
pub mod variants;

pub use dimensions::*;
pub use tiers::*;
pub use variants::*;
