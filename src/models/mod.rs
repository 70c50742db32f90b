pub mod location;
pub mod session;

pub use location::{Coordinates, IpInfo, Location};
pub use session::{FrameClock, SessionSummary};
