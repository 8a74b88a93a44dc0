pub mod bus;
pub mod wireless;

pub use bus::CanBus;
pub use wireless::{CommandWrite, WirelessLink};
