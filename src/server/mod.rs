//! Control-plane server: client registry and notification fan-out

mod control;
mod events;
mod message;
mod registry;


pub use control::ControlServer;
pub use events::ServerEvent;
pub use message::Notification;
pub use registry::{ClientHandle, ClientRegistry};
