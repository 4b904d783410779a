//! Services consumed and provided by the engine.

pub mod broker;
pub mod naming;
pub mod notify;
pub mod refresh;
pub mod slot;

pub use broker::ResourceBroker;
pub use naming::NamingService;
pub use notify::NotificationService;
pub use refresh::Refresher;
pub use slot::Slot;
