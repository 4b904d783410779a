//! Launchpad.

#[cfg(feature = "config")]
#[doc(inline)]
pub use launchpad_config as config;
#[cfg(feature = "config")]
#[doc(inline)]
pub use launchpad_config::Config;
#[cfg(feature = "engine")]
#[doc(inline)]
pub use launchpad_engine as engine;
#[cfg(feature = "engine")]
#[doc(inline)]
pub use launchpad_engine::Wizard;
#[cfg(feature = "events")]
#[doc(inline)]
pub use launchpad_events as events;
#[cfg(feature = "events")]
#[doc(inline)]
pub use launchpad_events::Event;
