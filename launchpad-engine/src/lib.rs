//! The engine that powers Launchpad.
//!
//! The engine turns a user's choices in a launch dialog into validated
//! session creation requests:
//!
//! * [`resource`] resolves the legal range of every resource dimension from
//!   the image, the resource policy, the available capacity and the platform
//!   ceilings.
//! * [`allocation`] keeps the chosen values within those ranges.
//! * [`mount`] and [`editor`] hold the folder selection, the environment
//!   variables and the pre-opened ports.
//! * [`request`] validates everything and builds the [`SessionRequest`]s.
//! * [`wizard`] drives the dialog step by step and submits the sessions
//!   through the [`service`]s it is given.

pub mod allocation;
pub mod editor;
pub mod image;
pub mod mount;
pub mod request;
pub mod resource;
pub mod service;
pub mod wizard;

pub use allocation::Allocation;
pub use image::Image;
pub use request::SessionRequest;
pub use wizard::Wizard;

/// The top-level result returned within the engine.
///
/// An [`anyhow::Result`] was chosen as the top-level result for the engine
/// simply because these errors are usually displayed directly to the user.
///
/// Wherever an error is recoverable, a more specific error type is returned
/// (as it will always be coercible to its [`anyhow`] equivalent for display).
pub type Result<T> = anyhow::Result<T>;
