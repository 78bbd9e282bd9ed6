//! WhatsApp session lifecycle management.
//!
//! Creates, pairs, tracks, recovers and tears down long-lived driver-backed
//! sessions.  The [`SessionRegistry`] is the single in-process source of
//! truth for which sessions exist; the [`SessionManager`] orchestrates every
//! transition against it and the opaque [`Driver`] adapter.

pub mod driver;
pub mod error;
pub mod manager;
pub mod phone;
mod pump;
mod recovery;
pub mod registry;
pub mod status;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use driver::{CreateRequest, Driver, DriverError, DriverEvent, DriverHandle, EventSink, LaunchOptions};
pub use error::{Result, SessionError};
pub use manager::{CreateOutcome, CreatedSession, Delivery, ManagerSettings, SessionManager};
pub use phone::PhonePolicy;
pub use registry::{SessionRegistry, SessionSummary};
pub use status::SessionStatus;
