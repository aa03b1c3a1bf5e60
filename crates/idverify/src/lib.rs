//! `idverify` - Officer identity verification client
//!
//! This library signs an officer in against a login service, drives a camera
//! through live and captured states, submits the captured still to a remote
//! face-matching service and keeps a bounded history of the verdicts.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod app;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod session;
pub mod transport;
pub mod verify;

pub use app::{App, Screen};
pub use capture::{Camera, CaptureController, CaptureState, CapturedImage, StillImageCamera};
pub use config::{Config, Preference, Preferences};
pub use error::{Error, Result};
pub use history::{HistoryEntry, HistoryLedger};
pub use logging::init_logging;
pub use session::{Credentials, LoginForm, OfficerSession};
pub use transport::{HttpTransport, ReqwestTransport};
pub use verify::VerificationOutcome;
