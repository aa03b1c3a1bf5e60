//! Top-level application state.
//!
//! [`App`] is the single writer for the session, the capture controller, the
//! current result and the history ledger. Front ends read snapshots through
//! its accessors and drive it through its operations.
//!
//! Each network call is split into a `begin_*` step that flips a busy flag and
//! a `finish_*` step that clears it, so a front end can keep the trigger
//! disabled while the request is outstanding. [`App::submit_login`] and
//! [`App::verify`] run both halves around the call.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info};

use crate::capture::{CaptureController, CaptureState, CapturedImage, Camera, Resolution};
use crate::config::{Config, Preference, Preferences};
use crate::error::{Error, Result};
use crate::history::{HistoryEntry, HistoryLedger};
use crate::session::{self, LoginForm, OfficerSession};
use crate::transport::HttpTransport;
use crate::verify::{self, VerificationOutcome};

/// Which screen the front end should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Credentials entry.
    Login,
    /// Capture, verification and history.
    Workspace,
}

/// Snapshot handed out when a verification starts.
#[derive(Debug, Clone)]
pub struct VerificationTicket {
    image: Option<CapturedImage>,
}

impl VerificationTicket {
    /// The still to submit, if one was held.
    #[must_use]
    pub fn image(&self) -> Option<&CapturedImage> {
        self.image.as_ref()
    }
}

/// The identity verification application.
pub struct App {
    config: Config,
    transport: Arc<dyn HttpTransport>,
    login_form: LoginForm,
    session: Option<OfficerSession>,
    capture: CaptureController,
    result: Option<VerificationOutcome>,
    verifying: bool,
    history: HistoryLedger,
    preferences: Preferences,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("screen", &self.screen())
            .field("session", &self.session)
            .field("capture", &self.capture)
            .field("verifying", &self.verifying)
            .field("history_len", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Create an application on the login screen.
    #[must_use]
    pub fn new(config: Config, transport: Arc<dyn HttpTransport>, camera: Box<dyn Camera>) -> Self {
        let capture = CaptureController::new(camera, Resolution::from(&config.camera));
        let preferences = config.preferences;
        Self {
            config,
            transport,
            login_form: LoginForm::default(),
            session: None,
            capture,
            result: None,
            verifying: false,
            history: HistoryLedger::new(),
            preferences,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Screen to display.
    #[must_use]
    pub fn screen(&self) -> Screen {
        if self.session.is_some() {
            Screen::Workspace
        } else {
            Screen::Login
        }
    }

    // === Session ===

    /// Login screen state.
    #[must_use]
    pub fn login_form(&self) -> &LoginForm {
        &self.login_form
    }

    /// Login screen fields, for editing.
    pub fn login_form_mut(&mut self) -> &mut LoginForm {
        &mut self.login_form
    }

    /// The signed-in officer.
    #[must_use]
    pub fn session(&self) -> Option<&OfficerSession> {
        self.session.as_ref()
    }

    /// Submit the login form.
    ///
    /// Returns `true` once signed in. Does nothing while the form is disabled.
    /// Failures are left on [`LoginForm::error`].
    pub async fn submit_login(&mut self) -> bool {
        let Some(credentials) = self.login_form.begin() else {
            debug!("login submit ignored: form disabled");
            return false;
        };
        let result = session::login(self.transport.as_ref(), &self.config, &credentials).await;
        match self.login_form.finish(result) {
            Some(officer) => {
                self.session = Some(officer);
                self.login_form = LoginForm::default();
                true
            }
            None => false,
        }
    }

    /// Sign out, releasing the camera and forgetting all session state.
    pub fn logout(&mut self) {
        if let Some(officer) = self.session.take() {
            info!(officer_id = %officer.officer_id, "signed out");
        }
        self.capture.cancel();
        self.result = None;
        self.verifying = false;
        self.history.clear();
        self.login_form = LoginForm::default();
        self.preferences = self.config.preferences;
    }

    // === Capture ===

    /// Switch to a different camera, stopping the current one.
    pub fn replace_camera(&mut self, camera: Box<dyn Camera>) {
        self.capture.replace_camera(camera);
    }

    /// Camera state.
    #[must_use]
    pub fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    /// The held still, if any.
    #[must_use]
    pub fn captured_image(&self) -> Option<&CapturedImage> {
        self.capture.image()
    }

    /// Begin a new verification: clear the previous result and go live.
    ///
    /// With auto-capture on, a still is taken immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSignedIn`] without a session, or an error if the
    /// camera cannot be opened or the auto still fails.
    pub fn start_camera(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Err(Error::NotSignedIn);
        }
        self.result = None;
        self.capture.start()?;
        if self.preferences.auto_capture {
            self.capture_still()?;
        }
        Ok(())
    }

    /// Press the shutter. Returns `true` if a still is now held.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be grabbed or encoded.
    pub fn capture_still(&mut self) -> Result<bool> {
        self.result = None;
        let quality = self.preferences.jpeg_quality();
        Ok(self.capture.capture(quality)?.is_some())
    }

    /// Discard the held still and return to the live feed.
    pub fn retake(&mut self) {
        self.capture.retake();
    }

    /// Discard the held still and the displayed result; the camera stays on.
    pub fn reset(&mut self) {
        self.capture.retake();
        self.result = None;
    }

    /// Stop the camera, discarding the held still and the displayed result.
    pub fn cancel(&mut self) {
        self.capture.cancel();
        self.result = None;
    }

    // === Verification ===

    /// Whether the verify trigger is enabled.
    #[must_use]
    pub fn can_verify(&self) -> bool {
        !self.verifying
    }

    /// Whether a verification is in flight.
    #[must_use]
    pub fn is_verifying(&self) -> bool {
        self.verifying
    }

    /// Mark a verification as started.
    ///
    /// Returns `None` without a session or while another verification is in
    /// flight.
    pub fn begin_verification(&mut self) -> Option<VerificationTicket> {
        if self.session.is_none() {
            debug!("verification ignored: not signed in");
            return None;
        }
        if self.verifying {
            debug!("verification ignored: already in flight");
            return None;
        }
        self.verifying = true;
        self.result = None;
        Some(VerificationTicket {
            image: self.capture.image().cloned(),
        })
    }

    /// Settle the in-flight verification and record it.
    pub fn finish_verification(&mut self, outcome: VerificationOutcome) {
        self.verifying = false;
        if self.should_record(&outcome) {
            self.history
                .record(HistoryEntry::from_outcome(&outcome, Local::now()));
        }
        self.result = Some(outcome);
    }

    fn should_record(&self, outcome: &VerificationOutcome) -> bool {
        if !outcome.reached_service() {
            return false;
        }
        match outcome {
            VerificationOutcome::Failed { .. } => self.config.history.record_failures,
            _ => true,
        }
    }

    /// Submit the held still and wait for the verdict.
    ///
    /// Returns `None` without a session or if a verification was already in
    /// flight.
    pub async fn verify(&mut self) -> Option<&VerificationOutcome> {
        let ticket = self.begin_verification()?;
        let outcome =
            verify::verify(self.transport.as_ref(), &self.config, ticket.image()).await;
        self.finish_verification(outcome);
        self.result.as_ref()
    }

    /// The displayed result.
    #[must_use]
    pub fn result(&self) -> Option<&VerificationOutcome> {
        self.result.as_ref()
    }

    /// Verification history, newest first.
    #[must_use]
    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    // === Preferences ===

    /// Current operator preferences.
    #[must_use]
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Flip a preference and return its new value.
    pub fn toggle_preference(&mut self, pref: Preference) -> bool {
        let value = self.preferences.toggle(pref);
        debug!(preference = pref.label(), value, "preference changed");
        value
    }
}
