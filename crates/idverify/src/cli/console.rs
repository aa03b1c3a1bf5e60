//! Console drivers for the application controller.
//!
//! [`run_shell`] reads one command per line and applies it to an [`App`].
//! [`run_batch`] signs in once and verifies a list of stills in turn.

use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use super::output::{
    summary_line, write_capture, write_history, write_outcome, write_preferences, write_session,
};
use crate::app::{App, Screen};
use crate::capture::{Camera, CaptureState, StillImageCamera};
use crate::config::Preference;
use crate::history::HistoryLedger;
use crate::verify::VerificationOutcome;

const PROMPT: &str = "idverify> ";

const HELP: &str = "\
Commands:
  login <officer-id> <password>   Sign in
  start                           Start the camera (clears the last result)
  capture                         Take a still from the live feed
  retake                          Discard the still and go live again
  reset                           Discard the still and the result
  cancel                          Stop the camera
  verify                          Submit the still for verification
  history                         Show recent verifications
  prefs                           Show preferences
  toggle <preference>             Flip auto, sound, quality or notifications
  camera <file>                   Use a different image file as the camera
  whoami                          Show the signed-in officer
  logout                          Sign out and forget this session
  help                            Show this help
  quit                            Exit";

/// One line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellAction {
    /// Sign in.
    Login {
        /// Officer ID.
        officer_id: String,
        /// Password.
        password: String,
    },
    /// Start the camera.
    Start,
    /// Take a still.
    Capture,
    /// Discard the still.
    Retake,
    /// Discard the still and the result.
    Reset,
    /// Stop the camera.
    Cancel,
    /// Submit the still.
    Verify,
    /// Show the ledger.
    History,
    /// Show preferences.
    Prefs,
    /// Flip a preference.
    Toggle(Preference),
    /// Switch camera source.
    Camera(PathBuf),
    /// Show the session.
    Whoami,
    /// Sign out.
    Logout,
    /// Show usage.
    Help,
    /// Exit.
    Quit,
}

impl ShellAction {
    fn needs_session(&self) -> bool {
        !matches!(
            self,
            Self::Login { .. } | Self::Help | Self::Quit | Self::Prefs | Self::Toggle(_)
        )
    }
}

impl FromStr for ShellAction {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err("empty command".to_string());
        };
        let rest: Vec<&str> = words.collect();
        let action = match (command, rest.as_slice()) {
            ("login", [officer_id, password]) => Self::Login {
                officer_id: (*officer_id).to_string(),
                password: (*password).to_string(),
            },
            ("login", _) => return Err("usage: login <officer-id> <password>".to_string()),
            ("start", []) => Self::Start,
            ("capture", []) => Self::Capture,
            ("retake", []) => Self::Retake,
            ("reset", []) => Self::Reset,
            ("cancel", []) => Self::Cancel,
            ("verify", []) => Self::Verify,
            ("history", []) => Self::History,
            ("prefs", []) => Self::Prefs,
            ("toggle", [key]) => Self::Toggle(
                Preference::from_key(key).ok_or_else(|| format!("unknown preference: {key}"))?,
            ),
            ("toggle", _) => return Err("usage: toggle <preference>".to_string()),
            ("camera", [path]) => Self::Camera(PathBuf::from(*path)),
            ("camera", _) => return Err("usage: camera <file>".to_string()),
            ("whoami", []) => Self::Whoami,
            ("logout", []) => Self::Logout,
            ("help" | "?", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            (other, _) => return Err(format!("unknown command: {other} (try 'help')")),
        };
        Ok(action)
    }
}

/// Run the interactive shell until `quit` or end of input.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails.
pub async fn run_shell<R, W>(app: &mut App, input: R, out: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let action = match line.parse::<ShellAction>() {
            Ok(action) => action,
            Err(message) => {
                writeln!(out, "{message}")?;
                continue;
            }
        };
        debug!(?action, "shell command");
        if action == ShellAction::Quit {
            break;
        }
        dispatch(app, action, out).await?;
    }
    app.cancel();
    Ok(())
}

async fn dispatch<W: Write>(app: &mut App, action: ShellAction, out: &mut W) -> anyhow::Result<()> {
    if action.needs_session() && app.screen() == Screen::Login {
        writeln!(out, "Please log in first.")?;
        return Ok(());
    }
    match action {
        ShellAction::Login {
            officer_id,
            password,
        } => {
            if app.screen() == Screen::Workspace {
                writeln!(out, "Already signed in. Log out first.")?;
                return Ok(());
            }
            let form = app.login_form_mut();
            form.officer_id = officer_id;
            form.password = password;
            if app.submit_login().await {
                if let Some(session) = app.session() {
                    writeln!(out, "Welcome, {}.", session.officer_name)?;
                }
            } else if let Some(error) = app.login_form().error() {
                writeln!(out, "Login failed: {error}")?;
            } else {
                writeln!(out, "Officer ID and password are required.")?;
            }
        }
        ShellAction::Start => match app.start_camera() {
            Ok(()) => {
                writeln!(out, "Camera {}.", app.capture_state())?;
                if app.capture_state() == CaptureState::Captured {
                    shutter(app, out)?;
                }
            }
            Err(e) => writeln!(out, "Camera error: {e}")?,
        },
        ShellAction::Capture => match app.capture_still() {
            Ok(true) => shutter(app, out)?,
            Ok(false) => writeln!(out, "Start the camera first.")?,
            Err(e) => writeln!(out, "Capture failed: {e}")?,
        },
        ShellAction::Retake => {
            app.retake();
            writeln!(out, "Camera {}.", app.capture_state())?;
        }
        ShellAction::Reset => {
            app.reset();
            writeln!(out, "Camera {}.", app.capture_state())?;
        }
        ShellAction::Cancel => {
            app.cancel();
            writeln!(out, "Camera {}.", CaptureState::Idle)?;
        }
        ShellAction::Verify => {
            writeln!(out, "Verifying...")?;
            if let Some(outcome) = app.verify().await.cloned() {
                report(app, &outcome, out)?;
            }
        }
        ShellAction::History => write_history(out, app.history())?,
        ShellAction::Prefs => write_preferences(out, app.preferences())?,
        ShellAction::Toggle(pref) => {
            let value = app.toggle_preference(pref);
            writeln!(out, "{}: {}", pref.label(), if value { "on" } else { "off" })?;
        }
        ShellAction::Camera(path) => {
            writeln!(out, "Camera source: {}", path.display())?;
            app.replace_camera(Box::new(StillImageCamera::from_path(path)));
        }
        ShellAction::Whoami => {
            if let Some(session) = app.session() {
                write_session(out, session)?;
            }
        }
        ShellAction::Logout => {
            app.logout();
            writeln!(out, "Signed out.")?;
        }
        ShellAction::Help => writeln!(out, "{HELP}")?,
        ShellAction::Quit => {}
    }
    Ok(())
}

/// Announce a new still; rings the terminal bell when sound is on.
fn shutter<W: Write>(app: &App, out: &mut W) -> anyhow::Result<()> {
    if app.preferences().sound_enabled {
        write!(out, "\x07")?;
    }
    if let Some(image) = app.captured_image() {
        write_capture(out, image)?;
    }
    Ok(())
}

/// Print an outcome, plus a one-line summary when notifications are on.
fn report<W: Write>(app: &App, outcome: &VerificationOutcome, out: &mut W) -> anyhow::Result<()> {
    write_outcome(out, outcome)?;
    if app.preferences().notifications {
        writeln!(out, "{}", summary_line(outcome))?;
    }
    Ok(())
}

/// Result of a batch run.
#[derive(Debug)]
pub struct BatchReport {
    /// Outcome per still, in input order, labelled by source.
    pub outcomes: Vec<(String, VerificationOutcome)>,
    /// Ledger after the run.
    pub history: HistoryLedger,
}

/// Sign in, then verify each still in turn.
///
/// A camera that fails to open or capture yields a missing-capture outcome for
/// that still and the run continues.
///
/// # Errors
///
/// Returns an error if sign-in fails.
pub async fn run_batch<I>(
    app: &mut App,
    officer_id: &str,
    password: &str,
    cameras: I,
) -> anyhow::Result<BatchReport>
where
    I: IntoIterator<Item = (String, Box<dyn Camera>)>,
{
    let form = app.login_form_mut();
    form.officer_id = officer_id.to_string();
    form.password = password.to_string();
    if !app.submit_login().await {
        match app.login_form().error() {
            Some(error) => bail!("login failed: {error}"),
            None => bail!("login failed: officer ID and password are required"),
        }
    }

    let mut outcomes = Vec::new();
    for (label, camera) in cameras {
        app.replace_camera(camera);
        let captured = app
            .start_camera()
            .and_then(|()| app.capture_still())
            .with_context(|| format!("capturing {label}"));
        if let Err(e) = captured {
            warn!("{e:#}");
        }
        let outcome = app
            .verify()
            .await
            .cloned()
            .context("verification already in flight")?;
        outcomes.push((label, outcome));
    }
    app.cancel();

    Ok(BatchReport {
        outcomes,
        history: app.history().clone(),
    })
}
