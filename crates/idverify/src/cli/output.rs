//! Plain-text rendering of application state.

use std::io::{self, Write};

use chrono::Local;

use crate::capture::CapturedImage;
use crate::config::{Preference, Preferences};
use crate::history::HistoryLedger;
use crate::session::OfficerSession;
use crate::verify::{format_similarity, VerificationOutcome, NOT_AVAILABLE};

/// Write a verification outcome as a result card.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_outcome(out: &mut impl Write, outcome: &VerificationOutcome) -> io::Result<()> {
    match outcome {
        VerificationOutcome::Matched {
            license,
            similarity,
            matched_image,
        } => {
            writeln!(out, "MATCH: {}", outcome.message())?;
            writeln!(out, "  {:<16} {}", "Similarity:", format_similarity(*similarity))?;
            writeln!(
                out,
                "  {:<16} {}",
                "Matched image:",
                matched_image.as_deref().unwrap_or(NOT_AVAILABLE)
            )?;
            for (label, value) in license.rows() {
                writeln!(out, "  {:<16} {value}", format!("{label}:"))?;
            }
        }
        VerificationOutcome::NotMatched { similarity, .. } => {
            writeln!(out, "NO MATCH: {}", outcome.message())?;
            if similarity.is_some() {
                writeln!(out, "  {:<16} {}", "Similarity:", format_similarity(*similarity))?;
            }
        }
        VerificationOutcome::Failed { .. } => {
            writeln!(out, "ERROR: {}", outcome.message())?;
        }
    }
    Ok(())
}

/// Write a one-line note about a freshly captured still.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_capture(out: &mut impl Write, image: &CapturedImage) -> io::Result<()> {
    let (width, height) = image.dimensions();
    writeln!(
        out,
        "Photo captured at {} ({width}x{height} {}, {} bytes).",
        image.captured_at().with_timezone(&Local).format("%H:%M:%S"),
        image.encoding().mime_type(),
        image.bytes().len()
    )
}

/// One-line summary used for notifications.
#[must_use]
pub fn summary_line(outcome: &VerificationOutcome) -> String {
    match outcome {
        VerificationOutcome::Matched { similarity, .. } => {
            format!("Verification complete: Match ({})", format_similarity(*similarity))
        }
        VerificationOutcome::NotMatched { .. } => "Verification complete: No Match".to_string(),
        VerificationOutcome::Failed { .. } => {
            format!("Verification failed: {}", outcome.message())
        }
    }
}

/// Write the history ledger as a table, newest first.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_history(out: &mut impl Write, history: &HistoryLedger) -> io::Result<()> {
    if history.is_empty() {
        return writeln!(out, "No verifications yet.");
    }
    writeln!(
        out,
        "{:<20} {:<9} {:<11} Matched image",
        "Time", "Result", "Similarity"
    )?;
    for entry in history.entries() {
        writeln!(
            out,
            "{:<20} {:<9} {:<11} {}",
            entry.display_timestamp(),
            entry.outcome.to_string(),
            entry.display_similarity(),
            entry.display_matched_image()
        )?;
    }
    Ok(())
}

/// Write the signed-in officer's details.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_session(out: &mut impl Write, session: &OfficerSession) -> io::Result<()> {
    writeln!(out, "Officer:  {} ({})", session.officer_name, session.officer_id)?;
    writeln!(out, "Station:  {}", session.station)
}

/// Write the preference toggles.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_preferences(out: &mut impl Write, preferences: &Preferences) -> io::Result<()> {
    for pref in Preference::ALL {
        let state = if preferences.get(pref) { "on" } else { "off" };
        writeln!(out, "  {:<22} {state}", pref.label())?;
    }
    Ok(())
}
