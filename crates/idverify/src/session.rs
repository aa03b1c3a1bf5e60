//! Officer sign-in.
//!
//! The login service is an external collaborator: it receives trimmed
//! credentials and answers with the officer's session record. Nothing here is
//! persisted; a session lives only as long as the owning [`crate::app::App`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result, INVALID_CREDENTIALS};
use crate::transport::HttpTransport;

/// The authenticated officer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficerSession {
    /// Officer identifier.
    #[serde(default, deserialize_with = "lenient_string")]
    pub officer_id: String,
    /// Display name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub officer_name: String,
    /// Assigned station.
    #[serde(default, deserialize_with = "lenient_string")]
    pub station: String,
}

/// Accept strings, numbers and null where the service is loose about types.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Officer credentials as typed on the login screen.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    officer_id: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("officer_id", &self.officer_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Create credentials from raw input.
    #[must_use]
    pub fn new(officer_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            officer_id: officer_id.into(),
            password: password.into(),
        }
    }

    /// The officer ID with surrounding whitespace removed.
    #[must_use]
    pub fn officer_id(&self) -> &str {
        self.officer_id.trim()
    }

    /// Whether both fields hold something other than whitespace.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.officer_id.trim().is_empty() && !self.password.trim().is_empty()
    }

    /// JSON body for the login call.
    #[must_use]
    pub fn to_request_body(&self) -> Value {
        json!({
            "officerId": self.officer_id.trim(),
            "password": self.password.trim(),
        })
    }
}

/// Sign in against the configured login service.
///
/// # Errors
///
/// - [`Error::MissingEndpoint`] if no login URL is configured; no request is made.
/// - [`Error::Auth`] if the credentials are incomplete or the service rejects them.
/// - [`Error::Transport`] if the service cannot be reached.
pub async fn login(
    transport: &dyn HttpTransport,
    config: &Config,
    credentials: &Credentials,
) -> Result<OfficerSession> {
    let url = config.login_url()?;
    if !credentials.is_complete() {
        return Err(Error::auth("Officer ID and password are required"));
    }

    info!(officer_id = credentials.officer_id(), "signing in");
    let response = transport
        .post_json(&url, &credentials.to_request_body())
        .await?;

    if !response.is_success() {
        warn!(status = response.status, "login rejected");
        let message = response
            .json()
            .ok()
            .flatten()
            .and_then(|body| rejection_message(&body));
        return Err(Error::auth(
            message.unwrap_or_else(|| INVALID_CREDENTIALS.to_string()),
        ));
    }

    let body = match response.json() {
        Ok(Some(body)) => body,
        Ok(None) => return Err(Error::invalid_credentials()),
        Err(e) => {
            warn!("login response is not JSON: {e}");
            return Err(Error::invalid_credentials());
        }
    };
    let session = session_from_body(body)?;
    info!(
        officer_id = %session.officer_id,
        station = %session.station,
        "signed in"
    );
    Ok(session)
}

fn rejection_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn session_from_body(body: Value) -> Result<OfficerSession> {
    if !body.is_object() || body.get("success") == Some(&Value::Bool(false)) {
        return Err(Error::invalid_credentials());
    }
    serde_json::from_value(body).map_err(|e| {
        warn!("unexpected session shape: {e}");
        Error::invalid_credentials()
    })
}

/// Login screen state: field values, the in-flight flag and the last error.
#[derive(Default, Clone)]
pub struct LoginForm {
    /// Officer ID field.
    pub officer_id: String,
    /// Password field.
    pub password: String,
    pending: bool,
    error: Option<String>,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("officer_id", &self.officer_id)
            .field("password", &"<redacted>")
            .field("pending", &self.pending)
            .field("error", &self.error)
            .finish()
    }
}

impl LoginForm {
    /// Whether the submit control is enabled.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.pending && self.credentials().is_complete()
    }

    /// Whether a sign-in attempt is in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Message from the last failed attempt.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Current field values as credentials.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.officer_id.clone(), self.password.clone())
    }

    /// Mark an attempt as started and hand out the credentials to send.
    ///
    /// Returns `None` while disabled; the caller must not issue a request.
    pub fn begin(&mut self) -> Option<Credentials> {
        if !self.can_submit() {
            return None;
        }
        self.pending = true;
        self.error = None;
        Some(self.credentials())
    }

    /// Settle the in-flight attempt. Field values are kept on failure.
    pub fn finish(&mut self, result: Result<OfficerSession>) -> Option<OfficerSession> {
        self.pending = false;
        match result {
            Ok(session) => Some(session),
            Err(e) => {
                self.error = Some(e.to_string());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::stub::StubTransport;
    use crate::transport::TransportError;

    fn config() -> Config {
        let mut config = Config::default();
        config.endpoints.login_base_url = Some("https://auth.example.com".to_string());
        config
    }

    #[test]
    fn test_credentials_trimmed_body() {
        let creds = Credentials::new("  O1 ", "\tsecret \n");
        assert_eq!(
            creds.to_request_body(),
            json!({"officerId": "O1", "password": "secret"})
        );
        assert_eq!(creds.officer_id(), "O1");
    }

    #[test]
    fn test_credentials_completeness() {
        assert!(Credentials::new("O1", "pw").is_complete());
        assert!(!Credentials::new("", "pw").is_complete());
        assert!(!Credentials::new("O1", "").is_complete());
        assert!(!Credentials::new("   ", "pw").is_complete());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("O1", "hunter2"));
        assert!(debug.contains("O1"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_login_form_disabled_when_empty() {
        let mut form = LoginForm::default();
        assert!(!form.can_submit());
        assert!(form.begin().is_none());

        form.officer_id = "O1".to_string();
        assert!(!form.can_submit());
        assert!(form.begin().is_none());
        assert!(!form.is_pending());
    }

    #[test]
    fn test_login_form_single_attempt_in_flight() {
        let mut form = LoginForm {
            officer_id: "O1".to_string(),
            password: "pw".to_string(),
            ..LoginForm::default()
        };
        assert!(form.begin().is_some());
        assert!(form.is_pending());
        assert!(!form.can_submit());
        assert!(form.begin().is_none());
    }

    #[test]
    fn test_login_form_failure_keeps_fields() {
        let mut form = LoginForm {
            officer_id: "O1".to_string(),
            password: "pw".to_string(),
            ..LoginForm::default()
        };
        form.begin();
        assert!(form.finish(Err(Error::invalid_credentials())).is_none());

        assert!(!form.is_pending());
        assert_eq!(form.error(), Some("Invalid Officer ID or Password"));
        assert_eq!(form.officer_id, "O1");
        assert_eq!(form.password, "pw");
        assert!(form.can_submit());
    }

    #[test]
    fn test_login_form_begin_clears_error() {
        let mut form = LoginForm {
            officer_id: "O1".to_string(),
            password: "pw".to_string(),
            ..LoginForm::default()
        };
        form.begin();
        form.finish(Err(Error::invalid_credentials()));
        form.begin();
        assert!(form.error().is_none());
    }

    #[tokio::test]
    async fn test_login_success() {
        let stub = StubTransport::new().respond_json(
            200,
            &json!({"success": true, "officerId": "O1", "officerName": "Jane", "station": "S1"}),
        );

        let session = login(&stub, &config(), &Credentials::new(" O1 ", " pw "))
            .await
            .expect("login");
        assert_eq!(
            session,
            OfficerSession {
                officer_id: "O1".to_string(),
                officer_name: "Jane".to_string(),
                station: "S1".to_string(),
            }
        );

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://auth.example.com/login");
        assert_eq!(requests[0].body, json!({"officerId": "O1", "password": "pw"}));
    }

    #[tokio::test]
    async fn test_login_unauthorized_without_body() {
        let stub = StubTransport::new().respond(401, "");

        let err = login(&stub, &config(), &Credentials::new("O1", "bad"))
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
        assert_eq!(err.to_string(), "Invalid Officer ID or Password");
    }

    #[tokio::test]
    async fn test_login_rejection_message_takes_precedence() {
        let stub = StubTransport::new().respond_json(403, &json!({"message": "Account suspended"}));

        let err = login(&stub, &config(), &Credentials::new("O1", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Account suspended");
    }

    #[tokio::test]
    async fn test_login_success_false() {
        let stub = StubTransport::new().respond_json(200, &json!({"success": false}));

        let err = login(&stub, &config(), &Credentials::new("O1", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid Officer ID or Password");
    }

    #[tokio::test]
    async fn test_login_empty_success_body() {
        let stub = StubTransport::new().respond(200, "");

        let err = login(&stub, &config(), &Credentials::new("O1", "pw"))
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_login_null_body() {
        let stub = StubTransport::new().respond(200, "null");

        let err = login(&stub, &config(), &Credentials::new("O1", "pw"))
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_login_numeric_officer_id() {
        let stub = StubTransport::new()
            .respond_json(200, &json!({"officerId": 42, "officerName": "Sam"}));

        let session = login(&stub, &config(), &Credentials::new("42", "pw"))
            .await
            .expect("login");
        assert_eq!(session.officer_id, "42");
        assert_eq!(session.station, "");
    }

    #[tokio::test]
    async fn test_login_missing_endpoint_makes_no_call() {
        let stub = StubTransport::new();

        let err = login(&stub, &Config::default(), &Credentials::new("O1", "pw"))
            .await
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_login_incomplete_credentials_makes_no_call() {
        let stub = StubTransport::new();

        let err = login(&stub, &config(), &Credentials::new("O1", "  "))
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_login_transport_failure() {
        let stub =
            StubTransport::new().fail(TransportError::Connect("connection refused".to_string()));

        let err = login(&stub, &config(), &Credentials::new("O1", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
