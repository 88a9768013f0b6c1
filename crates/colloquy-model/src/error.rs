// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Backend failure classification.
//!
//! Every backend surfaces failures as a [`ClientError`]; the conversation
//! manager routes them by [`ErrorClass`]: auth and quota failures abort the
//! run, connection failures enter the retry loop, everything else is recorded
//! in the history and the conversation continues.

/// Coarse failure category driving the manager's recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or rejected credentials.  Aborts the process with a message
    /// to the operator.
    FatalAuth,
    /// Hard quota exhaustion.  Aborts like auth failures.
    FatalQuota,
    /// Transport-level failure.  The manager retries the conversation with
    /// progressive backoff before giving up.
    FatalConnection,
    /// Expected to clear on its own; currently routed like `NonFatal`.
    Transient,
    /// Recorded as a `system` message in the history; the turn's response
    /// becomes the error text and the loop continues.
    NonFatal,
}

impl ErrorClass {
    /// True for the classes that terminate the run without retry.
    pub fn aborts_run(&self) -> bool {
        matches!(self, ErrorClass::FatalAuth | ErrorClass::FatalQuota)
    }
}

/// Classify a raw backend error message by case-insensitive substring match.
pub fn classify(message: &str) -> ErrorClass {
    let m = message.to_ascii_lowercase();

    if m.contains("api key")
        && (m.contains("missing") || m.contains("not provided") || m.contains("no api key"))
    {
        return ErrorClass::FatalAuth;
    }
    if m.contains("authentication failed") || m.contains("api key not valid") {
        return ErrorClass::FatalAuth;
    }
    if m.contains("quota exceeded") {
        return ErrorClass::FatalQuota;
    }
    const CONNECTION_SIGNALS: &[&str] = &[
        "connection aborted",
        "remote end closed",
        "connection refused",
        "max retries exceeded",
        "read timed out",
        "service unavailable",
    ];
    if CONNECTION_SIGNALS.iter().any(|s| m.contains(s)) {
        return ErrorClass::FatalConnection;
    }
    ErrorClass::NonFatal
}

/// Typed failure returned by [`crate::ModelClient::generate_response`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The backend requires a credential that was not configured.
    /// Surfaces on the first request, not at client construction.
    #[error("{backend}: no API key provided (set {env_var})")]
    MissingApiKey {
        backend: &'static str,
        env_var: &'static str,
    },
    /// Request or transport failure; `message` carries the raw backend error
    /// text that the classifier inspects.
    #[error("{backend} request failed: {message}")]
    Request {
        backend: &'static str,
        message: String,
    },
    /// The backend answered but the body did not contain a usable candidate.
    #[error("{backend} returned an unusable response: {message}")]
    BadResponse {
        backend: &'static str,
        message: String,
    },
}

impl ClientError {
    /// Map this failure onto the recovery-policy class.
    pub fn class(&self) -> ErrorClass {
        match self {
            ClientError::MissingApiKey { .. } => ErrorClass::FatalAuth,
            ClientError::Request { message, .. } => classify(message),
            ClientError::BadResponse { .. } => ErrorClass::NonFatal,
        }
    }

    /// Build a `Request` error from a reqwest failure, normalising transport
    /// conditions onto the classifier's vocabulary.
    pub fn from_reqwest(backend: &'static str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("read timed out: {err}")
        } else if err.is_connect() {
            format!("connection refused: {err}")
        } else {
            err.to_string()
        };
        ClientError::Request { backend, message }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
