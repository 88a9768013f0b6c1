// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    client::{ModelClient, TurnRequest},
    error::ClientError,
};

/// Deterministic mock backend for tests.  Echoes the turn prompt back as the
/// response.
#[derive(Default)]
pub struct MockClient;

#[async_trait]
impl ModelClient for MockClient {
    fn backend(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn generate_response(&self, req: TurnRequest) -> Result<String, ClientError> {
        Ok(format!("MOCK: {}", req.prompt))
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// A pre-scripted mock backend.  Each call pops the next outcome from the
/// front of the queue, so tests can specify exact success/failure sequences
/// – including classified connection failures – without network access.
///
/// Every request is recorded for later inspection, which is how the
/// role-swap and history-integrity tests observe what the manager sent.
pub struct ScriptedClient {
    scripts: Mutex<Vec<Result<String, ClientError>>>,
    /// Returned once the scripted outcomes are exhausted.
    fallback: Option<String>,
    /// Every `TurnRequest` seen by this client, in call order.
    pub requests: Arc<Mutex<Vec<TurnRequest>>>,
    name: String,
}

impl ScriptedClient {
    /// Build a client from an ordered list of outcomes.
    pub fn new(scripts: Vec<Result<String, ClientError>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            fallback: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            name: "scripted-mock".into(),
        }
    }

    /// Convenience: client that always returns the same text.
    pub fn always_text(reply: impl Into<String>) -> Self {
        let r = reply.into();
        let mut c = Self::new(vec![]);
        c.name = format!("scripted-mock({r})");
        c.set_fallback(r);
        c
    }

    /// Convenience: client that fails `failures` times with a
    /// connection-classified error, then succeeds with `reply` forever.
    pub fn fail_then_succeed(failures: usize, reply: impl Into<String>) -> Self {
        let reply = reply.into();
        let scripts = (0..failures)
            .map(|_| {
                Err(ClientError::Request {
                    backend: "mock",
                    message: "Connection aborted".into(),
                })
            })
            .collect();
        let mut c = Self::new(scripts);
        c.set_fallback(reply);
        c
    }

    fn set_fallback(&mut self, reply: String) {
        self.fallback = Some(reply);
    }

    /// Number of `generate_response` calls seen so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The history the manager passed on call `index`.
    pub fn history_at(&self, index: usize) -> Vec<crate::Message> {
        self.requests.lock().unwrap()[index].history.clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn backend(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn generate_response(&self, req: TurnRequest) -> Result<String, ClientError> {
        self.requests.lock().unwrap().push(req);
        let next = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                None
            } else {
                Some(scripts.remove(0))
            }
        };
        match next {
            Some(outcome) => outcome,
            None => Ok(self
                .fallback
                .clone()
                .unwrap_or_else(|| "[no more scripts]".into())),
        }
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
