//! In-memory payment gateway for tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{
    CreateSessionRequest, GatewayError, GatewaySession, PaymentGateway, SessionSnapshot,
    SessionStatus,
};

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: HashMap<String, (CreateSessionRequest, SessionSnapshot)>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_get: bool,
}

/// In-memory payment gateway for testing.
///
/// Sessions start `open`; tests drive them to an outcome with
/// [`InMemoryPaymentGateway::set_session_status`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to reject session creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures the gateway to reject status lookups.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.state.write().unwrap().fail_on_get = fail;
    }

    /// Sets the outcome the gateway reports for a session.
    pub fn set_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        payment_id: Option<&str>,
    ) {
        let mut state = self.state.write().unwrap();
        if let Some((_, snapshot)) = state.sessions.get_mut(session_id) {
            snapshot.status = status;
            snapshot.payment_id = payment_id.map(String::from);
        }
    }

    /// Returns the number of sessions opened so far.
    pub fn session_count(&self) -> usize {
        self.state.read().unwrap().sessions.len()
    }

    /// Returns the request a session was opened with.
    pub fn request_for(&self, session_id: &str) -> Option<CreateSessionRequest> {
        self.state
            .read()
            .unwrap()
            .sessions
            .get(session_id)
            .map(|(request, _)| request.clone())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<GatewaySession, GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(GatewayError::Unavailable("session creation declined".to_string()));
        }

        state.next_id += 1;
        let session_id = format!("cs_test_{:04}", state.next_id);
        let client_secret = format!("{session_id}_secret");
        state.sessions.insert(
            session_id.clone(),
            (
                request.clone(),
                SessionSnapshot {
                    status: SessionStatus::Open,
                    payment_id: None,
                    customer_email: request.customer_email.clone(),
                },
            ),
        );

        Ok(GatewaySession {
            session_id,
            client_secret,
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot, GatewayError> {
        let state = self.state.read().unwrap();

        if state.fail_on_get {
            return Err(GatewayError::Unavailable("status lookup declined".to_string()));
        }

        state
            .sessions
            .get(session_id)
            .map(|(_, snapshot)| snapshot.clone())
            .ok_or_else(|| GatewayError::Status {
                status: 404,
                message: format!("No such checkout session: {session_id}"),
            })
    }
}
