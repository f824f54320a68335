//! Stateful orchestration of the credential lifecycle and the
//! request -> validate -> estimate pipeline.
//!
//! ```text
//! Idle --set_credential--> Validating --ok--> Ready --request--> Requesting
//!                                     --err-> Idle                 |-> Previewing
//!                                                                  '-> Failed
//! Previewing / Failed --clear_preview / request--> Ready
//! any --clear_credential--> Idle
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coverage::{estimate_coverage, verified_coverage};
use crate::credential::CredentialSlot;
use crate::error::{AssignmentError, AssignmentResult};
use crate::recommender::validate::audit_proposal;
use crate::recommender::RecommendationClient;
use crate::types::{AssignmentInput, AssignmentReply, Preview};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Validating,
    Ready,
    Requesting,
    Previewing,
    Failed,
}

impl SessionState {
    fn is_busy(self) -> bool {
        matches!(self, Self::Validating | Self::Requesting)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub state: SessionState,
    pub initialized: bool,
    pub is_loading: bool,
    pub preview: Option<Preview>,
    pub error: Option<String>,
    pub credential_error: Option<String>,
}

struct Inner {
    state: SessionState,
    client: RecommendationClient,
    preview: Option<Preview>,
    error: Option<String>,
    credential_error: Option<String>,
    // Bumped by clear_credential so in-flight results from before the clear are dropped.
    generation: u64,
}

pub struct AssignmentSession {
    inner: Mutex<Inner>,
    slot: CredentialSlot,
    verify_improvement: bool,
}

impl AssignmentSession {
    pub fn new(client: RecommendationClient, slot: CredentialSlot) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                client,
                preview: None,
                error: None,
                credential_error: None,
                generation: 0,
            }),
            slot,
            verify_improvement: false,
        }
    }

    pub fn with_verified_coverage(mut self, enabled: bool) -> Self {
        self.verify_improvement = enabled;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Activates a previously persisted credential without a validation
    /// round-trip. Returns whether the session is now initialized.
    pub fn restore(&self) -> AssignmentResult<bool> {
        let mut inner = self.lock();
        if inner.state != SessionState::Idle {
            return Ok(inner.client.is_initialized());
        }
        let Some(credential) = self.slot.load().map_err(AssignmentError::Storage)? else {
            return Ok(false);
        };
        inner.client.initialize(&credential)?;
        inner.state = SessionState::Ready;
        info!("restored persisted recommender credential");
        Ok(true)
    }

    /// Validates `candidate` on a throwaway connection and, if accepted,
    /// makes it the active credential and persists it.
    ///
    /// From `Idle` a rejection leaves the session `Idle`. When a credential is
    /// already active, a rejection keeps the old one and the current state.
    pub async fn set_credential(&self, candidate: &str) -> AssignmentResult<()> {
        let (client, previous, generation) = {
            let mut inner = self.lock();
            if inner.state.is_busy() {
                return Err(AssignmentError::RequestInFlight);
            }
            let previous = inner.state;
            inner.state = SessionState::Validating;
            inner.credential_error = None;
            (inner.client.clone(), previous, inner.generation)
        };
        info!("validating recommender credential");

        let accepted = client.validate_credential(candidate).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            info!("credential cleared during validation; discarding result");
            return Err(AssignmentError::NotInitialized);
        }
        if !accepted {
            inner.state = previous;
            let err = AssignmentError::InvalidCredential;
            inner.credential_error = Some(err.to_string());
            warn!("recommender credential rejected");
            return Err(err);
        }

        if let Err(e) = self.slot.save(candidate) {
            inner.state = previous;
            inner.credential_error = Some(format!("{e:#}"));
            return Err(AssignmentError::Storage(e));
        }
        if let Err(e) = inner.client.initialize(candidate) {
            inner.state = previous;
            inner.credential_error = Some(e.to_string());
            return Err(e);
        }
        inner.state = SessionState::Ready;
        inner.preview = None;
        inner.error = None;
        info!("recommender credential validated and stored");
        Ok(())
    }

    /// Drops the active credential from memory and storage. Allowed from any
    /// state; a call still in flight has its result discarded.
    pub fn clear_credential(&self) -> AssignmentResult<()> {
        {
            let mut inner = self.lock();
            inner.client.clear();
            inner.state = SessionState::Idle;
            inner.preview = None;
            inner.error = None;
            inner.credential_error = None;
            inner.generation += 1;
        }
        info!("recommender credential cleared");
        self.slot.clear().map_err(AssignmentError::Storage)
    }

    pub async fn request_assignment(&self, input: &AssignmentInput) -> AssignmentResult<Preview> {
        let before = estimate_coverage(&input.gaps, None);
        let (client, generation) = {
            let mut inner = self.lock();
            if inner.state.is_busy() {
                return Err(AssignmentError::RequestInFlight);
            }
            if inner.state == SessionState::Idle || !inner.client.is_initialized() {
                return Err(AssignmentError::NotInitialized);
            }
            inner.state = SessionState::Requesting;
            inner.preview = Some(Preview::loading(input.date, before));
            inner.error = None;
            (inner.client.clone(), inner.generation)
        };

        let result = client
            .request_assignment(input)
            .await
            .map(|reply| self.build_preview(reply, input));

        let mut inner = self.lock();
        if inner.generation != generation {
            info!(date = %input.date, "session cleared during request; discarding result");
            return Err(AssignmentError::NotInitialized);
        }
        match result {
            Ok(preview) => {
                info!(
                    date = %preview.date,
                    before = preview.before_coverage,
                    after = preview.after_coverage,
                    "assignment preview ready"
                );
                inner.state = SessionState::Previewing;
                inner.preview = Some(preview.clone());
                Ok(preview)
            }
            Err(e) => {
                warn!(date = %input.date, "assignment request failed: {e}");
                inner.state = SessionState::Failed;
                inner.preview = None;
                inner.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    // Runs without the session lock held.
    fn build_preview(&self, reply: AssignmentReply, input: &AssignmentInput) -> Preview {
        let violations = audit_proposal(&reply, input);
        let after_coverage = if self.verify_improvement {
            verified_coverage(&input.gaps, &reply.proposed_shifts)
        } else {
            estimate_coverage(&input.gaps, Some(&reply.summary))
        };
        Preview {
            date: input.date,
            before_coverage: estimate_coverage(&input.gaps, None),
            after_coverage,
            proposed_shifts: reply.proposed_shifts,
            unfilled_slots: reply.unfilled_slots,
            violations,
            is_loading: false,
            error: None,
        }
    }

    pub fn clear_preview(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, SessionState::Previewing | SessionState::Failed) {
            inner.state = SessionState::Ready;
            inner.preview = None;
            inner.error = None;
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().client.is_initialized()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state == SessionState::Requesting
    }

    pub fn preview(&self) -> Option<Preview> {
        self.lock().preview.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn view(&self) -> SessionView {
        let inner = self.lock();
        SessionView {
            state: inner.state,
            initialized: inner.client.is_initialized(),
            is_loading: inner.state == SessionState::Requesting,
            preview: inner.preview.clone(),
            error: inner.error.clone(),
            credential_error: inner.credential_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::Notify;

    use super::*;
    use crate::credential::{KeyValueStore, MemoryKeyValueStore};
    use crate::recommender::testing::ScriptedConnector;
    use crate::recommender::{Connector, Recommender};
    use crate::types::{AvailableStaffMember, EmploymentType, Gap};

    const SLOT: &str = "recommender_api_key";
    const GOOD_REPLY: &str = r#"{
        "proposedShifts": [
            {"staffId": "s1", "staffName": "Aoi", "startTime": "9:00", "endTime": "13:00", "reason": "morning"}
        ],
        "unfilledSlots": [{"timeRange": "21:00-22:00", "reason": "nobody available"}],
        "summary": {"totalProposed": 1, "coverageImprovement": 25}
    }"#;

    fn input() -> AssignmentInput {
        AssignmentInput {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date"),
            day_label: None,
            gaps: vec![Gap::new(9, 0, 2, 1)],
            available_staff: vec![AvailableStaffMember {
                id: "s1".to_string(),
                name: "Aoi".to_string(),
                employment_type: EmploymentType::PartTime,
                available_from: "08:00".to_string(),
                available_to: "18:00".to_string(),
            }],
            existing_shifts: Vec::new(),
        }
    }

    fn session_with(
        connector: Arc<dyn Connector>,
    ) -> (AssignmentSession, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::default());
        let slot = CredentialSlot::new(store.clone(), SLOT);
        (
            AssignmentSession::new(RecommendationClient::new(connector), slot),
            store,
        )
    }

    fn scripted(replies: Vec<Result<String>>) -> (AssignmentSession, Arc<MemoryKeyValueStore>) {
        session_with(Arc::new(ScriptedConnector::with_replies(replies)))
    }

    #[tokio::test]
    async fn accepted_credential_moves_to_ready_and_persists() {
        let (session, store) = scripted(vec![Ok("OK".to_string())]);
        assert_eq!(session.state(), SessionState::Idle);
        session.set_credential("good-key").await.expect("accepted");
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.is_initialized());
        assert_eq!(store.get(SLOT).expect("get").as_deref(), Some("good-key"));
    }

    #[tokio::test]
    async fn rejected_credential_returns_to_idle_without_persisting() {
        let (session, store) = scripted(Vec::new());
        let err = session.set_credential("bad-key").await.unwrap_err();
        assert!(matches!(err, AssignmentError::InvalidCredential));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_initialized());
        assert_eq!(store.get(SLOT).expect("get"), None);
        assert!(session.view().credential_error.is_some());
    }

    #[tokio::test]
    async fn rejected_replacement_keeps_active_credential() {
        let (session, store) = scripted(vec![Ok("OK".to_string())]);
        session.set_credential("good-key").await.expect("accepted");
        assert!(session.set_credential("bad-key").await.is_err());
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.is_initialized());
        assert_eq!(store.get(SLOT).expect("get").as_deref(), Some("good-key"));
    }

    #[tokio::test]
    async fn restore_activates_persisted_credential() {
        let (session, store) = scripted(Vec::new());
        assert!(!session.restore().expect("restore"));
        store.set(SLOT, "saved-key").expect("set");
        assert!(session.restore().expect("restore"));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn request_before_credential_is_not_initialized() {
        let (session, _) = scripted(Vec::new());
        let err = session.request_assignment(&input()).await.unwrap_err();
        assert!(matches!(err, AssignmentError::NotInitialized));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn successful_request_publishes_preview() {
        let (session, _) = scripted(vec![Ok("OK".to_string()), Ok(GOOD_REPLY.to_string())]);
        session.set_credential("good-key").await.expect("accepted");
        let preview = session.request_assignment(&input()).await.expect("preview");
        assert_eq!(preview.before_coverage, 50);
        assert_eq!(preview.after_coverage, 75);
        assert_eq!(preview.proposed_shifts.len(), 1);
        assert_eq!(preview.unfilled_slots.len(), 1);
        assert!(preview.violations.is_empty());
        assert!(!preview.is_loading);
        assert_eq!(preview.error, None);
        assert_eq!(session.state(), SessionState::Previewing);
        assert_eq!(session.preview(), Some(preview));

        session.clear_preview();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.preview(), None);
    }

    #[tokio::test]
    async fn failed_request_keeps_message_and_clears_preview() {
        let (session, _) = scripted(vec![
            Ok("OK".to_string()),
            Ok(GOOD_REPLY.to_string()),
            Ok("not json at all".to_string()),
        ]);
        session.set_credential("good-key").await.expect("accepted");
        session.request_assignment(&input()).await.expect("preview");
        let err = session.request_assignment(&input()).await.unwrap_err();
        assert!(matches!(err, AssignmentError::MalformedResponse(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.preview(), None);
        assert!(session
            .error()
            .expect("error retained")
            .contains("malformed"));
        assert_eq!(session.view().preview, None);

        session.clear_preview();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.error(), None);
    }

    #[tokio::test]
    async fn verified_coverage_ignores_reported_improvement() {
        let (session, _) = scripted(vec![Ok("OK".to_string()), Ok(GOOD_REPLY.to_string())]);
        let session = session.with_verified_coverage(true);
        session.set_credential("good-key").await.expect("accepted");
        let preview = session.request_assignment(&input()).await.expect("preview");
        assert_eq!(preview.after_coverage, 100);
    }

    #[tokio::test]
    async fn clear_credential_resets_everything() {
        let (session, store) = scripted(vec![Ok("OK".to_string()), Ok(GOOD_REPLY.to_string())]);
        session.set_credential("good-key").await.expect("accepted");
        session.request_assignment(&input()).await.expect("preview");
        session.clear_credential().expect("clear");
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.preview(), None);
        assert!(!session.is_initialized());
        assert_eq!(store.get(SLOT).expect("get"), None);
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow::anyhow!("disk full"))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn storage_failure_restores_previous_state() {
        let slot = CredentialSlot::new(Arc::new(FailingStore), SLOT);
        let connector = Arc::new(ScriptedConnector::with_replies(vec![Ok("OK".to_string())]));
        let session = AssignmentSession::new(RecommendationClient::new(connector), slot);

        let err = session.set_credential("good-key").await.unwrap_err();
        assert!(matches!(err, AssignmentError::Storage(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_initialized());
        assert!(session
            .view()
            .credential_error
            .expect("credential error")
            .contains("disk full"));
        assert!(!session.restore().expect("restore"));
    }

    #[tokio::test]
    async fn unparseable_availability_does_not_wedge_the_session() {
        let (session, _) = scripted(vec![
            Ok("OK".to_string()),
            Ok(GOOD_REPLY.to_string()),
            Ok(GOOD_REPLY.to_string()),
        ]);
        session.set_credential("good-key").await.expect("accepted");
        let mut input = input();
        input.available_staff[0].available_from = "999999999999999999:00".to_string();
        input.available_staff[0].available_to = "-999999999999999999:00".to_string();

        session.request_assignment(&input).await.expect("preview");
        assert_eq!(session.state(), SessionState::Previewing);
        session.request_assignment(&input).await.expect("second preview");
    }

    struct Gated {
        gate: Arc<Notify>,
        hold_validation: bool,
    }

    #[async_trait]
    impl Recommender for Gated {
        async fn generate(&self, prompt: &str) -> Result<String> {
            let validating = prompt.starts_with("Reply with the single word");
            if validating == self.hold_validation {
                self.gate.notified().await;
            }
            if validating {
                Ok("OK".to_string())
            } else {
                Ok(GOOD_REPLY.to_string())
            }
        }
    }

    struct GatedConnector {
        gate: Arc<Notify>,
        hold_validation: bool,
    }

    impl Connector for GatedConnector {
        fn connect(&self, _credential: &str) -> Result<Arc<dyn Recommender>> {
            Ok(Arc::new(Gated {
                gate: self.gate.clone(),
                hold_validation: self.hold_validation,
            }))
        }
    }

    async fn started_validation(gate: Arc<Notify>) -> (
        Arc<AssignmentSession>,
        Arc<MemoryKeyValueStore>,
        tokio::task::JoinHandle<AssignmentResult<()>>,
    ) {
        let (session, store) = session_with(Arc::new(GatedConnector {
            gate,
            hold_validation: true,
        }));
        let session = Arc::new(session);
        let background = session.clone();
        let handle = tokio::spawn(async move { background.set_credential("good-key").await });
        while session.state() != SessionState::Validating {
            tokio::task::yield_now().await;
        }
        (session, store, handle)
    }

    #[tokio::test]
    async fn calls_during_validation_are_rejected() {
        let gate = Arc::new(Notify::new());
        let (session, store, handle) = started_validation(gate.clone()).await;

        let err = session.set_credential("other-key").await.unwrap_err();
        assert!(matches!(err, AssignmentError::RequestInFlight));
        let err = session.request_assignment(&input()).await.unwrap_err();
        assert!(matches!(err, AssignmentError::RequestInFlight));
        assert_eq!(session.state(), SessionState::Validating);

        gate.notify_one();
        handle.await.expect("join").expect("accepted");
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(store.get(SLOT).expect("get").as_deref(), Some("good-key"));
    }

    #[tokio::test]
    async fn validation_finishing_after_clear_is_discarded() {
        let gate = Arc::new(Notify::new());
        let (session, store, handle) = started_validation(gate.clone()).await;
        session.clear_credential().expect("clear");

        gate.notify_one();
        let err = handle.await.expect("join").unwrap_err();
        assert!(matches!(err, AssignmentError::NotInitialized));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_initialized());
        assert_eq!(store.get(SLOT).expect("get"), None);
    }

    async fn started_request(gate: Arc<Notify>) -> (
        Arc<AssignmentSession>,
        tokio::task::JoinHandle<AssignmentResult<Preview>>,
    ) {
        let (session, _) = session_with(Arc::new(GatedConnector {
            gate,
            hold_validation: false,
        }));
        let session = Arc::new(session);
        session.set_credential("good-key").await.expect("accepted");
        let background = session.clone();
        let handle = tokio::spawn(async move { background.request_assignment(&input()).await });
        while session.state() != SessionState::Requesting {
            tokio::task::yield_now().await;
        }
        (session, handle)
    }

    #[tokio::test]
    async fn overlapping_request_is_rejected() {
        let gate = Arc::new(Notify::new());
        let (session, handle) = started_request(gate.clone()).await;
        assert!(session.is_loading());
        assert!(session.view().preview.expect("loading preview").is_loading);

        let err = session.request_assignment(&input()).await.unwrap_err();
        assert!(matches!(err, AssignmentError::RequestInFlight));
        let err = session.set_credential("other-key").await.unwrap_err();
        assert!(matches!(err, AssignmentError::RequestInFlight));

        gate.notify_one();
        let preview = handle.await.expect("join").expect("preview");
        assert_eq!(preview.after_coverage, 75);
        assert_eq!(session.state(), SessionState::Previewing);
    }

    #[tokio::test]
    async fn result_arriving_after_clear_is_discarded() {
        let gate = Arc::new(Notify::new());
        let (session, handle) = started_request(gate.clone()).await;
        session.clear_credential().expect("clear");

        gate.notify_one();
        let err = handle.await.expect("join").unwrap_err();
        assert!(matches!(err, AssignmentError::NotInitialized));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.preview(), None);
    }
}
