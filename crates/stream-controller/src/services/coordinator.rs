//! Session coordinator.
//!
//! Provisions the three resources behind a live session and tears them down
//! again. The coordinator keeps no session memory: the [`SessionHandle`] it
//! returns from `start_session` is the only record, and the caller sends it
//! back to end the session.
//!
//! # Ordering
//!
//! - Start: room, publisher endpoint, processor, then counter reset
//! - End: processor `ended`, publisher endpoint `ended`, room `completed`
//!
//! Neither direction retries or rolls back. A failure part way through is
//! reported with the resources already touched so an operator can reconcile.

use crate::errors::ScError;
use crate::models::{
    CreatedResource, ProvisionFailure, ProvisionStep, ResourceStatus, SessionHandle,
    SessionState, TeardownFailure,
};
use crate::observability::metrics::record_session_operation;
use crate::repositories::ViewerCounter;
use crate::services::platform::{CreateResource, PlatformError, ProcessorBinding, ResourceProvisioner};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Caller-side view of one session, advanced only through checked transitions.
struct Lifecycle<'a> {
    stream_name: &'a str,
    state: SessionState,
}

impl<'a> Lifecycle<'a> {
    fn new(stream_name: &'a str, state: SessionState) -> Self {
        Self { stream_name, state }
    }

    fn advance(&mut self, next: SessionState) -> Result<(), ScError> {
        let next = self.state.transition(next).map_err(|e| {
            error!(target: "sc.services.coordinator", stream_name = %self.stream_name, error = %e, "Rejected session transition");
            ScError::Internal
        })?;

        debug!(
            target: "sc.services.coordinator",
            stream_name = %self.stream_name,
            from = ?self.state,
            to = ?next,
            "Session state changed"
        );
        self.state = next;
        Ok(())
    }
}

/// Orchestrates session start and end against the platform.
pub struct SessionCoordinator {
    provisioner: Arc<dyn ResourceProvisioner>,
    counter: Arc<dyn ViewerCounter>,
    call_timeout: Duration,
}

impl SessionCoordinator {
    /// `call_timeout` bounds each platform call individually.
    pub fn new(
        provisioner: Arc<dyn ResourceProvisioner>,
        counter: Arc<dyn ViewerCounter>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provisioner,
            counter,
            call_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, PlatformError>>,
    ) -> Result<T, PlatformError> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .unwrap_or(Err(PlatformError::Timeout))
    }

    /// Provision a session named `stream_name`.
    ///
    /// On success the viewer counter has been reset to zero exactly once.
    ///
    /// # Errors
    ///
    /// - `ScError::BadRequest` if `stream_name` is empty (no platform call)
    /// - `ScError::ProvisionFailure` if any step fails; earlier resources
    ///   are left in place and listed
    #[instrument(skip_all, fields(stream_name = %stream_name))]
    pub async fn start_session(&self, stream_name: &str) -> Result<SessionHandle, ScError> {
        if stream_name.trim().is_empty() {
            record_session_operation("start", "bad_request");
            return Err(ScError::BadRequest("streamName is required".to_string()));
        }

        let mut lifecycle = Lifecycle::new(stream_name, SessionState::NotStarted);
        lifecycle.advance(SessionState::Starting)?;

        match self.provision(stream_name).await {
            Ok(handle) => {
                lifecycle.advance(SessionState::Active)?;
                record_session_operation("start", "success");
                info!(
                    target: "sc.services.coordinator",
                    stream_name = %stream_name,
                    room_id = %handle.room_id,
                    publisher_endpoint_id = %handle.publisher_endpoint_id,
                    processor_id = %handle.processor_id,
                    "Session started"
                );
                Ok(handle)
            }
            Err(failure) => {
                lifecycle.advance(SessionState::Failed)?;
                record_session_operation("start", "provision_failure");
                warn!(
                    target: "sc.services.coordinator",
                    stream_name = %stream_name,
                    failed_step = %failure.failed_step,
                    created = failure.created.len(),
                    "Session start failed"
                );
                Err(ScError::ProvisionFailure(failure))
            }
        }
    }

    async fn provision(&self, stream_name: &str) -> Result<SessionHandle, ProvisionFailure> {
        let mut created = Vec::with_capacity(3);

        let room_id = self
            .create(
                CreateResource::Room {
                    unique_name: stream_name.to_string(),
                },
                &mut created,
            )
            .await?;

        let publisher_endpoint_id = self
            .create(CreateResource::PublisherEndpoint, &mut created)
            .await?;

        let processor_id = self
            .create(
                CreateResource::Processor(ProcessorBinding {
                    room_id: room_id.clone(),
                    publisher_endpoint_id: publisher_endpoint_id.clone(),
                }),
                &mut created,
            )
            .await?;

        // Only after all three resources exist
        self.counter
            .reset()
            .await
            .map_err(|e| ProvisionFailure {
                failed_step: ProvisionStep::CounterReset,
                created: created.clone(),
                reason: e.to_string(),
            })?;

        Ok(SessionHandle {
            room_id,
            stream_name: stream_name.to_string(),
            publisher_endpoint_id,
            processor_id,
        })
    }

    async fn create(
        &self,
        request: CreateResource,
        created: &mut Vec<CreatedResource>,
    ) -> Result<String, ProvisionFailure> {
        let kind = request.kind();

        match self.bounded(self.provisioner.create(request)).await {
            Ok(id) => {
                debug!(target: "sc.services.coordinator", kind = %kind, id = %id, "Provisioned resource");
                created.push(CreatedResource {
                    kind,
                    id: id.clone(),
                });
                Ok(id)
            }
            Err(e) => Err(ProvisionFailure {
                failed_step: ProvisionStep::from(kind),
                created: created.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// End the session described by `handle` and return the confirmation
    /// message. The viewer counter is not touched.
    ///
    /// # Errors
    ///
    /// - `ScError::BadRequest` if any identifier is missing (no platform call)
    /// - `ScError::TeardownFailure` if a status update fails; later steps
    ///   are not attempted
    #[instrument(skip_all, fields(stream_name = %handle.stream_name))]
    pub async fn end_session(&self, handle: &SessionHandle) -> Result<String, ScError> {
        let missing = handle.missing_fields();
        if !missing.is_empty() {
            record_session_operation("end", "bad_request");
            return Err(ScError::BadRequest(format!(
                "Missing stream details: {}",
                missing.join(", ")
            )));
        }

        let mut lifecycle = Lifecycle::new(&handle.stream_name, SessionState::Active);
        lifecycle.advance(SessionState::Ending)?;

        let mut completed_steps = Vec::with_capacity(3);
        for (kind, id) in handle.teardown_order() {
            let status = ResourceStatus::terminal_for(kind);

            if let Err(e) = self
                .bounded(self.provisioner.update_status(kind, id, status))
                .await
            {
                lifecycle.advance(SessionState::PartiallyEnded)?;
                record_session_operation("end", "teardown_failure");
                warn!(
                    target: "sc.services.coordinator",
                    stream_name = %handle.stream_name,
                    failed_step = %kind,
                    completed = completed_steps.len(),
                    "Session teardown stopped part way"
                );
                return Err(ScError::TeardownFailure(TeardownFailure {
                    failed_step: kind,
                    completed_steps,
                    reason: e.to_string(),
                }));
            }

            debug!(target: "sc.services.coordinator", kind = %kind, id = %id, status = %status, "Resource ended");
            completed_steps.push(kind);
        }

        lifecycle.advance(SessionState::Ended)?;
        record_session_operation("end", "success");
        info!(target: "sc.services.coordinator", stream_name = %handle.stream_name, "Session ended");

        Ok(format!("Successfully ended stream {}", handle.stream_name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;
    use crate::repositories::InMemoryViewerCounter;
    use crate::services::platform::mock::{MockOperation, MockProvisioner, ProvisionerCall};

    fn coordinator(
        provisioner: Arc<MockProvisioner>,
        counter: Arc<InMemoryViewerCounter>,
    ) -> SessionCoordinator {
        SessionCoordinator::new(provisioner, counter, Duration::from_secs(1))
    }

    fn demo_handle() -> SessionHandle {
        SessionHandle {
            room_id: "R1".to_string(),
            stream_name: "demo-room".to_string(),
            publisher_endpoint_id: "P1".to_string(),
            processor_id: "M1".to_string(),
        }
    }

    fn update(kind: ResourceKind, id: &str, status: ResourceStatus) -> ProvisionerCall {
        ProvisionerCall::UpdateStatus {
            kind,
            id: id.to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn test_demo_room_lifecycle() {
        let provisioner = Arc::new(MockProvisioner::new("R1", "P1", "M1"));
        let counter = Arc::new(InMemoryViewerCounter::new());
        let coordinator = coordinator(Arc::clone(&provisioner), Arc::clone(&counter));

        let handle = coordinator.start_session("demo-room").await.unwrap();
        assert_eq!(handle, demo_handle());
        assert_eq!(counter.read().await.unwrap(), Some(0));

        for _ in 0..3 {
            counter.increment().await.unwrap();
        }
        assert_eq!(counter.read().await.unwrap(), Some(3));

        let message = coordinator.end_session(&handle).await.unwrap();
        assert!(message.contains("demo-room"));
        assert_eq!(message, "Successfully ended stream demo-room");

        let calls = provisioner.calls().await;
        assert_eq!(
            calls,
            vec![
                ProvisionerCall::Create(CreateResource::Room {
                    unique_name: "demo-room".to_string()
                }),
                ProvisionerCall::Create(CreateResource::PublisherEndpoint),
                ProvisionerCall::Create(CreateResource::Processor(ProcessorBinding {
                    room_id: "R1".to_string(),
                    publisher_endpoint_id: "P1".to_string(),
                })),
                update(ResourceKind::Processor, "M1", ResourceStatus::Ended),
                update(ResourceKind::PublisherEndpoint, "P1", ResourceStatus::Ended),
                update(ResourceKind::Room, "R1", ResourceStatus::Completed),
            ]
        );

        // Ending leaves the count alone
        assert_eq!(counter.read().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_start_resets_existing_count() {
        let provisioner = Arc::new(MockProvisioner::new("R1", "P1", "M1"));
        let counter = Arc::new(InMemoryViewerCounter::new());
        counter.reset().await.unwrap();
        counter.increment().await.unwrap();
        counter.increment().await.unwrap();

        coordinator(provisioner, Arc::clone(&counter))
            .start_session("second")
            .await
            .unwrap();

        assert_eq!(counter.read().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_empty_stream_name_is_rejected_without_platform_calls() {
        let provisioner = Arc::new(MockProvisioner::new("R1", "P1", "M1"));
        let counter = Arc::new(InMemoryViewerCounter::new());
        let coordinator = coordinator(Arc::clone(&provisioner), Arc::clone(&counter));

        let result = coordinator.start_session("  ").await;

        assert!(matches!(result, Err(ScError::BadRequest(_))));
        assert!(provisioner.calls().await.is_empty());
        assert_eq!(counter.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_processor_failure_reports_created_resources() {
        let provisioner = Arc::new(
            MockProvisioner::new("R1", "P1", "M1")
                .failing_on(MockOperation::Create(ResourceKind::Processor)),
        );
        let counter = Arc::new(InMemoryViewerCounter::new());
        let coordinator = coordinator(Arc::clone(&provisioner), Arc::clone(&counter));

        let error = coordinator.start_session("demo-room").await.unwrap_err();

        match error {
            ScError::ProvisionFailure(failure) => {
                assert_eq!(failure.failed_step, ProvisionStep::Processor);
                assert_eq!(
                    failure.created,
                    vec![
                        CreatedResource {
                            kind: ResourceKind::Room,
                            id: "R1".to_string()
                        },
                        CreatedResource {
                            kind: ResourceKind::PublisherEndpoint,
                            id: "P1".to_string()
                        },
                    ]
                );
            }
            other => panic!("expected ProvisionFailure, got {other:?}"),
        }

        // No rollback and no counter reset
        assert_eq!(provisioner.calls().await.len(), 3);
        assert_eq!(counter.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_room_failure_stops_before_endpoint() {
        let provisioner = Arc::new(
            MockProvisioner::new("R1", "P1", "M1")
                .failing_on(MockOperation::Create(ResourceKind::Room)),
        );
        let counter = Arc::new(InMemoryViewerCounter::new());

        let error = coordinator(Arc::clone(&provisioner), counter)
            .start_session("demo-room")
            .await
            .unwrap_err();

        match error {
            ScError::ProvisionFailure(failure) => {
                assert_eq!(failure.failed_step, ProvisionStep::Room);
                assert!(failure.created.is_empty());
            }
            other => panic!("expected ProvisionFailure, got {other:?}"),
        }
        assert_eq!(provisioner.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_counter_outage_fails_start_after_resources_exist() {
        let provisioner = Arc::new(MockProvisioner::new("R1", "P1", "M1"));
        let counter = Arc::new(InMemoryViewerCounter::new());
        counter.set_available(false);

        let error = coordinator(provisioner, counter)
            .start_session("demo-room")
            .await
            .unwrap_err();

        match error {
            ScError::ProvisionFailure(failure) => {
                assert_eq!(failure.failed_step, ProvisionStep::CounterReset);
                assert_eq!(failure.created.len(), 3);
            }
            other => panic!("expected ProvisionFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_platform_times_out_as_provision_failure() {
        let provisioner = Arc::new(
            MockProvisioner::new("R1", "P1", "M1").with_delay(Duration::from_millis(200)),
        );
        let counter = Arc::new(InMemoryViewerCounter::new());
        let coordinator =
            SessionCoordinator::new(provisioner, counter, Duration::from_millis(20));

        let error = coordinator.start_session("demo-room").await.unwrap_err();

        match error {
            ScError::ProvisionFailure(failure) => {
                assert_eq!(failure.failed_step, ProvisionStep::Room);
                assert_eq!(failure.reason, PlatformError::Timeout.to_string());
            }
            other => panic!("expected ProvisionFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_incomplete_handle_makes_no_platform_calls() {
        let provisioner = Arc::new(MockProvisioner::new("R1", "P1", "M1"));
        let counter = Arc::new(InMemoryViewerCounter::new());
        let coordinator = coordinator(Arc::clone(&provisioner), counter);

        let mut handle = demo_handle();
        handle.processor_id = String::new();

        let error = coordinator.end_session(&handle).await.unwrap_err();

        match error {
            ScError::BadRequest(message) => assert!(message.contains("mediaProcessorId")),
            other => panic!("expected BadRequest, got {other:?}"),
        }
        assert!(provisioner.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_teardown_failure_is_partial() {
        let provisioner = Arc::new(
            MockProvisioner::new("R1", "P1", "M1")
                .failing_on(MockOperation::UpdateStatus(ResourceKind::PublisherEndpoint)),
        );
        let counter = Arc::new(InMemoryViewerCounter::new());
        let coordinator = coordinator(Arc::clone(&provisioner), counter);

        let error = coordinator.end_session(&demo_handle()).await.unwrap_err();

        match error {
            ScError::TeardownFailure(failure) => {
                assert_eq!(failure.failed_step, ResourceKind::PublisherEndpoint);
                assert_eq!(failure.completed_steps, vec![ResourceKind::Processor]);
            }
            other => panic!("expected TeardownFailure, got {other:?}"),
        }

        // Room is never attempted
        assert_eq!(
            provisioner.calls().await,
            vec![
                update(ResourceKind::Processor, "M1", ResourceStatus::Ended),
                update(ResourceKind::PublisherEndpoint, "P1", ResourceStatus::Ended),
            ]
        );
    }

    #[tokio::test]
    async fn test_room_teardown_failure_lists_both_producers() {
        let provisioner = Arc::new(
            MockProvisioner::new("R1", "P1", "M1")
                .failing_on(MockOperation::UpdateStatus(ResourceKind::Room)),
        );
        let counter = Arc::new(InMemoryViewerCounter::new());

        let error = coordinator(provisioner, counter)
            .end_session(&demo_handle())
            .await
            .unwrap_err();

        match error {
            ScError::TeardownFailure(failure) => {
                assert_eq!(failure.failed_step, ResourceKind::Room);
                assert_eq!(
                    failure.completed_steps,
                    vec![ResourceKind::Processor, ResourceKind::PublisherEndpoint]
                );
            }
            other => panic!("expected TeardownFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_lifecycle_rejects_skipped_state() {
        let mut lifecycle = Lifecycle::new("demo-room", SessionState::NotStarted);
        assert!(matches!(
            lifecycle.advance(SessionState::Active),
            Err(ScError::Internal)
        ));
        assert_eq!(lifecycle.state, SessionState::NotStarted);
    }
}
