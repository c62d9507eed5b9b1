//! Deployment orchestrator.
//!
//! Drives one deployment attempt at a time through its lifecycle:
//! 1. Load the workflow and claim `(workflow, version)` with a pending record
//! 2. Mark the record and the workflow as deploying
//! 3. Hand the document to the engine (which validates before sending)
//! 4. Record the engine's answer, success or failure, on both
//!
//! Engine failures end up on the deployment row and in the returned
//! outcome. Only storage failures and precondition violations are errors.

use crate::error::DeploymentError;
use crate::record::{DeploymentRecord, DeploymentStatus, WorkflowRecord, WorkflowStatus};
use crate::store::{DeploymentStore, WorkflowStore};
use autoflow_core::{UserId, WorkflowId};
use autoflow_engine::{EngineError, ExecutionEngine};
use autoflow_workflow::ValidationResult;
use chrono::{Duration, Utc};
use rootcause::prelude::*;
use serde_json::Value as JsonValue;
use tracing::instrument;

/// Result of a deployment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentOutcome {
    /// The record in its terminal state.
    pub record: DeploymentRecord,
    /// Validation result, when the document got far enough to be validated.
    pub validation: Option<ValidationResult>,
    /// The engine failure, for failed attempts.
    pub engine_error: Option<EngineError>,
    /// True if this was the actor's first successful deployment.
    pub first_deployment: bool,
    /// Whether the engine workflow is active after the attempt.
    pub active: bool,
}

impl DeploymentOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.record.status == DeploymentStatus::Deployed
    }

    /// The message stored on the record: the failure of a failed attempt,
    /// or the activation failure of a deployment that was created inactive.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.record.error_message.as_deref()
    }

    /// Returns true if a new attempt could succeed without changes.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.engine_error.as_ref().is_some_and(EngineError::is_transient)
    }
}

/// Coordinates deployments between storage and the execution engine.
pub struct Orchestrator<E, W, D> {
    pub(crate) engine: E,
    pub(crate) workflows: W,
    pub(crate) deployments: D,
}

impl<E, W, D> Orchestrator<E, W, D>
where
    E: ExecutionEngine,
    W: WorkflowStore,
    D: DeploymentStore,
{
    pub fn new(engine: E, workflows: W, deployments: D) -> Self {
        Self {
            engine,
            workflows,
            deployments,
        }
    }

    pub(crate) async fn load(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<WorkflowRecord, Report<DeploymentError>> {
        self.workflows
            .get(workflow_id)
            .await
            .context(DeploymentError::Persistence)?
            .ok_or_else(|| DeploymentError::WorkflowNotFound { id: workflow_id }.into())
    }

    /// Writes `record` over the stored row, which must still be `expected`.
    async fn save(
        &self,
        record: &DeploymentRecord,
        expected: DeploymentStatus,
    ) -> Result<(), Report<DeploymentError>> {
        let updated = self
            .deployments
            .update(record, expected)
            .await
            .context(DeploymentError::Persistence)?;
        if !updated {
            tracing::warn!(
                version = record.version,
                expected = %expected,
                "deployment record changed underneath this operation"
            );
            return Err(DeploymentError::ConcurrentUpdate {
                workflow_id: record.workflow_id,
                version: record.version,
            }
            .into());
        }
        Ok(())
    }

    async fn set_status(
        &self,
        workflow_id: WorkflowId,
        status: WorkflowStatus,
    ) -> Result<(), Report<DeploymentError>> {
        self.workflows
            .set_deployment_status(workflow_id, status)
            .await
            .context(DeploymentError::Persistence)?;
        Ok(())
    }

    /// Deploys the workflow's current version.
    ///
    /// # Errors
    ///
    /// - `WorkflowNotFound` if the workflow does not exist
    /// - `DuplicateVersion` if this version already has a record, in flight
    ///   or finished; nothing is written in that case
    /// - `ConcurrentUpdate` if the record left `deploying` while the engine
    ///   call ran, which the stuck-deployment sweep does
    /// - `Persistence` if storage fails
    #[instrument(skip(self), fields(workflow_id = %workflow_id, actor_id = %actor_id))]
    pub async fn deploy(
        &self,
        workflow_id: WorkflowId,
        activate: bool,
        actor_id: UserId,
    ) -> Result<DeploymentOutcome, Report<DeploymentError>> {
        let workflow = self.load(workflow_id).await?;
        let version = workflow.version;

        let mut record = DeploymentRecord::pending(workflow_id, version, actor_id);
        let claimed = self
            .deployments
            .insert(&record)
            .await
            .context(DeploymentError::Persistence)?;
        if !claimed {
            tracing::info!(version, "version already has a deployment");
            return Err(DeploymentError::DuplicateVersion {
                workflow_id,
                version,
            }
            .into());
        }

        record.begin()?;
        self.save(&record, DeploymentStatus::Pending).await?;
        self.set_status(workflow_id, WorkflowStatus::Deploying).await?;

        match self.engine.deploy(&workflow.document, activate).await {
            Ok(deployed) => {
                let now = Utc::now();
                record.succeed(&deployed.engine_workflow_id, deployed.response, now)?;
                if let Some(reason) = &deployed.activation_error {
                    record.error_message = Some(format!("deployed but not activated: {reason}"));
                }
                self.save(&record, DeploymentStatus::Deploying).await?;
                self.workflows
                    .set_engine_workflow_id(workflow_id, Some(&deployed.engine_workflow_id))
                    .await
                    .context(DeploymentError::Persistence)?;
                self.set_status(workflow_id, WorkflowStatus::Deployed).await?;

                if let Some(replaced) = workflow
                    .engine_workflow_id
                    .as_deref()
                    .filter(|id| *id != deployed.engine_workflow_id)
                {
                    self.retire(replaced).await;
                }

                let first_deployment = self
                    .deployments
                    .record_first_deployment(actor_id, workflow_id, now)
                    .await
                    .context(DeploymentError::Persistence)?;

                tracing::info!(
                    version,
                    engine_workflow_id = %deployed.engine_workflow_id,
                    duration_ms = record.duration_ms,
                    active = deployed.active,
                    "workflow deployed"
                );

                Ok(DeploymentOutcome {
                    record,
                    validation: Some(deployed.validation),
                    engine_error: None,
                    first_deployment,
                    active: deployed.active,
                })
            }
            Err(error) => {
                record.fail(error.deployment_message(), Utc::now())?;
                self.save(&record, DeploymentStatus::Deploying).await?;
                self.set_status(workflow_id, WorkflowStatus::Failed).await?;

                tracing::warn!(version, error = %error, "deployment failed");

                Ok(DeploymentOutcome {
                    record,
                    validation: error.validation().cloned(),
                    engine_error: Some(error),
                    first_deployment: false,
                    active: false,
                })
            }
        }
    }

    /// Deactivates the engine workflow a redeploy replaced.
    ///
    /// A failure leaves it running; the replaced version's record still
    /// names it, so rolling that version back deactivates it later.
    async fn retire(&self, engine_workflow_id: &str) {
        match self.engine.deactivate(engine_workflow_id).await {
            Ok(_) => tracing::info!(engine_workflow_id, "deactivated replaced engine workflow"),
            Err(e) => tracing::warn!(
                engine_workflow_id,
                error = %e,
                "failed to deactivate replaced engine workflow"
            ),
        }
    }

    /// Lists the workflow's deployments, newest version first.
    pub async fn history(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<DeploymentRecord>, Report<DeploymentError>> {
        self.load(workflow_id).await?;
        let records = self
            .deployments
            .list_for_workflow(workflow_id)
            .await
            .context(DeploymentError::Persistence)?;
        Ok(records)
    }

    /// Rolls back a deployed version: deactivates it on the engine and marks
    /// the record `rolled_back`.
    ///
    /// The workflow's own status follows only when the rolled back version
    /// is the one currently live.
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    pub async fn rollback(
        &self,
        workflow_id: WorkflowId,
        version: u32,
    ) -> Result<DeploymentRecord, Report<DeploymentError>> {
        let mut record = self
            .deployments
            .find(workflow_id, version)
            .await
            .context(DeploymentError::Persistence)?
            .ok_or(DeploymentError::DeploymentNotFound {
                workflow_id,
                version,
            })?;

        if record.status != DeploymentStatus::Deployed {
            return Err(DeploymentError::InvalidStateTransition {
                from: record.status,
                to: DeploymentStatus::RolledBack,
            }
            .into());
        }

        let engine_workflow_id = record
            .engine_workflow_id
            .clone()
            .ok_or(DeploymentError::NotDeployed { id: workflow_id })?;
        self.engine
            .deactivate(&engine_workflow_id)
            .await
            .map_err(DeploymentError::Engine)?;

        record.roll_back()?;
        self.save(&record, DeploymentStatus::Deployed).await?;

        let workflow = self.load(workflow_id).await?;
        if workflow.engine_workflow_id.as_deref() == Some(engine_workflow_id.as_str()) {
            self.set_status(workflow_id, WorkflowStatus::RolledBack).await?;
        }

        tracing::info!(version, engine_workflow_id = %engine_workflow_id, "deployment rolled back");
        Ok(record)
    }

    /// Fails deployments stuck in `deploying` for longer than `max_age`.
    ///
    /// Returns the number of records failed.
    #[instrument(skip(self))]
    pub async fn fail_stuck_deployments(
        &self,
        max_age: Duration,
    ) -> Result<usize, Report<DeploymentError>> {
        let now = Utc::now();
        let stuck = self
            .deployments
            .list_stuck(now - max_age)
            .await
            .context(DeploymentError::Persistence)?;

        let mut count = 0;
        for mut record in stuck {
            record.fail(
                format!(
                    "deployment abandoned: still deploying after {}s",
                    max_age.num_seconds()
                ),
                now,
            )?;
            let reaped = self
                .deployments
                .update(&record, DeploymentStatus::Deploying)
                .await
                .context(DeploymentError::Persistence)?;
            if !reaped {
                tracing::debug!(
                    workflow_id = %record.workflow_id,
                    version = record.version,
                    "deployment finished before it could be reaped"
                );
                continue;
            }
            count += 1;

            if self.is_latest_attempt(&record).await? {
                self.set_status(record.workflow_id, WorkflowStatus::Failed)
                    .await?;
            }
            tracing::warn!(
                workflow_id = %record.workflow_id,
                version = record.version,
                "failed stuck deployment"
            );
        }

        Ok(count)
    }

    /// True when the workflow still shows `deploying` and no later version
    /// has a deployment record, so the workflow status belongs to `record`.
    async fn is_latest_attempt(
        &self,
        record: &DeploymentRecord,
    ) -> Result<bool, Report<DeploymentError>> {
        let workflow = self
            .workflows
            .get(record.workflow_id)
            .await
            .context(DeploymentError::Persistence)?;
        if workflow.is_none_or(|w| w.deployment_status != WorkflowStatus::Deploying) {
            return Ok(false);
        }

        let records = self
            .deployments
            .list_for_workflow(record.workflow_id)
            .await
            .context(DeploymentError::Persistence)?;
        Ok(records.iter().all(|r| r.version <= record.version))
    }

    async fn engine_id(&self, workflow_id: WorkflowId) -> Result<String, Report<DeploymentError>> {
        let workflow = self.load(workflow_id).await?;
        workflow
            .engine_workflow_id
            .ok_or_else(|| DeploymentError::NotDeployed { id: workflow_id }.into())
    }

    /// Activates the workflow's engine counterpart.
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    pub async fn activate(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<JsonValue, Report<DeploymentError>> {
        let engine_workflow_id = self.engine_id(workflow_id).await?;
        Ok(self
            .engine
            .activate(&engine_workflow_id)
            .await
            .map_err(DeploymentError::Engine)?)
    }

    /// Deactivates the workflow's engine counterpart.
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    pub async fn deactivate(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<JsonValue, Report<DeploymentError>> {
        let engine_workflow_id = self.engine_id(workflow_id).await?;
        Ok(self
            .engine
            .deactivate(&engine_workflow_id)
            .await
            .map_err(DeploymentError::Engine)?)
    }

    /// Deletes the workflow from the engine and returns it to draft.
    ///
    /// Deployment records are kept as history.
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    pub async fn undeploy(&self, workflow_id: WorkflowId) -> Result<(), Report<DeploymentError>> {
        let engine_workflow_id = self.engine_id(workflow_id).await?;
        self.engine
            .delete(&engine_workflow_id)
            .await
            .map_err(DeploymentError::Engine)?;

        self.workflows
            .set_engine_workflow_id(workflow_id, None)
            .await
            .context(DeploymentError::Persistence)?;
        self.set_status(workflow_id, WorkflowStatus::Draft).await?;

        tracing::info!(engine_workflow_id = %engine_workflow_id, "workflow removed from engine");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEngine, InMemoryStore, deployable_document};
    use autoflow_engine::DeployedWorkflow;
    use serde_json::json;

    fn orchestrator(
        engine: &FakeEngine,
        store: &InMemoryStore,
    ) -> Orchestrator<FakeEngine, InMemoryStore, InMemoryStore> {
        Orchestrator::new(engine.clone(), store.clone(), store.clone())
    }

    #[tokio::test]
    async fn successful_deploy_updates_record_and_workflow() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let actor = UserId::new();
        let workflow_id = store.add_workflow(deployable_document());

        let outcome = orchestrator(&engine, &store)
            .deploy(workflow_id, true, actor)
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(outcome.first_deployment);
        assert!(outcome.validation.as_ref().unwrap().valid);
        assert_eq!(outcome.record.version, 1);
        assert_eq!(outcome.record.engine_workflow_id.as_deref(), Some("eng-1"));
        assert!(outcome.record.completed_at.is_some());
        assert!(outcome.record.duration_ms.is_some());

        let workflow = store.workflow(workflow_id);
        assert_eq!(workflow.deployment_status, WorkflowStatus::Deployed);
        assert_eq!(workflow.engine_workflow_id.as_deref(), Some("eng-1"));

        let stored = store.deployments();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, DeploymentStatus::Deployed);
    }

    #[tokio::test]
    async fn second_success_is_not_first_deployment() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let actor = UserId::new();
        let first = store.add_workflow(deployable_document());
        let second = store.add_workflow(deployable_document());
        let orchestrator = orchestrator(&engine, &store);

        assert!(orchestrator.deploy(first, false, actor).await.unwrap().first_deployment);
        assert!(!orchestrator.deploy(second, false, actor).await.unwrap().first_deployment);
    }

    #[tokio::test]
    async fn engine_failure_is_recorded_verbatim() {
        let engine = FakeEngine::new();
        engine.push_deploy_result(Err(EngineError::Http {
            status: 400,
            message: "request/body/nodes must be array".to_string(),
        }));
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());

        let outcome = orchestrator(&engine, &store)
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert!(!outcome.is_retryable());
        assert_eq!(
            outcome.error_message(),
            Some("request/body/nodes must be array")
        );
        assert!(outcome.validation.is_none());
        assert_eq!(outcome.record.status, DeploymentStatus::Failed);
        assert_eq!(
            store.workflow(workflow_id).deployment_status,
            WorkflowStatus::Failed
        );
    }

    #[tokio::test]
    async fn empty_engine_message_uses_status_code() {
        let engine = FakeEngine::new();
        engine.push_deploy_result(Err(EngineError::Http {
            status: 503,
            message: String::new(),
        }));
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());

        let outcome = orchestrator(&engine, &store)
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap();
        assert_eq!(outcome.error_message(), Some("deployment failed (HTTP 503)"));
        assert!(outcome.is_retryable());
    }

    #[tokio::test]
    async fn validation_failure_carries_result() {
        let engine = FakeEngine::new();
        let validation = ValidationResult {
            valid: false,
            errors: vec!["Workflow must contain at least one node".to_string()],
            ..Default::default()
        };
        engine.push_deploy_result(Err(EngineError::ValidationFailed {
            validation: validation.clone(),
        }));
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());

        let outcome = orchestrator(&engine, &store)
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap();
        assert_eq!(outcome.error_message(), Some("Workflow validation failed"));
        assert_eq!(outcome.validation, Some(validation));
    }

    #[tokio::test]
    async fn duplicate_version_is_rejected_without_writes() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let orchestrator = orchestrator(&engine, &store);

        orchestrator
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap();
        let err = orchestrator
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.current_context(),
            &DeploymentError::DuplicateVersion {
                workflow_id,
                version: 1
            }
        );
        assert_eq!(store.deployments().len(), 1);
        assert_eq!(engine.deploy_calls(), 1);
    }

    #[tokio::test]
    async fn in_flight_version_is_rejected() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let mut in_flight = DeploymentRecord::pending(workflow_id, 1, UserId::new());
        in_flight.begin().unwrap();
        store.insert_deployment(in_flight);

        let err = orchestrator(&engine, &store)
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            DeploymentError::DuplicateVersion { .. }
        ));
        assert_eq!(engine.deploy_calls(), 0);
    }

    #[tokio::test]
    async fn history_lists_newest_first() {
        let engine = FakeEngine::new();
        engine.push_deploy_result(Err(EngineError::Timeout));
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let orchestrator = orchestrator(&engine, &store);

        orchestrator
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap();
        store.bump_version(workflow_id).await.unwrap();
        orchestrator
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap();

        let history: Vec<_> = orchestrator
            .history(workflow_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.version, r.status))
            .collect();
        assert_eq!(
            history,
            [(2, DeploymentStatus::Deployed), (1, DeploymentStatus::Failed)]
        );
    }

    #[tokio::test]
    async fn missing_workflow_is_not_found() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let id = WorkflowId::new();

        let err = orchestrator(&engine, &store)
            .deploy(id, false, UserId::new())
            .await
            .unwrap_err();
        assert_eq!(err.current_context(), &DeploymentError::WorkflowNotFound { id });
    }

    #[tokio::test]
    async fn rollback_deactivates_deployed_version() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let orchestrator = orchestrator(&engine, &store);
        orchestrator
            .deploy(workflow_id, true, UserId::new())
            .await
            .unwrap();

        let record = orchestrator.rollback(workflow_id, 1).await.unwrap();

        assert_eq!(record.status, DeploymentStatus::RolledBack);
        assert_eq!(engine.calls(), ["deploy", "deactivate:eng-1"]);
        assert_eq!(
            store.workflow(workflow_id).deployment_status,
            WorkflowStatus::RolledBack
        );
    }

    #[tokio::test]
    async fn rollback_of_failed_deployment_is_rejected() {
        let engine = FakeEngine::new();
        engine.push_deploy_result(Err(EngineError::Timeout));
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let orchestrator = orchestrator(&engine, &store);
        orchestrator
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap();

        let err = orchestrator.rollback(workflow_id, 1).await.unwrap_err();
        assert_eq!(
            err.current_context(),
            &DeploymentError::InvalidStateTransition {
                from: DeploymentStatus::Failed,
                to: DeploymentStatus::RolledBack
            }
        );
        assert_eq!(engine.calls(), ["deploy"]);
    }

    #[tokio::test]
    async fn rollback_keeps_record_when_engine_refuses() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let orchestrator = orchestrator(&engine, &store);
        orchestrator
            .deploy(workflow_id, true, UserId::new())
            .await
            .unwrap();
        engine.fail_next_call(EngineError::Connection {
            reason: "refused".to_string(),
        });

        let err = orchestrator.rollback(workflow_id, 1).await.unwrap_err();
        assert!(matches!(err.current_context(), DeploymentError::Engine(_)));
        assert_eq!(store.deployments()[0].status, DeploymentStatus::Deployed);
    }

    #[tokio::test]
    async fn stuck_deployments_are_failed() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let mut stuck = DeploymentRecord::pending(workflow_id, 1, UserId::new());
        stuck.started_at = Utc::now() - Duration::minutes(30);
        stuck.begin().unwrap();
        store.insert_deployment(stuck);

        let mut fresh = DeploymentRecord::pending(workflow_id, 2, UserId::new());
        fresh.begin().unwrap();
        store.insert_deployment(fresh);

        let failed = orchestrator(&engine, &store)
            .fail_stuck_deployments(Duration::minutes(10))
            .await
            .unwrap();

        assert_eq!(failed, 1);
        let records = store.deployments();
        let reaped = records.iter().find(|r| r.version == 1).unwrap();
        assert_eq!(reaped.status, DeploymentStatus::Failed);
        assert!(reaped.error_message.as_deref().unwrap().contains("abandoned"));
        let untouched = records.iter().find(|r| r.version == 2).unwrap();
        assert_eq!(untouched.status, DeploymentStatus::Deploying);
    }

    #[tokio::test]
    async fn stuck_older_version_leaves_newer_deployment_alone() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let mut stuck = DeploymentRecord::pending(workflow_id, 1, UserId::new());
        stuck.started_at = Utc::now() - Duration::minutes(30);
        stuck.begin().unwrap();
        store.insert_deployment(stuck);
        store.bump_version(workflow_id).await.unwrap();
        let orchestrator = orchestrator(&engine, &store);
        orchestrator
            .deploy(workflow_id, true, UserId::new())
            .await
            .unwrap();

        let failed = orchestrator
            .fail_stuck_deployments(Duration::minutes(10))
            .await
            .unwrap();

        assert_eq!(failed, 1);
        let workflow = store.workflow(workflow_id);
        assert_eq!(workflow.deployment_status, WorkflowStatus::Deployed);
        assert_eq!(workflow.engine_workflow_id.as_deref(), Some("eng-1"));
        let records = store.deployments();
        let reaped = records.iter().find(|r| r.version == 1).unwrap();
        assert_eq!(reaped.status, DeploymentStatus::Failed);
    }

    #[tokio::test]
    async fn stuck_latest_attempt_fails_the_workflow() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        store
            .set_deployment_status(workflow_id, WorkflowStatus::Deploying)
            .await
            .unwrap();
        let mut stuck = DeploymentRecord::pending(workflow_id, 1, UserId::new());
        stuck.started_at = Utc::now() - Duration::minutes(30);
        stuck.begin().unwrap();
        store.insert_deployment(stuck);

        orchestrator(&engine, &store)
            .fail_stuck_deployments(Duration::minutes(10))
            .await
            .unwrap();

        assert_eq!(
            store.workflow(workflow_id).deployment_status,
            WorkflowStatus::Failed
        );
    }

    #[tokio::test]
    async fn deploy_finishing_after_sweep_is_a_concurrent_update() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let sweeper = store.clone();
        engine.before_deploy(move || sweeper.fail_in_flight("deployment abandoned"));

        let err = orchestrator(&engine, &store)
            .deploy(workflow_id, true, UserId::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.current_context(),
            &DeploymentError::ConcurrentUpdate {
                workflow_id,
                version: 1
            }
        );
        let records = store.deployments();
        assert_eq!(records[0].status, DeploymentStatus::Failed);
        assert_eq!(records[0].error_message.as_deref(), Some("deployment abandoned"));
        assert!(store.workflow(workflow_id).engine_workflow_id.is_none());
    }

    #[tokio::test]
    async fn redeploy_deactivates_replaced_engine_workflow() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let orchestrator = orchestrator(&engine, &store);
        orchestrator
            .deploy(workflow_id, true, UserId::new())
            .await
            .unwrap();
        store.bump_version(workflow_id).await.unwrap();

        let outcome = orchestrator
            .deploy(workflow_id, true, UserId::new())
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(engine.calls(), ["deploy", "deploy", "deactivate:eng-1"]);
        assert_eq!(
            store.workflow(workflow_id).engine_workflow_id.as_deref(),
            Some("eng-2")
        );
    }

    #[tokio::test]
    async fn redeploy_survives_failed_retirement() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let orchestrator = orchestrator(&engine, &store);
        orchestrator
            .deploy(workflow_id, true, UserId::new())
            .await
            .unwrap();
        store.bump_version(workflow_id).await.unwrap();
        engine.fail_next_call(EngineError::Timeout);

        let outcome = orchestrator
            .deploy(workflow_id, true, UserId::new())
            .await
            .unwrap();

        assert!(outcome.is_success());
        let records = store.deployments();
        let replaced = records.iter().find(|r| r.version == 1).unwrap();
        assert_eq!(replaced.engine_workflow_id.as_deref(), Some("eng-1"));
        assert_eq!(replaced.status, DeploymentStatus::Deployed);
    }

    #[tokio::test]
    async fn failed_activation_is_reported_on_success() {
        let engine = FakeEngine::new();
        engine.push_deploy_result(Ok(DeployedWorkflow {
            engine_workflow_id: "eng-7".to_string(),
            active: false,
            activation_error: Some("webhook path already in use".to_string()),
            response: json!({ "id": "eng-7", "active": false }),
            validation: ValidationResult {
                valid: true,
                ..Default::default()
            },
        }));
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());

        let outcome = orchestrator(&engine, &store)
            .deploy(workflow_id, true, UserId::new())
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(!outcome.active);
        assert_eq!(
            outcome.error_message(),
            Some("deployed but not activated: webhook path already in use")
        );
        assert_eq!(
            store.deployments()[0].error_message,
            outcome.record.error_message
        );
    }

    #[tokio::test]
    async fn pass_throughs_use_stored_engine_id() {
        let engine = FakeEngine::new();
        engine.push_deploy_result(Ok(DeployedWorkflow {
            engine_workflow_id: "eng-42".to_string(),
            active: false,
            activation_error: None,
            response: json!({ "id": "eng-42" }),
            validation: ValidationResult {
                valid: true,
                ..Default::default()
            },
        }));
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());
        let orchestrator = orchestrator(&engine, &store);
        orchestrator
            .deploy(workflow_id, false, UserId::new())
            .await
            .unwrap();

        orchestrator.activate(workflow_id).await.unwrap();
        orchestrator.deactivate(workflow_id).await.unwrap();
        orchestrator.undeploy(workflow_id).await.unwrap();

        assert_eq!(
            engine.calls(),
            [
                "deploy",
                "activate:eng-42",
                "deactivate:eng-42",
                "delete:eng-42"
            ]
        );
        let workflow = store.workflow(workflow_id);
        assert_eq!(workflow.deployment_status, WorkflowStatus::Draft);
        assert!(workflow.engine_workflow_id.is_none());
    }

    #[tokio::test]
    async fn pass_through_on_undeployed_workflow_fails() {
        let engine = FakeEngine::new();
        let store = InMemoryStore::new();
        let workflow_id = store.add_workflow(deployable_document());

        let err = orchestrator(&engine, &store)
            .activate(workflow_id)
            .await
            .unwrap_err();
        assert_eq!(
            err.current_context(),
            &DeploymentError::NotDeployed { id: workflow_id }
        );
        assert!(engine.calls().is_empty());
    }
}
