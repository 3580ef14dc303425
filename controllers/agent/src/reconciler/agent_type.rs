//! AgentType reconciler

use super::{condition_reasons, ReconcileOutcome, Reconciler, CONDITION_CREATED, CONDITION_READY};
use crate::error::ControllerError;
use crate::events::{actions, reasons, AgentEvent};
use crate::pod::{assemble_pod, pod_name};
use crate::wait::delete_and_wait;
use crds::{AgentPhase, AgentType, AgentTypeStatus};
use k8s_openapi::api::core::v1::{ObjectReference, Pod};
use kube::Resource;
use tracing::{debug, error, info, warn};

/// A failed reconciliation step with the reasons it is reported under
struct StepFailure {
    condition_reason: &'static str,
    event_reason: &'static str,
    error: ControllerError,
}

impl StepFailure {
    fn invalid(error: ControllerError) -> Self {
        Self {
            condition_reason: condition_reasons::INVALID_CONFIGURATION,
            event_reason: reasons::VALIDATION_FAILED,
            error,
        }
    }

    fn replace(error: ControllerError) -> Self {
        let (condition_reason, event_reason) = match &error {
            ControllerError::DeleteTimeout { .. } => {
                (condition_reasons::POD_DELETE_TIMEOUT, reasons::POD_DELETE_TIMEOUT)
            }
            _ => (condition_reasons::POD_DELETE_FAILED, reasons::POD_DELETE_FAILED),
        };
        Self {
            condition_reason,
            event_reason,
            error,
        }
    }

    fn create(error: ControllerError) -> Self {
        Self {
            condition_reason: condition_reasons::POD_CREATE_FAILED,
            event_reason: reasons::POD_CREATE_FAILED,
            error,
        }
    }
}

impl Reconciler {
    /// Reconcile one AgentType into its Pod.
    ///
    /// Any existing `<name>-pod` is deleted and waited for, then a Pod is
    /// built from the current spec and created. A generation that already
    /// reached `Succeeded` or a permanent `Failed` is not reconciled again;
    /// for `Succeeded` only the `Ready` condition is brought up to date.
    pub async fn reconcile_agent_type(
        &self,
        agent: &AgentType,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let name = agent
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ControllerError::InvalidConfig("AgentType missing name".to_string()))?;
        let namespace = agent.metadata.namespace.as_deref().unwrap_or("default");
        let resource_key = format!("{}/{}", namespace, name);
        let generation = agent.metadata.generation;

        if let Some(status) = &agent.status {
            let settled = matches!(status.phase, AgentPhase::Succeeded | AgentPhase::Failed);
            if settled && status.observed_generation.is_some() && status.observed_generation == generation {
                debug!(
                    "AgentType {} generation {:?} already reconciled ({}), skipping",
                    resource_key,
                    generation,
                    status.phase.as_str()
                );
                if status.phase == AgentPhase::Succeeded {
                    self.refresh_ready(namespace, name, status).await;
                }
                return Ok(ReconcileOutcome::UpToDate);
            }
        }

        if let Some(remaining) = self.pending_retry(&resource_key, generation) {
            debug!("AgentType {} backing off, next attempt in {:?}", resource_key, remaining);
            return Ok(ReconcileOutcome::Deferred(remaining));
        }

        info!("Reconciling AgentType {}", resource_key);
        self.patch_agent_status(namespace, name, &Self::reconciling_status_patch())
            .await;

        let object_ref = agent.object_ref(&());
        match self.converge_pod(agent, namespace, name, &object_ref).await {
            Ok(pod) => {
                let pod_name = pod.metadata.name.clone().unwrap_or_else(|| pod_name(name));
                let pod_uid = pod.metadata.uid.clone();
                let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
                let previous = agent.status.as_ref();

                let ready = Self::ready_condition(phase, previous);
                let conditions = vec![
                    Self::condition(
                        CONDITION_CREATED,
                        true,
                        condition_reasons::POD_CREATED,
                        format!("Created Pod {}", pod_name),
                        previous,
                    ),
                    ready,
                ];

                let patch = Self::succeeded_status_patch(
                    &pod_name,
                    namespace,
                    pod_uid.as_deref(),
                    &conditions,
                    generation,
                );
                self.patch_agent_status(namespace, name, &patch).await;
                self.events
                    .publish(
                        &object_ref,
                        AgentEvent::normal(
                            reasons::POD_CREATED,
                            actions::CREATE_POD,
                            format!("Created Pod {}/{}", namespace, pod_name),
                        ),
                    )
                    .await;
                self.reset_error(&resource_key);

                info!("AgentType {} reconciled: Pod {} created", resource_key, pod_name);
                Ok(ReconcileOutcome::Created { pod_name, pod_uid })
            }
            Err(failure) => {
                let permanent = failure.error.is_permanent();
                let message = failure.error.to_string();
                if let Some(invalid) = failure.error.configuration_error() {
                    warn!("AgentType {} is invalid ({}): {}", resource_key, invalid.kind, invalid.message);
                } else if permanent {
                    warn!("AgentType {} cannot be reconciled: {}", resource_key, message);
                } else {
                    error!("Failed to reconcile AgentType {}: {}", resource_key, message);
                }

                let previous = agent.status.as_ref();
                let conditions = vec![
                    Self::condition(
                        CONDITION_CREATED,
                        false,
                        failure.condition_reason,
                        message.clone(),
                        previous,
                    ),
                    Self::condition(
                        CONDITION_READY,
                        false,
                        failure.condition_reason,
                        "No Pod is running for this AgentType",
                        previous,
                    ),
                ];
                let observed = if permanent { generation } else { None };
                let patch = Self::failed_status_patch(&message, &conditions, observed);
                self.patch_agent_status(namespace, name, &patch).await;
                self.events
                    .publish(
                        &object_ref,
                        AgentEvent::warning(failure.event_reason, actions::RECONCILE, message),
                    )
                    .await;

                Err(ControllerError::reconcile(resource_key, failure.error))
            }
        }
    }

    /// Re-read the created Pod and patch `Ready` if its phase moved on.
    ///
    /// Never touches the Pod itself. Read errors other than NotFound leave the
    /// status as it is.
    async fn refresh_ready(&self, namespace: &str, name: &str, status: &AgentTypeStatus) {
        let pod_name = status.pod_name.clone().unwrap_or_else(|| pod_name(name));
        let phase = match self.client.read_pod(namespace, &pod_name).await {
            Ok(pod) => pod.status.and_then(|s| s.phase),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!("Failed to read Pod {}/{}: {}", namespace, pod_name, e);
                return;
            }
        };

        let ready = Self::ready_condition(phase.as_deref(), Some(status));
        let current = status.conditions.iter().find(|c| c.type_ == CONDITION_READY);
        if current.is_some_and(|c| c.status == ready.status && c.reason == ready.reason && c.message == ready.message) {
            return;
        }

        info!(
            "AgentType {}/{} Ready is now {} ({})",
            namespace, name, ready.status, ready.reason
        );
        let mut conditions = status.conditions.clone();
        match conditions.iter_mut().find(|c| c.type_ == CONDITION_READY) {
            Some(existing) => *existing = ready,
            None => conditions.push(ready),
        }
        self.patch_agent_status(namespace, name, &Self::conditions_status_patch(&conditions))
            .await;
    }

    /// Replace the AgentType's Pod: delete any existing one, build, create.
    async fn converge_pod(
        &self,
        agent: &AgentType,
        namespace: &str,
        name: &str,
        object_ref: &ObjectReference,
    ) -> Result<Pod, StepFailure> {
        let pod_name = pod_name(name);

        let replaced = delete_and_wait(self.client.as_ref(), namespace, &pod_name, self.delete_wait)
            .await
            .map_err(StepFailure::replace)?;
        if replaced {
            info!("Deleted existing Pod {}/{} before recreating", namespace, pod_name);
            self.events
                .publish(
                    object_ref,
                    AgentEvent::normal(
                        reasons::POD_REPLACED,
                        actions::DELETE_POD,
                        format!("Deleted Pod {}/{} to apply the current spec", namespace, pod_name),
                    ),
                )
                .await;
        }

        let owner_uid = agent.metadata.uid.as_deref().ok_or_else(|| {
            StepFailure::invalid(ControllerError::InvalidConfig(format!(
                "AgentType {}/{} has no uid",
                namespace, name
            )))
        })?;

        let pod = assemble_pod(
            name,
            namespace,
            owner_uid,
            &agent.spec.agent.image,
            agent.spec.agent_env(),
            agent.spec.sidecar.as_ref(),
        )
        .map_err(|e| StepFailure::invalid(e.into()))?;

        debug!("Creating Pod {}/{}", namespace, pod_name);
        self.client
            .create_pod(namespace, &pod)
            .await
            .map_err(|e| StepFailure::create(e.into()))
    }
}
