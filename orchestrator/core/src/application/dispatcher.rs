// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Service Dispatcher
//!
//! Hands finished service specifications to a pool of workers that perform
//! the remote "create service" call off the launch path.
//!
//! ```text
//! AgentLauncher ──dispatch()──▶ bounded queue ──▶ worker 0..N ──▶ ServiceOrchestrator
//!   (try_send, never blocks)     (in-flight keys)       │
//!                                                       └──▶ EventBus + listener
//! ```
//!
//! The caller only learns whether the job was accepted. Creation results are
//! logged, echoed to the launch listener and published on the event bus.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Fire-and-forget service creation with explicit backpressure

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::domain::events::LaunchEvent;
use crate::domain::launch::LaunchListener;
use crate::domain::service_spec::ServiceSpecification;
use crate::domain::swarm::{DispatchError, ServiceOrchestrator};
use crate::infrastructure::event_bus::EventBus;

/// Accepts finished specifications for out-of-band creation.
pub trait ServiceDispatcher: Send + Sync {
    /// Enqueue creation of `spec` under the unique launch `key`.
    ///
    /// Returns as soon as the job is queued; never waits for the swarm.
    fn dispatch(
        &self,
        key: String,
        spec: ServiceSpecification,
        listener: Arc<dyn LaunchListener>,
    ) -> Result<(), DispatchError>;
}

struct DispatchJob {
    key: String,
    spec: ServiceSpecification,
    listener: Arc<dyn LaunchListener>,
}

type InFlight = Arc<DashMap<String, DateTime<Utc>>>;

/// Queue handle shared by every launcher. Cloning is cheap.
#[derive(Clone)]
pub struct SwarmDispatcher {
    sender: mpsc::Sender<DispatchJob>,
    in_flight: InFlight,
}

/// Worker pool handle; see [`DispatchWorkers::join`].
pub struct DispatchWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl SwarmDispatcher {
    /// Spawn `workers` tasks draining a queue of `capacity` pending jobs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        orchestrator: Arc<dyn ServiceOrchestrator>,
        events: EventBus,
        workers: usize,
        capacity: usize,
    ) -> (Self, DispatchWorkers) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let in_flight: InFlight = Arc::new(DashMap::new());

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&orchestrator),
                    events.clone(),
                    Arc::clone(&in_flight),
                ))
            })
            .collect();

        info!(workers = workers.max(1), capacity = capacity.max(1), "Service dispatcher started");
        (Self { sender, in_flight }, DispatchWorkers { handles })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }
}

impl ServiceDispatcher for SwarmDispatcher {
    fn dispatch(
        &self,
        key: String,
        spec: ServiceSpecification,
        listener: Arc<dyn LaunchListener>,
    ) -> Result<(), DispatchError> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(_) => return Err(DispatchError::KeyInFlight(key)),
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
            }
        }

        let job = DispatchJob {
            key: key.clone(),
            spec,
            listener,
        };
        self.sender.try_send(job).map_err(|e| {
            self.in_flight.remove(&key);
            match e {
                mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull(key),
                mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
            }
        })
    }
}

impl DispatchWorkers {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit.
    ///
    /// Workers stop once the queue is drained and every [`SwarmDispatcher`]
    /// handle has been dropped.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Dispatch worker terminated abnormally");
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<DispatchJob>>>,
    orchestrator: Arc<dyn ServiceOrchestrator>,
    events: EventBus,
    in_flight: InFlight,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            debug!(worker_id, "Dispatch queue closed, worker exiting");
            break;
        };
        create_service(worker_id, job, orchestrator.as_ref(), &events, &in_flight).await;
    }
}

async fn create_service(
    worker_id: usize,
    job: DispatchJob,
    orchestrator: &dyn ServiceOrchestrator,
    events: &EventBus,
    in_flight: &InFlight,
) {
    let DispatchJob { key, spec, listener } = job;
    debug!(worker_id, agent = %key, "Creating service");

    let result = orchestrator.create_service(&spec).await;
    // Released before publishing so observers may launch the key again.
    in_flight.remove(&key);

    match result {
        Ok(service_id) => {
            info!(agent = %key, service_id = %service_id.as_str(), "Service created");
            metrics::counter!("swarm_provisioner_service_creates_total", "outcome" => "created").increment(1);
            listener.println(&format!("Created service {} for agent {}", service_id.as_str(), key));
            events.publish(LaunchEvent::ServiceCreated {
                agent: key,
                service_id: service_id.0,
                created_at: Utc::now(),
            });
        }
        Err(e) => {
            error!(agent = %key, error = %e, "Service creation failed");
            metrics::counter!("swarm_provisioner_service_creates_total", "outcome" => "failed").increment(1);
            listener.println(&format!("Failed to create service for agent {}: {}", key, e));
            events.publish(LaunchEvent::ServiceCreateFailed {
                agent: key,
                error: e.to_string(),
                failed_at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::launch::RecordingListener;
    use crate::domain::service_spec::{ServiceSkeleton, ServiceSpecBuilder};
    use crate::domain::swarm::{DirectoryError, ServiceId};
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    /// Blocks every creation until a permit is released; reports entry.
    struct GatedOrchestrator {
        gate: Semaphore,
        entered: mpsc::UnboundedSender<String>,
        fail: bool,
    }

    #[async_trait]
    impl ServiceOrchestrator for GatedOrchestrator {
        async fn create_service(&self, spec: &ServiceSpecification) -> Result<ServiceId, DirectoryError> {
            let _ = self.entered.send(spec.name.clone());
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            if self.fail {
                Err(DirectoryError::Api {
                    status: 409,
                    message: "name conflicts with an existing object".to_string(),
                })
            } else {
                Ok(ServiceId::new(format!("svc-{}", spec.name)))
            }
        }
    }

    fn spec(name: &str) -> ServiceSpecification {
        ServiceSpecBuilder::new(ServiceSkeleton {
            name: name.to_string(),
            image: "builder:1".to_string(),
            command: vec![],
            env: vec![],
            dir: None,
            user: None,
        })
        .build()
    }

    fn orchestrator(fail: bool) -> (Arc<GatedOrchestrator>, mpsc::UnboundedReceiver<String>) {
        let (entered, entered_rx) = mpsc::unbounded_channel();
        let orchestrator = Arc::new(GatedOrchestrator {
            gate: Semaphore::new(0),
            entered,
            fail,
        });
        (orchestrator, entered_rx)
    }

    #[tokio::test]
    async fn test_key_reuse_while_in_flight_is_rejected() {
        let (orchestrator, mut entered) = orchestrator(false);
        let events = EventBus::new(16);
        let mut receiver = events.subscribe();
        let (dispatcher, workers) = SwarmDispatcher::start(orchestrator.clone(), events, 1, 4);
        let listener = Arc::new(RecordingListener::new());

        dispatcher.dispatch("agent-1".to_string(), spec("agent-1"), listener.clone()).unwrap();
        let err = dispatcher
            .dispatch("agent-1".to_string(), spec("agent-1"), listener.clone())
            .unwrap_err();
        assert!(matches!(err, DispatchError::KeyInFlight(ref key) if key == "agent-1"));

        assert_eq!(entered.recv().await.as_deref(), Some("agent-1"));
        orchestrator.gate.add_permits(1);
        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, LaunchEvent::ServiceCreated { ref service_id, .. } if service_id == "svc-agent-1"));
        assert!(!dispatcher.is_in_flight("agent-1"));

        drop(dispatcher);
        workers.join().await;
        assert_eq!(listener.lines(), vec!["Created service svc-agent-1 for agent agent-1".to_string()]);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_and_releases_key() {
        let (orchestrator, mut entered) = orchestrator(false);
        let (dispatcher, workers) = SwarmDispatcher::start(orchestrator.clone(), EventBus::default(), 1, 1);
        let listener: Arc<dyn LaunchListener> = Arc::new(RecordingListener::new());

        dispatcher.dispatch("a".to_string(), spec("a"), listener.clone()).unwrap();
        // Worker holds "a"; the single queue slot takes "b".
        assert_eq!(entered.recv().await.as_deref(), Some("a"));
        dispatcher.dispatch("b".to_string(), spec("b"), listener.clone()).unwrap();

        let err = dispatcher.dispatch("c".to_string(), spec("c"), listener.clone()).unwrap_err();
        assert!(matches!(err, DispatchError::QueueFull(ref key) if key == "c"));
        assert!(!dispatcher.is_in_flight("c"));
        assert_eq!(dispatcher.in_flight(), 2);

        orchestrator.gate.add_permits(2);
        drop(dispatcher);
        workers.join().await;
    }

    #[tokio::test]
    async fn test_creation_failure_is_published_not_returned() {
        let (orchestrator, _entered) = orchestrator(true);
        orchestrator.gate.add_permits(1);
        let events = EventBus::new(16);
        let mut receiver = events.subscribe_agent("agent-9");
        let (dispatcher, workers) = SwarmDispatcher::start(orchestrator, events, 2, 8);
        let listener = Arc::new(RecordingListener::new());

        assert!(dispatcher.dispatch("agent-9".to_string(), spec("agent-9"), listener.clone()).is_ok());

        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, LaunchEvent::ServiceCreateFailed { ref error, .. } if error.contains("409")));
        drop(dispatcher);
        workers.join().await;
        assert_eq!(listener.lines().len(), 1);
    }

    #[tokio::test]
    async fn test_workers_exit_when_dispatchers_dropped() {
        let (orchestrator, _entered) = orchestrator(false);
        let (dispatcher, workers) = SwarmDispatcher::start(orchestrator, EventBus::default(), 3, 8);
        assert_eq!(workers.len(), 3);
        drop(dispatcher);
        tokio::time::timeout(std::time::Duration::from_secs(5), workers.join())
            .await
            .expect("workers did not stop");
    }
}
