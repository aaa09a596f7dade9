//! Orchestrator: owns the assistants and shared services, routes messages
//! and tasks, and runs the built-in scheduled jobs.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::CrystalConfig;
use crate::coordinator::HybridCoordinator;
use crate::error::{Error, Result};
use crate::files::FileOrganizer;
use crate::persona::{supports_task, Assistant, AssistantServices, PersonaStatus, TaskOutcome};
use crate::scheduler::{JobAction, TaskScheduler, Trigger};
use crate::system::HostMonitor;
use crate::types::{ConversationContext, ResponseEnvelope};

/// Assistant name used on envelopes the orchestrator produces itself
const SYSTEM_ASSISTANT: &str = "system";

pub const HEALTH_CHECK_JOB: &str = "system_health_check";
pub const AUTO_ORGANIZE_JOB: &str = "auto_organize_downloads";

// ─────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub initialized: bool,
    pub assistants_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StatusReport {
    Overview {
        orchestrator: OrchestratorStatus,
        assistants: BTreeMap<String, PersonaStatus>,
    },
    Assistant(PersonaStatus),
}

/// Result of `execute_task`: native tasks yield an outcome, everything
/// else is answered by the assistant as a message.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskResponse {
    Native(TaskOutcome),
    Routed(ResponseEnvelope),
}

struct DefaultJobs {
    health_check_secs: u64,
    organize_dir: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────

pub struct Orchestrator {
    assistants: BTreeMap<String, Arc<Assistant>>,
    coordinator: Arc<HybridCoordinator>,
    scheduler: Arc<TaskScheduler>,
    files: Arc<FileOrganizer>,
    monitor: Arc<HostMonitor>,
    jobs: DefaultJobs,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
}

impl Orchestrator {
    /// Build every service from configuration.
    pub fn from_config(config: &CrystalConfig) -> Result<Self> {
        let coordinator = Arc::new(HybridCoordinator::from_config(config)?);
        Self::with_coordinator(config, coordinator)
    }

    pub fn with_coordinator(
        config: &CrystalConfig,
        coordinator: Arc<HybridCoordinator>,
    ) -> Result<Self> {
        let scheduler = Arc::new(TaskScheduler::new(config.scheduler_offset()?));
        let files = Arc::new(FileOrganizer::new(&config.files));

        let services = AssistantServices {
            coordinator: coordinator.clone(),
            files: files.clone(),
            scheduler: scheduler.clone(),
        };
        let assistants = config
            .assistants
            .iter()
            .map(|settings| {
                let assistant = Assistant::from_settings(settings, services.clone());
                (assistant.key(), Arc::new(assistant))
            })
            .collect();

        let jobs = DefaultJobs {
            health_check_secs: config.scheduler.health_check_interval_mins.max(1) * 60,
            organize_dir: config
                .scheduler
                .auto_organize_downloads
                .then(|| PathBuf::from(&config.scheduler.downloads_dir)),
        };

        Ok(Self {
            assistants,
            coordinator,
            scheduler,
            files,
            monitor: Arc::new(HostMonitor::new()),
            jobs,
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
        })
    }

    pub fn coordinator(&self) -> &Arc<HybridCoordinator> {
        &self.coordinator
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    pub fn monitor(&self) -> &Arc<HostMonitor> {
        &self.monitor
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Lower-cased assistant names, sorted
    pub fn assistant_names(&self) -> Vec<String> {
        self.assistants.keys().cloned().collect()
    }

    pub fn assistant(&self, name: &str) -> Option<Arc<Assistant>> {
        self.assistants.get(&name.to_lowercase()).cloned()
    }

    fn not_found(&self, name: &str) -> Error {
        Error::AssistantNotFound {
            name: name.to_string(),
            available: self.assistant_names(),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Probe models, start the scheduler, register default jobs and load
    /// assistant instructions. A second call is a no-op.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        info!("Orchestrator starting");

        let models = self.coordinator.refresh_models().await;
        debug!(local_models = models, "Local models probed");

        self.scheduler.start().await?;
        self.register_default_jobs().await?;

        for assistant in self.assistants.values() {
            assistant.initialize().await;
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!(assistants = ?self.assistant_names(), "Orchestrator ready");
        Ok(())
    }

    pub async fn shutdown(&self) {
        let _guard = self.init_lock.lock().await;
        info!("Orchestrator shutting down");

        for assistant in self.assistants.values() {
            assistant.shutdown();
        }
        if let Err(e) = self.scheduler.shutdown().await {
            error!(error = %e, "Scheduler shutdown failed");
        }

        self.initialized.store(false, Ordering::SeqCst);
        info!("Orchestrator shutdown complete");
    }

    async fn register_default_jobs(&self) -> Result<()> {
        let monitor = self.monitor.clone();
        let coordinator = self.coordinator.clone();
        let health: JobAction = Arc::new(move || {
            let monitor = monitor.clone();
            let coordinator = coordinator.clone();
            Box::pin(async move {
                let local_models = coordinator.refresh_models().await;
                let snapshot = monitor.snapshot();
                info!(
                    hostname = %snapshot.info.hostname,
                    uptime_secs = snapshot.uptime_secs,
                    process_memory_mb = ?snapshot.process_memory_mb,
                    local_models,
                    remote_available = coordinator.has_remote(),
                    "System health check"
                );
            })
        });
        self.scheduler
            .schedule(
                HEALTH_CHECK_JOB,
                Trigger::Interval {
                    seconds: self.jobs.health_check_secs,
                },
                "System health monitoring",
                health,
            )
            .await?;

        if let Some(dir) = self.jobs.organize_dir.clone() {
            let files = self.files.clone();
            let organize: JobAction = Arc::new(move || {
                let files = files.clone();
                let dir = dir.clone();
                Box::pin(async move {
                    let target = dir.clone();
                    match tokio::task::spawn_blocking(move || files.organize(&target, true)).await {
                        Ok(Ok(report)) => info!(
                            directory = %dir.display(),
                            total_files = report.total_files,
                            "Downloads organized"
                        ),
                        Ok(Err(e)) => warn!(directory = %dir.display(), error = %e, "Auto-organize failed"),
                        Err(e) => error!(error = %e, "Auto-organize task aborted"),
                    }
                })
            });
            self.scheduler
                .schedule(
                    AUTO_ORGANIZE_JOB,
                    Trigger::Interval { seconds: 3_600 },
                    "Automatically organize downloads folder",
                    organize,
                )
                .await?;
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Routing
    // ─────────────────────────────────────────────────────────────

    /// Send a message to the named assistant. Never fails: every problem
    /// is rendered as an error envelope.
    pub async fn route(
        &self,
        name: &str,
        message: &str,
        context: Option<ConversationContext>,
    ) -> ResponseEnvelope {
        let key = name.to_lowercase();

        if let Err(e) = self.initialize().await {
            error!(error = %e, "Initialization failed");
            return ResponseEnvelope::failure(
                SYSTEM_ASSISTANT,
                format!("Sorry, I encountered an error: {}", e),
                vec![],
                Map::new(),
            );
        }

        let Some(assistant) = self.assistants.get(&key).cloned() else {
            let err = self.not_found(&key);
            warn!(assistant = %key, "Unknown assistant requested");
            let mut metadata = Map::new();
            metadata.insert("available".into(), json!(self.assistant_names()));
            return ResponseEnvelope::failure(SYSTEM_ASSISTANT, err.to_string(), vec![], metadata);
        };

        debug!(assistant = %key, message_length = message.len(), "Routing message");

        let message = message.to_string();
        let handle =
            tokio::spawn(async move { assistant.process_message(&message, context.as_ref()).await });

        match handle.await {
            Ok(envelope) => {
                debug!(assistant = %key, response_length = envelope.message.len(), "Message processed");
                envelope.routed(key)
            }
            Err(e) => {
                let reason = panic_reason(e);
                error!(assistant = %key, error = %reason, "Assistant task failed");
                let mut metadata = Map::new();
                metadata.insert("error".into(), json!(reason));
                ResponseEnvelope::failure(
                    key,
                    format!("Sorry, I encountered an error: {}", reason),
                    vec![],
                    metadata,
                )
            }
        }
    }

    /// Run a task through an assistant. Tasks the assistant implements run
    /// directly; anything else is phrased as a message.
    pub async fn execute_task(&self, name: &str, task_type: &str, params: Value) -> TaskResponse {
        let Some(assistant) = self.assistant(name) else {
            return TaskResponse::Routed(self.route(name, task_type, None).await);
        };

        if supports_task(task_type) {
            if let Err(e) = self.initialize().await {
                return TaskResponse::Native(TaskOutcome::from_result(task_type, Err(e)));
            }
            return TaskResponse::Native(assistant.execute_task(task_type, &params).await);
        }

        let message = format!("Execute task: {} with parameters: {}", task_type, params);
        let mut context = ConversationContext::default();
        context.insert("task_execution", true);
        context.insert("task_type", task_type);
        TaskResponse::Routed(self.route(name, &message, Some(context)).await)
    }

    // ─────────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────────

    pub fn status(&self, name: Option<&str>) -> Result<StatusReport> {
        match name {
            Some(name) => self
                .assistant(name)
                .map(|a| StatusReport::Assistant(a.status()))
                .ok_or_else(|| self.not_found(name)),
            None => Ok(StatusReport::Overview {
                orchestrator: OrchestratorStatus {
                    initialized: self.is_initialized(),
                    assistants_count: self.assistants.len(),
                },
                assistants: self
                    .assistants
                    .iter()
                    .map(|(key, a)| (key.clone(), a.status()))
                    .collect(),
            }),
        }
    }
}

fn panic_reason(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "assistant panicked".to_string())
}
