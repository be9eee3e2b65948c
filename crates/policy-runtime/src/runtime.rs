//! # Policy Runtime
//!
//! Owns the [`ServiceContainer`] and the background loops:
//!
//! | Loop                 | Subscription        | Purpose                          |
//! |----------------------|---------------------|----------------------------------|
//! | completion listener  | `TaskCompletion`    | resolve pending dispatcher tasks |
//! | eviction             |                     | reject tasks past their deadline |
//! | embedded worker      | `WorkerTasks`       | answer tasks in-process          |
//! | block metrics        | `BlockUpdates`, `External` | count actions and errors  |
//! | dispatcher sampler   |                     | task counters and pending gauge  |
//! | request broker       |                     | serve `EngineMessage` requests   |
//!
//! Subscriptions are taken before any loop is spawned, so nothing published
//! after `start` returns is missed.

use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use pe_02_task_dispatcher::{eviction_task, run_completion_listener};
use shared_bus::{EventFilter, EventTopic};

use crate::adapters::EmbeddedWorker;
use crate::container::{EngineConfig, ServiceContainer};
use crate::handlers::metrics::{run_block_metrics, run_dispatcher_sampler};
use crate::handlers::{BrokerHandle, RequestBroker};

pub struct PolicyRuntime {
    container: Arc<ServiceContainer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PolicyRuntime {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let container = Arc::new(ServiceContainer::new(config)?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            container,
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn container(&self) -> &Arc<ServiceContainer> {
        &self.container
    }

    /// Spawn the background loops and return the broker's request handle.
    ///
    /// Must be called from inside a Tokio runtime, and only once.
    pub fn start(&self) -> Result<BrokerHandle> {
        if !self.tasks.lock().is_empty() {
            bail!("policy runtime already started");
        }
        let container = &self.container;
        let config = &container.config;
        info!("===========================================");
        info!("  Policy Engine Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let completions = container
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::TaskCompletion]));
        self.spawn("completion listener", run_completion_listener(container.dispatcher.clone(), completions));
        self.spawn(
            "eviction",
            eviction_task(container.dispatcher.clone(), config.dispatcher.eviction_interval()),
        );

        if config.runtime.embedded_worker {
            let tasks = container
                .bus
                .subscribe(EventFilter::topics(vec![EventTopic::WorkerTasks]));
            let worker = Arc::new(EmbeddedWorker::new(container.bus.clone()));
            self.spawn("embedded worker", worker.run(tasks));
        }

        let blocks = container.bus.subscribe(EventFilter::topics(vec![
            EventTopic::BlockUpdates,
            EventTopic::External,
        ]));
        self.spawn("block metrics", run_block_metrics(blocks));
        self.spawn(
            "dispatcher sampler",
            run_dispatcher_sampler(container.dispatcher.clone(), config.runtime.metrics_interval()),
        );

        let (broker, handle) = RequestBroker::new(
            container.handler.clone(),
            config.broker.request_queue,
            config.broker.service_name.clone(),
        );
        self.spawn("request broker", broker.run());

        info!(
            embedded_worker = config.runtime.embedded_worker,
            dry_run = config.runtime.dry_run,
            bus_capacity = container.bus.capacity(),
            "[runtime] all loops running"
        );
        Ok(handle)
    }

    /// Run `task` until it finishes or shutdown is signalled.
    fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = task => {}
                _ = shutdown.changed() => {
                    info!(task = name, "[runtime] loop stopped by shutdown");
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Signal every loop and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("[runtime] shutting down");
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        info!(
            pending = self.container.dispatcher.pending_count(),
            "[runtime] shutdown complete"
        );
    }
}
