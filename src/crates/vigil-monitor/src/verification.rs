//! The verification object: owns the event queue and the consumer task.
//!
//! Startup order matters: open the monitoring log, probe the verdict
//! server, then load every binding space instrumentation produced. A failed
//! probe does not stop the host service; it flags initialisation failure
//! and turns every later `send_event` and control call into a no-op.

use crate::clock::Clock;
use crate::config::Config;
use crate::consumer::{Consumer, FunctionMaps};
use crate::error::{MonitorError, Result};
use crate::events::Event;
use crate::logging::MonitoringLog;
use crate::maps::{discover_binding_spaces, FormulaRegistry, PropertyMapGroup};
use crate::testdisco::discover_test_cases;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Capacity of the bounded event queue. Producers block when it fills.
const QUEUE_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct Verification {
    sender: mpsc::Sender<Event>,
    consumer_handle: tokio::sync::Mutex<Option<JoinHandle<FunctionMaps>>>,
    /// Set when the verdict server could not be reached at startup. All
    /// event and control operations are no-ops from then on.
    initialisation_failure: AtomicBool,
    clock: Clock,
    log: Arc<MonitoringLog>,
}

impl Verification {
    /// Set up monitoring state and start the consumer task.
    ///
    /// `registry` maps property hashes to the compiled formulas that
    /// instrumentation was run against; `sink` is the verdict server
    /// client. The clock should be NTP-adjusted when the configuration
    /// names an `ntp_server`.
    pub async fn new(
        config: &Config,
        registry: FormulaRegistry,
        sink: Arc<dyn vigil_verdict_client::VerdictSink>,
        clock: Clock,
    ) -> Result<Self> {
        config.validate()?;

        let log = Arc::new(MonitoringLog::new(config.verbose, false));
        log.start_logging()?;
        log.log("Verification object instantiated.");

        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);

        // probe the server before setting anything else up; the host keeps
        // running without monitoring if it is unreachable
        if let Err(e) = sink.ping().await {
            error!(error = %e, url = %config.verdict_server_url, "verdict server unreachable, monitoring disabled");
            log.log(&format!(
                "Couldn't connect to the verdict server at '{}'. Initialisation failed.",
                config.verdict_server_url
            ));
            return Ok(Verification {
                sender,
                consumer_handle: tokio::sync::Mutex::new(None),
                initialisation_failure: AtomicBool::new(true),
                clock,
                log,
            });
        }

        if config.test_mode() {
            let test_cases = discover_test_cases(&config.test_module)?;
            info!(count = test_cases.len(), "test cases discovered");
        }

        let function_to_maps = build_function_maps(config, &registry)?;
        log.log(&format!(
            "Monitoring state prepared for {} function(s).",
            function_to_maps.len()
        ));

        let consumer = Consumer::new(
            receiver,
            function_to_maps,
            sink,
            clock,
            log.clone(),
            config.test_mode(),
        );
        let handle = tokio::spawn(consumer.run());

        Ok(Verification {
            sender,
            consumer_handle: tokio::sync::Mutex::new(Some(handle)),
            initialisation_failure: AtomicBool::new(false),
            clock,
            log,
        })
    }

    pub fn initialisation_failed(&self) -> bool {
        self.initialisation_failure.load(Ordering::SeqCst)
    }

    /// Current time from the configured source.
    pub fn get_time(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Enqueue an event from an instrumentation point. Blocks while the
    /// queue is full; a no-op after initialisation failure.
    pub async fn send_event(&self, event: Event) {
        if self.initialisation_failed() {
            return;
        }
        let _ = self.sender.send(event).await;
    }

    /// Enqueue from a non-async producer thread.
    pub fn send_event_blocking(&self, event: Event) {
        if self.initialisation_failed() {
            return;
        }
        let _ = self.sender.blocking_send(event);
    }

    pub async fn end_monitoring(&self) {
        if self.initialisation_failed() {
            return;
        }
        self.log.log("Ending monitoring loop.");
        let _ = self.sender.send(Event::EndMonitoring).await;
    }

    pub async fn pause_monitoring(&self) {
        if self.initialisation_failed() {
            return;
        }
        self.log.log("Sending monitoring pause message.");
        let _ = self.sender.send(Event::PauseMonitoring).await;
    }

    pub async fn resume_monitoring(&self) {
        if self.initialisation_failed() {
            return;
        }
        self.log.log("Sending monitoring resume message.");
        let _ = self.sender.send(Event::ResumeMonitoring).await;
    }

    /// Send the end token and wait for the consumer to drain through it.
    /// The monitoring log closes once the task has exited.
    pub async fn stop(&self) -> Option<FunctionMaps> {
        self.end_monitoring().await;
        let handle = self.consumer_handle.lock().await.take()?;
        let maps = handle.await.ok();
        self.log.end_logging();
        maps
    }
}

fn build_function_maps(config: &Config, registry: &FormulaRegistry) -> Result<FunctionMaps> {
    let machine_prefix = config.machine_prefix();
    let mut function_to_maps: FunctionMaps = HashMap::new();

    for name in discover_binding_spaces(&config.project_root)? {
        let formula = registry
            .get(&name.property_hash)
            .ok_or_else(|| MonitorError::UnknownProperty(name.property_hash.clone()))?;
        let group = PropertyMapGroup::load(&config.project_root, &name, formula.clone())?;
        function_to_maps
            .entry(name.qualified_function(&machine_prefix))
            .or_default()
            .insert(name.property_hash.clone(), group);
    }

    Ok(function_to_maps)
}
