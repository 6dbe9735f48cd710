//! The single-consumer monitoring loop.
//!
//! One task owns every piece of monitoring state and drains the bounded
//! event queue in FIFO order, so monitor mutation needs no locking. The
//! queue poll carries a one second timeout: an empty poll is benign and
//! keeps the loop responsive to shutdown. Only `EndMonitoring` exits;
//! handler errors are logged and the loop moves to the next event.

use crate::clock::Clock;
use crate::events::{Event, FunctionScope, TestStatus};
use crate::logging::MonitoringLog;
use crate::maps::PropertyMapGroup;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, warn};
use vigil_formula::{lnot, new_monitor, AtomRef, FormulaMonitor};
use vigil_verdict_client::{FunctionCallRecord, TestRecord, VerdictEntry, VerdictSink};

/// Qualified function name, then property hash.
pub type FunctionMaps = HashMap<String, HashMap<String, PropertyMapGroup>>;

const QUEUE_POLL: Duration = Duration::from_secs(1);

pub struct Consumer {
    receiver: mpsc::Receiver<Event>,
    function_to_maps: FunctionMaps,
    sink: Arc<dyn VerdictSink>,
    clock: Clock,
    log: Arc<MonitoringLog>,
    test_mode: bool,
    paused: bool,
    transaction: i64,
    mixed_clone_flagged: bool,
}

impl Consumer {
    pub fn new(
        receiver: mpsc::Receiver<Event>,
        function_to_maps: FunctionMaps,
        sink: Arc<dyn VerdictSink>,
        clock: Clock,
        log: Arc<MonitoringLog>,
        test_mode: bool,
    ) -> Self {
        Consumer {
            receiver,
            function_to_maps,
            sink,
            clock,
            log,
            test_mode,
            paused: false,
            transaction: -1,
            mixed_clone_flagged: false,
        }
    }

    /// Drain the queue until `EndMonitoring`. Returns the final maps so
    /// callers (and tests) can inspect state after shutdown.
    pub async fn run(mut self) -> FunctionMaps {
        loop {
            let event = match timeout(QUEUE_POLL, self.receiver.recv()).await {
                Ok(Some(event)) => event,
                // every sender is gone; nothing more can arrive
                Ok(None) => break,
                // empty poll, keep looping
                Err(_) => continue,
            };

            if matches!(event, Event::EndMonitoring) {
                self.log.log("Returning from monitoring loop.");
                break;
            }

            // while paused, everything except the resume message is dropped
            if self.paused {
                if matches!(event, Event::ResumeMonitoring) {
                    self.log.log("Restarting monitoring.");
                    self.paused = false;
                }
                continue;
            }

            match event {
                Event::PauseMonitoring => {
                    self.log.log("Pausing monitoring. Loop stays alive.");
                    self.paused = true;
                }
                Event::TestTransaction { transaction_id } => {
                    self.transaction = transaction_id;
                }
                Event::Function {
                    property_hashes,
                    function_name,
                    scope,
                    timestamp,
                } => match scope {
                    FunctionScope::Start => {
                        self.handle_function_start(&property_hashes, &function_name, timestamp)
                    }
                    FunctionScope::End => {
                        self.handle_function_end(&property_hashes, &function_name, timestamp)
                            .await
                    }
                },
                Event::Trigger {
                    property_hash,
                    function_name,
                    static_qd_index,
                    bind_variable_index,
                } => self.handle_trigger(
                    &property_hash,
                    &function_name,
                    static_qd_index,
                    bind_variable_index,
                ),
                Event::Path {
                    property_hash,
                    function_name,
                    branch_label,
                } => {
                    if let Some(maps) = self.maps_mut(&function_name, &property_hash) {
                        maps.program_path.push(branch_label);
                    }
                }
                Event::Instrument {
                    property_hash,
                    function_name,
                    static_qd_indices,
                    atom_index,
                    atom_sub_index,
                    inst_point_ids,
                    observation_start,
                    observation_end,
                    observed_value,
                    thread_id,
                    state_dict,
                } => {
                    debug!(thread_id, atom_index, "consuming instrument observation");
                    self.handle_instrument(
                        &property_hash,
                        &function_name,
                        &static_qd_indices,
                        atom_index,
                        atom_sub_index,
                        &inst_point_ids,
                        observation_start,
                        observation_end,
                        observed_value,
                        state_dict,
                    );
                }
                Event::TestStatus {
                    status,
                    start,
                    end,
                    test_name,
                    ..
                } => self.handle_test_status(status, start, end, test_name).await,
                Event::EndMonitoring | Event::ResumeMonitoring => {}
            }
        }

        self.log.log("Consumption finished.");
        self.function_to_maps
    }

    fn maps_mut(&mut self, function_name: &str, property_hash: &str) -> Option<&mut PropertyMapGroup> {
        match self
            .function_to_maps
            .get_mut(function_name)
            .and_then(|properties| properties.get_mut(property_hash))
        {
            Some(maps) => Some(maps),
            None => {
                warn!(
                    function = function_name,
                    property = property_hash,
                    "event for unknown function/property pair"
                );
                None
            }
        }
    }

    /// Function start: wipe whatever the previous call left behind (an
    /// unhandled exception may have ended it without an end instrument) and
    /// stamp the start time.
    fn handle_function_start(
        &mut self,
        property_hashes: &[String],
        function_name: &str,
        timestamp: DateTime<Utc>,
    ) {
        self.log
            .log(&format!("Function '{}' has started.", function_name));
        for property_hash in property_hashes {
            if let Some(maps) = self.maps_mut(function_name, property_hash) {
                maps.static_qd_to_monitors.clear();
                maps.verdict_report.reset();
                maps.latest_time_of_call = Some(timestamp);
                maps.program_path.clear();
            }
        }
    }

    /// Function end: submit the call record, harvest collapsed monitors
    /// into each property's report, submit the reports, and reset.
    async fn handle_function_end(
        &mut self,
        property_hashes: &[String],
        function_name: &str,
        timestamp: DateTime<Utc>,
    ) {
        // call metadata is property-independent; read it from any group
        let (time_of_call, program_path) = match self
            .function_to_maps
            .get(function_name)
            .and_then(|properties| properties.values().next())
        {
            Some(maps) => (
                maps.latest_time_of_call.unwrap_or(timestamp),
                maps.program_path.clone(),
            ),
            None => {
                warn!(function = function_name, "end event for unknown function");
                return;
            }
        };

        let transaction_time = if self.test_mode {
            serde_json::json!(self.transaction)
        } else {
            serde_json::json!(timestamp)
        };

        let record = FunctionCallRecord {
            transaction_time,
            time_of_call,
            end_time_of_call: timestamp,
            function_name: function_name.to_string(),
            program_path,
        };

        let registration = match self.sink.submit_function_call(&record).await {
            Ok(registration) => Some(registration),
            Err(e) => {
                // verdicts cannot be attributed without the registration;
                // drop them for this call but leave the loop healthy
                error!(error = %e, "function call submission failed, discarding verdicts");
                self.log
                    .log("Function call submission failed. Verdicts for this call are lost.");
                None
            }
        };

        let report_time = self.clock.now();
        for property_hash in property_hashes {
            let maps = match self.maps_mut(function_name, property_hash) {
                Some(maps) => maps,
                None => continue,
            };

            if registration.is_some() {
                // register every monitor that reached a verdict
                for (&static_qd_index, monitors) in &maps.static_qd_to_monitors {
                    for monitor in monitors {
                        if let Some(collapsing_atom_index) = monitor.collapsing_atom_index {
                            maps.verdict_report.add_verdict(
                                static_qd_index,
                                VerdictEntry {
                                    verdict: monitor.verdict(),
                                    time: report_time,
                                    atom_to_observation: monitor.atom_to_observation.clone(),
                                    atom_to_program_path: monitor.atom_to_program_path.clone(),
                                    collapsing_atom_index,
                                    collapsing_atom_sub_index: monitor
                                        .collapsing_atom_sub_index
                                        .unwrap_or(0),
                                    atom_to_state_dict: monitor.atom_to_state_dict.clone(),
                                },
                            );
                        }
                    }
                }
            }

            maps.static_qd_to_monitors.clear();
            let report = maps.verdict_report.clone();
            maps.verdict_report.reset();
            maps.latest_time_of_call = None;

            if let Some(registration) = registration {
                if let Err(e) = self
                    .sink
                    .submit_verdicts(
                        &report,
                        property_hash,
                        registration.function_id,
                        registration.function_call_id,
                    )
                    .await
                {
                    // best effort; one lost report must not kill the loop
                    warn!(error = %e, property = %property_hash, "verdict submission failed");
                }
            }
        }
    }

    /// Trigger: instantiate a monitor for the first bind variable, or
    /// advance/clone existing monitors for a later one.
    fn handle_trigger(
        &mut self,
        property_hash: &str,
        function_name: &str,
        static_qd_index: usize,
        bind_variable_index: usize,
    ) {
        let now = self.clock.now();
        let mut flag_mixed = false;
        {
            let maps = match self.maps_mut(function_name, property_hash) {
                Some(maps) => maps,
                None => return,
            };
            let formula = maps.formula_structure.clone();
            let monitors = maps
                .static_qd_to_monitors
                .entry(static_qd_index)
                .or_default();

            if bind_variable_index == 0 {
                monitors.push(new_monitor(&formula));
                return;
            }

            let mut new_monitors: Vec<FormulaMonitor> = Vec::new();
            let mut prefixes_processed: Vec<Vec<DateTime<Utc>>> = Vec::new();

            for monitor in monitors.iter_mut() {
                if monitor.monitor_instantiation_time.len() == bind_variable_index + 1 {
                    // this monitor already covers the current bind variable:
                    // clone its prefix for the new binding, once per prefix
                    let prefix =
                        monitor.monitor_instantiation_time[..bind_variable_index].to_vec();
                    if prefixes_processed.contains(&prefix) {
                        continue;
                    }
                    prefixes_processed.push(prefix.clone());

                    let mut clone = new_monitor(&formula);
                    let mut instantiation_time = prefix;
                    instantiation_time.push(now);
                    clone.monitor_instantiation_time = instantiation_time;

                    for atom in &formula.atoms {
                        if atom.is_mixed() {
                            // copy the sub-index slots whose base variables
                            // are bound before the current bind variable and
                            // re-evaluate from the copied evidence
                            flag_mixed = true;
                            for (sub_index, &base_variable) in
                                atom.base_variables.iter().enumerate()
                            {
                                if base_variable < bind_variable_index {
                                    clone.copy_slot(monitor, atom.index, sub_index);
                                    clone.check_atom_truth_value(atom.index, sub_index);
                                }
                            }
                        } else if atom.base_variables[0] < bind_variable_index {
                            // single-variable atom: copy the whole slot and
                            // replay the recorded truth value
                            if let Some(truth) = monitor.atom_state()[atom.index] {
                                clone.copy_slot(monitor, atom.index, 0);
                                if truth {
                                    clone.check_optimised(AtomRef::positive(atom.index));
                                } else {
                                    clone.check_optimised(lnot(AtomRef::positive(atom.index)));
                                }
                            }
                        }
                    }
                    new_monitors.push(clone);
                } else if monitor.monitor_instantiation_time.len() == bind_variable_index {
                    // the monitor is being advanced to the next binding
                    monitor.monitor_instantiation_time.push(now);
                }
            }

            monitors.extend(new_monitors);
        }

        if flag_mixed && !self.mixed_clone_flagged {
            self.mixed_clone_flagged = true;
            warn!(
                property = property_hash,
                "mixed-atom clone: sub-index enumeration follows the copied \
                 evidence slots; verify the property's binding order if \
                 verdicts look inverted"
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_instrument(
        &mut self,
        property_hash: &str,
        function_name: &str,
        static_qd_indices: &[usize],
        atom_index: usize,
        atom_sub_index: usize,
        inst_point_ids: &[i64],
        observation_start: DateTime<Utc>,
        observation_end: DateTime<Utc>,
        observed_value: serde_json::Value,
        state_dict: Option<serde_json::Value>,
    ) {
        let maps = match self.maps_mut(function_name, property_hash) {
            Some(maps) => maps,
            None => return,
        };
        let program_path_length = maps.program_path.len();

        for (&static_qd_index, &inst_point_id) in static_qd_indices.iter().zip(inst_point_ids) {
            if let Some(monitors) = maps.static_qd_to_monitors.get_mut(&static_qd_index) {
                for monitor in monitors.iter_mut() {
                    // per-slot deduplication happens inside the monitor
                    monitor.process_atom_and_value(
                        atom_index,
                        atom_sub_index,
                        observation_start,
                        observation_end,
                        observed_value.clone(),
                        inst_point_id,
                        program_path_length,
                        state_dict.clone(),
                    );
                }
            }
        }
    }

    async fn handle_test_status(
        &mut self,
        status: TestStatus,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        test_name: String,
    ) {
        let record = TestRecord {
            test_name,
            test_result: status.as_result().to_string(),
            start_time: start,
            end_time: end,
        };
        if let Err(e) = self.sink.submit_test_data(&record).await {
            warn!(error = %e, "test status submission failed");
        }
    }
}
