//! The typed event stream from instrumentation points.
//!
//! Instrumented code produces these; the single consumer task drains them
//! in FIFO order. The first three variants are control messages injected by
//! the verification object itself.

use chrono::{DateTime, Utc};

/// One event on the consumption queue.
#[derive(Debug, Clone)]
pub enum Event {
    /// Cooperative shutdown: the consumer finishes the current handler and
    /// returns.
    EndMonitoring,
    /// Pause: subsequent events are discarded until resume.
    PauseMonitoring,
    /// Resume after a pause.
    ResumeMonitoring,

    /// Test-framework transaction marker, stamped onto function-call
    /// records while in test mode.
    TestTransaction { transaction_id: i64 },

    /// A function call started or ended.
    Function {
        property_hashes: Vec<String>,
        function_name: String,
        scope: FunctionScope,
        timestamp: DateTime<Utc>,
    },

    /// A quantifier binding was triggered: instantiate or advance monitors.
    Trigger {
        property_hash: String,
        function_name: String,
        static_qd_index: usize,
        bind_variable_index: usize,
    },

    /// A branch was taken; extends the call's program path.
    Path {
        property_hash: String,
        function_name: String,
        branch_label: i64,
    },

    /// An observation from an instrumentation point, fanned out to every
    /// monitor in the addressed binding-space buckets.
    Instrument {
        property_hash: String,
        function_name: String,
        static_qd_indices: Vec<usize>,
        atom_index: usize,
        atom_sub_index: usize,
        inst_point_ids: Vec<i64>,
        observation_start: DateTime<Utc>,
        observation_end: DateTime<Utc>,
        observed_value: serde_json::Value,
        thread_id: i64,
        /// Absent for transition-style measurements.
        state_dict: Option<serde_json::Value>,
    },

    /// Test-case outcome metadata, forwarded to the sink in test mode.
    TestStatus {
        property_hash: String,
        function_name: String,
        status: TestStatus,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        test_name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionScope {
    Start,
    End,
}

/// Raw outcome counters from the test framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestStatus {
    pub failures: u32,
    pub errors: u32,
}

impl TestStatus {
    /// Coerce to the sink's result string.
    pub fn as_result(&self) -> &'static str {
        if self.failures > 0 {
            "Fail"
        } else if self.errors > 0 {
            "Error"
        } else {
            "Success"
        }
    }
}
