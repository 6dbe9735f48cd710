//! The verdict sink: where call records and verdict reports go.
//!
//! [`VerdictSink`] abstracts the verdict server so the consumer loop can be
//! exercised against an in-memory implementation. [`HttpVerdictSink`] is
//! the production implementation, posting JSON to the server's endpoints.

use crate::error::{Result, SinkError};
use crate::report::VerdictReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::debug;

/// Metadata for one completed function call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCallRecord {
    /// In test mode the test transaction id; otherwise the end-of-call
    /// timestamp.
    pub transaction_time: serde_json::Value,
    pub time_of_call: DateTime<Utc>,
    pub end_time_of_call: DateTime<Utc>,
    pub function_name: String,
    /// Branch labels taken by the call, in order.
    pub program_path: Vec<i64>,
}

/// Identifiers the server assigns to a submitted call record. Verdict
/// submission references these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CallRegistration {
    pub function_id: i64,
    pub function_call_id: i64,
}

/// Outcome metadata for one test case, forwarded in test-framework mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub test_name: String,
    /// `Fail`, `Error` or `Success`.
    pub test_result: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct VerdictSubmission<'a> {
    function_call_id: i64,
    function_id: i64,
    verdicts: &'a VerdictReport,
    property_hash: &'a str,
}

/// A sink for function-call metadata and verdict reports.
#[async_trait]
pub trait VerdictSink: Send + Sync {
    /// Reachability probe, run once at startup.
    async fn ping(&self) -> Result<()>;

    /// Submit a call record. Must succeed before any verdicts for the call
    /// can be submitted; failure is [`SinkError::Unavailable`].
    async fn submit_function_call(&self, record: &FunctionCallRecord) -> Result<CallRegistration>;

    /// Submit the verdict report for a registered call. Best effort: the
    /// caller logs failures and moves on.
    async fn submit_verdicts(
        &self,
        report: &VerdictReport,
        property_hash: &str,
        function_id: i64,
        function_call_id: i64,
    ) -> Result<()>;

    /// Forward test-case metadata in test-framework mode.
    async fn submit_test_data(&self, record: &TestRecord) -> Result<()>;
}

/// HTTP implementation against a running verdict server.
pub struct HttpVerdictSink {
    base_url: String,
    client: reqwest::Client,
}

impl HttpVerdictSink {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        HttpVerdictSink {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl VerdictSink for HttpVerdictSink {
    async fn ping(&self) -> Result<()> {
        self.client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn submit_function_call(&self, record: &FunctionCallRecord) -> Result<CallRegistration> {
        debug!(function = %record.function_name, "submitting function call record");
        let response = self
            .client
            .post(self.endpoint("insert_function_call_data/"))
            .json(record)
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        response
            .json::<CallRegistration>()
            .await
            .map_err(|e| SinkError::InvalidResponse(e.to_string()))
    }

    async fn submit_verdicts(
        &self,
        report: &VerdictReport,
        property_hash: &str,
        function_id: i64,
        function_call_id: i64,
    ) -> Result<()> {
        let body = VerdictSubmission {
            function_call_id,
            function_id,
            verdicts: report,
            property_hash,
        };
        self.client
            .post(self.endpoint("register_verdicts/"))
            .json(&body)
            .send()
            .await
            .map_err(|e| SinkError::Transmission(e.to_string()))?;
        Ok(())
    }

    async fn submit_test_data(&self, record: &TestRecord) -> Result<()> {
        self.client
            .post(self.endpoint("insert_test_data/"))
            .json(record)
            .send()
            .await
            .map_err(|e| SinkError::Transmission(e.to_string()))?;
        Ok(())
    }
}

/// In-memory sink recording everything it receives. Test double for the
/// consumer loop.
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<FunctionCallRecord>>,
    pub verdicts: Mutex<Vec<(String, i64, i64, VerdictReport)>>,
    pub test_records: Mutex<Vec<TestRecord>>,
    /// When set, call-record submission fails with `Unavailable`.
    pub fail_calls: Mutex<bool>,
    /// When set, the startup ping fails.
    pub fail_ping: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VerdictSink for RecordingSink {
    async fn ping(&self) -> Result<()> {
        if *self.fail_ping.lock().unwrap() {
            return Err(SinkError::Unavailable("recording sink set to fail".into()));
        }
        Ok(())
    }

    async fn submit_function_call(&self, record: &FunctionCallRecord) -> Result<CallRegistration> {
        if *self.fail_calls.lock().unwrap() {
            return Err(SinkError::Unavailable("recording sink set to fail".into()));
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push(record.clone());
        let id = calls.len() as i64;
        Ok(CallRegistration {
            function_id: 1,
            function_call_id: id,
        })
    }

    async fn submit_verdicts(
        &self,
        report: &VerdictReport,
        property_hash: &str,
        function_id: i64,
        function_call_id: i64,
    ) -> Result<()> {
        self.verdicts.lock().unwrap().push((
            property_hash.to_string(),
            function_id,
            function_call_id,
            report.clone(),
        ));
        Ok(())
    }

    async fn submit_test_data(&self, record: &TestRecord) -> Result<()> {
        self.test_records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
