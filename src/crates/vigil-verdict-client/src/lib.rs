//! Client side of the verdict server protocol.
//!
//! Two concerns live here: the [`VerdictReport`] accumulator each property
//! fills during a function call, and the [`VerdictSink`] trait over which
//! reports and call records leave the process. Production code uses
//! [`HttpVerdictSink`]; tests use [`RecordingSink`].

pub mod error;
pub mod report;
pub mod sink;

pub use error::{Result, SinkError};
pub use report::{VerdictEntry, VerdictReport};
pub use sink::{
    CallRegistration, FunctionCallRecord, HttpVerdictSink, RecordingSink, TestRecord, VerdictSink,
};
