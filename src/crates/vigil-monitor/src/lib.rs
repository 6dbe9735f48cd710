//! Online monitoring: the event consumer and its lifecycle.
//!
//! The instrumented host process produces [`Event`]s; a single consumer
//! task owned by [`Verification`] drains them, maintains per-property
//! monitor state, and forwards call records and verdict reports to the
//! verdict sink. The host's threads only ever touch the bounded queue;
//! everything behind it is single-threaded by construction.

pub mod clock;
pub mod config;
pub mod consumer;
pub mod error;
pub mod events;
pub mod http;
pub mod logging;
pub mod maps;
pub mod testdisco;
pub mod verification;

pub use clock::Clock;
pub use config::Config;
pub use consumer::{Consumer, FunctionMaps};
pub use error::{MonitorError, Result};
pub use events::{Event, FunctionScope, TestStatus};
pub use maps::{Binding, BindingSpace, DumpName, FormulaRegistry, PropertyMapGroup};
pub use verification::Verification;
