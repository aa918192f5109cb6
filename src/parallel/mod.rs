//! Parallel task dispatcher with cross-worker log relaying
//!
//! This module applies one function to a list of argument pairs, either inline on the
//! calling thread or over a fixed-size pool of worker threads, and hands the results
//! back in submission order.
//!
//! # Architecture Responsibilities
//!
//! ## What This Module Does:
//! - **Worker Resolution**: Turns a [`WorkerCount`] into a concrete thread count using `num_cpus`
//! - **Execution Strategy**: Inline execution when the count is zero, a [`WorkerPool`] otherwise
//! - **Ordering**: Results always follow the order of the input arguments
//! - **Log Relaying**: Worker log events travel through a crossbeam channel to one listener
//! - **Progress**: A monotonic completion counter drives an indicatif bar or a text line
//!
//! ## What This Module Does NOT Do:
//! - **Cancellation**: Submitted tasks always run to completion
//! - **Timeouts**: A hung task hangs the whole dispatch
//! - **Retries**: Wrap the target with [`crate::utils::retry`] before dispatching
//!
//! # Data Flow
//!
//! ```text
//! ┌──────────┐   (args, kwargs)   ┌──────────────┐   bootstrap   ┌──────────┐
//! │  Caller  │───────────────────▶│  Dispatcher  │──────────────▶│ Worker N │
//! │          │◀───────────────────│              │◀──────────────│          │
//! └──────────┘  results in order  └──────────────┘  TaskHandle   └────┬─────┘
//!                                         │                           │ tracing events
//!                                         ▼                           ▼
//!                                 ┌──────────────┐   channel   ┌────────────┐
//!                                 │   Progress   │             │ Log Relay  │──▶ sink
//!                                 └──────────────┘             └────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use basictools::parallel::{dispatch, DispatchOptions, WorkerCount};
//! use std::collections::HashMap;
//!
//! let add = |args: &(i32, i32), kwargs: &HashMap<String, i32>| {
//!     let offset = kwargs.get("offset").copied().unwrap_or(0);
//!     Ok::<_, std::convert::Infallible>(args.0 + args.1 + offset)
//! };
//!
//! let results = dispatch(
//!     add,
//!     vec![(1, 2), (3, 4)],
//!     Some(vec![HashMap::new(), HashMap::from([("offset".to_string(), 10)])]),
//!     WorkerCount::AllLogical,
//!     DispatchOptions::new().with_description("adding").verbose(false),
//! )
//! .unwrap();
//! assert_eq!(results, vec![3, 17]);
//! ```

pub mod callbacks;
pub mod core;
pub mod pool;
pub mod progress;
pub mod relay;


pub use self::callbacks::{Callback, CompositeCallback};
pub use self::core::{
    ConfigError, DispatchError, DispatchOptions, WorkerCount, dispatch, dispatch_inline,
};
pub use self::pool::{TaskFailure, TaskHandle, WorkerPool};
pub use self::progress::{
    ProgressCounter, ProgressReporter, ProgressStyleKind, TextBarStyle, format_progress_line,
};
pub use self::relay::{
    LogEnvelope, LogRelay, RelayHandle, RelaySender, RelaySink, RelayState, SharedWriter,
    WorkerLogGuard, bootstrap_worker,
};
