use super::callbacks::{Callback, CompositeCallback};
use super::pool::{TaskFailure, WorkerPool, panic_message};
use super::progress::{ProgressReporter, ProgressStyleKind};
use super::relay::{LogRelay, RelaySink, bootstrap_worker};
use serde::Deserialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

/// Invalid dispatch inputs, reported before any task runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "the length of the positional and keyword argument lists must be the same ({positional} != {keyword})"
    )]
    LengthMismatch { positional: usize, keyword: usize },
    #[error("the number of workers must be greater or equal than 0 (got {0})")]
    InvalidWorkerCount(i64),
    #[error("unrecognized worker count '{0}', expected inline, physical, logical or an integer")]
    UnrecognizedWorkerCount(String),
}

/// Failure of a whole dispatch
#[derive(Debug, Error)]
pub enum DispatchError<E> {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The target function returned an error for the task at `index`
    #[error("task {index} failed: {source}")]
    Task { index: usize, source: E },
    #[error("task {index} panicked: {message}")]
    Panicked { index: usize, message: String },
    #[error("task {index} was dropped before producing a result")]
    Lost { index: usize },
    #[error("failed to start worker threads: {0}")]
    Spawn(#[from] std::io::Error),
}

impl<E> DispatchError<E> {
    /// The failing task's own error, if that is what stopped the dispatch
    pub fn into_task_error(self) -> Result<E, Self> {
        match self {
            Self::Task { source, .. } => Ok(source),
            other => Err(other),
        }
    }
}

/// How many workers a dispatch uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawWorkerCount")]
pub enum WorkerCount {
    /// Run every task on the calling thread, no pool
    Inline,
    /// Exactly this many pool workers (`0` behaves like `Inline`)
    Fixed(usize),
    /// One worker per physical core
    #[default]
    AllPhysical,
    /// One worker per logical core
    AllLogical,
}

impl WorkerCount {
    pub const LOGICAL_SENTINEL: i64 = -1;
    pub const PHYSICAL_SENTINEL: i64 = -2;

    /// Map the integer convention `-1` logical, `-2` physical, `0` inline, `n > 0` fixed
    pub fn from_legacy(raw: i64) -> Result<Self, ConfigError> {
        match raw {
            Self::LOGICAL_SENTINEL => Ok(Self::AllLogical),
            Self::PHYSICAL_SENTINEL => Ok(Self::AllPhysical),
            0 => Ok(Self::Inline),
            n if n > 0 => Ok(Self::Fixed(n as usize)),
            n => Err(ConfigError::InvalidWorkerCount(n)),
        }
    }

    /// Concrete worker count, `0` meaning inline execution
    pub fn resolve(self) -> usize {
        match self {
            Self::Inline => 0,
            Self::Fixed(n) => n,
            Self::AllPhysical => num_cpus::get_physical(),
            Self::AllLogical => num_cpus::get(),
        }
    }
}

impl FromStr for WorkerCount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" | "main" | "sequential" => Ok(Self::Inline),
            "physical" | "auto" => Ok(Self::AllPhysical),
            "logical" => Ok(Self::AllLogical),
            other => other
                .parse::<i64>()
                .map_err(|_| ConfigError::UnrecognizedWorkerCount(s.to_string()))
                .and_then(Self::from_legacy),
        }
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => f.write_str("inline"),
            Self::Fixed(n) => write!(f, "{n}"),
            Self::AllPhysical => f.write_str("physical"),
            Self::AllLogical => f.write_str("logical"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWorkerCount {
    Number(i64),
    Name(String),
}

impl TryFrom<RawWorkerCount> for WorkerCount {
    type Error = ConfigError;

    fn try_from(raw: RawWorkerCount) -> Result<Self, Self::Error> {
        match raw {
            RawWorkerCount::Number(n) => Self::from_legacy(n),
            RawWorkerCount::Name(name) => name.parse(),
        }
    }
}

/// Presentation and side-channel settings for a dispatch
pub struct DispatchOptions<A, K> {
    /// Label shown in front of the progress display
    pub description: Option<String>,
    /// Per-item label of the progress display
    pub unit: String,
    /// Draw progress at all
    pub verbose: bool,
    /// Run after each successful task with that task's arguments
    pub callbacks: Vec<Callback<A, K>>,
    pub progress_style: ProgressStyleKind,
    /// Destination of records relayed from pool workers
    pub relay_sink: RelaySink,
    /// Most verbose level captured on pool workers
    pub relay_level: LevelFilter,
}

impl<A, K> Default for DispatchOptions<A, K> {
    fn default() -> Self {
        Self {
            description: None,
            unit: "it".to_string(),
            verbose: true,
            callbacks: Vec::new(),
            progress_style: ProgressStyleKind::default(),
            relay_sink: RelaySink::default(),
            relay_level: LevelFilter::INFO,
        }
    }
}

impl<A, K> DispatchOptions<A, K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_callback<C>(mut self, callback: C) -> Self
    where
        C: Fn(&A, &K) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(callback));
        self
    }

    pub fn with_progress_style(mut self, style: ProgressStyleKind) -> Self {
        self.progress_style = style;
        self
    }

    pub fn with_relay_sink(mut self, sink: RelaySink) -> Self {
        self.relay_sink = sink;
        self
    }

    pub fn with_relay_level(mut self, level: LevelFilter) -> Self {
        self.relay_level = level;
        self
    }

    fn reporter(&self, total: usize) -> ProgressReporter {
        ProgressReporter::new(
            total,
            self.description.as_deref(),
            &self.unit,
            self.verbose,
            self.progress_style,
        )
    }
}

fn pair_arguments<A, K: Default>(
    args: Vec<A>,
    kwargs: Option<Vec<K>>,
) -> Result<Vec<(A, K)>, ConfigError> {
    let kwargs = kwargs.unwrap_or_else(|| std::iter::repeat_with(K::default).take(args.len()).collect());

    if args.len() != kwargs.len() {
        return Err(ConfigError::LengthMismatch {
            positional: args.len(),
            keyword: kwargs.len(),
        });
    }

    Ok(args.into_iter().zip(kwargs).collect())
}

/// Apply `func` to every argument pair and return the results in submission order
///
/// `kwargs`, when given, must have the same length as `args`; otherwise every task
/// gets `K::default()`. With [`WorkerCount::Inline`] (or a count resolving to zero)
/// tasks run one after the other on the calling thread and the first error or panic
/// stops the run. Otherwise all tasks are submitted to a fresh [`WorkerPool`] whose workers log
/// through a [`LogRelay`]; the call waits for every task, then reports the error of the
/// lowest-index failing task, if any.
///
/// # Example
/// ```rust
/// use basictools::parallel::{dispatch, DispatchOptions, WorkerCount};
///
/// let squares = dispatch(
///     |x: &u64, _: &()| Ok::<_, std::convert::Infallible>(x * x),
///     vec![1, 2, 3],
///     None,
///     WorkerCount::Fixed(2),
///     DispatchOptions::new().verbose(false),
/// )
/// .unwrap();
/// assert_eq!(squares, vec![1, 4, 9]);
/// ```
pub fn dispatch<A, K, R, E, F>(
    func: F,
    args: Vec<A>,
    kwargs: Option<Vec<K>>,
    workers: WorkerCount,
    options: DispatchOptions<A, K>,
) -> Result<Vec<R>, DispatchError<E>>
where
    A: Send + 'static,
    K: Default + Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(&A, &K) -> Result<R, E> + Send + Sync + 'static,
{
    let tasks = pair_arguments(args, kwargs)?;
    let worker_count = workers.resolve();

    if worker_count == 0 {
        return run_inline(func, tasks, options);
    }

    run_pooled(func, tasks, worker_count, options)
}

/// Sequential variant of [`dispatch`] running on the calling thread
pub fn dispatch_inline<A, K, R, E, F>(
    func: F,
    args: Vec<A>,
    kwargs: Option<Vec<K>>,
    options: DispatchOptions<A, K>,
) -> Result<Vec<R>, DispatchError<E>>
where
    K: Default,
    F: Fn(&A, &K) -> Result<R, E>,
{
    let tasks = pair_arguments(args, kwargs)?;
    run_inline(func, tasks, options)
}

fn run_inline<A, K, R, E, F>(
    func: F,
    tasks: Vec<(A, K)>,
    options: DispatchOptions<A, K>,
) -> Result<Vec<R>, DispatchError<E>>
where
    F: Fn(&A, &K) -> Result<R, E>,
{
    tracing::debug!("Running {} tasks inline", tasks.len());

    let reporter = options.reporter(tasks.len());
    let callbacks = CompositeCallback::new(options.callbacks);
    let mut results = Vec::with_capacity(tasks.len());

    reporter.start();
    for (index, (args, kwargs)) in tasks.iter().enumerate() {
        // Panics surface as errors, the same as on pool workers
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| func(args, kwargs)));
        match outcome {
            Ok(Ok(result)) => {
                results.push(result);
                reporter.advance();
                callbacks.call(args, kwargs);
            }
            Ok(Err(source)) => {
                reporter.finish();
                return Err(DispatchError::Task { index, source });
            }
            Err(payload) => {
                reporter.finish();
                return Err(DispatchError::Panicked {
                    index,
                    message: panic_message(payload.as_ref()),
                });
            }
        }
    }
    reporter.finish();

    Ok(results)
}

fn run_pooled<A, K, R, E, F>(
    func: F,
    tasks: Vec<(A, K)>,
    worker_count: usize,
    options: DispatchOptions<A, K>,
) -> Result<Vec<R>, DispatchError<E>>
where
    A: Send + 'static,
    K: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(&A, &K) -> Result<R, E> + Send + Sync + 'static,
{
    let total = tasks.len();
    let reporter = options.reporter(total);
    if total == 0 {
        reporter.start();
        reporter.finish();
        return Ok(Vec::new());
    }

    let workers = worker_count.min(total);
    tracing::debug!("Dispatching {total} tasks over {workers} workers");

    let relay_level = options.relay_level;
    // Dropping the handle on any early return stops the listener
    let (mut relay, relay_sender) = LogRelay::start(options.relay_sink.clone())?;

    let mut pool = WorkerPool::new(workers, move |_| {
        bootstrap_worker(relay_sender.clone(), relay_level)
    })?;

    let func = Arc::new(func);
    let callbacks = Arc::new(CompositeCallback::new(options.callbacks));

    reporter.start();
    let handles: Vec<_> = tasks
        .into_iter()
        .map(|(args, kwargs)| {
            let func = func.clone();
            let callbacks = callbacks.clone();
            let reporter = reporter.clone();
            pool.submit(move || {
                let outcome = func(&args, &kwargs);
                if outcome.is_ok() {
                    reporter.advance();
                    callbacks.call(&args, &kwargs);
                }
                outcome
            })
        })
        .collect();

    let outcomes = WorkerPool::join_all(handles);

    pool.shutdown();
    relay.stop();
    reporter.finish();

    let mut results = Vec::with_capacity(total);
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(source)) => return Err(DispatchError::Task { index, source }),
            Err(TaskFailure::Panicked(message)) => {
                return Err(DispatchError::Panicked { index, message });
            }
            Err(TaskFailure::Lost) => return Err(DispatchError::Lost { index }),
        }
    }

    Ok(results)
}
