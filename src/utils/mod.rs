//! Small helpers shared by scripts and the dispatcher

use std::thread;
use std::time::{Duration, Instant};

/// Frame drawn around a timed call by [`log_func_with`]
#[derive(Debug, Clone)]
pub struct LogBox {
    pub length: usize,
    pub fill: char,
}

impl Default for LogBox {
    fn default() -> Self {
        Self {
            length: 50,
            fill: '-',
        }
    }
}

/// Run `f`, logging a header with `name`, the elapsed time and a closing rule
pub fn log_func<T>(name: &str, f: impl FnOnce() -> T) -> T {
    log_func_with(name, &LogBox::default(), f)
}

pub fn log_func_with<T>(name: &str, frame: &LogBox, f: impl FnOnce() -> T) -> T {
    let rule: String = std::iter::repeat_n(frame.fill, frame.length).collect();
    let head = format!("{rule} {name} {rule}");
    tracing::info!("{}", head);

    let start = Instant::now();
    let out = f();

    tracing::info!(
        "<---> Elapsed time {:.2}s <--->",
        start.elapsed().as_secs_f64()
    );
    tracing::info!(
        "{}",
        std::iter::repeat_n(frame.fill, head.chars().count()).collect::<String>()
    );
    out
}

/// Wrap a dispatcher target so failing calls are retried
///
/// The wrapped function is called up to `attempts` times (at least once) with `delay`
/// between calls. The last error is returned when every attempt fails.
pub fn retry<A, K, R, E, F>(
    attempts: usize,
    delay: Duration,
    func: F,
) -> impl Fn(&A, &K) -> Result<R, E> + Send + Sync
where
    F: Fn(&A, &K) -> Result<R, E> + Send + Sync,
{
    let attempts = attempts.max(1);
    move |args: &A, kwargs: &K| {
        let mut attempt = 1;
        loop {
            match func(args, kwargs) {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= attempts => return Err(error),
                Err(_) => {
                    tracing::warn!("Attempt {attempt}/{attempts} failed, retrying in {delay:?}");
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
