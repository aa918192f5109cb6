use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How live progress is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressStyleKind {
    /// indicatif bar on stderr
    #[default]
    Bar,
    /// Plain text line rebuilt with [`format_progress_line`] on every update
    Text,
}

/// Appearance of the plain text bar
#[derive(Debug, Clone)]
pub struct TextBarStyle {
    pub prefix: String,
    pub suffix: String,
    /// Decimals shown for the percentage
    pub decimals: usize,
    /// Width of the bar in characters
    pub length: usize,
    pub fill: char,
}

impl Default for TextBarStyle {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            decimals: 0,
            length: 100,
            fill: '█',
        }
    }
}

fn format_hms(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Render one progress line
///
/// Returns `None` when `current > total`, which is a caller bug rather than a state to draw.
/// A finished bar is drawn with `#` instead of the fill character.
pub fn format_progress_line(
    current: usize,
    total: usize,
    elapsed: Option<Duration>,
    style: &TextBarStyle,
) -> Option<String> {
    if current > total {
        tracing::warn!("progress bar not used properly: iteration {current} > total {total}");
        return None;
    }

    let ratio = if total == 0 {
        1.0
    } else {
        current as f64 / total as f64
    };
    let percent = format!("{:.*}", style.decimals, 100.0 * ratio);
    let filled = if total == 0 {
        style.length
    } else {
        style.length * current / total
    };

    let fill = if current == total { '#' } else { style.fill };
    let bar: String = std::iter::repeat_n(fill, filled)
        .chain(std::iter::repeat_n('-', style.length - filled))
        .collect();

    let line = match elapsed {
        None => format!(
            "{} |{}| {}/{}, {}%, {}",
            style.prefix, bar, current, total, percent, style.suffix
        ),
        Some(elapsed) => {
            let elapsed_secs = elapsed.as_secs_f64();
            let sec_per_item = (elapsed_secs / current.max(1) as f64).max(1e-12);
            let remaining = ((total - current) as f64 * sec_per_item) as u64;
            let rate = (1.0 / sec_per_item) as u64;
            format!(
                "{} |{}| {}/{}, [{}<{}, {}itr/s] {}% {}",
                style.prefix,
                bar,
                current,
                total,
                format_hms(elapsed_secs as u64),
                format_hms(remaining),
                rate,
                percent,
                style.suffix
            )
        }
    };

    Some(line)
}

/// Count of completed tasks; only moves forward and never passes its total
#[derive(Debug)]
pub struct ProgressCounter {
    completed: AtomicUsize,
    total: usize,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one completion, returning the new count (or `None` once saturated)
    pub fn increment(&self) -> Option<usize> {
        self.completed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |done| {
                (done < self.total).then_some(done + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    pub fn get(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

struct TextDisplay {
    style: TextBarStyle,
    started: Instant,
    // Serializes redraws so lines never interleave
    lock: Mutex<()>,
}

impl TextDisplay {
    fn draw(&self, current: usize, total: usize) {
        let Ok(_lock) = self.lock.lock() else {
            return;
        };
        let Some(line) =
            format_progress_line(current, total, Some(self.started.elapsed()), &self.style)
        else {
            return;
        };

        let mut stderr = std::io::stderr().lock();
        if current == total {
            let _ = writeln!(stderr, "\r{line}");
        } else {
            let _ = write!(stderr, "\r{line}");
        }
        let _ = stderr.flush();
    }
}

enum Display {
    Hidden,
    Bar(ProgressBar),
    Text(TextDisplay),
}

/// Live progress for one dispatch; cheap to clone into workers
#[derive(Clone)]
pub struct ProgressReporter {
    counter: Arc<ProgressCounter>,
    display: Arc<Display>,
}

impl ProgressReporter {
    pub fn new(
        total: usize,
        description: Option<&str>,
        unit: &str,
        verbose: bool,
        kind: ProgressStyleKind,
    ) -> Self {
        let display = if !verbose {
            Display::Hidden
        } else {
            match kind {
                ProgressStyleKind::Bar => Display::Bar(Self::bar(total, description, unit)),
                ProgressStyleKind::Text => Display::Text(TextDisplay {
                    style: TextBarStyle {
                        prefix: description.unwrap_or_default().to_string(),
                        suffix: unit.to_string(),
                        length: 40,
                        ..TextBarStyle::default()
                    },
                    started: Instant::now(),
                    lock: Mutex::new(()),
                }),
            }
        };

        Self {
            counter: Arc::new(ProgressCounter::new(total)),
            display: Arc::new(display),
        }
    }

    /// Reporter that tracks the count but draws nothing
    pub fn hidden(total: usize) -> Self {
        Self::new(total, None, "it", false, ProgressStyleKind::Bar)
    }

    fn bar(total: usize, description: Option<&str>, unit: &str) -> ProgressBar {
        let template = format!(
            "{{prefix}} {{percent:>3}}%|{{bar:40.cyan/blue}}| {{pos}}/{{len}} {unit} [{{elapsed_precise}}<{{eta_precise}}, {{per_sec}}]"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ");

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        if let Some(description) = description {
            bar.set_prefix(description.to_string());
        }
        bar
    }

    /// Draw the initial 0/total state
    pub fn start(&self) {
        match self.display.as_ref() {
            Display::Hidden => {}
            Display::Bar(bar) => bar.set_position(0),
            Display::Text(text) => text.draw(0, self.counter.total()),
        }
    }

    /// Record one completed task and redraw
    pub fn advance(&self) {
        let Some(current) = self.counter.increment() else {
            return;
        };
        match self.display.as_ref() {
            Display::Hidden => {}
            Display::Bar(bar) => bar.inc(1),
            Display::Text(text) => text.draw(current, self.counter.total()),
        }
    }

    pub fn finish(&self) {
        if let Display::Bar(bar) = self.display.as_ref() {
            bar.finish();
        }
    }

    pub fn completed(&self) -> usize {
        self.counter.get()
    }

    pub fn total(&self) -> usize {
        self.counter.total()
    }
}
