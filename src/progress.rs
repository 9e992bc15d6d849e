//! Progress reporting and display
//!
//! The pipeline reports phases through [`ProgressReporter`] so that display concerns stay out
//! of the core logic.

use std::sync::{Arc, RwLock};

/// Phase of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Fetching source tables
    Fetching,
    /// Deriving rate changes
    ExtractingChanges,
    /// Dictionary-encoding datasets
    Encoding,
    /// Serializing and compressing the artifact
    Compressing,
    /// Writing the artifact
    Writing,
    /// Completed successfully
    Completed,
    /// Failed with error
    Failed(String),
}

impl PipelinePhase {
    fn message(&self) -> &'static str {
        match self {
            Self::Fetching => "📥 Fetching source tables...",
            Self::ExtractingChanges => "📈 Extracting rate changes...",
            Self::Encoding => "🔧 Encoding datasets...",
            Self::Compressing => "🗜️  Compressing artifact...",
            Self::Writing => "💾 Writing artifact...",
            Self::Completed => "✅ Completed!",
            Self::Failed(_) => "❌ Failed",
        }
    }
}

/// Progress reporter trait - implement this for different display backends.
pub trait ProgressReporter: Send + Sync {
    /// Set the current phase.
    fn set_phase(&self, phase: PipelinePhase);

    /// Record the size of an encoded dataset.
    fn dataset_encoded(&self, dataset: &str, records: usize);

    /// Log an informational message.
    fn log_info(&self, message: &str);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op reporter for when progress display is disabled.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: PipelinePhase) {}
    fn dataset_encoded(&self, _dataset: &str, _records: usize) {}
    fn log_info(&self, _message: &str) {}
    fn finish(&self) {}
}

#[derive(Debug, Default)]
struct Stats {
    datasets: Vec<(String, usize)>,
    start_time: Option<std::time::Instant>,
}

impl Stats {
    fn started() -> Self {
        Self {
            start_time: Some(std::time::Instant::now()),
            ..Default::default()
        }
    }

    fn print_summary(&self) {
        let duration = self.start_time.map(|t| t.elapsed()).unwrap_or_default();

        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        for (dataset, records) in &self.datasets {
            eprintln!("   📄 {dataset:<22} {records} records");
        }
        eprintln!("   ⏱️  Duration:   {:.2}s", duration.as_secs_f64());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

/// A simple reporter that just prints to stderr (for non-TTY).
pub struct SimpleReporter {
    stats: RwLock<Stats>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self {
            stats: RwLock::new(Stats::started()),
        }
    }
}

impl Default for SimpleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: PipelinePhase) {
        match phase {
            PipelinePhase::Failed(e) => eprintln!("❌ Failed: {e}"),
            phase => eprintln!("{}", phase.message()),
        }
    }

    fn dataset_encoded(&self, dataset: &str, records: usize) {
        if let Ok(mut stats) = self.stats.write() {
            stats.datasets.push((dataset.to_owned(), records));
        }
        eprintln!("   ✓ {dataset}: {records} records");
    }

    fn log_info(&self, message: &str) {
        eprintln!("ℹ️  {message}");
    }

    fn finish(&self) {
        if let Ok(stats) = self.stats.read() {
            stats.print_summary();
        }
    }
}

/// Spinner reporter (for TTY).
pub struct FancyReporter {
    phase_bar: indicatif::ProgressBar,
    stats: RwLock<Stats>,
}

impl FancyReporter {
    pub fn new() -> Self {
        let phase_bar = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")
        {
            phase_bar.set_style(style);
        }
        phase_bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self {
            phase_bar,
            stats: RwLock::new(Stats::started()),
        }
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: PipelinePhase) {
        match phase {
            PipelinePhase::Failed(e) => {
                self.phase_bar.finish_with_message(format!("❌ Failed: {e}"));
            }
            PipelinePhase::Completed => {
                self.phase_bar
                    .finish_with_message(PipelinePhase::Completed.message());
            }
            phase => self.phase_bar.set_message(phase.message()),
        }
    }

    fn dataset_encoded(&self, dataset: &str, records: usize) {
        if let Ok(mut stats) = self.stats.write() {
            stats.datasets.push((dataset.to_owned(), records));
        }
        self.phase_bar
            .set_message(format!("🔧 Encoding datasets... ({dataset}: {records})"));
    }

    fn log_info(&self, message: &str) {
        self.phase_bar.println(format!("ℹ️  {message}"));
    }

    fn finish(&self) {
        self.phase_bar.finish_and_clear();
        if let Ok(stats) = self.stats.read() {
            stats.print_summary();
        }
    }
}

/// Create an appropriate reporter based on terminal capabilities.
pub fn create_reporter() -> Arc<dyn ProgressReporter> {
    if indicatif::ProgressDrawTarget::stderr().is_hidden() {
        Arc::new(SimpleReporter::new())
    } else {
        Arc::new(FancyReporter::new())
    }
}
