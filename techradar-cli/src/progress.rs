//! Console progress reporting for radar runs.

use techradar_core::radar::{RadarCallback, RadarPhase, StopReason};

/// Prints run progress to stderr so stdout carries only the final message.
pub struct ConsoleCallback {
    quiet: bool,
}

impl ConsoleCallback {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn print(&self, line: String) {
        if !self.quiet {
            eprintln!("{line}");
        }
    }
}

impl RadarCallback for ConsoleCallback {
    fn on_phase_change(&self, phase: RadarPhase) {
        let line = match phase {
            RadarPhase::Generating => "Generating search queries...",
            RadarPhase::Researching => "Researching...",
            RadarPhase::Extracting => "Extracting radar elements...",
            RadarPhase::Reflecting => "Reflecting on coverage...",
            RadarPhase::Finalizing => "Writing the radar report...",
            RadarPhase::Done => "Done.",
        };
        self.print(format!("  {line}"));
    }

    fn on_research_step_complete(&self, step_id: usize, query: &str, sources_found: usize) {
        self.print(format!(
            "    [{step_id}] {query} ({sources_found} sources)"
        ));
    }

    fn on_elements_extracted(&self, proposed: usize, total: usize, target: usize) {
        self.print(format!(
            "    {proposed} proposed, {total}/{target} unique elements"
        ));
    }

    fn on_reflection(&self, loop_count: usize, progress_percentage: f64, is_sufficient: bool) {
        let verdict = if is_sufficient { "sufficient" } else { "needs more" };
        self.print(format!(
            "    loop {loop_count}: {progress_percentage}% of target, {verdict}"
        ));
    }

    fn on_stop(&self, reason: StopReason) {
        self.print(format!("  Stopping research: {reason}"));
    }
}
