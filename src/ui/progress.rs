use crate::ui::icons::{
    BUILD, CHECK, CROSS, FILE_NEW, FIX, FOLDER, PLAN, RESUME, REVIEW, SHIELD, SPARKLE, WARN,
};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Terminal UI for a build, rendered via `indicatif` progress bars.
///
/// Three bars are stacked vertically:
/// - Task bar: how many planned tasks have finished
/// - Activity spinner: the collaborator call currently in flight
/// - File bar: running tally of files written and candidates blocked
pub struct BuildUI {
    multi: MultiProgress,
    task_bar: ProgressBar,
    activity: ProgressBar,
    file_bar: ProgressBar,
    verbose: bool,
    written: AtomicUsize,
    blocked: AtomicUsize,
}

impl BuildUI {
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let task_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let task_bar = multi.add(ProgressBar::new(0));
        task_bar.set_style(task_style);
        task_bar.set_prefix(" Tasks");

        let activity_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let activity = multi.add(ProgressBar::new_spinner());
        activity.set_style(activity_style);
        activity.set_prefix("   Now");

        let file_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {msg}")
            .expect("progress bar template is a valid static string");

        let file_bar = multi.add(ProgressBar::new(0));
        file_bar.set_style(file_style);
        file_bar.set_prefix(" Files");

        let ui = Self {
            multi,
            task_bar,
            activity,
            file_bar,
            verbose,
            written: AtomicUsize::new(0),
            blocked: AtomicUsize::new(0),
        };
        ui.refresh_files();
        ui
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    fn refresh_files(&self) {
        self.file_bar.set_message(format!(
            "{}{} written | {} blocked",
            FOLDER,
            style(self.written.load(Ordering::SeqCst)).green(),
            style(self.blocked.load(Ordering::SeqCst)).red(),
        ));
    }

    pub fn print_header(&self, build_id: &str, provider: &str, model: &str) {
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{} Build {} using {} ({})",
            style("▶").green().bold(),
            style(build_id).yellow().bold(),
            provider,
            style(model).dim()
        ));
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line("");
    }

    pub fn show_resume(&self, build_id: &str, done: usize, total: usize) {
        self.print_line(format!(
            "{}Resuming build {} ({}/{} tasks done)",
            RESUME,
            style(build_id).yellow(),
            done,
            total
        ));
    }

    /// Start the spinner for a collaborator call.
    pub fn start_activity(&self, msg: &str) {
        self.activity.set_message(msg.to_string());
        self.activity.enable_steady_tick(Duration::from_millis(100));
    }

    /// Update the spinner with a short status; printed as a dim line in verbose mode.
    pub fn log_step(&self, msg: &str) {
        self.activity.set_message(format!("{}", style(msg).dim()));
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    pub fn stop_activity(&self) {
        self.activity.disable_steady_tick();
        self.activity.set_message("");
    }

    pub fn plan_started(&self) {
        self.print_line(format!("{}{}", PLAN, style("Planning").bold()));
        self.start_activity("waiting for planner");
    }

    pub fn plan_ready(&self, task_count: usize) {
        self.stop_activity();
        self.task_bar.set_length(task_count as u64);
        self.print_line(format!(
            "  {} Plan ready: {} tasks",
            CHECK,
            style(task_count).cyan()
        ));
    }

    /// Size the task bar for a resumed build.
    pub fn set_tasks(&self, total: usize, done: usize) {
        self.task_bar.set_length(total as u64);
        self.task_bar.set_position(done as u64);
    }

    pub fn task_started(&self, index: usize, total: usize, name: &str) {
        self.task_bar
            .set_message(format!("{}", style(name).yellow()));
        self.print_line(format!(
            "{}Task {}/{}: {}",
            BUILD,
            index + 1,
            total,
            style(name).bold()
        ));
        self.start_activity("generating");
    }

    pub fn file_written(&self, path: &str) {
        self.written.fetch_add(1, Ordering::SeqCst);
        self.refresh_files();
        if self.verbose {
            self.print_line(format!("    {}{}", FILE_NEW, style(path).green()));
        }
    }

    pub fn file_blocked(&self, path: &str, reason: &str) {
        self.blocked.fetch_add(1, Ordering::SeqCst);
        self.refresh_files();
        self.print_line(format!(
            "    {}{} {}",
            SHIELD,
            style(path).red(),
            style(format!("({})", reason)).dim()
        ));
    }

    pub fn task_complete(&self, files: usize) {
        self.stop_activity();
        self.task_bar.inc(1);
        self.print_line(format!("  {} {} files", CHECK, style(files).green()));
    }

    pub fn task_failed(&self, reason: &str) {
        self.stop_activity();
        self.task_bar.inc(1);
        self.print_line(format!("  {} {}", CROSS, style(reason).red()));
    }

    pub fn review_started(&self, files: usize) {
        self.print_line(format!(
            "{}{} {} files",
            REVIEW,
            style("Reviewing").bold(),
            files
        ));
        self.start_activity("waiting for reviewer");
    }

    pub fn review_issue(&self, severity: &str, file: &str, message: &str) {
        let tag = if severity == "error" {
            style(severity.to_uppercase()).red().bold()
        } else {
            style(severity.to_uppercase()).yellow()
        };
        self.print_line(format!("    {} {}: {}", tag, style(file).cyan(), message));
    }

    pub fn fix_attempt(&self, file: &str) {
        self.log_step(&format!("fixing {}", file));
        self.print_line(format!("    {}Fixing {}", FIX, style(file).cyan()));
    }

    pub fn review_done(&self, passed: bool, errors: usize, warnings: usize) {
        self.stop_activity();
        if passed {
            self.print_line(format!("  {} Review passed", CHECK));
        } else {
            self.print_line(format!(
                "  {} Review found {} errors, {} warnings",
                WARN,
                style(errors).red(),
                style(warnings).yellow()
            ));
        }
    }

    pub fn warning(&self, msg: &str) {
        self.print_line(format!("{}{}", WARN, style(msg).yellow()));
    }

    pub fn paused(&self) {
        self.stop_activity();
        self.print_line(format!(
            "\n{} Build paused. Run `buildsmith build` again to resume.",
            style("⏸").yellow()
        ));
    }

    pub fn finish(&self, files: usize, errors: usize) {
        self.stop_activity();
        self.task_bar.finish();
        let summary = if errors == 0 {
            format!("{} Build complete: {} files", SPARKLE, style(files).green().bold())
        } else {
            format!(
                "{} Build complete: {} files, {} errors",
                SPARKLE,
                style(files).green().bold(),
                style(errors).red().bold()
            )
        };
        self.print_line(format!("\n{}\n", summary));
    }
}
