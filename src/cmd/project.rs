//! Project initialization, status, reset, and policy commands.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    use buildsmith::init::init_project;

    let result = init_project(project_dir)?;

    if result.created {
        println!("Initialized buildsmith project at {}", result.state_dir.display());
        println!();
        println!("Created:");
        println!("  .buildsmith/");
        println!("  ├── spec.md          # What to build");
        println!("  ├── rules.md         # Constraints for every task");
        println!("  ├── buildsmith.toml  # Provider and build settings");
        println!("  └── context/         # Raw generation responses");
        println!();
        println!("Next steps:");
        println!("  1. Edit .buildsmith/spec.md with your project idea");
        println!("  2. Run `buildsmith build`");
    } else if result.files_created.is_empty() {
        println!(
            "Project already initialized at {}",
            result.state_dir.display()
        );
    } else {
        println!("Completed initialization at {}", result.state_dir.display());
        for file in &result.files_created {
            println!("  created {}", file.display());
        }
    }
    Ok(())
}

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use buildsmith::config::Config;
    use buildsmith::init::{has_spec, is_initialized};
    use buildsmith::orchestrator::{BuildStatus, StateStore, TaskStatus};

    println!();
    println!("Buildsmith Project Status");
    println!("=========================");
    println!();

    if !is_initialized(project_dir) {
        println!("Project: Not initialized");
        println!();
        println!("Run 'buildsmith init' to initialize the project.");
        println!();
        return Ok(());
    }

    let config = Config::new(project_dir.to_path_buf(), false)?;
    println!("Project: Initialized");
    println!(
        "Spec:    {}",
        if has_spec(&config.project_dir) {
            "Ready"
        } else {
            "Missing (edit .buildsmith/spec.md)"
        }
    );

    let state = StateStore::new(config.state_file.clone()).load()?;
    println!();
    if state.status == BuildStatus::NotStarted {
        println!("Build:   Not started");
        println!();
        println!("Run 'buildsmith build' to start.");
        println!();
        return Ok(());
    }

    println!("Build:   {} ({})", state.build_id, state.status);
    println!("Backend: {} / {}", state.provider, state.model);
    if let Some(started) = state.started_at {
        println!("Started: {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(completed) = state.completed_at {
        println!("Done:    {}", completed.format("%Y-%m-%d %H:%M:%S"));
    }

    if !state.tasks.is_empty() {
        println!();
        println!(
            "Tasks ({}/{} completed):",
            state.count_with_status(TaskStatus::Completed),
            state.tasks.len()
        );
        for task in &state.tasks {
            let status = match task.status {
                TaskStatus::Completed => style(task.status.to_string()).green(),
                TaskStatus::Failed => style(task.status.to_string()).red(),
                TaskStatus::InProgress => style(task.status.to_string()).yellow(),
                TaskStatus::Pending => style(task.status.to_string()).dim(),
            };
            println!("  {:<10} {:<12} {}", task.id, status, task.name);
            if let Some(ref error) = task.error {
                println!("             {}", style(error).red());
            }
        }
    }

    println!();
    println!("Files written: {}", state.files_written.len());
    if !state.errors.is_empty() {
        println!();
        println!("Errors ({}):", state.errors.len());
        for error in &state.errors {
            println!("  - {}", error);
        }
    }
    println!();
    Ok(())
}

pub fn cmd_reset(project_dir: &Path, force: bool) -> Result<()> {
    use buildsmith::config::Config;
    use buildsmith::init::is_initialized;
    use buildsmith::orchestrator::StateStore;
    use dialoguer::Confirm;

    if !is_initialized(project_dir) {
        println!("Nothing to reset");
        return Ok(());
    }
    let config = Config::new(project_dir.to_path_buf(), false)?;

    if !force {
        let confirm = Confirm::new()
            .with_prompt("This will delete all build progress. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    StateStore::new(config.state_file.clone()).reset()?;
    for file in [&config.decisions_file, &config.review_file] {
        if file.exists() {
            std::fs::remove_file(file)
                .with_context(|| format!("Failed to remove {}", file.display()))?;
        }
    }
    if config.context_dir.exists() {
        std::fs::remove_dir_all(&config.context_dir).with_context(|| {
            format!("Failed to remove {}", config.context_dir.display())
        })?;
    }

    println!("Reset complete. spec.md and rules.md preserved.");
    Ok(())
}

pub fn cmd_policy(project_dir: &Path) -> Result<()> {
    use buildsmith::config::Config;
    use buildsmith::firewall::FirewallPolicy;

    let config = Config::new(project_dir.to_path_buf(), false)?;
    let policy = FirewallPolicy::load_or_default(&config.policy_file)?;
    policy.compile()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&policy).context("Failed to serialize policy")?
    );
    Ok(())
}
