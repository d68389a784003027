//! `buildsmith build`: wire backends to the orchestrator and run it.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::super::Cli;

pub struct BuildOptions {
    pub feature: Option<String>,
    pub no_review: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
}

pub async fn cmd_build(project_dir: &Path, cli: &Cli, options: BuildOptions) -> Result<()> {
    use buildsmith::agents::{LlmCoder, LlmPlanner, LlmReviewer, Reviewer};
    use buildsmith::config::Config;
    use buildsmith::errors::BuildError;
    use buildsmith::init::{has_spec, is_initialized};
    use buildsmith::llm::create_client;
    use buildsmith::orchestrator::{BuildOrchestrator, Collaborators};
    use buildsmith::ui::BuildUI;

    if !is_initialized(project_dir) {
        anyhow::bail!("Project not initialized. Run 'buildsmith init' first.");
    }

    let config = Config::new(project_dir.to_path_buf(), cli.verbose)?.with_overrides(
        options.provider,
        options.model,
        options.no_review,
    );
    if !has_spec(&config.project_dir) {
        return Err(BuildError::MissingSpec {
            path: config.spec_file.clone(),
        }
        .into());
    }

    let ui = Arc::new(BuildUI::new(cli.verbose));
    for warning in config.settings.validate() {
        ui.warning(&warning);
    }

    let client = create_client(&config.settings.provider, |key| std::env::var(key).ok())
        .context("Failed to configure generation backend")?;
    let reviewer: Option<Arc<dyn Reviewer>> = if config.settings.build.review {
        Some(Arc::new(LlmReviewer::new(client.clone())))
    } else {
        None
    };
    let collaborators = Collaborators {
        planner: Arc::new(LlmPlanner::new(client.clone())),
        generator: Arc::new(LlmCoder::new(client)),
        reviewer,
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut orchestrator = BuildOrchestrator::new(config, collaborators)?.with_ui(ui);
    match orchestrator.run(options.feature.as_deref(), &cancel).await {
        Ok(()) => Ok(()),
        Err(err) if BuildError::is_cancellation(&err) => {
            tracing::info!("build paused by operator");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
