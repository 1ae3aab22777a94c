use std::env;
use std::sync::Arc;

use anyhow::Context;
use chat_api::{ChatApiClient, RetryNotice};
use clap::Parser;
use session_store::{ErrorLog, SessionStore};
use skill_agent::cli::Cli;
use skill_agent::config::AgentConfig;
use skill_agent::controller::{ControllerOptions, ControllerParts, ConversationController, Flow};
use skill_agent::logging;
use skill_agent::operator::{Console, Operator, OperatorEvent};
use skill_host::{ScriptRunner, SkillRoots};
use udiff_engine::UdiffEngine;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AgentConfig::from_env()?;
    logging::init(&config.log_path())
        .with_context(|| format!("failed to open {}", config.log_path().display()))?;

    let console = Arc::new(Console::new(config.color).context("failed to start the input reader")?);
    let operator: Arc<dyn Operator> = console.clone();

    let retry_operator = Arc::clone(&operator);
    let client = ChatApiClient::new(config.chat_api())?.with_retry_observer(Arc::new(
        move |notice: &RetryNotice| {
            retry_operator.emit(OperatorEvent::Diagnostic(format!(
                "Retrying in {:?}... (Attempt {}/{}): {}",
                notice.delay, notice.retry, notice.max_retries, notice.reason
            )));
        },
    ));

    let project_root = env::current_dir().context("failed to read the working directory")?;
    let roots = SkillRoots::new(&project_root, Some(config.core_skills.clone()))
        .with_context(|| format!("failed to resolve {}", project_root.display()))?;
    let engine = UdiffEngine::new(roots.project_root(), roots.core_skills())?;
    let runner = ScriptRunner::new(roots, config.outputs_dir());

    let mut controller = ConversationController::new(ControllerParts {
        provider: Arc::new(client),
        operator: Arc::clone(&operator),
        engine,
        runner,
        store: SessionStore::for_project(&project_root),
        error_log: ErrorLog::for_project(&project_root),
        options: ControllerOptions {
            approval: cli.approval(),
            commit: cli.commit_mode(),
            fast_model: config.fast_model.clone(),
        },
    });
    if cli.resume {
        controller.resume()?;
    }

    #[cfg(unix)]
    let _interrupts = skill_agent::signals::install(controller.turns(), Arc::clone(&operator))
        .context("failed to install the interrupt handler")?;

    let profile = controller.profile();
    tracing::info!(
        provider = %profile.provider_id,
        model = %profile.model_id,
        root = %project_root.display(),
        "session started"
    );
    operator.emit(OperatorEvent::Notice(format!(
        "skill_agent {} ({} via {}), {} skills loaded. Type /help for commands.",
        env!("CARGO_PKG_VERSION"),
        profile.model_id,
        profile.provider_id,
        controller.registry().len()
    )));

    loop {
        let input = match controller.take_pending_input() {
            Some(queued) => {
                console.echo(&queued);
                queued
            }
            None => match console.read_prompt() {
                Some(line) => line,
                None => break,
            },
        };
        if controller.handle_input(&input)? == Flow::Exit {
            break;
        }
    }

    tracing::info!("session ended");
    Ok(())
}
