mod cli;

use clap::Parser;
use cli::{Cli, Commands, RangeArgs, RunArgs};
use filefx::config::Config;
use filefx::engine::Engine;
use filefx::handlers::{FileOutcome, HandlerDefaults, HandlerEvent, HandlerRegistry, HandlerSpec};
use filefx::observability::init_tracing;
use filefx::range::RangeSpec;
use filefx::scheduler::{TaskEvent, TaskEventKind};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, warn};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<ExitCode, AnyError> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone())?,
        None => Config::load()?,
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Run(args) => run(config, args).await,
        Commands::Handlers => handlers(config),
        Commands::Range(args) => range(args),
    }
}

async fn load_pipeline(path: &Path) -> Result<HandlerSpec, AnyError> {
    let text = tokio::fs::read_to_string(path).await?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        Ok(serde_json::from_str(&text)?)
    } else {
        Ok(HandlerSpec::from_toml(&text)?)
    }
}

fn print_event(event: &TaskEvent, json: bool) -> Result<(), AnyError> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    if let TaskEventKind::Handler(handler_event) = &event.kind {
        match handler_event {
            HandlerEvent::Status(text) => println!("{text}"),
            HandlerEvent::Finished { handler, summary } => println!("[{handler}] {summary}"),
            HandlerEvent::FileHandled { input, outcome, .. } => {
                if let FileOutcome::Failed(reason) = outcome {
                    eprintln!("failed: {}: {reason}", input.display());
                }
            }
            HandlerEvent::Started { .. } => {}
        }
    }
    Ok(())
}

async fn run(config: Config, args: RunArgs) -> Result<ExitCode, AnyError> {
    let spec = load_pipeline(&args.pipeline).await?;
    let engine = Engine::new(config)?;

    let mut events = engine.scheduler().subscribe();
    let id = engine.submit_paths(&spec, &args.inputs).await?;

    let json = args.json;
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if event.task_id != id => {}
                Ok(event) => {
                    if let Err(err) = print_event(&event, json) {
                        warn!(error = %err, "cannot print event");
                    }
                    if matches!(event.kind, TaskEventKind::StateChanged(state) if state.is_terminal()) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let snapshot = engine.scheduler().wait(id).await?;
    // the terminal event trails the state change; a lagged printer may miss it
    match tokio::time::timeout(Duration::from_secs(1), printer).await {
        Ok(Err(err)) => warn!(error = %err, "event printer stopped"),
        Ok(Ok(())) => {}
        Err(_) => warn!("event printer did not see the terminal event"),
    }

    if json {
        println!("{}", serde_json::to_string(&snapshot)?);
    }

    if snapshot.state.is_failure() {
        let reason = snapshot
            .failure
            .map(|reason| reason.to_string())
            .unwrap_or_else(|| snapshot.state.to_string());
        error!(task_id = %snapshot.id, %reason, "task failed");
        eprintln!("Failed: {reason}");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn handlers(config: Config) -> Result<ExitCode, AnyError> {
    let defaults = HandlerDefaults {
        naming: config.naming.template()?,
    };
    let registry = HandlerRegistry::with_defaults(defaults);
    println!("{}", serde_json::to_string_pretty(&registry.list())?);
    Ok(ExitCode::SUCCESS)
}

fn range(args: RangeArgs) -> Result<ExitCode, AnyError> {
    let spec = RangeSpec::parse(&args.expr)?;
    let values: Vec<String> = spec.expand(args.max).iter().map(u32::to_string).collect();
    println!("{}", values.join(","));
    Ok(ExitCode::SUCCESS)
}
