use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use fx_client::{ChannelEventSource, ClientAnalysisState, ReconnectPolicy, StreamConsumer};
use fx_core::cancel::CancelToken;
use fx_core::collaborators::{AnalysisTask, MockGate, MockReporter, MockSynthesizer, MockTask};
use fx_core::config::EngineConfig;
use fx_core::engine::AnalysisEngine;
use fx_core::parser::HeuristicParser;
use fx_protocol::{AnalysisEvent, RunStage, SequencedEvent, TaskStatus, TradeAction};

/// Run a multi-stage trading analysis and stream its progress.
#[derive(Parser)]
#[command(name = "fx-agent", version, about)]
struct Cli {
    /// The analysis query, e.g. "Should I buy EUR/USD this week?"
    query: Vec<String>,

    /// Reject the run at the risk gate (demonstrates the short-circuit)
    #[arg(long)]
    risk_reject: bool,

    /// Force the named analysis task to fail; repeatable
    #[arg(long = "fail", value_name = "TASK")]
    fail: Vec<String>,

    /// Path to an engine configuration TOML file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

const TASKS: [(&str, u64); 3] = [("news", 300), ("technical", 500), ("fundamental", 700)];

fn build_engine(cli: &Cli, config: EngineConfig) -> AnalysisEngine {
    let gate = if cli.risk_reject {
        MockGate::rejecting("risk limits breached")
    } else {
        MockGate::approving()
    };

    let mut engine = AnalysisEngine::new(
        Arc::new(HeuristicParser),
        Arc::new(gate),
        Arc::new(MockSynthesizer::deciding(TradeAction::Buy, 0.8)),
        Arc::new(MockReporter::ok()),
    )
    .with_config(config);

    for (name, latency_ms) in TASKS {
        let task: Arc<dyn AnalysisTask> = if cli.fail.iter().any(|f| f == name) {
            Arc::new(MockTask::failing(name, "forced failure via --fail"))
        } else {
            Arc::new(
                MockTask::success(name).with_latency(Duration::from_millis(latency_ms)),
            )
        };
        engine = engine.with_task(task);
    }
    engine
}

fn render_event(sequenced: &SequencedEvent, _state: &ClientAnalysisState) {
    match &sequenced.event {
        AnalysisEvent::Start { query, .. } => {
            println!("{} {}", "▶".cyan(), query.bold());
        }
        AnalysisEvent::QueryParsed { pair, .. } => {
            println!("{} parsed pair {}", "•".cyan(), pair.bold());
        }
        AnalysisEvent::AgentStart { agent, .. } => {
            println!("  {} {}", agent.blue(), "started".dimmed());
        }
        AnalysisEvent::AgentProgress {
            agent,
            message,
            progress,
            ..
        } => {
            println!("  {} {:>3}% {}", agent.blue(), progress, message.dimmed());
        }
        AnalysisEvent::WebSearch { agent, queries, .. } => {
            println!(
                "  {} searched: {}",
                agent.blue(),
                queries.join(", ").dimmed()
            );
        }
        AnalysisEvent::AgentUpdate { agent, result } => {
            if result.success {
                println!("  {} {}", agent.blue(), "completed".green());
            } else {
                let reason = result.error.as_deref().unwrap_or("unknown");
                println!("  {} {}: {}", agent.blue(), "failed".red(), reason.red());
            }
        }
        AnalysisEvent::RiskUpdate { approved, .. } => {
            let verdict = if *approved {
                "approved".green()
            } else {
                "rejected".red()
            };
            println!("{} risk gate {}", "•".cyan(), verdict);
        }
        AnalysisEvent::Decision { decision } => {
            println!(
                "{} decision {} (confidence {:.2})",
                "•".cyan(),
                paint_action(decision.action),
                decision.confidence
            );
        }
        AnalysisEvent::ReportUpdate { report } => {
            if report.success {
                println!("{} report generated", "•".cyan());
            } else {
                let reason = report.error.as_deref().unwrap_or("unknown");
                println!("{} report failed: {}", "•".cyan(), reason.yellow());
            }
        }
        AnalysisEvent::Complete { .. } => {}
        AnalysisEvent::Error { error, .. } => {
            println!("{} {}", "✖".red(), error.red());
        }
    }
}

fn paint_action(action: TradeAction) -> colored::ColoredString {
    match action {
        TradeAction::Buy => "BUY".green().bold(),
        TradeAction::Sell => "SELL".red().bold(),
        TradeAction::Hold => "HOLD".yellow().bold(),
    }
}

fn render_summary(state: &ClientAnalysisState) {
    println!();
    println!("{}", "─".repeat(48).dimmed());

    if let Some(context) = &state.context {
        println!("{:<12} {}", "pair".dimmed(), context.pair.bold());
    }
    for task in state.tasks.values() {
        let status = match task.status {
            TaskStatus::Completed => "completed".green(),
            TaskStatus::Failed => "failed".red(),
            TaskStatus::Running => "running".yellow(),
            TaskStatus::Pending => "pending".dimmed(),
        };
        println!("{:<12} {}", task.name.dimmed(), status);
    }
    if let Some(decision) = &state.decision {
        println!(
            "{:<12} {} (confidence {:.2})",
            "decision".dimmed(),
            paint_action(decision.action),
            decision.confidence
        );
    }
    if let Some(report) = &state.report {
        if report.success {
            println!(
                "{:<12} {} words",
                "report".dimmed(),
                report.word_count.unwrap_or(0)
            );
        }
    }
    if let Some((error, category)) = &state.error {
        println!("{:<12} {} ({:?})", "error".dimmed(), error.red(), category);
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let query = if cli.query.is_empty() {
        "EUR/USD outlook".to_string()
    } else {
        cli.query.join(" ")
    };
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let engine = build_engine(&cli, config);
    let (tx, rx) = mpsc::channel(engine.channel_capacity());
    let engine_task = tokio::spawn(async move {
        engine.run(&query, tx, CancelToken::never()).await
    });

    let outcome = StreamConsumer::new(ChannelEventSource::new(rx), ReconnectPolicy::none())
        .with_observer(render_event)
        .run()
        .await;

    // Engine failures already arrived as an error event on the stream.
    let _ = engine_task.await;

    match outcome {
        Ok(state) => {
            render_summary(&state);
            if state.stage == RunStage::Failed {
                std::process::exit(1);
            }
            Ok(())
        }
        Err((state, err)) => {
            render_summary(&state);
            Err(color_eyre::eyre::eyre!(err))
        }
    }
}
