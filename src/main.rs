//! `guardlab` - guardrail pipelines and a learning thermostat
//!
//! Thin host around `guardlab-core`: loads the config, runs requests through
//! the audited pipeline, and prints decisions and audit trails.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use console::Style;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use crate::approval::TerminalApproval;
use crate::cli::{Cli, Commands};
use crate::tracing_setup::{init_subscriber, Verbosity};
use guardlab_core::audit::{AuditFilter, AuditSink};
use guardlab_core::config::{AuditBackend, Config};
use guardlab_core::estimator::{compare, EstimatorConfig, PreferenceEstimator};
use guardlab_core::guard::{
    AuditedPipeline, PipelineDecision, PipelineState, Request, RiskLevel, Stage, Tier, ToolCall,
};
use guardlab_core::output::OutputFormatter;
use guardlab_core::GuardError;
use tracing::error;

mod approval;
mod cli;
mod scenarios;
mod tracing_setup;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet));

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let formatter = OutputFormatter::new();

    match cli.command {
        Commands::Thermostat {
            readings,
            learning_rate,
        } => {
            handle_thermostat(&config, &readings, learning_rate, &formatter)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            input,
            tools,
            output,
            interactive,
            json,
        } => {
            let mut request = Request::new(input);
            request.tool_calls = tools;
            request.output = output;
            let decision = handle_check(&config, &request, interactive)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                formatter.print_decision(&decision);
            }
            Ok(exit_code(&decision))
        }
        Commands::Demo => {
            handle_demo(&config, &formatter)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Audit {
            tier,
            state,
            min_risk,
            since_minutes,
            json,
        } => {
            let filter = AuditFilter {
                tier,
                state,
                min_risk,
                since: since_minutes.map(|m| Utc::now() - chrono::Duration::minutes(m)),
            };
            handle_audit(&config, &filter, json, &formatter)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Soak { workers, requests } => {
            handle_soak(&config, workers, requests).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// 0 approved, 1 blocked, 2 still escalated
fn exit_code(decision: &PipelineDecision) -> ExitCode {
    match decision.state() {
        PipelineState::Blocked => ExitCode::from(1),
        PipelineState::Escalated => ExitCode::from(2),
        _ => ExitCode::SUCCESS,
    }
}

/// Log the full error and keep only the user-facing message
fn user_facing(err: GuardError) -> anyhow::Error {
    error!(error = %err, "guardlab operation failed");
    anyhow!(err.user_message())
}

fn audited_pipeline(config: &Config) -> Result<AuditedPipeline> {
    let pipeline = config.build_pipeline().context("Invalid pipeline configuration")?;
    let sink = config.audit.open_sink().map_err(user_facing)?;
    Ok(AuditedPipeline::new(pipeline, sink))
}

fn handle_thermostat(
    config: &Config,
    readings: &[f64],
    learning_rate: Option<f64>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let estimator_config = EstimatorConfig {
        learning_rate: learning_rate.unwrap_or(config.estimator.learning_rate),
        ..config.estimator.clone()
    };
    let mut adaptive =
        PreferenceEstimator::new(&estimator_config).context("Invalid estimator settings")?;
    let mut fixed = config.thermostat;

    println!(
        "Static: heat below {:.1}, cool above {:.1}",
        fixed.heat_below, fixed.cool_above
    );
    println!(
        "Adaptive: start {:.1}, tolerance ±{}, learning rate {}",
        estimator_config.initial_value, estimator_config.tolerance, estimator_config.learning_rate
    );

    let rows = compare(readings, &mut fixed, &mut adaptive);
    formatter.print_comparison(&rows);
    formatter.print_snapshot(&adaptive.snapshot());
    Ok(())
}

fn handle_check(config: &Config, request: &Request, interactive: bool) -> Result<PipelineDecision> {
    let audited = audited_pipeline(config)?;
    let decision = if interactive {
        audited.evaluate_with(request, &TerminalApproval::new())
    } else {
        audited.evaluate(request)
    };
    decision.map_err(user_facing)
}

fn handle_demo(config: &Config, formatter: &OutputFormatter) -> Result<()> {
    let bold = Style::new().bold();
    let pipeline = config
        .build_pipeline()
        .context("Invalid pipeline configuration")?
        .with_stage(Tier::Input, Stage::block_if_contains("ignore all previous instructions"));
    let sink = config.audit.open_sink().map_err(user_facing)?;
    let audited = AuditedPipeline::new(pipeline, Arc::clone(&sink));
    let started = Utc::now();

    for (i, scenario) in scenarios::all().into_iter().enumerate() {
        println!();
        println!("{}", bold.apply_to(format!("=== {}. {} ===", i + 1, scenario.title)));
        println!("Input: {}", scenario.request.input);
        let decision = audited.evaluate(&scenario.request).map_err(user_facing)?;
        formatter.print_decision(&decision);
    }

    println!();
    println!("{}", bold.apply_to("Audit trail:"));
    let records: Vec<_> = sink
        .iterate(&AuditFilter::all().since(started))
        .map_err(user_facing)?
        .collect();
    formatter.print_audit(&records);
    Ok(())
}

fn handle_audit(
    config: &Config,
    filter: &AuditFilter,
    json: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    if config.audit.backend == AuditBackend::Memory {
        eprintln!("Audit backend is in-memory; set [audit] backend = \"journal\" to keep records");
        return Ok(());
    }
    let sink = config.audit.open_sink().map_err(user_facing)?;

    let mut count = 0;
    for record in sink.iterate(filter).map_err(user_facing)? {
        if json {
            println!("{}", serde_json::to_string(&record)?);
        } else {
            println!("{}", formatter.format_audit_record(&record));
        }
        count += 1;
    }
    if !json {
        println!("{} record(s)", count);
    }
    Ok(())
}

async fn handle_soak(config: &Config, workers: usize, requests: usize) -> Result<()> {
    if workers == 0 {
        bail!("--workers must be at least 1");
    }
    let audited = audited_pipeline(config)?;
    let sink: Arc<dyn AuditSink> = Arc::clone(audited.sink());
    let before = sink.iterate(&AuditFilter::all()).map_err(user_facing)?.count();
    let canned: Arc<Vec<Request>> = Arc::new(
        scenarios::all()
            .into_iter()
            .map(|s| s.request)
            .chain(std::iter::once(
                Request::new("Archive the logs").with_tool(ToolCall::new("file_write")),
            ))
            .collect(),
    );

    let started = Instant::now();
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let audited = audited.clone();
        let canned = Arc::clone(&canned);
        handles.push(tokio::task::spawn_blocking(move || -> Result<[usize; 3]> {
            let mut counts = [0usize; 3];
            for i in 0..requests {
                let request = &canned[(worker + i) % canned.len()];
                let decision = audited.evaluate(request).map_err(user_facing)?;
                let slot = match decision.state() {
                    PipelineState::Approved => 0,
                    PipelineState::Blocked => 1,
                    _ => 2,
                };
                counts[slot] += 1;
            }
            Ok(counts)
        }));
    }

    let mut totals = [0usize; 3];
    for handle in handles {
        let counts = handle.await.context("Soak worker panicked")??;
        for (total, count) in totals.iter_mut().zip(counts) {
            *total += count;
        }
    }
    let elapsed = started.elapsed();

    let recorded = sink.iterate(&AuditFilter::all()).map_err(user_facing)?.count() - before;
    let high = sink
        .iterate(&AuditFilter::all().min_risk(RiskLevel::High))
        .map_err(user_facing)?
        .count();
    println!(
        "{} runs in {:.2?}: {} approved, {} blocked, {} escalated",
        workers * requests,
        elapsed,
        totals[0],
        totals[1],
        totals[2]
    );
    println!("{} audit record(s) appended ({} high risk in trail)", recorded, high);
    if recorded != workers * requests {
        bail!(
            "audit trail has {} new records for {} decisions",
            recorded,
            workers * requests
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_error_drops_internal_detail() {
        let err = user_facing(GuardError::AuditUnavailable {
            reason: "write to /dev/full failed: No space left on device (os error 28)".to_string(),
        });
        assert_eq!(err.chain().count(), 1);
        let shown = format!("{:#}", err);
        assert!(!shown.contains("/dev/full"));
        assert_eq!(shown, "The request could not be recorded and was not processed.");
    }

    #[test]
    fn test_exit_codes_follow_state() {
        let pipeline = guardlab_core::guard::ValidationPipeline::standard();
        let approved = pipeline.run(&Request::new("Summarize the quarterly report"));
        let blocked = pipeline.run(&Request::new("x").with_tool(ToolCall::new("system_command")));
        let escalated = pipeline.run(&Request::new("Send it").with_tool(ToolCall::new("email_send")));
        let code = |decision: &PipelineDecision| format!("{:?}", exit_code(decision));
        assert_eq!(code(&approved), format!("{:?}", ExitCode::SUCCESS));
        assert_eq!(code(&blocked), format!("{:?}", ExitCode::from(1)));
        assert_eq!(code(&escalated), format!("{:?}", ExitCode::from(2)));
    }
}
