//! CLI argument parsing using clap 4.x derive macros

use clap::{Parser, Subcommand};
use guardlab_core::guard::{PipelineState, RiskLevel, Tier, ToolCall};
use std::path::PathBuf;

/// Guardrail pipelines, audit trails and a learning thermostat
///
/// Runs requests through the input, tool and output tiers, records every
/// decision, and compares a fixed-threshold thermostat with an adaptive one.
#[derive(Parser, Debug)]
#[command(name = "guardlab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ./guardlab.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare the static and adaptive thermostats over a series of readings
    Thermostat {
        /// Readings, comma separated
        #[arg(short, long, value_delimiter = ',', default_values_t = vec![19.0, 20.0, 21.0, 20.5, 21.5, 22.0, 26.0, 17.5])]
        readings: Vec<f64>,

        /// Override the configured learning rate
        #[arg(long)]
        learning_rate: Option<f64>,
    },

    /// Run one request through the pipeline
    Check {
        /// User input
        input: String,

        /// Requested tool call, `name` or `name:{json arguments}` (repeatable)
        #[arg(short, long = "tool", value_parser = parse_tool_call)]
        tools: Vec<ToolCall>,

        /// Generated output to validate
        #[arg(short, long)]
        output: Option<String>,

        /// Ask for approval when the run escalates
        #[arg(short, long)]
        interactive: bool,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the built-in scenarios through the configured pipeline
    Demo,

    /// List recorded decisions
    Audit {
        #[arg(long)]
        tier: Option<Tier>,

        /// approved, blocked or escalated
        #[arg(long)]
        state: Option<PipelineState>,

        #[arg(long)]
        min_risk: Option<RiskLevel>,

        /// Only records from the last N minutes
        #[arg(long)]
        since_minutes: Option<i64>,

        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Run many concurrent pipelines against one shared audit sink
    Soak {
        #[arg(short, long, default_value_t = 4)]
        workers: usize,

        /// Requests per worker
        #[arg(short, long, default_value_t = 50)]
        requests: usize,
    },
}

/// Parse `name` or `name:{json}`
pub fn parse_tool_call(raw: &str) -> Result<ToolCall, String> {
    let (name, args) = match raw.split_once(':') {
        Some((name, args)) => (name.trim(), Some(args.trim())),
        None => (raw.trim(), None),
    };
    if name.is_empty() {
        return Err("tool name is empty".to_string());
    }
    let call = ToolCall::new(name);
    match args {
        Some(args) if !args.is_empty() => serde_json::from_str(args)
            .map(|value| call.with_arguments(value))
            .map_err(|e| format!("invalid tool arguments: {}", e)),
        _ => Ok(call),
    }
}
