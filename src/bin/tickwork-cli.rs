//! Tickwork CLI - replay scripted sessions of the turn-signal program
//!
//! Provides subcommands for running an input script frame by frame and for
//! inspecting the program and its configuration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tickwork::ProcessorConfig;
use tickwork::blinker::{BlinkerConfig, BlinkerHost, FaultPolicy, FrameReport, ScriptStep, activities};

#[derive(Parser)]
#[command(name = "tickwork")]
#[command(about = "Synchronous reactive activity scheduler", long_about = None)]
struct Cli {
    /// Turn-signal configuration (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Processor configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    processor_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a script of input events, one line per frame
    Run {
        /// Script file: JSON array of {"events": [...], "frames": N}
        #[arg(short, long)]
        script: PathBuf,

        /// Idle frames to run after the script
        #[arg(long, default_value = "0")]
        frames: u32,

        /// Print frame reports as JSON lines
        #[arg(long)]
        json: bool,

        /// Print the activation tree after the last frame
        #[arg(long)]
        dump_tree: bool,

        /// Reset the program after a failed frame instead of halting
        #[arg(long)]
        restart_on_fault: bool,
    },

    /// Print the effective turn-signal configuration
    Config,

    /// List the activities of the turn-signal program
    Activities,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BlinkerConfig::load(path)?,
        None => BlinkerConfig::default(),
    };
    let processor_config = match &cli.processor_config {
        Some(path) => ProcessorConfig::load(path)?,
        None => ProcessorConfig::default(),
    };

    match cli.command {
        Commands::Run {
            script,
            frames,
            json,
            dump_tree,
            restart_on_fault,
        } => {
            let text = fs::read_to_string(&script)?;
            let mut steps: Vec<ScriptStep> = serde_json::from_str(&text)?;
            if frames > 0 {
                steps.push(ScriptStep {
                    events: Vec::new(),
                    frames,
                });
            }

            let policy = if restart_on_fault {
                FaultPolicy::Restart
            } else {
                FaultPolicy::Halt
            };
            let mut host =
                BlinkerHost::with_processor_config(config, processor_config)?.with_fault_policy(policy);

            for step in &steps {
                for event in &step.events {
                    host.apply(*event);
                }
                for _ in 0..step.frames {
                    match host.update() {
                        Ok(report) => print_report(&report, json)?,
                        Err(err) if policy == FaultPolicy::Restart => {
                            eprintln!("frame failed, program restarted: {}", err);
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }

            if dump_tree {
                let snapshot = host.processor().snapshot();
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Activities => {
            let registry = activities::registry(&config)?;
            for name in registry.names() {
                let definition = registry.get(name)?;
                println!(
                    "{}({}) -> ({})",
                    name,
                    definition.params.join(", "),
                    definition.outputs.join(", ")
                );
            }
        }
    }

    Ok(())
}

fn print_report(report: &FrameReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!(
            "tick {:>5}  left {}  right {}  lever {:<6}  angle {:>5.2}  wheel {:>7.1}",
            report.tick,
            lamp(report.left_lit),
            lamp(report.right_lit),
            format!("{:?}", report.lever_pos).to_lowercase(),
            report.lever_angle,
            report.wheel_offset
        );
    }
    Ok(())
}

fn lamp(lit: bool) -> &'static str {
    if lit { "*" } else { "." }
}
