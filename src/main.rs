//! makegate CLI entry point
//!
//! Usage:
//!   makegate mcp                 Start MCP server over stdio
//!   makegate list [PATTERN]      List targets in the makefile
//!   makegate run <target>        Run one target through the gate
//!   makegate show                Print the makefile

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use makegate::cli::{
    commands::{ListArgs, OutputFormat, RunArgs, RunFormat},
    run_mcp_server, Cli, Commands, LogFormat,
};
use makegate::config::{load_config, Config};
use makegate::context::ServerContext;
use makegate::response::{render, CatalogResponse, RunTargetResponse};
use makegate::service::{ExecutionRequest, GateService};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Install the log subscriber; stdout is reserved for protocol and command output
fn init_tracing(verbose: bool, format: LogFormat) {
    let default = if verbose {
        "makegate=debug"
    } else {
        "makegate=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = resolve_config(&cli)?;
    let ctx = Arc::new(ServerContext::from_config(&config).context("Failed to start gate")?);

    match cli.command {
        Commands::Mcp => {
            run_mcp_server(ctx).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List(args) => list_targets(ctx, args).await,
        Commands::Run(args) => run_target(ctx, args).await,
        Commands::Show => show_makefile(ctx).await,
    }
}

/// Load layered configuration and apply command line overrides
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(ref makefile) = cli.make_path {
        config.server.makefile = Some(makefile.display().to_string());
    }
    if let Some(ref make) = cli.make_command {
        config.execution.make_command = make.clone();
    }
    if let Some(ref dir) = cli.working_dir {
        config.server.working_dir = dir.display().to_string();
    }
    if let Some(ref root) = cli.root {
        config.server.boundary_root = Some(root.display().to_string());
    }

    config.validate()?;
    Ok(config)
}

/// List targets in the makefile
async fn list_targets(ctx: Arc<ServerContext>, args: ListArgs) -> Result<ExitCode> {
    let service = GateService::new(ctx);
    let documented = args.documented.then_some(true);

    let response = service
        .list_targets(args.pattern.as_deref(), documented)
        .await
        .map_err(|e| anyhow::anyhow!(service.formatter().error(&e).error.message))?;

    match args.format {
        OutputFormat::Json => println!("{}", render(&response)),
        OutputFormat::Plain => {
            for target in &response.targets {
                println!("{}", target.name);
            }
        }
        OutputFormat::Table => print_catalog_table(&response),
    }

    Ok(ExitCode::SUCCESS)
}

fn print_catalog_table(response: &CatalogResponse) {
    if response.targets.is_empty() {
        println!("No targets found in {}", response.makefile);
        return;
    }

    println!(
        "{} ({} targets)",
        response.makefile.bold(),
        response.count
    );

    let width = response
        .targets
        .iter()
        .map(|t| t.name.len())
        .max()
        .unwrap_or(0);

    for target in &response.targets {
        let mut line = format!("  {}", format!("{:width$}", target.name, width = width).cyan());
        if let Some(ref desc) = target.description {
            line.push_str(&format!("  {}", desc));
        }
        if !target.dependencies.is_empty() {
            line.push_str(&format!(
                "  {}",
                format!("[{}]", target.dependencies.join(", ")).dimmed()
            ));
        }
        println!("{}", line);
    }

    if !response.duplicates.is_empty() {
        println!();
        println!(
            "{}: defined more than once: {}",
            "warning".yellow(),
            response.duplicates.join(", ")
        );
    }
}

/// Run one target and mirror its success in the exit status
async fn run_target(ctx: Arc<ServerContext>, args: RunArgs) -> Result<ExitCode> {
    let service = GateService::new(ctx);
    let mut request = ExecutionRequest::new(&args.target);
    request.timeout_seconds = args.timeout;

    let response = match service.run_target(&request).await {
        Ok(response) => response,
        Err(e) => {
            let rejected = service.formatter().error(&e);
            if args.format == RunFormat::Json {
                println!("{}", render(&rejected));
                return Ok(ExitCode::FAILURE);
            }
            return Err(match rejected.error.suggestion {
                Some(suggestion) => anyhow::anyhow!("{} ({})", rejected.error.message, suggestion),
                None => anyhow::anyhow!(rejected.error.message),
            });
        }
    };

    match args.format {
        RunFormat::Json => println!("{}", render(&response)),
        RunFormat::Text => print_run_summary(&response),
    }

    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_run_summary(response: &RunTargetResponse) {
    print!("{}", response.output);
    if !response.output.is_empty() && !response.output.ends_with('\n') {
        println!();
    }

    let status = if response.success {
        "ok".green().bold()
    } else if response.timed_out {
        "timed out".red().bold()
    } else {
        "failed".red().bold()
    };
    eprintln!(
        "{}: {} (exit {}, {} ms{})",
        status,
        response.target,
        response.exit_code,
        response.duration_ms,
        if response.truncated {
            ", output truncated"
        } else {
            ""
        }
    );

    if let Some(suggestion) = response.error.as_ref().and_then(|e| e.suggestion.as_ref()) {
        eprintln!("{}: {}", "hint".cyan(), suggestion);
    }
}

/// Print the makefile being served
async fn show_makefile(ctx: Arc<ServerContext>) -> Result<ExitCode> {
    let service = GateService::new(ctx);
    let text = service
        .read_makefile()
        .await
        .map_err(|e| anyhow::anyhow!(service.formatter().error(&e).error.message))?;
    print!("{}", text);
    Ok(ExitCode::SUCCESS)
}
