//! Captally - traffic capture aggregation
//!
//! A CLI tool that runs packet-analysis tools over a folder of capture
//! files and aggregates their text output into one report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments or config, working directory setup,
//!       report could not be written)
//!   2 - Some capture files failed and --fail-on-errors was set

mod analysis;
mod cli;
mod config;
mod domains;
mod error;
mod models;
mod parsers;
mod pipeline;
mod report;
mod scanner;
mod tools;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use domains::{Canonicalizer, NoopResolver, ReverseResolver, SystemResolver};
use models::{Analysis, ReportMetadata};
use pipeline::{Pipeline, Workspace};
use scanner::{CaptureFile, CaptureScanner, ScanConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tools::{SystemRunner, ToolRunner, Toolchain};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read before logging so its verbose setting applies
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    info!("Captally v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .captally.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set tool paths, local networks, DNS and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG`, when set, takes precedence over the flags.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let installed = match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())
        }
        Err(_) => {
            tracing::subscriber::set_global_default(builder.with_max_level(level).finish())
        }
    };

    installed.expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref config_path) => Config::load(config_path)?,
        None => Config::load_default()?.unwrap_or_default(),
    };

    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}

/// Canonicalizer for domain roll-ups; resolves through DNS unless disabled.
fn build_canonicalizer(config: &Config) -> Canonicalizer {
    let resolver: Arc<dyn ReverseResolver> = if config.dns.enabled {
        Arc::new(SystemResolver::new())
    } else {
        info!("Reverse DNS disabled; IP addresses are reported as-is");
        Arc::new(NoopResolver)
    };

    Canonicalizer::new(
        resolver,
        Duration::from_millis(config.dns.timeout_ms),
        config.dns.concurrency,
    )
}

/// Run the complete analysis workflow. Returns exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let analysis = args.analysis().context("No analysis selected")?;
    let input = args.dir.clone().context("No capture folder given")?;

    // Step 1: Find the capture files
    let capture_scanner = CaptureScanner::new(input.clone(), ScanConfig::from(&config.scanner));
    let files = match args.file {
        Some(ref name) => vec![capture_scanner.single(name)?],
        None => capture_scanner.scan()?,
    };

    println!(
        "📂 {} capture file(s) in {}",
        files.len(),
        input.display()
    );
    if files.is_empty() {
        warn!("No capture files found in {}", input.display());
    }

    // Step 2: Working directory; failing here aborts the run
    let workspace = Workspace::create(config.general.work_dir.as_deref())?;

    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);
    let mut pipeline = Pipeline::new(runner, Toolchain::from(&config))
        .concurrency(config.general.concurrency)
        .show_progress(!args.quiet);
    if analysis.canonicalizes_hosts() {
        pipeline = pipeline.canonicalizer(build_canonicalizer(&config));
    }

    // Handle --dry-run: print the commands and exit
    if args.dry_run {
        handle_dry_run(&pipeline, analysis, &files, &workspace);
        workspace.finish(false)?;
        return Ok(0);
    }

    // Step 3: Run the tools and aggregate
    println!("🔬 Running {} analysis...", analysis);
    let outcome = pipeline.run(analysis, &files, &workspace).await;

    // Step 4: Build and save the report
    let duration = start_time.elapsed().as_secs_f64();
    let metadata = ReportMetadata {
        analysis: analysis.to_string(),
        input: input.display().to_string(),
        generated_at: Utc::now(),
        files_processed: outcome.files_processed,
        files_failed: outcome.files_failed(),
        malformed_lines: outcome.malformed_lines,
        duration_seconds: duration,
    };
    let report = report::build_report(analysis, &outcome.store, metadata);

    let output = report::output_path(
        analysis,
        args.format,
        args.output.as_deref(),
        &config.general.output_dir,
    );
    let written = report::write_report(&report, args.format, &output);

    match workspace.finish(config.general.keep_temp) {
        Ok(Some(kept)) => println!("   Working files kept in {}", kept.display()),
        Ok(None) => {}
        Err(e) => warn!("{:#}", e),
    }
    written?;

    // Print summary
    println!("\n📊 Summary:");
    println!("   Files processed: {}", outcome.files_processed);
    if outcome.files_failed() > 0 {
        println!("   Files failed: {}", outcome.files_failed());
        for failure in &outcome.failures {
            println!("     - {}: {}", failure.name, failure.reason);
        }
    }
    if outcome.malformed_lines > 0 {
        println!("   Malformed lines skipped: {}", outcome.malformed_lines);
    }
    println!("   Rows: {}", report.rows.len());
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Report saved to: {}", output.display());

    if args.fail_on_errors && outcome.files_failed() > 0 {
        eprintln!(
            "\n⛔ {} capture file(s) failed. Failing (exit code 2).",
            outcome.files_failed()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: print the commands each capture would run.
fn handle_dry_run(
    pipeline: &Pipeline,
    analysis: Analysis,
    files: &[CaptureFile],
    workspace: &Workspace,
) {
    println!("\n🔍 Dry run: {} analysis (no tools are run)...", analysis);
    println!("   Working directory: {}\n", workspace.path().display());

    if files.is_empty() {
        println!("   No capture files found.");
    }

    for file in files {
        println!("   📄 {} ({} bytes)", file.name, file.size);
        for step in pipeline.plan_for(analysis, file, workspace).steps {
            println!("      $ {}", step);
        }
    }

    println!("\n✅ Dry run complete. No tools were run.");
}
