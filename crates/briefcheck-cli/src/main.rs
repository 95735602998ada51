//! Briefcheck CLI: end-to-end checks for the briefing wizard
//!
//! ## Usage
//!
//! ```bash
//! briefcheck list                                  # Show the scenario catalog
//! briefcheck run                                   # Run every scenario
//! briefcheck run briefing-export --headed          # One scenario, visible browser
//! briefcheck run -j 4 --format json --junit out.xml
//! briefcheck config --base-url http://staging:5173 # Effective configuration
//! ```

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use briefcheck::{scenarios, SessionLauncher};
use briefcheck_cli::{
    logging, render_listing, render_suite_text, resolve_harness_config, select, Cli, CliConfig,
    CliError, CliResult, ColorChoice, Commands, ConfigArgs, ListArgs, OutputFormat, RunArgs,
    ScenarioListing, SuiteRunner, Verbosity,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(&config)?;

    match cli.command {
        Commands::Run(ref args) => run_scenarios(&config, &cli, args),
        Commands::List(ref args) => run_list(args),
        Commands::Config(ref args) => run_config(&cli, args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
        .with_log_json(cli.log_json)
}

fn run_scenarios(config: &CliConfig, cli: &Cli, args: &RunArgs) -> CliResult<()> {
    let selection = select(&args.scenarios)?;
    let harness = resolve_harness_config(cli.config.as_deref(), &args.overrides)?;
    tracing::info!(
        base_url = %harness.base_url,
        scenarios = selection.len(),
        concurrency = harness.concurrency,
        "starting run"
    );

    let mut runner = SuiteRunner::new(config, &harness, launcher()?)?;
    let suite = runner.run(&selection);

    if let Some(path) = &args.junit {
        suite.write_junit(path)?;
    }
    match args.format {
        OutputFormat::Json => println!("{}", suite.to_json()?),
        OutputFormat::Text if !config.verbosity.is_quiet() => {
            print!("{}", render_suite_text(&suite, config.color.should_color()));
        }
        OutputFormat::Text => {}
    }

    if suite.all_passed() {
        Ok(())
    } else {
        Err(CliError::ScenarioFailures {
            failed: suite.failed_count(),
            total: suite.scenarios.len(),
        })
    }
}

#[cfg(feature = "browser")]
fn launcher() -> CliResult<Arc<dyn SessionLauncher>> {
    Ok(Arc::new(briefcheck::ChromiumLauncher::new()))
}

#[cfg(not(feature = "browser"))]
fn launcher() -> CliResult<Arc<dyn SessionLauncher>> {
    Err(CliError::BrowserUnavailable)
}

fn run_list(args: &ListArgs) -> CliResult<()> {
    let listings: Vec<ScenarioListing> = scenarios::all()
        .iter()
        .map(|s| ScenarioListing::of(s.as_ref()))
        .collect();
    let rendered = render_listing(&listings, args.format)
        .map_err(|e| CliError::config(format!("cannot render listing: {e}")))?;
    print!("{rendered}");
    if args.format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> CliResult<()> {
    let harness = resolve_harness_config(cli.config.as_deref(), &args.overrides)?;
    print!("{}", harness.to_yaml()?);
    Ok(())
}
