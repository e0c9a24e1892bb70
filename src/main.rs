use clap::Parser;
use tracing::Level;

use gantry::cli::commands::{CliArgs, Commands};
use gantry::cli::handlers;
use gantry::config::GantryConfig;
use gantry::util::logging::{self, LoggingConfig};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    let config = GantryConfig::default();
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let exit_code = match args.command {
        Commands::Render(render_args) => handlers::handle_render(render_args, &config),
        Commands::Lint(lint_args) => handlers::handle_lint(lint_args, &config),
        Commands::Build(build_args) => handlers::handle_build(build_args, &config).await,
        Commands::Variants(variants_args) => handlers::handle_variants(variants_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let env_level = std::env::var("GANTRY_LOG_LEVEL").ok();
    let level = resolve_level(
        args.quiet,
        args.verbose,
        args.log_level.as_deref(),
        env_level.as_deref(),
    );
    logging::init_logging(LoggingConfig::with_level(level));
}

/// Level precedence: `-q`, then `-v`, then `--log-level`, then
/// `GANTRY_LOG_LEVEL`, then INFO.
fn resolve_level(
    quiet: bool,
    verbose: bool,
    flag: Option<&str>,
    env_level: Option<&str>,
) -> Level {
    if quiet {
        return Level::ERROR;
    }
    if verbose {
        return Level::DEBUG;
    }
    flag.and_then(logging::parse_level)
        .or_else(|| env_level.and_then(logging::parse_level))
        .unwrap_or(Level::INFO)
}
