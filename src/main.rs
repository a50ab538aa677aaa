use clap::Parser;
use callcache::cli::{Cli, Commands};
use callcache::types::config::{Config, LogFormat};
use callcache::CacheResult;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> CacheResult<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let config = if cli.config.exists() {
        Config::load(&cli.config).unwrap_or_else(|e| {
            eprintln!("Aviso: configuração inválida ({}), usando padrão", e);
            Config::default_config()
        })
    } else {
        Config::default_config()
    };

    // Determine log level: CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.to_lowercase()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("callcache={}", log_level)
            .parse()
            .unwrap_or_else(|_| "callcache=info".parse().expect("fallback directive is valid")),
    );

    match config.general.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => {
            callcache::cli::commands::init(path)?;
        }
        Commands::List => {
            callcache::cli::commands::list(&config)?;
        }
        Commands::Show { identity } => {
            callcache::cli::commands::show(&identity, &config)?;
        }
        Commands::Clear { identity } => {
            callcache::cli::commands::clear(identity.as_deref(), &config)?;
        }
        Commands::Verify { prune } => {
            callcache::cli::commands::verify(prune, &config)?;
        }
        Commands::Version => {
            callcache::cli::commands::version();
        }
    }

    Ok(())
}
