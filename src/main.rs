use clap::Parser;
use log::{debug, error, info, warn};
use logalert::alerts::{AlertPolicyService, Credentials, MonitoringClient};
use logalert::config::{Config, MonitoringConfig};
use logalert::error::{AppError, FetchError, MonitoringError};
use logalert::filters::ErrorFilter;
use logalert::pipeline::{self, Outcome};
use logalert::source::GitHubFetcher;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line arguments for the alert policy provisioner
#[derive(Parser)]
#[command(
    name = "logalert",
    about = "Provision a Cloud Monitoring alert policy from a log pattern file on GitHub",
    long_about = "Fetches a JSON log pattern file from a GitHub repository, derives log filters \
                  from its error entries and replaces the matching Cloud Monitoring alert policy \
                  so that it notifies a single channel when those errors appear."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Print the policy instead of submitting it
    #[arg(
        long,
        help = "Fetch and derive filters, print the resulting policy and exit without calling Cloud Monitoring"
    )]
    dry_run: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            if !config_path.exists() {
                return Err(format!(
                    "Configuration file not found: {}",
                    config_path.display()
                ));
            }
            if !config_path.is_file() {
                return Err(format!(
                    "Configuration path is not a file: {}",
                    config_path.display()
                ));
            }

            if let Some(extension) = config_path.extension() {
                if extension != "toml" {
                    warn!(
                        "Configuration file does not have .toml extension: {}",
                        config_path.display()
                    );
                }
            }
        }

        Ok(())
    }
}

/// Resolve credentials and open the Cloud Monitoring client
async fn connect_monitoring(
    config: &MonitoringConfig,
) -> Result<Arc<dyn AlertPolicyService>, MonitoringError> {
    let credentials = Credentials::resolve(config)?;
    debug!("Resolved monitoring credentials");
    let client = MonitoringClient::connect(config.endpoint.clone(), &credentials).await?;
    Ok(Arc::new(client))
}

/// Run the pipeline once according to the parsed arguments
async fn execute(cli: &Cli) -> Result<(), AppError> {
    let config = Config::load(cli.config.as_deref())?;
    info!(
        "Provisioning policy '{}' in project {}",
        config.monitoring.policy_name, config.monitoring.project_id
    );

    let fetcher =
        GitHubFetcher::with_base_url(config.source.token.clone(), config.source.base_url.clone())?;
    let outcome = pipeline::execute(&config, &fetcher, cli.dry_run, || {
        connect_monitoring(&config.monitoring)
    })
    .await?;

    match outcome {
        Outcome::Planned { prepared, policy } => {
            print_filters(&prepared.filters);
            match serde_json::to_string_pretty(&policy) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!("Could not render policy: {}", e),
            }
        }
        Outcome::Applied(report) => {
            print_filters(&report.filters);
            let outcome = &report.outcome;
            println!(
                "Alert policy '{}' {} ({} condition(s), {} removed)",
                outcome.policy.display_name,
                if outcome.updated { "updated" } else { "created" },
                outcome.policy.conditions.len(),
                outcome.deleted.len()
            );
            if let Some(name) = &outcome.policy.name {
                println!("  {}", name);
            }
        }
    }

    Ok(())
}

fn print_filters(filters: &[ErrorFilter]) {
    println!("Generated Error Filters:");
    for filter in filters {
        println!("  {}", filter);
    }
}

/// Log a failed run with a hint that fits the failing stage
fn report_failure(err: &AppError) {
    match err {
        AppError::Config(e) => error!("Invalid configuration: {}", e),
        AppError::Fetch(e @ (FetchError::MissingToken | FetchError::InvalidToken { .. })) => {
            error!("{}", e)
        }
        AppError::Fetch(e) => error!("Failed to fetch log pattern: {}", e),
        AppError::Document(e) => error!("Invalid log pattern document: {}", e),
        AppError::NoErrorLogs => error!("{}", err),
        AppError::Monitoring(MonitoringError::Credentials(e)) => {
            error!("Could not obtain Cloud Monitoring credentials: {}", e)
        }
        AppError::Monitoring(e) => error!("Cloud Monitoring request failed: {}", e),
    }
}

fn main() {
    let cli = Cli::parse();

    // A missing .env is the normal case.
    let dotenv_result = dotenvy::dotenv();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = dotenv_result {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(2);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(execute(&cli)) {
        report_failure(&e);
        std::process::exit(e.exit_code());
    }
}
