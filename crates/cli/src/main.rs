mod backend;
mod config;
mod policy;
mod serve;
mod submit;

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use provisioner_aws::{aws_registry, AwsContext};

use crate::backend::Backend;
use crate::config::{Overrides, ServerConfig};

/// Provisions cloud resources on request and records every request.
#[derive(Parser)]
#[command(
    name = "provisioner",
    version,
    about = "Request-driven cloud resource provisioner"
)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Path to a TOML configuration file
    #[arg(long, env = "PROVISIONER_CONFIG")]
    config: Option<PathBuf>,
    /// DynamoDB table holding request records
    #[arg(long, env = "PROVISIONER_TABLE")]
    table: Option<String>,
    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        #[command(flatten)]
        common: CommonArgs,
        /// Port to listen on
        #[arg(long, env = "PROVISIONER_PORT")]
        port: Option<u16>,
        /// The single origin allowed to call the service from a browser
        #[arg(long, env = "PROVISIONER_ALLOWED_ORIGIN")]
        allowed_origin: Option<String>,
        /// Name of the secret holding the API key (enables authentication)
        #[arg(long, env = "PROVISIONER_API_KEY_SECRET")]
        api_key_secret: Option<String>,
        /// Create nothing; return the handles that would have been created
        #[arg(long)]
        dry_run: bool,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Provision services once and print the resulting record as JSON
    Submit {
        #[command(flatten)]
        common: CommonArgs,
        /// Comma-separated service tags, e.g. object-store,rest-api
        #[arg(long, required = true, value_delimiter = ',')]
        services: Vec<String>,
        /// Extra request field as key=value (value may be JSON); repeatable
        #[arg(long)]
        extra: Vec<String>,
        /// Create nothing; return the handles that would have been created
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the IAM policy this deployment needs
    Policy {
        #[command(flatten)]
        common: CommonArgs,
        /// Name of the secret holding the API key
        #[arg(long, env = "PROVISIONER_API_KEY_SECRET")]
        api_key_secret: Option<String>,
        /// Print the policy for the role assumed by this service tag instead
        #[arg(long)]
        routine: Option<String>,
    },
}

fn init_logging(quiet: bool) {
    let default_level = if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(common: &CommonArgs, overrides: Overrides) -> Result<ServerConfig> {
    let config = ServerConfig::load(common.config.as_deref())?.apply(Overrides {
        table_name: common.table.clone(),
        region: common.region.clone(),
        ..overrides
    });
    Ok(config)
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Serve {
            common,
            port,
            allowed_origin,
            api_key_secret,
            dry_run,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                bail!("--tls-cert and --tls-key must both be provided");
            }
            let config = load_config(
                &common,
                Overrides {
                    port,
                    allowed_origin,
                    api_key_secret,
                    ..Overrides::default()
                },
            )?;
            let backend = Backend::build(&config, dry_run).await?;
            serve::start_server(config, backend, tls_cert, tls_key).await
        }
        Commands::Submit {
            common,
            services,
            extra,
            dry_run,
        } => {
            let config = load_config(&common, Overrides::default())?;
            let backend = Backend::build(&config, dry_run).await?;
            let provisioned = submit::run_submit(&backend, &services, &extra).await?;
            println!("{}", serde_json::to_string_pretty(&provisioned.record)?);
            Ok(())
        }
        Commands::Policy {
            common,
            api_key_secret,
            routine,
        } => {
            let config = load_config(
                &common,
                Overrides {
                    api_key_secret,
                    ..Overrides::default()
                },
            )?;
            config.validate()?;
            let ctx = AwsContext::new(&config.region).await;
            let registry = aws_registry(&ctx, &config.registry_options()).await?;
            let document = match routine {
                Some(tag) => match policy::routine_policy_document(&registry, &tag) {
                    Some(document) => document,
                    None => bail!("unknown service tag '{}'", tag),
                },
                None => policy::policy_document(&registry, &config),
            };
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run(cli.command)) {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}
