use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use cashid::{CashIdService, RootError, RootResult, ServiceConfig};
use cashid_core::{metadata, uri, MetadataCategory, NonceStore, Response};
use cashid_verify::{Ed25519Verifier, ValidationOutcome};

/// CashID: challenge–response authentication with Bitcoin Cash style
/// address signatures.
#[derive(Parser, Debug)]
#[command(name = "cashid", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Service domain
        #[arg(long)]
        domain: Option<String>,

        /// Service path, including the leading '/'
        #[arg(long)]
        path: Option<String>,
    },

    /// Build a challenge request URI
    Request {
        /// Action the client is asked to perform
        #[arg(short, long)]
        action: Option<String>,

        /// Opaque data carried with the challenge
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Decode a request URI and print its parts as JSON
    Decode {
        /// The cashid: URI
        uri: String,
    },

    /// Encode or decode metadata tokens
    Metadata {
        #[command(subcommand)]
        command: MetadataCommands,
    },

    /// Validate a signed response read from a JSON file
    Validate {
        /// File holding the response object
        file: PathBuf,

        /// Register the embedded request's nonce before validating, as if
        /// this service had issued it
        #[arg(long)]
        trust_request: bool,
    },
}

#[derive(Subcommand, Debug)]
enum MetadataCommands {
    /// Encode field names into a token
    Encode {
        /// Identity fields, comma separated
        #[arg(long, value_delimiter = ',')]
        identity: Vec<String>,

        /// Position fields, comma separated
        #[arg(long, value_delimiter = ',')]
        position: Vec<String>,

        /// Contact fields, comma separated
        #[arg(long, value_delimiter = ',')]
        contact: Vec<String>,
    },

    /// Decode a token into field names
    Decode {
        token: String,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("cashid=debug,cashid_core=debug,cashid_store=debug,cashid_verify=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cashid=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> RootResult<ServiceConfig> {
    match path {
        Some(p) => ServiceConfig::load(p),
        None => ServiceConfig::load(&ServiceConfig::default_config_path()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> RootResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        // Rejected response; the outcome has already been printed
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> RootResult<bool> {
    match cli.command {
        Commands::Init { domain, path } => cmd_init(cli.config.as_ref(), domain, path),
        Commands::Request { action, data } => {
            cmd_request(cli.config.as_ref(), action.as_deref(), data.as_deref())
        }
        Commands::Decode { uri } => cmd_decode(&uri),
        Commands::Metadata { command } => cmd_metadata(command),
        Commands::Validate {
            file,
            trust_request,
        } => cmd_validate(cli.config.as_ref(), &file, trust_request).await,
    }
}

fn cmd_init(
    config_path: Option<&PathBuf>,
    domain: Option<String>,
    path: Option<String>,
) -> RootResult<bool> {
    let mut config = load_config(config_path)?;
    if let Some(domain) = domain {
        config.domain = domain;
    }
    if let Some(path) = path {
        config.path = path;
    }
    config.validate()?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(ServiceConfig::default_config_path);
    config.save(&save_path)?;
    info!(path = %save_path.display(), "configuration written");

    println!("CashID configured.");
    println!("  Domain: {}", config.domain);
    println!("  Path:   {}", config.path);
    println!("  Config: {}", save_path.display());
    Ok(true)
}

fn cmd_request(
    config_path: Option<&PathBuf>,
    action: Option<&str>,
    data: Option<&str>,
) -> RootResult<bool> {
    let config = load_config(config_path)?;
    let built = config
        .builder()?
        .build(action, data, Some(&config.metadata))?;
    println!("{}", built.uri);
    Ok(true)
}

fn cmd_decode(input: &str) -> RootResult<bool> {
    let decoded = uri::parse(input)?;
    print_json(&decoded)?;
    Ok(true)
}

fn cmd_metadata(command: MetadataCommands) -> RootResult<bool> {
    match command {
        MetadataCommands::Encode {
            identity,
            position,
            contact,
        } => {
            let categories = [
                (MetadataCategory::Identity.name(), identity),
                (MetadataCategory::Position.name(), position),
                (MetadataCategory::Contact.name(), contact),
            ];
            let token = metadata::encode_names(categories.into_iter().map(|(category, fields)| {
                let fields: Vec<String> = fields.iter().map(|f| f.trim().to_string()).collect();
                (category.to_string(), fields)
            }))?;
            println!("{}", token);
        }
        MetadataCommands::Decode { token } => {
            let fields = metadata::decode(&token)?;
            print_json(&fields)?;
        }
    }
    Ok(true)
}

async fn cmd_validate(
    config_path: Option<&PathBuf>,
    file: &Path,
    trust_request: bool,
) -> RootResult<bool> {
    let config = load_config(config_path)?;
    let body = std::fs::read_to_string(file).map_err(RootError::Io)?;
    let service = CashIdService::with_in_memory_store(config, Arc::new(Ed25519Verifier::new()))?;

    let response = match Response::from_json(&body) {
        Ok(response) => response,
        Err(code) => {
            print_json(&ValidationOutcome::rejected(code).confirmation())?;
            return Ok(false);
        }
    };

    if trust_request {
        let nonce = uri::decode(&response.request)?.nonce;
        service
            .store()
            .issue(nonce, &response.request, service.config().nonce_ttl())?;
        info!(nonce = %nonce, "trusting embedded request");
    }

    let outcome = service.validate_with_configured_timeout(response).await;
    print_json(&outcome)?;
    Ok(outcome.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashid_verify::{address_for, sign_message};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cashid-cli-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cashid").chain(args.iter().copied())).unwrap()
    }

    #[tokio::test]
    async fn test_cli_decode() {
        let ok = run(cli(&["decode", "bitcoin:demo.example/api/auth?a=login&x=abc"])).await;
        assert!(ok.unwrap());

        let err = run(cli(&["decode", "cashid:no-path"])).await.unwrap_err();
        assert!(matches!(err, RootError::Uri(_)));
    }

    #[tokio::test]
    async fn test_cli_metadata_encode_and_decode() {
        let ok = run(cli(&["metadata", "encode", "--identity", "name,age", "--contact", "email"])).await;
        assert!(ok.unwrap());
        assert!(run(cli(&["metadata", "decode", "i14c1"])).await.unwrap());

        let err = run(cli(&["metadata", "encode", "--identity", "email"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RootError::Metadata(_)));
    }

    #[tokio::test]
    async fn test_cli_request_uses_config() {
        let dir = scratch_dir("request");
        let config_path = dir.join("config.toml");
        let config = config_path.to_str().unwrap();

        assert!(run(cli(&["--config", config, "init", "--domain", "demo.example"]))
            .await
            .unwrap());
        assert_eq!(ServiceConfig::load(&config_path).unwrap().domain, "demo.example");
        assert!(run(cli(&["--config", config, "request", "--action", "login"]))
            .await
            .unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_cli_validate_trusted_request() {
        let dir = scratch_dir("validate");
        let config = dir.join("missing.toml");
        let config = config.to_str().unwrap();

        let key = SigningKey::generate(&mut OsRng);
        let request = "cashid:localhost/api/cashid?x=123456789";
        let response = Response::new(
            request,
            address_for(&key.verifying_key()),
            sign_message(&key, request),
        );
        let file = dir.join("response.json");
        std::fs::write(&file, serde_json::to_string(&response).unwrap()).unwrap();
        let file = file.to_str().unwrap();

        // Without trust the nonce was never issued here
        assert!(!run(cli(&["--config", config, "validate", file])).await.unwrap());
        assert!(run(cli(&["--config", config, "validate", file, "--trust-request"]))
            .await
            .unwrap());

        std::fs::write(dir.join("broken.json"), "not json").unwrap();
        let broken = dir.join("broken.json");
        assert!(!run(cli(&["--config", config, "validate", broken.to_str().unwrap()]))
            .await
            .unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
