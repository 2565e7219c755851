//! Schema Registry command line client
//!
//! ## Usage
//!
//! ```bash
//! # List subjects
//! sr-client --url http://localhost:8081 subjects
//!
//! # Fetch a schema and print its reference closure
//! sr-client resolve --subject orders-value --version 2
//!
//! # Register a schema that references another subject
//! sr-client register -s orders-value -f orders.avsc --reference Money=money:1
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use sr_client::{
    BoxError, ClientConfig, CreateSchemaRequest, SchemaInfo, SchemaReference,
    SchemaRegistryClient, SchemaType, SchemaVersion, TlsConfig,
};
use std::path::{Path, PathBuf};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sr-client")]
#[command(
    author,
    version,
    about = "Confluent-compatible Schema Registry client"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Schema registry URL
    #[arg(
        long,
        env = "SR_CLIENT_URL",
        default_value = "http://localhost:8081",
        global = true
    )]
    url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", global = true)]
    timeout_secs: u64,

    /// CA certificate (PEM) to trust
    #[arg(long, global = true)]
    ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List subjects
    Subjects,

    /// List versions of a subject
    Versions {
        /// Subject name
        #[arg(short, long)]
        subject: String,
    },

    /// Get schema by ID
    Get {
        /// Schema ID
        #[arg(short, long)]
        id: u32,
    },

    /// Get schema by subject and version
    GetVersion {
        /// Subject name
        #[arg(short, long)]
        subject: String,

        /// Version (default: latest)
        #[arg(short, long)]
        version: Option<u32>,
    },

    /// Show the registry mode
    Mode,

    /// Register a schema
    Register {
        /// Subject name
        #[arg(short, long)]
        subject: String,

        /// Schema file path
        #[arg(short = 'f', long)]
        file: PathBuf,

        /// Schema type (avro, json, protobuf)
        #[arg(short = 't', long, default_value = "avro")]
        schema_type: SchemaType,

        /// Schema reference as name=subject:version (repeatable)
        #[arg(short, long = "reference", value_parser = parse_reference)]
        references: Vec<SchemaReference>,
    },

    /// Fetch a schema and walk its references
    Resolve {
        /// Subject name
        #[arg(short, long)]
        subject: String,

        /// Version (default: latest)
        #[arg(short, long)]
        version: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let client = SchemaRegistryClient::new(client_config(&cli))
        .with_context(|| format!("Failed to create client for {}", cli.url))?;

    match cli.command {
        Commands::Subjects => list_subjects(&client).await,
        Commands::Versions { subject } => list_versions(&client, &subject).await,
        Commands::Get { id } => get_schema(&client, id).await,
        Commands::GetVersion { subject, version } => {
            get_schema_version(&client, &subject, version.into()).await
        }
        Commands::Mode => show_mode(&client).await,
        Commands::Register {
            subject,
            file,
            schema_type,
            references,
        } => register_schema(&client, &subject, &file, schema_type, references).await,
        Commands::Resolve { subject, version } => {
            resolve_schema(&client, &subject, version.into()).await
        }
    }
}

fn client_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::new(&cli.url).with_timeout_secs(cli.timeout_secs);
    if cli.ca_cert.is_some() || cli.insecure {
        let mut tls = TlsConfig::default().with_insecure_skip_verify(cli.insecure);
        if let Some(ca) = &cli.ca_cert {
            tls = tls.with_ca_cert(ca);
        }
        config = config.with_tls(tls);
    }
    config
}

/// Parse `name=subject:version`; the subject may itself contain `:`
fn parse_reference(s: &str) -> Result<SchemaReference, String> {
    let (name, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=subject:version, got '{}'", s))?;
    let (subject, version) = rest
        .rsplit_once(':')
        .ok_or_else(|| format!("missing version in reference '{}'", s))?;
    if name.is_empty() || subject.is_empty() {
        return Err(format!("empty name or subject in reference '{}'", s));
    }
    let version = version
        .parse::<u32>()
        .map_err(|e| format!("invalid version in reference '{}': {}", s, e))?;
    Ok(SchemaReference::new(name, subject, version))
}

async fn list_subjects(client: &SchemaRegistryClient) -> anyhow::Result<()> {
    let subjects = client.list_subjects().await?;
    println!("Subjects ({}):", subjects.len());
    for subject in subjects {
        println!("  - {}", subject);
    }
    Ok(())
}

async fn list_versions(client: &SchemaRegistryClient, subject: &str) -> anyhow::Result<()> {
    let versions = client.list_versions(subject).await?;
    println!("Versions of {} ({}):", subject, versions.len());
    for version in versions {
        println!("  - {}", version);
    }
    Ok(())
}

async fn get_schema(client: &SchemaRegistryClient, id: u32) -> anyhow::Result<()> {
    let info = client.schema_by_id(id).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

async fn get_schema_version(
    client: &SchemaRegistryClient,
    subject: &str,
    version: SchemaVersion,
) -> anyhow::Result<()> {
    let info = client.schema_by_subject_version(subject, version).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

async fn show_mode(client: &SchemaRegistryClient) -> anyhow::Result<()> {
    println!("{}", client.mode().await?);
    Ok(())
}

async fn register_schema(
    client: &SchemaRegistryClient,
    subject: &str,
    file: &Path,
    schema_type: SchemaType,
    references: Vec<SchemaReference>,
) -> anyhow::Result<()> {
    let schema_content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read schema file {}", file.display()))?;

    let payload = CreateSchemaRequest::new(schema_type, schema_content)
        .with_references(references)
        .to_payload()?;
    debug!(subject = %subject, bytes = payload.len(), "Registering schema");

    client.create_schema(subject, payload).await?;
    println!("✓ Schema registered successfully");
    println!("  Subject: {}", subject);
    println!("  Type: {}", schema_type);
    Ok(())
}

async fn resolve_schema(
    client: &SchemaRegistryClient,
    subject: &str,
    version: SchemaVersion,
) -> anyhow::Result<()> {
    let mut visited: Vec<(String, u32)> = Vec::new();
    let mut visitor = |name: &str, info: &SchemaInfo| -> Result<(), BoxError> {
        visited.push((name.to_string(), info.id));
        Ok(())
    };
    let root = client.resolve(subject, version, &mut visitor).await?;

    println!("{}@{} (id {})", subject, version, root.id);
    println!("References ({}):", visited.len());
    for (name, id) in visited {
        println!("  - {} (id {})", name, id);
    }
    Ok(())
}
