//! `ksef` — command-line interface over the KSeF SDK.
//!
//! Exit code 0 on success, 1 on any reported error. This binary is the only
//! place an error terminates the process; the SDK layer never does.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ksef::client::KsefClient;
use ksef::core::{
    InvoiceFormat, KsefConfig, KsefCredentials, KsefEnvironment, KsefError, check_well_formed,
};
use ksef::stub::{StubStore, serve};

#[derive(Debug, Parser)]
#[command(
    name = "ksef",
    version,
    about = "KSeF e-invoicing: send, track, and download invoices"
)]
struct Cli {
    /// Target environment.
    #[arg(long, global = true, default_value = "test")]
    env: String,
    /// Override the REST API base URL (e.g. a local stub server).
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit an invoice XML file.
    Send {
        /// Path to the invoice XML file.
        file: PathBuf,
        /// Taxpayer NIP (10 digits, formatting allowed).
        #[arg(long)]
        nip: String,
    },
    /// Query the processing status of a submitted invoice.
    Status {
        /// Assigned KSeF number.
        ksef_number: String,
        #[arg(long)]
        nip: String,
    },
    /// Download a processed invoice.
    Download {
        /// Assigned KSeF number.
        ksef_number: String,
        #[arg(long)]
        nip: String,
        /// Download format.
        #[arg(long, default_value = "pdf")]
        format: String,
        /// Output path. Defaults to the KSeF number with the format as
        /// extension.
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Check a local file for XML well-formedness. No network call.
    Validate {
        /// Path to the XML file.
        file: PathBuf,
    },
    /// Run the KSeF emulation service.
    StubServer {
        /// Port to listen on.
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("error: failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), KsefError> {
    let environment: KsefEnvironment = cli.env.parse()?;

    match cli.command {
        Command::Send { file, nip } => {
            let xml = std::fs::read_to_string(&file)?;
            let filename = file.file_name().map(|n| n.to_string_lossy().into_owned());
            let client = build_client(&nip, environment, cli.base_url.as_deref())?;

            let ksef_number = client.send_invoice(&xml, filename.as_deref()).await?;
            client.close().await;

            println!("Invoice sent successfully");
            println!("KSeF number: {ksef_number}");
        }

        Command::Status { ksef_number, nip } => {
            let client = build_client(&nip, environment, cli.base_url.as_deref())?;
            let status = client.get_status(&ksef_number).await?;
            client.close().await;

            println!("{ksef_number}: {status}");
        }

        Command::Download { ksef_number, nip, format, output } => {
            let format: InvoiceFormat = format.parse()?;
            let output = output.unwrap_or_else(|| default_output(&ksef_number, format));
            let client = build_client(&nip, environment, cli.base_url.as_deref())?;

            let path = client.download(&ksef_number, format, &output).await?;
            client.close().await;

            println!("Saved to {}", path.display());
        }

        Command::Validate { file } => {
            let xml = std::fs::read_to_string(&file)?;
            check_well_formed(&xml)?;
            println!("XML is well-formed: {}", file.display());
        }

        Command::StubServer { port } => {
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            serve(addr, Arc::new(StubStore::new())).await?;
        }
    }

    Ok(())
}

fn build_client(
    nip: &str,
    environment: KsefEnvironment,
    base_url: Option<&str>,
) -> Result<KsefClient, KsefError> {
    let credentials = KsefCredentials::new(nip, environment)?;
    let config = match base_url {
        Some(url) => KsefConfig::new(url, environment.soap_url())?,
        None => KsefConfig::for_environment(environment)?,
    };
    Ok(KsefClient::with_config(credentials, config))
}

/// `KSEF:2025:PL/123/ABC` + pdf → `KSEF_2025_PL_123_ABC.pdf`
fn default_output(ksef_number: &str, format: InvoiceFormat) -> PathBuf {
    let safe: String = ksef_number
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    PathBuf::from(format!("{safe}.{format}"))
}
