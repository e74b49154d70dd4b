//! torrentd-rpc: command-line client for the torrent daemon.

use clap::{Parser, Subcommand};
use tracing::info;

use torrentd_rpc::config::Config;
use torrentd_rpc::telemetry::setup_telemetry;
use torrentd_rpc::{DaemonClient, DateEncoding, ServiceProxy, Value};

/// Build version (injected at compile time).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Status keys requested by the `status` subcommand.
const STATUS_KEYS: &[&str] = &[
    "name",
    "state",
    "progress",
    "download_payload_rate",
    "upload_payload_rate",
    "eta",
];

#[derive(Parser)]
#[command(name = "torrentd-rpc", about = "JSON/XML-RPC client for the torrent daemon", version)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the methods the daemon exposes
    Methods,
    /// Call a method; parameters are JSON literals, bare words are strings
    Call {
        method: String,
        params: Vec<String>,
    },
    /// Show daemon version and torrent status
    Status {
        /// Torrent ids (the whole session when empty)
        torrents: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.config.validate()?;
    setup_telemetry(&cli.config);

    info!(
        version = VERSION,
        url = %cli.config.daemon_url,
        protocol = %cli.config.protocol,
        "Starting torrentd-rpc"
    );

    let options = cli.config.proxy_options()?;

    match cli.command {
        Command::Methods => {
            let proxy = ServiceProxy::connect(options).await?;
            for method in proxy.methods() {
                println!("{method}");
            }
        }
        Command::Call { method, params } => {
            let proxy = ServiceProxy::connect(options).await?;
            let params: Vec<Value> = params.iter().map(|raw| parse_param(raw)).collect();
            let result = proxy.call(&method, &params).await?;
            print_value(&result)?;
        }
        Command::Status { torrents } => {
            let client = DaemonClient::connect(options).await?;
            let version = client.daemon_version().await?;
            println!("daemon {version}");

            let ids = if torrents.is_empty() {
                client.session_state().await?
            } else {
                torrents
            };
            for id in &ids {
                let status = client.torrent_status(id, STATUS_KEYS).await?;
                println!("{id}:");
                print_value(&status)?;
            }
        }
    }

    Ok(())
}

/// Each parameter is parsed as a JSON literal; anything unparseable is
/// passed through as a bare string, so `call core.pause_torrent abc123`
/// works without quoting.
fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw)
        .map(Value::from_json)
        .unwrap_or_else(|_| Value::from(raw))
}

fn print_value(value: &Value) -> anyhow::Result<()> {
    let json = value.to_json(DateEncoding::Iso8601);
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
