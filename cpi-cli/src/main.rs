use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use serde_json::json;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cpi_lib::auth;
use cpi_lib::chunk::{self, ChunkNode};
use cpi_lib::{ConvertConfig, CpiParts, Pack};

/// Convert PPF expansion packs into installable CPI containers.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a PPF file into a CPI file.
    Convert {
        /// The PPF file to read.
        input: PathBuf,
        /// Output path. Defaults to the input path with a .cpi extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// JSON file with model_name, install_id and optional device_id.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Target keyboard model name.
        #[arg(short, long)]
        model: Option<String>,
        /// Install identifier, decimal or 0x-prefixed hex.
        #[arg(short, long, value_parser = parse_install_id)]
        install_id: Option<u32>,
        /// Lock the output to this device identifier.
        #[arg(short, long)]
        device_id: Option<String>,
    },
    /// Show the chunk structure of a PPF or CPI file.
    Inspect {
        file: PathBuf,
        /// Print JSON instead of an indented tree.
        #[arg(long)]
        json: bool,
    },
    /// Print the key material derived from a device identifier.
    DeviceKey { id: String },
}

fn parse_install_id(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex_digits) => u32::from_str_radix(hex_digits, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid install id '{value}': {e}"))
}

/// Install the global subscriber: stderr always, plus `log_file` when given.
/// The returned guard flushes the file writer on drop, so keep it until exit.
fn init_logging(log_file: Option<&Path>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    // -v/-q pick the default level; RUST_LOG directives take precedence
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    let (file_writer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = open_log_writer(path)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false).without_time())
        .with(file_layer)
        .init();

    if let Some(path) = log_file {
        debug!(path = %path.display(), "File logging enabled");
    }
    Ok(guard)
}

fn open_log_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file = File::create(path).with_context(|| format!("Failed to create log file {}", path.display()))?;
    Ok(tracing_appender::non_blocking(file))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file.as_deref(), &cli.verbose)?;

    let result = match cli.command {
        Command::Convert {
            input,
            output,
            config,
            model,
            install_id,
            device_id,
        } => run_convert(&input, output, config, model, install_id, device_id),
        Command::Inspect { file, json } => run_inspect(&file, json),
        Command::DeviceKey { id } => run_device_key(&id),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Bytes> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    Ok(Bytes::from(data))
}

/// Merge the optional JSON config with command-line overrides.
fn resolve_config(
    config_path: Option<PathBuf>,
    model: Option<String>,
    install_id: Option<u32>,
    device_id: Option<String>,
) -> Result<ConvertConfig> {
    let file_config = config_path
        .map(|path| ConvertConfig::load(&path).with_context(|| format!("Failed to load config {:?}", path)))
        .transpose()?;

    let model_name = match (model, &file_config) {
        (Some(model), _) => model,
        (None, Some(c)) => c.model_name.clone(),
        (None, None) => bail!("No model name given; pass --model or --config"),
    };
    let install_id = match (install_id, &file_config) {
        (Some(id), _) => id,
        (None, Some(c)) => c.install_id,
        (None, None) => bail!("No install id given; pass --install-id or --config"),
    };

    let mut config = ConvertConfig::new(model_name, install_id);
    config.device_id = device_id.or(file_config.and_then(|c| c.device_id));
    Ok(config)
}

fn run_convert(
    input: &Path,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    model: Option<String>,
    install_id: Option<u32>,
    device_id: Option<String>,
) -> Result<()> {
    let config = resolve_config(config_path, model, install_id, device_id)?;
    let output = output.unwrap_or_else(|| input.with_extension("cpi"));

    let ppf = read_input(input)?;
    let pack = Pack::from_bytes(&ppf);
    if !pack.is_complete() {
        warn!(path = ?input, "Converting an incomplete pack");
    }

    let cpi = cpi_lib::build_encrypted_cpi(
        &pack,
        &config.model_name,
        config.install_id,
        config.device_id.as_deref(),
    )
    .context("Failed to build CPI container")?;

    std::fs::write(&output, &cpi).with_context(|| format!("Failed to write {:?}", output))?;
    info!(
        input = ?input,
        output = ?output,
        blobs = pack.blobs.len(),
        data_bytes = pack.total_data_len(),
        "Wrote CPI file"
    );
    Ok(())
}

fn print_tree(nodes: &[ChunkNode], depth: usize) {
    for node in nodes {
        println!("{:indent$}{} ({} bytes)", "", node.tag, node.length, indent = depth * 2);
        print_tree(&node.children, depth + 1);
    }
}

fn run_inspect(path: &Path, as_json: bool) -> Result<()> {
    let data = read_input(path)?;

    // A CPI payload is ciphertext, so only the clear header and CSEC are shown
    match CpiParts::parse(&data) {
        Ok(parts) => {
            let header = ChunkNode::from(&parts.header);
            let csec = ChunkNode::from(&parts.csec);
            if as_json {
                let value = json!({
                    "format": "cpi",
                    "model_name": parts.model_name(),
                    "install_id": parts.install_id(),
                    "locked": !parts.is_unlocked(),
                    "payload_len": parts.payload.len(),
                    "chunks": [header, csec],
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("CPI container");
                println!("  Model:      {}", parts.model_name().unwrap_or_default());
                match parts.install_id() {
                    Some(id) => println!("  Install id: {id} (0x{id:08x})"),
                    None => println!("  Install id: <missing>"),
                }
                println!("  Locked:     {}", !parts.is_unlocked());
                println!("  Payload:    {} encrypted bytes", parts.payload.len());
                print_tree(&[header, csec], 1);
            }
        }
        Err(e) => {
            info!("Not a CPI container ({}); reading as PPF", e);
            let pack = Pack::from_bytes(&data);
            let tree = chunk::decode_tree(&data);
            if as_json {
                let value = json!({
                    "format": "ppf",
                    "pack": pack,
                    "chunks": tree,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("PPF pack \"{}\" ({})", pack.title, pack.uid);
                for blob in &pack.blobs {
                    println!(
                        "  {} \"{}\" .{} {} bytes{}",
                        blob.uid,
                        blob.title,
                        blob.extension,
                        blob.data.len(),
                        blob.icon_code.as_deref().map(|c| format!(" icon={c}")).unwrap_or_default()
                    );
                }
                print_tree(&tree, 1);
            }
        }
    }
    Ok(())
}

fn run_device_key(id: &str) -> Result<()> {
    let slot = auth::derive_key_slot(id).context("Failed to derive device key")?;
    println!("Key slot:     {slot}");
    println!("3DES key:     {}", hex::encode(auth::expand_key(&slot)));
    Ok(())
}
