//! `hotcast` command line.
//!
//! - `serve`: run the broadcaster in the foreground
//! - `notify`: ask the running broadcaster to push a reload
//! - `stop`: terminate the instance recorded in the PID file

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use hotcast_core::{HotcastError, ServerBuilder, ServerConfig, SignalFlags};
use hotcast_lifecycle::{stop_instance, InstanceGuard, Termination};
use hotcast_transport::{signals, write_trigger_file, HotcastServer, ReloadPayload};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hotcast", version, about = "Live-reload broadcaster over Server-Sent Events")]
struct Cli {
    /// TOML configuration file. Built-in defaults apply when omitted.
    #[arg(long, short, global = true, env = "HOTCAST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broadcaster until SIGINT or SIGTERM.
    Serve(ServeArgs),
    /// Request a reload through the trigger file.
    Notify(NotifyArgs),
    /// Stop the running broadcaster.
    Stop,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "HOTCAST_HOST")]
    host: Option<String>,

    #[arg(long, short, env = "HOTCAST_PORT")]
    port: Option<u16>,

    /// Path clients subscribe on.
    #[arg(long, env = "HOTCAST_PATH")]
    path: Option<String>,

    /// Domain naming the certificate pair `<domain>.crt` / `<domain>.key`.
    #[arg(long, env = "HOTCAST_DOMAIN")]
    domain: Option<String>,

    #[arg(long, env = "HOTCAST_CERT_DIR")]
    cert_dir: Option<PathBuf>,
}

#[derive(Args)]
struct NotifyArgs {
    /// Changed files. None means reload everything.
    files: Vec<String>,

    /// Extra field forwarded to clients. Values that parse as JSON are sent
    /// as JSON, anything else as a string.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    meta: Vec<(String, String)>,
}

fn parse_meta(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some(("files", _)) => Err("'files' is set by the positional arguments".to_string()),
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Serve(args) => serve(config, args),
        Commands::Notify(args) => notify(&config, args),
        Commands::Stop => stop(&config),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ServerConfig, HotcastError> {
    match path {
        Some(path) => ServerConfig::from_file(path),
        None => Ok(ServerConfig::default()),
    }
}

fn serve(config: ServerConfig, args: ServeArgs) -> Result<(), HotcastError> {
    let config = ServerBuilder::new()
        .with_config(config)
        .host(args.host)
        .port(args.port)
        .base_path(args.path)
        .domain(args.domain)
        .cert_dir(args.cert_dir)
        .build()?;

    let mut guard = InstanceGuard::acquire(&config.pid_file)?;
    let flags = SignalFlags::new();
    let handlers = signals::install(&flags)?;

    let mut reactor = HotcastServer::new(config).with_flags(flags).bind()?;
    guard.publish()?;

    let outcome = reactor.run();
    signals::uninstall(handlers);
    guard.release();
    outcome
}

fn notify(config: &ServerConfig, args: NotifyArgs) -> Result<(), HotcastError> {
    let mut payload = if args.files.is_empty() {
        ReloadPayload::everything()
    } else {
        ReloadPayload::for_files(args.files)
    };
    for (key, raw) in args.meta {
        let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
        payload = payload.with_meta(key, value);
    }

    write_trigger_file(&config.trigger_file, &payload)?;
    tracing::info!(
        "Queued reload of {:?} via {}",
        payload.files,
        config.trigger_file.display()
    );
    Ok(())
}

fn stop(config: &ServerConfig) -> Result<(), HotcastError> {
    match stop_instance(&config.pid_file, Termination::default())? {
        Some(pid) => tracing::info!("Stopped instance {}", pid),
        None => tracing::info!("No running instance recorded in {}", config.pid_file.display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_pairs_are_validated() {
        assert_eq!(parse_meta("build=42").unwrap(), ("build".into(), "42".into()));
        assert_eq!(parse_meta("note=a=b").unwrap(), ("note".into(), "a=b".into()));
        assert!(parse_meta("novalue").is_err());
        assert!(parse_meta("=x").is_err());
        assert!(parse_meta("files=a.js").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn notify_writes_trigger_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            trigger_file: dir.path().join("hotcast.reload"),
            ..ServerConfig::default()
        };
        let cli = Cli::parse_from(["hotcast", "notify", "app.js", "--meta", "build=7", "--meta", "who=ci"]);
        let Commands::Notify(args) = cli.command else {
            panic!("expected notify");
        };

        notify(&config, args).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&config.trigger_file).unwrap()).unwrap();
        assert_eq!(written, serde_json::json!({"files": ["app.js"], "build": 7, "who": "ci"}));
    }
}
