//! camlink-ctl: command-line interface for a camlink link.

mod cmd;

use anyhow::{Context, Result};

use camlink_core::config::CamlinkConfig;
use camlink_services::CommandClient;
use camlink_services::socket::resolve;

fn print_usage(config: &CamlinkConfig) {
    println!("Usage: camlink-ctl [options] <command>");
    println!();
    println!("Commands:");
    println!("  move <dir>    Move the producer's cursor (left, right, up, down)");
    println!("  sync          Read the producer's cursor without moving it");
    println!("  stats         Show the viewer's stream statistics");
    println!("  coords        Show the viewer's copy of the cursor");
    println!();
    println!("Options:");
    println!(
        "  --host <host>       Producer / viewer host (default: {})",
        config.network.command_host
    );
    println!(
        "  --port <port>       Command channel port (default: {})",
        config.network.command_port
    );
    println!(
        "  --api-port <port>   Viewer HTTP port (default: {})",
        config.network.api_port
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = CamlinkConfig::read_file(&CamlinkConfig::file_path())
        .unwrap_or_default()
        .resolve()
        .context("invalid configuration")?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut host = config.network.command_host.clone();
    let mut port = config.network.command_port;
    let mut api_port = config.network.api_port;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                host = args.get(i).context("--host requires a value")?.clone();
            }
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--api-port" => {
                i += 1;
                api_port = args
                    .get(i)
                    .context("--api-port requires a value")?
                    .parse()
                    .context("--api-port must be a number")?;
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    let command_client = || -> Result<CommandClient> {
        let addr = resolve(&format!("{host}:{port}"))
            .with_context(|| format!("cannot resolve {host}:{port}"))?;
        Ok(CommandClient::new(addr, config.command.client_timeout()))
    };

    match remaining.as_slice() {
        ["move", dir] => cmd::command::cmd_move(&command_client()?, dir).await,
        ["sync"] => cmd::command::cmd_sync(&command_client()?).await,
        ["stats"] | [] => cmd::status::cmd_stats(&host, api_port).await,
        ["coords"] => cmd::status::cmd_coords(&host, api_port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage(&config);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            print_usage(&config);
            std::process::exit(1);
        }
    }
}
