use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ocrmcp::utils::LoggingConfig;
use ocrmcp::{Dispatcher, ServerConfig, ToolServer};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "ocrmcp", version, about = "Captcha recognition tool server", author)]
struct Cli {
    /// JSON config file; OCRMCP_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve JSON-RPC tool calls over stdin/stdout
    Serve,
    /// Print the tool discovery list
    Tools {
        /// Print one line instead of indented JSON
        #[arg(long)]
        compact: bool,
    },
    /// Run a single tool call and print its envelope
    Call {
        name: String,
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggingConfig::init();

    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Serve => handle_serve(config).await?,
        Command::Tools { compact } => handle_tools(config, compact)?,
        Command::Call { name, args } => handle_call(config, &name, &args).await?,
    }
    Ok(())
}

async fn handle_serve(config: ServerConfig) -> anyhow::Result<()> {
    let server = Arc::new(ToolServer::from_config(config)?);
    server.serve_stdio().await?;
    Ok(())
}

fn handle_tools(config: ServerConfig, compact: bool) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::from_config(config)?;
    println!("{}", render_tools(&dispatcher, compact)?);
    Ok(())
}

fn render_tools(dispatcher: &Dispatcher, compact: bool) -> serde_json::Result<String> {
    let tools = dispatcher.list_tools();
    if compact {
        serde_json::to_string(&tools)
    } else {
        serde_json::to_string_pretty(&tools)
    }
}

async fn handle_call(config: ServerConfig, name: &str, args: &str) -> anyhow::Result<()> {
    let arguments: Value =
        serde_json::from_str(args).with_context(|| format!("`--args` is not valid JSON: {args}"))?;
    let format = config.response_format;
    let dispatcher = Dispatcher::from_config(config)?;
    let result = dispatcher.call(name, arguments).await;
    println!("{}", result.render(format));
    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools_flag(argv: &[&str]) -> bool {
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Tools { compact } => compact,
            _ => panic!("expected the tools subcommand"),
        }
    }

    #[test]
    fn tools_output_is_indented_unless_compact() {
        assert!(!tools_flag(&["ocrmcp", "tools"]));
        assert!(tools_flag(&["ocrmcp", "tools", "--compact"]));

        let dispatcher = Dispatcher::from_config(ServerConfig::default()).unwrap();
        let indented = render_tools(&dispatcher, false).unwrap();
        let compact = render_tools(&dispatcher, true).unwrap();
        assert!(indented.contains('\n'));
        assert!(!compact.contains('\n'));
        assert_eq!(
            serde_json::from_str::<Value>(&indented).unwrap(),
            serde_json::from_str::<Value>(&compact).unwrap()
        );
    }
}
