//! irccdctl: one-shot control client for irccd (spec §6.4, §15).

mod cli;
mod connection;

use irccd_protocol::CommandRequest;
use irccd_util::{init_logging, LogConfig};

use cli::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    let _ = init_logging(LogConfig::cli(args.verbose));

    match run(&args).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("irccdctl: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(args: &Args) -> irccd_util::Result<serde_json::Value> {
    let (stream, transport_password) = connection::connect(args).await?;
    let (name, frame) = args.command.to_frame();
    let request = CommandRequest { command: name.to_string(), args: frame };

    let response =
        irccd::transport::outbound::send_one_shot(stream, transport_password.as_deref(), request).await?;
    if !response.status {
        return Err(irccd_util::IrccdError::Protocol(
            response.error.unwrap_or_else(|| "command failed".to_string()),
        ));
    }
    Ok(serde_json::to_value(&response).unwrap_or_default())
}
