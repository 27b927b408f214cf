use std::process::ExitCode;

use clap::Parser;
use common::{PushContext, PushResult, ReqwestTransport, Result, TransportConfig};
use log::*;

use crate::cli::Cli;

mod cli;
mod commands;

async fn execute(cli: Cli) -> Result<PushResult> {
    let config = TransportConfig {
        user_agent: cli.user_agent,
        timeout: cli.timeout,
    };
    debug!("transport config: {config:?}");
    let ctx = PushContext::new(ReqwestTransport::new(&config)?);
    commands::run(&ctx, cli.command).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(result) => {
            println!("{result}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
