mod arg_parser;
mod client_cli;

use arg_parser::{ArgParser, SubCommand};
use client_cli::ClientCli;

use clap::Parser;
use std::error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    let args = ArgParser::parse();
    let client = ClientCli::new(&args.server, &args.token);

    match args.sub_command {
        SubCommand::Start { job } => client.start_job(&job).await?,
        SubCommand::Kill { id } => client.kill_job(id).await?,
        SubCommand::Status { id } => client.query_status(id).await?,
    }

    Ok(())
}
