//! # tarodb
//!
//! `tarodb` inspects the address book database of a Taro daemon: the receive addresses it
//! handed out and the on-chain events funding them. Output is JSON on stdout, logs go to
//! stderr and are filtered with `RUST_LOG`.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), commands::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    commands::run(cli::App::parse()).await
}
