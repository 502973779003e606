// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

mod args;
mod ops;

use anyhow::Result;
use clap::Parser;
use std::process::exit;

use args::{Commands, NetcellCtlCli};
use ops::{handle_start, handle_stop};

#[tokio::main]
async fn real_main() -> Result<()> {
    let cli = NetcellCtlCli::parse();

    let level = logging::level_from_str(&cli.log_level).map_err(anyhow::Error::msg)?;
    let (logger, _async_guard) = logging::create_term_logger(level);
    let _scope_guard = slog_scope::set_global_logger(logger);

    match cli.command {
        Commands::Start(args) => handle_start(args).await,
        Commands::Stop(args) => handle_stop(args).await,
    }
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("ERROR: {:#}", e);
        exit(1);
    }
}
