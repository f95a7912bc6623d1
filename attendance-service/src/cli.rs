// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Attendance Ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "attendance-node")]
#[command(version, about = "Tamper-evident attendance ledger node", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize node configuration
    Init(InitArgs),
    /// Boot the ledger and print its state
    Start(StartArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Data directory path
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Overwrite an existing config
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct StartArgs {
    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Data directory override
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
