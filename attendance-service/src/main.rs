// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Attendance Ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.

mod cli;

use anyhow::{anyhow, Context, Result};
use attendance_service::{LedgerService, ServiceConfig};

fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cli::parse_cli();

    match &cli.command {
        cli::Commands::Init(args) => {
            let config_path = args
                .config
                .clone()
                .unwrap_or_else(ServiceConfig::default_config_path);

            if !args.force && config_path.exists() {
                return Err(anyhow!(
                    "config file already exists: {} (use --force to overwrite)",
                    config_path.display()
                ));
            }

            let mut cfg = ServiceConfig::default();
            if let Some(data_dir) = &args.data_dir {
                cfg.data_dir = data_dir.clone();
            }

            std::fs::create_dir_all(&cfg.data_dir).with_context(|| {
                format!("failed to create data_dir: {}", cfg.data_dir.display())
            })?;
            cfg.save_to_file(&config_path)?;

            println!(
                "init complete: config_path={}, data_dir={}",
                config_path.display(),
                cfg.data_dir.display()
            );
        }
        cli::Commands::Start(args) => {
            let config_path = args
                .config
                .clone()
                .unwrap_or_else(ServiceConfig::default_config_path);

            let mut cfg = if config_path.exists() {
                ServiceConfig::load_from_file(&config_path)?
            } else {
                ServiceConfig::default()
            };
            if let Some(data_dir) = &args.data_dir {
                cfg.data_dir = data_dir.clone();
            }

            let service = LedgerService::bootstrap(&cfg);
            let stats = service.stats();

            println!("state: {:?}", service.state());
            println!("{}", service.check_integrity());
            println!(
                "blocks: {} total, {} attendance, {} attendance records",
                stats.total_blocks, stats.attendance_blocks, stats.total_attendance_records
            );
        }
    }

    Ok(())
}
