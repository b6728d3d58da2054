// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use numbers_server_rs::{
    cfg::{
        cli::{config_path_from_args, resolve_config_path},
        config::Config,
        logger::init_logger,
    },
    server::supervisor::{Server, spawn_signal_watcher},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional positional argument: path to a YAML config. Without one the
    // documented defaults apply.
    let cfg = match config_path_from_args()? {
        Some(path) => resolve_config_path(&path)
            .and_then(Config::load_from_file)
            .context("failed to resolve or load config")?,
        None => Config::default(),
    };

    let _logger_guard = init_logger(&cfg.logging)?;
    info!("starting number server");

    let shutdown = CancellationToken::new();
    let server = Server::start(&cfg, shutdown.clone()).await?;
    info!("listening on {}", server.local_addr()?);

    spawn_signal_watcher(shutdown);

    server.serve().await
}
