// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Formality Language Server

use clap::Parser;
use fm_lsp::{Cli, FormalityLanguageServer};
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the protocol, so logs go to stderr.
    let filter = cli
        .log_filter
        .clone()
        .or_else(|| std::env::var("FM_LSP_LOG").ok())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fm-lsp: {err}");
            std::process::exit(2);
        }
    };

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) =
        LspService::new(move |client| FormalityLanguageServer::new(client, config));

    Server::new(stdin, stdout, socket).serve(service).await;
}
