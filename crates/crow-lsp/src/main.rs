//! `crow-lsp`: language server for Crow markup, speaking LSP over stdio.
//!
//! Editors start it with no arguments. `crow-lsp --version` prints the
//! version and the number of element types it knows.

use tower_lsp::{LspService, Server};

mod analysis;
mod backend;
mod knowledge;

#[tokio::main]
async fn main() {
    // built before the first request arrives
    let catalog = knowledge::catalog();

    if std::env::args().skip(1).any(|a| a == "--version" || a == "-V") {
        println!("crow-lsp {} ({} element types)", env!("CARGO_PKG_VERSION"), catalog.types().count());
        return;
    }

    let (service, socket) = LspService::new(backend::Backend::new);
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;
}
