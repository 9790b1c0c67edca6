//! Serve command: run the HTTP server

use clap::Args;

use pathnet_http::{run_server, AppState};

use crate::AppContext;

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides [server] bind)
    #[arg(long)]
    pub bind: Option<String>,

    /// Requests served at once (overrides [server] concurrency)
    #[arg(long)]
    pub concurrency: Option<usize>,
}

pub async fn run(args: &ServeArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let bind = args.bind.as_deref().unwrap_or(&ctx.config.server.bind);
    let concurrency = args.concurrency.unwrap_or(ctx.config.server.concurrency);

    tracing::info!(
        "Serving {} data sources with {} workers",
        ctx.service.server().data_sources().len(),
        concurrency
    );

    let state = AppState::new(ctx.service.clone(), concurrency);
    run_server(state, bind).await
}
