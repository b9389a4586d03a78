//! Fetch command - serve requests through the active version

use super::LocalWorker;
use crate::adapter::{Request, Response};
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{WorkerError, WorkerResult};
use std::io::Write;
use tracing::warn;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> WorkerResult<()> {
    let local = LocalWorker::open(config, &args.target);
    let outcome = serve(&args, &local).await;
    local.close().await;
    outcome
}

async fn serve(args: &FetchArgs, local: &LocalWorker) -> WorkerResult<()> {
    let status = local.driver().restore().await?;
    if status.active.is_none() {
        warn!("No active version, requests go straight to {}", local.origin());
    }

    for url in &args.urls {
        let request = Request::new(args.method, url.as_str());
        let response = local.driver().fetch(&request).await;
        if response.is_sentinel() {
            warn!(
                "{} {} answered by the worker with {}",
                args.method.as_str(),
                url,
                response.status
            );
        }

        let mut out = std::io::stdout().lock();
        write_response(&mut out, &response, args.include)
            .map_err(|e| WorkerError::io("writing response", e))?;
    }
    Ok(())
}

fn write_response(
    out: &mut impl Write,
    response: &Response,
    include_headers: bool,
) -> std::io::Result<()> {
    if include_headers {
        writeln!(out, "HTTP {}", response.status)?;
        for (name, value) in &response.headers {
            writeln!(out, "{}: {}", name, value)?;
        }
        writeln!(out)?;
    }
    out.write_all(&response.body)?;
    if !response.body.ends_with(b"\n") {
        writeln!(out)?;
    }
    out.flush()
}
