use anyhow::Result;
use timeboxer::{cli::run_cli, utils::runtime::multi_thread_runtime};
use tracing::error;

fn main() -> Result<()> {
    multi_thread_runtime()?
        .block_on(run_cli())
        .inspect_err(|e| {
            error!("Error running cli {e:?}");
        })
}
