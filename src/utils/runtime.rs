use anyhow::Result;

/// Runtime for the foreground loop. Timer tasks tick on worker threads so a slow store call on
/// the foreground never delays them.
pub fn multi_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("timeboxer-worker")
        .enable_all()
        .build()?)
}
