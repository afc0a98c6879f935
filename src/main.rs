//! LockSleuth lists which processes hold files open.
//!
//! Thin binary entry point. All logic lives in the `locksleuth-core` crate.
//!
//! Usage: `LockSleuth [PATH-PREFIX]`. Prints one JSON array of open file and
//! directory handles on stdout; diagnostics go to stderr.

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use locksleuth_core::platform;

    init_logging();

    if !platform::is_elevated() {
        tracing::warn!("Not elevated: handles owned by other users will be skipped");
    }
    match platform::enable_debug_privilege() {
        Ok(true) => tracing::debug!("SeDebugPrivilege enabled"),
        Ok(false) => tracing::debug!("SeDebugPrivilege not held by this token"),
        Err(e) => tracing::warn!("Could not enable SeDebugPrivilege: {e}"),
    }

    let filter = std::env::args().nth(1);
    tracing::info!("LockSleuth starting, filter = {filter:?}");

    let handles = locksleuth_core::get_open_handles(filter.as_deref())?;

    let stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(stdout, &handles)?;
    println!();

    Ok(())
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    init_logging();
    anyhow::bail!("LockSleuth inspects the Windows handle table and only runs on Windows")
}

fn init_logging() {
    // Initialise structured logging on stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();
}
