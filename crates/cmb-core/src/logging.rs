use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

const OUR_CRATES: [&str; 5] = [
    "cmb",
    "cmb_core",
    "cmb_telegram",
    "cmb_coinmarketcap",
    "cmb_cryptocompare",
];

/// Initialize tracing for the bot.
///
/// Default: info for our crates, warn for everything else. `RUST_LOG` overrides.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let ours: Vec<String> = OUR_CRATES.iter().map(|c| format!("{c}=info")).collect();
        EnvFilter::new(format!("warn,{},{service_name}=info", ours.join(",")))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install tracing subscriber: {e}")))?;

    Ok(())
}
