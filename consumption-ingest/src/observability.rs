use anyhow::{anyhow, Result};
use tracing_subscriber::{filter::Directive, EnvFilter};

/// Applied on top of whatever `RUST_LOG` asks for.
const CRATE_DIRECTIVE: &str = "consumption_ingest=info";

pub fn env_filter() -> Result<EnvFilter> {
    let directive: Directive = CRATE_DIRECTIVE.parse()?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

/// Install the global fmt subscriber. Fails if one is already installed.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter()?)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
