// request.rs - Run one request through the full pipeline.

use concierge_gateway::{ConciergeConfig, Filters, Outcome};
use serde_json::Value;

use super::RequestArgs;

pub fn execute(
    args: &RequestArgs,
    filters: &[(String, Value)],
    config: &ConciergeConfig,
) -> anyhow::Result<()> {
    let concierge = super::open_concierge(config)?;
    let filters: Filters = filters.iter().cloned().collect();

    // A GatewayError (e.g. audit unavailable) propagates and exits non-zero.
    let outcome = concierge.handle(args.to_request(), filters)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if let Outcome::Denied(denied) = &outcome {
        eprintln!("Denied: {}", denied.decision.reason());
    }
    Ok(())
}
