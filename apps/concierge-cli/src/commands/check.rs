// check.rs - Dry-run a decision: no fetch, no audit entry.

use concierge_gateway::ConciergeConfig;

use super::RequestArgs;

pub fn execute(args: &RequestArgs, json: bool, config: &ConciergeConfig) -> anyhow::Result<()> {
    let concierge = super::open_concierge(config)?;
    let trace = concierge.decide(&args.to_request());

    if json {
        println!("{}", serde_json::to_string_pretty(&trace)?);
        return Ok(());
    }

    let decision = &trace.decision;
    println!(
        "DECISION: {} ({}, {})",
        decision.verdict(),
        decision.policy_section.as_deref().unwrap_or("-"),
        decision.policy_ref
    );
    println!("ROLE:     {} ({})", trace.role, trace.role_source);
    println!("REASON:   {}", decision.reason());
    println!();
    println!("{:<4} {:<22} OUTCOME", "#", "CHECK");
    println!("{}", "-".repeat(72));
    for (i, step) in trace.steps.iter().enumerate() {
        println!(
            "{:<4} {:<22} {}{}",
            i + 1,
            step.check,
            step.outcome,
            if step.terminal { "  [final]" } else { "" }
        );
    }
    Ok(())
}
