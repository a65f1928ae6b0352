//! Simulate command - replay a scenario through the merge train

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, check, conclusion_marker};
use anstream::println;
use chrono::Utc;
use mergeq::error::Result;
use mergeq::merge::{PullContext, TrainOutcome, TrainRunner};
use mergeq::platform::MergeRequest;
use std::path::Path;
use tracing::info;

/// Run the simulate command
pub async fn run_simulate(scenario_path: &Path, policy_path: Option<&Path>) -> Result<()> {
    let ctx = CommandContext::new(scenario_path, policy_path)?;
    let pull = &ctx.scenario.pull.pull;
    let now = ctx.scenario.now.unwrap_or_else(Utc::now);

    let cache = ctx.policy.entitlements.build_cache();
    let subscription = cache.subscription(&ctx.platform, pull.owner.id, now).await?;

    {
        let queue = ctx.registry.queue(&pull.repository(), &pull.base_ref);
        let mut queue = queue.lock().await;
        ctx.scenario.seed_queue(&mut queue, &ctx.policy.merge)?;
    }

    let rule = ctx
        .scenario
        .rule
        .as_ref()
        .map(mergeq::platform::ScenarioRule::evaluate)
        .transpose()?;

    let runner = TrainRunner::new(&ctx.platform, &ctx.registry, &subscription, &ctx.settings);
    let pull_ctx = PullContext {
        pull,
        config: &ctx.policy.merge,
        rule: rule.as_ref(),
        now,
    };

    info!(pull = pull.number, rule_matches = ctx.scenario.rule_matches, "simulating");
    println!("{}", format!("Simulating {pull} (strict: {})", ctx.policy.merge.strict).muted());

    let outcome = if ctx.scenario.rule_matches {
        runner.run(&pull_ctx).await?
    } else {
        runner.cancel_flow(&pull_ctx).await?
    };
    print_outcome(&outcome);

    if let Some(request) = &outcome.merge {
        print_merge(request);
        let merged = runner.complete_merge(&pull_ctx, request).await?;
        print_outcome(&merged);
    }

    let repository = pull.repository();
    let mut branches = ctx.registry.branches(&repository);
    if !branches.contains(&pull.base_ref) {
        branches.push(pull.base_ref.clone());
        branches.sort();
    }
    println!();
    for branch in &branches {
        let queue = ctx.registry.queue(&repository, branch);
        let numbers = queue.lock().await.pull_numbers();
        println!("{} {}", format!("Queue on {branch}:").muted(), listing(&numbers));
    }

    Ok(())
}

fn listing(numbers: &[u64]) -> String {
    if numbers.is_empty() {
        return "(empty)".to_string();
    }
    numbers
        .iter()
        .map(|n| format!("#{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_outcome(outcome: &TrainOutcome) {
    let conclusion = outcome
        .report
        .conclusion
        .map_or_else(|| "pending".to_string(), |c| c.to_string());
    println!();
    println!(
        "{} {} {}",
        conclusion_marker(outcome.report.conclusion),
        outcome.report.title.emphasis(),
        format!("[{conclusion}, {}]", outcome.state).muted()
    );
    for line in outcome.report.summary.lines().filter(|l| !l.trim().is_empty()) {
        println!("  {line}");
    }
    if !outcome.expired.is_empty() {
        println!(
            "  {} {}",
            "expired from the queue:".muted(),
            listing(&outcome.expired)
        );
    }
}

fn print_merge(request: &MergeRequest) {
    println!();
    println!(
        "{} Merging #{} with {}",
        check(),
        request.pull.number,
        request.method.to_string().emphasis()
    );
    if let Some(actor) = &request.actor {
        println!("  {} {actor}", "as".muted());
    }
    if let Some(title) = &request.commit_title {
        println!("  {} {title}", "commit title:".muted());
    }
}
