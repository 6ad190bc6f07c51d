// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

use dataflow_orchestrator::config::{load_dataflow, load_node_config, NodeConfig};
use dataflow_orchestrator::engine::LocalNode;
use dataflow_orchestrator::model::RunPlanState;
use dataflow_orchestrator::observability::init_tracing;

const RUN_TIMEOUT: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <dataflow.yaml> [node.toml]", args[0]);
        eprintln!("Example: {} configs/ingest-transform-collect.yaml", args[0]);
        eprintln!("Example: {} configs/ingest-transform-collect.yaml configs/node.toml", args[0]);
        std::process::exit(1);
    }

    let config = match args.get(2) {
        Some(path) => load_node_config(path)?,
        None => NodeConfig::default(),
    };
    init_tracing(config.logging.get_filter());

    let dataflow = load_dataflow(&args[1])?;
    let dataflow_id = dataflow.id.clone();

    println!("🚀 Dataflow Orchestrator");
    println!("═══════════════════════════");
    println!("Dataflow: {} ({})", dataflow.name, dataflow_id);
    println!("Processors: {}", dataflow.processors.len());
    println!();

    let node = LocalNode::with_builtins(&config).context("failed to create the script runtime")?;
    let control = node.control();

    control.create_dataflow(dataflow).await?;
    let started = control
        .start(&dataflow_id)
        .await
        .with_context(|| format!("failed to start dataflow '{}'", dataflow_id))?;

    let plan = node.wait_for_terminal(&started.id, RUN_TIMEOUT).await?;
    println!("{}", plan.summary());
    println!();

    for (phase, ids) in &plan.phases {
        println!("Phase {}", phase);
        for id in ids {
            let Some(status) = plan.status(id) else {
                continue;
            };
            match &status.error {
                Some(error) => println!("  {:<24} {} - {}", id, status.state, error),
                None => println!("  {:<24} {}", id, status.state),
            }
            for trace in &status.traces {
                println!("    envelope {}: {}", trace.envelope_id, trace.path().join(" → "));
            }
        }
    }

    let state = plan.state;
    node.shutdown().await;

    match state {
        RunPlanState::Success => {
            println!("\n✅ Run plan {} succeeded", plan.id);
            Ok(())
        }
        state if state.is_terminal() => bail!("run plan {} ended {}", plan.id, state),
        state => bail!("run plan {} still {} after {:?}", plan.id, state, RUN_TIMEOUT),
    }
}
