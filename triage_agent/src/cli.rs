//! Command-line interface for the investigation coordinator.
//!
//! Every invocation resumes investigations from the data directory, so a
//! session can be driven one command at a time.
//!
//! # Examples
//!
//! Start an investigation against a fixture cluster:
//!
//! ```bash
//! $ triage --fixture cluster.json start shop --context "checkout returns 502"
//! ```
//!
//! Run every agent, then follow the top suggestion:
//!
//! ```bash
//! $ triage --fixture cluster.json sweep <ID>
//! $ triage --fixture cluster.json do <ID> 0
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use triage_core::{AgentKind, AgentResult, HypothesisId, InvestigationId, InvestigationView, StaticCluster};
use triage_runtime::RuntimeConfig;

use crate::coordinator::{ActionOutcome, Coordinator};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "triage", version, about = "Cluster root-cause investigation")]
struct Cli {
    /// JSON cluster fixture served as the cluster state
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Open a new investigation in a namespace
    Start {
        namespace: String,

        /// Free-text problem description
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Run all five agents
    Sweep { id: InvestigationId },

    /// Run one agent (metrics, logs, topology, events, traces)
    Run { id: InvestigationId, agent: AgentKind },

    /// Send a free-text message
    Ask { id: InvestigationId, message: String },

    /// Accept a ranked hypothesis as the root cause
    Accept { id: InvestigationId, hypothesis: String },

    /// Abandon an investigation
    Abandon { id: InvestigationId },

    /// Show an investigation
    Show {
        id: InvestigationId,

        /// Print the full view as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored investigations
    List,

    /// Execute a suggested next action by index
    Do { id: InvestigationId, index: usize },

    /// Print the investigation journal
    Journal { id: InvestigationId },
}

fn load_config(cli: &Cli) -> anyhow::Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_toml_file(path)?,
        None => RuntimeConfig::from_env()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

async fn cluster(cli: &Cli) -> anyhow::Result<StaticCluster> {
    let Some(path) = &cli.fixture else {
        anyhow::bail!("no cluster configured; pass --fixture <cluster.json>");
    };
    Ok(StaticCluster::from_json_file(path).await?)
}

fn print_results(results: &[AgentResult]) {
    for result in results {
        match &result.error {
            Some(e) => println!("⚠️  {}: {}", result.agent, e),
            None => println!("✅ {}", result.summary),
        }
        for finding in &result.findings {
            println!("     [{}] {}: {}", finding.severity.as_str(), finding.component, finding.issue);
        }
    }
}

fn print_view(view: &InvestigationView) {
    println!("📋 {} ({})", view.title, view.id);
    println!("   Status: {}", view.status);
    println!("   {}", view.summary);
    if !view.hypotheses.is_empty() {
        println!("   Hypotheses:");
        for h in &view.hypotheses {
            println!("     {} {} [{}]", h.confidence, h.description, h.id);
        }
    }
    if !view.next_actions.is_empty() {
        println!("   Next actions:");
        for (i, action) in view.next_actions.iter().enumerate() {
            println!("     {}. [{}] {}", i, action.priority, action.text);
        }
    }
}

/// Entry point for the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    triage_runtime::init_tracing(&config)?;

    let coordinator = match &cli.action {
        // listing needs no cluster
        Action::List => Coordinator::from_config(&config, Arc::new(StaticCluster::default())).await?,
        _ => Coordinator::from_config(&config, Arc::new(cluster(&cli).await?)).await?,
    };

    match cli.action {
        Action::Start { namespace, context } => {
            let view = coordinator.start_investigation(&namespace, context).await?;
            print_view(&view);
        }
        Action::Sweep { id } => {
            let results = coordinator.run_sweep(id).await?;
            print_results(&results);
            print_view(&coordinator.get_view(id).await?);
        }
        Action::Run { id, agent } => {
            let result = coordinator.run_agent(id, agent).await?;
            print_results(std::slice::from_ref(&result));
            print_view(&coordinator.get_view(id).await?);
        }
        Action::Ask { id, message } => {
            let response = coordinator.handle_user_message(id, &message).await?;
            println!("{}", response.reply);
        }
        Action::Accept { id, hypothesis } => {
            let view = coordinator
                .accept_hypothesis(id, &HypothesisId(hypothesis))
                .await?;
            print_view(&view);
            for snapshot in coordinator.snapshots(id).await? {
                println!("   📸 {} ({} fetch errors)", snapshot.component, snapshot.evidence.errors.len());
            }
        }
        Action::Abandon { id } => {
            print_view(&coordinator.abandon_investigation(id).await?);
        }
        Action::Show { id, json } => {
            let view = coordinator.load_investigation(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
        }
        Action::List => {
            for summary in coordinator.list_investigations().await? {
                println!(
                    "{}  {:<11}  {}  ({} findings)",
                    summary.id,
                    summary.status.to_string(),
                    summary.title,
                    summary.finding_count
                );
            }
        }
        Action::Do { id, index } => match coordinator.execute_next_action(id, index).await? {
            ActionOutcome::AgentRun(result) => {
                print_results(std::slice::from_ref(&result));
                print_view(&coordinator.get_view(id).await?);
            }
            ActionOutcome::Answer(answer) => println!("{}", answer),
            ActionOutcome::Accepted(view) => print_view(&view),
        },
        Action::Journal { id } => {
            for entry in coordinator.journal(id).await? {
                println!("{}  {}", entry.timestamp.to_rfc3339(), serde_json::to_string(&entry.event)?);
            }
        }
    }
    Ok(())
}
