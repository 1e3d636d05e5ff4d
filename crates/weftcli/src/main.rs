// crates/weftcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use weftcore::{Value, WorkflowDsl, WorkflowNode};
use weftruntime::{FlowRuntime, MemoryLogSink, RunOptions, RuntimeConfig};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Runtime inputs as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Secret as KEY=VALUE (repeatable)
        #[arg(short, long = "secret")]
        secrets: Vec<String>,

        /// JSON file holding an object of secret strings
        #[arg(long)]
        secrets_file: Option<PathBuf>,

        /// Cancel the run after this many seconds
        #[arg(long, env = "WEFT_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,

        /// Print the per-node log records after the run
        #[arg(long)]
        show_logs: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            secrets,
            secrets_file,
            timeout_secs,
            show_logs,
            verbose,
        } => {
            init_tracing(verbose);
            let secrets = load_secrets(&secrets, secrets_file.as_deref())?;
            let success = run_workflow(file, input, secrets, timeout_secs, show_logs).await?;
            if !success {
                std::process::exit(1);
            }
        }

        Commands::Validate { file } => {
            init_tracing(false);
            if !validate_workflow(&file)? {
                std::process::exit(1);
            }
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn load_workflow(file: &Path) -> Result<WorkflowDsl> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading workflow {}", file.display()))?;
    WorkflowDsl::from_json(&json).with_context(|| format!("parsing workflow {}", file.display()))
}

fn load_secrets(pairs: &[String], file: Option<&Path>) -> Result<HashMap<String, String>> {
    let mut secrets = HashMap::new();

    if let Some(path) = file {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading secrets {}", path.display()))?;
        let from_file: HashMap<String, String> = serde_json::from_str(&json)
            .with_context(|| format!("{} must be a JSON object of strings", path.display()))?;
        secrets.extend(from_file);
    }

    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("secret '{}' must look like KEY=VALUE", pair))?;
        secrets.insert(key.to_string(), value.to_string());
    }

    Ok(secrets)
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    secrets: HashMap<String, String>,
    timeout_secs: Option<u64>,
    show_logs: bool,
) -> Result<bool> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(&file)?;

    println!("📋 Workflow: {}", workflow.meta.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();

    let inputs = match input {
        Some(input_str) => {
            let json: serde_json::Value = serde_json::from_str(&input_str)?;
            if !json.is_object() {
                return Err(anyhow::anyhow!("Input must be a JSON object"));
            }
            Value::from(json)
        }
        None => Value::Object(Default::default()),
    };

    let sink = Arc::new(MemoryLogSink::new());
    let mut config = RuntimeConfig::default().with_log_sink(sink.clone());
    if let Some(secs) = timeout_secs {
        config = config.with_execution_timeout(Duration::from_secs(secs));
    }

    let runtime = FlowRuntime::with_registry(Arc::new(weftnodes::standard_registry()), config);

    let options = RunOptions::new()
        .on_node_start(|node_id, node_type| println!("  ⚡ Starting node: {} ({})", node_id, node_type))
        .on_node_complete(|node_id, _| println!("  ✅ Node {} completed", node_id));

    let result = runtime.execute(&workflow, inputs, secrets, options).await;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", result.execution_id);
    println!("   Completed: {}/{} nodes", result.outputs.len(), workflow.nodes.len());

    if let Some(error) = &result.error {
        println!("💥 Workflow failed: {}", error);
    } else {
        println!("✨ Workflow completed successfully");
    }

    if !result.outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        let mut node_ids: Vec<_> = result.outputs.keys().collect();
        node_ids.sort();
        for node_id in node_ids {
            println!("   Node {}:", node_id);
            let outputs = &result.outputs[node_id];
            let mut handles: Vec<_> = outputs.keys().collect();
            handles.sort();
            for handle in handles {
                println!("     {}: {}", handle, outputs[handle].to_json());
            }
        }
    }

    if show_logs {
        println!();
        println!("🧾 Log records:");
        for record in sink.records() {
            println!("   {}: {}", record.node_id, record.data);
        }
    }

    Ok(result.is_success())
}

fn validate_workflow(file: &Path) -> Result<bool> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    let registry = weftnodes::standard_registry();
    let errors = weftruntime::validate(&workflow, &registry);

    if errors.is_empty() {
        println!("✅ Workflow is valid:");
        println!("   Name: {}", workflow.meta.name);
        println!("   Nodes: {}", workflow.nodes.len());
        println!("   Edges: {}", workflow.edges.len());
        return Ok(true);
    }

    println!("❌ Workflow is invalid:");
    for error in errors {
        println!("   • {}", error);
    }
    Ok(false)
}

fn list_nodes() {
    println!("📦 Available Node Types:");

    let registry = weftnodes::standard_registry();

    for (category, nodes) in registry.list_by_category() {
        println!();
        println!("  [{}]", category);
        for node in nodes {
            let descriptor = node.descriptor();
            println!("  • {}", descriptor.id);
            if !descriptor.description.is_empty() {
                println!("    {}", descriptor.description);
            }
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = WorkflowDsl::new("Example greeting workflow");

    let name = workflow.add_node(
        WorkflowNode::new("name", "text-input")
            .with_label("Name")
            .with_input("value", "user.name"),
    );
    let greet = workflow.add_node(
        WorkflowNode::new("greet", "template")
            .with_label("Greeting")
            .with_static("template", "Hello, {{who}}!"),
    );
    let log = workflow.add_node(WorkflowNode::new("log", "log").with_label("Log greeting"));

    workflow.connect(&name, "value", &greet, "who");
    workflow.connect(&greet, "text", &log, "message");

    std::fs::write(&output, workflow.to_json_pretty()?)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  weft run --file {} --input '{{\"user\": {{\"name\": \"Ada\"}}}}'",
        output.display()
    );

    Ok(())
}
