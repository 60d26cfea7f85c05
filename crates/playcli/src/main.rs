use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use playcore::{DecisionStep, ExecutionEvent, ExecutionTrace, SkillStep, Step, StepTrace, Variables, Workflow};
use playruntime::{
    BatchOptions, CheckpointStore, ExecutionRequest, FileCheckpointStore, PlaybookRuntime, PrometheusExporter,
    RuntimeConfig, SkillRegistry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "playbook")]
#[command(about = "Playbook execution CLI", long_about = None)]
struct Cli {
    /// Show debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a playbook file
    Run {
        /// Path to playbook JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial variables as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Use this execution id instead of a generated one
        #[arg(long)]
        execution_id: Option<String>,

        /// Enable checkpoints in this directory
        #[arg(long, env = "PLAYBOOK_CHECKPOINT_DIR")]
        checkpoint_dir: Option<PathBuf>,

        /// Write the execution trace as JSON
        #[arg(long)]
        trace_out: Option<PathBuf>,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Resume a failed execution from its checkpoint
    Resume {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        execution_id: String,

        #[arg(long, env = "PLAYBOOK_CHECKPOINT_DIR")]
        checkpoint_dir: PathBuf,

        #[arg(long)]
        trace_out: Option<PathBuf>,
    },

    /// Run a playbook once per input in a JSON array
    Batch {
        #[arg(short, long)]
        file: PathBuf,

        /// JSON file holding an array of input objects
        #[arg(long)]
        inputs: PathBuf,

        #[arg(long, env = "PLAYBOOK_MAX_CONCURRENCY", default_value_t = 5)]
        max_concurrency: usize,

        /// Abort the batch on the first failed input
        #[arg(long)]
        stop_on_error: bool,

        /// Write results to a .json or .csv file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print each input as it completes
        #[arg(long)]
        progress: bool,

        #[arg(long)]
        metrics: bool,
    },

    /// List or delete saved checkpoints
    Checkpoints {
        #[arg(long, env = "PLAYBOOK_CHECKPOINT_DIR")]
        checkpoint_dir: PathBuf,

        /// Delete the checkpoint for this execution id
        #[arg(long)]
        delete: Option<String>,
    },

    /// Validate a playbook file against the available skills
    Validate {
        file: PathBuf,
    },

    /// List available skills
    Skills,

    /// Create an example playbook
    Init {
        #[arg(short, long, default_value = "playbook.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            file,
            input,
            execution_id,
            checkpoint_dir,
            trace_out,
            metrics,
        } => {
            let config = RuntimeConfig {
                checkpoint_dir,
                ..RuntimeConfig::default()
            };
            let mut request = ExecutionRequest::new(parse_input(input.as_deref())?);
            request.execution_id = execution_id;
            run_playbook(&file, config, request, trace_out, metrics).await?;
        }

        Commands::Resume {
            file,
            execution_id,
            checkpoint_dir,
            trace_out,
        } => {
            let config = RuntimeConfig {
                checkpoint_dir: Some(checkpoint_dir),
                ..RuntimeConfig::default()
            };
            println!("⏯️  Resuming execution {}", execution_id);
            run_playbook(&file, config, ExecutionRequest::resume(execution_id), trace_out, false).await?;
        }

        Commands::Batch {
            file,
            inputs,
            max_concurrency,
            stop_on_error,
            output,
            progress,
            metrics,
        } => {
            let options = BatchOptions {
                max_concurrency,
                continue_on_error: !stop_on_error,
            };
            run_batch(&file, &inputs, options, output, progress, metrics).await?;
        }

        Commands::Checkpoints { checkpoint_dir, delete } => {
            manage_checkpoints(checkpoint_dir, delete)?;
        }

        Commands::Validate { file } => {
            validate_playbook(&file)?;
        }

        Commands::Skills => {
            list_skills()?;
        }

        Commands::Init { output } => {
            create_example_playbook(&output)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn standard_registry() -> Result<Arc<SkillRegistry>> {
    let mut registry = SkillRegistry::new();
    playskills::register_all(&mut registry)?;
    Ok(Arc::new(registry))
}

fn load_playbook(file: &Path) -> Result<Workflow> {
    tracing::debug!(path = %file.display(), "Loading playbook");
    println!("🚀 Loading playbook from: {}", file.display());
    let workflow =
        Workflow::from_file(file).with_context(|| format!("failed to load playbook {}", file.display()))?;

    println!("📋 Playbook: {} v{}", workflow.name(), workflow.metadata.version);
    if let Some(description) = &workflow.metadata.description {
        println!("   {}", description);
    }
    println!("   Steps: {}", workflow.steps.len());
    println!();
    Ok(workflow)
}

fn parse_input(input: Option<&str>) -> Result<Variables> {
    let Some(input) = input else {
        return Ok(Variables::new());
    };
    match serde_json::from_str(input)? {
        serde_json::Value::Object(vars) => Ok(vars),
        _ => bail!("Input must be a JSON object"),
    }
}

async fn run_playbook(
    file: &Path,
    config: RuntimeConfig,
    request: ExecutionRequest,
    trace_out: Option<PathBuf>,
    metrics: bool,
) -> Result<()> {
    let workflow = load_playbook(file)?;
    let runtime = PlaybookRuntime::with_registry(standard_registry()?, config)?;

    let printer = spawn_event_printer(&runtime, false);
    let outcome = runtime.run(&workflow, request).await;
    stop_event_printer(printer).await;
    let outcome = outcome?;

    println!();
    print_summary(&outcome.trace);

    if let Some(path) = trace_out {
        outcome.trace.save_to_file(&path)?;
        println!("💾 Trace written to {}", path.display());
    }
    if metrics {
        println!();
        print!("{}", PrometheusExporter::new(runtime.metrics().clone()).export());
    }

    if let Some(error) = outcome.error {
        eprintln!();
        eprintln!("{}", error);
        if runtime.config().checkpoint_dir.is_some() {
            eprintln!("Resume with: playbook resume --file {} --execution-id {}", file.display(), outcome.trace.execution_id);
        }
        bail!("playbook execution failed");
    }
    Ok(())
}

async fn run_batch(
    file: &Path,
    inputs_path: &Path,
    options: BatchOptions,
    output: Option<PathBuf>,
    progress: bool,
    metrics: bool,
) -> Result<()> {
    let workflow = load_playbook(file)?;
    let raw = std::fs::read_to_string(inputs_path)
        .with_context(|| format!("failed to read inputs {}", inputs_path.display()))?;
    let inputs: Vec<Variables> = serde_json::from_str(&raw).context("inputs must be a JSON array of objects")?;

    println!("📦 Running {} inputs (max concurrency {})", inputs.len(), options.max_concurrency);

    let runtime = PlaybookRuntime::with_registry(standard_registry()?, RuntimeConfig::default())?;
    let printer = progress.then(|| spawn_event_printer(&runtime, true));
    let results = runtime.run_batch_with(&workflow, inputs, options).await;
    if let Some(printer) = printer {
        stop_event_printer(printer).await;
    }
    let results = results?;

    println!();
    println!("📊 Batch Summary:");
    println!("   Total: {}", results.total());
    println!("   Succeeded: {}", results.success_count());
    println!("   Failed: {}", results.failure_count());
    println!("   Avg duration: {:.1}ms", results.avg_duration_ms());
    println!("   Wall time: {:.1}ms", results.total_duration_ms);

    for failure in results.failures() {
        let first_line = failure.error.as_deref().and_then(|e| e.lines().next()).unwrap_or("");
        println!("   ❌ input {}: {}", failure.index, first_line);
    }

    if let Some(path) = output {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => results.save_json(&path)?,
            Some("csv") => results.save_csv(&path)?,
            _ => bail!("output file must end in .json or .csv"),
        }
        println!("💾 Results written to {}", path.display());
    }
    if metrics {
        println!();
        print!("{}", PrometheusExporter::new(runtime.metrics().clone()).export());
    }

    if results.failure_count() > 0 {
        bail!("{} of {} inputs failed", results.failure_count(), results.total());
    }
    Ok(())
}

fn spawn_event_printer(runtime: &PlaybookRuntime, batch_progress: bool) -> JoinHandle<()> {
    let mut events = runtime.subscribe_events();

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::BatchItemCompleted {
                    index,
                    success,
                    duration_ms,
                    ..
                } if batch_progress => {
                    let mark = if success { "✅" } else { "❌" };
                    println!("  {} input {} finished in {:.1}ms", mark, index, duration_ms);
                }
                _ if batch_progress => {}
                ExecutionEvent::ExecutionStarted { start_step, .. } => {
                    println!("▶️  Execution started at step {}", start_step);
                }
                ExecutionEvent::StepStarted { step_name, step_type, .. } => {
                    println!("  ⚡ Starting step: {} ({})", step_name, step_type);
                }
                ExecutionEvent::StepCompleted { step_name, duration_ms, .. } => {
                    println!("  ✅ Step {} completed in {}ms", step_name, duration_ms);
                }
                ExecutionEvent::StepFailed { step_name, error, .. } => {
                    println!("  ❌ Step {} failed: {}", step_name, error);
                }
                ExecutionEvent::CheckpointSaved { next_step_index, .. } => {
                    println!("     💾 checkpoint saved (next step {})", next_step_index);
                }
                ExecutionEvent::ExecutionCompleted { success, duration_ms, .. } => {
                    if success {
                        println!("✨ Playbook completed successfully in {}ms", duration_ms);
                    } else {
                        println!("💥 Playbook failed after {}ms", duration_ms);
                    }
                }
                ExecutionEvent::BatchItemCompleted { .. } => {}
            }
        }
    })
}

async fn stop_event_printer(printer: JoinHandle<()>) {
    // Let buffered events drain before the listener is dropped
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    printer.abort();
}

fn print_summary(trace: &ExecutionTrace) {
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", trace.execution_id);
    println!("   Success: {}", trace.success);
    println!("   Duration: {}ms", trace.duration_ms.unwrap_or(0));
    println!();
    println!("🧭 Steps:");
    for step in &trace.steps {
        print_step(step, 1);
    }

    if !trace.final_context.is_empty() {
        println!();
        println!("📤 Final variables:");
        for (name, value) in &trace.final_context {
            println!("   {}: {}", name, value);
        }
    }
}

fn print_step(step: &StepTrace, depth: usize) {
    let indent = "   ".repeat(depth);
    let status = if step.error.is_some() { "❌" } else { "✅" };
    let mut line = format!("{}{} {} [{}] {}ms", indent, status, step.step_name, step.step_type, step.duration_ms.unwrap_or(0));
    if let Some(branch) = &step.decision_taken {
        line.push_str(&format!(" -> {}", branch));
    }
    if let Some(error) = &step.error {
        line.push_str(&format!(" ({})", error));
    }
    println!("{}", line);

    if let Some(reasoning) = step.skill_trace.as_ref().and_then(|s| s.reasoning.as_ref()) {
        println!("{}   💭 {}", indent, reasoning);
    }
    for nested in &step.nested_steps {
        print_step(nested, depth + 1);
    }
}

fn manage_checkpoints(dir: PathBuf, delete: Option<String>) -> Result<()> {
    let store = FileCheckpointStore::new(dir)?;

    if let Some(id) = delete {
        if store.delete(&id)? {
            println!("🗑️  Deleted checkpoint {}", id);
        } else {
            println!("No checkpoint for {}", id);
        }
        return Ok(());
    }

    let ids = store.list()?;
    println!("💾 Checkpoints in {} ({}):", store.dir().display(), ids.len());
    for id in ids {
        match store.load(&id)? {
            Some(checkpoint) => println!(
                "  • {} ({} at step {}, saved {})",
                id, checkpoint.workflow_name, checkpoint.next_step_index, checkpoint.saved_at
            ),
            None => println!("  • {}", id),
        }
    }
    Ok(())
}

fn validate_playbook(file: &Path) -> Result<()> {
    println!("🔍 Validating playbook: {}", file.display());
    let workflow = Workflow::from_file(file)?;
    let registry = standard_registry()?;

    let mut referenced = Vec::new();
    collect_skills(&workflow.steps, &mut referenced);
    let unknown: Vec<&String> = referenced.iter().filter(|name| !registry.contains(name)).collect();

    println!("   Name: {}", workflow.name());
    println!("   Steps: {}", workflow.steps.len());
    println!("   Skill references: {}", referenced.len());

    if !unknown.is_empty() {
        for name in &unknown {
            println!("   ❌ unknown skill: {}", name);
        }
        bail!("{} unknown skill reference(s)", unknown.len());
    }
    println!("✅ Playbook is valid");
    Ok(())
}

fn collect_skills(steps: &[Step], out: &mut Vec<String>) {
    for step in steps {
        match step {
            Step::Skill(skill) => out.push(skill.skill.clone()),
            Step::Decision(decision) => {
                for branch in &decision.branches {
                    collect_skills(&branch.steps, out);
                }
                if let Some(default) = &decision.default {
                    collect_skills(default, out);
                }
            }
        }
    }
}

fn list_skills() -> Result<()> {
    println!("📦 Available Skills:");
    println!();

    let registry = standard_registry()?;
    for name in registry.list_skills() {
        if let Some(info) = registry.info(&name) {
            println!("  • {} (v{})", info.name, info.version);
            if !info.description.is_empty() {
                println!("    {}", info.description);
            }
        }
    }
    Ok(())
}

fn create_example_playbook(output: &Path) -> Result<()> {
    let workflow = Workflow::new("example_sum")
        .with_description("Adds two numbers and reports whether the sum is large")
        .with_variable("threshold", 10)
        .with_step(
            SkillStep::new("add", "add_numbers")
                .with_input("a", "{{ a }}")
                .with_input("b", "{{ b }}")
                .with_output_var("sum"),
        )
        .with_step(
            DecisionStep::new("check_size")
                .with_branch(
                    "sum.result > threshold",
                    vec![SkillStep::new("report_large", "debug_log")
                        .with_input("message", "large sum: {{ sum.result }}")
                        .into()],
                )
                .with_default(vec![SkillStep::new("report_small", "debug_log")
                    .with_input("message", "small sum: {{ sum.result }}")
                    .into()]),
        );

    std::fs::write(output, workflow.to_json()?)?;

    println!("✨ Created example playbook: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  playbook run --file {} --input '{{\"a\": 3, \"b\": 5}}'", output.display());
    Ok(())
}
