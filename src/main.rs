use clap::{Parser, Subcommand};
use menu_weight::{
    EngineConfig, JsonFileStore, ParentContext, ReorderError, ReorderSession, RenumberPolicy,
    SiblingId, TargetSpec, Weight,
    json::{ReorderRequest, ReorderResponse, SnapshotResponse, describe_change, generate_execution_id},
};
use std::fs;
use std::io::{self, Read};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Menu link reordering with conflict-checked weight commits
#[derive(Parser, Debug)]
#[command(name = "menu-weight")]
#[command(version = "0.1.0")]
#[command(about = "Reposition menu links without typing weights", long_about = None)]
struct Args {
    /// Menu document (JSON) to read and update
    #[arg(short, long)]
    store: String,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the configured renumbering policy
    #[arg(long, value_enum, global = true)]
    policy: Option<PolicyArg>,

    /// Override the configured base weight
    #[arg(long, global = true, allow_hyphen_values = true)]
    base_weight: Option<Weight>,

    /// Output structured JSON instead of human-readable
    #[arg(short, long, global = true)]
    json: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the ordered siblings of a parent and their fingerprint
    Snapshot {
        /// Parent as 'menu:parent' ('tools:' for the menu root)
        #[arg(short, long)]
        parent: ParentContext,

        /// Link being placed, to list the position choices for it
        #[arg(short, long)]
        moved: Option<String>,

        /// Title to show for the moved link
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Move or insert a link and commit the new weights
    Reorder {
        /// JSON file containing the reorder request (omit to read from stdin)
        #[arg(short, long)]
        request: Option<String>,

        /// Override the request target: 'position:<n>', 'above_<id>', 'below_<id>' or 'none'
        #[arg(short, long)]
        target: Option<TargetSpec>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Sequential,
    AffectedSpan,
}

impl From<PolicyArg> for RenumberPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Sequential => RenumberPolicy::Sequential,
            PolicyArg::AffectedSpan => RenumberPolicy::AffectedSpan,
        }
    }
}

/// Read a ReorderRequest from file path or stdin
///
/// If `path` is Some, reads from the file at that path.
/// If `path` is None, reads from stdin.
fn read_reorder_request(path: Option<&String>) -> Result<ReorderRequest, Box<dyn std::error::Error>> {
    let json_str = if let Some(p) = path {
        fs::read_to_string(p)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let request: ReorderRequest = serde_json::from_str(&json_str)?;
    Ok(request)
}

fn load_config(args: &Args) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(policy) = args.policy {
        config.policy = policy.into();
    }
    if let Some(base) = args.base_weight {
        config.base_weight = base;
    }
    Ok(config)
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "menu_weight=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    let store = JsonFileStore::new(&args.store);

    match &args.command {
        Command::Snapshot { parent, moved, title } => {
            let moved_id = moved.as_ref().map(|m| SiblingId::new(m.as_str()));
            let result = menu_weight::capture(&store, parent).map(|snapshot| {
                let choices = moved_id
                    .map(|m| snapshot.position_choices(&m, title.as_deref()))
                    .unwrap_or_default();
                SnapshotResponse::new(&snapshot, choices)
            });
            match result {
                Ok(response) => {
                    let text = if args.json {
                        to_json(&response)
                    } else {
                        render_snapshot(&response)
                    };
                    emit(&text, args.output.as_ref());
                }
                Err(e) => {
                    emit(&format!("Error: {}", e.user_message()), args.output.as_ref());
                    std::process::exit(1);
                }
            }
        }
        Command::Reorder { request, target } => {
            let request = match read_reorder_request(request.as_ref()) {
                Ok(req) => req,
                Err(e) => {
                    eprintln!("Error reading reorder request: {}", e);
                    std::process::exit(1);
                }
            };

            // Handle "auto" execution_id
            let execution_id = if request.execution_id == "auto" {
                generate_execution_id()
            } else {
                request.execution_id.clone()
            };

            let target = target.clone().unwrap_or_else(|| request.target.clone());
            let response = match reorder(&store, &config, &request, &target) {
                Ok(plan) => ReorderResponse::success(execution_id, &plan),
                Err(e) => ReorderResponse::from_error(execution_id, &e),
            };

            output_response(&response, args.json, args.output.as_ref());

            if !response.success {
                std::process::exit(if response.retryable { 2 } else { 1 });
            }
        }
    }
}

fn reorder(
    store: &JsonFileStore,
    config: &EngineConfig,
    request: &ReorderRequest,
    target: &TargetSpec,
) -> Result<menu_weight::ReorderPlan, ReorderError> {
    let hooks = config.hooks().map_err(|e| ReorderError::InvalidTarget {
        reason: e.to_string(),
    })?;

    let session = match &request.expected_fingerprint {
        Some(expected) => ReorderSession::resume(store, &request.parent, request.moved.clone(), expected.clone())?,
        None => ReorderSession::begin(store, &request.parent, request.moved.clone())?,
    };
    let session = match &request.title {
        Some(title) => session.with_title(title.as_str()),
        None => session,
    };

    let plan = session.plan(target, &hooks, config.renumber_options())?;
    ReorderSession::commit(store, &plan)?;
    Ok(plan)
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|_| r#"{"error": "Failed to serialize response"}"#.to_string())
}

fn render_snapshot(response: &SnapshotResponse) -> String {
    let mut lines = vec![format!(
        "Siblings of {} ({})",
        response.parent,
        response.siblings.len()
    )];
    for record in &response.siblings {
        if record.title.is_empty() {
            lines.push(format!("  {:>6}  {}", record.weight, record.id));
        } else {
            lines.push(format!("  {:>6}  {}  {}", record.weight, record.id, record.title));
        }
    }
    if !response.choices.is_empty() {
        lines.push("Positions:".to_string());
        for choice in &response.choices {
            let marker = if choice.current { "*" } else { " " };
            lines.push(format!("  {}{:>3}  {}", marker, choice.index, choice.label));
        }
    }
    lines.push(format!("Fingerprint: {}", response.digest));
    lines.join("\n")
}

/// Format and output the response
fn output_response(response: &ReorderResponse, json_mode: bool, output_path: Option<&String>) {
    let output = if json_mode {
        to_json(response)
    } else if response.success {
        let mut lines = vec![format!("Applied {} weight change(s)", response.changes.len())];
        lines.extend(response.changes.iter().map(|c| format!("  {}", describe_change(c))));
        if let Some(fingerprint) = &response.fingerprint {
            lines.push(format!("Fingerprint: {}", fingerprint.digest()));
        }
        lines.join("\n")
    } else {
        format!("Error: {}", response.error.as_deref().unwrap_or("Unknown error"))
    };

    emit(&output, output_path);
}

/// Write to file or stdout
fn emit(output: &str, output_path: Option<&String>) {
    if let Some(path) = output_path {
        if let Err(e) = fs::write(path, output) {
            eprintln!("Failed to write output to '{}': {}", path, e);
            std::process::exit(1);
        }
    } else {
        println!("{}", output);
    }
}
