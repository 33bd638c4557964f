//! Briefwise - ranked briefings, metric insights and approved actions.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, database, invalid arguments, etc.)
//!   2 - Approval conflict (proposal not found or already resolved)

use anyhow::{Context, Result};
use briefwise::analytics::{AnalyticsEngine, AnalyticsSettings};
use briefwise::approval::ApprovalGate;
use briefwise::briefing::{BriefingEngine, JsonFileSource};
use briefwise::cli::{Args, Command, OutputFormat};
use briefwise::config::{Config, CONFIG_FILE};
use briefwise::errors::ApprovalError;
use briefwise::models::{ActionProposal, NewProposal};
use briefwise::report;
use briefwise::store::Store;
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so [general] verbose applies
    let config = match load_config(&args) {
        Ok(mut config) => {
            config.merge_with_args(&args);
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&args, &config);

    debug!("Briefwise v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Config: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .briefwise.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to configure sources, database path and thresholds.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch one command. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let Some(command) = args.command.clone() else {
        return Ok(1);
    };

    let store = Arc::new(
        Store::open(&config.general.database).with_context(|| {
            format!(
                "Failed to open database {}",
                config.general.database.display()
            )
        })?,
    );
    let analytics =
        AnalyticsEngine::with_settings(Arc::clone(&store), AnalyticsSettings::from(&config.analytics));
    let gate = ApprovalGate::new(store).with_audit_limit(config.approval.audit_limit);
    let json = args.format == OutputFormat::Json;

    let output = match command {
        Command::Briefing => run_briefing(&args, &config, &analytics).await?,
        Command::Record {
            metric,
            value,
            source,
            date,
        } => {
            let date = date.unwrap_or_else(today);
            let point = analytics.record(&metric, value, &source, &date)?;
            if json {
                report::generate_json(&point)?
            } else {
                format!("✅ Recorded {} = {} on {} (#{})\n", metric, value, date, point.id)
            }
        }
        Command::History { metric, days } => {
            let history = analytics.get_history(&metric, days)?;
            if json {
                report::generate_json(&history)?
            } else {
                report::generate_history_markdown(&metric, &history)
            }
        }
        Command::Trend { metric, days } => {
            let trend = analytics.detect_trend(&metric, days)?;
            if json {
                report::generate_json(&trend)?
            } else {
                report::generate_trend_markdown(&metric, trend.as_ref())
            }
        }
        Command::Anomalies { metric, days } => {
            let anomalies = analytics.detect_anomalies(&metric, days)?;
            if json {
                report::generate_json(&anomalies)?
            } else {
                report::generate_anomalies_markdown(&metric, &anomalies)
            }
        }
        Command::Insights => {
            let insights = analytics.generate_insights()?;
            if json {
                report::generate_json(&insights)?
            } else {
                report::generate_insights_markdown(&insights)
            }
        }
        Command::Propose {
            user,
            action,
            description,
            source,
            context,
        } => {
            let mut input = NewProposal::new(user, action, description, source);
            if let Some(raw) = context {
                let value = serde_json::from_str(&raw).context("Context is not valid JSON")?;
                input = input.with_context(value);
            }
            let proposal = gate.propose(input)?;
            render_proposal(&proposal, json)?
        }
        Command::Show { id } => match gate.get_by_id(id)? {
            Some(proposal) => render_proposal(&proposal, json)?,
            None => {
                eprintln!("Proposal {} not found", id);
                return Ok(2);
            }
        },
        Command::Approve { id } => match gate.approve(id) {
            Ok(proposal) => render_proposal(&proposal, json)?,
            Err(e) => return conflict_exit(e),
        },
        Command::Reject { id, reason } => match gate.reject(id, reason.as_deref()) {
            Ok(proposal) => render_proposal(&proposal, json)?,
            Err(e) => return conflict_exit(e),
        },
        Command::Pending { user } => {
            let pending = gate.list_pending(&user)?;
            if json {
                report::generate_json(&pending)?
            } else {
                report::generate_proposals_markdown("Pending Approvals", &pending)
            }
        }
        Command::Audit { user, limit } => {
            let log = gate.get_audit_log(&user, limit)?;
            if json {
                report::generate_json(&log)?
            } else {
                report::generate_proposals_markdown("Audit Log", &log)
            }
        }
        Command::ApproveAll { user } => {
            let count = gate.approve_all(&user)?;
            if json {
                report::generate_json(&serde_json::json!({ "approved": count }))?
            } else {
                format!("✅ Approved {} pending proposals for {}\n", count, user)
            }
        }
    };

    emit(&args, &output)?;
    Ok(0)
}

/// Build the engine from configured sources, render one briefing and
/// record its size as metrics for today.
async fn run_briefing(args: &Args, config: &Config, analytics: &AnalyticsEngine) -> Result<String> {
    let mut engine = BriefingEngine::new();
    if let Some(timeout) = config.briefing.timeout() {
        engine = engine.with_timeout(timeout);
    }

    for entry in &config.briefing.sources {
        engine.add_source(Arc::new(JsonFileSource::new(&entry.name, &entry.path)))?;
    }

    if config.briefing.sources.is_empty() {
        warn!("No sources configured. Add [[briefing.sources]] to {}", CONFIG_FILE);
    }

    let spinner = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!(
            "Fetching {} sources...",
            engine.list_sources().len()
        ));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let briefing = engine.generate_briefing().await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    info!(
        "{} records, {} sources unavailable",
        briefing.stats.total,
        briefing.errors.len()
    );

    analytics
        .record_briefing(&briefing, &today())
        .context("Failed to record briefing metrics")?;

    match args.format {
        OutputFormat::Json => report::generate_json(&briefing),
        OutputFormat::Markdown => Ok(report::generate_briefing_markdown(&briefing)),
    }
}

fn render_proposal(proposal: &ActionProposal, json: bool) -> Result<String> {
    if json {
        report::generate_json(proposal)
    } else {
        Ok(report::generate_proposal_block(proposal))
    }
}

/// State conflicts exit with 2; storage failures propagate.
fn conflict_exit(e: ApprovalError) -> Result<i32> {
    if e.is_conflict() {
        eprintln!("⛔ {}", e);
        Ok(2)
    } else {
        Err(e.into())
    }
}

/// Print to stdout or write to --output.
fn emit(args: &Args, output: &str) -> Result<()> {
    match args.output {
        Some(ref path) => {
            report::write_output(output, path)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Saved to {}", path.display());
            }
        }
        None => print!("{}", output),
    }
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Only a missing default file falls back to defaults; a file that fails to
/// parse or validate is an error.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    Ok(Config::load_default()?.unwrap_or_default())
}

/// Today's calendar day in local time.
fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}
