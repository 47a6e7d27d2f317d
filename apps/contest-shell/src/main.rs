//! Command-line front end for the contest shell policy engine.
//!
//! `check` classifies a URL and shows what the shell would do with it,
//! `config` prints the resolved configuration, and `replay` drives a full
//! coordinator against the simulated host from a TOML script.

mod assets;
mod replay;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use cs_config::LoadedConfig;
use cs_core::WindowRole;
use cs_domain::classify;
use cs_domain::hostname_of;
use cs_policy::NavigationKind;
use cs_policy::NavigationRequest;
use cs_policy::PolicyDecision;
use cs_policy::PolicyEngine;
use cs_policy::WindowContext;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(
    name = "contest-shell",
    version,
    about = "Navigation policy engine for a locked-down contest browser"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Configuration file (otherwise CONTEST_SHELL_CONFIG or the user config directory)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Log level; RUST_LOG is honored when this is not given
    #[clap(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a URL and show the decision for navigating to it from the home page
    Check {
        url: String,

        /// Evaluate as an auxiliary window instead of the primary window
        #[clap(long)]
        auxiliary: bool,
    },

    /// Print the resolved configuration and icon assets
    Config,

    /// Replay a scripted session against the simulated host
    Replay { script: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

fn init_logging(level: Option<LogLevel>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.to_filter_directive()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let loaded = cs_config::load(cli.config.as_deref()).context("failed to load configuration")?;
    debug!(source = loaded.source.label(), "configuration loaded");

    match cli.command {
        Command::Check { url, auxiliary } => check(&loaded, &url, auxiliary),
        Command::Config => show_config(&loaded),
        Command::Replay { script } => replay_script(&loaded, &script),
    }
}

fn check(loaded: &LoadedConfig, url: &str, auxiliary: bool) -> Result<()> {
    let role = if auxiliary {
        WindowRole::Auxiliary
    } else {
        WindowRole::Primary
    };
    let engine = PolicyEngine::new(Arc::new(loaded.config.policy.clone()))
        .context("policy configuration is not usable")?;
    let config = engine.config();
    let home = config.home_url.as_str();

    let host = hostname_of(url);
    let classification = classify(host.as_deref(), config, role);
    println!("url:            {url}");
    println!("host:           {}", host.as_deref().unwrap_or("(none)"));
    println!("window:         {}", role.as_str());
    match classification.reason {
        None => println!("classification: allowed"),
        Some(reason) => println!("classification: rejected ({})", reason.as_str()),
    }

    let window = WindowContext {
        current_url: Some(home),
        last_good_url: Some(home),
        first_load_committed: true,
        ..WindowContext::fresh(role, home)
    };
    for kind in [NavigationKind::WillNavigate, NavigationKind::WindowOpen] {
        let decision = engine.decide(&NavigationRequest {
            kind,
            target_url: url,
            window,
        });
        println!("{:<15} {}", format!("{}:", kind.as_str()), describe_decision(&decision));
    }
    Ok(())
}

fn describe_decision(decision: &PolicyDecision) -> String {
    match decision {
        PolicyDecision::Allow | PolicyDecision::BlockSilent => decision.label().to_owned(),
        PolicyDecision::AllowInNewWindow { url }
        | PolicyDecision::OpenExternal { url }
        | PolicyDecision::EscalateToProbe { url } => format!("{} {url}", decision.label()),
        PolicyDecision::BlockWithDialog(notice) => {
            format!("{}: {}", decision.label(), cs_policy::describe(notice))
        }
        PolicyDecision::RedirectToSafeHome { target_url, notice } => format!(
            "{} {target_url}: {}",
            decision.label(),
            cs_policy::describe(notice)
        ),
    }
}

fn show_config(loaded: &LoadedConfig) -> Result<()> {
    match loaded.source.path() {
        Some(path) => println!("# source: {} ({})", loaded.source.label(), path.display()),
        None => println!("# source: {}", loaded.source.label()),
    }

    let (_, report) = assets::load_assets(&loaded.config.shell);
    println!("# window icon: {}", report.window_icon);
    for (action, origin) in &report.toolbar {
        println!("# toolbar {}: {origin}", action.as_str());
    }
    println!();

    let rendered =
        toml::to_string_pretty(&loaded.config).context("failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

fn replay_script(loaded: &LoadedConfig, path: &std::path::Path) -> Result<()> {
    let script = replay::load_script(path)?;
    let (assets, _) = assets::load_assets(&loaded.config.shell);
    let transcript = replay::run(&script, &loaded.config, assets)
        .with_context(|| format!("replay of {} failed", path.display()))?;
    for line in transcript {
        println!("{line}");
    }
    Ok(())
}
