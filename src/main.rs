use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use devpulse_core::services::DeliveryChannel;
use devpulse_core::{ChurnPoint, DevpulseConfig, ForecastOutcome, HistoryMode, OutputFormat};
use devpulse_gitpulse::github::GitHubClient;
use devpulse_gitpulse::mining::{LocalGitSource, MiningOptions};
use devpulse_gitpulse::seed::SeedSource;
use devpulse_render::chart::SvgChartRenderer;
use devpulse_render::influence::{GraphInfluenceMapper, InfluenceGraph, DOT_FILENAME};
use devpulse_report::llm::LlmClient;
use devpulse_report::narrator::{LlmNarrator, PlainNarrator};
use devpulse_report::pipeline::{Pipeline, Report};
use devpulse_report::slack::SlackChannel;

#[derive(Parser)]
#[command(
    name = "devpulse",
    version,
    about = "Commit churn analytics for engineering teams",
    long_about = "devpulse turns a repository's recent commits into a weekly insight report:\n\
                   churn per author, risky commits, a narrated summary, a churn chart,\n\
                   a next-week churn forecast and a reviewer influence map.\n\n\
                   Examples:\n  \
                     devpulse report --owner acme --repo widgets          Report on a GitHub repository\n  \
                     devpulse report --owner acme --repo widgets --slack  ...and post it to Slack\n  \
                     devpulse report --local . --no-llm                   Report on a local clone offline\n  \
                     devpulse report --demo --no-llm                      Try it without any credentials\n  \
                     devpulse forecast --history weeks.json               Forecast from your own history\n  \
                     devpulse schedule --owner acme --repo widgets        Weekly Slack digest"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .devpulse.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Build a churn report for a repository
    #[command(long_about = "Build a churn report for a repository.\n\n\
        Fetches recent commits, totals churn per author, flags risky commits\n\
        (more than 300 changed lines or more than 8 files), narrates the result,\n\
        renders a churn chart, forecasts next week's churn and maps review influence.\n\n\
        Examples:\n  devpulse report --owner acme --repo widgets\n  \
        devpulse report --seed commits.json --no-llm --format json\n  \
        devpulse report --local . --out-dir charts/")]
    Report(ReportArgs),
    /// Forecast next week's churn from a weekly history file
    #[command(long_about = "Forecast next week's churn from a weekly history file.\n\n\
        The file holds a JSON array of points ordered by date, e.g.\n  \
        [{\"period_start\": \"2025-06-02\", \"total_churn\": 420}, ...]\n\n\
        Examples:\n  devpulse forecast --history weeks.json")]
    Forecast {
        /// JSON file with the weekly churn history
        #[arg(long)]
        history: PathBuf,
    },
    /// Post a report to Slack on a fixed interval
    #[command(long_about = "Post a report to Slack on a fixed interval.\n\n\
        Runs one report at a time. A failed run is logged and the next run\n\
        happens on schedule. Stop with Ctrl-C.\n\n\
        Examples:\n  devpulse schedule --owner acme --repo widgets\n  \
        devpulse schedule --owner acme --repo widgets --interval-minutes 60")]
    Schedule {
        #[command(flatten)]
        report: ReportArgs,

        /// Minutes between runs (default: [schedule] interval_minutes, weekly)
        #[arg(long)]
        interval_minutes: Option<u64>,

        /// Run a single digest and exit
        #[arg(long)]
        once: bool,
    },
    /// Create a default .devpulse.toml configuration file
    Init,
    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// Repository owner (user or organization)
    #[arg(long, required_unless_present_any = ["seed", "local", "demo"])]
    owner: Option<String>,

    /// Repository name
    #[arg(long, required_unless_present_any = ["seed", "local", "demo"])]
    repo: Option<String>,

    /// Post the report to Slack
    #[arg(long)]
    slack: bool,

    /// Read commits from a JSON seed file instead of GitHub
    #[arg(long, conflicts_with_all = ["local", "demo"])]
    seed: Option<PathBuf>,

    /// Read commits from a local git clone instead of GitHub
    #[arg(long, conflicts_with = "demo")]
    local: Option<PathBuf>,

    /// Use built-in demo commits
    #[arg(long)]
    demo: bool,

    /// Summarize without calling an LLM
    #[arg(long)]
    no_llm: bool,

    /// Skip the forecast stage
    #[arg(long)]
    no_forecast: bool,

    /// Skip the reviewer influence map
    #[arg(long)]
    no_influence: bool,

    /// Forecast history source (default: [forecast] history, commits)
    #[arg(long, value_enum)]
    history: Option<HistoryArg>,

    /// Write the chart and influence map (SVG and DOT) to this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

impl ReportArgs {
    fn offline(&self) -> bool {
        self.seed.is_some() || self.local.is_some() || self.demo
    }

    /// Owner and repository names shown in the report.
    fn target(&self) -> (String, String) {
        let fallback_repo = match (&self.seed, &self.local) {
            (Some(path), _) => path.file_stem().map(|s| s.to_string_lossy().into_owned()),
            (_, Some(path)) => path
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|s| s.to_string_lossy().into_owned())),
            _ => None,
        };

        let owner = self.owner.clone().unwrap_or_else(|| "local".into());
        let repo = self
            .repo
            .clone()
            .or(fallback_repo)
            .unwrap_or_else(|| "demo".into());
        (owner, repo)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum HistoryArg {
    /// Weekly buckets of the fetched commits
    Commits,
    /// Total churn replayed over past weeks (demo only)
    Synthetic,
}

impl From<HistoryArg> for HistoryMode {
    fn from(arg: HistoryArg) -> Self {
        match arg {
            HistoryArg::Commits => HistoryMode::Commits,
            HistoryArg::Synthetic => HistoryMode::Synthetic,
        }
    }
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1m\x1b[33m~\x1b[0m \x1b[1mdevpulse\x1b[0m v{version}: commit churn analytics\n");

        println!("Quick start:");
        println!("  \x1b[36mdevpulse init\x1b[0m                         Create a .devpulse.toml config file");
        println!("  \x1b[36mdevpulse report --demo --no-llm\x1b[0m       Try a report with demo data");
        println!("  \x1b[36mdevpulse report --owner o --repo r\x1b[0m    Report on a GitHub repository\n");

        println!("All commands:");
        println!("  \x1b[32mreport\x1b[0m    Churn, risky commits, summary, chart, forecast, influence map");
        println!("  \x1b[32mforecast\x1b[0m  Next-week churn from a weekly history file");
        println!("  \x1b[32mschedule\x1b[0m  Recurring Slack digest");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("devpulse v{version}: commit churn analytics\n");

        println!("Quick start:");
        println!("  devpulse init                         Create a .devpulse.toml config file");
        println!("  devpulse report --demo --no-llm       Try a report with demo data");
        println!("  devpulse report --owner o --repo r    Report on a GitHub repository\n");

        println!("All commands:");
        println!("  report    Churn, risky commits, summary, chart, forecast, influence map");
        println!("  forecast  Next-week churn from a weekly history file");
        println!("  schedule  Recurring Slack digest");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'devpulse <command> --help' for details.");
}

fn init_logging(verbose: bool, default_level: &str, use_color: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(use_color)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .into_diagnostic()
        .wrap_err("installing log subscriber")
}

fn load_config(path: Option<&Path>) -> Result<DevpulseConfig> {
    let mut config = match path {
        Some(path) => DevpulseConfig::from_file(path)
            .wrap_err(format!("loading {}", path.display()))?,
        None => {
            let default_path = Path::new(".devpulse.toml");
            if default_path.exists() {
                DevpulseConfig::from_file(default_path)?
            } else {
                DevpulseConfig::default()
            }
        }
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn build_pipeline(args: &ReportArgs, config: &DevpulseConfig) -> Result<Pipeline> {
    let narrator: Box<dyn devpulse_core::services::NarrationService> = if args.no_llm {
        Box::new(PlainNarrator)
    } else {
        if config.llm.api_key.is_none() {
            if let Some(var) = config.llm.api_key_env_var() {
                miette::bail!(miette::miette!(
                    help = "Set {var}, add api_key under [llm] in .devpulse.toml, or pass --no-llm",
                    "No API key configured for LLM provider '{}'",
                    config.llm.provider
                ));
            }
        }
        Box::new(LlmNarrator::new(LlmClient::new(&config.llm)?))
    };

    let mut pipeline = if let Some(path) = &args.seed {
        Pipeline::new(
            Box::new(SeedSource::from_file(path)),
            narrator,
            Box::new(SvgChartRenderer),
        )
    } else if let Some(path) = &args.local {
        let options = MiningOptions {
            max_commits: Some(config.github.max_commits as usize),
            ..MiningOptions::default()
        };
        Pipeline::new(
            Box::new(LocalGitSource::new(path, options)),
            narrator,
            Box::new(SvgChartRenderer),
        )
    } else if args.demo {
        Pipeline::new(
            Box::new(SeedSource::demo()),
            narrator,
            Box::new(SvgChartRenderer),
        )
    } else {
        let github = GitHubClient::new(&config.github)?;
        let pipeline = Pipeline::new(
            Box::new(github.clone()),
            narrator,
            Box::new(SvgChartRenderer),
        );
        if args.no_influence {
            pipeline
        } else {
            pipeline.with_influence(Box::new(github), Box::new(GraphInfluenceMapper))
        }
    };

    if args.offline() && !args.no_influence {
        tracing::debug!("review data needs GitHub; influence map disabled for offline sources");
    }

    if !args.no_forecast {
        let mut forecast = config.forecast.clone();
        if let Some(history) = args.history {
            forecast.history = history.into();
        }
        pipeline = pipeline.with_forecast(forecast);
    }

    Ok(pipeline)
}

async fn run_with_spinner(pipeline: &Pipeline, owner: &str, repo: &str, show: bool) -> Result<Report> {
    let spinner = if show {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("Building report for {owner}/{repo}..."));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let result = pipeline.run(owner, repo).await;

    if let Some(pb) = spinner {
        match &result {
            Ok(_) => pb.finish_and_clear(),
            Err(_) => pb.finish_with_message("Failed"),
        }
    }
    Ok(result?)
}

fn write_images(report: &Report, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .into_diagnostic()
        .wrap_err(format!("creating {}", dir.display()))?;
    for image in std::iter::once(&report.chart).chain(report.influence_map.as_ref()) {
        let path = dir.join(&image.filename);
        std::fs::write(&path, &image.bytes)
            .into_diagnostic()
            .wrap_err(format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote {}", image.mime_type);
    }
    if report.influence_map.is_some() {
        let path = dir.join(DOT_FILENAME);
        let dot = InfluenceGraph::from_pairs(&report.review_pairs).to_dot();
        std::fs::write(&path, dot)
            .into_diagnostic()
            .wrap_err(format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote influence graph");
    }
    Ok(())
}

fn print_report(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).into_diagnostic()?);
        }
        OutputFormat::Markdown => print!("{}", report.to_markdown()),
        OutputFormat::Text => print!("{report}"),
    }
    Ok(())
}

fn print_forecast(outcome: &ForecastOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome).into_diagnostic()?);
        }
        OutputFormat::Markdown => println!("## Forecast\n\n{outcome}"),
        OutputFormat::Text => {
            println!("{outcome}");
            if let Some(f) = outcome.forecast() {
                println!(
                    "  method: {:?}, slope: {:.2} churn/day, intercept: {:.2}",
                    f.method, f.slope, f.intercept
                );
            }
        }
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r##"# devpulse configuration
# See: devpulse --help

[llm]
# Provider: "groq" (default), "openai" or "ollama"
provider = "groq"
# model = "llama-3.1-8b-instant"
# api_key = "..."  # or set GROQ_API_KEY / OPENAI_API_KEY
# base_url = "https://api.groq.com/openai"
temperature = 0.3

[github]
# token = "..."  # or set GITHUB_TOKEN
# api_url = "https://github.example.com/api/v3"
max_commits = 30
max_pulls = 20

[slack]
# bot_token = "xoxb-..."  # or set SLACK_BOT_TOKEN
# Image uploads need a channel ID (SLACK_CHANNEL_ID), not a #name
channel = "#general"

[forecast]
# "commits" buckets fetched commits by week; "synthetic" replays total churn (demo only)
history = "commits"
synthetic_periods = 4

[schedule]
# Minutes between digests (10080 = weekly)
interval_minutes = 10080
"##;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    let default_level = match cli.command {
        Some(Command::Schedule { .. }) => "info",
        _ => "warn",
    };
    init_logging(cli.verbose, default_level, use_color)?;

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(format = %cli.format, provider = %config.llm.provider, "configuration loaded");

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Report(ref args)) => {
            let (owner, repo) = args.target();
            let slack = if args.slack {
                Some(SlackChannel::new(&config.slack)?)
            } else {
                None
            };
            let pipeline = build_pipeline(args, &config)?;
            let show_spinner = std::io::stderr().is_terminal() && !cli.verbose;
            let report = run_with_spinner(&pipeline, &owner, &repo, show_spinner).await?;

            if let Some(dir) = &args.out_dir {
                write_images(&report, dir)?;
            }
            print_report(&report, cli.format)?;

            if let Some(channel) = slack {
                channel
                    .post(&report.slack_text(), Some(&report.chart))
                    .await
                    .wrap_err("posting report to Slack")?;
                eprintln!("Posted report to Slack ({})", channel.channel());
            }
        }
        Some(Command::Forecast { ref history }) => {
            if !history.exists() {
                return Err(devpulse_core::DevpulseError::FileNotFound(history.clone()).into());
            }
            let content = std::fs::read_to_string(history)
                .into_diagnostic()
                .wrap_err(format!("reading {}", history.display()))?;
            let points: Vec<ChurnPoint> = serde_json::from_str(&content)
                .into_diagnostic()
                .wrap_err(format!("parsing {}", history.display()))?;
            let outcome = devpulse_analysis::forecast::forecast(&points)?;
            print_forecast(&outcome, cli.format)?;
        }
        Some(Command::Schedule {
            ref report,
            interval_minutes,
            once,
        }) => {
            let mut schedule = config.schedule.clone();
            if let Some(minutes) = interval_minutes {
                schedule.interval_minutes = minutes;
            }
            schedule.validate()?;
            let minutes = schedule.interval_minutes;

            let (owner, repo) = report.target();
            let channel = SlackChannel::new(&config.slack)?;
            let pipeline = build_pipeline(report, &config)?;

            let mut ticker = tokio::time::interval(schedule.interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(%owner, %repo, minutes, "digest scheduled");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("interrupted, stopping schedule");
                        break;
                    }
                }

                match pipeline.run(&owner, &repo).await {
                    Ok(report) => {
                        if let Err(e) = channel.post(&report.slack_text(), Some(&report.chart)).await {
                            tracing::error!(error = %e, "digest delivery failed");
                        } else {
                            tracing::info!(commits = report.commit_count, "digest delivered");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "digest run failed"),
                }

                if once {
                    break;
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(".devpulse.toml");
            if path.exists() {
                miette::bail!(".devpulse.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .devpulse.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "devpulse", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_template_parses() {
        let config = DevpulseConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.llm.provider, "groq");
        assert_eq!(config.github.max_commits, 30);
        assert_eq!(config.forecast.history, HistoryMode::Commits);
        assert_eq!(config.schedule.interval_minutes, 10080);
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_requires_target_for_github() {
        assert!(Cli::try_parse_from(["devpulse", "report"]).is_err());
        assert!(Cli::try_parse_from(["devpulse", "report", "--demo"]).is_ok());
        assert!(Cli::try_parse_from(["devpulse", "report", "--owner", "a", "--repo", "b"]).is_ok());
    }

    #[test]
    fn offline_sources_conflict() {
        let parsed = Cli::try_parse_from(["devpulse", "report", "--demo", "--seed", "x.json"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn seed_target_uses_file_stem() {
        let cli = Cli::try_parse_from(["devpulse", "report", "--seed", "data/acme.json"]).unwrap();
        let Some(Command::Report(args)) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.target(), ("local".to_string(), "acme".to_string()));
    }

    #[test]
    fn influence_graph_is_written_next_to_svgs() {
        use devpulse_core::{ChurnTotals, RenderedImage, ReviewPair};

        let report = Report {
            owner: "acme".into(),
            repo: "widgets".into(),
            commit_count: 0,
            author_churn: ChurnTotals::new(),
            risk_flags: vec![],
            summary: String::new(),
            chart: RenderedImage::svg("churn_chart.svg", "<svg/>".into()),
            forecast: None,
            review_pairs: vec![ReviewPair {
                reviewer: "bob".into(),
                author: "alice".into(),
            }],
            influence_map: Some(RenderedImage::svg("influence_map.svg", "<svg/>".into())),
        };
        let dir = tempfile::tempdir().unwrap();
        write_images(&report, dir.path()).unwrap();

        assert!(dir.path().join("churn_chart.svg").exists());
        assert!(dir.path().join("influence_map.svg").exists());
        let dot = std::fs::read_to_string(dir.path().join(DOT_FILENAME)).unwrap();
        assert!(dot.contains(r#""bob" -> "alice" [label="1"]"#));
    }
}
