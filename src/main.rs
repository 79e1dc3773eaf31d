//! Command-line entry point

use clap::{Parser, Subcommand};
use jira_slack_tools::config::require;
use jira_slack_tools::slack::channels::{archive_by_name, create_channels};
use jira_slack_tools::slack::plan_channels;
use jira_slack_tools::{Config, Error, Exporter, SlackClient, report, run_until_signal};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Config file read when `--config` is not given
const DEFAULT_CONFIG: &str = "jira-slack-tools.toml";

#[derive(Parser)]
#[command(name = "jira-slack-tools")]
#[command(about = "Jira backup export, team reports and Slack channel automation")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export every configured board with its image attachments
    Export,
    /// Count issues per team and post the summary to Slack
    Report {
        /// Print the message instead of posting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Slack workspace administration
    #[command(subcommand)]
    Slack(SlackCommand),
}

#[derive(Subcommand)]
enum SlackCommand {
    /// Exchange the OAuth authorization code for a bot token
    Oauth,
    /// Create the per-team private channels and invite their members
    CreateChannels {
        /// Only create the channel with this name
        #[arg(long)]
        only: Option<String>,
    },
    /// Archive a private channel by name
    Archive {
        /// Channel name
        name: String,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn load_config(path: Option<&Path>) -> jira_slack_tools::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_file(Path::new(DEFAULT_CONFIG))?,
        None => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

async fn run_slack(config: &Config, command: SlackCommand) -> jira_slack_tools::Result<()> {
    let slack = &config.slack;
    match command {
        SlackCommand::Oauth => {
            let client = SlackClient::from_config(slack, None, &config.timeouts)?;
            let access = client
                .oauth_access(
                    require(&slack.client_id, "slack.client_id")?,
                    require(&slack.client_secret, "slack.client_secret")?,
                    require(&slack.oauth_code, "slack.oauth_code")?,
                    &slack.redirect_uri,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&access)?);
        }
        SlackCommand::CreateChannels { only } => {
            let token = require(&slack.user_token, "slack.user_token")?;
            let client = SlackClient::from_config(slack, Some(token), &config.timeouts)?;

            let mut plan = plan_channels(&slack.channels);
            if let Some(name) = &only {
                plan.retain(|p| &p.name == name);
                if plan.is_empty() {
                    return Err(Error::Config {
                        message: format!("'{name}' is not a planned channel"),
                        key: Some("slack.channels".to_string()),
                    });
                }
            }

            let summary = create_channels(&client, &plan).await;
            for created in &summary.created {
                println!("created {} ({})", created.channel.name, created.channel.id);
            }
            for (name, error) in &summary.failed {
                println!("failed {name}: {error}");
            }
        }
        SlackCommand::Archive { name } => {
            let token = require(&slack.bot_token, "slack.bot_token")?;
            let client = SlackClient::from_config(slack, Some(token), &config.timeouts)?;
            match archive_by_name(&client, &name).await? {
                Some(channel) => println!("archived {} ({})", channel.name, channel.id),
                None => println!("no channel named {name}"),
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Export => {
            let exporter = Exporter::new(&config)?;
            let manifest = run_until_signal(exporter.run()).await?;
            println!(
                "exported {} issues from {} boards to {}",
                manifest.total_issues(),
                manifest.boards.len(),
                config.export.output_dir.display()
            );
        }
        Command::Report { dry_run } => {
            let message = run_until_signal(report::run(&config, dry_run)).await?;
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&message)?);
            }
        }
        Command::Slack(command) => run_until_signal(run_slack(&config, command)).await?,
    }

    Ok(())
}
