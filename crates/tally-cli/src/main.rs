use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tally_core::{Properties, TrackOptions, Tracker, TrackerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Send events, profile updates and funnel steps to the tracking API")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    options: CallOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CallOptions {
    /// API token for this call (defaults to TALLY_API_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Send in test mode
    #[arg(long, global = true, conflicts_with = "live")]
    test: bool,

    /// Send in live mode, overriding TALLY_TEST_ONLY
    #[arg(long, global = true)]
    live: bool,

    /// Fail with the last error once retries run out
    #[arg(long, global = true)]
    raise: bool,
}

impl CallOptions {
    fn into_track_options(self) -> TrackOptions {
        let test = match (self.test, self.live) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        TrackOptions {
            token: self.token,
            test,
            raise_on_exhaustion: self.raise,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Record an event
    Event {
        name: String,

        /// Event properties as key=value (values are parsed as JSON when possible)
        properties: Vec<String>,
    },

    /// Update a user profile
    People {
        distinct_id: String,

        /// Field to set, as key=value
        #[arg(long = "set")]
        set: Vec<String>,

        /// Numeric field to increment, as key=value
        #[arg(long = "add")]
        add: Vec<String>,
    },

    /// Record a funnel step (properties must include distinct_id)
    Funnel {
        funnel: String,
        step: String,
        goal: String,
        properties: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=info,tally_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = TrackerConfig::from_env().context("invalid TALLY_* configuration")?;
    tracing::debug!(host = %config.api_host, test_only = config.test_only, "configuration loaded");

    let tracker = Tracker::from_config(config)?;
    let options = cli.options.into_track_options();

    let result = match cli.command {
        Command::Event { name, properties } => {
            let properties = parse_properties(&properties)?;
            tracker.track_event(&name, Some(properties), options).await
        }
        Command::People {
            distinct_id,
            set,
            add,
        } => {
            let set = non_empty(parse_properties(&set)?);
            let add = non_empty(parse_properties(&add)?);
            if set.is_none() && add.is_none() {
                bail!("nothing to update: pass --set and/or --add");
            }
            tracker.track_people(&distinct_id, set, add, options).await
        }
        Command::Funnel {
            funnel,
            step,
            goal,
            properties,
        } => {
            let properties = parse_properties(&properties)?;
            tracker
                .track_funnel(&funnel, &step, &goal, properties, options)
                .await
        }
    };
    tracker.shutdown().await;

    let recorded = result?;
    println!("{}", if recorded { "recorded" } else { "not recorded" });
    Ok(())
}

/// `key=value` pairs into properties. Values that parse as JSON keep their
/// type (`n=3`, `ok=true`, `tags=["a"]`); anything else is a string.
fn parse_properties(pairs: &[String]) -> Result<Properties> {
    let mut properties = Properties::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("expected key=value, got `{pair}`");
        };
        if key.is_empty() {
            bail!("empty property name in `{pair}`");
        }
        let value =
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        properties.insert(key.to_string(), value);
    }
    Ok(properties)
}

fn non_empty(properties: Properties) -> Option<Properties> {
    (!properties.is_empty()).then_some(properties)
}
