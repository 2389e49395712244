use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Cell;
use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::auth::{BasicCredentials, ClientCredentials};
use crate::config::Config;
use crate::discovery;
use crate::events::{estimate_duration, EventCorrelationEngine, Transition};
use crate::gocd::{GoCdClient, PipelineSource, StageStatusNotification};
use crate::octane::{EventSink, OctaneClient, TestResultsQueue};
use crate::output::{self, paint, JsonLinesSink, Tone};

const DEFAULT_INSTANCE_ID: &str = "gocd";

#[derive(Parser)]
#[command(name = "gocd-octane")]
#[command(
    author,
    version,
    about = "Forwards GoCD stage notifications to Octane as pipeline events",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    #[command(flatten)]
    gocd: GoCdArgs,
}

#[derive(Args)]
struct GoCdArgs {
    /// GoCD server URL, overrides the configuration file
    #[arg(long, global = true, env = "GOCD_URL")]
    gocd_url: Option<String>,

    #[arg(long, global = true, env = "GOCD_USERNAME")]
    gocd_user: Option<String>,

    #[arg(long, global = true, env = "GOCD_PASSWORD", hide_env_values = true)]
    gocd_password: Option<String>,
}

#[derive(Args)]
struct OctaneArgs {
    /// Octane UI URL with the `p=<shared space>/<workspace>` parameter
    #[arg(long, env = "OCTANE_URL")]
    octane_url: Option<String>,

    #[arg(long, env = "OCTANE_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, env = "OCTANE_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, env = "OCTANE_INSTANCE_ID")]
    instance_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process stage notifications, one JSON document per line
    Notify {
        /// Read notifications from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print events as JSON lines instead of sending them to Octane
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        #[command(flatten)]
        octane: OctaneArgs,
    },
    /// Estimate the duration of a pipeline's next run
    Estimate {
        #[arg(short = 'P', long)]
        pipeline: String,

        /// Number of recent successful runs to consider
        #[arg(short, long)]
        samples: Option<usize>,
    },
    /// List all pipelines known to GoCD
    Pipelines,
    /// Show the stage and job structure of a pipeline
    Structure {
        #[arg(short = 'P', long)]
        pipeline: String,
    },
    /// Show a snapshot of a pipeline's latest run
    Snapshot {
        #[arg(short = 'P', long)]
        pipeline: String,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = self.resolve_config()?;

        match &self.command {
            Commands::Notify {
                file,
                dry_run,
                octane,
            } => {
                self.execute_notify(&config, octane, file.as_deref(), *dry_run)
                    .await
            }
            Commands::Estimate { pipeline, samples } => {
                let samples = samples.unwrap_or(config.events.estimate_samples);
                self.execute_estimate(&config, pipeline, samples).await
            }
            Commands::Pipelines => self.execute_pipelines(&config).await,
            Commands::Structure { pipeline } => {
                let gocd = gocd_client(&config)?;
                let structure = discovery::pipeline_structure(&gocd, pipeline).await?;
                if structure.is_none() {
                    warn!("Pipeline {pipeline} was not found");
                }
                self.emit(&structure)
            }
            Commands::Snapshot { pipeline } => {
                let gocd = gocd_client(&config)?;
                let snapshot = discovery::latest_snapshot(&gocd, pipeline).await?;
                if snapshot.is_none() {
                    warn!("Pipeline {pipeline} has no runs");
                }
                self.emit(&snapshot)
            }
        }
    }

    fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(url) = &self.gocd.gocd_url {
            config.gocd.base_url.clone_from(url);
        }
        if let Some(user) = &self.gocd.gocd_user {
            config.gocd.username = Some(user.clone());
        }
        if let Some(password) = &self.gocd.gocd_password {
            config.gocd.password = Some(password.clone());
        }

        Ok(config)
    }

    fn emit<T: serde::Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        output::emit_json(value, self.output.as_deref(), self.pretty)?;
        Ok(())
    }

    async fn execute_notify(
        &self,
        config: &Config,
        octane: &OctaneArgs,
        file: Option<&Path>,
        dry_run: bool,
    ) -> Result<()> {
        let gocd: Arc<dyn PipelineSource> = Arc::new(gocd_client(config)?);

        let (sink, queue): (Arc<dyn EventSink>, Arc<TestResultsQueue>) = if dry_run {
            let sink = JsonLinesSink::stdout(self.pretty);
            let queue = sink.test_results_queue();
            (Arc::new(sink), queue)
        } else {
            let client = octane_client(config, octane)?;
            let queue = client.test_results_queue();
            (Arc::new(client), queue)
        };

        let engine = EventCorrelationEngine::new(gocd, sink)
            .with_estimate_samples(config.events.estimate_samples);

        let processed = match file {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                process_notifications(&engine, BufReader::new(file)).await?
            }
            None => process_notifications(&engine, BufReader::new(tokio::io::stdin())).await?,
        };

        print_processed(&processed);

        let pending = queue.drain();
        info!("{} test results pulls requested", pending.len());
        if !pending.is_empty() {
            self.emit(&pending)?;
        }

        Ok(())
    }

    async fn execute_estimate(&self, config: &Config, pipeline: &str, samples: usize) -> Result<()> {
        info!("Estimating duration of {pipeline} from up to {samples} runs");

        let gocd = gocd_client(config)?;
        let estimate = estimate_duration(&gocd, pipeline, samples).await?;

        match estimate {
            Some(millis) => eprintln!(
                "{} {pipeline}: {:.1}min",
                paint("Estimated duration", Tone::Good),
                millis as f64 / 60_000.0
            ),
            None => eprintln!(
                "{} {pipeline}: no successful runs with timing data",
                paint("No estimate", Tone::Warning)
            ),
        }

        self.emit(&serde_json::json!({
            "pipeline": pipeline,
            "estimatedDuration": estimate,
        }))
    }

    async fn execute_pipelines(&self, config: &Config) -> Result<()> {
        let gocd = gocd_client(config)?;
        let list = discovery::list_pipelines(&gocd).await?;

        let mut structures = Vec::with_capacity(list.jobs.len());
        for pipeline in &list.jobs {
            structures.push(discovery::pipeline_structure(&gocd, &pipeline.name).await?);
        }

        eprintln!("{}", output::pipelines_table(&list, &structures));
        self.emit(&list)
    }
}

/// Outcome of one line of input, kept for the summary table.
struct Processed {
    notification: StageStatusNotification,
    transition: Option<Transition>,
}

/// Feeds notifications to the engine one at a time, in input order.
///
/// A line that cannot be parsed or handled is logged and skipped; it never
/// stops the remaining notifications.
async fn process_notifications<R>(
    engine: &EventCorrelationEngine,
    reader: R,
) -> Result<Vec<Processed>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut processed = Vec::new();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let notification = match StageStatusNotification::from_json(line) {
            Ok(notification) => notification,
            Err(e) => {
                warn!("Skipping line {line_number}: not a stage notification: {e}");
                continue;
            }
        };

        let transition = match engine.on_stage_status(Some(&notification)).await {
            Ok(transition) => Some(transition),
            Err(e) => {
                warn!(
                    "Failed to handle {} #{} stage '{}': {e}",
                    notification.pipeline_name, notification.pipeline_counter, notification.stage_name
                );
                None
            }
        };

        processed.push(Processed {
            notification,
            transition,
        });
    }

    Ok(processed)
}

fn print_processed(processed: &[Processed]) {
    if processed.is_empty() {
        eprintln!("{}", paint("No stage notifications received", Tone::Warning));
        return;
    }

    let mut table = output::create_table();
    table.set_header(vec!["Pipeline", "Run", "Stage", "State", "Outcome"]);

    for entry in processed {
        let n = &entry.notification;
        let outcome = entry
            .transition
            .map_or_else(|| Cell::new(paint("error", Tone::Error).to_string()), output::transition_cell);
        table.add_row(vec![
            Cell::new(&n.pipeline_name),
            Cell::new(&n.pipeline_counter),
            Cell::new(&n.stage_name),
            Cell::new(n.stage_state),
            outcome,
        ]);
    }

    eprintln!("{table}");
}

fn gocd_client(config: &Config) -> Result<GoCdClient> {
    let credentials = config.gocd.username.as_ref().map(|username| {
        BasicCredentials::new(
            username.as_str(),
            config.gocd.password.clone().unwrap_or_default(),
        )
    });

    GoCdClient::new(&config.gocd.base_url, credentials)
        .with_context(|| format!("Failed to set up GoCD client for {}", config.gocd.base_url))
}

fn octane_client(config: &Config, args: &OctaneArgs) -> Result<OctaneClient> {
    let mut octane = config.octane.clone();
    if let Some(url) = &args.octane_url {
        octane.server_url = Some(url.clone());
    }
    if let Some(id) = &args.client_id {
        octane.client_id = Some(id.clone());
    }
    if let Some(secret) = &args.client_secret {
        octane.client_secret = Some(secret.clone());
    }
    if let Some(instance) = &args.instance_id {
        octane.instance_id = Some(instance.clone());
    }

    let endpoint = octane.endpoint()?;
    let client_id = octane
        .client_id
        .context("Octane client ID is required (--client-id or OCTANE_CLIENT_ID)")?;
    let client_secret = octane
        .client_secret
        .context("Octane client secret is required (--client-secret or OCTANE_CLIENT_SECRET)")?;
    let instance_id = octane
        .instance_id
        .unwrap_or_else(|| DEFAULT_INSTANCE_ID.to_string());

    info!(
        "Sending events to Octane at {} (shared space {})",
        endpoint.base_url, endpoint.shared_space
    );

    Ok(OctaneClient::new(
        &endpoint,
        ClientCredentials::new(client_id, client_secret),
        &config.gocd.base_url,
        &instance_id,
    )?)
}
