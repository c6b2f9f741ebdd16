//! KARI estimator node
//!
//! Publishes "hello world {n}" on `chatter` at a fixed rate and logs the x
//! position of every local pose it receives, until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use kari_core::{DeliveryMode, LocalTransport, Scheduler, ShutdownToken, Transport};
use kari_estimator::{EstimatorConfig, EstimatorNode};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "kari_estimator")]
#[command(about = "KARI chatter publisher and local pose listener", long_about = None)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Loop rate in Hz
    #[arg(short, long)]
    rate: Option<f64>,

    /// Topic the greeting is published on
    #[arg(long)]
    publish_topic: Option<String>,

    /// Topic the pose is read from
    #[arg(long)]
    pose_topic: Option<String>,

    /// Queue size for both channels
    #[arg(short, long)]
    queue_size: Option<usize>,

    /// Stop after this many ticks
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<EstimatorConfig> {
        let mut config = match &self.config {
            Some(path) => EstimatorConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => EstimatorConfig::default(),
        };

        if let Some(rate) = self.rate {
            config.scheduler.rate_hz = rate;
        }
        if let Some(topic) = &self.publish_topic {
            config.publish.topic = topic.clone();
        }
        if let Some(topic) = &self.pose_topic {
            config.pose.topic = topic.clone();
        }
        if let Some(size) = self.queue_size {
            config.publish.queue_size = size;
            config.pose.queue_size = size;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "kari_estimator=debug,kari_core=debug,info"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.load_config()?;

    let transport = Arc::new(LocalTransport::new(DeliveryMode::Background)?);
    let shutdown = ShutdownToken::new();
    shutdown
        .cancel_on_ctrlc()
        .context("installing Ctrl-C handler")?;

    let mut node = EstimatorNode::new(transport.clone(), &config)
        .context("opening estimator channels")?;

    let liveness = transport.clone();
    let mut scheduler = Scheduler::new(config.scheduler.clone(), shutdown)
        .with_name(&config.node_name)
        .with_liveness_check(move || liveness.is_ok());

    info!(
        "{} running at {:.1} Hz (Ctrl-C to stop)",
        config.node_name, config.scheduler.rate_hz
    );

    let result = match args.ticks {
        Some(n) => scheduler.run_ticks(&mut node, n),
        None => scheduler.run(&mut node),
    };
    transport.shutdown();

    match result {
        Ok(metrics) => {
            info!(
                "Stopped after {} ticks ({} sent, {} poses received, {} overruns)",
                metrics.total_ticks,
                metrics.messages_sent,
                metrics.messages_received,
                metrics.overruns
            );
            Ok(())
        }
        Err(e) => {
            error!("Estimator stopped on error: {}", e);
            Err(e.into())
        }
    }
}
