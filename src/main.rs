use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use http_pressure::{
    ConfigError, Discipline, Error, Pressure, PressureExecutor, RequestTemplate, TaskGenerator,
    transport::TransportSettings,
};

/// Replays one HTTP request under concurrency or throughput pressure.
#[derive(Debug, Clone, Parser)]
#[command(name = "http-pressure")]
#[command(version, about, long_about = None)]
struct Args {
    /// path of the JSON request descriptor
    #[arg(long, short = 'r', visible_alias = "req", value_name = "PATH")]
    request: PathBuf,

    /// keep `quantity` requests in flight
    #[arg(short = 'c', long, default_value_t = false)]
    concurrency: bool,

    /// issue `quantity` requests per second
    #[arg(short = 't', long, default_value_t = false)]
    throughput: bool,

    #[command(flatten)]
    pressure: PressureArgs,

    #[command(flatten)]
    transport: TransportArgs,

    /// delay before the first request
    #[arg(long, value_name = "SECONDS", default_value_t = 1)]
    initial_delay: u64,

    /// stop after this long even if the pressure has not ended
    #[arg(long, value_name = "SECONDS")]
    run_for: Option<u64>,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
}

/// Pressure curve parameters. Exactly one complete group is used, checked in
/// the order fixed, gradient, custom.
#[derive(Debug, Clone, Default, clap::Args)]
struct PressureArgs {
    /// fixed: target quantity
    #[arg(long, value_name = "N")]
    quantity: Option<usize>,

    /// fixed: run length
    #[arg(long, value_name = "SECONDS")]
    duration: Option<u64>,

    /// fixed: time to reach the target quantity
    #[arg(long, visible_alias = "ramp-up", value_name = "SECONDS")]
    rampup: Option<u64>,

    /// gradient: first quantity
    #[arg(long, value_name = "N")]
    initial_quantity: Option<usize>,

    /// gradient: last quantity
    #[arg(long, value_name = "N")]
    final_quantity: Option<usize>,

    /// gradient: change per step
    #[arg(long, value_name = "N")]
    increment_per_step: Option<usize>,

    /// gradient and custom: step length
    #[arg(long, value_name = "SECONDS")]
    duration_per_step: Option<u64>,

    /// custom: one quantity per step
    #[arg(long, value_name = "N,...", value_delimiter = ',')]
    quantities: Vec<usize>,
}

impl PressureArgs {
    fn build(&self) -> Result<Pressure, ConfigError> {
        if let (Some(quantity), Some(duration)) = (self.quantity, self.duration) {
            let duration = Duration::from_secs(duration);
            return match self.rampup {
                Some(rampup) => {
                    Pressure::fixed_with_ramp_up(quantity, duration, Duration::from_secs(rampup))
                }
                None => Pressure::fixed(quantity, duration),
            };
        }

        if let (Some(initial), Some(last), Some(increment), Some(step)) = (
            self.initial_quantity,
            self.final_quantity,
            self.increment_per_step,
            self.duration_per_step,
        ) {
            return Pressure::gradient(initial, last, increment, Duration::from_secs(step));
        }

        if let (false, Some(step)) = (self.quantities.is_empty(), self.duration_per_step) {
            return Pressure::custom(self.quantities.clone(), Duration::from_secs(step));
        }

        Err(ConfigError::MissingPressure)
    }
}

#[derive(Debug, Clone, Default, clap::Args)]
struct TransportArgs {
    #[arg(long, value_name = "STRING")]
    user_agent: Option<String>,

    /// idle connections kept per host
    #[arg(long, value_name = "N")]
    max_connections_per_host: Option<usize>,

    #[arg(long, value_name = "MILLISECONDS")]
    connect_timeout: Option<u64>,

    #[arg(long, value_name = "MILLISECONDS")]
    request_timeout: Option<u64>,

    /// follow up to N redirects (0 = none)
    #[arg(long, value_name = "N")]
    max_redirects: Option<usize>,
}

impl TransportArgs {
    fn settings(&self) -> TransportSettings {
        TransportSettings::builder()
            .maybe_user_agent(self.user_agent.clone())
            .maybe_max_idle_per_host(self.max_connections_per_host)
            .maybe_connect_timeout(self.connect_timeout.map(Duration::from_millis))
            .maybe_request_timeout(self.request_timeout.map(Duration::from_millis))
            .maybe_max_redirects(self.max_redirects)
            .build()
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "Run failed");
        eprintln!("exit with error: {err}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> Result<(), Error> {
    let discipline = Discipline::from_flags(args.concurrency, args.throughput)?;
    let pressure = args.pressure.build()?;
    let template = RequestTemplate::from_path(&args.request)?;
    let transport = args.transport.settings().build_transport()?;

    tracing::info!(
        request = %args.request.display(),
        method = %template.method(),
        %discipline,
        ?pressure,
        "Request template loaded"
    );

    let generator = TaskGenerator::new(Arc::new(template), transport, discipline);
    let mut executor = PressureExecutor::new(generator, pressure);
    executor.start(Duration::from_secs(args.initial_delay));

    let deadline = async {
        match args.run_for {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = executor.wait() => {
            tracing::info!("Pressure completed");
            return Ok(());
        }
        _ = deadline => tracing::info!("Run time elapsed, stopping"),
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Interrupted, stopping");
        }
    }

    executor.stop().await;
    Ok(())
}
