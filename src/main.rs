use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardhost::config::ConfigStore;
use cardhost::console::{SerialConsole, ShellSessionSupervisor};
use cardhost::dispatch::EventDispatchLoop;
use cardhost::events::EventBus;
use cardhost::indicator::{GpioLamp, StatusIndicator};
use cardhost::medium::{MediumController, SpiCardTransport};
use cardhost::probe::{GpioProbe, MediumProbe, PresenceWatcher};
use cardhost::state::AppState;
use cardhost::utils::TaskRegistry;
use cardhost::volume::LinuxVolume;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// cardhost command line arguments
#[derive(Parser, Debug)]
#[command(name = "cardhost")]
#[command(version, about = "A lightweight removable-storage supervisor for embedded Linux", long_about = None)]
struct CliArgs {
    /// Config file path (default: /etc/cardhost/cardhost.json)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serial console port (overrides config)
    #[arg(long, value_name = "PORT")]
    console: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose, args.log_json);

    tracing::info!("Starting cardhost v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.unwrap_or_else(get_config_path);
    let store = ConfigStore::load(&config_path)?;
    let mut config = store.get().clone();
    if let Some(port) = args.console {
        config.console.port = port;
    }

    let shutdown = CancellationToken::new();
    let events = Arc::new(EventBus::new());
    let tasks = Arc::new(TaskRegistry::new());

    // Hardware collaborators; a missing GPIO chip or bad pin is a startup
    // failure, not a runtime one.
    let probe: Arc<dyn MediumProbe> = Arc::new(GpioProbe::open(&config.probe)?);
    let transport = Arc::new(SpiCardTransport::new(
        config.transport.clone(),
        probe.clone(),
    ));
    let volume = Arc::new(LinuxVolume::new(config.volume.clone()));

    let controller = Arc::new(MediumController::new(transport, volume.clone()));
    controller.set_event_bus(events.clone());

    let state = AppState::new(
        controller.clone(),
        probe.clone(),
        volume,
        tasks.clone(),
        events.clone(),
    );

    // Presence watcher feeding the dispatch loop
    let (presence_tx, presence_rx) = mpsc::channel(8);
    let watcher = PresenceWatcher::new(
        probe.clone(),
        presence_tx,
        events.clone(),
        config.watcher.clone(),
    );
    {
        let guard = tasks.register("presence-watcher");
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _guard = guard;
            watcher.run(shutdown).await;
        });
    }

    // Status lamp; the daemon is still useful without one
    match GpioLamp::open(&config.indicator) {
        Ok(lamp) => {
            let indicator =
                StatusIndicator::new(Arc::new(lamp), controller.clone(), &config.indicator);
            let guard = tasks.register("indicator");
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let _guard = guard;
                indicator.run(shutdown).await;
            });
        }
        Err(e) => tracing::warn!("Status lamp unavailable: {}", e),
    }

    // Event logger: every bus event lands in the log for the operator
    {
        let mut rx = events.subscribe();
        let guard = tasks.register("event-log");
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _guard = guard;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    event = rx.recv() => match event {
                        Ok(event) => tracing::debug!(?event, "system event"),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Event logger lagged, {} events dropped", n);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                    },
                }
            }
        });
    }

    // Ctrl-C cancels the shutdown token; the dispatch loop unwinds from there
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let console = Arc::new(SerialConsole::new(config.console.clone()));
    let supervisor = ShellSessionSupervisor::new(console, state, shutdown.clone());
    let dispatch = EventDispatchLoop::new(presence_rx, controller, supervisor);

    let dispatch_guard = tasks.register("dispatch");
    dispatch.run(shutdown.clone()).await;
    drop(dispatch_guard);

    shutdown.cancel();
    tracing::info!("cardhost stopped");
    Ok(())
}

/// Initialize the tracing subscriber
fn init_logging(level: LogLevel, verbose_count: u8, json: bool) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "cardhost=error",
        LogLevel::Warn => "cardhost=warn",
        LogLevel::Info => "cardhost=info",
        LogLevel::Debug => "cardhost=debug",
        LogLevel::Trace => "cardhost=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(err) = result {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Get the configuration file path
fn get_config_path() -> PathBuf {
    // Check environment variable first
    if let Ok(path) = std::env::var("CARDHOST_CONFIG") {
        return PathBuf::from(path);
    }

    PathBuf::from("/etc/cardhost/cardhost.json")
}
