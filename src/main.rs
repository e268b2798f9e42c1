#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use hitwindow::ingest::{apply, parse_event};
use hitwindow::observability::init_tracing;
use hitwindow::{Collector, Config, Evictor};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const DEFAULT_SCOPE: &str = "default";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = Config::path_from_env();
    let config = Config::load(&config_path)?;
    init_tracing(config.log_json)?;

    info!(
        path = %config_path.display(),
        window_seconds = config.window_seconds,
        metrics = config.metrics.len(),
        "Configuration loaded"
    );

    let collector = Arc::new(Collector::new());
    for metric in &config.metrics {
        collector.register(DEFAULT_SCOPE, metric.build(config.window_seconds)?)?;
        debug!("Registered metric {}", metric.name);
    }

    let evictor = Evictor::new(Arc::clone(&collector), config.evict_interval())?.spawn();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let mut render = interval(config.render_interval());
    render.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    render.tick().await;

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            _ = render.tick() => {
                if let Some(text) = collector.render(DEFAULT_SCOPE) {
                    stdout.write_all(text.as_bytes()).await?;
                    stdout.flush().await?;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_event(&line) {
                    Ok(Some(event)) => {
                        if let Err(e) = apply(&collector, DEFAULT_SCOPE, &event) {
                            warn!("Dropping event {:?}: {}", line, e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Malformed event line {:?}: {}", line, e),
                },
                Ok(None) => {
                    info!("Input closed, writing final exposition");
                    if let Some(text) = collector.render(DEFAULT_SCOPE) {
                        stdout.write_all(text.as_bytes()).await?;
                        stdout.flush().await?;
                    }
                    break;
                }
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
            },
        }
    }

    evictor.shutdown().await;
    Ok(())
}
