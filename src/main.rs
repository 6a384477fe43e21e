use anyhow::Result;
use clap::Parser;
use iris_proxy::config::ProxyConfig;
use iris_proxy::server;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "iris-proxy", about = "HTTP/1.1 caching forward proxy")]
struct Cli {
    /// Path to proxy config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listening port, bound on all interfaces
    #[arg(short, long)]
    port: Option<u16>,

    /// Worker threads handling client connections
    #[arg(long)]
    workers: Option<usize>,

    /// Cache capacity in entries
    #[arg(long)]
    cache_entries: Option<usize>,

    /// Access-log file path
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ProxyConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(cache_entries) = cli.cache_entries {
        config.cache_entries = cache_entries;
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = log_file;
    }
    config.validate()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    rt.block_on(server::bootstrap::run(config))
}
