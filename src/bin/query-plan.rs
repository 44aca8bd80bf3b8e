use clap::Parser;
use url::Url;

use query_bench::client::ConnectionRegistry;
use query_bench::config::PlanConfig;
use query_bench::discovery::{find_sql_files, load_query_files, QueryFile};
use query_bench::logging;
use query_bench::plan::{default_viewer_url, parse_viewer_url, write_plan};
use query_bench::profile::ProfileSet;

#[tokio::main]
async fn main() {
    let config = PlanConfig::parse();

    if let Err(e) = logging::init_logging(&config.common.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: PlanConfig) -> anyhow::Result<()> {
    let viewer = match config.viewer_url {
        Some(ref raw) => parse_viewer_url(raw)?,
        None => default_viewer_url()?,
    };

    let paths = find_sql_files(&config.inputs)?;
    if paths.is_empty() {
        anyhow::bail!("No .sql files found in {:?}", config.inputs);
    }
    let files = load_query_files(&paths)?;

    let settings = ProfileSet::load(config.common.profiles.as_deref())?;
    let registry = ConnectionRegistry::build(files.iter().map(|f| f.profile), &settings)?;

    let result = explain_all(&files, &registry, &viewer).await;
    registry.close();
    result
}

async fn explain_all(
    files: &[QueryFile],
    registry: &ConnectionRegistry,
    viewer: &Url,
) -> anyhow::Result<()> {
    for file in files {
        log::info!("[{}] Explaining {}", file.profile, file.path.display());
        let session = registry.gateway(file.profile)?.session().await?;
        let written = write_plan(session.as_ref(), file, viewer).await?;
        println!("{}", written.display());
    }
    Ok(())
}
