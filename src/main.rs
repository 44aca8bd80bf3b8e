use std::sync::{Arc, Mutex};

use clap::Parser;

use query_bench::client::ConnectionRegistry;
use query_bench::config::Config;
use query_bench::discovery::{find_sql_files, load_query_files};
use query_bench::logging;
use query_bench::profile::ProfileSet;
use query_bench::reporter::json_reporter::{write_json_report, ReportConfig};
use query_bench::reporter::summary::render_summary;
use query_bench::reporter::{file_column_width, summarize, StreamingLogger};
use query_bench::runner::{run_benchmark, BenchItem};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = logging::init_logging(&config.common.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let paths = find_sql_files(&config.paths())?;
    if paths.is_empty() {
        anyhow::bail!("No .sql files found in {:?}", config.inputs);
    }
    let files = load_query_files(&paths)?;

    let settings = ProfileSet::load(config.common.profiles.as_deref())?;
    let registry = ConnectionRegistry::build(files.iter().map(|f| f.profile), &settings)?;

    let file_width = file_column_width(paths.iter().map(|p| p.as_path()));
    let items = files
        .into_iter()
        .map(|file| {
            let target = registry.gateway(file.profile)?;
            Ok(BenchItem::from_file(file, target))
        })
        .collect::<query_bench::Result<Vec<_>>>()?;

    let options = config.bench_options();
    let logger = Arc::new(Mutex::new(StreamingLogger::stdout(file_width)));
    let outcome = run_benchmark(items, &options, logger).await;

    registry.close();
    let outcome = outcome?;

    log::info!(
        "Completed {} query run(s) in {:.2}s",
        outcome.task_count(),
        outcome.duration.as_secs_f64()
    );

    let summaries = summarize(&outcome.runs);
    if config.summary {
        print!("{}", render_summary(&summaries));
    }

    if let Some(ref output_dir) = config.output_dir {
        let report_config = ReportConfig {
            num_runs: options.num_runs,
            concurrency: options.concurrency,
            task_timeout_secs: config.task_timeout_secs,
            files: paths,
        };
        let path = write_json_report(&outcome.runs, &summaries, &report_config, output_dir)?;
        log::info!("JSON report: {}", path.display());
    }

    Ok(())
}
