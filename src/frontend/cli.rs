use crate::cache::ThreadSafeCache;
use crate::demo::{AsyncOrderService, FileReport, NotificationTask, ParallelFileProcessor};
use crate::infrastructure::config::{Config, LogFormatName};
use crate::infrastructure::logging::{init_logging, LogConfig};
use crate::infrastructure::metrics::MetricsSnapshot;
use crate::core::TaskStatus;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    pub files: Vec<String>,
    pub workers: Option<usize>,
    pub delay: Duration,
    pub config_path: Option<PathBuf>,
    pub log_format: Option<LogFormatName>,
    pub json: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            workers: None,
            delay: Duration::from_millis(1000),
            config_path: None,
            log_format: None,
            json: false,
        }
    }
}

/// Everything the demonstration run produced
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
    pub cache_value: Option<String>,
    pub order: Result<String, String>,
    pub notification: TaskStatus,
    pub metrics: MetricsSnapshot,
    pub graceful_shutdown: bool,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.order.is_ok()
            && self.notification == TaskStatus::Completed
            && self.files.iter().all(|f| f.status == TaskStatus::Completed)
    }
}

pub struct Cli {
    config: CliConfig,
    settings: Config,
}

impl Cli {
    pub fn new(config: CliConfig, settings: Config) -> Self {
        Self { config, settings }
    }

    pub fn run(&self) -> Result<RunSummary, Box<dyn std::error::Error>> {
        info!("Starting concurrency demonstration");

        // 1. Parallel file processing
        let files = if self.config.files.is_empty() {
            vec!["file1.txt".to_string(), "file2.txt".to_string(), "file3.txt".to_string()]
        } else {
            self.config.files.clone()
        };
        let processor = ParallelFileProcessor::new(&self.settings.pool, self.config.delay)?;
        let reports = processor.process_files(&files)?;
        let shutdown = processor.shutdown();
        let metrics = processor.metrics();

        // 2. Thread-safe cache
        let cache = ThreadSafeCache::with_capacity(self.settings.cache.initial_capacity);
        cache.put("user1".to_string(), "Pradeep".to_string())?;
        cache.put("user2".to_string(), "Kumar".to_string())?;
        let cache_value = cache.get("user1")?;
        info!(value = ?cache_value, "Cache value");

        // 3. Order processing
        let order = AsyncOrderService::new(self.config.delay)
            .process_order()
            .map_err(|e| e.to_string());

        // 4. Detached notification
        let notification = match NotificationTask::new("Order completed", self.config.delay / 2)
            .send()?
            .join()
        {
            Ok(()) => TaskStatus::Completed,
            Err(e) => {
                error!("Notification failed: {}", e);
                TaskStatus::Failed
            }
        };

        info!("Demonstration completed");
        Ok(RunSummary {
            files: reports,
            cache_value,
            order,
            notification,
            metrics,
            graceful_shutdown: shutdown.graceful,
        })
    }

    pub fn print_summary(&self, summary: &RunSummary) -> Result<(), serde_json::Error> {
        if self.config.json {
            println!("{}", serde_json::to_string_pretty(summary)?);
            return Ok(());
        }

        for report in &summary.files {
            match &report.error {
                Some(e) => println!("{}: {} ({})", report.file, report.status, e),
                None => println!("{}: {}", report.file, report.status),
            }
        }
        println!("cache user1 = {}", summary.cache_value.as_deref().unwrap_or("<absent>"));
        match &summary.order {
            Ok(result) => println!("order: {}", result),
            Err(e) => println!("order failed: {}", e),
        }
        println!("notification: {}", summary.notification);
        println!(
            "tasks: {} submitted, {} completed, {} failed",
            summary.metrics.submitted, summary.metrics.completed, summary.metrics.failed
        );
        Ok(())
    }
}

fn usage(prog: &str) -> String {
    format!(
        "taskyard - worker pool, join and cache demonstration\n\n\
        USAGE:\n    {} [OPTIONS] [files...]\n\n\
        OPTIONS:\n    \
        -h, --help            Print help information\n    \
        --files A,B,C         Files to process (default: file1.txt,file2.txt,file3.txt)\n    \
        --workers N           Worker pool width (default from config: 3)\n    \
        --delay-ms N          Simulated work per task in milliseconds (default: 1000)\n    \
        --config PATH         Read settings from PATH instead of taskyard.toml\n    \
        --log-format FORMAT   pretty, compact or json\n    \
        --json                Print the run summary as JSON",
        prog
    )
}

fn arg_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a String, String> {
    args.get(i)
        .ok_or_else(|| format!("{} requires an argument", flag))
}

pub fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let prog = args.first().map(String::as_str).unwrap_or("taskyard");
    let mut config = CliConfig::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => return Err(usage(prog)),
            "--json" => config.json = true,
            "--files" => {
                i += 1;
                config.files.extend(
                    arg_value(args, i, "--files")?
                        .split(',')
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(String::from),
                );
            }
            "--workers" => {
                i += 1;
                let n = arg_value(args, i, "--workers")?
                    .parse()
                    .map_err(|_| "Invalid value for --workers".to_string())?;
                config.workers = Some(n);
            }
            "--delay-ms" => {
                i += 1;
                let ms = arg_value(args, i, "--delay-ms")?
                    .parse()
                    .map_err(|_| "Invalid value for --delay-ms".to_string())?;
                config.delay = Duration::from_millis(ms);
            }
            "--config" => {
                i += 1;
                config.config_path = Some(PathBuf::from(arg_value(args, i, "--config")?));
            }
            "--log-format" => {
                i += 1;
                config.log_format = Some(match arg_value(args, i, "--log-format")?.as_str() {
                    "pretty" => LogFormatName::Pretty,
                    "compact" => LogFormatName::Compact,
                    "json" => LogFormatName::Json,
                    other => return Err(format!("Unknown log format: {}", other)),
                });
            }
            arg if arg.starts_with("--") => {
                return Err(format!("Unknown option: {}\n\n{}", arg, usage(prog)));
            }
            file => config.files.push(file.to_string()),
        }
        i += 1;
    }

    Ok(config)
}

/// Merge the file settings with command-line overrides
pub fn resolve_settings(cli: &CliConfig) -> Result<Config, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config_path {
        Some(path) => Config::load(path)?,
        None => Config::discover(),
    };

    if let Some(workers) = cli.workers {
        settings.pool.width = workers;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    settings.validate()?;
    Ok(settings)
}

/// Entry point for CLI binary
pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let config = parse_args(&args)?;
    let settings = resolve_settings(&config)?;

    let _guard = init_logging(LogConfig::from_config(&settings.logging));

    let cli = Cli::new(config, settings);
    let summary = cli.run()?;
    cli.print_summary(&summary)?;

    if !summary.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
