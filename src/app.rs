//! Command execution, decoupled from the entry point.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::{Command, LogsArgs, ServeArgs, ServerInfoArgs, SqlFilesArgs};
use crate::collector::Collector;
use crate::collectors::pg_logs::PgLogsCollector;
use crate::collectors::server_info::ServerInfoCollector;
use crate::collectors::sql_files::{collect_sql_files, SearchConfig, SearchMode, SqlFile};
use crate::collectors::system::SystemCollector;
use crate::config::Config;
use crate::db::{Connector, PgConnector};
use crate::metrics::defaults::register_default_metrics;
use crate::metrics::system::SystemMetricsExporter;
use crate::metrics::MetricRegistry;
use crate::models::{BatchReviewRequest, MigrationReviewRequest, QueryReviewRequest, Recommendation};
use crate::report;
use crate::review::ReviewClient;
use crate::secrets::{SecretStore, VaultClient};
use crate::server::CollectorServer;
use crate::task_manager::TaskManager;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Everything a command needs: configuration plus the secret store and
/// database connector it talks through.
pub struct App {
    config: Config,
    secrets: Arc<dyn SecretStore>,
    connector: Arc<dyn Connector>,
}

fn print_recommendation(rec: &Recommendation) {
    println!("Recommendation:");
    println!("  Content: {}", rec.content);
    println!("  Criticality: {}", rec.criticality);
    println!("  Recommendation: {}", rec.recommendation);
}

impl App {
    /// Builds the production backends from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let secrets = VaultClient::new(&config.vault).context("failed to create secret store client")?;
        let connector = PgConnector::new(&config.database);
        Ok(Self::with_backends(config, Arc::new(secrets), Arc::new(connector)))
    }

    pub fn with_backends(
        config: Config,
        secrets: Arc<dyn SecretStore>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            config,
            secrets,
            connector,
        }
    }

    fn review_client(&self) -> Result<ReviewClient> {
        ReviewClient::from_config(&self.config.review_api).context("failed to create review client")
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Csi(args) => self.server_info(args).await,
            Command::Csm(args) => self.system_metrics(args).await,
            Command::Csf(args) => self.sql_files(args).await,
            Command::Pglogs(args) => self.pg_logs(args).await,
            Command::Serve(args) => self.serve(args).await,
        }
    }

    async fn server_info(&self, args: ServerInfoArgs) -> Result<()> {
        let collector = ServerInfoCollector::new(self.secrets.clone(), self.connector.clone());
        let data = collector
            .collect_server_data(&args.vault_path, &self.config.environment)
            .await
            .context("failed to collect server data")?;
        info!(
            version = %data.server_info.version,
            host = %data.server_info.host,
            database = %data.server_info.database,
            "Collected server info"
        );

        let recommendation = self
            .review_client()?
            .analyze_config(&data, args.scheduled)
            .await
            .context("failed to analyze config")?;
        print_recommendation(&recommendation);

        if let Some(path) = args.output.as_deref() {
            report::write_server_data(path, &data, Some(&recommendation))?;
        }
        Ok(())
    }

    async fn system_metrics(&self, args: ServerInfoArgs) -> Result<()> {
        let metrics = SystemCollector::new().collect();
        info!(
            cores = metrics.cpu_cores,
            ram_source = metrics.ram_source.as_str(),
            "Collected system metrics"
        );

        let collector = ServerInfoCollector::new(self.secrets.clone(), self.connector.clone());
        let server_info = collector
            .collect_server_info(&args.vault_path)
            .await
            .context("failed to collect server info")?;

        let recommendation = self
            .review_client()?
            .analyze_system_metrics(
                &metrics,
                &server_info,
                &self.config.environment,
                args.scheduled,
            )
            .await
            .context("failed to analyze system metrics")?;
        print_recommendation(&recommendation);

        if let Some(path) = args.output.as_deref() {
            report::write_system_metrics(path, &metrics, Some(&server_info), Some(&recommendation))?;
        }
        Ok(())
    }

    async fn sql_files(&self, args: SqlFilesArgs) -> Result<()> {
        let search = SearchConfig {
            root: args.dir.clone(),
            mode: args.search_mode(),
            migrations_path: args.migrations_path.clone(),
            specific_files: args.files.clone(),
            enable_ignore: args.enable_ignore,
            ignore_files: args.ignore.clone(),
        };
        let files = tokio::task::spawn_blocking(move || collect_sql_files(&search))
            .await
            .context("SQL file walk task failed")?
            .context("failed to collect SQL files")?;
        info!(count = files.len(), root = %args.dir.display(), "Collected SQL files");

        if let Some(path) = args.output.as_deref() {
            report::write_sql_files(path, &files)?;
        }
        if args.no_review || files.is_empty() {
            return Ok(());
        }

        let client = self.review_client()?;
        if args.search_mode() == SearchMode::MigrationsOnly {
            self.review_migrations(&client, &files).await
        } else {
            self.review_queries(&client, &files).await
        }
    }

    async fn review_migrations(&self, client: &ReviewClient, files: &[SqlFile]) -> Result<()> {
        for file in files {
            let request = MigrationReviewRequest {
                sql: file.content.clone(),
                environment: self.config.environment.clone(),
            };
            let response = client
                .review_migration(&request)
                .await
                .with_context(|| format!("failed to review migration {}", file.title))?;
            println!("----- {} -----", file.title);
            println!("Score: {}", response.score);
            for item in &response.issues {
                println!("  issue: {}", item);
            }
            for item in &response.warnings {
                println!("  warning: {}", item);
            }
            for item in &response.recommendations {
                println!("  recommendation: {}", item);
            }
        }
        Ok(())
    }

    async fn review_queries(&self, client: &ReviewClient, files: &[SqlFile]) -> Result<()> {
        let request = BatchReviewRequest {
            queries: files
                .iter()
                .map(|file| QueryReviewRequest {
                    sql: file.content.clone(),
                    thread_id: file.title.clone(),
                    environment: self.config.environment.clone(),
                    ..QueryReviewRequest::default()
                })
                .collect(),
            environment: self.config.environment.clone(),
        };
        let response = client
            .review_batch(&request)
            .await
            .context("failed to review SQL files")?;

        if response.results.len() != files.len() {
            warn!(
                sent = files.len(),
                received = response.results.len(),
                "Review API returned a different number of results"
            );
        }
        for (file, result) in files.iter().zip(&response.results) {
            println!("----- {} -----", file.title);
            println!("Score: {}", result.score);
            for item in &result.issues {
                println!("  issue: {}", item);
            }
            for item in &result.recommendations {
                println!("  recommendation: {}", item);
            }
        }
        Ok(())
    }

    async fn pg_logs(&self, args: LogsArgs) -> Result<()> {
        let window_secs = args.window_secs.unwrap_or(self.config.logs.window_secs);
        let collector = PgLogsCollector::new(
            self.secrets.clone(),
            self.connector.clone(),
            self.config.logs.directory.clone(),
        );
        let logs = collector
            .collect(&args.vault_path, window_secs)
            .await
            .context("failed to collect PG logs")?;
        info!(window_secs, "Collected PostgreSQL logs");

        let path = report::report_path(args.output.as_deref(), "pglogs");
        report::write_logs(&path, &logs, window_secs)
    }

    async fn serve(&self, _args: ServeArgs) -> Result<()> {
        let addr = self.config.listen_address()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        info!("Collector server listening on http://{}", listener.local_addr()?);

        let tasks = self.start_server(listener)?;

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("Shutdown signal received.");

        let failed = tasks.shutdown(SHUTDOWN_GRACE).await;
        if !failed.is_empty() {
            anyhow::bail!("tasks failed to shut down cleanly: {:?}", failed);
        }
        Ok(())
    }

    /// Spawns the collector server on `listener`, plus the system metrics
    /// exporter when its interval is non-zero.
    pub fn start_server(&self, listener: TcpListener) -> Result<TaskManager> {
        let registry = Arc::new(MetricRegistry::new());
        register_default_metrics(&registry).context("failed to register default metrics")?;

        let tasks = TaskManager::new();
        let collector = Arc::new(Collector::new(
            self.secrets.clone(),
            self.connector.clone(),
            registry.clone(),
        ));
        let server = CollectorServer::new(listener, collector, tasks.subscribe());
        tasks.spawn("collector_server", server.run());

        let interval = self.config.server.system_metrics_interval_secs;
        if interval > 0 {
            let exporter = SystemMetricsExporter::new(
                registry,
                Duration::from_secs(interval),
                tasks.subscribe(),
            );
            tasks.spawn("system_metrics_exporter", exporter.run());
        }
        Ok(tasks)
    }
}
