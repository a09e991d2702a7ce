mod config;

use anyhow::Context;
use common::auth::JwtIdentityProvider;
use common::domain::{IdGenerator, MessageQueue, XidGenerator};
use common::nats::{JetStreamQueue, NatsClient};
use common::postgres::{
    PostgresBatchRepository, PostgresClient, PostgresFinancialRecordRepository, PostgresMigrator,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use crate::config::ServiceConfig;
use finrisk_api::{
    BatchIngestionService, BatchStatusService, FinriskApi, FinriskApiServices, HttpRiskScorer,
    RiskAssessmentService,
};
use finrisk_runner::Runner;
use ledger_worker::{LedgerWorker, LedgerWorkerDependencies, PipelineConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // Missing or empty queue names stop the process before anything starts
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        work_queue = %config.work_queue,
        dead_letter_queue = %config.dead_letter_queue,
        "Starting finrisk-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    let pipeline_config = Arc::new(config.pipeline_config());

    let deps = match initialize_shared_dependencies(&config, &pipeline_config).await {
        Ok(deps) => deps,
        Err(e) => {
            error!("Failed to initialize shared dependencies: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let id_generator: Arc<dyn IdGenerator> = Arc::new(XidGenerator);

    // HTTP surface: ingestion, batch status, risk query
    let services = FinriskApiServices {
        ingestion: Arc::new(BatchIngestionService::new(
            deps.batch_repository.clone(),
            deps.queue.clone(),
            id_generator.clone(),
            pipeline_config.work_queue.clone(),
        )),
        batch_status: Arc::new(BatchStatusService::new(deps.batch_repository.clone())),
        risk_assessment: Arc::new(RiskAssessmentService::new(
            deps.record_repository.clone(),
            Arc::new(HttpRiskScorer::new(config.risk_scorer_config())),
        )),
        identity_provider: Arc::new(JwtIdentityProvider::new(config.jwt_config())),
    };
    let finrisk_api = FinriskApi::new(services, config.http_config());

    let ledger_worker = LedgerWorker::new(
        LedgerWorkerDependencies {
            record_repository: deps.record_repository,
            batch_repository: deps.batch_repository,
            queue: deps.queue,
            id_generator,
        },
        pipeline_config,
    );

    let mut runner =
        Runner::new().with_named_process("finrisk_api", finrisk_api.into_runner_process());

    for (name, process) in ledger_worker.into_runner_processes() {
        runner = runner.with_named_process(name, process);
    }

    runner = runner
        .with_closer({
            let nats_client = Arc::clone(&deps.nats_client);
            move || async move {
                info!("Running cleanup tasks...");
                if let Err(e) = nats_client.close().await {
                    error!("Failed to flush NATS connection: {}", e);
                }

                // Flush pending traces and logs
                shutdown_telemetry(telemetry_providers);

                info!("Cleanup complete");
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(10));

    if let Err(e) = runner.run().await {
        eprintln!("finrisk-all-in-one stopped with error: {:#}", e);
        std::process::exit(1);
    }
}

struct SharedDependencies {
    record_repository: Arc<PostgresFinancialRecordRepository>,
    batch_repository: Arc<PostgresBatchRepository>,
    nats_client: Arc<NatsClient>,
    queue: Arc<dyn MessageQueue>,
}

async fn initialize_shared_dependencies(
    config: &ServiceConfig,
    pipeline: &PipelineConfig,
) -> anyhow::Result<SharedDependencies> {
    // PostgreSQL initialization
    info!("Initializing PostgreSQL...");
    let postgres_config = config.postgres_config();
    let migrator = PostgresMigrator::from_config(&postgres_config);
    migrator
        .migrate()
        .await
        .context("failed to run ledger migrations")?;
    match migrator.status().await {
        Ok(status) => debug!(%status, "Ledger migrations applied"),
        Err(e) => debug!(error = %e, "Could not read migration status"),
    }
    let postgres_client = PostgresClient::from_config(&postgres_config)?;
    tokio::time::timeout(config.startup_timeout(), postgres_client.ping())
        .await
        .context("timed out connecting to PostgreSQL")??;

    // NATS initialization
    info!("Initializing NATS...");
    let nats_client =
        Arc::new(NatsClient::connect(&config.nats_url, config.startup_timeout()).await?);
    let queue = JetStreamQueue::new(nats_client.clone(), config.visibility_timeout());
    for name in [&pipeline.work_queue, &pipeline.dead_letter_queue] {
        queue
            .ensure_queue(name)
            .await
            .with_context(|| format!("failed to provision queue {}", name))?;
    }

    Ok(SharedDependencies {
        record_repository: Arc::new(PostgresFinancialRecordRepository::new(
            postgres_client.clone(),
        )),
        batch_repository: Arc::new(PostgresBatchRepository::new(postgres_client)),
        nats_client,
        queue: Arc::new(queue),
    })
}
