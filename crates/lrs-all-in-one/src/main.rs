mod config;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use config::ServiceConfig;
use lrs_domain::{InvocationContext, StatementQueue, StatementStore, WriteAuthGate};
use lrs_postgres::{
    PostgresCaliperStore, PostgresClient, PostgresConfig, PostgresWriteAuthGate,
    PostgresXapiStore,
};
use lrs_runner::Runner;
use lrs_sqs::SqsStatementQueue;
use lrs_worker::{MessageProcessor, PollDispatcher, PollDispatcherConfig, TaskInvoker};
use telemetry::init_telemetry;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_telemetry(&config.log_level);

    info!(queue_url = %config.queue_url, "Starting lrs-all-in-one service");

    let dispatcher = match build_pipeline(&config).await {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!("Failed to initialize pipeline: {e:#}");
            std::process::exit(1);
        }
    };

    let result = Runner::new()
        .with_named_process("poll_dispatcher", move |ctx| dispatcher.run(ctx))
        .with_closer(|| async move {
            info!("Running cleanup tasks...");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;

    match result {
        Ok(()) => info!("Service exiting normally"),
        Err(e) => {
            error!("Service exiting with error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn build_pipeline(config: &ServiceConfig) -> anyhow::Result<PollDispatcher> {
    info!("Initializing PostgreSQL...");
    let postgres = PostgresClient::new(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_pool_size,
    })?;
    postgres.ping().await?;

    let auth_gate: Arc<dyn WriteAuthGate> =
        Arc::new(PostgresWriteAuthGate::new(postgres.clone()));
    let xapi_store: Arc<dyn StatementStore> = Arc::new(PostgresXapiStore::new(postgres.clone()));
    let caliper_store: Arc<dyn StatementStore> =
        Arc::new(PostgresCaliperStore::new(postgres));

    info!("Initializing SQS...");
    let queue: Arc<dyn StatementQueue> =
        Arc::new(SqsStatementQueue::from_env(config.queue_url.clone()).await);

    let processor = Arc::new(MessageProcessor::new(
        Arc::clone(&queue),
        auth_gate,
        xapi_store,
        caliper_store,
    ));

    let template_context = InvocationContext {
        function_name: config.function_name.clone(),
        log_group_name: config.log_group_name.clone(),
        log_stream_name: config.log_stream_name.clone(),
        invocation_id: String::new(),
    };
    let invoker = Arc::new(TaskInvoker::new(
        processor,
        template_context,
        config.max_in_flight,
    ));

    Ok(PollDispatcher::new(
        queue,
        invoker,
        PollDispatcherConfig {
            batch_size: config.poll_batch_size,
            visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        },
    ))
}
