use anyhow::{Context, Result};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, PullConsumer},
    stream::{Config as StreamConfig, RetentionPolicy},
};
use std::time::Duration;
use tracing::{debug, info};

pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client.clone());

        info!("Successfully connected to NATS");
        Ok(Self { client, jetstream })
    }

    /// Ensures the work-queue stream backing one logical queue exists.
    /// The queue name is the stream's only subject. Returns the stream name.
    pub async fn ensure_queue_stream(&self, queue: &str) -> Result<String> {
        let stream_name = stream_name_for(queue);
        info!(queue = %queue, stream = %stream_name, "Ensuring stream exists");

        match self.jetstream.get_stream(&stream_name).await {
            Ok(_) => {
                info!(stream = %stream_name, "Stream already exists");
            }
            Err(_) => {
                let stream_config = StreamConfig {
                    name: stream_name.clone(),
                    subjects: vec![queue.to_string()],
                    retention: RetentionPolicy::WorkQueue,
                    description: Some(format!("Work queue for {}", queue)),
                    ..Default::default()
                };

                self.jetstream
                    .create_stream(stream_config)
                    .await
                    .context("Failed to create stream")?;
                info!(stream = %stream_name, "Created stream");
            }
        }

        Ok(stream_name)
    }

    /// Durable pull consumer with explicit acks. Messages not acked within
    /// `ack_wait` are redelivered.
    pub async fn create_pull_consumer(
        &self,
        stream_name: &str,
        ack_wait: Duration,
    ) -> Result<PullConsumer> {
        let consumer_name = format!("{}_CONSUMER", stream_name);
        debug!(stream = %stream_name, consumer = %consumer_name, "creating pull consumer");

        let config = pull::Config {
            name: Some(consumer_name.clone()),
            durable_name: Some(consumer_name),
            ack_policy: AckPolicy::Explicit,
            ack_wait,
            ..Default::default()
        };

        self.jetstream
            .create_consumer_on_stream(config, stream_name)
            .await
            .context("Failed to create consumer")
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    pub async fn close(&self) -> Result<()> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;
        Ok(())
    }
}

/// Stream names may not contain `.`, `*`, `>` or whitespace
pub fn stream_name_for(queue: &str) -> String {
    queue
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
