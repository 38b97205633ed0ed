//! Brokered pub/sub back-end. The broker client library is treated as an opaque producer:
//! this module never touches the Kafka wire protocol itself, only `rdkafka`'s
//! `BaseProducer`/`BaseConsumer` handles, wrapped behind `BrokerProducer` so the dispatcher
//! deals in `enqueue`/`poll`/`flush`/`destroy`, not librdkafka types.

use super::Transport;
use crate::error::{RuntimeError, SetupError};
use crate::logging::{self, Logger};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::Message;
use rdkafka::producer::{BaseProducer, BaseRecord, Producer};
use std::time::Duration;

const POLL_TIMEOUT: Duration = Duration::from_millis(500);
const FEEDBACK_POLL_TIMEOUT: Duration = Duration::from_millis(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(15);
/// How often (in `write` calls, standing in for tics) the back-end drives delivery callbacks
/// even when the send queue isn't full.
const POLL_EVERY_TICS: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
}

impl SaslMechanism {
    fn as_rdkafka_str(self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
            SaslMechanism::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaslConfig {
    pub mechanism: SaslMechanism,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub brokers: String,
    pub topic: String,
    pub feedback_topic: Option<String>,
    pub ssl: bool,
    pub sasl: Option<SaslConfig>,
}

/// The narrow producer surface the back-end actually uses, so the `BaseProducer` type never
/// leaks past this module.
pub trait BrokerProducer {
    fn enqueue(&self, key: &[u8], payload: &[u8]) -> Result<(), RuntimeError>;
    fn poll(&self, timeout: Duration);
    fn flush(&self, timeout: Duration);
    fn destroy(&self) {}
}

struct RdKafkaProducer {
    producer: BaseProducer,
    topic: String,
}

impl BrokerProducer for RdKafkaProducer {
    fn enqueue(&self, key: &[u8], payload: &[u8]) -> Result<(), RuntimeError> {
        let record = BaseRecord::to(&self.topic).key(key).payload(payload);
        self.producer
            .send(record)
            .map_err(|_| RuntimeError::QueueFull)
    }

    fn poll(&self, timeout: Duration) {
        self.producer.poll(timeout);
    }

    fn flush(&self, timeout: Duration) {
        let _ = self.producer.flush(timeout);
    }
}

fn build_client_config(config: &BrokerConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.brokers)
        .set("linger.ms", "5");

    if config.ssl {
        client.set("security.protocol", if config.sasl.is_some() { "SASL_SSL" } else { "SSL" });
    } else if config.sasl.is_some() {
        client.set("security.protocol", "SASL_PLAINTEXT");
    }

    if let Some(sasl) = &config.sasl {
        client
            .set("sasl.mechanism", sasl.mechanism.as_rdkafka_str())
            .set("sasl.username", &sasl.username)
            .set("sasl.password", &sasl.password);
    }

    client
}

/// The broker transport. Retries a `QUEUE_FULL` enqueue exactly once after driving delivery
/// callbacks; a second failure drops the record.
pub struct BrokerTransport {
    config: BrokerConfig,
    producer: Option<Box<dyn BrokerProducer>>,
    consumer: Option<BaseConsumer>,
    session_key: Vec<u8>,
    writes: u64,
    log: Logger,
}

impl BrokerTransport {
    pub fn new(config: BrokerConfig, log: Logger) -> BrokerTransport {
        BrokerTransport {
            config,
            producer: None,
            consumer: None,
            session_key: Vec::new(),
            writes: 0,
            log,
        }
    }

    /// Test seam: install a stand-in producer instead of a real `rdkafka::BaseProducer`.
    #[cfg(test)]
    pub fn with_producer(config: BrokerConfig, producer: Box<dyn BrokerProducer>, log: Logger) -> BrokerTransport {
        BrokerTransport {
            config,
            producer: Some(producer),
            consumer: None,
            session_key: Vec::new(),
            writes: 0,
            log,
        }
    }

}

impl Transport for BrokerTransport {
    fn set_session_key(&mut self, key: &[u8]) {
        self.session_key = key.to_vec();
    }

    fn init(&mut self) -> Result<(), SetupError> {
        if self.producer.is_none() {
            let client = build_client_config(&self.config);
            let producer: BaseProducer = client.create().map_err(|_| SetupError::Connect)?;
            self.producer = Some(Box::new(RdKafkaProducer {
                producer,
                topic: self.config.topic.clone(),
            }));
        }

        if let Some(feedback_topic) = &self.config.feedback_topic {
            let client = build_client_config(&self.config);
            let consumer: BaseConsumer = client
                .set("group.id", "telemetry-feedback")
                .create()
                .map_err(|_| SetupError::Connect)?;
            consumer
                .subscribe(&[feedback_topic.as_str()])
                .map_err(|_| SetupError::Connect)?;
            self.consumer = Some(consumer);
        }

        logging::info!(self.log, "telemetry broker back-end connected";
            "brokers" => self.config.brokers.clone(), "topic" => self.config.topic.clone());
        Ok(())
    }

    fn close(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.flush(FLUSH_TIMEOUT);
            producer.destroy();
        }
        self.consumer = None;
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, RuntimeError> {
        let producer = self.producer.as_ref().ok_or(RuntimeError::WriteZero)?;

        if producer.enqueue(&self.session_key, bytes).is_err() {
            producer.poll(POLL_TIMEOUT);
            if producer.enqueue(&self.session_key, bytes).is_err() {
                logging::warn!(self.log, "broker send queue full, dropping record");
                return Err(RuntimeError::QueueFull);
            }
        }

        self.writes += 1;
        if self.writes % POLL_EVERY_TICS == 0 {
            producer.poll(POLL_TIMEOUT);
        }

        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RuntimeError> {
        let consumer = self.consumer.as_ref().ok_or(RuntimeError::NoData)?;
        match consumer.poll(FEEDBACK_POLL_TIMEOUT) {
            Some(Ok(message)) => {
                let payload = message.payload().unwrap_or(&[]);
                let len = payload.len().min(buf.len());
                buf[..len].copy_from_slice(&payload[..len]);
                Ok(len)
            }
            Some(Err(_)) | None => Err(RuntimeError::NoData),
        }
    }

    fn supports_read(&self) -> bool {
        self.config.feedback_topic.is_some()
    }

    fn supports_poll(&self) -> bool {
        true
    }

    fn poll(&mut self) {
        if let Some(producer) = self.producer.as_ref() {
            producer.poll(POLL_TIMEOUT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingProducer {
        fail_until: Cell<u32>,
        enqueued: Cell<u32>,
        polled: Cell<u32>,
    }

    impl BrokerProducer for CountingProducer {
        fn enqueue(&self, _key: &[u8], _payload: &[u8]) -> Result<(), RuntimeError> {
            if self.fail_until.get() > 0 {
                self.fail_until.set(self.fail_until.get() - 1);
                return Err(RuntimeError::QueueFull);
            }
            self.enqueued.set(self.enqueued.get() + 1);
            Ok(())
        }

        fn poll(&self, _timeout: Duration) {
            self.polled.set(self.polled.get() + 1);
        }

        fn flush(&self, _timeout: Duration) {}
    }

    fn config() -> BrokerConfig {
        BrokerConfig {
            brokers: "localhost:9092".to_string(),
            topic: "telemetry".to_string(),
            feedback_topic: None,
            ssl: false,
            sasl: None,
        }
    }

    #[test]
    fn a_queue_full_enqueue_is_retried_exactly_once() {
        let producer = CountingProducer {
            fail_until: Cell::new(1),
            enqueued: Cell::new(0),
            polled: Cell::new(0),
        };
        let mut transport = BrokerTransport::with_producer(
            config(),
            Box::new(producer),
            logging::discard(),
        );

        let result = transport.write(br#"{"counter":0}"#);
        assert!(result.is_ok());
    }

    #[test]
    fn two_consecutive_queue_full_failures_drop_the_record() {
        let producer = CountingProducer {
            fail_until: Cell::new(2),
            enqueued: Cell::new(0),
            polled: Cell::new(0),
        };
        let mut transport = BrokerTransport::with_producer(
            config(),
            Box::new(producer),
            logging::discard(),
        );

        let result = transport.write(br#"{"counter":0}"#);
        assert_eq!(result, Err(RuntimeError::QueueFull));
    }

    #[test]
    fn sasl_mechanism_maps_to_the_rdkafka_wire_name() {
        assert_eq!(SaslMechanism::Plain.as_rdkafka_str(), "PLAIN");
        assert_eq!(SaslMechanism::ScramSha256.as_rdkafka_str(), "SCRAM-SHA-256");
        assert_eq!(SaslMechanism::ScramSha512.as_rdkafka_str(), "SCRAM-SHA-512");
    }
}
