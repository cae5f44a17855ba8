//! In-process topic broker.
//!
//! Mirrors the production messaging topology: durable topic exchanges with a
//! companion direct dead-letter exchange, per-queue dead-letter queues, a
//! bounded prefetch window per consumer, and acknowledge-or-dead-letter
//! delivery. Queues are tokio-native so the whole pipeline runs and tests
//! without an external broker.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde_json::Value;
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broker::pattern::topic_matches;
use crate::broker::router::EventRouter;
use crate::profile::ChangeEvent;

/// Declarative description of one consumer queue and its binding.
#[derive(Debug, Clone)]
pub struct QueueDescriptor {
    pub name: String,
    pub exchange: String,
    pub routing_key_pattern: String,
    pub durable: bool,
}

impl QueueDescriptor {
    /// Name of the dead-letter exchange paired with `exchange`.
    pub fn dlx_name(&self) -> String {
        format!("{}_dlx", self.exchange)
    }

    /// Name of this queue's dead-letter queue.
    pub fn dlq_name(&self) -> String {
        format!("{}.dlq", self.name)
    }
}

/// One message sitting in a queue.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub persistent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExchangeKind {
    Topic,
    Direct,
}

struct Exchange {
    kind: ExchangeKind,
    bindings: Vec<Binding>,
}

struct Binding {
    pattern: String,
    queue: String,
}

#[derive(Clone)]
struct QueueState {
    buffer: Arc<Mutex<VecDeque<Delivery>>>,
    notify: Arc<Notify>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    fn push(&self, delivery: Delivery) {
        self.buffer.lock().unwrap().push_back(delivery);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Delivery> {
        self.buffer.lock().unwrap().pop_front()
    }

    fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }
}

#[derive(Default)]
struct Topology {
    exchanges: HashMap<String, Exchange>,
    queues: HashMap<String, QueueState>,
}

pub struct TopicBroker {
    topology: Mutex<Topology>,
    prefetch: usize,
    shutdown: watch::Sender<bool>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl TopicBroker {
    pub fn new(prefetch: usize) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            topology: Mutex::new(Topology::default()),
            prefetch: prefetch.max(1),
            shutdown,
            consumers: Mutex::new(Vec::new()),
        }
    }

    /// Declare the exchange, its dead-letter exchange, the queue, its
    /// dead-letter queue, and the bindings. Idempotent: repeated calls with
    /// the same descriptor are no-ops.
    pub fn ensure_topology(&self, descriptor: &QueueDescriptor) {
        let mut topology = self.topology.lock().unwrap();

        topology
            .exchanges
            .entry(descriptor.exchange.clone())
            .or_insert_with(|| Exchange {
                kind: ExchangeKind::Topic,
                bindings: Vec::new(),
            });
        topology
            .exchanges
            .entry(descriptor.dlx_name())
            .or_insert_with(|| Exchange {
                kind: ExchangeKind::Direct,
                bindings: Vec::new(),
            });

        topology
            .queues
            .entry(descriptor.name.clone())
            .or_insert_with(QueueState::new);
        topology
            .queues
            .entry(descriptor.dlq_name())
            .or_insert_with(QueueState::new);

        Self::bind(
            &mut topology,
            &descriptor.exchange,
            &descriptor.routing_key_pattern,
            &descriptor.name,
        );
        Self::bind(
            &mut topology,
            &descriptor.dlx_name(),
            &descriptor.dlq_name(),
            &descriptor.dlq_name(),
        );

        info!(
            queue = %descriptor.name,
            exchange = %descriptor.exchange,
            pattern = %descriptor.routing_key_pattern,
            dlq = %descriptor.dlq_name(),
            "Declared queue topology"
        );
    }

    fn bind(topology: &mut Topology, exchange: &str, pattern: &str, queue: &str) {
        let Some(entry) = topology.exchanges.get_mut(exchange) else {
            return;
        };
        let exists = entry
            .bindings
            .iter()
            .any(|b| b.pattern == pattern && b.queue == queue);
        if !exists {
            entry.bindings.push(Binding {
                pattern: pattern.to_string(),
                queue: queue.to_string(),
            });
        }
    }

    /// Publish a persistent event to a topic exchange. Returns whether the
    /// publish succeeded; failures are logged, never raised.
    pub fn publish(&self, exchange: &str, event_type: &str, payload: Value) -> bool {
        let event = ChangeEvent {
            event_type: event_type.to_string(),
            payload,
        };
        let body = match serde_json::to_vec(&event) {
            Ok(body) => body,
            Err(err) => {
                error!(event_type, error = %err, "Failed to serialize event");
                return false;
            }
        };

        self.publish_bytes(exchange, event_type, body)
    }

    /// Publish an already-encoded message body. The broker does not inspect
    /// it; consumers dead-letter bodies they cannot decode.
    pub fn publish_bytes(&self, exchange: &str, routing_key: &str, body: Vec<u8>) -> bool {
        match self.route(exchange, routing_key, body, true) {
            Ok(delivered) => {
                debug!(exchange, routing_key, delivered, "Published message");
                true
            }
            Err(err) => {
                error!(exchange, routing_key, error = %err, "Failed to publish message");
                false
            }
        }
    }

    /// Deposit `body` on every queue bound with a matching pattern. Returns
    /// the number of queues that received the message.
    fn route(&self, exchange: &str, routing_key: &str, body: Vec<u8>, persistent: bool) -> Result<usize> {
        let targets: Vec<QueueState> = {
            let topology = self.topology.lock().unwrap();
            let entry = topology
                .exchanges
                .get(exchange)
                .ok_or_else(|| anyhow!("Unknown exchange: {exchange}"))?;

            entry
                .bindings
                .iter()
                .filter(|b| match entry.kind {
                    ExchangeKind::Topic => topic_matches(&b.pattern, routing_key),
                    ExchangeKind::Direct => b.pattern == routing_key,
                })
                .filter_map(|b| topology.queues.get(&b.queue).cloned())
                .collect()
        };

        let delivered = targets.len();
        for queue in targets {
            queue.push(Delivery {
                routing_key: routing_key.to_string(),
                body: body.clone(),
                persistent,
            });
        }
        Ok(delivered)
    }

    pub fn queue_depth(&self, queue: &str) -> usize {
        self.topology
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map_or(0, QueueState::len)
    }

    /// Snapshot of a queue's dead-letter queue, oldest first.
    pub fn dead_letters(&self, queue: &str) -> Vec<Delivery> {
        let state = self
            .topology
            .lock()
            .unwrap()
            .queues
            .get(&format!("{queue}.dlq"))
            .cloned();
        state.map_or_else(Vec::new, |q| q.buffer.lock().unwrap().iter().cloned().collect())
    }

    /// Start one consumer loop for `descriptor`, dispatching through
    /// `router`. In-flight work is bounded by the broker's prefetch window.
    pub fn start_consumer(self: &Arc<Self>, descriptor: QueueDescriptor, router: EventRouter) {
        self.ensure_topology(&descriptor);

        let queue = self
            .topology
            .lock()
            .unwrap()
            .queues
            .get(&descriptor.name)
            .cloned()
            .expect("queue declared by ensure_topology");

        let broker = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        let prefetch = self.prefetch;

        let handle = tokio::spawn(async move {
            info!(
                queue = %descriptor.name,
                events = ?router.event_types(),
                prefetch,
                "Consumer started"
            );
            let in_flight = Arc::new(Semaphore::new(prefetch));

            loop {
                if *shutdown.borrow() {
                    break;
                }
                // Respect the prefetch window before taking a delivery.
                let permit = tokio::select! {
                    permit = in_flight.clone().acquire_owned() => {
                        permit.expect("semaphore never closed")
                    }
                    _ = shutdown.changed() => break,
                };
                match queue.pop() {
                    Some(delivery) => {
                        let broker = Arc::clone(&broker);
                        let router = router.clone();
                        let descriptor = descriptor.clone();
                        tokio::spawn(async move {
                            broker.process(&descriptor, &router, delivery).await;
                            drop(permit);
                        });
                    }
                    None => {
                        drop(permit);
                        tokio::select! {
                            _ = queue.notify.notified() => {}
                            _ = shutdown.changed() => break,
                        }
                    }
                }
            }

            // Drain: wait for every in-flight handler before exiting.
            let _ = in_flight.acquire_many(prefetch as u32).await;
            info!(queue = %descriptor.name, "Consumer stopped");
        });

        self.consumers.lock().unwrap().push(handle);
    }

    async fn process(&self, descriptor: &QueueDescriptor, router: &EventRouter, delivery: Delivery) {
        let event: ChangeEvent = match serde_json::from_slice(&delivery.body) {
            Ok(event) => event,
            Err(err) => {
                error!(
                    queue = %descriptor.name,
                    error = %err,
                    "Undecodable message, dead-lettering"
                );
                self.dead_letter(descriptor, delivery);
                return;
            }
        };

        let Some(handler) = router.get(&event.event_type) else {
            warn!(
                queue = %descriptor.name,
                event_type = %event.event_type,
                "No handler for event type, dead-lettering"
            );
            self.dead_letter(descriptor, delivery);
            return;
        };

        match handler.call(event.payload).await {
            Ok(()) => {
                debug!(queue = %descriptor.name, event_type = %event.event_type, "Acked");
            }
            Err(err) => {
                error!(
                    queue = %descriptor.name,
                    event_type = %event.event_type,
                    error = %err,
                    "Handler failed, dead-lettering"
                );
                self.dead_letter(descriptor, delivery);
            }
        }
    }

    /// Reject without requeue: the message moves through the dead-letter
    /// exchange into the queue's DLQ, exactly once.
    fn dead_letter(&self, descriptor: &QueueDescriptor, delivery: Delivery) {
        if let Err(err) = self.route(
            &descriptor.dlx_name(),
            &descriptor.dlq_name(),
            delivery.body,
            delivery.persistent,
        ) {
            error!(queue = %descriptor.name, error = %err, "Dead-letter routing failed");
        }
    }

    /// Stop accepting new deliveries, wait for in-flight handlers, then shut
    /// the consumers down.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.consumers.lock().unwrap());
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "Consumer task panicked during shutdown");
            }
        }
        info!("Broker closed");
    }
}
