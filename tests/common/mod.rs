//! In-memory Flight nodes for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arrow::array::{ArrayRef, Int32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;

use rockstream::config::{ConnectionConfig, PoolSettings};
use rockstream::flight::{BatchReader, BulkClient, BulkConnector, Endpoint, QueryTicket};
use rockstream::olap::{BulkPath, SqlPath};
use rockstream::{ClientError, ClientResult, Connection};

/// Plans and result streams shared by every fake node of a cluster.
#[derive(Default)]
pub struct Cluster {
    plans: Mutex<HashMap<String, QueryTicket>>,
    results: Mutex<HashMap<Bytes, (SchemaRef, Vec<RecordBatch>)>>,
}

impl Cluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Plan `sql` into `endpoints`.
    pub fn plan(&self, sql: &str, endpoints: Vec<Endpoint>) {
        self.plan_ticket(sql, QueryTicket::new(endpoints));
    }

    pub fn plan_ticket(&self, sql: &str, ticket: QueryTicket) {
        self.plans.lock().unwrap().insert(sql.to_string(), ticket);
    }

    /// Serve `batches` for the fetch ticket `ticket`.
    pub fn serve(&self, ticket: &'static str, batches: Vec<RecordBatch>) {
        let schema = batches
            .first()
            .map(RecordBatch::schema)
            .unwrap_or_else(int_schema);
        self.results
            .lock()
            .unwrap()
            .insert(Bytes::from_static(ticket.as_bytes()), (schema, batches));
    }
}

/// A coordinator or worker answering from a [`Cluster`].
pub struct FakeNode {
    cluster: Arc<Cluster>,
    pub executes: AtomicUsize,
    pub fetches: AtomicUsize,
    /// Number of upcoming fetches that fail.
    pub failing_fetches: AtomicUsize,
    /// Milliseconds every `execute` takes before answering.
    pub plan_millis: AtomicU64,
    pub closed: AtomicBool,
}

impl FakeNode {
    pub fn new(cluster: Arc<Cluster>) -> Arc<Self> {
        Arc::new(Self {
            cluster,
            executes: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            failing_fetches: AtomicUsize::new(0),
            plan_millis: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Make every `execute` take `delay`.
    pub fn slow_planning(&self, delay: Duration) {
        self.plan_millis
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkClient for FakeNode {
    async fn execute(&self, sql: &str) -> ClientResult<QueryTicket> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        let delay = self.plan_millis.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.cluster
            .plans
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .ok_or_else(|| {
                ClientError::Arrow(ArrowError::InvalidArgumentError(format!(
                    "Unknown table in {sql}"
                )))
            })
    }

    async fn fetch(&self, ticket: &Bytes) -> ClientResult<BatchReader> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::Arrow(ArrowError::IoError(
                "connection reset".to_string(),
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
            )));
        }

        let results = self.cluster.results.lock().unwrap();
        let (schema, batches) = results.get(ticket).cloned().ok_or_else(|| {
            ClientError::Arrow(ArrowError::InvalidArgumentError(
                "unknown ticket".to_string(),
            ))
        })?;
        Ok(BatchReader::from_batches(schema, batches))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Builds [`FakeNode`] workers and records every construction.
pub struct FakeConnector {
    cluster: Arc<Cluster>,
    /// Addresses connected to, in order.
    pub connected: Mutex<Vec<String>>,
    pub nodes: Mutex<Vec<Arc<FakeNode>>>,
    /// Failing fetches handed to the next node built.
    next_failures: AtomicUsize,
}

impl FakeConnector {
    pub fn new(cluster: Arc<Cluster>) -> Arc<Self> {
        Arc::new(Self {
            cluster,
            connected: Mutex::new(Vec::new()),
            nodes: Mutex::new(Vec::new()),
            next_failures: AtomicUsize::new(0),
        })
    }

    pub fn built(&self) -> usize {
        self.connected.lock().unwrap().len()
    }

    pub fn connected(&self) -> Vec<String> {
        self.connected.lock().unwrap().clone()
    }

    /// Make the next worker fail its first `n` fetches.
    pub fn fail_next_worker(&self, n: usize) {
        self.next_failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl BulkConnector for FakeConnector {
    async fn connect(&self, addr: &str) -> ClientResult<Arc<dyn BulkClient>> {
        let node = FakeNode::new(self.cluster.clone());
        node.failing_fetches
            .store(self.next_failures.swap(0, Ordering::SeqCst), Ordering::SeqCst);
        self.connected.lock().unwrap().push(addr.to_string());
        self.nodes.lock().unwrap().push(node.clone());
        Ok(node as Arc<dyn BulkClient>)
    }
}

pub fn int_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, true)]))
}

/// One batch with an Int32 column `a`.
pub fn int_batch(values: &[i32]) -> RecordBatch {
    let column: ArrayRef = Arc::new(Int32Array::from(values.to_vec()));
    RecordBatch::try_new(int_schema(), vec![column]).unwrap()
}

/// A Flight-enabled connection over fakes. The MySQL side points at a
/// closed port and is never reached by non-parameterized queries.
pub fn flight_connection(
    coordinator: Arc<FakeNode>,
    connector: Arc<FakeConnector>,
    max_queries: usize,
    flight_override: Option<String>,
) -> Connection {
    let config = ConnectionConfig::new("127.0.0.1:1");
    let sql = SqlPath::new(&config, &PoolSettings::default()).unwrap();
    let bulk = BulkPath::from_parts(coordinator, connector, flight_override, max_queries);
    Connection::from_parts(config, sql, Some(bulk))
}

/// Collect column `a` of every remaining row.
pub async fn collect_ints(result: &mut rockstream::QueryResult) -> Vec<i32> {
    let mut out = Vec::new();
    while result.next().await.unwrap() {
        let mut a = 0i32;
        result.scan(&mut [&mut a]).unwrap();
        out.push(a);
    }
    out
}
