//! Flight query path over in-memory coordinator and worker fakes.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arrow::array::{ArrayRef, DurationSecondArray};
use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, TimeUnit};
use arrow::record_batch::RecordBatch;
use common::{collect_ints, flight_connection, int_batch, Cluster, FakeConnector, FakeNode};
use rockstream::flight::{Endpoint, QueryTicket};
use rockstream::olap::{schema_query, BulkPath};
use rockstream::{ClientError, QueryContext, Statement, Transport, TransportPath, TypeCode, Value};

const WORKER: &str = "grpc://10.0.0.1:8419";

#[tokio::test]
async fn test_select_one_served_by_coordinator() {
    let cluster = Cluster::new();
    cluster.plan("SELECT 1 AS a", vec![Endpoint::coordinator("t1")]);
    cluster.serve("t1", vec![int_batch(&[1])]);
    let coordinator = FakeNode::new(cluster.clone());
    let connector = FakeConnector::new(cluster);
    let conn = flight_connection(coordinator.clone(), connector.clone(), 4, None);

    let mut result = conn
        .query(&QueryContext::new(), &Statement::new("SELECT 1 AS a"))
        .await
        .unwrap();
    assert_eq!(result.schema.len(), 1);
    assert_eq!(result.schema.fields[0].code, TypeCode::Int32);

    assert!(result.next().await.unwrap());
    let mut row = HashMap::new();
    result.map_scan(&mut row).unwrap();
    assert_eq!(row, HashMap::from([("a".to_string(), Value::Int32(1))]));
    assert!(!result.next().await.unwrap());
    result.close();

    assert_eq!(coordinator.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(connector.built(), 0);
}

#[tokio::test]
async fn test_zero_endpoints_is_empty_and_releases_slot() {
    let cluster = Cluster::new();
    cluster.plan("SELECT * FROM t WHERE false", vec![]);
    let conn = flight_connection(
        FakeNode::new(cluster.clone()),
        FakeConnector::new(cluster),
        1,
        None,
    );

    let mut result = conn
        .query(
            &QueryContext::new(),
            &Statement::new("SELECT * FROM t WHERE false"),
        )
        .await
        .unwrap();
    assert!(result.schema.is_empty());
    assert!(result.rows.columns().is_empty());
    assert!(!result.next().await.unwrap());
    assert_eq!(conn.bulk().unwrap().governor().available(), 1);
}

#[tokio::test]
async fn test_worker_failure_evicts_and_reconnects_once() {
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM t", vec![Endpoint::new("t2", vec![WORKER.into()])]);
    cluster.serve("t2", vec![int_batch(&[5, 6])]);
    let connector = FakeConnector::new(cluster.clone());
    let conn = flight_connection(FakeNode::new(cluster), connector.clone(), 4, None);
    let ctx = QueryContext::new();
    let stmt = Statement::new("SELECT a FROM t");

    connector.fail_next_worker(1);
    let err = conn.query(&ctx, &stmt).await.unwrap_err();
    match &err {
        ClientError::Fetch { addr, .. } => assert_eq!(addr, "10.0.0.1:8419"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(err.is_retriable());
    let pool = conn.bulk().unwrap().pool();
    assert!(!pool.contains("10.0.0.1:8419").await);
    assert!(connector.nodes.lock().unwrap()[0]
        .closed
        .load(Ordering::SeqCst));
    assert_eq!(connector.built(), 1);

    let mut result = conn.query(&ctx, &stmt).await.unwrap();
    assert_eq!(collect_ints(&mut result).await, vec![5, 6]);
    result.close();
    assert_eq!(connector.built(), 2);

    let mut again = conn.query(&ctx, &stmt).await.unwrap();
    assert_eq!(collect_ints(&mut again).await, vec![5, 6]);
    assert_eq!(connector.built(), 2);
}

#[tokio::test]
async fn test_flight_override_replaces_worker_address() {
    let cluster = Cluster::new();
    cluster.plan(
        "SELECT a FROM t",
        vec![Endpoint::new("t2", vec!["grpc://172.17.0.2:9408".into()])],
    );
    cluster.serve("t2", vec![int_batch(&[1])]);
    let connector = FakeConnector::new(cluster.clone());
    let conn = flight_connection(
        FakeNode::new(cluster),
        connector.clone(),
        4,
        Some("127.0.0.1:19408".to_string()),
    );

    let mut result = conn
        .query(&QueryContext::new(), &Statement::new("SELECT a FROM t"))
        .await
        .unwrap();
    assert_eq!(collect_ints(&mut result).await, vec![1]);
    assert_eq!(connector.connected(), vec!["127.0.0.1:19408".to_string()]);
}

#[tokio::test]
async fn test_endpoints_are_read_in_order() {
    let cluster = Cluster::new();
    cluster.plan_ticket(
        "SELECT a FROM big",
        QueryTicket {
            endpoints: vec![
                Endpoint::coordinator("t1"),
                Endpoint::new("t2", vec![WORKER.into()]),
                Endpoint::new("t3", vec!["grpc://10.0.0.2:8419".into()]),
            ],
            total_records: Some(6),
        },
    );
    cluster.serve("t1", vec![int_batch(&[1, 2]), int_batch(&[])]);
    cluster.serve("t2", vec![int_batch(&[3])]);
    cluster.serve("t3", vec![int_batch(&[4]), int_batch(&[5, 6])]);
    let connector = FakeConnector::new(cluster.clone());
    let conn = flight_connection(FakeNode::new(cluster), connector.clone(), 4, None);

    let mut result = conn
        .query(&QueryContext::new(), &Statement::new("SELECT a FROM big"))
        .await
        .unwrap();
    assert_eq!(collect_ints(&mut result).await, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(
        connector.connected(),
        vec!["10.0.0.1:8419".to_string(), "10.0.0.2:8419".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_governor_bounds_open_results() {
    const LIMIT: usize = 2;
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM t", vec![Endpoint::coordinator("t1")]);
    cluster.serve("t1", vec![int_batch(&[1, 2, 3])]);
    let conn = flight_connection(
        FakeNode::new(cluster.clone()),
        FakeConnector::new(cluster),
        LIMIT,
        None,
    );

    let open = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let conn = conn.clone();
            let open = open.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                let mut result = conn
                    .query(&QueryContext::new(), &Statement::new("SELECT a FROM t"))
                    .await
                    .unwrap();
                let now = open.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                let rows = collect_ints(&mut result).await;
                open.fetch_sub(1, Ordering::SeqCst);
                result.close();
                rows
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), vec![1, 2, 3]);
    }
    assert!(peak.load(Ordering::SeqCst) <= LIMIT);
    assert_eq!(peak.load(Ordering::SeqCst), LIMIT);
    assert_eq!(conn.bulk().unwrap().governor().available(), LIMIT);
}

#[tokio::test]
async fn test_cancelled_waiter_holds_no_slot() {
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM t", vec![Endpoint::coordinator("t1")]);
    cluster.serve("t1", vec![int_batch(&[1])]);
    let coordinator = FakeNode::new(cluster.clone());
    let conn = flight_connection(coordinator.clone(), FakeConnector::new(cluster), 1, None);
    let stmt = Statement::new("SELECT a FROM t");
    let governor = conn.bulk().unwrap().governor().clone();

    let mut held = conn.query(&QueryContext::new(), &stmt).await.unwrap();
    assert_eq!(governor.available(), 0);

    let ctx = QueryContext::new();
    ctx.cancel();
    let err = conn.query(&ctx, &stmt).await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(coordinator.executes(), 1);

    held.close();
    assert_eq!(governor.available(), 1);
}

#[tokio::test]
async fn test_close_before_next_releases_slot() {
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM t", vec![Endpoint::coordinator("t1")]);
    cluster.serve("t1", vec![int_batch(&[1, 2])]);
    let conn = flight_connection(
        FakeNode::new(cluster.clone()),
        FakeConnector::new(cluster),
        1,
        None,
    );
    let governor = conn.bulk().unwrap().governor().clone();

    let mut result = conn
        .query(&QueryContext::new(), &Statement::new("SELECT a FROM t"))
        .await
        .unwrap();
    result.close();
    result.close();
    assert_eq!(governor.available(), 1);
    assert!(!result.next().await.unwrap());

    let dropped = conn
        .query(&QueryContext::new(), &Statement::new("SELECT a FROM t"))
        .await
        .unwrap();
    assert_eq!(governor.available(), 0);
    drop(dropped);
    assert_eq!(governor.available(), 1);
}

#[tokio::test]
async fn test_scan_after_exhaustion_errors() {
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM t", vec![Endpoint::coordinator("t1")]);
    cluster.serve("t1", vec![int_batch(&[1])]);
    let conn = flight_connection(
        FakeNode::new(cluster.clone()),
        FakeConnector::new(cluster),
        1,
        None,
    );

    let mut result = conn
        .query(&QueryContext::new(), &Statement::new("SELECT a FROM t"))
        .await
        .unwrap();
    let mut a = 0i64;
    assert!(matches!(
        result.scan(&mut [&mut a]),
        Err(ClientError::NoCurrentRow)
    ));
    assert!(result.next().await.unwrap());
    result.scan(&mut [&mut a]).unwrap();
    assert_eq!(a, 1);
    assert!(!result.next().await.unwrap());
    assert!(matches!(
        result.scan(&mut [&mut a]),
        Err(ClientError::NoCurrentRow)
    ));
}

#[tokio::test]
async fn test_planning_error_is_verbatim_and_releases_slot() {
    let cluster = Cluster::new();
    let conn = flight_connection(
        FakeNode::new(cluster.clone()),
        FakeConnector::new(cluster),
        1,
        None,
    );

    let err = conn
        .query(&QueryContext::new(), &Statement::new("SELECT * FROM missing"))
        .await
        .unwrap_err();
    match err {
        ClientError::Planning { query_id, message } => {
            assert!(!query_id.is_empty());
            assert!(message.contains("Unknown table in SELECT * FROM missing"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(conn.bulk().unwrap().governor().available(), 1);
}

#[tokio::test]
async fn test_unsupported_column_fails_query_and_releases_slot() {
    let span: ArrayRef = Arc::new(DurationSecondArray::from(vec![None::<i64>]));
    let batch = RecordBatch::try_new(
        Arc::new(ArrowSchema::new(vec![ArrowField::new(
            "span",
            DataType::Duration(TimeUnit::Second),
            true,
        )])),
        vec![span],
    )
    .unwrap();
    let cluster = Cluster::new();
    cluster.plan("SELECT span FROM t", vec![Endpoint::coordinator("t5")]);
    cluster.plan(
        &schema_query("SELECT span FROM t"),
        vec![Endpoint::coordinator("t5")],
    );
    cluster.serve("t5", vec![batch]);
    let conn = flight_connection(
        FakeNode::new(cluster.clone()),
        FakeConnector::new(cluster),
        1,
        None,
    );
    let ctx = QueryContext::new();

    let err = conn
        .query(&ctx, &Statement::new("SELECT span FROM t"))
        .await
        .unwrap_err();
    match err {
        ClientError::UnsupportedType { column, .. } => assert_eq!(column, "span"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(conn.bulk().unwrap().governor().available(), 1);

    let err = conn
        .query_schema(&ctx, "SELECT span FROM t", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UnsupportedType { .. }));
    assert_eq!(conn.bulk().unwrap().governor().available(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_caller_deadline_does_not_bound_planning() {
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM big", vec![Endpoint::coordinator("t1")]);
    cluster.serve("t1", vec![int_batch(&[1, 2, 3])]);
    let coordinator = FakeNode::new(cluster.clone());
    coordinator.slow_planning(Duration::from_secs(10));
    let conn = flight_connection(coordinator, FakeConnector::new(cluster), 1, None);

    let ctx = QueryContext::new().with_timeout(Duration::from_secs(1));
    let mut result = conn
        .query(&ctx, &Statement::new("SELECT a FROM big"))
        .await
        .unwrap();
    assert_eq!(collect_ints(&mut result).await, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_planning_and_releases_slot() {
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM big", vec![Endpoint::coordinator("t1")]);
    let coordinator = FakeNode::new(cluster.clone());
    coordinator.slow_planning(Duration::from_secs(10));
    let conn = flight_connection(coordinator, FakeConnector::new(cluster), 1, None);

    let ctx = QueryContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });
    let err = conn
        .query(&ctx, &Statement::new("SELECT a FROM big"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(conn.bulk().unwrap().governor().available(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_query_leaves_no_task_behind() {
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM big", vec![Endpoint::coordinator("t1")]);
    let coordinator = FakeNode::new(cluster.clone());
    coordinator.slow_planning(Duration::from_secs(10));
    let conn = flight_connection(coordinator, FakeConnector::new(cluster), 1, None);
    let ctx = QueryContext::new();
    let metrics = tokio::runtime::Handle::current().metrics();
    let before = metrics.num_alive_tasks();

    let abandoned = tokio::time::timeout(
        Duration::from_secs(1),
        conn.query(&ctx, &Statement::new("SELECT a FROM big")),
    )
    .await;
    assert!(abandoned.is_err());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(metrics.num_alive_tasks(), before);
    assert!(!ctx.is_cancelled());
    assert_eq!(conn.bulk().unwrap().governor().available(), 1);
}

#[tokio::test]
async fn test_parameterized_query_never_uses_flight() {
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM t WHERE a = ?", vec![Endpoint::coordinator("t1")]);
    let coordinator = FakeNode::new(cluster.clone());
    let conn = flight_connection(coordinator.clone(), FakeConnector::new(cluster), 4, None);

    assert_eq!(conn.transport_for(&[Value::Int64(1)]), Transport::Sql);
    assert_eq!(conn.transport_for(&[]), Transport::Flight);

    // The MySQL side is unreachable, so the row path fails; Flight is untouched.
    let ctx = QueryContext::new().with_timeout(Duration::from_secs(5));
    let stmt = Statement::new("SELECT a FROM t WHERE a = ?").bind(1i64);
    assert!(conn.query(&ctx, &stmt).await.is_err());
    assert_eq!(coordinator.executes(), 0);
}

#[tokio::test]
async fn test_close_closes_every_client() {
    let cluster = Cluster::new();
    cluster.plan("SELECT a FROM t", vec![Endpoint::new("t2", vec![WORKER.into()])]);
    cluster.serve("t2", vec![int_batch(&[1])]);
    let coordinator = FakeNode::new(cluster.clone());
    let connector = FakeConnector::new(cluster);
    let conn = flight_connection(coordinator.clone(), connector.clone(), 4, None);

    let mut result = conn
        .query(&QueryContext::new(), &Statement::new("SELECT a FROM t"))
        .await
        .unwrap();
    result.close();
    conn.close().await.unwrap();

    assert!(coordinator.closed.load(Ordering::SeqCst));
    assert!(connector.nodes.lock().unwrap()[0]
        .closed
        .load(Ordering::SeqCst));
    assert!(conn.bulk().unwrap().pool().is_empty().await);
    assert!(matches!(
        conn.query(&QueryContext::new(), &Statement::new("SELECT a FROM t"))
            .await,
        Err(ClientError::Closed(_))
    ));
}

#[tokio::test]
async fn test_self_check_reports_unreachable_data_path() {
    let cluster = Cluster::new();
    cluster.plan("SELECT 1", vec![Endpoint::new("check", vec![WORKER.into()])]);
    cluster.serve("check", vec![int_batch(&[1])]);
    let connector = FakeConnector::new(cluster.clone());
    connector.fail_next_worker(1);
    let bulk = BulkPath::from_parts(FakeNode::new(cluster), connector, None, 4);

    let err = bulk.self_check(&QueryContext::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::DataPathUnreachable { .. }));
    assert!(err.to_string().contains("flight_override"));

    bulk.self_check(&QueryContext::new()).await.unwrap();
}

#[tokio::test]
async fn test_self_check_reports_planning_connectivity() {
    let cluster = Cluster::new();
    let bulk = BulkPath::from_parts(
        FakeNode::new(cluster.clone()),
        FakeConnector::new(cluster),
        None,
        4,
    );

    match bulk.self_check(&QueryContext::new()).await {
        Err(ClientError::Connectivity { path, .. }) => {
            assert_eq!(path, TransportPath::FlightPlan)
        }
        other => panic!("unexpected {other:?}"),
    }
}
