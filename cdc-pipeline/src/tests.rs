use super::*;
use async_trait::async_trait;
use cdc_model::{ChangeType, ColumnCatalog, ColumnValue, RawColumn, Row, SchemaEntry, TableMap, TransformRule};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;

/// A scripted fake [`BinlogEventSource`]: yields a fixed sequence of
/// events, then reports a source timeout forever so the pipeline loop
/// can be driven for a bounded number of iterations in tests.
struct FakeSource {
    events: Mutex<std::collections::VecDeque<BinlogEvent>>,
}

impl FakeSource {
    fn new(events: Vec<BinlogEvent>) -> Self {
        FakeSource {
            events: Mutex::new(events.into_iter().collect()),
        }
    }
}

#[async_trait]
impl BinlogEventSource for FakeSource {
    async fn next(&mut self) -> cdc_model::Result<BinlogEvent> {
        match self.events.lock().await.pop_front() {
            Some(event) => Ok(event),
            None => Err(Error::Source {
                message: "no more fake events".into(),
                timeout: true,
            }),
        }
    }
}

/// A fixed `(db, table) -> SchemaEntry` map, standing in for a live
/// information-schema connection.
#[derive(Default)]
struct FakeCatalog {
    entries: HashMap<(String, String), SchemaEntry>,
}

impl FakeCatalog {
    fn with(mut self, database: &str, table: &str, columns: &[(&str, &str)]) -> Self {
        let entry = SchemaEntry::new(
            columns
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
        );
        self.entries.insert((database.to_string(), table.to_string()), entry);
        self
    }
}

#[async_trait]
impl ColumnCatalog for FakeCatalog {
    async fn columns(&self, database: &str, table: &str) -> cdc_model::Result<SchemaEntry> {
        self.entries
            .get(&(database.to_string(), table.to_string()))
            .cloned()
            .ok_or_else(|| Error::Decode(format!("no fake schema for {database}.{table}")))
    }
}

/// Captures every event it's asked to publish, for assertions.
#[derive(Default)]
struct FakeSink {
    published: StdMutex<Vec<ChangeEvent>>,
}

#[async_trait]
impl EventSink for FakeSink {
    async fn publish_event(&self, event: &ChangeEvent) -> cdc_model::Result<()> {
        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn publish_raw(&self, _subject: &str, _data: &[u8]) -> cdc_model::Result<()> {
        Ok(())
    }

    async fn kv_get(&self, _bucket: &str, _key: &str) -> cdc_model::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn kv_put(&self, _bucket: &str, _key: &str, _value: &[u8]) -> cdc_model::Result<()> {
        Ok(())
    }

    async fn kv_delete(&self, _bucket: &str, _key: &str) -> cdc_model::Result<()> {
        Ok(())
    }
}

fn table_map_event(table_id: u64, db: &str, table: &str, columns: usize) -> BinlogEvent {
    BinlogEvent::TableMap(TableMap::new(table_id, db, table, columns))
}

fn new_pipeline(
    events: Vec<BinlogEvent>,
    catalog: FakeCatalog,
    transformer: Transformer,
    sink: Arc<FakeSink>,
) -> Pipeline {
    Pipeline::new(
        Box::new(FakeSource::new(events)),
        Arc::new(catalog),
        transformer,
        sink as Arc<dyn EventSink>,
        Arc::new(AtomicBool::new(false)),
        vec![],
        vec![],
    )
}

/// Drains exactly `n` events from the source into `dispatch`, stopping
/// early if the source runs dry.
async fn run_n_events(pipeline: &mut Pipeline, n: usize) {
    for _ in 0..n {
        match pipeline.source.next().await {
            Ok(event) => {
                let _ = pipeline.dispatch(event).await;
            }
            Err(_) => break,
        }
    }
}

/// spec §8 scenario 1: INSERT with TEXT/BLOB coercion.
#[tokio::test]
async fn insert_event_publishes_one_message_with_coercion() {
    let events = vec![
        table_map_event(1, "shop", "orders", 3),
        BinlogEvent::Rows(RowsPayload {
            table_id: 1,
            kind: RowEventKind::Write,
            rows: vec![vec![
                RawColumn::Int(42),
                RawColumn::Bytes(b"hi".to_vec()),
                RawColumn::Bytes(vec![0x00, 0x01, 0xFF]),
            ]],
        }),
    ];
    let catalog = FakeCatalog::default().with(
        "shop",
        "orders",
        &[("id", "int"), ("code", "varchar(32)"), ("blob_col", "blob")],
    );
    let sink = Arc::new(FakeSink::default());
    let mut pipeline = new_pipeline(events, catalog, Transformer::disabled(), sink.clone());

    run_n_events(&mut pipeline, 2).await;

    let published = sink.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].change_type, ChangeType::Insert);
    assert_eq!(
        published[0].rows[0].get_ci("blob_col"),
        Some(&ColumnValue::Bytes(vec![0x00, 0x01, 0xFF]))
    );
}

/// spec §8 scenario 2: UPDATE pairs decode into before/after rows.
#[tokio::test]
async fn update_event_pairs_before_and_after_rows() {
    let events = vec![
        table_map_event(2, "shop", "users", 2),
        BinlogEvent::Rows(RowsPayload {
            table_id: 2,
            kind: RowEventKind::Update,
            rows: vec![
                vec![RawColumn::Int(1), RawColumn::Bytes(b"old".to_vec())],
                vec![RawColumn::Int(1), RawColumn::Bytes(b"new".to_vec())],
            ],
        }),
    ];
    let catalog = FakeCatalog::default().with("shop", "users", &[("id", "int"), ("name", "text")]);
    let sink = Arc::new(FakeSink::default());
    let mut pipeline = new_pipeline(events, catalog, Transformer::disabled(), sink.clone());

    run_n_events(&mut pipeline, 2).await;

    let published = sink.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].change_type, ChangeType::Update);
    assert_eq!(published[0].old_rows[0].get_ci("name"), Some(&ColumnValue::Text("old".into())));
    assert_eq!(published[0].rows[0].get_ci("name"), Some(&ColumnValue::Text("new".into())));
}

/// spec §8 scenario 3: script rejection drops the event before the sink.
#[tokio::test]
async fn script_rejection_drops_event() {
    let sink: Option<Arc<dyn EventSink>> = None;
    let source = "(function(e){ return e.table === 'audit' ? null : e; })".to_string();
    let transformer = Transformer::scripted(source, sink).await.unwrap();

    let mut row = Row::new();
    row.insert("id", ColumnValue::Int(1));
    let audit_event = ChangeEvent::insert("shop", "audit", 1, vec![row.clone()]);
    let orders_event = ChangeEvent::insert("shop", "orders", 1, vec![row]);

    assert!(transformer.transform(audit_event).await.unwrap().is_none());
    assert!(transformer.transform(orders_event).await.unwrap().is_some());
}

/// spec §8 scenario 4: a rule-based transform renames and drops a field
/// before publication.
#[tokio::test]
async fn rule_transform_applies_before_publish() {
    let events = vec![
        table_map_event(3, "shop", "orders", 2),
        BinlogEvent::Rows(RowsPayload {
            table_id: 3,
            kind: RowEventKind::Write,
            rows: vec![vec![RawColumn::Int(7), RawColumn::Bytes(b"secret".to_vec())]],
        }),
    ];
    let catalog = FakeCatalog::default().with("shop", "orders", &[("id", "int"), ("ssn", "text")]);
    let rule = TransformRule {
        database: "shop".to_string(),
        table: "orders".to_string(),
        exclude: vec!["ssn".to_string()],
        ..Default::default()
    };
    let transformer = Transformer::rule_based(vec![rule]).unwrap();
    let sink = Arc::new(FakeSink::default());
    let mut pipeline = new_pipeline(events, catalog, transformer, sink.clone());

    run_n_events(&mut pipeline, 2).await;

    let published = sink.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert!(published[0].rows[0].get_ci("ssn").is_none());
    assert_eq!(published[0].rows[0].get_ci("id"), Some(&ColumnValue::Int(7)));
}

/// spec §8 scenario 6: a Rotate event is observed and logged but does not
/// itself reach the sink, and subsequent rows on the new file still flow.
#[tokio::test]
async fn rotate_event_does_not_reach_sink_but_pipeline_continues() {
    let events = vec![
        BinlogEvent::Rotate {
            next_file: "mysql-bin.000002".to_string(),
            position: 4,
        },
        table_map_event(4, "shop", "orders", 1),
        BinlogEvent::Rows(RowsPayload {
            table_id: 4,
            kind: RowEventKind::Write,
            rows: vec![vec![RawColumn::Int(1)]],
        }),
    ];
    let catalog = FakeCatalog::default().with("shop", "orders", &[("id", "int")]);
    let sink = Arc::new(FakeSink::default());
    let mut pipeline = new_pipeline(events, catalog, Transformer::disabled(), sink.clone());

    run_n_events(&mut pipeline, 3).await;

    let published = sink.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].change_type, ChangeType::Insert);
}

/// A table excluded by configuration is skipped even once its TableMap
/// has been observed, without consulting the catalog at all.
#[tokio::test]
async fn excluded_table_rows_are_skipped_without_publish() {
    let events = vec![
        table_map_event(5, "shop", "audit_log", 1),
        BinlogEvent::Rows(RowsPayload {
            table_id: 5,
            kind: RowEventKind::Write,
            rows: vec![vec![RawColumn::Int(1)]],
        }),
    ];
    // No catalog entry for audit_log: if dispatch ever consulted it,
    // decode would fail loudly instead of silently skipping.
    let catalog = FakeCatalog::default();
    let sink = Arc::new(FakeSink::default());
    let mut pipeline = new_pipeline(events, catalog, Transformer::disabled(), sink.clone());
    pipeline.exclude_tables = vec!["shop.audit_log".to_string()];

    run_n_events(&mut pipeline, 2).await;

    assert!(sink.published.lock().unwrap().is_empty());
}
