//! Build/read tests for the grouped store across backends
use crate::cv::OrderingArray;
use crate::queue::{NodeContext, NodeKind};
use crate::store::backends::{FileBackend, MemoryBackend};
use crate::store::builder::StoreBuilder;
use crate::store::config::NumericDtype;
use crate::store::error::StorageError;
use crate::store::factory::FileStoreProvider;
use crate::store::grouped::GroupedColumnStore;
use crate::store::traits::{ArrayBackend, StoreProvider};
use crate::store::types::NUMERIC_ARRAY;
use crate::table::{Column, Table};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

/// Two stores ("A", "B") with every column kind, rows deliberately out of time order
fn create_test_table(rows: usize) -> Table {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let order: Vec<usize> = (0..rows).map(|i| (i * 7) % rows).collect();
    Table::new(vec![
        Column::text(
            "store",
            (0..rows)
                .map(|i| if i % 3 == 0 { "B" } else { "A" }.to_string())
                .collect(),
        ),
        Column::datetime(
            "date",
            order.iter().map(|&d| start + Duration::days(d as i64)).collect(),
        ),
        Column::numeric("id", (0..rows).map(|i| i as f64).collect()),
        Column::numeric("x", (0..rows).map(|i| (i as f64) * 0.5 - 3.0).collect()),
        Column::text("label", (0..rows).map(|i| format!("row-{}", i)).collect()),
    ])
    .unwrap()
}

async fn build_memory(table: &Table, orderby: Option<&str>) -> GroupedColumnStore {
    StoreBuilder::new(Arc::new(MemoryBackend::new()))
        .build(table, "store", orderby)
        .await
        .unwrap()
}

fn expected_group(table: &Table, key: &str, layout: &Table) -> Table {
    let groups = table.partition_by("store").unwrap();
    groups[key].select_columns(&layout.column_names()).unwrap()
}

#[tokio::test]
async fn test_file_store_full_group_roundtrip() {
    let dir = TempDir::new().unwrap();
    let table = create_test_table(30);
    let backend = FileBackend::create(dir.path().join("store")).await.unwrap();
    let store = StoreBuilder::new(Arc::new(backend))
        .build(&table, "store", Some("date"))
        .await
        .unwrap();

    assert_eq!(store.group_keys(), &["A".to_string(), "B".to_string()]);
    assert!(dir.path().join("store/metadata.json").exists());
    assert!(dir.path().join("store/groups/g00001/numeric.bin").exists());

    let read = store.read_group("A").await.unwrap();
    assert_eq!(read.column_names(), vec!["id", "x", "date", "store", "label"]);
    assert_eq!(read, expected_group(&table, "A", &read));
}

#[tokio::test]
async fn test_reopened_file_store_reads_same_rows() {
    let dir = TempDir::new().unwrap();
    let table = create_test_table(20);
    let root = dir.path().join("store");
    let built = StoreBuilder::new(Arc::new(FileBackend::create(&root).await.unwrap()))
        .build(&table, "store", None)
        .await
        .unwrap();

    let reopened = GroupedColumnStore::open(Arc::new(FileBackend::open(&root).await.unwrap()))
        .await
        .unwrap();
    assert_eq!(reopened.metadata(), built.metadata());
    assert_eq!(
        reopened.read("B", &[3, 0, 0]).await.unwrap(),
        built.read("B", &[3, 0, 0]).await.unwrap()
    );
}

#[tokio::test]
async fn test_ordering_from_datetime_column() {
    let table = create_test_table(10);
    let store = build_memory(&table, Some("date")).await;

    let ordering = store.read_ordering("A").await.unwrap();
    let OrderingArray::Int64(nanos) = &ordering else {
        panic!("datetime ordering should be int64, got {:?}", ordering);
    };
    let group = store.read_group("A").await.unwrap();
    let dates = match &group.column("date").unwrap().data {
        crate::table::ColumnData::Datetime(values) => values.clone(),
        other => panic!("unexpected {:?}", other),
    };
    let expected: Vec<i64> = dates
        .iter()
        .map(|d| d.timestamp_nanos_opt().unwrap())
        .collect();
    assert_eq!(nanos, &expected);
}

#[tokio::test]
async fn test_ordering_defaults_to_row_index() {
    let table = create_test_table(9);
    let store = build_memory(&table, None).await;
    let rows = store.row_count("B").unwrap();
    let ordering = store.read_ordering("B").await.unwrap();
    assert_eq!(ordering, OrderingArray::row_index(rows));
    assert_eq!(store.metadata().group("B").unwrap().orderby_key, None);
}

#[tokio::test]
async fn test_out_of_range_position_names_first_offender() {
    let store = build_memory(&create_test_table(12), None).await;
    let rows = store.row_count("B").unwrap();
    let err = store.read("B", &[0, rows + 2, rows]).await.unwrap_err();
    match err {
        StorageError::Range { position, .. } => assert_eq!(position, rows + 2),
        other => panic!("expected range error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_group_is_not_found() {
    let store = build_memory(&create_test_table(6), None).await;
    assert!(store.read("Z", &[0]).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_truncated_numeric_block_is_corruption() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("store");
    let store = StoreBuilder::new(Arc::new(FileBackend::create(&root).await.unwrap()))
        .build(&create_test_table(12), "store", None)
        .await
        .unwrap();
    std::fs::write(root.join("groups/g00000/numeric.bin"), [0u8; 5]).unwrap();

    let err = store.read("A", &[0]).await.unwrap_err();
    assert!(matches!(err, StorageError::Corruption { .. }));
}

#[tokio::test]
async fn test_wrong_element_role_is_corruption() {
    let backend = MemoryBackend::new();
    let store = StoreBuilder::new(Arc::new(backend.clone()))
        .build(&create_test_table(6), "store", None)
        .await
        .unwrap();

    let mut metadata = store.metadata().clone();
    let group = metadata.groups.get_mut("A").unwrap();
    let desc = group.arrays.get_mut("date").unwrap();
    desc.element_type = crate::store::types::ElementType::Float64;
    backend.save_metadata(&metadata).await.unwrap();

    let reopened = GroupedColumnStore::open(Arc::new(backend)).await.unwrap();
    let err = reopened.read("A", &[0]).await.unwrap_err();
    assert!(matches!(err, StorageError::Corruption { .. }));
}

#[tokio::test]
async fn test_reserved_column_name_rejected() {
    let table = Table::new(vec![
        Column::text("store", vec!["A".into()]),
        Column::numeric(NUMERIC_ARRAY, vec![1.0]),
    ])
    .unwrap();
    let err = StoreBuilder::new(Arc::new(MemoryBackend::new()))
        .build(&table, "store", None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidInput(_)));
}

#[tokio::test]
async fn test_text_orderby_rejected() {
    let err = StoreBuilder::new(Arc::new(MemoryBackend::new()))
        .build(&create_test_table(6), "store", Some("label"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidInput(_)));
}

#[tokio::test]
async fn test_store_without_metadata_cannot_open() {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::create(dir.path()).await.unwrap();
    let err = GroupedColumnStore::open(Arc::new(backend)).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_float32_block_widens_on_read() {
    let table = create_test_table(8);
    let store = StoreBuilder::new(Arc::new(MemoryBackend::new()))
        .numeric_dtype(NumericDtype::Float32)
        .build(&table, "store", None)
        .await
        .unwrap();

    let read = store.read_group("A").await.unwrap();
    let expected = expected_group(&table, "A", &read);
    let narrowed: Vec<f64> = expected
        .numeric("x")
        .unwrap()
        .iter()
        .map(|v| *v as f32 as f64)
        .collect();
    assert_eq!(read.numeric("x").unwrap(), narrowed.as_slice());
}

#[tokio::test]
async fn test_file_provider_reopens_under_node_dir() {
    let dir = TempDir::new().unwrap();
    let node = NodeContext::new("local-0", NodeKind::Local, dir.path());
    StoreBuilder::new(Arc::new(
        FileBackend::create(dir.path().join("store")).await.unwrap(),
    ))
    .build(&create_test_table(10), "store", None)
    .await
    .unwrap();

    let provider = FileStoreProvider::new("store");
    let first = provider.open(&node).await.unwrap();
    let second = provider.open(&node).await.unwrap();
    assert_eq!(first.metadata(), second.metadata());
    assert_eq!(first.backend_kind(), "file");

    let other = NodeContext::new("remote-0", NodeKind::Remote, dir.path().join("elsewhere"));
    assert!(provider.open(&other).await.unwrap_err().is_not_found());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_subset_read_matches_full_read(
        rows in 3usize..60,
        picks in prop::collection::vec(0usize..1000, 0..40),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let table = create_test_table(rows);
        let (subset, full) = runtime.block_on(async {
            let store = build_memory(&table, Some("x")).await;
            let group_rows = store.row_count("A").unwrap();
            let positions: Vec<usize> = picks.iter().map(|p| p % group_rows).collect();
            let subset = store.read("A", &positions).await.unwrap();
            let full = store.read_group("A").await.unwrap().take(&positions).unwrap();
            (subset, full)
        });
        prop_assert_eq!(subset, full);
    }
}
