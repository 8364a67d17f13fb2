//! Tests for HandleTable
//!
//! These tests verify:
//! - Id allocation order (1, 2, 3, ...)
//! - LIFO reuse of freed ids
//! - Range vs. allocation errors on validate/close
//! - Capacity limit and drain

use pcl::handle::HandleTable;
use pcl::PclError;

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_ids_start_at_one() {
    let table: HandleTable<&str> = HandleTable::new(8);

    assert_eq!(table.open("a").unwrap(), 1);
    assert_eq!(table.open("b").unwrap(), 2);
    assert_eq!(table.open("c").unwrap(), 3);
    assert_eq!(table.high_watermark(), 4);
}

#[test]
fn test_freed_ids_are_reused_lifo() {
    let table: HandleTable<u32> = HandleTable::new(16);

    for i in 0..3 {
        table.open(i).unwrap();
    }
    table.close(1).unwrap();
    table.close(2).unwrap();
    table.close(3).unwrap();

    assert_eq!(table.open(10).unwrap(), 3);
    assert_eq!(table.open(11).unwrap(), 2);
    assert_eq!(table.open(12).unwrap(), 1);
    assert_eq!(table.open(13).unwrap(), 4);
    assert_eq!(table.open(14).unwrap(), 5);
    assert_eq!(table.open(15).unwrap(), 6);
}

#[test]
fn test_capacity_limit() {
    let table: HandleTable<u32> = HandleTable::new(4);

    assert_eq!(table.open(0).unwrap(), 1);
    assert_eq!(table.open(0).unwrap(), 2);
    assert_eq!(table.open(0).unwrap(), 3);
    assert!(matches!(table.open(0), Err(PclError::MaxHandleExceeded)));

    // A freed slot makes room again
    table.close(2).unwrap();
    assert_eq!(table.open(0).unwrap(), 2);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_validate_out_of_range() {
    let table: HandleTable<u32> = HandleTable::new(8);
    table.open(1).unwrap();

    assert!(matches!(table.validate(-1), Err(PclError::MaxHandleExceeded)));
    assert!(matches!(table.validate(8), Err(PclError::MaxHandleExceeded)));
    assert!(matches!(table.validate(1000), Err(PclError::MaxHandleExceeded)));

    // In range but above the watermark
    assert!(matches!(table.validate(5), Err(PclError::MaxHandleExceeded)));
}

#[test]
fn test_validate_free_slot() {
    let table: HandleTable<u32> = HandleTable::new(8);
    table.open(1).unwrap();
    table.open(2).unwrap();
    table.close(1).unwrap();

    assert!(matches!(table.validate(1), Err(PclError::InvalidHandle)));
    assert!(matches!(table.validate(0), Err(PclError::InvalidHandle)));
    assert!(table.validate(2).is_ok());
}

#[test]
fn test_double_close() {
    let table: HandleTable<u32> = HandleTable::new(8);
    let h = table.open(7).unwrap();

    assert_eq!(table.close(h).unwrap(), 7);
    assert!(matches!(table.close(h), Err(PclError::InvalidHandle)));
}

#[test]
fn test_get_returns_record() {
    let table: HandleTable<String> = HandleTable::new(8);
    let h = table.open("record".to_string()).unwrap();

    assert_eq!(table.get(h).unwrap(), "record");
    assert_eq!(table.open_count(), 1);
}

// =============================================================================
// Drain Tests
// =============================================================================

#[test]
fn test_drain_resets_table() {
    let table: HandleTable<u32> = HandleTable::new(8);
    table.open(10).unwrap();
    table.open(20).unwrap();
    table.open(30).unwrap();
    table.close(2).unwrap();

    let drained = table.drain();

    assert_eq!(drained, vec![(1, 10), (3, 30)]);
    assert_eq!(table.open_count(), 0);
    assert_eq!(table.open(40).unwrap(), 1);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_open_yields_unique_ids() {
    let table: HandleTable<usize> = HandleTable::new(1024);

    let mut ids: Vec<i32> = crossbeam::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|t| {
                let table = &table;
                s.spawn(move |_| (0..100).map(|i| table.open(t * 100 + i).unwrap()).collect::<Vec<_>>())
            })
            .collect();
        workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
    })
    .unwrap();

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 800);
    assert_eq!(ids[0], 1);
    assert_eq!(ids[799], 800);
}
