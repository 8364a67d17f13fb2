//! Tests for the file API
//!
//! These tests verify:
//! - Open modes and file creation
//! - Read/write/seek/truncate/size through handles
//! - Remove, map/unmap and create_path
//! - Handle validation and the size-of-bad-handle contract

use std::fs;
use std::io::SeekFrom;

use pcl::{
    AccessMode, Config, PclError, PersistenceClient, Policy, ResourceConfigEntry,
    ResourceReference, ShutdownFlags,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (TempDir, PersistenceClient) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .root_dir(temp_dir.path())
        .resource_entry(ResourceConfigEntry::new("media/*", Policy::WriteThrough))
        .build();
    let client = PersistenceClient::new(config);
    client.init("app1", ShutdownFlags::NORMAL).unwrap();
    (temp_dir, client)
}

fn doc() -> ResourceReference {
    ResourceReference::local("docs/readme.txt", 0, 0)
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_read_write_open_creates_file() {
    let (temp, client) = setup();

    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();

    assert!(temp.path().join("mnt-c/app1/node/docs/readme.txt").exists());
    assert_eq!(client.file_get_size(h), 0);
}

#[test]
fn test_read_only_open_of_missing_file() {
    let (_temp, client) = setup();

    assert!(matches!(
        client.file_open(&doc(), AccessMode::ReadOnly),
        Err(PclError::NoKey)
    ));
}

#[test]
fn test_write_through_file_location() {
    let (temp, client) = setup();
    let r = ResourceReference::local("media/db", 1, 2);

    let h = client.file_open(&r, AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"rows").unwrap();
    client.file_close(h).unwrap();

    let path = temp.path().join("mnt-wt/app1/user/1/seat/2/media/db");
    assert_eq!(fs::read(path).unwrap(), b"rows");
}

// =============================================================================
// Read / Write / Seek Tests
// =============================================================================

#[test]
fn test_write_seek_read() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();

    assert_eq!(client.file_write_data(h, b"hello world").unwrap(), 11);
    assert_eq!(client.file_get_size(h), 11);

    assert_eq!(client.file_seek(h, SeekFrom::Start(6)).unwrap(), 6);
    assert_eq!(client.file_read_data(h, 100).unwrap(), b"world");

    client.file_seek(h, SeekFrom::Start(0)).unwrap();
    assert_eq!(client.file_read_data(h, 5).unwrap(), b"hello");

    // At end of file
    client.file_seek(h, SeekFrom::End(0)).unwrap();
    assert!(client.file_read_data(h, 8).unwrap().is_empty());
}

#[test]
fn test_contents_visible_after_reopen() {
    let (_temp, client) = setup();

    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"persisted").unwrap();
    client.file_close(h).unwrap();

    let h = client.file_open(&doc(), AccessMode::ReadOnly).unwrap();
    assert_eq!(client.file_read_data(h, 64).unwrap(), b"persisted");
}

#[test]
fn test_write_to_read_only_handle() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"x").unwrap();
    client.file_close(h).unwrap();

    let h = client.file_open(&doc(), AccessMode::ReadOnly).unwrap();
    assert!(matches!(
        client.file_write_data(h, b"y"),
        Err(PclError::InvalidArgument(_))
    ));
}

#[test]
fn test_empty_buffers_rejected() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();

    assert!(matches!(
        client.file_write_data(h, b""),
        Err(PclError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.file_read_data(h, 0),
        Err(PclError::InvalidArgument(_))
    ));
}

#[test]
fn test_truncate_shortens_file() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"0123456789").unwrap();

    client.file_truncate(h, 4).unwrap();
    assert_eq!(client.file_get_size(h), 4);

    client.file_seek(h, SeekFrom::Start(0)).unwrap();
    assert_eq!(client.file_read_data(h, 64).unwrap(), b"0123");
}

#[test]
fn test_truncate_read_only_rejected() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"data").unwrap();
    client.file_close(h).unwrap();

    let h = client.file_open(&doc(), AccessMode::ReadOnly).unwrap();
    assert!(matches!(
        client.file_truncate(h, 0),
        Err(PclError::InvalidArgument(_))
    ));
}

// =============================================================================
// Handle Validation Tests
// =============================================================================

#[test]
fn test_bad_file_handles() {
    let (_temp, client) = setup();

    assert!(matches!(
        client.file_read_data(-1, 10),
        Err(PclError::MaxHandleExceeded)
    ));
    assert!(matches!(
        client.file_write_data(9999, b"x"),
        Err(PclError::MaxHandleExceeded)
    ));

    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_close(h).unwrap();
    assert!(matches!(
        client.file_read_data(h, 10),
        Err(PclError::InvalidHandle)
    ));
    assert!(matches!(client.file_close(h), Err(PclError::InvalidHandle)));
}

#[test]
fn test_size_of_bad_handle_is_zero() {
    let (_temp, client) = setup();

    assert_eq!(client.file_get_size(-1), 0);
    assert_eq!(client.file_get_size(0), 0);
    assert_eq!(client.file_get_size(100_000), 0);

    let key = client
        .key_handle_open(&ResourceReference::local("volume", 0, 0))
        .unwrap();
    assert_eq!(client.file_get_size(key), 0);
}

#[test]
fn test_key_handle_rejected_by_file_api() {
    let (_temp, client) = setup();
    let key = client
        .key_handle_open(&ResourceReference::local("volume", 0, 0))
        .unwrap();

    assert!(matches!(
        client.file_write_data(key, b"x"),
        Err(PclError::InvalidHandle)
    ));
}

#[test]
fn test_plugin_resource_is_not_a_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .root_dir(temp_dir.path())
        .resource_entry(ResourceConfigEntry::new(
            "secret",
            Policy::Plugin(pcl::PluginId::Secure),
        ))
        .build();
    let client = PersistenceClient::new(config);
    client.init("app1", ShutdownFlags::NORMAL).unwrap();

    assert!(matches!(
        client.file_open(&ResourceReference::local("secret", 0, 0), AccessMode::ReadWrite),
        Err(PclError::InvalidArgument(_))
    ));
}

// =============================================================================
// Remove Tests
// =============================================================================

#[test]
fn test_remove() {
    let (temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"bye").unwrap();
    client.file_close(h).unwrap();

    client.file_remove(&doc()).unwrap();

    assert!(!temp.path().join("mnt-c/app1/node/docs/readme.txt").exists());
    assert!(matches!(client.file_remove(&doc()), Err(PclError::NoKey)));
    assert!(matches!(
        client.file_open(&doc(), AccessMode::ReadOnly),
        Err(PclError::NoKey)
    ));

    // A fresh read-write open yields an empty file
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    assert_eq!(client.file_get_size(h), 0);
}

// =============================================================================
// Region Tests
// =============================================================================

#[test]
fn test_map_region_whole_file() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"0123456789").unwrap();
    client.file_seek(h, SeekFrom::Start(4)).unwrap();

    let region = client.file_map_region(h).unwrap();
    assert_eq!(&region[..], b"0123456789");
    assert_eq!(region.handle(), h);

    // Position is unchanged by mapping
    assert_eq!(client.file_read_data(h, 2).unwrap(), b"45");

    client.file_unmap_region(region).unwrap();
}

#[test]
fn test_map_region_sees_later_writes() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"AAAA").unwrap();

    let region = client.file_map_region(h).unwrap();
    client.file_seek(h, SeekFrom::Start(0)).unwrap();
    client.file_write_data(h, b"BBBB").unwrap();

    assert_eq!(&region[..], b"BBBB");

    client.file_unmap_region(region).unwrap();
    client.file_close(h).unwrap();
}

#[test]
fn test_map_empty_file() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();

    let region = client.file_map_region(h).unwrap();
    assert!(region.is_empty());

    client.file_unmap_region(region).unwrap();
}

#[test]
fn test_unmap_after_close() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"data").unwrap();
    let region = client.file_map_region(h).unwrap();
    client.file_close(h).unwrap();

    // The mapping outlives the handle until released
    assert_eq!(&region[..], b"data");
    assert!(matches!(
        client.file_unmap_region(region),
        Err(PclError::InvalidHandle)
    ));
}

#[test]
fn test_truncate_refused_while_mapped() {
    let (_temp, client) = setup();
    let h = client.file_open(&doc(), AccessMode::ReadWrite).unwrap();
    client.file_write_data(h, b"0123456789").unwrap();

    let region = client.file_map_region(h).unwrap();
    assert!(matches!(
        client.file_truncate(h, 2),
        Err(PclError::InvalidArgument(_))
    ));

    // Growing is fine
    client.file_truncate(h, 16).unwrap();

    client.file_unmap_region(region).unwrap();
    client.file_truncate(h, 2).unwrap();
    assert_eq!(client.file_get_size(h), 2);
}

#[test]
fn test_map_bad_handle() {
    let (_temp, client) = setup();

    assert!(matches!(
        client.file_map_region(3),
        Err(PclError::MaxHandleExceeded)
    ));
}

// =============================================================================
// Create Path Tests
// =============================================================================

#[test]
fn test_create_path() {
    let (temp, client) = setup();
    let r = ResourceReference::local("media/cover.jpg", 1, 1);

    let created = client.file_create_path(&r).unwrap();

    assert_eq!(
        created.path,
        temp.path().join("mnt-wt/app1/user/1/seat/1/media/cover.jpg")
    );
    assert!(created.path.parent().unwrap().is_dir());

    // The path is usable directly
    fs::write(&created.path, b"jpeg").unwrap();
    client.file_release_path(created.handle).unwrap();

    assert!(matches!(
        client.file_release_path(created.handle),
        Err(PclError::InvalidHandle)
    ));

    let h = client.file_open(&r, AccessMode::ReadOnly).unwrap();
    assert_eq!(client.file_read_data(h, 16).unwrap(), b"jpeg");
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_on_distinct_files() {
    let (_temp, client) = setup();

    crossbeam::thread::scope(|s| {
        for t in 0..8 {
            let client = &client;
            s.spawn(move |_| {
                let r = ResourceReference::local(format!("parallel/{}", t), 0, 0);
                let h = client.file_open(&r, AccessMode::ReadWrite).unwrap();
                for _ in 0..20 {
                    client.file_write_data(h, b"ab").unwrap();
                }
                client.file_close(h).unwrap();
            });
        }
    })
    .unwrap();

    for t in 0..8 {
        let r = ResourceReference::local(format!("parallel/{}", t), 0, 0);
        let h = client.file_open(&r, AccessMode::ReadOnly).unwrap();
        assert_eq!(client.file_get_size(h), 40);
        client.file_close(h).unwrap();
    }
}
