//! Integration tests for creating and reopening disk images.

use std::fs;
use std::io::Read;

use vmdisk_core::{CreateType, DiskImageFile, Error, FileAccess};

const ONE_MIB: u64 = 1 << 20;
const ONE_GIB: u64 = 1 << 30;

#[test]
fn test_initialize_monolithic_sparse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.vmdk");

    let disk = DiskImageFile::initialize(&path, 100 * ONE_MIB, CreateType::MonolithicSparse)
        .expect("Failed to initialize disk");
    assert_eq!(disk.capacity(), 100 * ONE_MIB);
    assert!(disk.is_sparse());
    assert!(!disk.needs_parent());
    drop(disk);

    // One file, starting with the hosted sparse magic "KDMV"
    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], &[0x4b, 0x44, 0x4d, 0x56]);

    // The embedded descriptor sits at sector 1
    let window = &bytes[512..512 + 1024];
    let text = std::str::from_utf8(&window[..window.iter().position(|&b| b == 0).unwrap()])
        .expect("Embedded descriptor is not UTF-8");
    assert!(text.starts_with("# Disk DescriptorFile"));
    assert!(text.contains("createType=\"monolithicSparse\""));

    // No stray extent files were created
    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_monolithic_sparse_reads_all_zeros() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.vmdk");
    DiskImageFile::initialize(&path, 100 * ONE_MIB, CreateType::MonolithicSparse).unwrap();

    let disk = DiskImageFile::open(&path, FileAccess::Read).unwrap();
    let mut content = disk.open_content(None).unwrap();
    assert_eq!(content.len(), 100 * ONE_MIB);

    let mut remaining = content.len();
    let mut buf = vec![0xFFu8; ONE_MIB as usize];
    while remaining > 0 {
        let count = remaining.min(ONE_MIB) as usize;
        content.read_exact(&mut buf[..count]).unwrap();
        assert!(buf[..count].iter().all(|&b| b == 0), "non-zero content byte");
        remaining -= count as u64;
    }
    let n = content.read(&mut buf).unwrap();
    assert_eq!(n, 0, "content stream longer than capacity");
}

#[test]
fn test_initialize_two_gb_max_extent_flat() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("b.vmdk");

    DiskImageFile::initialize(&path, 3 * ONE_GIB, CreateType::TwoGbMaxExtentFlat).unwrap();

    let first = dir.path().join("b-000001.vmdk");
    let second = dir.path().join("b-000002.vmdk");
    assert_eq!(fs::metadata(&first).unwrap().len(), 2 * ONE_GIB - ONE_MIB);
    assert_eq!(
        fs::metadata(&second).unwrap().len(),
        3 * ONE_GIB - (2 * ONE_GIB - ONE_MIB)
    );

    let disk = DiskImageFile::open(&path, FileAccess::Read).unwrap();
    assert_eq!(disk.capacity(), 3 * ONE_GIB);
    assert!(!disk.is_sparse());
    assert_eq!(disk.descriptor().extents.len(), 2);
    assert_eq!(disk.descriptor().extents[0].file_name, "b-000001.vmdk");
    assert_eq!(disk.descriptor().extents[1].file_name, "b-000002.vmdk");
}

#[test]
fn test_initialize_two_gb_max_extent_sparse_adornment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("d.vmdk");

    let disk =
        DiskImageFile::initialize(&path, 8 * ONE_MIB, CreateType::TwoGbMaxExtentSparse).unwrap();
    assert!(disk.is_sparse());
    assert_eq!(disk.descriptor().extents[0].file_name, "d-s001.vmdk");
    assert!(dir.path().join("d-s001.vmdk").exists());
}

#[test]
fn test_initialize_vmfs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.vmdk");

    DiskImageFile::initialize(&path, 512 * ONE_MIB, CreateType::Vmfs).unwrap();

    // Bare textual descriptor plus a flat extent file
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# Disk DescriptorFile"));
    assert!(text.contains("createType=\"vmfs\""));
    assert_eq!(
        fs::metadata(dir.path().join("c-flat.vmdk")).unwrap().len(),
        512 * ONE_MIB
    );

    let disk = DiskImageFile::open(&path, FileAccess::Read).unwrap();
    assert_eq!(disk.capacity(), 512 * ONE_MIB);
    assert!(!disk.is_sparse());
    assert!(!disk.needs_parent());

    let mut content = disk.open_content(None).unwrap();
    assert_eq!(content.len(), 512 * ONE_MIB);
    let mut buf = [0xFFu8; 4096];
    content.read_exact(&mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn test_initialize_vmfs_sparse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("redo.vmdk");

    let disk = DiskImageFile::initialize(&path, 64 * ONE_MIB, CreateType::VmfsSparse).unwrap();
    assert!(disk.is_sparse());
    assert_eq!(disk.descriptor().extents[0].file_name, "redo-sparse.vmdk");

    // COWD magic at the start of the extent file
    let bytes = fs::read(dir.path().join("redo-sparse.vmdk")).unwrap();
    assert_eq!(&bytes[0..4], b"COWD");

    let mut content = disk.open_content(None).unwrap();
    let mut buf = [0xFFu8; 2048];
    content.read_exact(&mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn test_initialize_stream_optimized_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s.vmdk");
    let result = DiskImageFile::initialize(&path, ONE_MIB, CreateType::StreamOptimized);
    assert!(matches!(result, Err(Error::UnsupportedCreateType { .. })));
}

#[test]
fn test_geometry_follows_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("g.vmdk");
    let disk = DiskImageFile::initialize(&path, 100 * ONE_MIB, CreateType::MonolithicSparse)
        .unwrap();
    let geometry = disk.geometry().expect("Missing geometry");
    assert_eq!(geometry.heads, 64);
    assert_eq!(geometry.sectors_per_track, 32);
    assert_eq!(geometry.cylinders, 100 * ONE_MIB / (64 * 32 * 512));
}

#[test]
fn test_writable_open_refreshes_content_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.vmdk");
    DiskImageFile::initialize(&path, 16 * ONE_MIB, CreateType::Vmfs).unwrap();

    let before = fs::read_to_string(&path).unwrap();
    let cid_line = |text: &str| {
        text.lines()
            .find(|l| l.starts_with("CID="))
            .map(str::to_string)
            .expect("no CID line")
    };

    let disk = DiskImageFile::open(&path, FileAccess::ReadWrite).unwrap();
    let after = fs::read_to_string(&path).unwrap();
    assert_ne!(cid_line(&before), cid_line(&after));
    assert_eq!(
        format!("CID={:08x}", disk.content_id()),
        cid_line(&after)
    );

    // Read-only opens leave the file alone
    drop(disk);
    let snapshot = fs::read_to_string(&path).unwrap();
    DiskImageFile::open(&path, FileAccess::Read).unwrap();
    assert_eq!(snapshot, fs::read_to_string(&path).unwrap());
}

#[test]
fn test_open_rejects_non_vmdk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.vmdk");
    fs::write(&path, b"\x7fELF\x02\x01\x01\x00 not a disk").unwrap();
    let result = DiskImageFile::open(&path, FileAccess::Read);
    assert!(matches!(result, Err(Error::NotAVmdk { .. })));
}

#[test]
fn test_initialize_rejects_bad_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    let result = DiskImageFile::initialize(&path, ONE_MIB, CreateType::Vmfs);
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
}
