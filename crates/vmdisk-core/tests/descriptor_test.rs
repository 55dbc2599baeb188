//! Integration tests for descriptor parsing and serialization.

use vmdisk_core::{CreateType, DescriptorFile, ExtentAccess, ExtentType, NO_PARENT};

const SAMPLE: &str = r#"# Disk DescriptorFile
version=1
encoding="UTF-8"
CID=fb183c21
parentCID=ffffffff
createType="monolithicSparse"

# Extent description
RW 209715200 SPARSE "TestVM.vmdk"

# The Disk Data Base
#DDB

ddb.virtualHWVersion = "4"
ddb.geometry.cylinders = "13054"
ddb.geometry.heads = "255"
ddb.geometry.sectors = "63"
ddb.adapterType = "lsilogic"
"#;

#[test]
fn test_parse_sample_descriptor() {
    let descriptor = DescriptorFile::parse(SAMPLE).expect("Failed to parse descriptor");

    assert_eq!(descriptor.version, 1);
    assert_eq!(descriptor.content_id, 0xfb183c21);
    assert_eq!(descriptor.parent_content_id, NO_PARENT);
    assert_eq!(descriptor.create_type, CreateType::MonolithicSparse);
    assert_eq!(descriptor.extents.len(), 1);

    let extent = &descriptor.extents[0];
    assert_eq!(extent.access, ExtentAccess::ReadWrite);
    assert_eq!(extent.size_sectors, 209715200);
    assert_eq!(extent.extent_type, ExtentType::Sparse);
    assert_eq!(extent.file_name, "TestVM.vmdk");

    let geometry = descriptor.geometry.expect("Missing geometry");
    assert_eq!(geometry.cylinders, 13054);
    assert_eq!(geometry.heads, 255);
    assert_eq!(geometry.sectors_per_track, 63);
}

#[test]
fn test_serialized_text_reparses_identically() {
    let descriptor = DescriptorFile::parse(SAMPLE).unwrap();
    let text = descriptor.to_text();
    let reparsed = DescriptorFile::parse(&text).unwrap();

    assert_eq!(reparsed.version, descriptor.version);
    assert_eq!(reparsed.content_id, descriptor.content_id);
    assert_eq!(reparsed.parent_content_id, descriptor.parent_content_id);
    assert_eq!(reparsed.create_type, descriptor.create_type);
    assert_eq!(reparsed.extents, descriptor.extents);
    assert_eq!(reparsed.geometry, descriptor.geometry);
    assert_eq!(reparsed.adapter_type, descriptor.adapter_type);
    assert_eq!(reparsed.hw_version, descriptor.hw_version);
}

#[test]
fn test_disk_size_sums_extents() {
    let content = concat!(
        "createType=\"twoGbMaxExtentFlat\"\n",
        "RW 4192256 FLAT \"a-000001.vmdk\" 0\n",
        "RW 1000 FLAT \"a-000002.vmdk\" 0\n",
    );
    let descriptor = DescriptorFile::parse(content).unwrap();
    assert_eq!(descriptor.disk_size_sectors(), 4193256);
    assert_eq!(descriptor.disk_size_bytes(), 4193256 * 512);
}

#[test]
fn test_differencing_descriptor_links_parent() {
    let content = concat!(
        "CID=00000001\n",
        "parentCID=00000002\n",
        "createType=\"monolithicSparse\"\n",
        "parentFileNameHint=\"/vm/base.vmdk\"\n",
        "RW 2048 SPARSE \"child.vmdk\"\n",
    );
    let descriptor = DescriptorFile::parse(content).unwrap();
    assert!(descriptor.needs_parent());
    assert_eq!(
        descriptor.parent_file_name_hint.as_deref(),
        Some("/vm/base.vmdk")
    );

    // The parent linkage must survive a round trip
    let reparsed = DescriptorFile::parse(&descriptor.to_text()).unwrap();
    assert_eq!(reparsed.parent_content_id, 2);
    assert_eq!(
        reparsed.parent_file_name_hint.as_deref(),
        Some("/vm/base.vmdk")
    );
}
