//! VMDK descriptor parsing and serialization.
//!
//! The descriptor is a small text manifest, either a standalone `.vmdk` file
//! or embedded inside a hosted sparse extent. It carries the create type,
//! content linkage for differencing disks, the ordered extent list, and the
//! `ddb.*` disk database entries.

use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::sector::SECTOR_SIZE;

/// Sentinel for `parentCID` meaning "no parent disk".
pub const NO_PARENT: u32 = 0xffff_ffff;

/// The disk variant recorded as `createType` in the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateType {
    /// Descriptor and single sparse extent share one file.
    MonolithicSparse,
    /// Descriptor file plus one raw extent file.
    MonolithicFlat,
    /// Sparse extents of at most 2 GiB each.
    TwoGbMaxExtentSparse,
    /// Raw extents of at most 2 GiB each.
    TwoGbMaxExtentFlat,
    /// A full physical device.
    FullDevice,
    /// A physical device accessed per partition.
    PartitionedDevice,
    /// Single compressed sparse extent for streaming.
    StreamOptimized,
    /// Raw extent pre-allocated on VMFS.
    Vmfs,
    /// COWD sparse extents on VMFS, used for redo logs.
    VmfsSparse,
    /// Raw device passthrough on an ESX host.
    VmfsRaw,
    /// Raw device mapping on VMFS.
    VmfsRawDeviceMap,
    /// Raw device mapping with SCSI command passthrough.
    VmfsPassthroughRawDeviceMap,
}

impl CreateType {
    /// Parses a `createType` value, case-insensitively.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "monolithicsparse" => Ok(CreateType::MonolithicSparse),
            "monolithicflat" => Ok(CreateType::MonolithicFlat),
            "twogbmaxextentsparse" | "2gbmaxextentsparse" => Ok(CreateType::TwoGbMaxExtentSparse),
            "twogbmaxextentflat" | "2gbmaxextentflat" => Ok(CreateType::TwoGbMaxExtentFlat),
            "fulldevice" => Ok(CreateType::FullDevice),
            "partitioneddevice" => Ok(CreateType::PartitionedDevice),
            "streamoptimized" => Ok(CreateType::StreamOptimized),
            "vmfs" => Ok(CreateType::Vmfs),
            "vmfssparse" => Ok(CreateType::VmfsSparse),
            "vmfsraw" => Ok(CreateType::VmfsRaw),
            "vmfsrawdevicemap" | "vmfsrdm" => Ok(CreateType::VmfsRawDeviceMap),
            "vmfspassthroughrawdevicemap" | "vmfsrdmp" => {
                Ok(CreateType::VmfsPassthroughRawDeviceMap)
            }
            _ => Err(Error::invalid_argument(format!(
                "unknown createType: {}",
                s
            ))),
        }
    }

    /// The canonical descriptor spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            CreateType::MonolithicSparse => "monolithicSparse",
            CreateType::MonolithicFlat => "monolithicFlat",
            CreateType::TwoGbMaxExtentSparse => "twoGbMaxExtentSparse",
            CreateType::TwoGbMaxExtentFlat => "twoGbMaxExtentFlat",
            CreateType::FullDevice => "fullDevice",
            CreateType::PartitionedDevice => "partitionedDevice",
            CreateType::StreamOptimized => "streamOptimized",
            CreateType::Vmfs => "vmfs",
            CreateType::VmfsSparse => "vmfsSparse",
            CreateType::VmfsRaw => "vmfsRaw",
            CreateType::VmfsRawDeviceMap => "vmfsRawDeviceMap",
            CreateType::VmfsPassthroughRawDeviceMap => "vmfsPassthroughRawDeviceMap",
        }
    }

    /// The extent type new extents of this disk variant use.
    pub fn extent_type(&self) -> ExtentType {
        match self {
            CreateType::FullDevice
            | CreateType::MonolithicFlat
            | CreateType::PartitionedDevice
            | CreateType::TwoGbMaxExtentFlat => ExtentType::Flat,
            CreateType::MonolithicSparse
            | CreateType::StreamOptimized
            | CreateType::TwoGbMaxExtentSparse => ExtentType::Sparse,
            CreateType::Vmfs => ExtentType::Vmfs,
            CreateType::VmfsPassthroughRawDeviceMap => ExtentType::VmfsRdm,
            CreateType::VmfsRaw | CreateType::VmfsRawDeviceMap => ExtentType::VmfsRaw,
            CreateType::VmfsSparse => ExtentType::VmfsSparse,
        }
    }
}

/// The type of a single extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentType {
    /// Raw disk data in a separate file.
    Flat,
    /// Hosted sparse extent with grain tables.
    Sparse,
    /// Zeroed data without storage.
    Zero,
    /// Raw data pre-allocated on VMFS.
    Vmfs,
    /// COWD sparse extent.
    VmfsSparse,
    /// VMFS raw device mapping.
    VmfsRdm,
    /// VMFS raw passthrough.
    VmfsRaw,
}

impl ExtentType {
    /// Parses an extent type token, case-insensitively.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "FLAT" => Ok(ExtentType::Flat),
            "SPARSE" => Ok(ExtentType::Sparse),
            "ZERO" => Ok(ExtentType::Zero),
            "VMFS" => Ok(ExtentType::Vmfs),
            "VMFSSPARSE" => Ok(ExtentType::VmfsSparse),
            "VMFSRDM" => Ok(ExtentType::VmfsRdm),
            "VMFSRAW" => Ok(ExtentType::VmfsRaw),
            _ => Err(Error::invalid_argument(format!(
                "unknown extent type: {}",
                s
            ))),
        }
    }

    /// The descriptor spelling of this extent type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtentType::Flat => "FLAT",
            ExtentType::Sparse => "SPARSE",
            ExtentType::Zero => "ZERO",
            ExtentType::Vmfs => "VMFS",
            ExtentType::VmfsSparse => "VMFSSPARSE",
            ExtentType::VmfsRdm => "VMFSRDM",
            ExtentType::VmfsRaw => "VMFSRAW",
        }
    }
}

/// Declared access of a single extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentAccess {
    /// Read-write extent.
    ReadWrite,
    /// Read-only extent.
    ReadOnly,
    /// Inaccessible extent.
    NoAccess,
}

impl ExtentAccess {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "RW" => Ok(ExtentAccess::ReadWrite),
            "RDONLY" => Ok(ExtentAccess::ReadOnly),
            "NOACCESS" => Ok(ExtentAccess::NoAccess),
            _ => Err(Error::invalid_argument(format!(
                "unknown extent access: {}",
                s
            ))),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ExtentAccess::ReadWrite => "RW",
            ExtentAccess::ReadOnly => "RDONLY",
            ExtentAccess::NoAccess => "NOACCESS",
        }
    }
}

/// One entry of the descriptor's extent list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentDescriptor {
    /// Declared access.
    pub access: ExtentAccess,
    /// Size of this extent in 512-byte sectors.
    pub size_sectors: u64,
    /// Type of the extent.
    pub extent_type: ExtentType,
    /// Filename of the extent file, empty for ZERO extents.
    pub file_name: String,
    /// Offset within the extent file, in sectors. Used when a raw file is
    /// shared between extents.
    pub offset_sectors: u64,
}

/// A parsed VMDK descriptor.
#[derive(Debug, Clone)]
pub struct DescriptorFile {
    /// Descriptor format version.
    pub version: u32,
    /// Text encoding declared by the descriptor.
    pub encoding: String,
    /// Content ID, refreshed on every writable open.
    pub content_id: u32,
    /// Content ID of the parent disk, [`NO_PARENT`] when standalone.
    pub parent_content_id: u32,
    /// The disk variant.
    pub create_type: CreateType,
    /// Path hint to the parent image for differencing disks.
    pub parent_file_name_hint: Option<String>,
    /// Ordered extent list.
    pub extents: Vec<ExtentDescriptor>,
    /// CHS geometry from the disk database, when present.
    pub geometry: Option<Geometry>,
    /// Disk adapter type (e.g. "lsilogic", "ide", "buslogic").
    pub adapter_type: String,
    /// Virtual hardware version.
    pub hw_version: String,
    /// Unique identifier from `ddb.uuid`.
    pub unique_id: Option<String>,
}

impl DescriptorFile {
    /// Total disk size in sectors, the sum of all extent sizes.
    pub fn disk_size_sectors(&self) -> u64 {
        self.extents.iter().map(|e| e.size_sectors).sum()
    }

    /// Total disk size in bytes.
    pub fn disk_size_bytes(&self) -> u64 {
        self.disk_size_sectors() * SECTOR_SIZE
    }

    /// Whether content must be interpreted as a delta over a parent disk.
    pub fn needs_parent(&self) -> bool {
        self.parent_content_id != NO_PARENT
    }

    /// Parses a descriptor from its text content.
    ///
    /// Unknown keys are ignored. Fails with `NotAVmdk` when the text has no
    /// `createType` (the input is likely not a descriptor at all), and with
    /// `Corrupt` when known fields do not parse.
    pub fn parse(content: &str) -> Result<Self> {
        let mut version = 1;
        let mut encoding = String::from("UTF-8");
        let mut content_id = 0u32;
        let mut parent_content_id = NO_PARENT;
        let mut create_type = None;
        let mut parent_file_name_hint = None;
        let mut extents = Vec::new();
        let mut cylinders = None;
        let mut heads = None;
        let mut sectors = None;
        let mut adapter_type = String::new();
        let mut hw_version = String::new();
        let mut unique_id = None;

        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and section comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Extent lines start with the access token
            if line.starts_with("RW ") || line.starts_with("RDONLY ") || line.starts_with("NOACCESS ")
            {
                extents.push(parse_extent_line(line)?);
                continue;
            }

            if let Some((key, value)) = parse_key_value(line) {
                match key.as_str() {
                    "version" => {
                        version = value
                            .parse()
                            .map_err(|_| Error::corrupt(format!("invalid version: {}", value)))?;
                    }
                    "encoding" => {
                        encoding = value;
                    }
                    "CID" => {
                        content_id = u32::from_str_radix(&value, 16)
                            .map_err(|_| Error::corrupt(format!("invalid CID: {}", value)))?;
                    }
                    "parentCID" => {
                        parent_content_id = u32::from_str_radix(&value, 16)
                            .map_err(|_| Error::corrupt(format!("invalid parentCID: {}", value)))?;
                    }
                    "createType" => {
                        create_type = Some(CreateType::parse(&value)?);
                    }
                    "parentFileNameHint" => {
                        parent_file_name_hint = Some(value);
                    }
                    "ddb.geometry.cylinders" => {
                        cylinders = Some(value.parse::<u64>().map_err(|_| {
                            Error::corrupt(format!("invalid cylinders: {}", value))
                        })?);
                    }
                    "ddb.geometry.heads" => {
                        heads = Some(
                            value
                                .parse::<u32>()
                                .map_err(|_| Error::corrupt(format!("invalid heads: {}", value)))?,
                        );
                    }
                    "ddb.geometry.sectors" => {
                        sectors = Some(value.parse::<u32>().map_err(|_| {
                            Error::corrupt(format!("invalid sectors: {}", value))
                        })?);
                    }
                    "ddb.adapterType" => {
                        adapter_type = value;
                    }
                    "ddb.virtualHWVersion" => {
                        hw_version = value;
                    }
                    "ddb.uuid" => {
                        unique_id = Some(value);
                    }
                    _ => {
                        // Ignore unknown keys
                    }
                }
            }
        }

        let create_type = create_type
            .ok_or_else(|| Error::not_a_vmdk("no createType found in descriptor"))?;

        let geometry = match (cylinders, heads, sectors) {
            (Some(c), Some(h), Some(s)) => Some(Geometry::new(c, h, s)),
            _ => None,
        };

        Ok(DescriptorFile {
            version,
            encoding,
            content_id,
            parent_content_id,
            create_type,
            parent_file_name_hint,
            extents,
            geometry,
            adapter_type,
            hw_version,
            unique_id,
        })
    }

    /// Serializes the descriptor to its canonical text form.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("# Disk DescriptorFile\n");
        out.push_str(&format!("version={}\n", self.version));
        out.push_str(&format!("encoding=\"{}\"\n", self.encoding));
        out.push_str(&format!("CID={:08x}\n", self.content_id));
        out.push_str(&format!("parentCID={:08x}\n", self.parent_content_id));
        out.push_str(&format!("createType=\"{}\"\n", self.create_type.as_str()));
        if let Some(ref hint) = self.parent_file_name_hint {
            out.push_str(&format!("parentFileNameHint=\"{}\"\n", hint));
        }

        out.push_str("\n# Extent description\n");
        for extent in &self.extents {
            out.push_str(&extent_line(extent));
            out.push('\n');
        }

        out.push_str("\n# The Disk Data Base \n#DDB\n\n");
        if !self.hw_version.is_empty() {
            out.push_str(&format!("ddb.virtualHWVersion = \"{}\"\n", self.hw_version));
        }
        if let Some(ref uuid) = self.unique_id {
            out.push_str(&format!("ddb.uuid = \"{}\"\n", uuid));
        }
        if let Some(geometry) = self.geometry {
            out.push_str(&format!(
                "ddb.geometry.cylinders = \"{}\"\n",
                geometry.cylinders
            ));
            out.push_str(&format!("ddb.geometry.heads = \"{}\"\n", geometry.heads));
            out.push_str(&format!(
                "ddb.geometry.sectors = \"{}\"\n",
                geometry.sectors_per_track
            ));
        }
        if !self.adapter_type.is_empty() {
            out.push_str(&format!("ddb.adapterType = \"{}\"\n", self.adapter_type));
        }
        out
    }
}

fn extent_line(extent: &ExtentDescriptor) -> String {
    match extent.extent_type {
        ExtentType::Zero => format!(
            "{} {} {}",
            extent.access.as_str(),
            extent.size_sectors,
            extent.extent_type.as_str()
        ),
        // Only raw extent types carry an in-file offset
        ExtentType::Flat | ExtentType::Vmfs => format!(
            "{} {} {} \"{}\" {}",
            extent.access.as_str(),
            extent.size_sectors,
            extent.extent_type.as_str(),
            extent.file_name,
            extent.offset_sectors
        ),
        _ => format!(
            "{} {} {} \"{}\"",
            extent.access.as_str(),
            extent.size_sectors,
            extent.extent_type.as_str(),
            extent.file_name
        ),
    }
}

/// Parse a key=value or key = value line.
///
/// Returns None if the line doesn't contain an equals sign.
fn parse_key_value(line: &str) -> Option<(String, String)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim().to_string();
    let mut value = line[eq_pos + 1..].trim().to_string();

    // Remove surrounding quotes if present
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        value = value[1..value.len() - 1].to_string();
    }

    Some((key, value))
}

/// Parse an extent line like: `RW 838860800 FLAT "disk-flat.vmdk" 0`
fn parse_extent_line(line: &str) -> Result<ExtentDescriptor> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(Error::corrupt(format!("invalid extent line: {}", line)));
    }

    let access = ExtentAccess::parse(parts[0])?;
    let size_sectors: u64 = parts[1]
        .parse()
        .map_err(|_| Error::corrupt(format!("invalid extent size: {}", parts[1])))?;
    let extent_type = ExtentType::parse(parts[2])?;

    // ZERO extents have no backing file
    let rest = line
        .split_whitespace()
        .skip(3)
        .collect::<Vec<&str>>()
        .join(" ");
    if rest.is_empty() {
        return Ok(ExtentDescriptor {
            access,
            size_sectors,
            extent_type,
            file_name: String::new(),
            offset_sectors: 0,
        });
    }

    let (file_name, offset_str) = parse_quoted_filename_and_offset(&rest)?;
    let offset_sectors = if offset_str.is_empty() {
        0
    } else {
        offset_str
            .parse()
            .map_err(|_| Error::corrupt(format!("invalid extent offset: {}", offset_str)))?
    };

    Ok(ExtentDescriptor {
        access,
        size_sectors,
        extent_type,
        file_name,
        offset_sectors,
    })
}

/// Parse a quoted filename followed by an optional offset, e.g. `"disk.vmdk" 0`
fn parse_quoted_filename_and_offset(s: &str) -> Result<(String, String)> {
    let s = s.trim();

    if !s.starts_with('"') {
        return Err(Error::corrupt(format!("expected quoted filename, got: {}", s)));
    }

    let end_quote = s[1..]
        .find('"')
        .ok_or_else(|| Error::corrupt(format!("unclosed quote in: {}", s)))?
        + 1;

    let file_name = s[1..end_quote].to_string();
    let offset_str = s[end_quote + 1..].trim().to_string();

    Ok((file_name, offset_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_type_parse() {
        assert_eq!(
            CreateType::parse("monolithicSparse").unwrap(),
            CreateType::MonolithicSparse
        );
        assert_eq!(
            CreateType::parse("MONOLITHICFLAT").unwrap(),
            CreateType::MonolithicFlat
        );
        assert_eq!(
            CreateType::parse("2GbMaxExtentSparse").unwrap(),
            CreateType::TwoGbMaxExtentSparse
        );
        assert_eq!(
            CreateType::parse("vmfsRDM").unwrap(),
            CreateType::VmfsRawDeviceMap
        );
        assert!(CreateType::parse("floppy").is_err());
    }

    #[test]
    fn test_create_type_round_trip() {
        for create_type in [
            CreateType::MonolithicSparse,
            CreateType::MonolithicFlat,
            CreateType::TwoGbMaxExtentSparse,
            CreateType::TwoGbMaxExtentFlat,
            CreateType::FullDevice,
            CreateType::PartitionedDevice,
            CreateType::StreamOptimized,
            CreateType::Vmfs,
            CreateType::VmfsSparse,
            CreateType::VmfsRaw,
            CreateType::VmfsRawDeviceMap,
            CreateType::VmfsPassthroughRawDeviceMap,
        ] {
            assert_eq!(CreateType::parse(create_type.as_str()).unwrap(), create_type);
        }
    }

    #[test]
    fn test_create_type_to_extent_type() {
        assert_eq!(
            CreateType::MonolithicFlat.extent_type(),
            ExtentType::Flat
        );
        assert_eq!(
            CreateType::StreamOptimized.extent_type(),
            ExtentType::Sparse
        );
        assert_eq!(CreateType::Vmfs.extent_type(), ExtentType::Vmfs);
        assert_eq!(
            CreateType::VmfsPassthroughRawDeviceMap.extent_type(),
            ExtentType::VmfsRdm
        );
        assert_eq!(
            CreateType::VmfsRawDeviceMap.extent_type(),
            ExtentType::VmfsRaw
        );
        assert_eq!(
            CreateType::VmfsSparse.extent_type(),
            ExtentType::VmfsSparse
        );
    }

    #[test]
    fn test_extent_type_parse() {
        assert_eq!(ExtentType::parse("FLAT").unwrap(), ExtentType::Flat);
        assert_eq!(ExtentType::parse("flat").unwrap(), ExtentType::Flat);
        assert_eq!(ExtentType::parse("SPARSE").unwrap(), ExtentType::Sparse);
        assert!(ExtentType::parse("UNKNOWN").is_err());
    }

    #[test]
    fn test_parse_extent_line() {
        let extent = parse_extent_line("RW 838860800 FLAT \"TestVM-flat.vmdk\" 0").unwrap();
        assert_eq!(extent.access, ExtentAccess::ReadWrite);
        assert_eq!(extent.size_sectors, 838860800);
        assert_eq!(extent.extent_type, ExtentType::Flat);
        assert_eq!(extent.file_name, "TestVM-flat.vmdk");
        assert_eq!(extent.offset_sectors, 0);
    }

    #[test]
    fn test_parse_extent_line_sparse_without_offset() {
        let extent = parse_extent_line("RW 12345 SPARSE \"disk.vmdk\"").unwrap();
        assert_eq!(extent.size_sectors, 12345);
        assert_eq!(extent.extent_type, ExtentType::Sparse);
        assert_eq!(extent.offset_sectors, 0);
    }

    #[test]
    fn test_parse_extent_line_zero() {
        let extent = parse_extent_line("RW 4192256 ZERO").unwrap();
        assert_eq!(extent.extent_type, ExtentType::Zero);
        assert!(extent.file_name.is_empty());
    }

    #[test]
    fn test_parse_extent_line_filename_with_spaces() {
        let extent = parse_extent_line("RW 1000 FLAT \"my disk file.vmdk\" 128").unwrap();
        assert_eq!(extent.file_name, "my disk file.vmdk");
        assert_eq!(extent.offset_sectors, 128);
    }

    #[test]
    fn test_parse_descriptor() {
        let content = r#"
# Disk DescriptorFile
version=1
encoding="UTF-8"
CID=123a5678
parentCID=ffffffff
createType="twoGbMaxExtentSparse"

# Extent description
RW 4192256 SPARSE "disk-s001.vmdk"
RW 2048 SPARSE "disk-s002.vmdk"

# The Disk Data Base
#DDB

ddb.virtualHWVersion = "4"
ddb.geometry.cylinders = "4096"
ddb.geometry.heads = "16"
ddb.geometry.sectors = "63"
ddb.adapterType = "ide"
"#;
        let descriptor = DescriptorFile::parse(content).unwrap();
        assert_eq!(descriptor.content_id, 0x123a5678);
        assert_eq!(descriptor.parent_content_id, NO_PARENT);
        assert!(!descriptor.needs_parent());
        assert_eq!(descriptor.create_type, CreateType::TwoGbMaxExtentSparse);
        assert_eq!(descriptor.extents.len(), 2);
        assert_eq!(descriptor.disk_size_sectors(), 4194304);
        let geometry = descriptor.geometry.unwrap();
        assert_eq!(geometry.cylinders, 4096);
        assert_eq!(geometry.heads, 16);
        assert_eq!(descriptor.adapter_type, "ide");
    }

    #[test]
    fn test_parse_descriptor_with_parent() {
        let content = concat!(
            "version=1\n",
            "CID=0000aaaa\n",
            "parentCID=0000bbbb\n",
            "createType=\"monolithicSparse\"\n",
            "parentFileNameHint=\"base.vmdk\"\n",
            "RW 2048 SPARSE \"child.vmdk\"\n",
        );
        let descriptor = DescriptorFile::parse(content).unwrap();
        assert!(descriptor.needs_parent());
        assert_eq!(descriptor.parent_content_id, 0xbbbb);
        assert_eq!(descriptor.parent_file_name_hint.as_deref(), Some("base.vmdk"));
    }

    #[test]
    fn test_parse_non_descriptor_text() {
        let result = DescriptorFile::parse("hello world\nthis is not a vmdk\n");
        assert!(matches!(result, Err(Error::NotAVmdk { .. })));
    }

    #[test]
    fn test_serialize_round_trip() {
        let descriptor = DescriptorFile {
            version: 1,
            encoding: "UTF-8".to_string(),
            content_id: 0xdeadbeef,
            parent_content_id: NO_PARENT,
            create_type: CreateType::TwoGbMaxExtentFlat,
            parent_file_name_hint: None,
            extents: vec![
                ExtentDescriptor {
                    access: ExtentAccess::ReadWrite,
                    size_sectors: 4192256,
                    extent_type: ExtentType::Flat,
                    file_name: "disk-000001.vmdk".to_string(),
                    offset_sectors: 0,
                },
                ExtentDescriptor {
                    access: ExtentAccess::ReadWrite,
                    size_sectors: 2048,
                    extent_type: ExtentType::Flat,
                    file_name: "disk-000002.vmdk".to_string(),
                    offset_sectors: 0,
                },
            ],
            geometry: Some(Geometry::new(1024, 255, 63)),
            adapter_type: "lsilogic".to_string(),
            hw_version: "4".to_string(),
            unique_id: Some("01 23 45 67 89 ab cd ef 01 23 45 67 89 ab cd ef".to_string()),
        };

        let text = descriptor.to_text();
        let reparsed = DescriptorFile::parse(&text).unwrap();
        assert_eq!(reparsed.content_id, descriptor.content_id);
        assert_eq!(reparsed.parent_content_id, descriptor.parent_content_id);
        assert_eq!(reparsed.create_type, descriptor.create_type);
        assert_eq!(reparsed.extents, descriptor.extents);
        assert_eq!(reparsed.geometry, descriptor.geometry);
        assert_eq!(reparsed.adapter_type, descriptor.adapter_type);
        assert_eq!(reparsed.unique_id, descriptor.unique_id);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let content = concat!(
            "createType=\"monolithicFlat\"\n",
            "ddb.toolsVersion = \"0\"\n",
            "someFutureKey=\"42\"\n",
        );
        assert!(DescriptorFile::parse(content).is_ok());
    }
}
