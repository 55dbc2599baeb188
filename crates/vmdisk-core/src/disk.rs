//! VMDK disk image files.
//!
//! A [`DiskImageFile`] owns a parsed descriptor plus the means to reach its
//! extent data: a file locator for multi-file disks, or the original byte
//! stream for monolithic sparse disks opened from memory. Content is
//! exposed as one composed [`SparseStream`] over all extents.

use std::cell::RefCell;
use std::cmp;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use log::{debug, info};

use crate::descriptor::{
    CreateType, DescriptorFile, ExtentAccess, ExtentDescriptor, ExtentType, NO_PARENT,
};
use crate::error::{Error, Result};
use crate::extent;
use crate::geometry::Geometry;
use crate::locator::{FileAccess, FileLocator, FileMode, FileShare, LocalFileLocator};
use crate::sector::{self, ONE_GIB, ONE_KIB, ONE_MIB, SECTOR_SIZE};
use crate::sparse::hosted::HostedSparseExtentStream;
use crate::sparse::{HostedSparseExtentHeader, HOSTED_MAGIC};
use crate::stream::{self, ConcatStream, ReadSeek, SparseStream, ZeroStream};

/// Embedded descriptor window reserved in new monolithic sparse disks.
pub const DESCRIPTOR_RESERVATION: u64 = 10 * ONE_KIB;

// Split disks cap each extent just under 2 GiB.
const MAX_SPLIT_EXTENT: u64 = 2 * ONE_GIB - ONE_MIB;

/// Where a disk's descriptor was found.
enum DescriptorLocation {
    /// The whole input is the textual descriptor.
    Bare,
    /// The descriptor occupies a window of a hosted sparse extent.
    Embedded { start: u64, length: u64 },
}

/// One logical VMDK image.
pub struct DiskImageFile {
    descriptor: DescriptorFile,
    locator: Option<Box<dyn FileLocator>>,
    access: FileAccess,
    /// Set when the disk was opened from a stream whose descriptor was
    /// embedded in the sparse extent; content reads go through this handle
    /// instead of the filesystem.
    monolithic: Option<Rc<RefCell<Box<dyn ReadSeek>>>>,
}

impl DiskImageFile {
    /// Opens a VMDK from a descriptor or monolithic sparse file on disk.
    ///
    /// Opening read-write refreshes the descriptor's content ID and rewrites
    /// the descriptor in place; callers that must not modify the file have
    /// to open read-only.
    pub fn open(path: impl AsRef<Path>, access: FileAccess) -> Result<Self> {
        let path = path.as_ref();
        info!("opening VMDK {}", path.display());

        let mut options = OpenOptions::new();
        options.read(true);
        if access == FileAccess::ReadWrite {
            options.write(true);
        }
        let mut file = options.open(path).map_err(|e| Error::io(e, path))?;

        let (mut descriptor, location) = probe_descriptor(&mut file)?;
        if access == FileAccess::ReadWrite {
            rewrite_descriptor(&mut file, &mut descriptor, &location)?;
        }

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self {
            descriptor,
            locator: Some(Box::new(LocalFileLocator::new(base))),
            access,
            monolithic: None,
        })
    }

    /// Opens a monolithic sparse VMDK from an in-memory or already-open
    /// byte stream, read-only.
    ///
    /// The stream is retained and serves all content reads, so no filesystem
    /// access happens. Fails with `InvalidArgument` for any disk that is not
    /// a standalone monolithic sparse image.
    pub fn open_stream<S: Read + Seek + 'static>(mut stream: S) -> Result<Self> {
        let (descriptor, _) = probe_descriptor(&mut stream)?;

        if descriptor.create_type != CreateType::MonolithicSparse {
            return Err(Error::invalid_argument(
                "only monolithicSparse disks can be opened from a stream",
            ));
        }
        if descriptor.extents.len() != 1
            || descriptor.extents[0].extent_type != ExtentType::Sparse
        {
            return Err(Error::invalid_argument(
                "monolithic disk must have exactly one sparse extent",
            ));
        }
        if descriptor.parent_content_id != NO_PARENT {
            return Err(Error::invalid_argument(
                "differencing disks cannot be opened from a stream",
            ));
        }

        let stream: Box<dyn ReadSeek> = Box::new(stream);
        Ok(Self {
            descriptor,
            locator: None,
            access: FileAccess::Read,
            monolithic: Some(Rc::new(RefCell::new(stream))),
        })
    }

    /// Creates a new blank disk at `path` and returns it opened read-write.
    ///
    /// Creation is not atomic: a failure partway through a split disk can
    /// leave some extent files behind for the caller to clean up.
    pub fn initialize(
        path: impl AsRef<Path>,
        capacity_bytes: u64,
        create_type: CreateType,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::invalid_argument(format!("invalid disk file name: {}", path.display()))
            })?
            .to_string();
        let locator = LocalFileLocator::new(path.parent().unwrap_or_else(|| Path::new(".")));
        info!(
            "initializing {} as {} ({} bytes)",
            path.display(),
            create_type.as_str(),
            capacity_bytes
        );

        let mut descriptor = DescriptorFile {
            version: 1,
            encoding: "UTF-8".to_string(),
            content_id: rand::random(),
            parent_content_id: NO_PARENT,
            create_type,
            parent_file_name_hint: None,
            extents: Vec::new(),
            geometry: Some(Geometry::from_capacity(capacity_bytes)),
            adapter_type: "lsilogic".to_string(),
            hw_version: "4".to_string(),
            unique_id: Some(new_unique_id()),
        };

        match create_type {
            CreateType::MonolithicSparse => {
                let mut file = locator.open(
                    &file_name,
                    FileMode::Create,
                    FileAccess::ReadWrite,
                    FileShare::None,
                )?;
                let descriptor_start = extent::initialize_extent(
                    &mut file,
                    ExtentType::Sparse,
                    capacity_bytes,
                    DESCRIPTOR_RESERVATION,
                )?;
                descriptor.extents.push(ExtentDescriptor {
                    access: ExtentAccess::ReadWrite,
                    size_sectors: capacity_bytes / SECTOR_SIZE,
                    extent_type: ExtentType::Sparse,
                    file_name: file_name.clone(),
                    offset_sectors: 0,
                });

                let text = descriptor.to_text();
                if text.len() as u64 > DESCRIPTOR_RESERVATION {
                    return Err(Error::corrupt(
                        "descriptor does not fit its embedded window",
                    ));
                }
                file.seek(SeekFrom::Start(descriptor_start * SECTOR_SIZE))?;
                file.write_all(text.as_bytes())?;
            }
            CreateType::MonolithicFlat | CreateType::Vmfs | CreateType::VmfsSparse => {
                let adornment = if create_type == CreateType::VmfsSparse {
                    "sparse"
                } else {
                    "flat"
                };
                let extent_name = adorn_file_name(&file_name, adornment)?;
                let extent_type = create_type.extent_type();
                let mut file = locator.open(
                    &extent_name,
                    FileMode::Create,
                    FileAccess::ReadWrite,
                    FileShare::None,
                )?;
                extent::initialize_extent(&mut file, extent_type, capacity_bytes, 0)?;
                descriptor.extents.push(ExtentDescriptor {
                    access: ExtentAccess::ReadWrite,
                    size_sectors: capacity_bytes / SECTOR_SIZE,
                    extent_type,
                    file_name: extent_name,
                    offset_sectors: 0,
                });
                write_descriptor_file(&locator, &file_name, &descriptor)?;
            }
            CreateType::TwoGbMaxExtentFlat | CreateType::TwoGbMaxExtentSparse => {
                let extent_type = create_type.extent_type();
                let mut remaining = capacity_bytes;
                let mut index = 1;
                while remaining > 0 {
                    let size = cmp::min(MAX_SPLIT_EXTENT, remaining);
                    let adornment = if create_type == CreateType::TwoGbMaxExtentSparse {
                        format!("s{:03x}", index)
                    } else {
                        format!("{:06x}", index)
                    };
                    let extent_name = adorn_file_name(&file_name, &adornment)?;
                    let mut file = locator.open(
                        &extent_name,
                        FileMode::Create,
                        FileAccess::ReadWrite,
                        FileShare::None,
                    )?;
                    extent::initialize_extent(&mut file, extent_type, size, 0)?;
                    descriptor.extents.push(ExtentDescriptor {
                        access: ExtentAccess::ReadWrite,
                        size_sectors: size / SECTOR_SIZE,
                        extent_type,
                        file_name: extent_name,
                        offset_sectors: 0,
                    });
                    remaining -= size;
                    index += 1;
                }
                write_descriptor_file(&locator, &file_name, &descriptor)?;
            }
            other => return Err(Error::unsupported_create_type(other.as_str())),
        }

        Self::open(path, FileAccess::ReadWrite)
    }

    /// Opens the disk's logical contents as one sparse stream.
    ///
    /// For a differencing disk, `parent` supplies the content of
    /// unallocated grains; ownership of the parent transfers to the
    /// returned stream. A disk without a parent link always composes over
    /// zeros, whatever the caller supplied.
    pub fn open_content(
        &self,
        parent: Option<Box<dyn SparseStream>>,
    ) -> Result<Box<dyn SparseStream>> {
        let parent: Box<dyn SparseStream> = if self.needs_parent() {
            parent.unwrap_or_else(|| Box::new(ZeroStream::new(self.capacity())))
        } else {
            Box::new(ZeroStream::new(self.capacity()))
        };
        let parent = stream::share(parent);

        if self.descriptor.extents.len() == 1 {
            if let Some(ref monolithic) = self.monolithic {
                let handle = SharedHandle(Rc::clone(monolithic));
                return Ok(Box::new(HostedSparseExtentStream::new(
                    handle,
                    0,
                    Some(parent),
                )?));
            }
        }

        let locator = self
            .locator
            .as_deref()
            .ok_or_else(|| Error::invalid_argument("disk has no extent locator"))?;

        let mut parts: Vec<Box<dyn SparseStream>> =
            Vec::with_capacity(self.descriptor.extents.len());
        let mut extent_start = 0;
        for descriptor in &self.descriptor.extents {
            parts.push(extent::open_extent(
                locator,
                self.access,
                descriptor,
                extent_start,
                Some(Rc::clone(&parent)),
            )?);
            extent_start += descriptor.size_sectors * SECTOR_SIZE;
        }

        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(Box::new(ConcatStream::new(parts)))
        }
    }

    /// Logical disk capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.descriptor.disk_size_bytes()
    }

    /// CHS geometry from the descriptor, when recorded.
    pub fn geometry(&self) -> Option<Geometry> {
        self.descriptor.geometry
    }

    /// Whether the disk variant allocates storage on demand.
    pub fn is_sparse(&self) -> bool {
        matches!(
            self.descriptor.create_type,
            CreateType::MonolithicSparse
                | CreateType::TwoGbMaxExtentSparse
                | CreateType::VmfsSparse
        )
    }

    /// Whether content must be composed over a parent disk.
    pub fn needs_parent(&self) -> bool {
        self.descriptor.needs_parent()
    }

    /// Path hint to the parent image, for differencing disks.
    pub fn parent_location(&self) -> Option<&str> {
        self.descriptor.parent_file_name_hint.as_deref()
    }

    /// The disk's content ID.
    pub fn content_id(&self) -> u32 {
        self.descriptor.content_id
    }

    /// The disk variant.
    pub fn create_type(&self) -> CreateType {
        self.descriptor.create_type
    }

    /// The parsed descriptor.
    pub fn descriptor(&self) -> &DescriptorFile {
        &self.descriptor
    }
}

/// Mangles `name` into the name of an auxiliary extent file, e.g.
/// `disk.vmdk` + `s001` -> `disk-s001.vmdk`.
pub fn adorn_file_name(name: &str, adornment: &str) -> Result<String> {
    if name.len() < 5 || !name[name.len() - 5..].eq_ignore_ascii_case(".vmdk") {
        return Err(Error::invalid_argument(format!(
            "file name must end in .vmdk: {}",
            name
        )));
    }
    Ok(format!("{}-{}.vmdk", &name[..name.len() - 5], adornment))
}

/// Locates and parses the descriptor of `stream`.
///
/// A hosted sparse magic means the descriptor is embedded; anything else is
/// treated as descriptor text.
fn probe_descriptor<S: Read + Seek>(
    stream: &mut S,
) -> Result<(DescriptorFile, DescriptorLocation)> {
    let length = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(0))?;
    let head_len = cmp::min(length, SECTOR_SIZE) as usize;
    let mut head = vec![0u8; head_len];
    stream.read_exact(&mut head)?;

    if head_len >= 4 && sector::read_u32(&head, 0) == HOSTED_MAGIC {
        if head_len < SECTOR_SIZE as usize {
            return Err(Error::corrupt("sparse extent truncated within its header"));
        }
        let header = HostedSparseExtentHeader::read(&head)?;
        if header.descriptor_offset == 0 {
            return Err(Error::not_a_vmdk(
                "sparse extent has no embedded descriptor",
            ));
        }
        let start = header.descriptor_offset * SECTOR_SIZE;
        let window = header.descriptor_size * SECTOR_SIZE;
        if start + window > length {
            return Err(Error::corrupt("descriptor region extends beyond file"));
        }

        let mut bytes = vec![0u8; window as usize];
        stream.seek(SeekFrom::Start(start))?;
        stream.read_exact(&mut bytes)?;
        // The text ends at the first NUL of the zero-padded window
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let text = std::str::from_utf8(&bytes[..end])
            .map_err(|_| Error::corrupt("embedded descriptor is not valid UTF-8"))?;
        debug!("found embedded descriptor at sector {}", header.descriptor_offset);

        let descriptor = DescriptorFile::parse(text)?;
        Ok((
            descriptor,
            DescriptorLocation::Embedded {
                start,
                length: window,
            },
        ))
    } else {
        let mut bytes = vec![0u8; length as usize];
        stream.seek(SeekFrom::Start(0))?;
        stream.read_exact(&mut bytes)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| {
            Error::not_a_vmdk("input is neither a sparse extent nor descriptor text")
        })?;
        let descriptor = DescriptorFile::parse(text)?;
        Ok((descriptor, DescriptorLocation::Bare))
    }
}

/// Refreshes the content ID and writes the descriptor back where it was
/// found. Serialization happens into a buffer first, so a failure leaves
/// the file untouched.
fn rewrite_descriptor(
    file: &mut File,
    descriptor: &mut DescriptorFile,
    location: &DescriptorLocation,
) -> Result<()> {
    descriptor.content_id = rand::random();
    let text = descriptor.to_text();

    match *location {
        DescriptorLocation::Embedded { start, length } => {
            if text.len() as u64 > length {
                return Err(Error::corrupt(
                    "descriptor does not fit its embedded window",
                ));
            }
            let mut window = vec![0u8; length as usize];
            window[..text.len()].copy_from_slice(text.as_bytes());
            file.seek(SeekFrom::Start(start))?;
            file.write_all(&window)?;
        }
        DescriptorLocation::Bare => {
            // A shorter descriptor shrinks the file; a longer one grows it
            file.seek(SeekFrom::Start(0))?;
            file.write_all(text.as_bytes())?;
            file.set_len(text.len() as u64)?;
        }
    }
    debug!("rewrote descriptor, new CID {:08x}", descriptor.content_id);
    Ok(())
}

fn write_descriptor_file(
    locator: &LocalFileLocator,
    name: &str,
    descriptor: &DescriptorFile,
) -> Result<()> {
    let mut file = locator.open(name, FileMode::Create, FileAccess::ReadWrite, FileShare::None)?;
    file.write_all(descriptor.to_text().as_bytes())?;
    Ok(())
}

/// 128-bit identifier for `ddb.uuid`, space-separated base16 bytes.
fn new_unique_id() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

// Clonable Read + Seek view over the retained monolithic stream.
struct SharedHandle(Rc<RefCell<Box<dyn ReadSeek>>>);

impl Read for SharedHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().read(buf)
    }
}

impl Seek for SharedHandle {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.0.borrow_mut().seek(pos)
    }
}
