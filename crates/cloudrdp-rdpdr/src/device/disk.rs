//! Virtual disk device backed by a directory on the host.
//!
//! The server addresses files through opaque 32-bit file ids handed out by
//! the create operation; every path it sends is interpreted relative to the
//! configured root directory and is never allowed to escape it.

use std::collections::HashMap;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{Read as _, Seek as _, SeekFrom, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cloudrdp_core::{utf16_encoded_len, WriteBuf};
use tracing::{debug, warn};

use crate::device::{IoReply, RdpdrDevice};
use crate::pdu::efs::{
    CreateDisposition, CreateOptions, DeviceCreateRequest, DeviceReadRequest, DeviceType, DeviceWriteRequest,
    FileAttributes, FileInformationClass, FileSystemAttributes, FsInformationClass, NtStatus,
    ServerDriveQueryDirectoryRequest, ServerDriveSetInformationRequest, SetInformationData,
};

/// Label reported for the volume.
const VOLUME_LABEL: &str = "CLOUDSOFT";

/// File system name reported in attribute queries.
const FILE_SYSTEM_NAME: &str = "RDPFS";

const BYTES_PER_SECTOR: u32 = 0x200;
const SECTORS_PER_ALLOCATION_UNIT: u32 = 8;
const ALLOCATION_UNIT: u64 = BYTES_PER_SECTOR as u64 * SECTORS_PER_ALLOCATION_UNIT as u64;

/// Advertised volume geometry; the host file system's real numbers are not
/// exposed.
const TOTAL_ALLOCATION_UNITS: u64 = 10 * 1024 * 1024 / ALLOCATION_UNIT;
const AVAILABLE_ALLOCATION_UNITS: u64 = 5 * 1024 * 1024 / ALLOCATION_UNIT;
const FREE_ALLOCATION_UNITS: u64 = 6 * 1024 * 1024 / ALLOCATION_UNIT;

/// Access mask bits that signal an intent to delete in a disposition
/// set-information request.
const DELETE_INTENT_MASK: u32 = 0x0000_1100;

/// Milliseconds between 1601-01-01 and the Unix epoch.
const FILETIME_EPOCH_DELTA_MILLIS: u64 = 11_644_473_600_000;

/// A directory exposed to the server as a redirected drive.
#[derive(Debug)]
pub struct DiskDevice {
    device_name: String,
    device_id: u32,
    root: PathBuf,
    files: HashMap<u32, OpenFile>,
    next_file_id: u32,
}

#[derive(Debug)]
struct OpenFile {
    host_path: PathBuf,
    access_mask: u32,
    delete_on_close: bool,
    dir_listing: Option<DirListing>,
    handle: Option<File>,
    handle_writable: bool,
}

/// Snapshot of a directory enumeration: the entries captured at the initial
/// query, walked one entry per request.
#[derive(Debug)]
struct DirListing {
    entries: Vec<PathBuf>,
    next: usize,
    /// Search pattern from the initial query. Stored for diagnostics only;
    /// servers enumerate with `*` and filter on their side.
    pattern: String,
}

impl DiskDevice {
    pub fn new(device_name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            device_name: device_name.into(),
            device_id: 0,
            root: root.into(),
            files: HashMap::new(),
            next_file_id: 1,
        }
    }

    /// Maps a wire path onto the host, rejecting anything that would step
    /// outside the root directory.
    fn resolve(&self, wire_path: &str) -> Result<PathBuf, NtStatus> {
        let relative = wire_path.replace('\\', "/");
        let relative = relative.trim_matches('/');

        if relative.split('/').any(|component| component == "..") {
            warn!(wire_path, "path traversal rejected");
            return Err(NtStatus::ACCESS_DENIED);
        }

        if relative.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(relative))
        }
    }

    fn file_id_for_path(&self, path: &Path) -> Option<u32> {
        self.files
            .iter()
            .find(|(_, open)| open.host_path == path)
            .map(|(&id, _)| id)
    }
}

impl RdpdrDevice for DiskDevice {
    fn device_type(&self) -> DeviceType {
        DeviceType::Filesystem
    }

    fn name(&self) -> &str {
        &self.device_name
    }

    fn register(&mut self, device_id: u32) {
        self.device_id = device_id;
        debug!(device_id, root = %self.root.display(), "disk device registered");
    }

    fn create(&mut self, req: &DeviceCreateRequest) -> IoReply {
        let path = match self.resolve(&req.path) {
            Ok(path) => path,
            Err(status) => return IoReply::error(status),
        };

        let exists = path.exists();
        let is_dir = path.is_dir();
        let wants_dir = req.create_options.contains(CreateOptions::FILE_DIRECTORY_FILE);

        let status = match req.create_disposition {
            CreateDisposition::Open => {
                if exists {
                    NtStatus::SUCCESS
                } else {
                    NtStatus::NO_SUCH_FILE
                }
            }
            CreateDisposition::Create => {
                if exists {
                    NtStatus::ACCESS_DENIED
                } else {
                    create_node(&path, wants_dir)
                }
            }
            CreateDisposition::OpenIf => {
                if exists {
                    NtStatus::SUCCESS
                } else {
                    create_node(&path, wants_dir)
                }
            }
            CreateDisposition::Overwrite => {
                if is_dir {
                    NtStatus::FILE_IS_A_DIRECTORY
                } else if exists {
                    truncate_file(&path)
                } else {
                    NtStatus::ACCESS_DENIED
                }
            }
            CreateDisposition::OverwriteIf => {
                if is_dir {
                    NtStatus::FILE_IS_A_DIRECTORY
                } else {
                    if exists && fs::remove_file(&path).is_err() {
                        return IoReply::error(NtStatus::ACCESS_DENIED);
                    }
                    create_node(&path, wants_dir)
                }
            }
            // Reserved by the protocol; acknowledged without touching the host.
            CreateDisposition::Supersede => NtStatus::SUCCESS,
        };

        if status != NtStatus::SUCCESS {
            debug!(path = %path.display(), disposition = ?req.create_disposition, %status, "create refused");
            return IoReply::error(status);
        }

        let delete_on_close = req.create_options.contains(CreateOptions::FILE_DELETE_ON_CLOSE);

        let file_id = if let Some(existing) = self.file_id_for_path(&path) {
            // Same resolved path keeps its id so the server's handles stay
            // coherent across repeated creates.
            if let Some(open) = self.files.get_mut(&existing) {
                open.access_mask = req.desired_access;
                open.delete_on_close |= delete_on_close;
            }
            existing
        } else {
            let file_id = self.next_file_id;
            self.next_file_id += 1;
            self.files.insert(
                file_id,
                OpenFile {
                    host_path: path,
                    access_mask: req.desired_access,
                    delete_on_close,
                    dir_listing: None,
                    handle: None,
                    handle_writable: false,
                },
            );
            file_id
        };

        IoReply::new(NtStatus::SUCCESS, file_id, vec![0])
    }

    fn close(&mut self, file_id: u32) -> IoReply {
        let Some(open) = self.files.remove(&file_id) else {
            return IoReply::error(NtStatus::NO_SUCH_FILE);
        };

        if !open.host_path.exists() {
            return IoReply::error(NtStatus::NO_SUCH_FILE);
        }

        if open.delete_on_close {
            let deleted = if open.host_path.is_dir() {
                fs::remove_dir(&open.host_path)
            } else {
                fs::remove_file(&open.host_path)
            };
            if deleted.is_err() {
                warn!(path = %open.host_path.display(), "delete on close failed");
                return IoReply::error(NtStatus::ACCESS_DENIED);
            }
        }

        IoReply::new(NtStatus::SUCCESS, 0, vec![0])
    }

    fn read(&mut self, file_id: u32, req: &DeviceReadRequest) -> IoReply {
        let Some(open) = self.files.get_mut(&file_id) else {
            return IoReply::error(NtStatus::CANCELLED);
        };

        let Ok(metadata) = fs::metadata(&open.host_path) else {
            return IoReply::error(NtStatus::CANCELLED);
        };

        let available = metadata.len().saturating_sub(req.offset);
        let to_read = u64::from(req.length).min(available);

        match read_at(open, req.offset, to_read) {
            Ok(data) => {
                let count = u32::try_from(data.len()).unwrap_or(u32::MAX);
                IoReply::new(NtStatus::SUCCESS, count, data)
            }
            Err(error) => {
                warn!(path = %open.host_path.display(), %error, "read failed");
                IoReply::error(NtStatus::CANCELLED)
            }
        }
    }

    fn write(&mut self, file_id: u32, req: &DeviceWriteRequest) -> IoReply {
        let Some(open) = self.files.get_mut(&file_id) else {
            return IoReply::error(NtStatus::INVALID_HANDLE);
        };

        match write_at(open, req.offset, &req.data) {
            Ok(()) => {
                let count = u32::try_from(req.data.len()).unwrap_or(u32::MAX);
                let mut payload = WriteBuf::new();
                payload.write_u32(count);
                IoReply::new(NtStatus::SUCCESS, count, payload.into_inner())
            }
            Err(error) => {
                warn!(path = %open.host_path.display(), %error, "write failed");
                IoReply::error(NtStatus::ACCESS_DENIED)
            }
        }
    }

    fn query_information(&mut self, file_id: u32, class: FileInformationClass) -> IoReply {
        let Some(open) = self.files.get(&file_id) else {
            return IoReply::error(NtStatus::INVALID_HANDLE);
        };

        let Ok(metadata) = fs::metadata(&open.host_path) else {
            return IoReply::error(NtStatus::ACCESS_DENIED);
        };

        let attributes = file_attributes(&metadata, &open.host_path);
        let modified = filetime_from_metadata(&metadata);

        let mut payload = WriteBuf::new();
        match class {
            FileInformationClass::Basic => {
                payload.write_u64(modified); // creationTime
                payload.write_u64(modified); // lastAccessTime
                payload.write_u64(modified); // lastWriteTime
                payload.write_u64(modified); // changeTime
                payload.write_u32(attributes.bits());
            }
            FileInformationClass::Standard => {
                payload.write_u64(metadata.len()); // allocationSize
                payload.write_u64(metadata.len()); // endOfFile
                payload.write_u32(0); // numberOfLinks
                payload.write_u8(u8::from(open.delete_on_close));
                payload.write_u8(u8::from(metadata.is_dir()));
            }
            FileInformationClass::AttributeTag => {
                payload.write_u32(attributes.bits());
                payload.write_u32(0); // reparseTag
            }
            _ => return IoReply::error(NtStatus::INVALID_PARAMETER),
        }

        let payload = payload.into_inner();
        let length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        IoReply::new(NtStatus::SUCCESS, length, payload)
    }

    fn set_information(&mut self, file_id: u32, req: &ServerDriveSetInformationRequest) -> IoReply {
        if !self.files.contains_key(&file_id) {
            return IoReply::error(NtStatus::INVALID_HANDLE);
        }

        match &req.set_buffer {
            SetInformationData::Basic(basic) => {
                // Only the modification time is applied; attribute changes
                // such as the read-only bit are acknowledged but ignored.
                if basic.change_time != 0 {
                    if let (Some(open), Some(time)) =
                        (self.files.get(&file_id), filetime_to_system_time(basic.change_time))
                    {
                        if let Err(error) = set_modified_time(&open.host_path, time) {
                            warn!(path = %open.host_path.display(), %error, "set modification time failed");
                            return IoReply::error(NtStatus::ACCESS_DENIED);
                        }
                    }
                }
            }
            // Size reservations are meaningless for a host-backed file;
            // acknowledged without action.
            SetInformationData::EndOfFile(_) | SetInformationData::Allocation(_) => {}
            SetInformationData::Disposition => {
                if let Some(open) = self.files.get_mut(&file_id) {
                    if open.access_mask & DELETE_INTENT_MASK != 0 {
                        if open.host_path.is_dir() && directory_is_not_empty(&open.host_path) {
                            return IoReply::error(NtStatus::DIRECTORY_NOT_EMPTY);
                        }
                        open.delete_on_close = true;
                    }
                }
            }
            SetInformationData::Rename(rename) => {
                let target = match self.resolve(&rename.path) {
                    Ok(target) => target,
                    Err(status) => return IoReply::error(status),
                };
                if let Some(open) = self.files.get_mut(&file_id) {
                    if !rename.replace_if_exists && target.exists() {
                        return IoReply::error(NtStatus::ACCESS_DENIED);
                    }
                    if let Err(error) = fs::rename(&open.host_path, &target) {
                        warn!(path = %open.host_path.display(), target = %target.display(), %error, "rename failed");
                        return IoReply::error(NtStatus::ACCESS_DENIED);
                    }
                    open.host_path = target;
                    open.handle = None;
                }
            }
        }

        IoReply::new(NtStatus::SUCCESS, req.length, vec![0])
    }

    fn query_directory(&mut self, file_id: u32, req: &ServerDriveQueryDirectoryRequest) -> IoReply {
        let Some(open) = self.files.get_mut(&file_id) else {
            return IoReply::error(NtStatus::INVALID_HANDLE);
        };

        if req.initial_query != 0 {
            let pattern = req
                .path
                .replace('\\', "/")
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_owned();

            let mut entries: Vec<PathBuf> = match fs::read_dir(&open.host_path) {
                Ok(read_dir) => read_dir.filter_map(|entry| entry.ok().map(|e| e.path())).collect(),
                Err(error) => {
                    warn!(path = %open.host_path.display(), %error, "directory listing failed");
                    return IoReply::error(NtStatus::ACCESS_DENIED);
                }
            };
            entries.sort();

            debug!(path = %open.host_path.display(), pattern, count = entries.len(), "directory snapshot taken");
            open.dir_listing = Some(DirListing {
                entries,
                next: 0,
                pattern,
            });
        }

        let Some(listing) = open.dir_listing.as_mut() else {
            return IoReply::error(NtStatus::INVALID_PARAMETER);
        };

        let Some(entry) = listing.entries.get(listing.next) else {
            return IoReply::new(NtStatus::NO_MORE_FILES, 0, vec![0]);
        };
        listing.next += 1;

        let name = entry
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Ok(metadata) = fs::metadata(entry) else {
            return IoReply::error(NtStatus::ACCESS_DENIED);
        };

        match directory_entry_payload(req.file_info_class, &metadata, entry, &name) {
            Some(payload) => {
                let length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
                IoReply::new(NtStatus::SUCCESS, length, payload)
            }
            None => IoReply::error(NtStatus::INVALID_PARAMETER),
        }
    }

    fn query_volume_information(&mut self, file_id: u32, class: FsInformationClass) -> IoReply {
        if !self.files.contains_key(&file_id) {
            return IoReply::error(NtStatus::ACCESS_DENIED);
        }

        let mut payload = WriteBuf::new();
        match class {
            FsInformationClass::Volume => {
                let label_len = u32::try_from(utf16_encoded_len(VOLUME_LABEL, false)).unwrap_or(0);
                payload.write_u64(0); // volumeCreationTime
                payload.write_u32(0); // volumeSerialNumber
                payload.write_u32(label_len);
                payload.write_u8(0); // supportsObjects
                write_utf16_raw(&mut payload, VOLUME_LABEL);
            }
            FsInformationClass::Size => {
                payload.write_u64(TOTAL_ALLOCATION_UNITS);
                payload.write_u64(AVAILABLE_ALLOCATION_UNITS);
                payload.write_u32(SECTORS_PER_ALLOCATION_UNIT);
                payload.write_u32(BYTES_PER_SECTOR);
            }
            FsInformationClass::FullSize => {
                payload.write_u64(TOTAL_ALLOCATION_UNITS);
                payload.write_u64(AVAILABLE_ALLOCATION_UNITS);
                payload.write_u64(FREE_ALLOCATION_UNITS);
                payload.write_u32(SECTORS_PER_ALLOCATION_UNIT);
                payload.write_u32(BYTES_PER_SECTOR);
            }
            FsInformationClass::Attribute => {
                let name_len = u32::try_from(utf16_encoded_len(FILE_SYSTEM_NAME, false)).unwrap_or(0);
                let attributes = FileSystemAttributes::FILE_CASE_SENSITIVE_SEARCH
                    | FileSystemAttributes::FILE_CASE_PRESERVED_NAMES;
                payload.write_u32(attributes.bits());
                payload.write_u32(0xFF); // maximumComponentNameLength
                payload.write_u32(name_len);
                write_utf16_raw(&mut payload, FILE_SYSTEM_NAME);
            }
        }

        let payload = payload.into_inner();
        let length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        IoReply::new(NtStatus::SUCCESS, length, payload)
    }

    fn notify_change_directory(&mut self, _file_id: u32) -> IoReply {
        // Change notification is not implemented; a pending reply parks the
        // server's watch without ever completing it.
        IoReply::pending()
    }
}

fn create_node(path: &Path, directory: bool) -> NtStatus {
    let created = if directory {
        fs::create_dir(path)
    } else {
        File::create(path).map(drop)
    };

    match created {
        Ok(()) => NtStatus::SUCCESS,
        Err(error) => {
            warn!(path = %path.display(), %error, "create failed");
            NtStatus::ACCESS_DENIED
        }
    }
}

fn truncate_file(path: &Path) -> NtStatus {
    match OpenOptions::new().write(true).truncate(true).open(path) {
        Ok(_) => NtStatus::SUCCESS,
        Err(error) => {
            warn!(path = %path.display(), %error, "truncate failed");
            NtStatus::ACCESS_DENIED
        }
    }
}

fn read_at(open: &mut OpenFile, offset: u64, length: u64) -> std::io::Result<Vec<u8>> {
    if open.handle.is_none() {
        open.handle = Some(OpenOptions::new().read(true).open(&open.host_path)?);
        open.handle_writable = false;
    }
    let handle = open.handle.as_mut().ok_or_else(|| std::io::Error::other("no handle"))?;

    handle.seek(SeekFrom::Start(offset))?;
    let mut data = vec![0u8; usize::try_from(length).unwrap_or(usize::MAX)];
    handle.read_exact(&mut data)?;
    Ok(data)
}

fn write_at(open: &mut OpenFile, offset: u64, data: &[u8]) -> std::io::Result<()> {
    if open.handle.is_none() || !open.handle_writable {
        open.handle = Some(OpenOptions::new().read(true).write(true).open(&open.host_path)?);
        open.handle_writable = true;
    }
    let handle = open.handle.as_mut().ok_or_else(|| std::io::Error::other("no handle"))?;

    handle.seek(SeekFrom::Start(offset))?;
    handle.write_all(data)?;
    Ok(())
}

fn set_modified_time(path: &Path, time: SystemTime) -> std::io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(time)
}

fn directory_is_not_empty(path: &Path) -> bool {
    fs::read_dir(path).map(|mut entries| entries.next().is_some()).unwrap_or(false)
}

/// Attributes as reported to the server; dotfiles are presented as hidden.
fn file_attributes(metadata: &Metadata, path: &Path) -> FileAttributes {
    let mut attributes = FileAttributes::empty();

    if metadata.is_dir() {
        attributes |= FileAttributes::FILE_ATTRIBUTE_DIRECTORY;
    }
    if metadata.permissions().readonly() {
        attributes |= FileAttributes::FILE_ATTRIBUTE_READONLY;
    }
    let hidden = path
        .file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false);
    if hidden {
        attributes |= FileAttributes::FILE_ATTRIBUTE_HIDDEN;
    }

    if attributes.is_empty() {
        FileAttributes::FILE_ATTRIBUTE_NORMAL
    } else {
        attributes
    }
}

fn directory_entry_payload(
    class: FileInformationClass,
    metadata: &Metadata,
    path: &Path,
    name: &str,
) -> Option<Vec<u8>> {
    let attributes = file_attributes(metadata, path);
    let modified = filetime_from_metadata(metadata);
    let name_len = u32::try_from(utf16_encoded_len(name, true)).unwrap_or(0);

    let mut payload = WriteBuf::new();
    payload.write_u32(0); // nextEntryOffset, single-entry responses only
    payload.write_u32(0); // fileIndex

    match class {
        FileInformationClass::BothDirectory => {
            write_entry_times_and_sizes(&mut payload, modified, metadata, attributes);
            payload.write_u32(name_len);
            payload.write_u32(0); // eaSize
            payload.write_u8(0); // shortNameLength
            payload.write_slice(&[0u8; 24]); // shortName
            write_utf16_terminated(&mut payload, name);
        }
        FileInformationClass::Directory => {
            write_entry_times_and_sizes(&mut payload, modified, metadata, attributes);
            payload.write_u32(name_len);
            write_utf16_terminated(&mut payload, name);
        }
        FileInformationClass::FullDirectory => {
            write_entry_times_and_sizes(&mut payload, modified, metadata, attributes);
            payload.write_u32(name_len);
            payload.write_u32(0); // eaSize
            write_utf16_terminated(&mut payload, name);
        }
        FileInformationClass::Names => {
            payload.write_u32(name_len);
            write_utf16_terminated(&mut payload, name);
        }
        _ => return None,
    }

    Some(payload.into_inner())
}

fn write_entry_times_and_sizes(payload: &mut WriteBuf, modified: u64, metadata: &Metadata, attributes: FileAttributes) {
    payload.write_u64(modified); // creationTime
    payload.write_u64(modified); // lastAccessTime
    payload.write_u64(modified); // lastWriteTime
    payload.write_u64(modified); // changeTime
    payload.write_u64(metadata.len()); // endOfFile
    payload.write_u64(metadata.len()); // allocationSize
    payload.write_u32(attributes.bits());
}

fn write_utf16_raw(payload: &mut WriteBuf, value: &str) {
    for unit in value.encode_utf16() {
        payload.write_u16(unit);
    }
}

fn write_utf16_terminated(payload: &mut WriteBuf, value: &str) {
    write_utf16_raw(payload, value);
    payload.write_u16(0);
}

fn filetime_from_metadata(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .map(system_time_to_filetime)
        .unwrap_or(0)
}

/// Converts a host timestamp into a FILETIME: 100-nanosecond intervals
/// since 1601-01-01.
fn system_time_to_filetime(time: SystemTime) -> u64 {
    let unix_millis = time
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(0))
        .unwrap_or(0);
    (unix_millis + FILETIME_EPOCH_DELTA_MILLIS) * 10_000
}

fn filetime_to_system_time(filetime: u64) -> Option<SystemTime> {
    let unix_millis = (filetime / 10_000).checked_sub(FILETIME_EPOCH_DELTA_MILLIS)?;
    Some(UNIX_EPOCH + Duration::from_millis(unix_millis))
}
