use std::fs;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use cloudrdp_core::encode_vec;
use cloudrdp_rdpdr::pdu::efs::{
    CreateDisposition, CreateOptions, DeviceCreateRequest, DeviceIoResponse, DeviceReadRequest, DeviceWriteRequest,
    FileAttributes, FileBasicInformation, FileInformationClass, FsInformationClass, MajorFunction, MinorFunction,
    NtStatus, RenameInformation, ServerDriveQueryDirectoryRequest, ServerDriveQueryInformationRequest,
    ServerDriveQueryVolumeInformationRequest, ServerDriveSetInformationRequest, SetInformationData,
};
use cloudrdp_rdpdr::Rdpdr;
use tempfile::TempDir;

use super::{io_request, process, run_handshake, single_completion};

/// Access mask bits announcing an intent to delete.
const DELETE_ACCESS: u32 = 0x0000_1100;

fn drive(root: &Path) -> Rdpdr {
    let mut channel = Rdpdr::default().with_drive("share", root);
    run_handshake(&mut channel);
    channel
}

fn create(
    channel: &mut Rdpdr,
    path: &str,
    disposition: CreateDisposition,
    options: CreateOptions,
    desired_access: u32,
) -> DeviceIoResponse {
    let request = DeviceCreateRequest {
        desired_access,
        allocation_size: 0,
        file_attributes: FileAttributes::empty(),
        shared_access: 0,
        create_disposition: disposition,
        create_options: options,
        path: path.to_owned(),
    };
    let payload = encode_vec(&request).expect("encode create request");
    single_completion(process(
        channel,
        &io_request(0, 0, 1, MajorFunction::Create, MinorFunction::None, &payload),
    ))
}

fn open_file(channel: &mut Rdpdr, path: &str) -> u32 {
    let completion = create(channel, path, CreateDisposition::Open, CreateOptions::empty(), 0);
    assert_eq!(completion.io_status, NtStatus::SUCCESS, "open {path}");
    completion.result
}

fn write(channel: &mut Rdpdr, file_id: u32, offset: u64, data: &[u8]) -> DeviceIoResponse {
    let request = DeviceWriteRequest {
        offset,
        data: data.to_vec(),
    };
    let payload = encode_vec(&request).expect("encode write request");
    single_completion(process(
        channel,
        &io_request(0, file_id, 2, MajorFunction::Write, MinorFunction::None, &payload),
    ))
}

fn read(channel: &mut Rdpdr, file_id: u32, offset: u64, length: u32) -> DeviceIoResponse {
    let request = DeviceReadRequest { length, offset };
    let payload = encode_vec(&request).expect("encode read request");
    single_completion(process(
        channel,
        &io_request(0, file_id, 3, MajorFunction::Read, MinorFunction::None, &payload),
    ))
}

fn close(channel: &mut Rdpdr, file_id: u32) -> DeviceIoResponse {
    single_completion(process(
        channel,
        &io_request(0, file_id, 4, MajorFunction::Close, MinorFunction::None, &[]),
    ))
}

fn query_information(channel: &mut Rdpdr, file_id: u32, class: FileInformationClass) -> DeviceIoResponse {
    let request = ServerDriveQueryInformationRequest { file_info_class: class };
    let payload = encode_vec(&request).expect("encode query information request");
    single_completion(process(
        channel,
        &io_request(0, file_id, 5, MajorFunction::QueryInformation, MinorFunction::None, &payload),
    ))
}

fn set_information(channel: &mut Rdpdr, file_id: u32, request: &ServerDriveSetInformationRequest) -> DeviceIoResponse {
    let payload = encode_vec(request).expect("encode set information request");
    single_completion(process(
        channel,
        &io_request(0, file_id, 6, MajorFunction::SetInformation, MinorFunction::None, &payload),
    ))
}

fn query_directory(channel: &mut Rdpdr, file_id: u32, initial_query: u8, path: &str) -> DeviceIoResponse {
    let request = ServerDriveQueryDirectoryRequest {
        file_info_class: FileInformationClass::BothDirectory,
        initial_query,
        path: path.to_owned(),
    };
    let payload = encode_vec(&request).expect("encode query directory request");
    single_completion(process(
        channel,
        &io_request(
            0,
            file_id,
            7,
            MajorFunction::DirectoryControl,
            MinorFunction::QueryDirectory,
            &payload,
        ),
    ))
}

fn query_volume(channel: &mut Rdpdr, file_id: u32, class: FsInformationClass) -> DeviceIoResponse {
    let request = ServerDriveQueryVolumeInformationRequest { fs_info_class: class };
    let payload = encode_vec(&request).expect("encode query volume request");
    single_completion(process(
        channel,
        &io_request(
            0,
            file_id,
            8,
            MajorFunction::QueryVolumeInformation,
            MinorFunction::None,
            &payload,
        ),
    ))
}

#[test]
fn open_missing_file_is_no_such_file() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let completion = create(
        &mut channel,
        "\\missing.txt",
        CreateDisposition::Open,
        CreateOptions::empty(),
        0,
    );

    assert_eq!(completion.io_status, NtStatus::NO_SUCH_FILE);
    assert_eq!(completion.result, 0, "no file id on failure");
}

#[test]
fn create_makes_the_file_and_hands_out_ids_from_one() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let completion = create(
        &mut channel,
        "\\fresh.txt",
        CreateDisposition::Create,
        CreateOptions::empty(),
        0,
    );

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert_eq!(completion.result, 1);
    assert!(root.path().join("fresh.txt").is_file());
}

#[test]
fn create_on_existing_file_is_denied() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("taken.txt"), b"x").unwrap();
    let mut channel = drive(root.path());

    let completion = create(
        &mut channel,
        "\\taken.txt",
        CreateDisposition::Create,
        CreateOptions::empty(),
        0,
    );

    assert_eq!(completion.io_status, NtStatus::ACCESS_DENIED);
}

#[test]
fn open_if_creates_when_missing() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let completion = create(
        &mut channel,
        "\\appears.txt",
        CreateDisposition::OpenIf,
        CreateOptions::empty(),
        0,
    );

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert!(root.path().join("appears.txt").is_file());
}

#[test]
fn overwrite_of_a_directory_is_refused() {
    let root = TempDir::new().unwrap();
    fs::create_dir(root.path().join("sub")).unwrap();
    let mut channel = drive(root.path());

    let completion = create(&mut channel, "\\sub", CreateDisposition::Overwrite, CreateOptions::empty(), 0);
    assert_eq!(completion.io_status, NtStatus::FILE_IS_A_DIRECTORY);

    let completion = create(
        &mut channel,
        "\\nothing.txt",
        CreateDisposition::Overwrite,
        CreateOptions::empty(),
        0,
    );
    assert_eq!(completion.io_status, NtStatus::ACCESS_DENIED, "overwrite needs an existing file");
}

#[test]
fn overwrite_if_truncates_existing_content() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("big.txt"), b"previous content").unwrap();
    let mut channel = drive(root.path());

    let completion = create(
        &mut channel,
        "\\big.txt",
        CreateDisposition::OverwriteIf,
        CreateOptions::empty(),
        0,
    );

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert_eq!(fs::metadata(root.path().join("big.txt")).unwrap().len(), 0);
}

#[test]
fn overwrite_if_creates_a_directory_when_asked() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let completion = create(
        &mut channel,
        "\\newdir",
        CreateDisposition::OverwriteIf,
        CreateOptions::FILE_DIRECTORY_FILE,
        0,
    );

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert!(root.path().join("newdir").is_dir());
}

#[test]
fn same_path_reuses_the_file_id() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("stable.txt"), b"x").unwrap();
    let mut channel = drive(root.path());

    let first = open_file(&mut channel, "\\stable.txt");
    let second = open_file(&mut channel, "\\stable.txt");
    assert_eq!(first, second);

    let other = create(
        &mut channel,
        "\\other.txt",
        CreateDisposition::Create,
        CreateOptions::empty(),
        0,
    );
    assert!(other.result > first, "new paths get fresh ids");
}

#[test]
fn directory_create_makes_a_directory() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let completion = create(
        &mut channel,
        "\\newdir",
        CreateDisposition::Create,
        CreateOptions::FILE_DIRECTORY_FILE,
        0,
    );

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert!(root.path().join("newdir").is_dir());
}

#[test]
fn path_traversal_is_denied_before_touching_the_host() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let completion = create(
        &mut channel,
        "\\..\\escape.txt",
        CreateDisposition::Create,
        CreateOptions::empty(),
        0,
    );

    assert_eq!(completion.io_status, NtStatus::ACCESS_DENIED);
    assert!(!root.path().parent().unwrap().join("escape.txt").exists());
}

#[test]
fn write_then_read_round_trips_through_the_host() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let file_id = create(
        &mut channel,
        "\\data.bin",
        CreateDisposition::Create,
        CreateOptions::empty(),
        0,
    )
    .result;

    let data = b"hello redirected world";
    let completion = write(&mut channel, file_id, 0, data);
    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert_eq!(completion.result, data.len() as u32);
    assert_eq!(completion.payload, (data.len() as u32).to_le_bytes());

    let completion = read(&mut channel, file_id, 0, 1024);
    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert_eq!(completion.result, data.len() as u32);
    assert_eq!(completion.payload, data);
}

#[test]
fn read_is_clamped_to_end_of_file() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("clamp.txt"), b"hello").unwrap();
    let mut channel = drive(root.path());
    let file_id = open_file(&mut channel, "\\clamp.txt");

    let completion = read(&mut channel, file_id, 2, 1024);

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert_eq!(completion.payload, b"llo");
    assert_eq!(completion.result, 3);
}

#[test]
fn io_on_unknown_handles_is_flagged() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    assert_eq!(read(&mut channel, 99, 0, 16).io_status, NtStatus::CANCELLED);
    assert_eq!(write(&mut channel, 99, 0, b"x").io_status, NtStatus::INVALID_HANDLE);
    assert_eq!(close(&mut channel, 99).io_status, NtStatus::NO_SUCH_FILE);
}

#[test]
fn close_releases_the_handle() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("once.txt"), b"x").unwrap();
    let mut channel = drive(root.path());
    let file_id = open_file(&mut channel, "\\once.txt");

    assert_eq!(close(&mut channel, file_id).io_status, NtStatus::SUCCESS);
    assert_eq!(close(&mut channel, file_id).io_status, NtStatus::NO_SUCH_FILE);
}

#[test]
fn delete_on_close_removes_the_file() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let file_id = create(
        &mut channel,
        "\\ephemeral.txt",
        CreateDisposition::Create,
        CreateOptions::FILE_DELETE_ON_CLOSE,
        0,
    )
    .result;
    assert!(root.path().join("ephemeral.txt").is_file());

    assert_eq!(close(&mut channel, file_id).io_status, NtStatus::SUCCESS);
    assert!(!root.path().join("ephemeral.txt").exists());
}

#[test]
fn disposition_marks_delete_and_close_removes() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("doomed.txt"), b"x").unwrap();
    let mut channel = drive(root.path());

    let file_id = create(
        &mut channel,
        "\\doomed.txt",
        CreateDisposition::Open,
        CreateOptions::empty(),
        DELETE_ACCESS,
    )
    .result;

    let request = ServerDriveSetInformationRequest {
        file_info_class: FileInformationClass::Disposition,
        length: 0,
        set_buffer: SetInformationData::Disposition,
    };
    assert_eq!(set_information(&mut channel, file_id, &request).io_status, NtStatus::SUCCESS);

    assert_eq!(close(&mut channel, file_id).io_status, NtStatus::SUCCESS);
    assert!(!root.path().join("doomed.txt").exists());
}

#[test]
fn deleting_a_non_empty_directory_is_refused() {
    let root = TempDir::new().unwrap();
    fs::create_dir(root.path().join("full")).unwrap();
    fs::write(root.path().join("full/inner.txt"), b"x").unwrap();
    let mut channel = drive(root.path());

    let file_id = create(
        &mut channel,
        "\\full",
        CreateDisposition::Open,
        CreateOptions::FILE_DIRECTORY_FILE,
        DELETE_ACCESS,
    )
    .result;

    let request = ServerDriveSetInformationRequest {
        file_info_class: FileInformationClass::Disposition,
        length: 0,
        set_buffer: SetInformationData::Disposition,
    };
    let completion = set_information(&mut channel, file_id, &request);

    assert_eq!(completion.io_status, NtStatus::DIRECTORY_NOT_EMPTY);
}

#[test]
fn rename_moves_the_file_on_the_host() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("old.txt"), b"payload").unwrap();
    let mut channel = drive(root.path());
    let file_id = open_file(&mut channel, "\\old.txt");

    let request = ServerDriveSetInformationRequest {
        file_info_class: FileInformationClass::Rename,
        length: 0,
        set_buffer: SetInformationData::Rename(RenameInformation {
            replace_if_exists: false,
            path: "\\new.txt".to_owned(),
        }),
    };
    let completion = set_information(&mut channel, file_id, &request);

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert!(!root.path().join("old.txt").exists());
    assert_eq!(fs::read(root.path().join("new.txt")).unwrap(), b"payload");
}

#[test]
fn rename_without_replace_keeps_an_existing_target() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("a.txt"), b"a").unwrap();
    fs::write(root.path().join("b.txt"), b"b").unwrap();
    let mut channel = drive(root.path());
    let file_id = open_file(&mut channel, "\\a.txt");

    let request = ServerDriveSetInformationRequest {
        file_info_class: FileInformationClass::Rename,
        length: 0,
        set_buffer: SetInformationData::Rename(RenameInformation {
            replace_if_exists: false,
            path: "\\b.txt".to_owned(),
        }),
    };
    let completion = set_information(&mut channel, file_id, &request);

    assert_eq!(completion.io_status, NtStatus::ACCESS_DENIED);
    assert_eq!(fs::read(root.path().join("b.txt")).unwrap(), b"b");
}

#[test]
fn basic_set_information_applies_the_change_time() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("stamped.txt"), b"x").unwrap();
    let mut channel = drive(root.path());
    let file_id = open_file(&mut channel, "\\stamped.txt");

    let unix_millis: u64 = 1_600_000_000_000;
    let change_time = (unix_millis + 11_644_473_600_000) * 10_000;
    let request = ServerDriveSetInformationRequest {
        file_info_class: FileInformationClass::Basic,
        length: 36,
        set_buffer: SetInformationData::Basic(FileBasicInformation {
            creation_time: 0,
            last_access_time: 0,
            last_write_time: 0,
            change_time,
            file_attributes: FileAttributes::empty(),
        }),
    };
    assert_eq!(set_information(&mut channel, file_id, &request).io_status, NtStatus::SUCCESS);

    let modified = fs::metadata(root.path().join("stamped.txt"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(modified, UNIX_EPOCH + Duration::from_millis(unix_millis));
}

#[test]
fn standard_information_reports_size_and_kind() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("sized.txt"), b"123456789").unwrap();
    let mut channel = drive(root.path());
    let file_id = open_file(&mut channel, "\\sized.txt");

    let completion = query_information(&mut channel, file_id, FileInformationClass::Standard);

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert_eq!(completion.payload.len(), 22);
    assert_eq!(completion.result, 22);
    let end_of_file = u64::from_le_bytes(completion.payload[8..16].try_into().unwrap());
    assert_eq!(end_of_file, 9);
    assert_eq!(completion.payload[21], 0, "not a directory");
}

#[test]
fn basic_information_marks_directories() {
    let root = TempDir::new().unwrap();
    fs::create_dir(root.path().join("sub")).unwrap();
    let mut channel = drive(root.path());
    let file_id = open_file(&mut channel, "\\sub");

    let completion = query_information(&mut channel, file_id, FileInformationClass::Basic);

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert_eq!(completion.payload.len(), 36);
    let attributes = u32::from_le_bytes(completion.payload[32..36].try_into().unwrap());
    assert_ne!(attributes & 0x10, 0, "directory attribute set");
}

#[test]
fn directory_enumeration_yields_every_entry_then_terminates() {
    let root = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(root.path().join(name), b"x").unwrap();
    }
    let mut channel = drive(root.path());
    let dir_id = open_file(&mut channel, "");

    let mut names = Vec::new();
    let mut completion = query_directory(&mut channel, dir_id, 1, "\\*");
    while completion.io_status == NtStatus::SUCCESS {
        assert_eq!(completion.result as usize, completion.payload.len());
        // UTF-16 file name at the tail: name length is at offset 60.
        let name_len = u32::from_le_bytes(completion.payload[60..64].try_into().unwrap()) as usize;
        let name_bytes = &completion.payload[93..93 + name_len - 2];
        let units: Vec<u16> = name_bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        names.push(String::from_utf16(&units).unwrap());
        completion = query_directory(&mut channel, dir_id, 0, "");
    }

    assert_eq!(completion.io_status, NtStatus::NO_MORE_FILES);
    assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);
}

#[test]
fn volume_queries_describe_the_virtual_volume() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());
    let file_id = open_file(&mut channel, "");

    let completion = query_volume(&mut channel, file_id, FsInformationClass::Volume);
    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert_eq!(completion.result as usize, completion.payload.len());
    let label: Vec<u8> = "CLOUDSOFT".encode_utf16().flat_map(u16::to_le_bytes).collect();
    assert!(completion.payload.ends_with(&label));

    let completion = query_volume(&mut channel, file_id, FsInformationClass::Size);
    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert_eq!(completion.payload.len(), 24);
    let bytes_per_sector = u32::from_le_bytes(completion.payload[20..24].try_into().unwrap());
    assert_eq!(bytes_per_sector, 0x200);

    let completion = query_volume(&mut channel, 99, FsInformationClass::Volume);
    assert_eq!(completion.io_status, NtStatus::ACCESS_DENIED, "unknown handle");
}

#[test]
fn notify_change_directory_produces_no_completion() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());
    let dir_id = open_file(&mut channel, "");

    let replies = process(
        &mut channel,
        &io_request(
            0,
            dir_id,
            9,
            MajorFunction::DirectoryControl,
            MinorFunction::NotifyChangeDirectory,
            &[],
        ),
    );

    assert!(replies.is_empty(), "pending replies are suppressed");
}

#[test]
fn unknown_directory_control_minor_is_invalid_parameter() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());
    let dir_id = open_file(&mut channel, "");

    let completion = single_completion(process(
        &mut channel,
        &io_request(
            0,
            dir_id,
            10,
            MajorFunction::DirectoryControl,
            MinorFunction::Other(0x2F),
            &[],
        ),
    ));

    assert_eq!(completion.io_status, NtStatus::INVALID_PARAMETER);
}

#[test]
fn device_control_is_not_supported() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let completion = single_completion(process(
        &mut channel,
        &io_request(0, 0, 11, MajorFunction::DeviceControl, MinorFunction::None, &[]),
    ));

    assert_eq!(completion.io_status, NtStatus::NOT_SUPPORTED);
}

#[test]
fn lock_control_succeeds_quietly() {
    let root = TempDir::new().unwrap();
    let mut channel = drive(root.path());

    let completion = single_completion(process(
        &mut channel,
        &io_request(0, 0, 12, MajorFunction::LockControl, MinorFunction::None, &[]),
    ));

    assert_eq!(completion.io_status, NtStatus::SUCCESS);
    assert!(completion.payload.is_empty());
}
