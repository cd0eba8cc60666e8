use cloudrdp_core::{decode, ReadCursor};
use cloudrdp_rdpdr::pdu::efs::{
    ClientDeviceListAnnounce, ClientNameRequest, CoreCapability, DeviceAnnounceHeader, DeviceCreateRequest,
    DeviceIoRequest, DeviceIoResponse, DeviceType, MajorFunction, MinorFunction, NtStatus, PreferredDosName,
    ServerDeviceAnnounceResponse, VersionAndIdPdu, VersionAndIdPduKind,
};
use cloudrdp_rdpdr::pdu::RdpdrPdu;
use cloudrdp_testsuite::encode_decode_test;

const SERVER_ANNOUNCE_BYTES: [u8; 12] = [
    0x72, 0x44, // component
    0x6E, 0x49, // packet id
    0x01, 0x00, // versionMajor
    0x0C, 0x00, // versionMinor
    0x07, 0x00, 0x00, 0x00, // clientId
];

const CLIENT_NAME_BYTES: [u8; 36] = [
    0x72, 0x44, // component
    0x4E, 0x43, // packet id
    0x01, 0x00, 0x00, 0x00, // unicodeFlag
    0x00, 0x00, 0x00, 0x00, // codePage
    0x14, 0x00, 0x00, 0x00, // computerNameLen
    0x43, 0x00, 0x4C, 0x00, 0x4F, 0x00, 0x55, 0x00, 0x44, 0x00, // "CLOUD"
    0x53, 0x00, 0x4F, 0x00, 0x46, 0x00, 0x54, 0x00, // "SOFT"
    0x00, 0x00, // terminator
];

const CLIENT_CAPABILITY_BYTES: [u8; 84] = [
    0x72, 0x44, // component
    0x50, 0x43, // packet id
    0x05, 0x00, // numCapabilities
    0x00, 0x00, // padding
    // general capability set, version 2
    0x01, 0x00, 0x2C, 0x00, 0x02, 0x00, 0x00, 0x00, // header
    0x00, 0x00, 0x00, 0x00, // osType
    0x00, 0x00, 0x00, 0x00, // osVersion
    0x01, 0x00, // protocolMajorVersion
    0x0C, 0x00, // protocolMinorVersion
    0xFF, 0xFF, 0x00, 0x00, // ioCode1
    0x00, 0x00, 0x00, 0x00, // ioCode2
    0x07, 0x00, 0x00, 0x00, // extendedPdu
    0x01, 0x00, 0x00, 0x00, // extraFlags1
    0x00, 0x00, 0x00, 0x00, // extraFlags2
    0x00, 0x00, 0x00, 0x00, // specialTypeDeviceCap
    // empty printer, port, drive and smartcard sets, version 1
    0x02, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00, // printer
    0x03, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00, // port
    0x04, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00, // drive
    0x05, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00, // smartcard
];

const DEVICE_LIST_ANNOUNCE_BYTES: [u8; 28] = [
    0x72, 0x44, // component
    0x41, 0x44, // packet id
    0x01, 0x00, 0x00, 0x00, // deviceCount
    0x08, 0x00, 0x00, 0x00, // deviceType
    0x00, 0x00, 0x00, 0x00, // deviceId
    0x73, 0x68, 0x61, 0x72, 0x65, 0x20, 0x20, 0x20, // "share   "
    0x00, 0x00, 0x00, 0x00, // deviceDataLength
];

const DEVICE_REPLY_BYTES: [u8; 12] = [
    0x72, 0x44, // component
    0x72, 0x64, // packet id
    0x01, 0x00, 0x00, 0x00, // deviceId
    0x00, 0x00, 0x00, 0x00, // resultCode
];

const IO_REQUEST_BYTES: [u8; 24] = [
    0x72, 0x44, // component
    0x52, 0x49, // packet id
    0x00, 0x00, 0x00, 0x00, // deviceId
    0x01, 0x00, 0x00, 0x00, // fileId
    0x02, 0x00, 0x00, 0x00, // completionId
    0x0C, 0x00, 0x00, 0x00, // majorFunction
    0x01, 0x00, 0x00, 0x00, // minorFunction
];

const IO_COMPLETION_BYTES: [u8; 21] = [
    0x72, 0x44, // component
    0x43, 0x49, // packet id
    0x00, 0x00, 0x00, 0x00, // deviceId
    0x03, 0x00, 0x00, 0x00, // completionId
    0x00, 0x00, 0x00, 0x00, // ioStatus
    0x02, 0x00, 0x00, 0x00, // result
    0x00, // payload
];

encode_decode_test! {
    server_announce: RdpdrPdu::VersionAndIdPdu(VersionAndIdPdu {
        version_major: 1,
        version_minor: 0x000C,
        client_id: 7,
        kind: VersionAndIdPduKind::ServerAnnounceRequest,
    }), SERVER_ANNOUNCE_BYTES;

    client_name: RdpdrPdu::ClientNameRequest(ClientNameRequest::new("CLOUDSOFT".to_owned())), CLIENT_NAME_BYTES;

    client_capability: RdpdrPdu::CoreCapability(CoreCapability::new_response(0x000C)), CLIENT_CAPABILITY_BYTES;

    device_list_announce: RdpdrPdu::ClientDeviceListAnnounce(ClientDeviceListAnnounce {
        device_list: vec![DeviceAnnounceHeader {
            device_type: DeviceType::Filesystem,
            device_id: 0,
            preferred_dos_name: PreferredDosName::new("share"),
            device_data: Vec::new(),
        }],
    }), DEVICE_LIST_ANNOUNCE_BYTES;

    device_reply: RdpdrPdu::ServerDeviceAnnounceResponse(ServerDeviceAnnounceResponse {
        device_id: 1,
        result_code: NtStatus::SUCCESS,
    }), DEVICE_REPLY_BYTES;

    io_request: RdpdrPdu::DeviceIoRequest(DeviceIoRequest {
        device_id: 0,
        file_id: 1,
        completion_id: 2,
        major_function: MajorFunction::DirectoryControl,
        minor_function: MinorFunction::QueryDirectory,
    }), IO_REQUEST_BYTES;

    io_completion: RdpdrPdu::DeviceIoResponse(DeviceIoResponse {
        device_id: 0,
        completion_id: 3,
        io_status: NtStatus::SUCCESS,
        result: 2,
        payload: vec![0],
    }), IO_COMPLETION_BYTES;

    user_logged_on: RdpdrPdu::UserLoggedOn, [0x72, 0x44, 0x4C, 0x55];
}

#[test]
fn minor_function_is_meaningless_outside_directory_control() {
    let mut bytes = IO_REQUEST_BYTES;
    bytes[16] = 0x00; // majorFunction = Create
    bytes[20] = 0x05; // leftover garbage in minorFunction

    let decoded: RdpdrPdu = decode(&bytes).unwrap();
    let RdpdrPdu::DeviceIoRequest(irp) = decoded else {
        panic!("expected an I/O request, got {decoded:?}");
    };
    assert_eq!(irp.major_function, MajorFunction::Create);
    assert_eq!(irp.minor_function, MinorFunction::None);
}

#[test]
fn create_request_desired_access_is_big_endian() {
    let request = DeviceCreateRequest {
        desired_access: 0x0012_0089,
        allocation_size: 0,
        file_attributes: cloudrdp_rdpdr::pdu::efs::FileAttributes::empty(),
        shared_access: 0,
        create_disposition: cloudrdp_rdpdr::pdu::efs::CreateDisposition::Open,
        create_options: cloudrdp_rdpdr::pdu::efs::CreateOptions::empty(),
        path: "a".to_owned(),
    };

    let encoded = cloudrdp_core::encode_vec(&request).unwrap();
    assert_eq!(&encoded[..4], &[0x00, 0x12, 0x00, 0x89]);

    let mut cursor = ReadCursor::new(&encoded);
    let decoded = DeviceCreateRequest::decode(&mut cursor).unwrap();
    assert_eq!(decoded, request);
}

#[test]
fn create_request_rejects_oversized_path() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[0u8; 4]); // desiredAccess
    bytes.extend_from_slice(&[0u8; 8]); // allocationSize
    bytes.extend_from_slice(&[0u8; 4]); // fileAttributes
    bytes.extend_from_slice(&[0u8; 4]); // sharedAccess
    bytes.extend_from_slice(&1u32.to_le_bytes()); // createDisposition = Open
    bytes.extend_from_slice(&[0u8; 4]); // createOptions
    bytes.extend_from_slice(&512u32.to_le_bytes()); // pathLength: 256 units
    bytes.extend_from_slice(&vec![0u8; 512]);

    let mut cursor = ReadCursor::new(&bytes);
    assert!(DeviceCreateRequest::decode(&mut cursor).is_err());
}

#[test]
fn dos_name_is_squashed_onto_eight_bytes() {
    let name = PreferredDosName::new("my long share");
    assert_eq!(name.as_str(), "my_long_share");

    let header = DeviceAnnounceHeader {
        device_type: DeviceType::Filesystem,
        device_id: 4,
        preferred_dos_name: name,
        device_data: Vec::new(),
    };
    let encoded = cloudrdp_core::encode_vec(&header).unwrap();
    assert_eq!(&encoded[8..16], b"my_long_");
}
