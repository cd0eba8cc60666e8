mod disk;
mod pdu;

use cloudrdp_core::{decode_cursor, encode_vec, ReadCursor, WriteBuf};
use cloudrdp_rdpdr::pdu::efs::{
    CoreCapability, CoreCapabilityKind, DeviceIoRequest, DeviceIoResponse, MajorFunction, MinorFunction,
    VersionAndIdPdu, VersionAndIdPduKind,
};
use cloudrdp_rdpdr::pdu::RdpdrPdu;
use cloudrdp_rdpdr::Rdpdr;
use cloudrdp_svc::SvcProcessor as _;

/// Feeds one channel payload to the processor and decodes everything it
/// queued in response.
pub(crate) fn process(channel: &mut Rdpdr, payload: &[u8]) -> Vec<RdpdrPdu> {
    let mut output = WriteBuf::new();
    channel.process(payload, &mut output).expect("process channel payload");
    decode_all(output.filled())
}

pub(crate) fn decode_all(bytes: &[u8]) -> Vec<RdpdrPdu> {
    let mut cursor = ReadCursor::new(bytes);
    let mut pdus = Vec::new();
    while !cursor.is_empty() {
        pdus.push(decode_cursor::<RdpdrPdu>(&mut cursor).expect("decode queued pdu"));
    }
    pdus
}

pub(crate) fn server_announce(version_minor: u16, client_id: u32) -> Vec<u8> {
    encode_vec(&RdpdrPdu::VersionAndIdPdu(VersionAndIdPdu {
        version_major: 1,
        version_minor,
        client_id,
        kind: VersionAndIdPduKind::ServerAnnounceRequest,
    }))
    .expect("encode server announce")
}

pub(crate) fn server_capability() -> Vec<u8> {
    // The same set layout the client replies with is a valid server request.
    let mut request = CoreCapability::new_response(0x000C);
    request.kind = CoreCapabilityKind::ServerCoreCapabilityRequest;
    encode_vec(&RdpdrPdu::CoreCapability(request)).expect("encode server capability")
}

pub(crate) fn client_id_confirm(version_minor: u16, client_id: u32) -> Vec<u8> {
    encode_vec(&RdpdrPdu::VersionAndIdPdu(VersionAndIdPdu {
        version_major: 1,
        version_minor,
        client_id,
        kind: VersionAndIdPduKind::ServerClientIdConfirm,
    }))
    .expect("encode client id confirm")
}

pub(crate) fn user_logged_on() -> Vec<u8> {
    encode_vec(&RdpdrPdu::UserLoggedOn).expect("encode user logged on")
}

/// Builds a complete I/O request message: shared header, IRP header and the
/// operation-specific payload.
pub(crate) fn io_request(
    device_id: u32,
    file_id: u32,
    completion_id: u32,
    major_function: MajorFunction,
    minor_function: MinorFunction,
    payload: &[u8],
) -> Vec<u8> {
    let mut bytes = encode_vec(&RdpdrPdu::DeviceIoRequest(DeviceIoRequest {
        device_id,
        file_id,
        completion_id,
        major_function,
        minor_function,
    }))
    .expect("encode io request");
    bytes.extend_from_slice(payload);
    bytes
}

/// Runs the whole handshake at protocol minor 12, leaving the channel in
/// steady state with the device list announced.
pub(crate) fn run_handshake(channel: &mut Rdpdr) {
    let replies = process(channel, &server_announce(0x000C, 7));
    assert_eq!(replies.len(), 2, "expected announce reply and client name");

    let replies = process(channel, &server_capability());
    assert_eq!(replies.len(), 1, "expected capability response");

    let replies = process(channel, &client_id_confirm(0x000C, 7));
    assert!(replies.is_empty(), "client id confirm needs no reply at minor 12");

    let replies = process(channel, &user_logged_on());
    assert_eq!(replies.len(), 1, "expected device list announce");
}

pub(crate) fn single_completion(pdus: Vec<RdpdrPdu>) -> DeviceIoResponse {
    match pdus.as_slice() {
        [RdpdrPdu::DeviceIoResponse(response)] => response.clone(),
        other => panic!("expected exactly one completion, got {other:?}"),
    }
}
