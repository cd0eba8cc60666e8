#![doc = include_str!("../README.md")]

use cloudrdp_core::{encode_buf, Decode as _, ReadCursor, WriteBuf};
use cloudrdp_svc::{decode_err, encode_err, ChannelName, ChannelResult, SvcProcessor};
use tracing::{debug, warn};

use crate::device::{Devices, IoReply, RdpdrDevice};
use crate::device::disk::DiskDevice;
use crate::pdu::efs::{
    ClientDeviceListAnnounce, ClientNameRequest, CoreCapability, CoreCapabilityKind, DeviceAnnounceHeader,
    DeviceCreateRequest, DeviceIoRequest, DeviceIoResponse, DeviceReadRequest, DeviceWriteRequest, MajorFunction,
    MinorFunction, NtStatus, PreferredDosName, ServerDeviceAnnounceResponse, ServerDriveQueryDirectoryRequest,
    ServerDriveQueryInformationRequest, ServerDriveQueryVolumeInformationRequest, ServerDriveSetInformationRequest,
    VersionAndIdPdu, VersionAndIdPduKind, VERSION_MINOR_12, VERSION_MINOR_5,
};
use crate::pdu::{Component, PacketId, RdpdrPdu, SharedHeader};

pub mod device;
pub mod pdu;

/// Client id announced when the server leaves the assignment to us.
const FALLBACK_CLIENT_ID: u32 = 0x815E_D39D;

/// Computer name sent during the handshake when none is configured.
pub const DEFAULT_COMPUTER_NAME: &str = "CLOUDSOFT";

/// Progress of the channel handshake. I/O requests are served only once
/// the device list has been announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Waiting for the server announce.
    Initialization,
    /// Announce reply and client name sent.
    Announced,
    /// Capability response sent; waiting for the go-ahead to announce
    /// devices.
    CapabilitiesExchanged,
    /// Device list announced; the channel is in steady state.
    DevicesAnnounced,
}

/// The device redirection channel processor.
#[derive(Debug)]
pub struct Rdpdr {
    computer_name: String,
    client_id: u32,
    version_minor: u16,
    phase: HandshakePhase,
    devices: Devices,
}

impl Default for Rdpdr {
    fn default() -> Self {
        Self::new(DEFAULT_COMPUTER_NAME.to_owned())
    }
}

impl Rdpdr {
    pub const NAME: ChannelName = ChannelName::from_static(b"rdpdr\0\0\0");

    pub fn new(computer_name: String) -> Self {
        Self {
            computer_name,
            client_id: 0,
            version_minor: VERSION_MINOR_12,
            phase: HandshakePhase::Initialization,
            devices: Devices::new(),
        }
    }

    /// Adds a disk device exposing `root` on the host under `name`.
    #[must_use]
    pub fn with_drive(mut self, name: &str, root: impl Into<std::path::PathBuf>) -> Self {
        self.devices.register(Box::new(DiskDevice::new(name, root)));
        self
    }

    /// Adds an arbitrary device to be announced to the server.
    pub fn register_device(&mut self, device: Box<dyn RdpdrDevice>) -> u32 {
        self.devices.register(device)
    }

    pub fn handshake_phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn version_minor(&self) -> u16 {
        self.version_minor
    }

    fn handle_server_announce(&mut self, src: &mut ReadCursor<'_>, output: &mut WriteBuf) -> ChannelResult<()> {
        let req =
            VersionAndIdPdu::decode(src, VersionAndIdPduKind::ServerAnnounceRequest).map_err(|e| decode_err!(e))?;
        debug!(?req, "received");

        self.client_id = if req.client_id == 0 {
            FALLBACK_CLIENT_ID
        } else {
            req.client_id
        };
        self.version_minor = self.version_minor.min(req.version_minor);

        let reply = RdpdrPdu::VersionAndIdPdu(VersionAndIdPdu::new_client_announce_reply(
            self.version_minor,
            self.client_id,
        ));
        debug!(%reply, "sending");
        encode_buf(&reply, output).map_err(|e| encode_err!(e))?;

        let name = RdpdrPdu::ClientNameRequest(ClientNameRequest::new(self.computer_name.clone()));
        debug!(%name, "sending");
        encode_buf(&name, output).map_err(|e| encode_err!(e))?;

        self.phase = HandshakePhase::Announced;
        Ok(())
    }

    fn handle_server_capability(&mut self, src: &mut ReadCursor<'_>, output: &mut WriteBuf) -> ChannelResult<()> {
        let req = CoreCapability::decode(src, CoreCapabilityKind::ServerCoreCapabilityRequest)
            .map_err(|e| decode_err!(e))?;
        debug!(capabilities = req.capabilities.len(), "received server capabilities");

        let reply = RdpdrPdu::CoreCapability(CoreCapability::new_response(self.version_minor));
        debug!(%reply, "sending");
        encode_buf(&reply, output).map_err(|e| encode_err!(e))?;

        self.phase = HandshakePhase::CapabilitiesExchanged;
        Ok(())
    }

    fn handle_client_id_confirm(&mut self, src: &mut ReadCursor<'_>, output: &mut WriteBuf) -> ChannelResult<()> {
        let req =
            VersionAndIdPdu::decode(src, VersionAndIdPduKind::ServerClientIdConfirm).map_err(|e| decode_err!(e))?;
        debug!(?req, "received");

        self.client_id = req.client_id;
        self.version_minor = self.version_minor.min(req.version_minor);

        // Servers this old never send the user logged-on notification, so
        // this confirm is the cue to announce devices.
        if self.version_minor == VERSION_MINOR_5 {
            self.announce_devices(output)?;
        }

        Ok(())
    }

    fn announce_devices(&mut self, output: &mut WriteBuf) -> ChannelResult<()> {
        let device_list = self
            .devices
            .iter()
            .map(|(device_id, device)| DeviceAnnounceHeader {
                device_type: device.device_type(),
                device_id,
                preferred_dos_name: PreferredDosName::new(device.name()),
                device_data: device.announce_data(),
            })
            .collect();

        let announce = RdpdrPdu::ClientDeviceListAnnounce(ClientDeviceListAnnounce { device_list });
        debug!(devices = self.devices.len(), "announcing device list");
        encode_buf(&announce, output).map_err(|e| encode_err!(e))?;

        self.phase = HandshakePhase::DevicesAnnounced;
        Ok(())
    }

    fn handle_device_reply(&mut self, src: &mut ReadCursor<'_>) -> ChannelResult<()> {
        let reply = ServerDeviceAnnounceResponse::decode(src).map_err(|e| decode_err!(e))?;
        if reply.result_code.is_success() {
            debug!(device_id = reply.device_id, "device accepted by the server");
        } else {
            warn!(device_id = reply.device_id, status = %reply.result_code, "device refused by the server");
        }
        Ok(())
    }

    fn handle_io_request(&mut self, src: &mut ReadCursor<'_>, output: &mut WriteBuf) -> ChannelResult<()> {
        let irp = DeviceIoRequest::decode(src).map_err(|e| decode_err!(e))?;

        let Some(device) = self.devices.get_mut(irp.device_id) else {
            warn!(device_id = irp.device_id, "I/O request for an unknown device");
            return send_completion(&irp, IoReply::error(NtStatus::INVALID_PARAMETER), output);
        };

        let reply = match irp.major_function {
            MajorFunction::Create => match DeviceCreateRequest::decode(src) {
                Ok(req) => device.create(&req),
                Err(error) => malformed(&irp, &error),
            },
            MajorFunction::Close => device.close(irp.file_id),
            MajorFunction::Read => match DeviceReadRequest::decode(src) {
                Ok(req) => device.read(irp.file_id, &req),
                Err(error) => malformed(&irp, &error),
            },
            MajorFunction::Write => match DeviceWriteRequest::decode(src) {
                Ok(req) => device.write(irp.file_id, &req),
                Err(error) => malformed(&irp, &error),
            },
            MajorFunction::QueryInformation => match ServerDriveQueryInformationRequest::decode(src) {
                Ok(req) => device.query_information(irp.file_id, req.file_info_class),
                Err(error) => malformed(&irp, &error),
            },
            MajorFunction::SetInformation => match ServerDriveSetInformationRequest::decode(src) {
                Ok(req) => device.set_information(irp.file_id, &req),
                Err(error) => malformed(&irp, &error),
            },
            MajorFunction::QueryVolumeInformation => match ServerDriveQueryVolumeInformationRequest::decode(src) {
                Ok(req) => device.query_volume_information(irp.file_id, req.fs_info_class),
                Err(error) => malformed(&irp, &error),
            },
            MajorFunction::DirectoryControl => match irp.minor_function {
                MinorFunction::QueryDirectory => match ServerDriveQueryDirectoryRequest::decode(src) {
                    Ok(req) => device.query_directory(irp.file_id, &req),
                    Err(error) => malformed(&irp, &error),
                },
                MinorFunction::NotifyChangeDirectory => device.notify_change_directory(irp.file_id),
                MinorFunction::None | MinorFunction::Other(_) => {
                    warn!(minor = irp.minor_function.as_u32(), "unknown directory control minor function");
                    IoReply::error(NtStatus::INVALID_PARAMETER)
                }
            },
            MajorFunction::SetVolumeInformation | MajorFunction::DeviceControl => {
                IoReply::error(NtStatus::NOT_SUPPORTED)
            }
            MajorFunction::Other(major) => {
                warn!(major, "unknown major function");
                IoReply::error(NtStatus::NOT_SUPPORTED)
            }
            // Locking is advisory here; pretend it always works.
            MajorFunction::LockControl => IoReply::new(NtStatus::SUCCESS, 0, Vec::new()),
        };

        if reply.status == NtStatus::PENDING {
            debug!(completion_id = irp.completion_id, "request deferred, no completion sent");
            return Ok(());
        }

        send_completion(&irp, reply, output)
    }
}

impl SvcProcessor for Rdpdr {
    fn channel_name(&self) -> ChannelName {
        Self::NAME
    }

    fn process(&mut self, payload: &[u8], output: &mut WriteBuf) -> ChannelResult<()> {
        let mut src = ReadCursor::new(payload);
        let header = SharedHeader::decode(&mut src).map_err(|e| decode_err!(e))?;

        if header.component == Component::RdpdrCtypPrn {
            // Printer redirection is announce-only; the printing component's
            // own messages are acknowledged by silence.
            warn!(packet_id = ?header.packet_id, "ignoring printing component packet");
            return Ok(());
        }

        match (header.packet_id, self.phase) {
            (PacketId::CoreServerAnnounce, HandshakePhase::Initialization) => {
                self.handle_server_announce(&mut src, output)
            }
            (PacketId::CoreServerCapability, HandshakePhase::Announced) => {
                self.handle_server_capability(&mut src, output)
            }
            (PacketId::CoreClientidConfirm, HandshakePhase::CapabilitiesExchanged) => {
                self.handle_client_id_confirm(&mut src, output)
            }
            // Servers re-send the logged-on notification on session re-logon;
            // the device list is (re-)announced every time.
            (
                PacketId::CoreUserLoggedon,
                HandshakePhase::Announced | HandshakePhase::CapabilitiesExchanged | HandshakePhase::DevicesAnnounced,
            ) => self.announce_devices(output),
            (PacketId::CoreDeviceReply, _) => self.handle_device_reply(&mut src),
            (PacketId::CoreDeviceIoRequest, HandshakePhase::DevicesAnnounced) => {
                self.handle_io_request(&mut src, output)
            }
            (PacketId::CoreDeviceIoRequest, phase) => {
                warn!(?phase, "I/O request before the device list was announced, dropping");
                Ok(())
            }
            (packet_id, phase) => {
                warn!(?packet_id, ?phase, "unexpected packet for this phase, dropping");
                Ok(())
            }
        }
    }
}

fn send_completion(irp: &DeviceIoRequest, reply: IoReply, output: &mut WriteBuf) -> ChannelResult<()> {
    debug!(completion_id = irp.completion_id, status = %reply.status, "sending completion");
    let completion = RdpdrPdu::DeviceIoResponse(DeviceIoResponse::new(irp, reply.status, reply.result, reply.payload));
    encode_buf(&completion, output).map_err(|e| encode_err!(e))?;
    Ok(())
}

fn malformed(irp: &DeviceIoRequest, error: &cloudrdp_core::DecodeError) -> IoReply {
    warn!(completion_id = irp.completion_id, %error, "malformed I/O request payload");
    IoReply::error(NtStatus::INVALID_PARAMETER)
}
