//! Redirected device interface and registry.
//!
//! The protocol engine owns a set of devices, announces them to the server,
//! and routes each I/O request to the device named by its device id. A
//! device answers every operation with an [`IoReply`]; it never talks to
//! the wire directly.

use core::fmt;

use crate::pdu::efs::{
    DeviceCreateRequest, DeviceReadRequest, DeviceType, DeviceWriteRequest, FileInformationClass, FsInformationClass,
    NtStatus, ServerDriveQueryDirectoryRequest, ServerDriveSetInformationRequest,
};

pub mod disk;

/// Outcome of one I/O request against a device.
///
/// `result` is the operation's scalar outcome (assigned file id, byte count
/// or structure length); `payload` the structure that follows it on the
/// wire. Replies with [`NtStatus::PENDING`] produce no completion at all.
#[derive(Debug)]
pub struct IoReply {
    pub status: NtStatus,
    pub result: u32,
    pub payload: Vec<u8>,
}

impl IoReply {
    pub fn new(status: NtStatus, result: u32, payload: Vec<u8>) -> Self {
        Self {
            status,
            result,
            payload,
        }
    }

    /// A failure reply: zero result and the one-byte placeholder payload.
    pub fn error(status: NtStatus) -> Self {
        Self::new(status, 0, vec![0])
    }

    /// A reply the engine turns into silence instead of a completion.
    pub fn pending() -> Self {
        Self::new(NtStatus::PENDING, 0, Vec::new())
    }
}

/// A device exposed to the server over the redirection channel.
///
/// Operations a device type does not serve fall back to a
/// [`NtStatus::NOT_SUPPORTED`] reply, which keeps the server-side I/O
/// manager moving rather than hanging on a missing completion.
pub trait RdpdrDevice: fmt::Debug + Send {
    fn device_type(&self) -> DeviceType;

    /// Name announced to the server, shown e.g. as a drive label.
    fn name(&self) -> &str;

    /// Device-specific payload of the announce message; empty for most
    /// device types.
    fn announce_data(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Called once when the device is added to the registry, with the
    /// device id it was assigned.
    fn register(&mut self, device_id: u32);

    fn create(&mut self, req: &DeviceCreateRequest) -> IoReply;

    fn close(&mut self, file_id: u32) -> IoReply;

    fn write(&mut self, file_id: u32, req: &DeviceWriteRequest) -> IoReply;

    fn read(&mut self, _file_id: u32, _req: &DeviceReadRequest) -> IoReply {
        IoReply::error(NtStatus::NOT_SUPPORTED)
    }

    fn query_information(&mut self, _file_id: u32, _class: FileInformationClass) -> IoReply {
        IoReply::error(NtStatus::NOT_SUPPORTED)
    }

    fn set_information(&mut self, _file_id: u32, _req: &ServerDriveSetInformationRequest) -> IoReply {
        IoReply::error(NtStatus::NOT_SUPPORTED)
    }

    fn query_directory(&mut self, _file_id: u32, _req: &ServerDriveQueryDirectoryRequest) -> IoReply {
        IoReply::error(NtStatus::NOT_SUPPORTED)
    }

    fn query_volume_information(&mut self, _file_id: u32, _class: FsInformationClass) -> IoReply {
        IoReply::error(NtStatus::NOT_SUPPORTED)
    }

    fn notify_change_directory(&mut self, _file_id: u32) -> IoReply {
        IoReply::error(NtStatus::NOT_SUPPORTED)
    }
}

cloudrdp_core::assert_obj_safe!(RdpdrDevice);

/// Append-only device registry; a device's id is its index.
#[derive(Debug, Default)]
pub struct Devices(Vec<Box<dyn RdpdrDevice>>);

impl Devices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device, assigning the next id.
    pub fn register(&mut self, mut device: Box<dyn RdpdrDevice>) -> u32 {
        let device_id = u32::try_from(self.0.len()).expect("registry never outgrows u32");
        device.register(device_id);
        self.0.push(device);
        device_id
    }

    pub fn get_mut(&mut self, device_id: u32) -> Option<&mut Box<dyn RdpdrDevice>> {
        self.0.get_mut(usize::try_from(device_id).ok()?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &dyn RdpdrDevice)> {
        (0u32..).zip(self.0.iter().map(|device| device.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

macro_rules! stub_device {
    ($name:ident, $device_type:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            name: String,
        }

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self { name: name.into() }
            }
        }

        impl RdpdrDevice for $name {
            fn device_type(&self) -> DeviceType {
                $device_type
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn register(&mut self, _device_id: u32) {}

            fn create(&mut self, _req: &DeviceCreateRequest) -> IoReply {
                IoReply::error(NtStatus::NOT_SUPPORTED)
            }

            fn close(&mut self, _file_id: u32) -> IoReply {
                IoReply::error(NtStatus::NOT_SUPPORTED)
            }

            fn write(&mut self, _file_id: u32, _req: &DeviceWriteRequest) -> IoReply {
                IoReply::error(NtStatus::NOT_SUPPORTED)
            }
        }
    };
}

stub_device!(
    PrinterDevice,
    DeviceType::Print,
    "Announce-only printer device: visible to the server, serves no I/O."
);
stub_device!(
    SerialDevice,
    DeviceType::Serial,
    "Announce-only serial port device: visible to the server, serves no I/O."
);
stub_device!(
    SmartcardDevice,
    DeviceType::Smartcard,
    "Announce-only smartcard device: visible to the server, serves no I/O."
);
