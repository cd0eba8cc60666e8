//! File system remoting messages: handshake, capability exchange, device
//! announcement and the I/O request/completion pair.

use core::fmt;

use bitflags::bitflags;
use cloudrdp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, read_padding, read_utf16_from_cursor,
    utf16_encoded_len, write_padding, write_utf16_to_cursor, DecodeError, DecodeResult, Encode, EncodeResult,
    ReadCursor, WriteCursor,
};

/// Discriminates the three messages sharing the version-and-id body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionAndIdPduKind {
    /// DR_CORE_SERVER_ANNOUNCE_REQ
    ServerAnnounceRequest,
    /// DR_CORE_CLIENT_ANNOUNCE_RSP
    ClientAnnounceReply,
    /// DR_CORE_SERVER_CLIENTID_CONFIRM
    ServerClientIdConfirm,
}

impl VersionAndIdPduKind {
    fn name(self) -> &'static str {
        match self {
            Self::ServerAnnounceRequest => "DR_CORE_SERVER_ANNOUNCE_REQ",
            Self::ClientAnnounceReply => "DR_CORE_CLIENT_ANNOUNCE_RSP",
            Self::ServerClientIdConfirm => "DR_CORE_SERVER_CLIENTID_CONFIRM",
        }
    }
}

/// Version negotiation and client id assignment body, shared by the server
/// announce, the client announce reply, and the server client id confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionAndIdPdu {
    pub version_major: u16,
    pub version_minor: u16,
    pub client_id: u32,
    pub kind: VersionAndIdPduKind,
}

impl VersionAndIdPdu {
    const FIXED_PART_SIZE: usize = 2 /* versionMajor */ + 2 /* versionMinor */ + 4 /* clientId */;

    pub fn new_client_announce_reply(version_minor: u16, client_id: u32) -> Self {
        Self {
            version_major: VERSION_MAJOR,
            version_minor,
            client_id,
            kind: VersionAndIdPduKind::ClientAnnounceReply,
        }
    }

    pub fn decode(src: &mut ReadCursor<'_>, kind: VersionAndIdPduKind) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        Ok(Self {
            version_major: src.read_u16(),
            version_minor: src.read_u16(),
            client_id: src.read_u32(),
            kind,
        })
    }
}

impl Encode for VersionAndIdPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.version_major);
        dst.write_u16(self.version_minor);
        dst.write_u32(self.client_id);

        Ok(())
    }

    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

/// Protocol major version; always 1.
pub const VERSION_MAJOR: u16 = 0x0001;

/// Highest protocol minor version this client speaks.
pub const VERSION_MINOR_12: u16 = 0x000C;

/// Protocol minor version at which the server never sends a user logged-on
/// notification, so the device list is announced right after the client id
/// confirm instead.
pub const VERSION_MINOR_5: u16 = 0x0005;

/// DR_CORE_CLIENT_NAME_REQ
///
/// Sent right after the client announce reply to give the server a friendly
/// name for the client machine. Always sent in Unicode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientNameRequest {
    pub computer_name: String,
}

impl ClientNameRequest {
    const NAME: &'static str = "DR_CORE_CLIENT_NAME_REQ";
    const FIXED_PART_SIZE: usize = 4 /* unicodeFlag */ + 4 /* codePage */ + 4 /* computerNameLen */;

    const UNICODE_FLAG: u32 = 0x0000_0001;

    pub fn new(computer_name: String) -> Self {
        Self { computer_name }
    }

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let unicode_flag = src.read_u32();
        if unicode_flag != Self::UNICODE_FLAG {
            return Err(invalid_field_err!("unicodeFlag", "only Unicode client names are supported"));
        }

        let _code_page = src.read_u32();
        let computer_name_len: usize = cast_length!("computerNameLen", src.read_u32())?;
        let computer_name = read_utf16_from_cursor(src, computer_name_len)?;

        Ok(Self { computer_name })
    }
}

impl Encode for ClientNameRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(Self::UNICODE_FLAG);
        dst.write_u32(0); // codePage, must be zero
        dst.write_u32(cast_length!("computerNameLen", utf16_encoded_len(&self.computer_name, true))?);
        write_utf16_to_cursor(dst, &self.computer_name, true)?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + utf16_encoded_len(&self.computer_name, true)
    }
}

/// Discriminates the server capability request from the client response;
/// both carry the same list-of-capability-sets body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreCapabilityKind {
    /// DR_CORE_CAPABILITY_REQ
    ServerCoreCapabilityRequest,
    /// DR_CORE_CAPABILITY_RSP
    ClientCoreCapabilityResponse,
}

/// DR_CORE_CAPABILITY_REQ / DR_CORE_CAPABILITY_RSP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreCapability {
    pub capabilities: Vec<CapabilityMessage>,
    pub kind: CoreCapabilityKind,
}

impl CoreCapability {
    const FIXED_PART_SIZE: usize = 2 /* numCapabilities */ + 2 /* padding */;

    /// Creates the capability response this client always sends: a general
    /// set at version 2 carrying the negotiated minor version, plus empty
    /// printer, port, drive and smartcard sets.
    pub fn new_response(version_minor: u16) -> Self {
        Self {
            capabilities: vec![
                CapabilityMessage::new_general(version_minor),
                CapabilityMessage::new_printer(),
                CapabilityMessage::new_port(),
                CapabilityMessage::new_drive(),
                CapabilityMessage::new_smartcard(),
            ],
            kind: CoreCapabilityKind::ClientCoreCapabilityResponse,
        }
    }

    pub fn decode(src: &mut ReadCursor<'_>, kind: CoreCapabilityKind) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let num_capabilities = src.read_u16();
        let _padding = src.read_u16();

        let mut capabilities = Vec::with_capacity(usize::from(num_capabilities));
        for _ in 0..num_capabilities {
            capabilities.push(CapabilityMessage::decode(src)?);
        }

        Ok(Self { capabilities, kind })
    }
}

impl Encode for CoreCapability {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(cast_length!("numCapabilities", self.capabilities.len())?);
        write_padding!(dst, 2);
        for capability in &self.capabilities {
            capability.encode(dst)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        match self.kind {
            CoreCapabilityKind::ServerCoreCapabilityRequest => "DR_CORE_CAPABILITY_REQ",
            CoreCapabilityKind::ClientCoreCapabilityResponse => "DR_CORE_CAPABILITY_RSP",
        }
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.capabilities.iter().map(Encode::size).sum::<usize>()
    }
}

/// CAPABILITY_SET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityMessage {
    pub header: CapabilityHeader,
    pub capability_data: CapabilityData,
}

impl CapabilityMessage {
    const NAME: &'static str = "CAPABILITY_SET";

    pub fn new_general(version_minor: u16) -> Self {
        Self {
            header: CapabilityHeader {
                cap_type: CapabilityType::General,
                version: GENERAL_CAPABILITY_VERSION_02,
            },
            capability_data: CapabilityData::General(GeneralCapabilitySet {
                os_type: 0,
                os_version: 0,
                protocol_major_version: VERSION_MAJOR,
                protocol_minor_version: version_minor,
                io_code_1: IoCode1::all(),
                io_code_2: 0,
                extended_pdu: ExtendedPdu::RDPDR_DEVICE_REMOVE_PDUS
                    | ExtendedPdu::RDPDR_CLIENT_DISPLAY_NAME_PDU
                    | ExtendedPdu::RDPDR_USER_LOGGEDON_PDU,
                extra_flags_1: ExtraFlags1::ENABLE_ASYNCIO,
                extra_flags_2: 0,
                special_type_device_cap: 0,
            }),
        }
    }

    pub fn new_printer() -> Self {
        Self::new_empty(CapabilityType::Printer, CapabilityData::Printer)
    }

    pub fn new_port() -> Self {
        Self::new_empty(CapabilityType::Port, CapabilityData::Port)
    }

    pub fn new_drive() -> Self {
        Self::new_empty(CapabilityType::Drive, CapabilityData::Drive)
    }

    pub fn new_smartcard() -> Self {
        Self::new_empty(CapabilityType::Smartcard, CapabilityData::Smartcard)
    }

    fn new_empty(cap_type: CapabilityType, capability_data: CapabilityData) -> Self {
        Self {
            header: CapabilityHeader {
                cap_type,
                version: CAPABILITY_VERSION_01,
            },
            capability_data,
        }
    }

    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: CapabilityHeader::SIZE);

        let cap_type: CapabilityType = src.read_u16().try_into()?;
        let length = usize::from(src.read_u16());
        let version = src.read_u32();

        let Some(data_length) = length.checked_sub(CapabilityHeader::SIZE) else {
            return Err(invalid_field_err!("capabilityLength", "shorter than its own header"));
        };

        let capability_data = match cap_type {
            CapabilityType::General => CapabilityData::General(GeneralCapabilitySet::decode(src, version)?),
            // Trailing capability-specific data, if any, carries nothing this
            // client acts upon; skip it by the announced length.
            CapabilityType::Printer => Self::skip_data(src, data_length, CapabilityData::Printer)?,
            CapabilityType::Port => Self::skip_data(src, data_length, CapabilityData::Port)?,
            CapabilityType::Drive => Self::skip_data(src, data_length, CapabilityData::Drive)?,
            CapabilityType::Smartcard => Self::skip_data(src, data_length, CapabilityData::Smartcard)?,
        };

        Ok(Self {
            header: CapabilityHeader { cap_type, version },
            capability_data,
        })
    }

    fn skip_data(src: &mut ReadCursor<'_>, data_length: usize, data: CapabilityData) -> DecodeResult<CapabilityData> {
        ensure_size!(in: src, size: data_length);
        read_padding!(src, data_length);
        Ok(data)
    }
}

impl Encode for CapabilityMessage {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.header.cap_type as u16);
        dst.write_u16(cast_length!("capabilityLength", self.size())?);
        dst.write_u32(self.header.version);
        match &self.capability_data {
            CapabilityData::General(general) => general.encode(dst, self.header.version)?,
            CapabilityData::Printer | CapabilityData::Port | CapabilityData::Drive | CapabilityData::Smartcard => {}
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        CapabilityHeader::SIZE
            + match &self.capability_data {
                CapabilityData::General(general) => general.size(self.header.version),
                CapabilityData::Printer | CapabilityData::Port | CapabilityData::Drive | CapabilityData::Smartcard => 0,
            }
    }
}

/// CAPABILITY_HEADER, with the length left implicit: it is recomputed from
/// the capability data on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityHeader {
    pub cap_type: CapabilityType,
    pub version: u32,
}

impl CapabilityHeader {
    pub const SIZE: usize = 2 /* capType */ + 2 /* capLength */ + 4 /* version */;
}

pub const CAPABILITY_VERSION_01: u32 = 0x0000_0001;
pub const GENERAL_CAPABILITY_VERSION_01: u32 = 0x0000_0001;
pub const GENERAL_CAPABILITY_VERSION_02: u32 = 0x0000_0002;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CapabilityType {
    /// CAP_GENERAL_TYPE
    General = 0x0001,
    /// CAP_PRINTER_TYPE
    Printer = 0x0002,
    /// CAP_PORT_TYPE
    Port = 0x0003,
    /// CAP_DRIVE_TYPE
    Drive = 0x0004,
    /// CAP_SMARTCARD_TYPE
    Smartcard = 0x0005,
}

impl TryFrom<u16> for CapabilityType {
    type Error = DecodeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::General),
            0x0002 => Ok(Self::Printer),
            0x0003 => Ok(Self::Port),
            0x0004 => Ok(Self::Drive),
            0x0005 => Ok(Self::Smartcard),
            _ => Err(invalid_field_err!("capabilityType", "invalid capability type")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityData {
    General(GeneralCapabilitySet),
    Printer,
    Port,
    Drive,
    Smartcard,
}

/// GENERAL_CAPS_SET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralCapabilitySet {
    /// Ignored by the protocol; sent as zero.
    pub os_type: u32,
    /// Ignored by the protocol; sent as zero.
    pub os_version: u32,
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub io_code_1: IoCode1,
    /// Reserved for future extensibility; sent as zero.
    pub io_code_2: u32,
    pub extended_pdu: ExtendedPdu,
    pub extra_flags_1: ExtraFlags1,
    /// Reserved for future extensibility; sent as zero.
    pub extra_flags_2: u32,
    /// Number of special devices announced; only present at version 2.
    pub special_type_device_cap: u32,
}

impl GeneralCapabilitySet {
    fn decode(src: &mut ReadCursor<'_>, version: u32) -> DecodeResult<Self> {
        ensure_size!(in: src, size: 4 + 4 + 2 + 2 + 4 + 4 + 4 + 4 + 4);

        let os_type = src.read_u32();
        let os_version = src.read_u32();
        let protocol_major_version = src.read_u16();
        let protocol_minor_version = src.read_u16();
        let io_code_1 = IoCode1::from_bits_retain(src.read_u32());
        let io_code_2 = src.read_u32();
        let extended_pdu = ExtendedPdu::from_bits_retain(src.read_u32());
        let extra_flags_1 = ExtraFlags1::from_bits_retain(src.read_u32());
        let extra_flags_2 = src.read_u32();
        let special_type_device_cap = if version == GENERAL_CAPABILITY_VERSION_02 {
            ensure_size!(in: src, size: 4);
            src.read_u32()
        } else {
            0
        };

        Ok(Self {
            os_type,
            os_version,
            protocol_major_version,
            protocol_minor_version,
            io_code_1,
            io_code_2,
            extended_pdu,
            extra_flags_1,
            extra_flags_2,
            special_type_device_cap,
        })
    }

    fn encode(&self, dst: &mut WriteCursor<'_>, version: u32) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size(version));

        dst.write_u32(self.os_type);
        dst.write_u32(self.os_version);
        dst.write_u16(self.protocol_major_version);
        dst.write_u16(self.protocol_minor_version);
        dst.write_u32(self.io_code_1.bits());
        dst.write_u32(self.io_code_2);
        dst.write_u32(self.extended_pdu.bits());
        dst.write_u32(self.extra_flags_1.bits());
        dst.write_u32(self.extra_flags_2);
        if version == GENERAL_CAPABILITY_VERSION_02 {
            dst.write_u32(self.special_type_device_cap);
        }

        Ok(())
    }

    fn size(&self, version: u32) -> usize {
        32 + if version == GENERAL_CAPABILITY_VERSION_02 { 4 } else { 0 }
    }
}

bitflags! {
    /// Supported IRP major functions, advertised in the general capability set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IoCode1: u32 {
        /// IRP_MJ_CREATE
        const RDPDR_IRP_MJ_CREATE = 0x0000_0001;
        /// IRP_MJ_CLEANUP
        const RDPDR_IRP_MJ_CLEANUP = 0x0000_0002;
        /// IRP_MJ_CLOSE
        const RDPDR_IRP_MJ_CLOSE = 0x0000_0004;
        /// IRP_MJ_READ
        const RDPDR_IRP_MJ_READ = 0x0000_0008;
        /// IRP_MJ_WRITE
        const RDPDR_IRP_MJ_WRITE = 0x0000_0010;
        /// IRP_MJ_FLUSH_BUFFERS
        const RDPDR_IRP_MJ_FLUSH_BUFFERS = 0x0000_0020;
        /// IRP_MJ_SHUTDOWN
        const RDPDR_IRP_MJ_SHUTDOWN = 0x0000_0040;
        /// IRP_MJ_DEVICE_CONTROL
        const RDPDR_IRP_MJ_DEVICE_CONTROL = 0x0000_0080;
        /// IRP_MJ_QUERY_VOLUME_INFORMATION
        const RDPDR_IRP_MJ_QUERY_VOLUME_INFORMATION = 0x0000_0100;
        /// IRP_MJ_SET_VOLUME_INFORMATION
        const RDPDR_IRP_MJ_SET_VOLUME_INFORMATION = 0x0000_0200;
        /// IRP_MJ_QUERY_INFORMATION
        const RDPDR_IRP_MJ_QUERY_INFORMATION = 0x0000_0400;
        /// IRP_MJ_SET_INFORMATION
        const RDPDR_IRP_MJ_SET_INFORMATION = 0x0000_0800;
        /// IRP_MJ_DIRECTORY_CONTROL
        const RDPDR_IRP_MJ_DIRECTORY_CONTROL = 0x0000_1000;
        /// IRP_MJ_LOCK_CONTROL
        const RDPDR_IRP_MJ_LOCK_CONTROL = 0x0000_2000;
        /// IRP_MJ_QUERY_SECURITY
        const RDPDR_IRP_MJ_QUERY_SECURITY = 0x0000_4000;
        /// IRP_MJ_SET_SECURITY
        const RDPDR_IRP_MJ_SET_SECURITY = 0x0000_8000;
    }
}

bitflags! {
    /// Extended PDU support flags in the general capability set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExtendedPdu: u32 {
        /// The client can receive device list removal notifications.
        const RDPDR_DEVICE_REMOVE_PDUS = 0x0000_0001;
        /// The client can send a display name PDU.
        const RDPDR_CLIENT_DISPLAY_NAME_PDU = 0x0000_0002;
        /// The server can send a user logged-on PDU.
        const RDPDR_USER_LOGGEDON_PDU = 0x0000_0004;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExtraFlags1: u32 {
        /// The client supports asynchronous I/O dispatch.
        const ENABLE_ASYNCIO = 0x0000_0001;
    }
}

/// DEVICE_ANNOUNCE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAnnounceHeader {
    pub device_type: DeviceType,
    pub device_id: u32,
    pub preferred_dos_name: PreferredDosName,
    pub device_data: Vec<u8>,
}

impl DeviceAnnounceHeader {
    const NAME: &'static str = "DEVICE_ANNOUNCE";
    const FIXED_PART_SIZE: usize = 4 /* deviceType */ + 4 /* deviceId */ + 8 /* preferredDosName */ + 4 /* deviceDataLength */;

    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let device_type: DeviceType = src.read_u32().try_into()?;
        let device_id = src.read_u32();
        let preferred_dos_name = PreferredDosName::from_wire(src.read_array::<8>());
        let device_data_length: usize = cast_length!("deviceDataLength", src.read_u32())?;
        ensure_size!(in: src, size: device_data_length);
        let device_data = src.read_slice(device_data_length).to_vec();

        Ok(Self {
            device_type,
            device_id,
            preferred_dos_name,
            device_data,
        })
    }
}

impl Encode for DeviceAnnounceHeader {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.device_type as u32);
        dst.write_u32(self.device_id);
        dst.write_array(self.preferred_dos_name.to_wire());
        dst.write_u32(cast_length!("deviceDataLength", self.device_data.len())?);
        dst.write_slice(&self.device_data);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.device_data.len()
    }
}

/// The 8-byte device name shown by the server, e.g. as a drive label.
///
/// On the wire the name is exactly 8 bytes: spaces are replaced with
/// underscores, longer names are truncated, shorter names padded with spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferredDosName(String);

impl PreferredDosName {
    pub fn new(name: &str) -> Self {
        Self(name.replace(' ', "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_wire(raw: [u8; 8]) -> Self {
        let name = String::from_utf8_lossy(&raw);
        Self(name.trim_end_matches(['\0', ' ']).to_owned())
    }

    fn to_wire(&self) -> [u8; 8] {
        let mut wire = [b' '; 8];
        for (dst, src) in wire.iter_mut().zip(self.0.bytes()) {
            *dst = src;
        }
        wire
    }
}

impl fmt::Display for PreferredDosName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DeviceType {
    /// RDPDR_DTYP_SERIAL
    Serial = 0x0000_0001,
    /// RDPDR_DTYP_PARALLEL
    Parallel = 0x0000_0002,
    /// RDPDR_DTYP_PRINT
    Print = 0x0000_0004,
    /// RDPDR_DTYP_FILESYSTEM
    Filesystem = 0x0000_0008,
    /// RDPDR_DTYP_SMARTCARD
    Smartcard = 0x0000_0020,
}

impl TryFrom<u32> for DeviceType {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x0000_0001 => Ok(Self::Serial),
            0x0000_0002 => Ok(Self::Parallel),
            0x0000_0004 => Ok(Self::Print),
            0x0000_0008 => Ok(Self::Filesystem),
            0x0000_0020 => Ok(Self::Smartcard),
            _ => Err(invalid_field_err!("deviceType", "invalid device type")),
        }
    }
}

/// DR_CORE_DEVICELIST_ANNOUNCE_REQ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDeviceListAnnounce {
    pub device_list: Vec<DeviceAnnounceHeader>,
}

impl ClientDeviceListAnnounce {
    const NAME: &'static str = "DR_CORE_DEVICELIST_ANNOUNCE_REQ";
    const FIXED_PART_SIZE: usize = 4 /* deviceCount */;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let device_count: usize = cast_length!("deviceCount", src.read_u32())?;
        let mut device_list = Vec::with_capacity(device_count);
        for _ in 0..device_count {
            device_list.push(DeviceAnnounceHeader::decode(src)?);
        }

        Ok(Self { device_list })
    }
}

impl Encode for ClientDeviceListAnnounce {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(cast_length!("deviceCount", self.device_list.len())?);
        for device in &self.device_list {
            device.encode(dst)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.device_list.iter().map(Encode::size).sum::<usize>()
    }
}

/// DR_CORE_DEVICE_ANNOUNCE_RSP
///
/// The server acknowledges each announced device with a result code; the
/// client only logs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerDeviceAnnounceResponse {
    pub device_id: u32,
    pub result_code: NtStatus,
}

impl ServerDeviceAnnounceResponse {
    const NAME: &'static str = "DR_CORE_DEVICE_ANNOUNCE_RSP";
    const FIXED_PART_SIZE: usize = 4 /* deviceId */ + 4 /* resultCode */;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        Ok(Self {
            device_id: src.read_u32(),
            result_code: NtStatus::from(src.read_u32()),
        })
    }
}

impl Encode for ServerDeviceAnnounceResponse {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u32(self.device_id);
        dst.write_u32(self.result_code.into());

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

/// Windows NT status code carried in I/O completions and announce replies.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NtStatus(u32);

impl NtStatus {
    /// STATUS_SUCCESS
    pub const SUCCESS: Self = Self(0x0000_0000);
    /// STATUS_PENDING
    pub const PENDING: Self = Self(0x0000_0103);
    /// STATUS_NO_MORE_FILES
    pub const NO_MORE_FILES: Self = Self(0x8000_0006);
    /// STATUS_INVALID_HANDLE
    pub const INVALID_HANDLE: Self = Self(0xC000_0008);
    /// STATUS_INVALID_PARAMETER
    pub const INVALID_PARAMETER: Self = Self(0xC000_000D);
    /// STATUS_NO_SUCH_FILE
    pub const NO_SUCH_FILE: Self = Self(0xC000_000F);
    /// STATUS_ACCESS_DENIED
    pub const ACCESS_DENIED: Self = Self(0xC000_0022);
    /// STATUS_FILE_IS_A_DIRECTORY
    pub const FILE_IS_A_DIRECTORY: Self = Self(0xC000_00BA);
    /// STATUS_NOT_SUPPORTED
    pub const NOT_SUPPORTED: Self = Self(0xC000_00BB);
    /// STATUS_DIRECTORY_NOT_EMPTY
    pub const DIRECTORY_NOT_EMPTY: Self = Self(0xC000_0101);
    /// STATUS_CANCELLED
    pub const CANCELLED: Self = Self(0xC000_0120);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl From<u32> for NtStatus {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<NtStatus> for u32 {
    fn from(value: NtStatus) -> Self {
        value.0
    }
}

impl fmt::Debug for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::SUCCESS => "STATUS_SUCCESS",
            Self::PENDING => "STATUS_PENDING",
            Self::NO_MORE_FILES => "STATUS_NO_MORE_FILES",
            Self::INVALID_HANDLE => "STATUS_INVALID_HANDLE",
            Self::INVALID_PARAMETER => "STATUS_INVALID_PARAMETER",
            Self::NO_SUCH_FILE => "STATUS_NO_SUCH_FILE",
            Self::ACCESS_DENIED => "STATUS_ACCESS_DENIED",
            Self::FILE_IS_A_DIRECTORY => "STATUS_FILE_IS_A_DIRECTORY",
            Self::NOT_SUPPORTED => "STATUS_NOT_SUPPORTED",
            Self::DIRECTORY_NOT_EMPTY => "STATUS_DIRECTORY_NOT_EMPTY",
            Self::CANCELLED => "STATUS_CANCELLED",
            Self(other) => return write!(f, "NtStatus({other:#010X})"),
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// DR_DEVICE_IOREQUEST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIoRequest {
    pub device_id: u32,
    pub file_id: u32,
    pub completion_id: u32,
    pub major_function: MajorFunction,
    pub minor_function: MinorFunction,
}

impl DeviceIoRequest {
    const NAME: &'static str = "DR_DEVICE_IOREQUEST";
    const FIXED_PART_SIZE: usize = 4 /* deviceId */ + 4 /* fileId */ + 4 /* completionId */ + 4 /* majorFunction */ + 4 /* minorFunction */;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let device_id = src.read_u32();
        let file_id = src.read_u32();
        let completion_id = src.read_u32();
        let major_function = MajorFunction::from(src.read_u32());
        // The minor function field is only meaningful for directory control
        // requests; some servers leave garbage in it otherwise.
        let minor_function = if major_function == MajorFunction::DirectoryControl {
            MinorFunction::from(src.read_u32())
        } else {
            let _ = src.read_u32();
            MinorFunction::None
        };

        Ok(Self {
            device_id,
            file_id,
            completion_id,
            major_function,
            minor_function,
        })
    }
}

impl Encode for DeviceIoRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u32(self.device_id);
        dst.write_u32(self.file_id);
        dst.write_u32(self.completion_id);
        dst.write_u32(self.major_function.as_u32());
        dst.write_u32(self.minor_function.as_u32());

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

/// Major function of an I/O request. Unrecognized values are preserved so
/// the dispatcher can complete them with NotSupported instead of failing
/// the whole channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorFunction {
    /// IRP_MJ_CREATE
    Create,
    /// IRP_MJ_CLOSE
    Close,
    /// IRP_MJ_READ
    Read,
    /// IRP_MJ_WRITE
    Write,
    /// IRP_MJ_QUERY_INFORMATION
    QueryInformation,
    /// IRP_MJ_SET_INFORMATION
    SetInformation,
    /// IRP_MJ_QUERY_VOLUME_INFORMATION
    QueryVolumeInformation,
    /// IRP_MJ_SET_VOLUME_INFORMATION
    SetVolumeInformation,
    /// IRP_MJ_DIRECTORY_CONTROL
    DirectoryControl,
    /// IRP_MJ_DEVICE_CONTROL
    DeviceControl,
    /// IRP_MJ_LOCK_CONTROL
    LockControl,
    Other(u32),
}

impl MajorFunction {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Create => 0x0000_0000,
            Self::Close => 0x0000_0002,
            Self::Read => 0x0000_0003,
            Self::Write => 0x0000_0004,
            Self::QueryInformation => 0x0000_0005,
            Self::SetInformation => 0x0000_0006,
            Self::QueryVolumeInformation => 0x0000_000A,
            Self::SetVolumeInformation => 0x0000_000B,
            Self::DirectoryControl => 0x0000_000C,
            Self::DeviceControl => 0x0000_000E,
            Self::LockControl => 0x0000_0011,
            Self::Other(value) => value,
        }
    }
}

impl From<u32> for MajorFunction {
    fn from(value: u32) -> Self {
        match value {
            0x0000_0000 => Self::Create,
            0x0000_0002 => Self::Close,
            0x0000_0003 => Self::Read,
            0x0000_0004 => Self::Write,
            0x0000_0005 => Self::QueryInformation,
            0x0000_0006 => Self::SetInformation,
            0x0000_000A => Self::QueryVolumeInformation,
            0x0000_000B => Self::SetVolumeInformation,
            0x0000_000C => Self::DirectoryControl,
            0x0000_000E => Self::DeviceControl,
            0x0000_0011 => Self::LockControl,
            other => Self::Other(other),
        }
    }
}

/// Minor function of a directory control request. Values other than the two
/// known ones are preserved so the dispatcher can reject them gracefully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinorFunction {
    None,
    /// IRP_MN_QUERY_DIRECTORY
    QueryDirectory,
    /// IRP_MN_NOTIFY_CHANGE_DIRECTORY
    NotifyChangeDirectory,
    Other(u32),
}

impl MinorFunction {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::None => 0x0000_0000,
            Self::QueryDirectory => 0x0000_0001,
            Self::NotifyChangeDirectory => 0x0000_0002,
            Self::Other(value) => value,
        }
    }
}

impl From<u32> for MinorFunction {
    fn from(value: u32) -> Self {
        match value {
            0x0000_0000 => Self::None,
            0x0000_0001 => Self::QueryDirectory,
            0x0000_0002 => Self::NotifyChangeDirectory,
            other => Self::Other(other),
        }
    }
}

/// DR_DEVICE_IOCOMPLETION
///
/// Every I/O response starts with the originating device and completion ids
/// and a status; the 32-bit result slot carries the operation's scalar
/// outcome (assigned file id, byte count, or structure length) and the
/// payload whatever structure the operation returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIoResponse {
    pub device_id: u32,
    pub completion_id: u32,
    pub io_status: NtStatus,
    pub result: u32,
    pub payload: Vec<u8>,
}

impl DeviceIoResponse {
    const NAME: &'static str = "DR_DEVICE_IOCOMPLETION";
    const FIXED_PART_SIZE: usize = 4 /* deviceId */ + 4 /* completionId */ + 4 /* ioStatus */ + 4 /* result */;

    pub fn new(req: &DeviceIoRequest, io_status: NtStatus, result: u32, payload: Vec<u8>) -> Self {
        Self {
            device_id: req.device_id,
            completion_id: req.completion_id,
            io_status,
            result,
            payload,
        }
    }

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        Ok(Self {
            device_id: src.read_u32(),
            completion_id: src.read_u32(),
            io_status: NtStatus::from(src.read_u32()),
            result: src.read_u32(),
            payload: src.read_remaining().to_vec(),
        })
    }
}

impl Encode for DeviceIoResponse {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.device_id);
        dst.write_u32(self.completion_id);
        dst.write_u32(self.io_status.into());
        dst.write_u32(self.result);
        dst.write_slice(&self.payload);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.payload.len()
    }
}

/// DR_CREATE_REQ
///
/// The desired access mask is the lone big-endian field in the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCreateRequest {
    pub desired_access: u32,
    pub allocation_size: u64,
    pub file_attributes: FileAttributes,
    pub shared_access: u32,
    pub create_disposition: CreateDisposition,
    pub create_options: CreateOptions,
    /// Path relative to the device root, backslash-separated on the wire.
    pub path: String,
}

impl DeviceCreateRequest {
    const NAME: &'static str = "DR_CREATE_REQ";
    const FIXED_PART_SIZE: usize = 4 /* desiredAccess */ + 8 /* allocationSize */ + 4 /* fileAttributes */
        + 4 /* sharedAccess */ + 4 /* createDisposition */ + 4 /* createOptions */ + 4 /* pathLength */;

    /// Longest accepted path, in UTF-16 code units.
    const MAX_PATH_UNITS: usize = 256;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let desired_access = src.read_u32_be();
        let allocation_size = src.read_u64();
        let file_attributes = FileAttributes::from_bits_retain(src.read_u32());
        let shared_access = src.read_u32();
        let create_disposition: CreateDisposition = src.read_u32().try_into()?;
        let create_options = CreateOptions::from_bits_retain(src.read_u32());
        let path_length: usize = cast_length!("pathLength", src.read_u32())?;

        if path_length / 2 >= Self::MAX_PATH_UNITS {
            return Err(invalid_field_err!("pathLength", "path too long"));
        }
        let path = read_utf16_from_cursor(src, path_length)?;

        Ok(Self {
            desired_access,
            allocation_size,
            file_attributes,
            shared_access,
            create_disposition,
            create_options,
            path,
        })
    }
}

impl Encode for DeviceCreateRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32_be(self.desired_access);
        dst.write_u64(self.allocation_size);
        dst.write_u32(self.file_attributes.bits());
        dst.write_u32(self.shared_access);
        dst.write_u32(self.create_disposition as u32);
        dst.write_u32(self.create_options.bits());
        dst.write_u32(cast_length!("pathLength", utf16_encoded_len(&self.path, true))?);
        write_utf16_to_cursor(dst, &self.path, true)?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + utf16_encoded_len(&self.path, true)
    }
}

/// DR_READ_REQ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceReadRequest {
    pub length: u32,
    pub offset: u64,
}

impl DeviceReadRequest {
    const NAME: &'static str = "DR_READ_REQ";
    const FIXED_PART_SIZE: usize = 4 /* length */ + 8 /* offset */ + 20 /* padding */;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let length = src.read_u32();
        let offset = src.read_u64();
        read_padding!(src, 20);

        Ok(Self { length, offset })
    }
}

impl Encode for DeviceReadRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u32(self.length);
        dst.write_u64(self.offset);
        write_padding!(dst, 20);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

/// DR_WRITE_REQ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceWriteRequest {
    pub offset: u64,
    pub data: Vec<u8>,
}

impl DeviceWriteRequest {
    const NAME: &'static str = "DR_WRITE_REQ";
    const FIXED_PART_SIZE: usize = 4 /* length */ + 8 /* offset */ + 20 /* padding */;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let length: usize = cast_length!("length", src.read_u32())?;
        let offset = src.read_u64();
        read_padding!(src, 20);
        ensure_size!(in: src, size: length);
        let data = src.read_slice(length).to_vec();

        Ok(Self { offset, data })
    }
}

impl Encode for DeviceWriteRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(cast_length!("length", self.data.len())?);
        dst.write_u64(self.offset);
        write_padding!(dst, 20);
        dst.write_slice(&self.data);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.data.len()
    }
}

/// DR_DRIVE_QUERY_INFORMATION_REQ
///
/// The query buffer that may follow the class is irrelevant for every class
/// this client serves and is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerDriveQueryInformationRequest {
    pub file_info_class: FileInformationClass,
}

impl ServerDriveQueryInformationRequest {
    const NAME: &'static str = "DR_DRIVE_QUERY_INFORMATION_REQ";
    const FIXED_PART_SIZE: usize = 4 /* fsInformationClass */;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        Ok(Self {
            file_info_class: src.read_u32().try_into()?,
        })
    }
}

impl Encode for ServerDriveQueryInformationRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u32(self.file_info_class as u32);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

/// DR_DRIVE_SET_INFORMATION_REQ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDriveSetInformationRequest {
    pub file_info_class: FileInformationClass,
    /// Announced length of the set buffer; echoed back in the completion.
    pub length: u32,
    pub set_buffer: SetInformationData,
}

impl ServerDriveSetInformationRequest {
    const NAME: &'static str = "DR_DRIVE_SET_INFORMATION_REQ";
    const FIXED_PART_SIZE: usize = 4 /* fsInformationClass */ + 4 /* length */ + 24 /* padding */;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let file_info_class: FileInformationClass = src.read_u32().try_into()?;
        let length = src.read_u32();
        read_padding!(src, 24);

        let set_buffer = match file_info_class {
            FileInformationClass::Basic => SetInformationData::Basic(FileBasicInformation::decode(src)?),
            FileInformationClass::EndOfFile => {
                ensure_size!(in: src, size: 8);
                SetInformationData::EndOfFile(src.read_u64())
            }
            FileInformationClass::Allocation => {
                ensure_size!(in: src, size: 8);
                SetInformationData::Allocation(src.read_u64())
            }
            // The disposition buffer is at most one advisory byte; deletion
            // intent is derived from the create access mask instead.
            FileInformationClass::Disposition => SetInformationData::Disposition,
            FileInformationClass::Rename => SetInformationData::Rename(RenameInformation::decode(src)?),
            _ => {
                return Err(invalid_field_err!(
                    "fsInformationClass",
                    "unsupported class for set information",
                ))
            }
        };

        Ok(Self {
            file_info_class,
            length,
            set_buffer,
        })
    }
}

impl Encode for ServerDriveSetInformationRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.file_info_class as u32);
        dst.write_u32(self.length);
        write_padding!(dst, 24);
        match &self.set_buffer {
            SetInformationData::Basic(basic) => basic.encode(dst)?,
            SetInformationData::EndOfFile(end_of_file) => dst.write_u64(*end_of_file),
            SetInformationData::Allocation(allocation) => dst.write_u64(*allocation),
            SetInformationData::Disposition => {}
            SetInformationData::Rename(rename) => rename.encode(dst)?,
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
            + match &self.set_buffer {
                SetInformationData::Basic(_) => FileBasicInformation::SIZE,
                SetInformationData::EndOfFile(_) | SetInformationData::Allocation(_) => 8,
                SetInformationData::Disposition => 0,
                SetInformationData::Rename(rename) => rename.size(),
            }
    }
}

/// Decoded set buffer of a set information request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetInformationData {
    Basic(FileBasicInformation),
    EndOfFile(u64),
    Allocation(u64),
    Disposition,
    Rename(RenameInformation),
}

/// FILE_BASIC_INFORMATION
///
/// Timestamps are FILETIME values: 100-nanosecond intervals since 1601.
/// A zero value means "leave unchanged".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileBasicInformation {
    pub creation_time: u64,
    pub last_access_time: u64,
    pub last_write_time: u64,
    pub change_time: u64,
    pub file_attributes: FileAttributes,
}

impl FileBasicInformation {
    const SIZE: usize = 8 * 4 /* four FILETIMEs */ + 4 /* fileAttributes */;

    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: Self::SIZE);

        Ok(Self {
            creation_time: src.read_u64(),
            last_access_time: src.read_u64(),
            last_write_time: src.read_u64(),
            change_time: src.read_u64(),
            file_attributes: FileAttributes::from_bits_retain(src.read_u32()),
        })
    }

    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: Self::SIZE);

        dst.write_u64(self.creation_time);
        dst.write_u64(self.last_access_time);
        dst.write_u64(self.last_write_time);
        dst.write_u64(self.change_time);
        dst.write_u32(self.file_attributes.bits());

        Ok(())
    }
}

/// RDP_FILE_RENAME_INFORMATION
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameInformation {
    pub replace_if_exists: bool,
    pub path: String,
}

impl RenameInformation {
    const FIXED_PART_SIZE: usize = 1 /* replaceIfExists */ + 1 /* rootDirectory */ + 4 /* fileNameLength */;

    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let replace_if_exists = src.read_u8() != 0;
        let _root_directory = src.read_u8();
        let file_name_length: usize = cast_length!("fileNameLength", src.read_u32())?;
        if file_name_length / 2 >= DeviceCreateRequest::MAX_PATH_UNITS {
            return Err(invalid_field_err!("fileNameLength", "rename path too long"));
        }
        let path = read_utf16_from_cursor(src, file_name_length)?;

        Ok(Self {
            replace_if_exists,
            path,
        })
    }

    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u8(u8::from(self.replace_if_exists));
        dst.write_u8(0); // rootDirectory, always relative to the device root
        dst.write_u32(cast_length!("fileNameLength", utf16_encoded_len(&self.path, true))?);
        write_utf16_to_cursor(dst, &self.path, true)?;

        Ok(())
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + utf16_encoded_len(&self.path, true)
    }
}

/// DR_DRIVE_QUERY_DIRECTORY_REQ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDriveQueryDirectoryRequest {
    pub file_info_class: FileInformationClass,
    /// Non-zero on the first query of an enumeration; the path then carries
    /// the search pattern. Subsequent queries continue the same enumeration.
    pub initial_query: u8,
    pub path: String,
}

impl ServerDriveQueryDirectoryRequest {
    const NAME: &'static str = "DR_DRIVE_QUERY_DIRECTORY_REQ";
    const FIXED_PART_SIZE: usize = 4 /* fsInformationClass */ + 1 /* initialQuery */ + 4 /* pathLength */ + 23 /* padding */;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let file_info_class: FileInformationClass = src.read_u32().try_into()?;
        let initial_query = src.read_u8();
        let path_length: usize = cast_length!("pathLength", src.read_u32())?;
        read_padding!(src, 23);
        let path = read_utf16_from_cursor(src, path_length)?;

        Ok(Self {
            file_info_class,
            initial_query,
            path,
        })
    }
}

impl Encode for ServerDriveQueryDirectoryRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.file_info_class as u32);
        dst.write_u8(self.initial_query);
        dst.write_u32(cast_length!("pathLength", utf16_encoded_len(&self.path, true))?);
        write_padding!(dst, 23);
        write_utf16_to_cursor(dst, &self.path, true)?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + utf16_encoded_len(&self.path, true)
    }
}

/// DR_DRIVE_QUERY_VOLUME_INFORMATION_REQ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerDriveQueryVolumeInformationRequest {
    pub fs_info_class: FsInformationClass,
}

impl ServerDriveQueryVolumeInformationRequest {
    const NAME: &'static str = "DR_DRIVE_QUERY_VOLUME_INFORMATION_REQ";
    const FIXED_PART_SIZE: usize = 4 /* fsInformationClass */;

    pub fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        Ok(Self {
            fs_info_class: src.read_u32().try_into()?,
        })
    }
}

impl Encode for ServerDriveQueryVolumeInformationRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u32(self.fs_info_class as u32);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

/// Information classes used in query, set and directory requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileInformationClass {
    /// FileDirectoryInformation
    Directory = 1,
    /// FileFullDirectoryInformation
    FullDirectory = 2,
    /// FileBothDirectoryInformation
    BothDirectory = 3,
    /// FileBasicInformation
    Basic = 4,
    /// FileStandardInformation
    Standard = 5,
    /// FileRenameInformation
    Rename = 10,
    /// FileNamesInformation
    Names = 12,
    /// FileDispositionInformation
    Disposition = 13,
    /// FileAllocationInformation
    Allocation = 19,
    /// FileEndOfFileInformation
    EndOfFile = 20,
    /// FileAttributeTagInformation
    AttributeTag = 35,
}

impl TryFrom<u32> for FileInformationClass {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Directory),
            2 => Ok(Self::FullDirectory),
            3 => Ok(Self::BothDirectory),
            4 => Ok(Self::Basic),
            5 => Ok(Self::Standard),
            10 => Ok(Self::Rename),
            12 => Ok(Self::Names),
            13 => Ok(Self::Disposition),
            19 => Ok(Self::Allocation),
            20 => Ok(Self::EndOfFile),
            35 => Ok(Self::AttributeTag),
            _ => Err(invalid_field_err!("fileInformationClass", "invalid file information class")),
        }
    }
}

/// Information classes used in query volume requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FsInformationClass {
    /// FileFsVolumeInformation
    Volume = 1,
    /// FileFsSizeInformation
    Size = 3,
    /// FileFsAttributeInformation
    Attribute = 5,
    /// FileFsFullSizeInformation
    FullSize = 7,
}

impl TryFrom<u32> for FsInformationClass {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Volume),
            3 => Ok(Self::Size),
            5 => Ok(Self::Attribute),
            7 => Ok(Self::FullSize),
            _ => Err(invalid_field_err!("fsInformationClass", "invalid fs information class")),
        }
    }
}

/// What a create request should do when the target does or does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CreateDisposition {
    /// FILE_SUPERSEDE
    Supersede = 0,
    /// FILE_OPEN
    Open = 1,
    /// FILE_CREATE
    Create = 2,
    /// FILE_OPEN_IF
    OpenIf = 3,
    /// FILE_OVERWRITE
    Overwrite = 4,
    /// FILE_OVERWRITE_IF
    OverwriteIf = 5,
}

impl TryFrom<u32> for CreateDisposition {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Supersede),
            1 => Ok(Self::Open),
            2 => Ok(Self::Create),
            3 => Ok(Self::OpenIf),
            4 => Ok(Self::Overwrite),
            5 => Ok(Self::OverwriteIf),
            _ => Err(invalid_field_err!("createDisposition", "invalid create disposition")),
        }
    }
}

bitflags! {
    /// Options carried in a create request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CreateOptions: u32 {
        /// The target must be a directory.
        const FILE_DIRECTORY_FILE = 0x0000_0001;
        /// The target must not be a directory.
        const FILE_NON_DIRECTORY_FILE = 0x0000_0040;
        const FILE_COMPLETE_IF_OPLOCKED = 0x0000_0100;
        /// Delete the target when its handle is closed.
        const FILE_DELETE_ON_CLOSE = 0x0000_1000;
    }
}

bitflags! {
    /// File attribute flags as reported to the server.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttributes: u32 {
        const FILE_ATTRIBUTE_READONLY = 0x0000_0001;
        const FILE_ATTRIBUTE_HIDDEN = 0x0000_0002;
        const FILE_ATTRIBUTE_SYSTEM = 0x0000_0004;
        const FILE_ATTRIBUTE_DIRECTORY = 0x0000_0010;
        /// Only valid alone.
        const FILE_ATTRIBUTE_NORMAL = 0x0000_0080;
    }
}

bitflags! {
    /// File system attribute flags reported in volume attribute queries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileSystemAttributes: u32 {
        const FILE_CASE_SENSITIVE_SEARCH = 0x0000_0001;
        const FILE_CASE_PRESERVED_NAMES = 0x0000_0002;
    }
}
