//! Wire types for the device redirection channel.
//!
//! Every message on the channel starts with a 4-byte shared header carrying
//! the component (core protocol or printing extension) and the packet id;
//! the body that follows is determined by the packet id alone.

use core::fmt;

use cloudrdp_core::{
    ensure_fixed_part_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

use self::efs::{
    ClientDeviceListAnnounce, ClientNameRequest, CoreCapability, CoreCapabilityKind, DeviceIoRequest,
    DeviceIoResponse, ServerDeviceAnnounceResponse, VersionAndIdPdu, VersionAndIdPduKind,
};

pub mod efs;

/// Header common to all messages on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedHeader {
    pub component: Component,
    pub packet_id: PacketId,
}

impl SharedHeader {
    const NAME: &'static str = "RDPDR_HEADER";

    pub const SIZE: usize = 4;
    const FIXED_PART_SIZE: usize = Self::SIZE;
}

impl Encode for SharedHeader {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.component as u16);
        dst.write_u16(self.packet_id as u16);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::SIZE
    }
}

impl Decode<'_> for SharedHeader {
    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        Ok(Self {
            component: src.read_u16().try_into()?,
            packet_id: src.read_u16().try_into()?,
        })
    }
}

/// Identifies which component a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Component {
    /// RDPDR_CTYP_CORE
    RdpdrCtypCore = 0x4472,
    /// RDPDR_CTYP_PRN
    RdpdrCtypPrn = 0x5052,
}

impl TryFrom<u16> for Component {
    type Error = cloudrdp_core::DecodeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x4472 => Ok(Self::RdpdrCtypCore),
            0x5052 => Ok(Self::RdpdrCtypPrn),
            _ => Err(invalid_field_err!("component", "invalid component")),
        }
    }
}

/// Identifies the message that follows the shared header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PacketId {
    /// PAKID_CORE_SERVER_ANNOUNCE
    CoreServerAnnounce = 0x496E,
    /// PAKID_CORE_CLIENTID_CONFIRM
    CoreClientidConfirm = 0x4343,
    /// PAKID_CORE_CLIENT_NAME
    CoreClientName = 0x434E,
    /// PAKID_CORE_DEVICELIST_ANNOUNCE
    CoreDevicelistAnnounce = 0x4441,
    /// PAKID_CORE_DEVICE_REPLY
    CoreDeviceReply = 0x6472,
    /// PAKID_CORE_DEVICE_IOREQUEST
    CoreDeviceIoRequest = 0x4952,
    /// PAKID_CORE_DEVICE_IOCOMPLETION
    CoreDeviceIoCompletion = 0x4943,
    /// PAKID_CORE_SERVER_CAPABILITY
    CoreServerCapability = 0x5350,
    /// PAKID_CORE_CLIENT_CAPABILITY
    CoreClientCapability = 0x4350,
    /// PAKID_CORE_DEVICELIST_REMOVE
    CoreDevicelistRemove = 0x444D,
    /// PAKID_CORE_USER_LOGGEDON
    CoreUserLoggedon = 0x554C,
    /// PAKID_PRN_CACHE_DATA
    PrnCacheData = 0x5043,
    /// PAKID_PRN_USING_XPS
    PrnUsingXps = 0x5543,
}

impl TryFrom<u16> for PacketId {
    type Error = cloudrdp_core::DecodeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x496E => Ok(Self::CoreServerAnnounce),
            0x4343 => Ok(Self::CoreClientidConfirm),
            0x434E => Ok(Self::CoreClientName),
            0x4441 => Ok(Self::CoreDevicelistAnnounce),
            0x6472 => Ok(Self::CoreDeviceReply),
            0x4952 => Ok(Self::CoreDeviceIoRequest),
            0x4943 => Ok(Self::CoreDeviceIoCompletion),
            0x5350 => Ok(Self::CoreServerCapability),
            0x4350 => Ok(Self::CoreClientCapability),
            0x444D => Ok(Self::CoreDevicelistRemove),
            0x554C => Ok(Self::CoreUserLoggedon),
            0x5043 => Ok(Self::PrnCacheData),
            0x5543 => Ok(Self::PrnUsingXps),
            _ => Err(invalid_field_err!("packetId", "invalid packet id")),
        }
    }
}

/// A complete message on the channel, header included.
#[derive(Debug, PartialEq, Eq)]
pub enum RdpdrPdu {
    VersionAndIdPdu(VersionAndIdPdu),
    ClientNameRequest(ClientNameRequest),
    CoreCapability(CoreCapability),
    ClientDeviceListAnnounce(ClientDeviceListAnnounce),
    ServerDeviceAnnounceResponse(ServerDeviceAnnounceResponse),
    DeviceIoRequest(DeviceIoRequest),
    DeviceIoResponse(DeviceIoResponse),
    UserLoggedOn,
}

impl RdpdrPdu {
    fn header(&self) -> SharedHeader {
        match self {
            Self::VersionAndIdPdu(pdu) => SharedHeader {
                component: Component::RdpdrCtypCore,
                packet_id: match pdu.kind {
                    VersionAndIdPduKind::ServerAnnounceRequest => PacketId::CoreServerAnnounce,
                    VersionAndIdPduKind::ClientAnnounceReply | VersionAndIdPduKind::ServerClientIdConfirm => {
                        PacketId::CoreClientidConfirm
                    }
                },
            },
            Self::ClientNameRequest(_) => SharedHeader {
                component: Component::RdpdrCtypCore,
                packet_id: PacketId::CoreClientName,
            },
            Self::CoreCapability(pdu) => SharedHeader {
                component: Component::RdpdrCtypCore,
                packet_id: match pdu.kind {
                    CoreCapabilityKind::ServerCoreCapabilityRequest => PacketId::CoreServerCapability,
                    CoreCapabilityKind::ClientCoreCapabilityResponse => PacketId::CoreClientCapability,
                },
            },
            Self::ClientDeviceListAnnounce(_) => SharedHeader {
                component: Component::RdpdrCtypCore,
                packet_id: PacketId::CoreDevicelistAnnounce,
            },
            Self::ServerDeviceAnnounceResponse(_) => SharedHeader {
                component: Component::RdpdrCtypCore,
                packet_id: PacketId::CoreDeviceReply,
            },
            Self::DeviceIoRequest(_) => SharedHeader {
                component: Component::RdpdrCtypCore,
                packet_id: PacketId::CoreDeviceIoRequest,
            },
            Self::DeviceIoResponse(_) => SharedHeader {
                component: Component::RdpdrCtypCore,
                packet_id: PacketId::CoreDeviceIoCompletion,
            },
            Self::UserLoggedOn => SharedHeader {
                component: Component::RdpdrCtypCore,
                packet_id: PacketId::CoreUserLoggedon,
            },
        }
    }
}

impl Encode for RdpdrPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        self.header().encode(dst)?;

        match self {
            Self::VersionAndIdPdu(pdu) => pdu.encode(dst),
            Self::ClientNameRequest(pdu) => pdu.encode(dst),
            Self::CoreCapability(pdu) => pdu.encode(dst),
            Self::ClientDeviceListAnnounce(pdu) => pdu.encode(dst),
            Self::ServerDeviceAnnounceResponse(pdu) => pdu.encode(dst),
            Self::DeviceIoRequest(pdu) => pdu.encode(dst),
            Self::DeviceIoResponse(pdu) => pdu.encode(dst),
            Self::UserLoggedOn => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::VersionAndIdPdu(pdu) => pdu.name(),
            Self::ClientNameRequest(pdu) => pdu.name(),
            Self::CoreCapability(pdu) => pdu.name(),
            Self::ClientDeviceListAnnounce(pdu) => pdu.name(),
            Self::ServerDeviceAnnounceResponse(pdu) => pdu.name(),
            Self::DeviceIoRequest(pdu) => pdu.name(),
            Self::DeviceIoResponse(pdu) => pdu.name(),
            Self::UserLoggedOn => "DR_CORE_USER_LOGGEDON",
        }
    }

    fn size(&self) -> usize {
        SharedHeader::SIZE
            + match self {
                Self::VersionAndIdPdu(pdu) => pdu.size(),
                Self::ClientNameRequest(pdu) => pdu.size(),
                Self::CoreCapability(pdu) => pdu.size(),
                Self::ClientDeviceListAnnounce(pdu) => pdu.size(),
                Self::ServerDeviceAnnounceResponse(pdu) => pdu.size(),
                Self::DeviceIoRequest(pdu) => pdu.size(),
                Self::DeviceIoResponse(pdu) => pdu.size(),
                Self::UserLoggedOn => 0,
            }
    }
}

impl Decode<'_> for RdpdrPdu {
    fn decode(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        let header = SharedHeader::decode(src)?;

        match header.packet_id {
            PacketId::CoreServerAnnounce => Ok(Self::VersionAndIdPdu(VersionAndIdPdu::decode(
                src,
                VersionAndIdPduKind::ServerAnnounceRequest,
            )?)),
            PacketId::CoreClientidConfirm => Ok(Self::VersionAndIdPdu(VersionAndIdPdu::decode(
                src,
                VersionAndIdPduKind::ServerClientIdConfirm,
            )?)),
            PacketId::CoreClientName => Ok(Self::ClientNameRequest(ClientNameRequest::decode(src)?)),
            PacketId::CoreServerCapability => Ok(Self::CoreCapability(CoreCapability::decode(
                src,
                CoreCapabilityKind::ServerCoreCapabilityRequest,
            )?)),
            PacketId::CoreClientCapability => Ok(Self::CoreCapability(CoreCapability::decode(
                src,
                CoreCapabilityKind::ClientCoreCapabilityResponse,
            )?)),
            PacketId::CoreDevicelistAnnounce => {
                Ok(Self::ClientDeviceListAnnounce(ClientDeviceListAnnounce::decode(src)?))
            }
            PacketId::CoreDeviceReply => Ok(Self::ServerDeviceAnnounceResponse(ServerDeviceAnnounceResponse::decode(
                src,
            )?)),
            PacketId::CoreDeviceIoRequest => Ok(Self::DeviceIoRequest(DeviceIoRequest::decode(src)?)),
            PacketId::CoreDeviceIoCompletion => Ok(Self::DeviceIoResponse(DeviceIoResponse::decode(src)?)),
            PacketId::CoreUserLoggedon => Ok(Self::UserLoggedOn),
            _ => Err(invalid_field_err!("packetId", "unhandled packet id")),
        }
    }
}

impl fmt::Display for RdpdrPdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Encode::name(self))
    }
}
