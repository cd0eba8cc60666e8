#![doc = include_str!("../README.md")]

use core::fmt;

use cloudrdp_core::{assert_obj_safe, DecodeError, EncodeError, Error, WriteBuf};

/// Name of a static virtual channel, as carried in the channel definition
/// structure: up to 7 ASCII characters, NUL-padded to 8 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelName([u8; 8]);

impl ChannelName {
    pub const fn from_static(value: &'static [u8; 8]) -> Self {
        Self(*value)
    }

    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// The name as a string slice, terminator and padding excluded.
    ///
    /// Returns `None` if the name is not valid ASCII.
    pub fn as_str(&self) -> Option<&str> {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        let name = &self.0[..end];
        name.is_ascii().then(|| core::str::from_utf8(name).ok()).flatten()
    }
}

/// Defines which compression flag should be sent along the channel
/// definition structure for this channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionCondition {
    /// Virtual channel data will not be compressed.
    Never,
    /// Virtual channel data is compressed if RDP data is being compressed.
    WhenRdpDataIsCompressed,
    /// Virtual channel data is always compressed.
    Always,
}

pub type ChannelResult<T> = Result<T, ChannelError>;

pub type ChannelError = Error<ChannelErrorKind>;

#[non_exhaustive]
#[derive(Debug)]
pub enum ChannelErrorKind {
    Decode(DecodeError),
    Encode(EncodeError),
    UnexpectedPdu { description: &'static str },
    Other { description: &'static str },
}

impl std::error::Error for ChannelErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::UnexpectedPdu { .. } | Self::Other { .. } => None,
        }
    }
}

impl fmt::Display for ChannelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(_) => write!(f, "decode error"),
            Self::Encode(_) => write!(f, "encode error"),
            Self::UnexpectedPdu { description } => write!(f, "unexpected PDU: {description}"),
            Self::Other { description } => write!(f, "{description}"),
        }
    }
}

pub trait ChannelErrorExt {
    fn decode(context: &'static str, error: DecodeError) -> Self;
    fn encode(context: &'static str, error: EncodeError) -> Self;
    fn unexpected_pdu(context: &'static str, description: &'static str) -> Self;
    fn other(context: &'static str, description: &'static str) -> Self;
}

impl ChannelErrorExt for ChannelError {
    fn decode(context: &'static str, error: DecodeError) -> Self {
        Self::new(context, ChannelErrorKind::Decode(error))
    }

    fn encode(context: &'static str, error: EncodeError) -> Self {
        Self::new(context, ChannelErrorKind::Encode(error))
    }

    fn unexpected_pdu(context: &'static str, description: &'static str) -> Self {
        Self::new(context, ChannelErrorKind::UnexpectedPdu { description })
    }

    fn other(context: &'static str, description: &'static str) -> Self {
        Self::new(context, ChannelErrorKind::Other { description })
    }
}

/// Wraps a [`DecodeError`] into a [`ChannelError`], using the enclosing
/// function name as context.
#[macro_export]
macro_rules! decode_err {
    ($e:expr $(,)?) => {{
        use $crate::ChannelErrorExt as _;
        $crate::ChannelError::decode(::cloudrdp_core::function!(), $e)
    }};
}

/// Wraps an [`EncodeError`] into a [`ChannelError`], using the enclosing
/// function name as context.
#[macro_export]
macro_rules! encode_err {
    ($e:expr $(,)?) => {{
        use $crate::ChannelErrorExt as _;
        $crate::ChannelError::encode(::cloudrdp_core::function!(), $e)
    }};
}

/// A static virtual channel processor.
///
/// Static virtual channels are created once at the beginning of the session
/// and allow lossless communication between client and server components
/// over the main data connection. The transport reassembles chunks and
/// hands each complete channel payload to [`SvcProcessor::process`];
/// whatever the processor writes into `output` is sent back verbatim.
pub trait SvcProcessor: fmt::Debug + Send {
    /// The name advertised for this channel during connection setup.
    fn channel_name(&self) -> ChannelName;

    /// Defines which compression flag is sent along the channel definition.
    fn compression_condition(&self) -> CompressionCondition {
        CompressionCondition::Never
    }

    /// Processes a complete payload block, queueing replies into `output`.
    fn process(&mut self, payload: &[u8], output: &mut WriteBuf) -> ChannelResult<()>;
}

assert_obj_safe!(SvcProcessor);
