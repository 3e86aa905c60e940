//! Handling of messages/frames

mod codec;

pub use codec::{decode, encode, RegisterImage};

use core::fmt;
use embedded_can::{ExtendedId, Frame, Id, StandardId};

/// Largest base identifier, 11 bits
pub const MAX_BASE_ID: u16 = 0x7ff;
/// Largest identifier extension, 18 bits
pub const MAX_EXTENSION_ID: u32 = 0x3_ffff;
/// Largest payload length of a classic CAN frame
pub const MAX_LENGTH: u8 = 8;

/// A frame value that cannot be represented by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Base identifier does not fit 11 bits
    #[error("base identifier {0:#x} does not fit 11 bits")]
    BaseIdOutOfRange(u16),
    /// Identifier extension does not fit 18 bits
    #[error("identifier extension {0:#x} does not fit 18 bits")]
    ExtensionIdOutOfRange(u32),
    /// Identifier extension set on a standard frame
    #[error("identifier extension {0:#x} given for a standard frame")]
    ExtensionOnStandardFrame(u32),
    /// Payload length above 8
    #[error("payload length {0} exceeds 8 bytes")]
    LengthOutOfRange(usize),
}

/// Classic CAN frame as exchanged with a Canola controller.
///
/// Frames are always normalized: the identifier extension is zero for
/// standard frames, payload bytes at and after `length` are zero, and the
/// whole payload is zero for remote frames. Equality therefore compares only
/// significant content.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CanFrame {
    base_id: u16,
    extension_id: u32,
    extended: bool,
    remote: bool,
    payload: [u8; 8],
    length: u8,
}

impl CanFrame {
    /// Builds a frame from its register-level parts.
    ///
    /// Payload bytes at and after `length` are dropped, as is the whole
    /// payload of a remote frame.
    pub fn from_parts(
        base_id: u16,
        extension_id: u32,
        extended: bool,
        remote: bool,
        payload: [u8; 8],
        length: u8,
    ) -> Result<Self, FrameError> {
        if base_id > MAX_BASE_ID {
            return Err(FrameError::BaseIdOutOfRange(base_id));
        }
        if extension_id > MAX_EXTENSION_ID {
            return Err(FrameError::ExtensionIdOutOfRange(extension_id));
        }
        if !extended && extension_id != 0 {
            return Err(FrameError::ExtensionOnStandardFrame(extension_id));
        }
        if length > MAX_LENGTH {
            return Err(FrameError::LengthOutOfRange(length.into()));
        }
        Ok(Self::normalized(
            base_id,
            extension_id,
            extended,
            remote,
            payload,
            length,
        ))
    }

    /// Data frame carrying `data`
    pub fn data_frame(id: impl Into<Id>, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > MAX_LENGTH.into() {
            return Err(FrameError::LengthOutOfRange(data.len()));
        }
        let mut payload = [0; 8];
        payload[..data.len()].copy_from_slice(data);
        let (base_id, extension_id, extended) = split_id(id.into());
        Self::from_parts(
            base_id,
            extension_id,
            extended,
            false,
            payload,
            data.len() as u8,
        )
    }

    /// Remote frame requesting `length` bytes
    pub fn remote_frame(id: impl Into<Id>, length: u8) -> Result<Self, FrameError> {
        let (base_id, extension_id, extended) = split_id(id.into());
        Self::from_parts(base_id, extension_id, extended, true, [0; 8], length)
    }

    /// Applies the normalization rules without range checks. Only used where
    /// the field widths are already guaranteed by masking.
    pub(crate) fn normalized(
        base_id: u16,
        extension_id: u32,
        extended: bool,
        remote: bool,
        mut payload: [u8; 8],
        length: u8,
    ) -> Self {
        if remote {
            payload = [0; 8];
        } else {
            for byte in payload.iter_mut().skip(length.into()) {
                *byte = 0;
            }
        }
        Self {
            base_id,
            extension_id: if extended { extension_id } else { 0 },
            extended,
            remote,
            payload,
            length,
        }
    }

    /// 11-bit base identifier
    pub fn base_id(&self) -> u16 {
        self.base_id
    }

    /// 18-bit identifier extension, zero for standard frames
    pub fn extension_id(&self) -> u32 {
        self.extension_id
    }

    /// `true` for 29-bit identifiers
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// `true` for remote transmission requests
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// All eight payload bytes, zero past [`Self::len`]
    pub fn payload(&self) -> &[u8; 8] {
        &self.payload
    }

    /// Declared payload length. For frames decoded from hardware this may
    /// exceed 8.
    pub fn len(&self) -> u8 {
        self.length
    }

    /// `true` if the declared payload length is zero
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Copy of this frame with the identifier extension advanced by `step`,
    /// wrapping within 18 bits. Has no effect on standard frames.
    pub fn with_extension_id_step(mut self, step: u32) -> Self {
        if self.extended {
            self.extension_id = self.extension_id.wrapping_add(step) & MAX_EXTENSION_ID;
        }
        self
    }

    /// Compares a received frame against this (sent) frame field by field.
    ///
    /// The identifier extension is only compared for extended frames and the
    /// payload only below the declared length of a data frame. The first
    /// difference found is returned.
    pub fn compare(&self, received: &CanFrame) -> Result<(), Mismatch> {
        if self.base_id != received.base_id {
            return Err(Mismatch::BaseId {
                sent: self.base_id,
                received: received.base_id,
            });
        }
        if self.extended != received.extended {
            return Err(Mismatch::Format);
        }
        if self.extended && self.extension_id != received.extension_id {
            return Err(Mismatch::ExtensionId {
                sent: self.extension_id,
                received: received.extension_id,
            });
        }
        if self.remote != received.remote {
            return Err(Mismatch::Remote);
        }
        if self.length != received.length {
            return Err(Mismatch::Length {
                sent: self.length,
                received: received.length,
            });
        }
        if !self.remote {
            let significant = usize::from(self.length).min(self.payload.len());
            let differing = self.payload[..significant]
                .iter()
                .zip(&received.payload[..significant])
                .position(|(sent, received)| sent != received);
            if let Some(index) = differing {
                return Err(Mismatch::Payload {
                    index,
                    sent: self.payload[index],
                    received: received.payload[index],
                });
            }
        }
        Ok(())
    }
}

fn split_id(id: Id) -> (u16, u32, bool) {
    match id {
        Id::Standard(id) => (id.as_raw(), 0, false),
        Id::Extended(id) => {
            let raw = id.as_raw();
            ((raw >> 18) as u16, raw & MAX_EXTENSION_ID, true)
        }
    }
}

/// First difference between a sent and a received frame
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
    /// Base identifiers differ
    BaseId {
        /// Sent value
        sent: u16,
        /// Received value
        received: u16,
    },
    /// One frame is extended, the other is not
    Format,
    /// Identifier extensions of two extended frames differ
    ExtensionId {
        /// Sent value
        sent: u32,
        /// Received value
        received: u32,
    },
    /// One frame is a remote frame, the other is not
    Remote,
    /// Declared lengths differ
    Length {
        /// Sent value
        sent: u8,
        /// Received value
        received: u8,
    },
    /// A significant payload byte differs
    Payload {
        /// Byte position
        index: usize,
        /// Sent value
        sent: u8,
        /// Received value
        received: u8,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BaseId { sent, received } => {
                write!(f, "Arb ID A mismatch: {sent:#x} vs {received:#x}")
            }
            Self::Format => write!(f, "Ext ID mismatch"),
            Self::ExtensionId { sent, received } => {
                write!(f, "Arb ID B mismatch: {sent:#x} vs {received:#x}")
            }
            Self::Remote => write!(f, "RTR mismatch"),
            Self::Length { sent, received } => write!(f, "DLC mismatch: {sent} vs {received}"),
            Self::Payload {
                index,
                sent,
                received,
            } => write!(f, "Payload {index} mismatch: {sent:#04x} vs {received:#04x}"),
        }
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ext={} rtr={} dlc={} arb_id_a={:#x}",
            self.extended, self.remote, self.length, self.base_id
        )?;
        if self.extended {
            write!(f, " arb_id_b={:#x}", self.extension_id)?;
        }
        if !self.remote {
            write!(f, " payload=")?;
            for (i, byte) in self.payload.iter().enumerate() {
                let sep = if i == 0 { "[" } else { " " };
                write!(f, "{sep}{byte:02x}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::data_frame(id, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        let dlc = u8::try_from(dlc).ok()?;
        Self::remote_frame(id, dlc).ok()
    }

    fn is_extended(&self) -> bool {
        self.extended
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        if self.extended {
            let raw = (u32::from(self.base_id) << 18) | self.extension_id;
            // The field widths keep the ID in range for a 29-bit integer
            Id::Extended(unsafe { ExtendedId::new_unchecked(raw & ExtendedId::MAX.as_raw()) })
        } else {
            // The field width keeps the ID in range for a 11-bit integer
            Id::Standard(unsafe {
                StandardId::new_unchecked(self.base_id & StandardId::MAX.as_raw())
            })
        }
    }

    fn dlc(&self) -> usize {
        self.length.into()
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.payload[..usize::from(self.length).min(self.payload.len())]
        }
    }
}
