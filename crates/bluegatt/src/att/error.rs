//! Error handling for the ATT protocol
use super::constants::*;
use thiserror::Error;

/// ATT error codes as defined in the specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttErrorCode {
    /// No error
    NoError,
    /// Invalid handle
    InvalidHandle,
    /// Read not permitted
    ReadNotPermitted,
    /// Write not permitted
    WriteNotPermitted,
    /// Invalid PDU
    InvalidPdu,
    /// Insufficient authentication
    InsufficientAuthentication,
    /// Request not supported
    RequestNotSupported,
    /// Invalid offset
    InvalidOffset,
    /// Insufficient authorization
    InsufficientAuthorization,
    /// Prepare queue full
    PrepareQueueFull,
    /// Attribute not found
    AttributeNotFound,
    /// Attribute not long
    AttributeNotLong,
    /// Insufficient encryption key size
    InsufficientEncryptionKeySize,
    /// Invalid attribute value length
    InvalidAttributeValueLength,
    /// Unlikely error
    Unlikely,
    /// Insufficient encryption
    InsufficientEncryption,
    /// Unsupported group type
    UnsupportedGroupType,
    /// Insufficient resources
    InsufficientResources,
    /// Application error
    ApplicationError(u8),
    /// Unknown error code
    Unknown(u8),
}

impl From<u8> for AttErrorCode {
    fn from(code: u8) -> Self {
        match code {
            0 => AttErrorCode::NoError,
            ATT_ERROR_INVALID_HANDLE => AttErrorCode::InvalidHandle,
            ATT_ERROR_READ_NOT_PERMITTED => AttErrorCode::ReadNotPermitted,
            ATT_ERROR_WRITE_NOT_PERMITTED => AttErrorCode::WriteNotPermitted,
            ATT_ERROR_INVALID_PDU => AttErrorCode::InvalidPdu,
            ATT_ERROR_INSUFFICIENT_AUTHENTICATION => AttErrorCode::InsufficientAuthentication,
            ATT_ERROR_REQUEST_NOT_SUPPORTED => AttErrorCode::RequestNotSupported,
            ATT_ERROR_INVALID_OFFSET => AttErrorCode::InvalidOffset,
            ATT_ERROR_INSUFFICIENT_AUTHORIZATION => AttErrorCode::InsufficientAuthorization,
            ATT_ERROR_PREPARE_QUEUE_FULL => AttErrorCode::PrepareQueueFull,
            ATT_ERROR_ATTRIBUTE_NOT_FOUND => AttErrorCode::AttributeNotFound,
            ATT_ERROR_ATTRIBUTE_NOT_LONG => AttErrorCode::AttributeNotLong,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE => {
                AttErrorCode::InsufficientEncryptionKeySize
            }
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH => AttErrorCode::InvalidAttributeValueLength,
            ATT_ERROR_UNLIKELY => AttErrorCode::Unlikely,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION => AttErrorCode::InsufficientEncryption,
            ATT_ERROR_UNSUPPORTED_GROUP_TYPE => AttErrorCode::UnsupportedGroupType,
            ATT_ERROR_INSUFFICIENT_RESOURCES => AttErrorCode::InsufficientResources,
            c if (ATT_ERROR_APPLICATION_ERROR_START..=ATT_ERROR_APPLICATION_ERROR_END)
                .contains(&c) =>
            {
                AttErrorCode::ApplicationError(c)
            }
            _ => AttErrorCode::Unknown(code),
        }
    }
}

impl From<AttErrorCode> for u8 {
    fn from(code: AttErrorCode) -> u8 {
        match code {
            AttErrorCode::NoError => 0,
            AttErrorCode::InvalidHandle => ATT_ERROR_INVALID_HANDLE,
            AttErrorCode::ReadNotPermitted => ATT_ERROR_READ_NOT_PERMITTED,
            AttErrorCode::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            AttErrorCode::InvalidPdu => ATT_ERROR_INVALID_PDU,
            AttErrorCode::InsufficientAuthentication => ATT_ERROR_INSUFFICIENT_AUTHENTICATION,
            AttErrorCode::RequestNotSupported => ATT_ERROR_REQUEST_NOT_SUPPORTED,
            AttErrorCode::InvalidOffset => ATT_ERROR_INVALID_OFFSET,
            AttErrorCode::InsufficientAuthorization => ATT_ERROR_INSUFFICIENT_AUTHORIZATION,
            AttErrorCode::PrepareQueueFull => ATT_ERROR_PREPARE_QUEUE_FULL,
            AttErrorCode::AttributeNotFound => ATT_ERROR_ATTRIBUTE_NOT_FOUND,
            AttErrorCode::AttributeNotLong => ATT_ERROR_ATTRIBUTE_NOT_LONG,
            AttErrorCode::InsufficientEncryptionKeySize => {
                ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE
            }
            AttErrorCode::InvalidAttributeValueLength => ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH,
            AttErrorCode::Unlikely => ATT_ERROR_UNLIKELY,
            AttErrorCode::InsufficientEncryption => ATT_ERROR_INSUFFICIENT_ENCRYPTION,
            AttErrorCode::UnsupportedGroupType => ATT_ERROR_UNSUPPORTED_GROUP_TYPE,
            AttErrorCode::InsufficientResources => ATT_ERROR_INSUFFICIENT_RESOURCES,
            AttErrorCode::ApplicationError(code) => code,
            AttErrorCode::Unknown(code) => code,
        }
    }
}

/// ATT error type for local failures, mostly PDU parsing
#[derive(Debug, Error)]
pub enum AttError {
    #[error("invalid packet length")]
    InvalidPacketLength,

    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("malformed packet")]
    MalformedPacket,
}

impl AttError {
    /// Convert to the protocol error code reported in an Error Response
    pub fn to_error_code(&self) -> AttErrorCode {
        match self {
            AttError::InvalidPacketLength => AttErrorCode::InvalidPdu,
            AttError::InvalidOpcode(_) => AttErrorCode::RequestNotSupported,
            AttError::MalformedPacket => AttErrorCode::InvalidPdu,
        }
    }
}

/// ATT Result type
pub type AttResult<T> = Result<T, AttError>;
