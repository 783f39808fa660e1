//! Opcode classification and raw PDU access
//!
//! The bearer routes PDUs by method type before any per-opcode parsing
//! happens, so classification lives here as plain functions over the opcode
//! octet.
use super::constants::*;

/// ATT handle type
pub type Handle = u16;

/// The five PDU categories of the attribute protocol, plus `Invalid` for
/// the reserved opcode 0x00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodType {
    Command,
    Request,
    Response,
    Notification,
    Indication,
    Confirmation,
    Invalid,
}

/// Classifies an opcode octet.
///
/// The command flag wins over the table lookup, and unrecognized opcodes
/// without it count as requests so that the bearer answers them with
/// "Request Not Supported" instead of ignoring them.
pub fn method_type(opcode: u8) -> MethodType {
    if opcode & ATT_COMMAND_FLAG != 0 {
        return MethodType::Command;
    }

    match opcode {
        ATT_INVALID_OPCODE => MethodType::Invalid,
        ATT_EXCHANGE_MTU_REQ
        | ATT_FIND_INFO_REQ
        | ATT_FIND_BY_TYPE_VALUE_REQ
        | ATT_READ_BY_TYPE_REQ
        | ATT_READ_REQ
        | ATT_READ_BLOB_REQ
        | ATT_READ_MULTIPLE_REQ
        | ATT_READ_BY_GROUP_TYPE_REQ
        | ATT_WRITE_REQ
        | ATT_PREPARE_WRITE_REQ
        | ATT_EXECUTE_WRITE_REQ => MethodType::Request,
        ATT_ERROR_RSP
        | ATT_EXCHANGE_MTU_RSP
        | ATT_FIND_INFO_RSP
        | ATT_FIND_BY_TYPE_VALUE_RSP
        | ATT_READ_BY_TYPE_RSP
        | ATT_READ_RSP
        | ATT_READ_BLOB_RSP
        | ATT_READ_MULTIPLE_RSP
        | ATT_READ_BY_GROUP_TYPE_RSP
        | ATT_WRITE_RSP
        | ATT_PREPARE_WRITE_RSP
        | ATT_EXECUTE_WRITE_RSP => MethodType::Response,
        ATT_HANDLE_VALUE_NTF => MethodType::Notification,
        ATT_HANDLE_VALUE_IND => MethodType::Indication,
        ATT_HANDLE_VALUE_CONF => MethodType::Confirmation,
        _ => MethodType::Request,
    }
}

/// Maps a transaction-ending opcode to the opcode of the transaction it ends.
///
/// Returns [`ATT_INVALID_OPCODE`] for opcodes that never end a transaction.
/// The Error Response is excluded on purpose; it carries its target opcode in
/// the payload instead.
pub fn matching_transaction_opcode(end_opcode: u8) -> u8 {
    match end_opcode {
        ATT_EXCHANGE_MTU_RSP => ATT_EXCHANGE_MTU_REQ,
        ATT_FIND_INFO_RSP => ATT_FIND_INFO_REQ,
        ATT_FIND_BY_TYPE_VALUE_RSP => ATT_FIND_BY_TYPE_VALUE_REQ,
        ATT_READ_BY_TYPE_RSP => ATT_READ_BY_TYPE_REQ,
        ATT_READ_RSP => ATT_READ_REQ,
        ATT_READ_BLOB_RSP => ATT_READ_BLOB_REQ,
        ATT_READ_MULTIPLE_RSP => ATT_READ_MULTIPLE_REQ,
        ATT_READ_BY_GROUP_TYPE_RSP => ATT_READ_BY_GROUP_TYPE_REQ,
        ATT_WRITE_RSP => ATT_WRITE_REQ,
        ATT_PREPARE_WRITE_RSP => ATT_PREPARE_WRITE_REQ,
        ATT_EXECUTE_WRITE_RSP => ATT_EXECUTE_WRITE_REQ,
        ATT_HANDLE_VALUE_CONF => ATT_HANDLE_VALUE_IND,
        _ => ATT_INVALID_OPCODE,
    }
}

/// Borrowed view over a received PDU.
#[derive(Debug, Clone, Copy)]
pub struct PacketReader<'a> {
    pdu: &'a [u8],
}

impl<'a> PacketReader<'a> {
    /// Returns `None` for an empty buffer; a PDU always has an opcode octet.
    pub fn new(pdu: &'a [u8]) -> Option<PacketReader<'a>> {
        if pdu.is_empty() {
            None
        } else {
            Some(PacketReader { pdu })
        }
    }

    pub fn opcode(&self) -> u8 {
        self.pdu[0]
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.pdu[1..]
    }

    pub fn payload_len(&self) -> usize {
        self.pdu.len() - 1
    }

    /// The full PDU including the opcode octet.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.pdu
    }
}
