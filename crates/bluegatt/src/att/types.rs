//! Typed PDU definitions for the ATT protocol
use super::constants::*;
use super::error::{AttError, AttErrorCode, AttResult};
use super::pdu::Handle;
use crate::uuid::Uuid;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// ATT packet formats
pub trait AttPacket: Sized {
    /// Opcode for this packet
    fn opcode() -> u8;

    /// Parse packet from bytes
    fn parse(data: &[u8]) -> AttResult<Self>;

    /// Serialize packet to bytes
    fn serialize(&self) -> Vec<u8>;
}

fn check_opcode<T: AttPacket>(data: &[u8]) -> AttResult<()> {
    if data.is_empty() {
        return Err(AttError::InvalidPacketLength);
    }
    if data[0] != T::opcode() {
        return Err(AttError::InvalidOpcode(data[0]));
    }
    Ok(())
}

/// Error response packet
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    /// Request opcode in error
    pub request_opcode: u8,
    /// Attribute handle in error
    pub handle: Handle,
    /// Error code
    pub error_code: AttErrorCode,
}

impl AttPacket for ErrorResponse {
    fn opcode() -> u8 {
        ATT_ERROR_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() != 5 {
            return Err(AttError::InvalidPacketLength);
        }

        let request_opcode = data[1];
        let mut cursor = Cursor::new(&data[2..4]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::MalformedPacket)?;
        let error_code = data[4].into();

        Ok(Self {
            request_opcode,
            handle,
            error_code,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);
        packet.push(Self::opcode());
        packet.push(self.request_opcode);
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.push(self.error_code.into());
        packet
    }
}

/// Exchange MTU request packet
#[derive(Debug, Clone)]
pub struct ExchangeMtuRequest {
    /// Client receive MTU
    pub client_rx_mtu: u16,
}

impl AttPacket for ExchangeMtuRequest {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() != 3 {
            return Err(AttError::InvalidPacketLength);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let client_rx_mtu = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::MalformedPacket)?;

        Ok(Self { client_rx_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.client_rx_mtu.to_le_bytes());
        packet
    }
}

/// Exchange MTU response packet
#[derive(Debug, Clone)]
pub struct ExchangeMtuResponse {
    /// Server receive MTU
    pub server_rx_mtu: u16,
}

impl AttPacket for ExchangeMtuResponse {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() != 3 {
            return Err(AttError::InvalidPacketLength);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let server_rx_mtu = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::MalformedPacket)?;

        Ok(Self { server_rx_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.server_rx_mtu.to_le_bytes());
        packet
    }
}

/// Find Information request packet
#[derive(Debug, Clone)]
pub struct FindInformationRequest {
    /// First requested handle
    pub start_handle: Handle,
    /// Last requested handle
    pub end_handle: Handle,
}

impl AttPacket for FindInformationRequest {
    fn opcode() -> u8 {
        ATT_FIND_INFO_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() != 5 {
            return Err(AttError::InvalidPacketLength);
        }

        let mut cursor = Cursor::new(&data[1..]);
        let start_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::MalformedPacket)?;
        let end_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::MalformedPacket)?;

        Ok(Self {
            start_handle,
            end_handle,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.start_handle.to_le_bytes());
        packet.extend_from_slice(&self.end_handle.to_le_bytes());
        packet
    }
}

/// Find Information response packet.
///
/// All entries share one UUID width selected by `format`.
#[derive(Debug, Clone)]
pub struct FindInformationResponse {
    /// Entry format, [`ATT_FIND_INFO_RSP_FORMAT_16BIT`] or
    /// [`ATT_FIND_INFO_RSP_FORMAT_128BIT`]
    pub format: u8,
    /// Handle and type of each matched attribute
    pub information_data: Vec<(Handle, Uuid)>,
}

impl AttPacket for FindInformationResponse {
    fn opcode() -> u8 {
        ATT_FIND_INFO_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() < 2 {
            return Err(AttError::InvalidPacketLength);
        }

        let format = data[1];
        let uuid_size = match format {
            ATT_FIND_INFO_RSP_FORMAT_16BIT => 2,
            ATT_FIND_INFO_RSP_FORMAT_128BIT => 16,
            _ => return Err(AttError::MalformedPacket),
        };

        let entries = &data[2..];
        let entry_size = 2 + uuid_size;
        if entries.is_empty() || entries.len() % entry_size != 0 {
            return Err(AttError::InvalidPacketLength);
        }

        let mut information_data = Vec::with_capacity(entries.len() / entry_size);
        for chunk in entries.chunks_exact(entry_size) {
            let handle = u16::from_le_bytes([chunk[0], chunk[1]]);
            let uuid = Uuid::try_from_slice_le(&chunk[2..]).ok_or(AttError::MalformedPacket)?;
            information_data.push((handle, uuid));
        }

        Ok(Self {
            format,
            information_data,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let uuid_size = if self.format == ATT_FIND_INFO_RSP_FORMAT_16BIT {
            2
        } else {
            16
        };

        let mut packet = Vec::with_capacity(2 + self.information_data.len() * (2 + uuid_size));
        packet.push(Self::opcode());
        packet.push(self.format);
        for (handle, uuid) in &self.information_data {
            packet.extend_from_slice(&handle.to_le_bytes());
            if uuid_size == 2 {
                // The database guarantees a uniform compact width per response.
                packet.extend_from_slice(&uuid.to_compact_bytes(false));
            } else {
                packet.extend_from_slice(uuid.as_bytes_le());
            }
        }
        packet
    }
}

/// Read By Type request packet
#[derive(Debug, Clone)]
pub struct ReadByTypeRequest {
    /// First requested handle
    pub start_handle: Handle,
    /// Last requested handle
    pub end_handle: Handle,
    /// Requested attribute type
    pub attribute_type: Uuid,
}

impl AttPacket for ReadByTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        // The type is either a 16-bit or a 128-bit UUID.
        if data.len() != 7 && data.len() != 21 {
            return Err(AttError::InvalidPacketLength);
        }

        let mut cursor = Cursor::new(&data[1..5]);
        let start_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::MalformedPacket)?;
        let end_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::MalformedPacket)?;
        let attribute_type =
            Uuid::try_from_slice_le(&data[5..]).ok_or(AttError::MalformedPacket)?;

        Ok(Self {
            start_handle,
            end_handle,
            attribute_type,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(7);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.start_handle.to_le_bytes());
        packet.extend_from_slice(&self.end_handle.to_le_bytes());
        packet.extend_from_slice(&self.attribute_type.to_compact_bytes(false));
        packet
    }
}

/// One handle-value entry of a Read By Type response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeData {
    pub handle: Handle,
    pub value: Vec<u8>,
}

/// Read By Type response packet.
///
/// `length` is the size of each entry including its 2-octet handle; every
/// value in `attribute_data` must be `length - 2` octets.
#[derive(Debug, Clone)]
pub struct ReadByTypeResponse {
    pub length: u8,
    pub attribute_data: Vec<AttributeData>,
}

impl AttPacket for ReadByTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() < 2 {
            return Err(AttError::InvalidPacketLength);
        }

        let length = data[1] as usize;
        let entries = &data[2..];
        if length < 2 || entries.is_empty() || entries.len() % length != 0 {
            return Err(AttError::InvalidPacketLength);
        }

        let mut attribute_data = Vec::with_capacity(entries.len() / length);
        for chunk in entries.chunks_exact(length) {
            attribute_data.push(AttributeData {
                handle: u16::from_le_bytes([chunk[0], chunk[1]]),
                value: chunk[2..].to_vec(),
            });
        }

        Ok(Self {
            length: length as u8,
            attribute_data,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(2 + self.attribute_data.len() * self.length as usize);
        packet.push(Self::opcode());
        packet.push(self.length);
        for entry in &self.attribute_data {
            packet.extend_from_slice(&entry.handle.to_le_bytes());
            packet.extend_from_slice(&entry.value);
        }
        packet
    }
}

/// Read By Group Type request packet
#[derive(Debug, Clone)]
pub struct ReadByGroupTypeRequest {
    /// First requested handle
    pub start_handle: Handle,
    /// Last requested handle
    pub end_handle: Handle,
    /// Requested grouping type
    pub group_type: Uuid,
}

impl AttPacket for ReadByGroupTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() != 7 && data.len() != 21 {
            return Err(AttError::InvalidPacketLength);
        }

        let mut cursor = Cursor::new(&data[1..5]);
        let start_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::MalformedPacket)?;
        let end_handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::MalformedPacket)?;
        let group_type = Uuid::try_from_slice_le(&data[5..]).ok_or(AttError::MalformedPacket)?;

        Ok(Self {
            start_handle,
            end_handle,
            group_type,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(7);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.start_handle.to_le_bytes());
        packet.extend_from_slice(&self.end_handle.to_le_bytes());
        packet.extend_from_slice(&self.group_type.to_compact_bytes(false));
        packet
    }
}

/// One entry of a Read By Group Type response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeGroupData {
    pub start_handle: Handle,
    pub group_end_handle: Handle,
    pub value: Vec<u8>,
}

/// Read By Group Type response packet.
///
/// `length` includes the 4 octets of the handle pair.
#[derive(Debug, Clone)]
pub struct ReadByGroupTypeResponse {
    pub length: u8,
    pub attribute_data: Vec<AttributeGroupData>,
}

impl AttPacket for ReadByGroupTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() < 2 {
            return Err(AttError::InvalidPacketLength);
        }

        let length = data[1] as usize;
        let entries = &data[2..];
        if length < 4 || entries.is_empty() || entries.len() % length != 0 {
            return Err(AttError::InvalidPacketLength);
        }

        let mut attribute_data = Vec::with_capacity(entries.len() / length);
        for chunk in entries.chunks_exact(length) {
            attribute_data.push(AttributeGroupData {
                start_handle: u16::from_le_bytes([chunk[0], chunk[1]]),
                group_end_handle: u16::from_le_bytes([chunk[2], chunk[3]]),
                value: chunk[4..].to_vec(),
            });
        }

        Ok(Self {
            length: length as u8,
            attribute_data,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(2 + self.attribute_data.len() * self.length as usize);
        packet.push(Self::opcode());
        packet.push(self.length);
        for entry in &self.attribute_data {
            packet.extend_from_slice(&entry.start_handle.to_le_bytes());
            packet.extend_from_slice(&entry.group_end_handle.to_le_bytes());
            packet.extend_from_slice(&entry.value);
        }
        packet
    }
}

/// Read request packet
#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub handle: Handle,
}

impl AttPacket for ReadRequest {
    fn opcode() -> u8 {
        ATT_READ_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() != 3 {
            return Err(AttError::InvalidPacketLength);
        }

        let handle = u16::from_le_bytes([data[1], data[2]]);
        Ok(Self { handle })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet
    }
}

/// Read response packet
#[derive(Debug, Clone)]
pub struct ReadResponse {
    pub value: Vec<u8>,
}

impl AttPacket for ReadResponse {
    fn opcode() -> u8 {
        ATT_READ_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        Ok(Self {
            value: data[1..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Write request packet
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub handle: Handle,
    pub value: Vec<u8>,
}

impl AttPacket for WriteRequest {
    fn opcode() -> u8 {
        ATT_WRITE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() < 3 {
            return Err(AttError::InvalidPacketLength);
        }

        Ok(Self {
            handle: u16::from_le_bytes([data[1], data[2]]),
            value: data[3..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Write response packet
#[derive(Debug, Clone)]
pub struct WriteResponse;

impl AttPacket for WriteResponse {
    fn opcode() -> u8 {
        ATT_WRITE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() != 1 {
            return Err(AttError::InvalidPacketLength);
        }
        Ok(Self)
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode()]
    }
}

/// Write command packet (no response)
#[derive(Debug, Clone)]
pub struct WriteCommand {
    pub handle: Handle,
    pub value: Vec<u8>,
}

impl AttPacket for WriteCommand {
    fn opcode() -> u8 {
        ATT_WRITE_CMD
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() < 3 {
            return Err(AttError::InvalidPacketLength);
        }

        Ok(Self {
            handle: u16::from_le_bytes([data[1], data[2]]),
            value: data[3..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Handle Value notification packet
#[derive(Debug, Clone)]
pub struct HandleValueNotification {
    pub handle: Handle,
    pub value: Vec<u8>,
}

impl AttPacket for HandleValueNotification {
    fn opcode() -> u8 {
        ATT_HANDLE_VALUE_NTF
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() < 3 {
            return Err(AttError::InvalidPacketLength);
        }

        Ok(Self {
            handle: u16::from_le_bytes([data[1], data[2]]),
            value: data[3..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Handle Value indication packet
#[derive(Debug, Clone)]
pub struct HandleValueIndication {
    pub handle: Handle,
    pub value: Vec<u8>,
}

impl AttPacket for HandleValueIndication {
    fn opcode() -> u8 {
        ATT_HANDLE_VALUE_IND
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() < 3 {
            return Err(AttError::InvalidPacketLength);
        }

        Ok(Self {
            handle: u16::from_le_bytes([data[1], data[2]]),
            value: data[3..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Handle Value confirmation packet
#[derive(Debug, Clone)]
pub struct HandleValueConfirmation;

impl AttPacket for HandleValueConfirmation {
    fn opcode() -> u8 {
        ATT_HANDLE_VALUE_CONF
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        check_opcode::<Self>(data)?;
        if data.len() != 1 {
            return Err(AttError::InvalidPacketLength);
        }
        Ok(Self)
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response() {
        let rsp = ErrorResponse {
            request_opcode: ATT_READ_REQ,
            handle: 0x0203,
            error_code: AttErrorCode::ReadNotPermitted,
        };
        let bytes = rsp.serialize();
        assert_eq!(bytes, vec![0x01, 0x0A, 0x03, 0x02, 0x02]);

        let parsed = ErrorResponse::parse(&bytes).unwrap();
        assert_eq!(parsed.request_opcode, ATT_READ_REQ);
        assert_eq!(parsed.handle, 0x0203);
        assert_eq!(parsed.error_code, AttErrorCode::ReadNotPermitted);

        assert!(ErrorResponse::parse(&[0x01, 0x0A, 0x03, 0x02]).is_err());
    }

    #[test]
    fn exchange_mtu() {
        let req = ExchangeMtuRequest { client_rx_mtu: 517 };
        let parsed = ExchangeMtuRequest::parse(&req.serialize()).unwrap();
        assert_eq!(parsed.client_rx_mtu, 517);

        assert!(ExchangeMtuRequest::parse(&[0x02, 0x17]).is_err());
        assert!(ExchangeMtuRequest::parse(&[0x03, 0x17, 0x00]).is_err());
    }

    #[test]
    fn read_by_type_request_sizes() {
        let short = ReadByTypeRequest {
            start_handle: 1,
            end_handle: 0xFFFF,
            attribute_type: Uuid::from_u16(0x2803),
        };
        assert_eq!(short.serialize().len(), 7);

        let long = ReadByTypeRequest {
            start_handle: 1,
            end_handle: 0xFFFF,
            attribute_type: Uuid::from_bytes_le([0xAB; 16]),
        };
        let bytes = long.serialize();
        assert_eq!(bytes.len(), 21);
        let parsed = ReadByTypeRequest::parse(&bytes).unwrap();
        assert_eq!(parsed.attribute_type, Uuid::from_bytes_le([0xAB; 16]));

        // A 4-octet (32-bit) type is not a valid request size.
        assert!(ReadByTypeRequest::parse(&[0x08, 1, 0, 0xFF, 0xFF, 1, 2, 3, 4]).is_err());
    }

    #[test]
    fn find_information_response_formats() {
        let rsp = FindInformationResponse {
            format: ATT_FIND_INFO_RSP_FORMAT_16BIT,
            information_data: vec![(1, Uuid::from_u16(0x2800)), (2, Uuid::from_u16(0xBEEF))],
        };
        let bytes = rsp.serialize();
        assert_eq!(
            bytes,
            vec![0x05, 0x01, 0x01, 0x00, 0x00, 0x28, 0x02, 0x00, 0xEF, 0xBE]
        );

        let parsed = FindInformationResponse::parse(&bytes).unwrap();
        assert_eq!(parsed.information_data.len(), 2);
        assert_eq!(parsed.information_data[1], (2, Uuid::from_u16(0xBEEF)));

        // Truncated entry list.
        assert!(FindInformationResponse::parse(&[0x05, 0x01, 0x01, 0x00, 0x00]).is_err());
        // Bad format octet.
        assert!(FindInformationResponse::parse(&[0x05, 0x03, 0x01, 0x00, 0x00, 0x28]).is_err());
    }

    #[test]
    fn read_by_group_type_response() {
        let rsp = ReadByGroupTypeResponse {
            length: 6,
            attribute_data: vec![AttributeGroupData {
                start_handle: 1,
                group_end_handle: 3,
                value: vec![0x0A, 0x18],
            }],
        };
        let bytes = rsp.serialize();
        assert_eq!(bytes, vec![0x11, 6, 0x01, 0x00, 0x03, 0x00, 0x0A, 0x18]);

        let parsed = ReadByGroupTypeResponse::parse(&bytes).unwrap();
        assert_eq!(parsed.attribute_data[0].group_end_handle, 3);
        assert_eq!(parsed.attribute_data[0].value, vec![0x0A, 0x18]);
    }

    #[test]
    fn read_by_type_response() {
        let rsp = ReadByTypeResponse {
            length: 4,
            attribute_data: vec![
                AttributeData {
                    handle: 2,
                    value: vec![0xAA, 0xBB],
                },
                AttributeData {
                    handle: 5,
                    value: vec![0xCC, 0xDD],
                },
            ],
        };
        let parsed = ReadByTypeResponse::parse(&rsp.serialize()).unwrap();
        assert_eq!(parsed.attribute_data.len(), 2);
        assert_eq!(parsed.attribute_data[1].value, vec![0xCC, 0xDD]);
    }
}
