//! GATT server procedures
//!
//! Registers ATT request handlers on a bearer and serves them out of a
//! shared attribute database. The handlers only hold a weak reference to
//! the bearer, so dropping the bearer (and the server) tears everything
//! down without reference cycles.
use super::types::{PRIMARY_SERVICE_TYPE, SECONDARY_SERVICE_TYPE};
use crate::att::bearer::{Bearer, HandlerId, TransactionId, WeakBearer};
use crate::att::constants::*;
use crate::att::database::Database;
use crate::att::error::AttErrorCode;
use crate::att::pdu::{Handle, PacketReader};
use crate::att::types::{
    AttPacket, AttributeData, AttributeGroupData, ExchangeMtuRequest, ExchangeMtuResponse,
    FindInformationRequest, FindInformationResponse, ReadByGroupTypeRequest,
    ReadByGroupTypeResponse, ReadByTypeRequest, ReadByTypeResponse,
};
use log::warn;
use std::sync::{Arc, RwLock};

/// Serves the ATT server-role procedures over one bearer.
pub struct GattServer {
    att: Bearer,
    handler_ids: Vec<HandlerId>,
}

impl GattServer {
    pub fn new(db: Arc<RwLock<Database>>, att: Bearer) -> Self {
        let mut handler_ids = Vec::new();

        let weak = att.downgrade();
        handler_ids.extend(att.register_handler(ATT_EXCHANGE_MTU_REQ, move |id, packet| {
            Self::on_exchange_mtu(&weak, id, packet);
        }));

        let weak = att.downgrade();
        let db_clone = db.clone();
        handler_ids.extend(att.register_handler(ATT_FIND_INFO_REQ, move |id, packet| {
            Self::on_find_information(&weak, &db_clone, id, packet);
        }));

        let weak = att.downgrade();
        let db_clone = db.clone();
        handler_ids.extend(
            att.register_handler(ATT_READ_BY_GROUP_TYPE_REQ, move |id, packet| {
                Self::on_read_by_group_type(&weak, &db_clone, id, packet);
            }),
        );

        let weak = att.downgrade();
        let db_clone = db;
        handler_ids.extend(att.register_handler(ATT_READ_BY_TYPE_REQ, move |id, packet| {
            Self::on_read_by_type(&weak, &db_clone, id, packet);
        }));

        if handler_ids.len() != 4 {
            warn!("gatt: not all server handlers could be registered");
        }

        GattServer { att, handler_ids }
    }

    fn on_exchange_mtu(att: &WeakBearer, id: TransactionId, packet: &PacketReader<'_>) {
        let Some(att) = att.upgrade() else {
            return;
        };

        let request = match ExchangeMtuRequest::parse(packet.as_bytes()) {
            Ok(request) => request,
            Err(_) => {
                att.reply_with_error(id, ATT_HANDLE_INVALID, AttErrorCode::InvalidPdu);
                return;
            }
        };

        let server_mtu = att.preferred_mtu();
        att.reply(
            id,
            ExchangeMtuResponse {
                server_rx_mtu: server_mtu,
            }
            .serialize(),
        );

        // Adopt the negotiated MTU after the reply; the response itself is
        // still bound by the pre-negotiation MTU.
        att.set_mtu(att.min_mtu().max(request.client_rx_mtu.min(server_mtu)));
    }

    fn on_find_information(
        att: &WeakBearer,
        db: &Arc<RwLock<Database>>,
        id: TransactionId,
        packet: &PacketReader<'_>,
    ) {
        let Some(att) = att.upgrade() else {
            return;
        };

        let request = match FindInformationRequest::parse(packet.as_bytes()) {
            Ok(request) => request,
            Err(_) => {
                att.reply_with_error(id, ATT_HANDLE_INVALID, AttErrorCode::InvalidPdu);
                return;
            }
        };

        // Payload budget after the opcode and format octets.
        let max_payload_size = att.mtu() - 2;
        let results = match db.read().unwrap().find_information(
            request.start_handle,
            request.end_handle,
            max_payload_size,
        ) {
            Ok(results) => results,
            Err(code) => {
                att.reply_with_error(id, request.start_handle, code);
                return;
            }
        };

        let format = if results[0].1.compact_size(false) == 2 {
            ATT_FIND_INFO_RSP_FORMAT_16BIT
        } else {
            ATT_FIND_INFO_RSP_FORMAT_128BIT
        };
        att.reply(
            id,
            FindInformationResponse {
                format,
                information_data: results,
            }
            .serialize(),
        );
    }

    fn on_read_by_group_type(
        att: &WeakBearer,
        db: &Arc<RwLock<Database>>,
        id: TransactionId,
        packet: &PacketReader<'_>,
    ) {
        let Some(att) = att.upgrade() else {
            return;
        };

        let request = match ReadByGroupTypeRequest::parse(packet.as_bytes()) {
            Ok(request) => request,
            Err(_) => {
                att.reply_with_error(id, ATT_HANDLE_INVALID, AttErrorCode::InvalidPdu);
                return;
            }
        };

        // Only service groupings can be discovered this way.
        if request.group_type != PRIMARY_SERVICE_TYPE && request.group_type != SECONDARY_SERVICE_TYPE
        {
            att.reply_with_error(
                id,
                request.start_handle,
                AttErrorCode::UnsupportedGroupType,
            );
            return;
        }

        let mtu = att.mtu() as usize;
        let results = match db.read().unwrap().read_by_group_type(
            request.start_handle,
            request.end_handle,
            &request.group_type,
            (mtu - 2) as u16,
        ) {
            Ok(results) => results,
            Err(code) => {
                att.reply_with_error(id, request.start_handle, code);
                return;
            }
        };

        // All entries share the size of the first declaration value. A sole
        // entry is additionally truncated to what the PDU can carry.
        let mut value_size = results[0]
            .decl_value
            .len()
            .min(ATT_MAX_READ_BY_GROUP_TYPE_VALUE_LENGTH);
        if results.len() == 1 {
            value_size = value_size.min(mtu - 6);
        }

        let attribute_data = results
            .into_iter()
            .map(|grouping| {
                let end = value_size.min(grouping.decl_value.len());
                AttributeGroupData {
                    start_handle: grouping.start_handle,
                    group_end_handle: grouping.end_handle,
                    value: grouping.decl_value[..end].to_vec(),
                }
            })
            .collect();

        att.reply(
            id,
            ReadByGroupTypeResponse {
                length: (value_size + 4) as u8,
                attribute_data,
            }
            .serialize(),
        );
    }

    fn on_read_by_type(
        att: &WeakBearer,
        db: &Arc<RwLock<Database>>,
        id: TransactionId,
        packet: &PacketReader<'_>,
    ) {
        let Some(att) = att.upgrade() else {
            return;
        };

        let request = match ReadByTypeRequest::parse(packet.as_bytes()) {
            Ok(request) => request,
            Err(_) => {
                att.reply_with_error(id, ATT_HANDLE_INVALID, AttErrorCode::InvalidPdu);
                return;
            }
        };

        let mtu = att.mtu() as usize;
        let results = match db.read().unwrap().read_by_type(
            request.start_handle,
            request.end_handle,
            &request.attribute_type,
            (mtu - 2) as u16,
        ) {
            Ok(results) => results,
            Err(code) => {
                att.reply_with_error(id, request.start_handle, code);
                return;
            }
        };

        // A dynamic value is always the sole result and is read from its
        // handler; the reply happens from the read callback.
        if results.len() == 1 && results[0].value.is_none() {
            Self::read_dynamic(&att, db, id, results[0].handle);
            return;
        }

        let mut value_size = results[0]
            .value
            .as_ref()
            .map(Vec::len)
            .unwrap_or_default()
            .min(ATT_MAX_READ_BY_TYPE_VALUE_LENGTH);
        if results.len() == 1 {
            value_size = value_size.min(mtu - 4);
        }

        let attribute_data = results
            .into_iter()
            .map(|result| {
                let value = result.value.unwrap_or_default();
                let end = value_size.min(value.len());
                AttributeData {
                    handle: result.handle,
                    value: value[..end].to_vec(),
                }
            })
            .collect();

        att.reply(
            id,
            ReadByTypeResponse {
                length: (value_size + 2) as u8,
                attribute_data,
            }
            .serialize(),
        );
    }

    fn read_dynamic(
        att: &Bearer,
        db: &Arc<RwLock<Database>>,
        id: TransactionId,
        handle: Handle,
    ) {
        let weak = att.downgrade();
        let callback = Box::new(move |code: AttErrorCode, value: &[u8]| {
            let Some(att) = weak.upgrade() else {
                return;
            };
            if code != AttErrorCode::NoError {
                att.reply_with_error(id, handle, code);
                return;
            }

            let value_size = value
                .len()
                .min(att.mtu() as usize - 4)
                .min(ATT_MAX_READ_BY_TYPE_VALUE_LENGTH);
            att.reply(
                id,
                ReadByTypeResponse {
                    length: (value_size + 2) as u8,
                    attribute_data: vec![AttributeData {
                        handle,
                        value: value[..value_size].to_vec(),
                    }],
                }
                .serialize(),
            );
        });

        let db = db.read().unwrap();
        match db.attribute(handle) {
            Some(attr) => {
                if !attr.read_async(0, callback) {
                    att.reply_with_error(id, handle, AttErrorCode::ReadNotPermitted);
                }
            }
            None => {
                att.reply_with_error(id, handle, AttErrorCode::Unlikely);
            }
        }
    }
}

impl Drop for GattServer {
    fn drop(&mut self) {
        for id in self.handler_ids.drain(..) {
            self.att.unregister_handler(id);
        }
    }
}
