//! Attribute Protocol (ATT) implementation
//!
//! This module provides the server side of the ATT protocol: the transaction
//! bearer that enforces sequencing on a link, the attribute database that
//! owns handles and serves range queries, and the typed PDU definitions
//! shared by both.

pub mod attribute;
pub mod bearer;
pub mod constants;
pub mod database;
pub mod error;
pub mod pdu;
pub mod types;

// Re-export the public API
pub use self::attribute::{
    AccessRequirements, Attribute, AttributeGrouping, ReadHandler, ReadResultCallback,
    WriteHandler, WriteResultCallback,
};
pub use self::bearer::{
    Bearer, Channel, ClosedCallback, ErrorCallback, Handler, HandlerId, TransactionCallback,
    TransactionError, TransactionId, WeakBearer, INVALID_TRANSACTION_ID,
};
pub use self::constants::*;
pub use self::database::{AttributeResult, Database, GroupingInfo};
pub use self::error::{AttError, AttErrorCode, AttResult};
pub use self::pdu::{matching_transaction_opcode, method_type, Handle, MethodType, PacketReader};
pub use self::types::*;
