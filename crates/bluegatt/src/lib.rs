//! BlueGATT - the server side of the Bluetooth LE Attribute Protocol
//!
//! This library implements the transaction-oriented ATT bearer, the attribute
//! database with grouped handle allocation, and the GATT server procedures
//! built on top of them (MTU exchange, discovery queries, and a local service
//! manager for publishing GATT services). The link layer is abstracted behind
//! the [`att::Channel`] trait so the stack can sit on any L2CAP-like
//! fixed-channel transport.

pub mod att;
pub mod gatt;
pub mod uuid;

// Re-export common types for convenience
pub use att::{
    AttError, AttErrorCode, AttResult, Attribute, AttributeGrouping, Bearer, Channel, Database,
    Handle, TransactionError, TransactionId,
};
pub use gatt::{
    Characteristic, CharacteristicProperties, Descriptor, GattServer, LocalServiceManager, Service,
};
pub use uuid::Uuid;
