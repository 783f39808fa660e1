//! GATT (Generic Attribute Profile) implementation
//!
//! This module provides the server role of GATT: request handlers for the
//! discovery and MTU procedures, and a local service manager that publishes
//! application services into the shared attribute database.

pub mod local_service_manager;
pub mod server;
pub mod types;

#[cfg(test)]
mod tests;

pub use local_service_manager::{LocalServiceManager, ServiceReadHandler, ServiceWriteHandler};
pub use server::GattServer;
pub use types::{
    Characteristic, CharacteristicProperties, Descriptor, IdType, Service,
    CHARACTERISTIC_DECLARATION_TYPE, PRIMARY_SERVICE_TYPE, SECONDARY_SERVICE_TYPE,
};
