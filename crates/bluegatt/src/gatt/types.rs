//! Declarative GATT service definitions
//!
//! These types describe a service the way an application hands it to the
//! [`LocalServiceManager`](super::LocalServiceManager); the manager turns
//! them into attribute database entries.
use crate::att::AccessRequirements;
use crate::uuid::Uuid;
use bitflags::bitflags;

/// Identifies services, characteristics, and descriptors within the local
/// GATT profile.
pub type IdType = u64;

// GATT declaration type UUIDs
pub const PRIMARY_SERVICE_TYPE: Uuid = Uuid::from_u16(0x2800);
pub const SECONDARY_SERVICE_TYPE: Uuid = Uuid::from_u16(0x2801);
pub const CHARACTERISTIC_DECLARATION_TYPE: Uuid = Uuid::from_u16(0x2803);

// Descriptor types the server manages itself; user services cannot declare
// them.
pub const CHARACTERISTIC_EXTENDED_PROPERTIES_TYPE: Uuid = Uuid::from_u16(0x2900);
pub const CLIENT_CHARACTERISTIC_CONFIG_TYPE: Uuid = Uuid::from_u16(0x2902);
pub const SERVER_CHARACTERISTIC_CONFIG_TYPE: Uuid = Uuid::from_u16(0x2903);

bitflags! {
    /// Characteristic properties bitfield of the characteristic declaration
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicProperties: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

/// A characteristic descriptor.
#[derive(Clone)]
pub struct Descriptor {
    pub id: IdType,
    pub uuid: Uuid,
    pub read_permissions: AccessRequirements,
    pub write_permissions: AccessRequirements,
}

impl Descriptor {
    pub fn new(
        id: IdType,
        uuid: Uuid,
        read_permissions: AccessRequirements,
        write_permissions: AccessRequirements,
    ) -> Self {
        Self {
            id,
            uuid,
            read_permissions,
            write_permissions,
        }
    }
}

/// A characteristic and its descriptors.
#[derive(Clone)]
pub struct Characteristic {
    pub id: IdType,
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    /// Extended properties bits, meaningful when
    /// [`CharacteristicProperties::EXTENDED_PROPERTIES`] is set.
    pub extended_properties: u16,
    pub read_permissions: AccessRequirements,
    pub write_permissions: AccessRequirements,
    /// Permissions required to configure notifications and indications.
    pub update_permissions: AccessRequirements,
    pub descriptors: Vec<Descriptor>,
}

impl Characteristic {
    pub fn new(
        id: IdType,
        uuid: Uuid,
        properties: CharacteristicProperties,
        read_permissions: AccessRequirements,
        write_permissions: AccessRequirements,
    ) -> Self {
        Self {
            id,
            uuid,
            properties,
            extended_properties: 0,
            read_permissions,
            write_permissions,
            update_permissions: AccessRequirements::default(),
            descriptors: Vec::new(),
        }
    }
}

/// A GATT service definition.
#[derive(Clone)]
pub struct Service {
    pub id: IdType,
    pub uuid: Uuid,
    pub primary: bool,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn new(id: IdType, uuid: Uuid, primary: bool) -> Self {
        Self {
            id,
            uuid,
            primary,
            characteristics: Vec::new(),
        }
    }
}
