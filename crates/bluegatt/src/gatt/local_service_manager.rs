//! Local GATT service registry
//!
//! Owns the attribute database and maps registered application services onto
//! attribute groupings. Reads and writes that land on service attributes are
//! bridged to the per-service handlers with the characteristic properties
//! enforced first.
use super::types::{
    Characteristic, CharacteristicProperties, Descriptor, IdType, Service,
    CHARACTERISTIC_DECLARATION_TYPE, CHARACTERISTIC_EXTENDED_PROPERTIES_TYPE,
    CLIENT_CHARACTERISTIC_CONFIG_TYPE, PRIMARY_SERVICE_TYPE, SECONDARY_SERVICE_TYPE,
    SERVER_CHARACTERISTIC_CONFIG_TYPE,
};
use crate::att::attribute::{AccessRequirements, AttributeGrouping};
use crate::att::constants::{ATT_HANDLE_MAX, ATT_HANDLE_MIN};
use crate::att::database::Database;
use crate::att::error::AttErrorCode;
use crate::att::pdu::Handle;
use crate::att::{ReadResultCallback, WriteResultCallback};
use log::warn;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock, Weak};

/// Serves reads on a registered service. Arguments: service id,
/// characteristic or descriptor id, value offset, result callback.
pub type ServiceReadHandler = Arc<dyn Fn(IdType, IdType, u16, ReadResultCallback) + Send + Sync>;

/// Serves writes on a registered service. Arguments: service id,
/// characteristic or descriptor id, value offset, value, result callback
/// (absent for writes without response).
pub type ServiceWriteHandler =
    Arc<dyn Fn(IdType, IdType, u16, &[u8], Option<WriteResultCallback>) + Send + Sync>;

/// One registered service. Attribute closures hold this weakly; once the
/// service is unregistered they fail accesses with `Unlikely`.
struct ServiceData {
    id: IdType,
    start_handle: Handle,
    read_handler: ServiceReadHandler,
    write_handler: ServiceWriteHandler,
}

struct Registry {
    services: HashMap<IdType, Arc<ServiceData>>,
    next_service_id: IdType,
}

/// Registry of local GATT services over a shared attribute database.
pub struct LocalServiceManager {
    db: Arc<RwLock<Database>>,
    registry: Mutex<Registry>,
}

impl LocalServiceManager {
    pub fn new() -> Self {
        Self {
            db: Arc::new(RwLock::new(Database::new(ATT_HANDLE_MIN, ATT_HANDLE_MAX))),
            registry: Mutex::new(Registry {
                services: HashMap::new(),
                next_service_id: 1,
            }),
        }
    }

    /// The database to hand to [`GattServer`](super::GattServer).
    pub fn database(&self) -> Arc<RwLock<Database>> {
        self.db.clone()
    }

    /// Publishes `service`. Returns the assigned service id, or `None` when
    /// the definition is invalid or the database has no room.
    pub fn register_service(
        &self,
        service: Service,
        read_handler: ServiceReadHandler,
        write_handler: ServiceWriteHandler,
    ) -> Option<IdType> {
        let attr_count = validate_service(&service)?;

        let group_type = if service.primary {
            PRIMARY_SERVICE_TYPE
        } else {
            SECONDARY_SERVICE_TYPE
        };
        let decl_value = service.uuid.to_compact_bytes(false);

        let mut registry = self.registry.lock().unwrap();
        let id = registry.next_service_id;

        {
            let mut db = self.db.write().unwrap();
            let Some(grouping) = db.new_grouping(group_type, attr_count, &decl_value) else {
                warn!("gatt: out of attribute handles for service {}", service.id);
                return None;
            };

            let service_data = Arc::new(ServiceData {
                id,
                start_handle: grouping.start_handle(),
                read_handler,
                write_handler,
            });
            populate_grouping(&service_data, grouping, service);
            debug_assert!(grouping.complete());
            grouping.set_active(true);

            registry.services.insert(id, service_data);
        }

        registry.next_service_id += 1;
        Some(id)
    }

    /// Removes a registered service and frees its handles.
    pub fn unregister_service(&self, id: IdType) -> bool {
        let mut registry = self.registry.lock().unwrap();
        let Some(service) = registry.services.remove(&id) else {
            return false;
        };

        let removed = self
            .db
            .write()
            .unwrap()
            .remove_grouping(service.start_handle);
        debug_assert!(removed);
        true
    }
}

impl Default for LocalServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks the service definition and returns the number of attributes its
/// grouping needs beyond the service declaration.
fn validate_service(service: &Service) -> Option<usize> {
    let mut ids = HashSet::new();
    let mut attr_count = 0usize;

    for chrc in &service.characteristics {
        if !ids.insert(chrc.id) {
            warn!("gatt: service has duplicate characteristic id {}", chrc.id);
            return None;
        }
        // Declaration plus value attribute.
        attr_count += 2;

        for desc in &chrc.descriptors {
            if !ids.insert(desc.id) {
                warn!("gatt: service has duplicate descriptor id {}", desc.id);
                return None;
            }
            if desc.uuid == CHARACTERISTIC_EXTENDED_PROPERTIES_TYPE
                || desc.uuid == CLIENT_CHARACTERISTIC_CONFIG_TYPE
                || desc.uuid == SERVER_CHARACTERISTIC_CONFIG_TYPE
            {
                warn!("gatt: service declares a reserved descriptor type");
                return None;
            }
            attr_count += 1;
        }
    }

    Some(attr_count)
}

fn populate_grouping(
    service_data: &Arc<ServiceData>,
    grouping: &mut AttributeGrouping,
    service: Service,
) {
    // Characteristics with a shorter compact UUID sort first so 16-bit types
    // batch together in Read By Type responses.
    let mut characteristics = service.characteristics;
    characteristics.sort_by_key(|chrc| chrc.uuid.compact_size(false));

    for mut chrc in characteristics {
        chrc.descriptors
            .sort_by_key(|desc| desc.uuid.compact_size(false));
        insert_characteristic(service_data, grouping, chrc);
    }
}

fn insert_characteristic(
    service_data: &Arc<ServiceData>,
    grouping: &mut AttributeGrouping,
    chrc: Characteristic,
) {
    // The declaration value points at the value attribute, which follows it
    // immediately.
    let value_handle = grouping.start_handle() + grouping.attributes().len() as Handle + 1;
    let mut decl_value = Vec::with_capacity(3 + 16);
    decl_value.push(chrc.properties.bits());
    decl_value.extend_from_slice(&value_handle.to_le_bytes());
    decl_value.extend_from_slice(&chrc.uuid.to_compact_bytes(false));

    grouping
        .add_attribute(
            CHARACTERISTIC_DECLARATION_TYPE,
            AccessRequirements::allowed(),
            AccessRequirements::disallowed(),
        )
        .expect("grouping sized for all service attributes")
        .set_value(&decl_value);

    let value_attr = grouping
        .add_attribute(chrc.uuid, chrc.read_permissions, chrc.write_permissions)
        .expect("grouping sized for all service attributes");

    let owner = Arc::downgrade(service_data);
    let chrc_id = chrc.id;
    let properties = chrc.properties;
    value_attr.set_read_handler(Arc::new(move |_handle, offset, result_callback| {
        let Some(service) = owner.upgrade() else {
            result_callback(AttErrorCode::Unlikely, &[]);
            return;
        };
        if !properties.contains(CharacteristicProperties::READ) {
            result_callback(AttErrorCode::ReadNotPermitted, &[]);
            return;
        }
        (service.read_handler)(service.id, chrc_id, offset, result_callback);
    }));

    let owner = Arc::downgrade(service_data);
    value_attr.set_write_handler(Arc::new(move |_handle, offset, value, result_callback| {
        let Some(service) = owner.upgrade() else {
            if let Some(callback) = result_callback {
                callback(AttErrorCode::Unlikely);
            }
            return;
        };

        let with_response = result_callback.is_some();
        if with_response && !properties.contains(CharacteristicProperties::WRITE) {
            if let Some(callback) = result_callback {
                callback(AttErrorCode::WriteNotPermitted);
            }
            return;
        }
        if !with_response && !properties.contains(CharacteristicProperties::WRITE_WITHOUT_RESPONSE)
        {
            return;
        }

        (service.write_handler)(service.id, chrc_id, offset, value, result_callback);
    }));

    for desc in chrc.descriptors {
        insert_descriptor(service_data, grouping, desc);
    }
}

fn insert_descriptor(
    service_data: &Arc<ServiceData>,
    grouping: &mut AttributeGrouping,
    desc: Descriptor,
) {
    let attr = grouping
        .add_attribute(desc.uuid, desc.read_permissions, desc.write_permissions)
        .expect("grouping sized for all service attributes");

    // Descriptors carry no properties bitfield; the permissions decide.
    let owner = Arc::downgrade(service_data);
    let desc_id = desc.id;
    attr.set_read_handler(Arc::new(move |_handle, offset, result_callback| {
        let Some(service) = owner.upgrade() else {
            result_callback(AttErrorCode::Unlikely, &[]);
            return;
        };
        (service.read_handler)(service.id, desc_id, offset, result_callback);
    }));

    let owner = Arc::downgrade(service_data);
    attr.set_write_handler(Arc::new(move |_handle, offset, value, result_callback| {
        let Some(service) = owner.upgrade() else {
            if let Some(callback) = result_callback {
                callback(AttErrorCode::Unlikely);
            }
            return;
        };
        (service.write_handler)(service.id, desc_id, offset, value, result_callback);
    }));
}
