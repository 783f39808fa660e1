//! GATT server and service manager tests driven over a fake channel.
use super::local_service_manager::{LocalServiceManager, ServiceReadHandler, ServiceWriteHandler};
use super::server::GattServer;
use super::types::*;
use crate::att::attribute::AccessRequirements;
use crate::att::bearer::testing::{FakeChannel, SentPdus};
use crate::att::bearer::Bearer;
use crate::att::constants::*;
use crate::att::error::AttErrorCode;
use crate::uuid::Uuid;
use std::sync::{Arc, Mutex};

const CHRC_UUID: Uuid = Uuid::from_u16(0xBEEF);
const DESC_UUID: Uuid = Uuid::from_u16(0xCAFE);

struct Fixture {
    lsm: Arc<LocalServiceManager>,
    bearer: Bearer,
    sent: SentPdus,
    _server: GattServer,
}

fn fixture() -> Fixture {
    fixture_with_mtu(ATT_LE_MIN_MTU)
}

fn fixture_with_mtu(mtu: u16) -> Fixture {
    let (chan, sent) = FakeChannel::with_mtu(mtu);
    let bearer = Bearer::new(chan);
    let lsm = Arc::new(LocalServiceManager::new());
    let server = GattServer::new(lsm.database(), bearer.clone());
    Fixture {
        lsm,
        bearer,
        sent,
        _server: server,
    }
}

fn last_sent(sent: &SentPdus) -> Vec<u8> {
    sent.lock().unwrap().last().cloned().expect("nothing sent")
}

type AccessLog = Arc<Mutex<Vec<(IdType, IdType, u16, Vec<u8>)>>>;

fn logging_read_handler(log: AccessLog, value: Vec<u8>) -> ServiceReadHandler {
    Arc::new(move |service_id, id, offset, callback| {
        log.lock()
            .unwrap()
            .push((service_id, id, offset, Vec::new()));
        callback(AttErrorCode::NoError, &value);
    })
}

fn failing_read_handler(code: AttErrorCode) -> ServiceReadHandler {
    Arc::new(move |_, _, _, callback| callback(code, &[]))
}

fn logging_write_handler(log: AccessLog) -> ServiceWriteHandler {
    Arc::new(move |service_id, id, offset, value, callback| {
        log.lock()
            .unwrap()
            .push((service_id, id, offset, value.to_vec()));
        if let Some(callback) = callback {
            callback(AttErrorCode::NoError);
        }
    })
}

fn rejecting_read_handler() -> ServiceReadHandler {
    Arc::new(|_, _, _, _| panic!("unexpected read"))
}

fn rejecting_write_handler() -> ServiceWriteHandler {
    Arc::new(|_, _, _, _, _| panic!("unexpected write"))
}

fn service_with_chrc(properties: CharacteristicProperties) -> Service {
    let mut service = Service::new(1, Uuid::from_u16(0x180A), true);
    service.characteristics.push(Characteristic::new(
        7,
        CHRC_UUID,
        properties,
        AccessRequirements::allowed(),
        AccessRequirements::allowed(),
    ));
    service
}

#[test]
fn exchange_mtu_negotiation() {
    let fix = fixture_with_mtu(100);
    assert_eq!(fix.bearer.preferred_mtu(), 100);

    fix.bearer.on_rx_pdu(&[ATT_EXCHANGE_MTU_REQ, 72, 0]);

    assert_eq!(last_sent(&fix.sent), vec![ATT_EXCHANGE_MTU_RSP, 100, 0]);
    // The smaller of the two sides wins.
    assert_eq!(fix.bearer.mtu(), 72);
}

#[test]
fn exchange_mtu_clamps_to_minimum() {
    let fix = fixture_with_mtu(100);
    fix.bearer.on_rx_pdu(&[ATT_EXCHANGE_MTU_REQ, 5, 0]);

    assert_eq!(last_sent(&fix.sent), vec![ATT_EXCHANGE_MTU_RSP, 100, 0]);
    assert_eq!(fix.bearer.mtu(), ATT_LE_MIN_MTU);
}

#[test]
fn exchange_mtu_invalid_pdu() {
    let fix = fixture();
    fix.bearer.on_rx_pdu(&[ATT_EXCHANGE_MTU_REQ, 72]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_ERROR_RSP,
            ATT_EXCHANGE_MTU_REQ,
            0x00,
            0x00,
            ATT_ERROR_INVALID_PDU
        ]
    );
    assert_eq!(fix.bearer.mtu(), ATT_LE_MIN_MTU);
}

#[test]
fn find_information_lists_service_attributes() {
    let fix = fixture();
    fix.lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::READ),
            rejecting_read_handler(),
            rejecting_write_handler(),
        )
        .unwrap();

    fix.bearer
        .on_rx_pdu(&[ATT_FIND_INFO_REQ, 0x01, 0x00, 0xFF, 0xFF]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_FIND_INFO_RSP,
            ATT_FIND_INFO_RSP_FORMAT_16BIT,
            0x01, 0x00, 0x00, 0x28, // service declaration
            0x02, 0x00, 0x03, 0x28, // characteristic declaration
            0x03, 0x00, 0xEF, 0xBE, // characteristic value
        ]
    );
}

#[test]
fn find_information_empty_database() {
    let fix = fixture();
    fix.bearer
        .on_rx_pdu(&[ATT_FIND_INFO_REQ, 0x01, 0x00, 0xFF, 0xFF]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_ERROR_RSP,
            ATT_FIND_INFO_REQ,
            0x01,
            0x00,
            ATT_ERROR_ATTRIBUTE_NOT_FOUND
        ]
    );
}

#[test]
fn find_information_invalid_pdu() {
    let fix = fixture();
    fix.bearer.on_rx_pdu(&[ATT_FIND_INFO_REQ, 0x01, 0x00]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_ERROR_RSP,
            ATT_FIND_INFO_REQ,
            0x00,
            0x00,
            ATT_ERROR_INVALID_PDU
        ]
    );
}

#[test]
fn read_by_group_type_lists_services() {
    let fix = fixture();
    fix.lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::READ),
            rejecting_read_handler(),
            rejecting_write_handler(),
        )
        .unwrap();

    let mut second = Service::new(2, Uuid::from_u16(0x180F), true);
    second.characteristics.push(Characteristic::new(
        1,
        CHRC_UUID,
        CharacteristicProperties::READ,
        AccessRequirements::allowed(),
        AccessRequirements::allowed(),
    ));
    fix.lsm
        .register_service(second, rejecting_read_handler(), rejecting_write_handler())
        .unwrap();

    fix.bearer.on_rx_pdu(&[
        ATT_READ_BY_GROUP_TYPE_REQ,
        0x01,
        0x00,
        0xFF,
        0xFF,
        0x00,
        0x28,
    ]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_READ_BY_GROUP_TYPE_RSP,
            6, // entry size: handle pair + 16-bit service UUID
            0x01, 0x00, 0x03, 0x00, 0x0A, 0x18,
            0x04, 0x00, 0x06, 0x00, 0x0F, 0x18,
        ]
    );
}

#[test]
fn read_by_group_type_rejects_other_types() {
    let fix = fixture();
    fix.bearer.on_rx_pdu(&[
        ATT_READ_BY_GROUP_TYPE_REQ,
        0x01,
        0x00,
        0xFF,
        0xFF,
        0x03,
        0x28,
    ]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_ERROR_RSP,
            ATT_READ_BY_GROUP_TYPE_REQ,
            0x01,
            0x00,
            ATT_ERROR_UNSUPPORTED_GROUP_TYPE
        ]
    );
}

#[test]
fn read_by_type_returns_characteristic_declarations() {
    let fix = fixture();
    fix.lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::READ),
            rejecting_read_handler(),
            rejecting_write_handler(),
        )
        .unwrap();

    fix.bearer
        .on_rx_pdu(&[ATT_READ_BY_TYPE_REQ, 0x01, 0x00, 0xFF, 0xFF, 0x03, 0x28]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_READ_BY_TYPE_RSP,
            7, // handle + properties + value handle + 16-bit UUID
            0x02, 0x00, // declaration handle
            0x02, // READ
            0x03, 0x00, // value handle
            0xEF, 0xBE,
        ]
    );
}

#[test]
fn read_by_type_dynamic_value() {
    let fix = fixture();
    let log: AccessLog = Arc::new(Mutex::new(Vec::new()));
    let service_id = fix
        .lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::READ),
            logging_read_handler(log.clone(), vec![0x10, 0x11]),
            rejecting_write_handler(),
        )
        .unwrap();

    fix.bearer
        .on_rx_pdu(&[ATT_READ_BY_TYPE_REQ, 0x01, 0x00, 0xFF, 0xFF, 0xEF, 0xBE]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![ATT_READ_BY_TYPE_RSP, 4, 0x03, 0x00, 0x10, 0x11]
    );
    assert_eq!(log.lock().unwrap().as_slice(), &[(service_id, 7, 0, Vec::new())]);
}

#[test]
fn read_by_type_dynamic_error() {
    let fix = fixture();
    fix.lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::READ),
            failing_read_handler(AttErrorCode::ApplicationError(0x80)),
            rejecting_write_handler(),
        )
        .unwrap();

    fix.bearer
        .on_rx_pdu(&[ATT_READ_BY_TYPE_REQ, 0x01, 0x00, 0xFF, 0xFF, 0xEF, 0xBE]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![ATT_ERROR_RSP, ATT_READ_BY_TYPE_REQ, 0x03, 0x00, 0x80]
    );
}

#[test]
fn read_by_type_enforces_read_property() {
    let fix = fixture();
    fix.lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::WRITE),
            rejecting_read_handler(),
            rejecting_write_handler(),
        )
        .unwrap();

    fix.bearer
        .on_rx_pdu(&[ATT_READ_BY_TYPE_REQ, 0x01, 0x00, 0xFF, 0xFF, 0xEF, 0xBE]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_ERROR_RSP,
            ATT_READ_BY_TYPE_REQ,
            0x03,
            0x00,
            ATT_ERROR_READ_NOT_PERMITTED
        ]
    );
}

#[test]
fn read_by_type_enforces_read_permission() {
    let fix = fixture();
    let mut service = Service::new(1, Uuid::from_u16(0x180A), true);
    service.characteristics.push(Characteristic::new(
        7,
        CHRC_UUID,
        CharacteristicProperties::READ,
        AccessRequirements::default(),
        AccessRequirements::default(),
    ));
    fix.lsm
        .register_service(service, rejecting_read_handler(), rejecting_write_handler())
        .unwrap();

    fix.bearer
        .on_rx_pdu(&[ATT_READ_BY_TYPE_REQ, 0x01, 0x00, 0xFF, 0xFF, 0xEF, 0xBE]);

    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_ERROR_RSP,
            ATT_READ_BY_TYPE_REQ,
            0x01,
            0x00,
            ATT_ERROR_READ_NOT_PERMITTED
        ]
    );
}

#[test]
fn register_service_lays_out_attributes() {
    let lsm = LocalServiceManager::new();
    let mut service = Service::new(1, Uuid::from_u16(0x180A), true);
    // Deliberately listed wide-first; registration orders by UUID width.
    service.characteristics.push(Characteristic::new(
        1,
        Uuid::from_bytes_le([0xAB; 16]),
        CharacteristicProperties::READ,
        AccessRequirements::allowed(),
        AccessRequirements::default(),
    ));
    service.characteristics.push(Characteristic::new(
        2,
        CHRC_UUID,
        CharacteristicProperties::READ,
        AccessRequirements::allowed(),
        AccessRequirements::default(),
    ));
    lsm.register_service(service, rejecting_read_handler(), rejecting_write_handler())
        .unwrap();

    let db = lsm.database();
    let db = db.read().unwrap();

    assert_eq!(*db.attribute(1).unwrap().attribute_type(), PRIMARY_SERVICE_TYPE);
    assert_eq!(db.attribute(1).unwrap().value(), Some(&[0x0A, 0x18][..]));

    // The 16-bit characteristic sorts first.
    let decl = db.attribute(2).unwrap();
    assert_eq!(*decl.attribute_type(), CHARACTERISTIC_DECLARATION_TYPE);
    assert_eq!(decl.value(), Some(&[0x02, 0x03, 0x00, 0xEF, 0xBE][..]));
    assert_eq!(*db.attribute(3).unwrap().attribute_type(), CHRC_UUID);

    let decl = db.attribute(4).unwrap();
    let mut expected = vec![0x02, 0x05, 0x00];
    expected.extend_from_slice(&[0xAB; 16]);
    assert_eq!(decl.value(), Some(&expected[..]));
    assert_eq!(
        *db.attribute(5).unwrap().attribute_type(),
        Uuid::from_bytes_le([0xAB; 16])
    );
}

#[test]
fn register_service_rejects_duplicate_ids() {
    let lsm = LocalServiceManager::new();
    let mut service = service_with_chrc(CharacteristicProperties::READ);
    let mut dup = service.characteristics[0].clone();
    dup.uuid = DESC_UUID;
    service.characteristics.push(dup);

    assert!(lsm
        .register_service(service, rejecting_read_handler(), rejecting_write_handler())
        .is_none());
}

#[test]
fn register_service_rejects_reserved_descriptors() {
    let lsm = LocalServiceManager::new();
    let mut service = service_with_chrc(
        CharacteristicProperties::READ | CharacteristicProperties::NOTIFY,
    );
    service.characteristics[0].descriptors.push(Descriptor::new(
        8,
        CLIENT_CHARACTERISTIC_CONFIG_TYPE,
        AccessRequirements::allowed(),
        AccessRequirements::allowed(),
    ));

    assert!(lsm
        .register_service(service, rejecting_read_handler(), rejecting_write_handler())
        .is_none());
}

#[test]
fn descriptor_access_forwards_descriptor_id() {
    let lsm = LocalServiceManager::new();
    let log: AccessLog = Arc::new(Mutex::new(Vec::new()));
    let mut service = service_with_chrc(CharacteristicProperties::READ);
    service.characteristics[0].descriptors.push(Descriptor::new(
        8,
        DESC_UUID,
        AccessRequirements::allowed(),
        AccessRequirements::allowed(),
    ));
    let service_id = lsm
        .register_service(
            service,
            logging_read_handler(log.clone(), vec![0xDD]),
            logging_write_handler(log.clone()),
        )
        .unwrap();

    let db = lsm.database();
    let db = db.read().unwrap();
    // Descriptor sits after the characteristic pair.
    let desc = db.attribute(4).unwrap();
    assert_eq!(*desc.attribute_type(), DESC_UUID);

    assert!(desc.read_async(2, Box::new(|code, value| {
        assert_eq!(code, AttErrorCode::NoError);
        assert_eq!(value, &[0xDD]);
    })));
    assert!(desc.write_async(0, &[0xEE], Some(Box::new(|code| {
        assert_eq!(code, AttErrorCode::NoError);
    }))));

    let log = log.lock().unwrap();
    assert_eq!(log[0], (service_id, 8, 2, Vec::new()));
    assert_eq!(log[1], (service_id, 8, 0, vec![0xEE]));
}

#[test]
fn characteristic_write_respects_properties() {
    let lsm = LocalServiceManager::new();
    let log: AccessLog = Arc::new(Mutex::new(Vec::new()));
    let service_id = lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::WRITE),
            rejecting_read_handler(),
            logging_write_handler(log.clone()),
        )
        .unwrap();

    let db = lsm.database();
    let db = db.read().unwrap();
    let value_attr = db.attribute(3).unwrap();

    // Write with response is allowed by the WRITE property.
    assert!(value_attr.write_async(0, &[0x01], Some(Box::new(|code| {
        assert_eq!(code, AttErrorCode::NoError);
    }))));
    assert_eq!(log.lock().unwrap()[0], (service_id, 7, 0, vec![0x01]));

    // Write without response is not; it is dropped before the handler.
    assert!(value_attr.write_async(0, &[0x02], None));
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn characteristic_write_without_response_only() {
    let lsm = LocalServiceManager::new();
    let log: AccessLog = Arc::new(Mutex::new(Vec::new()));
    lsm.register_service(
        service_with_chrc(CharacteristicProperties::WRITE_WITHOUT_RESPONSE),
        rejecting_read_handler(),
        logging_write_handler(log.clone()),
    )
    .unwrap();

    let db = lsm.database();
    let db = db.read().unwrap();
    let value_attr = db.attribute(3).unwrap();

    // A write with response fails against the property.
    let failed = Arc::new(Mutex::new(None));
    let failed_clone = failed.clone();
    assert!(value_attr.write_async(0, &[0x01], Some(Box::new(move |code| {
        *failed_clone.lock().unwrap() = Some(code);
    }))));
    assert_eq!(
        failed.lock().unwrap().take(),
        Some(AttErrorCode::WriteNotPermitted)
    );
    assert!(log.lock().unwrap().is_empty());

    // The command path goes through.
    assert!(value_attr.write_async(0, &[0x02], None));
    assert_eq!(log.lock().unwrap()[0].3, vec![0x02]);
}

#[test]
fn unregister_service_frees_handles() {
    let fix = fixture();
    let id = fix
        .lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::READ),
            rejecting_read_handler(),
            rejecting_write_handler(),
        )
        .unwrap();

    assert!(fix.lsm.unregister_service(id));
    assert!(!fix.lsm.unregister_service(id));

    fix.bearer
        .on_rx_pdu(&[ATT_FIND_INFO_REQ, 0x01, 0x00, 0xFF, 0xFF]);
    assert_eq!(
        last_sent(&fix.sent),
        vec![
            ATT_ERROR_RSP,
            ATT_FIND_INFO_REQ,
            0x01,
            0x00,
            ATT_ERROR_ATTRIBUTE_NOT_FOUND
        ]
    );

    // The freed handles are reused by the next registration.
    fix.lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::READ),
            rejecting_read_handler(),
            rejecting_write_handler(),
        )
        .unwrap();
    let db = fix.lsm.database();
    assert_eq!(db.read().unwrap().attribute(1).unwrap().handle(), 1);
}

#[test]
fn service_ids_are_unique() {
    let lsm = LocalServiceManager::new();
    let a = lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::READ),
            rejecting_read_handler(),
            rejecting_write_handler(),
        )
        .unwrap();
    let b = lsm
        .register_service(
            service_with_chrc(CharacteristicProperties::READ),
            rejecting_read_handler(),
            rejecting_write_handler(),
        )
        .unwrap();
    assert_ne!(a, b);
}
