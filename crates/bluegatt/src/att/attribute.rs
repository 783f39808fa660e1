//! Attributes and attribute groupings
//!
//! An [`Attribute`] either carries a static value stored in the database or
//! defers reads and writes to asynchronous handlers. An
//! [`AttributeGrouping`] owns a contiguous span of handles starting with the
//! group declaration attribute.
use super::constants::*;
use super::error::AttErrorCode;
use super::pdu::Handle;
use crate::uuid::Uuid;
use std::sync::Arc;

const PERMISSION_BIT_ALLOWED: u8 = 0x01;
const PERMISSION_BIT_ENCRYPTION: u8 = 0x02;
const PERMISSION_BIT_AUTHENTICATION: u8 = 0x04;
const PERMISSION_BIT_AUTHORIZATION: u8 = 0x08;

/// Security requirements of a single access type (read or write) on an
/// attribute. The default disallows the access entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessRequirements {
    value: u8,
}

impl AccessRequirements {
    /// Allows the access, subject to the given security properties.
    pub fn allowed_with(encryption: bool, authentication: bool, authorization: bool) -> Self {
        let mut value = PERMISSION_BIT_ALLOWED;
        if encryption {
            value |= PERMISSION_BIT_ENCRYPTION;
        }
        if authentication {
            value |= PERMISSION_BIT_AUTHENTICATION;
        }
        if authorization {
            value |= PERMISSION_BIT_AUTHORIZATION;
        }
        Self { value }
    }

    /// Allows the access with no security requirements.
    pub fn allowed() -> Self {
        Self::allowed_with(false, false, false)
    }

    /// Disallows the access.
    pub fn disallowed() -> Self {
        Self::default()
    }

    pub fn is_allowed(&self) -> bool {
        self.value & PERMISSION_BIT_ALLOWED != 0
    }

    pub fn allowed_without_security(&self) -> bool {
        self.value == PERMISSION_BIT_ALLOWED
    }

    pub fn encryption_required(&self) -> bool {
        self.value & PERMISSION_BIT_ENCRYPTION != 0
    }

    pub fn authentication_required(&self) -> bool {
        self.value & PERMISSION_BIT_AUTHENTICATION != 0
    }

    pub fn authorization_required(&self) -> bool {
        self.value & PERMISSION_BIT_AUTHORIZATION != 0
    }
}

/// Delivers the outcome of a dynamic read: an error code and, on success,
/// the value bytes.
pub type ReadResultCallback = Box<dyn FnOnce(AttErrorCode, &[u8]) + Send>;

/// Delivers the outcome of a dynamic write.
pub type WriteResultCallback = Box<dyn FnOnce(AttErrorCode) + Send>;

/// Serves reads on an attribute with no stored value. Arguments: handle,
/// value offset, result callback.
pub type ReadHandler = Arc<dyn Fn(Handle, u16, ReadResultCallback) + Send + Sync>;

/// Serves writes on an attribute. Arguments: handle, value offset, value,
/// result callback. The callback is `None` for a Write Command, which never
/// produces a response.
pub type WriteHandler = Arc<dyn Fn(Handle, u16, &[u8], Option<WriteResultCallback>) + Send + Sync>;

/// A single entry of the attribute database.
pub struct Attribute {
    handle: Handle,
    attribute_type: Uuid,
    read_reqs: AccessRequirements,
    write_reqs: AccessRequirements,
    value: Option<Vec<u8>>,
    read_handler: Option<ReadHandler>,
    write_handler: Option<WriteHandler>,
}

impl Attribute {
    fn new(
        handle: Handle,
        attribute_type: Uuid,
        read_reqs: AccessRequirements,
        write_reqs: AccessRequirements,
    ) -> Self {
        debug_assert!(handle != ATT_HANDLE_INVALID);
        Self {
            handle,
            attribute_type,
            read_reqs,
            write_reqs,
            value: None,
            read_handler: None,
            write_handler: None,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn attribute_type(&self) -> &Uuid {
        &self.attribute_type
    }

    pub fn read_reqs(&self) -> &AccessRequirements {
        &self.read_reqs
    }

    pub fn write_reqs(&self) -> &AccessRequirements {
        &self.write_reqs
    }

    /// The static value, if one has been assigned.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Assigns a static value. Only valid for attributes that disallow
    /// writes; a writable attribute must go through its write handler so the
    /// owner stays in sync.
    pub fn set_value(&mut self, value: &[u8]) {
        debug_assert!(!value.is_empty());
        debug_assert!(value.len() <= ATT_MAX_ATTRIBUTE_VALUE_LENGTH);
        debug_assert!(!self.write_reqs.is_allowed());
        self.value = Some(value.to_vec());
    }

    pub fn set_read_handler(&mut self, handler: ReadHandler) {
        self.read_handler = Some(handler);
    }

    pub fn set_write_handler(&mut self, handler: WriteHandler) {
        self.write_handler = Some(handler);
    }

    /// Dispatches a dynamic read. Returns false without invoking the
    /// callback when reads are disallowed or no handler is set.
    pub fn read_async(&self, offset: u16, result_callback: ReadResultCallback) -> bool {
        let Some(handler) = &self.read_handler else {
            return false;
        };
        if !self.read_reqs.is_allowed() {
            return false;
        }

        handler(self.handle, offset, result_callback);
        true
    }

    /// Dispatches a dynamic write. Returns false without invoking the
    /// callback when writes are disallowed or no handler is set.
    pub fn write_async(
        &self,
        offset: u16,
        value: &[u8],
        result_callback: Option<WriteResultCallback>,
    ) -> bool {
        let Some(handler) = &self.write_handler else {
            return false;
        };
        if !self.write_reqs.is_allowed() {
            return false;
        }

        handler(self.handle, offset, value, result_callback);
        true
    }
}

/// A contiguous run of attributes starting with a group declaration.
///
/// The grouping spans `attr_count + 1` handles: the declaration at
/// `start_handle` plus `attr_count` member attributes. Members are added one
/// at a time; the grouping only becomes visible to queries once it is
/// complete and activated.
pub struct AttributeGrouping {
    start_handle: Handle,
    end_handle: Handle,
    active: bool,
    attributes: Vec<Attribute>,
}

impl AttributeGrouping {
    pub fn new(group_type: Uuid, start_handle: Handle, attr_count: usize, decl_value: &[u8]) -> Self {
        debug_assert!(start_handle != ATT_HANDLE_INVALID);
        debug_assert!(((ATT_HANDLE_MAX - start_handle) as usize) >= attr_count);
        debug_assert!(!decl_value.is_empty());

        let mut attributes = Vec::with_capacity(attr_count + 1);
        // The group declaration is readable without security and never
        // writable.
        let mut decl = Attribute::new(
            start_handle,
            group_type,
            AccessRequirements::allowed(),
            AccessRequirements::disallowed(),
        );
        decl.set_value(decl_value);
        attributes.push(decl);

        Self {
            start_handle,
            end_handle: start_handle + attr_count as Handle,
            active: false,
            attributes,
        }
    }

    /// Appends the next member attribute. Returns `None` once the grouping
    /// has all of its attributes.
    pub fn add_attribute(
        &mut self,
        attribute_type: Uuid,
        read_reqs: AccessRequirements,
        write_reqs: AccessRequirements,
    ) -> Option<&mut Attribute> {
        if self.complete() {
            return None;
        }

        let handle = self.start_handle + self.attributes.len() as Handle;
        self.attributes
            .push(Attribute::new(handle, attribute_type, read_reqs, write_reqs));
        self.attributes.last_mut()
    }

    pub fn complete(&self) -> bool {
        self.attributes.len() as Handle == self.end_handle - self.start_handle + 1
    }

    pub fn start_handle(&self) -> Handle {
        self.start_handle
    }

    pub fn end_handle(&self) -> Handle {
        self.end_handle
    }

    pub fn group_type(&self) -> &Uuid {
        self.attributes[0].attribute_type()
    }

    pub fn decl_value(&self) -> &[u8] {
        self.attributes[0]
            .value()
            .expect("group declaration always has a value")
    }

    pub fn active(&self) -> bool {
        self.active
    }

    /// Only a complete grouping can be activated.
    pub fn set_active(&mut self, active: bool) {
        debug_assert!(!active || self.complete());
        self.active = active;
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const TEST_TYPE: Uuid = Uuid::from_u16(0xBEEF);

    #[test]
    fn access_requirements() {
        let none = AccessRequirements::default();
        assert!(!none.is_allowed());
        assert!(!none.allowed_without_security());

        let open = AccessRequirements::allowed();
        assert!(open.is_allowed());
        assert!(open.allowed_without_security());

        let secure = AccessRequirements::allowed_with(true, true, false);
        assert!(secure.is_allowed());
        assert!(!secure.allowed_without_security());
        assert!(secure.encryption_required());
        assert!(secure.authentication_required());
        assert!(!secure.authorization_required());
    }

    #[test]
    fn grouping_declaration() {
        let grouping = AttributeGrouping::new(Uuid::from_u16(0x2800), 1, 2, &[0x01]);
        assert_eq!(grouping.start_handle(), 1);
        assert_eq!(grouping.end_handle(), 3);
        assert!(!grouping.complete());
        assert_eq!(*grouping.group_type(), Uuid::from_u16(0x2800));
        assert_eq!(grouping.decl_value(), &[0x01]);

        let decl = &grouping.attributes()[0];
        assert!(decl.read_reqs().allowed_without_security());
        assert!(!decl.write_reqs().is_allowed());
    }

    #[test]
    fn grouping_add_until_complete() {
        let mut grouping = AttributeGrouping::new(Uuid::from_u16(0x2800), 5, 2, &[0x01]);

        let attr = grouping
            .add_attribute(
                TEST_TYPE,
                AccessRequirements::allowed(),
                AccessRequirements::default(),
            )
            .unwrap();
        assert_eq!(attr.handle(), 6);
        assert!(!grouping.complete());

        let attr = grouping
            .add_attribute(
                TEST_TYPE,
                AccessRequirements::allowed(),
                AccessRequirements::default(),
            )
            .unwrap();
        assert_eq!(attr.handle(), 7);
        assert!(grouping.complete());

        assert!(grouping
            .add_attribute(
                TEST_TYPE,
                AccessRequirements::allowed(),
                AccessRequirements::default()
            )
            .is_none());
    }

    #[test]
    fn read_async_requires_handler_and_permission() {
        let mut grouping = AttributeGrouping::new(Uuid::from_u16(0x2800), 1, 2, &[0x01]);

        let no_handler = grouping
            .add_attribute(
                TEST_TYPE,
                AccessRequirements::allowed(),
                AccessRequirements::default(),
            )
            .unwrap();
        assert!(!no_handler.read_async(0, Box::new(|_, _| panic!("must not run"))));

        let denied = grouping
            .add_attribute(
                TEST_TYPE,
                AccessRequirements::default(),
                AccessRequirements::default(),
            )
            .unwrap();
        denied.set_read_handler(Arc::new(|_, _, _| panic!("must not run")));
        assert!(!denied.read_async(0, Box::new(|_, _| panic!("must not run"))));
    }

    #[test]
    fn read_async_dispatches() {
        let mut grouping = AttributeGrouping::new(Uuid::from_u16(0x2800), 1, 1, &[0x01]);
        let attr = grouping
            .add_attribute(
                TEST_TYPE,
                AccessRequirements::allowed(),
                AccessRequirements::default(),
            )
            .unwrap();
        attr.set_read_handler(Arc::new(|handle, offset, cb| {
            assert_eq!(handle, 2);
            assert_eq!(offset, 4);
            cb(AttErrorCode::NoError, &[0xAA]);
        }));

        let result: Arc<Mutex<Option<(AttErrorCode, Vec<u8>)>>> = Arc::new(Mutex::new(None));
        let result_clone = result.clone();
        assert!(attr.read_async(
            4,
            Box::new(move |code, value| {
                *result_clone.lock().unwrap() = Some((code, value.to_vec()));
            })
        ));
        assert_eq!(
            result.lock().unwrap().take(),
            Some((AttErrorCode::NoError, vec![0xAA]))
        );
    }

    #[test]
    fn write_async_dispatches() {
        let mut grouping = AttributeGrouping::new(Uuid::from_u16(0x2800), 1, 1, &[0x01]);
        let attr = grouping
            .add_attribute(
                TEST_TYPE,
                AccessRequirements::default(),
                AccessRequirements::allowed(),
            )
            .unwrap();
        attr.set_write_handler(Arc::new(|handle, offset, value, cb| {
            assert_eq!(handle, 2);
            assert_eq!(offset, 0);
            assert_eq!(value, &[0x01, 0x02]);
            if let Some(cb) = cb {
                cb(AttErrorCode::NoError);
            }
        }));

        let wrote = Arc::new(Mutex::new(None));
        let wrote_clone = wrote.clone();
        assert!(attr.write_async(
            0,
            &[0x01, 0x02],
            Some(Box::new(move |code| {
                *wrote_clone.lock().unwrap() = Some(code);
            }))
        ));
        assert_eq!(wrote.lock().unwrap().take(), Some(AttErrorCode::NoError));

        // Write Without Response path carries no callback.
        assert!(attr.write_async(0, &[0x01, 0x02], None));
    }
}
