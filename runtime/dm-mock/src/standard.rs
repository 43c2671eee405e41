//! Layouts of the Objects the Access Control engine depends on

use lwm2m_dm::access::AccessMask;
use lwm2m_dm::ids::{oid, rid};
use lwm2m_dm::{Iid, Oid, ResourceKind, Rid, Ssid, Value, ValueType};

use crate::object::{MockHandle, MockObject, ResourceDef};

const SECURITY_SERVER_URI: Rid = 0;
const SERVER_LIFETIME: Rid = 1;
const SERVER_UPDATE_TRIGGER: Rid = 8;

pub fn security_object() -> MockObject {
    MockObject::new(
        oid::SECURITY,
        &[
            ResourceDef::new(SECURITY_SERVER_URI, ResourceKind::Rw, ValueType::String),
            ResourceDef::new(rid::security::BOOTSTRAP, ResourceKind::Rw, ValueType::Bool),
            ResourceDef::new(rid::security::SSID, ResourceKind::Rw, ValueType::Int),
        ],
    )
}

pub fn server_object() -> MockObject {
    MockObject::new(
        oid::SERVER,
        &[
            ResourceDef::new(rid::server::SSID, ResourceKind::R, ValueType::Int),
            ResourceDef::new(SERVER_LIFETIME, ResourceKind::Rw, ValueType::Int),
            ResourceDef::new(SERVER_UPDATE_TRIGGER, ResourceKind::E, ValueType::Int),
        ],
    )
    .with_version("1.1")
}

pub fn access_control_object() -> MockObject {
    MockObject::new(
        oid::ACCESS_CONTROL,
        &[
            ResourceDef::new(rid::access_control::OID, ResourceKind::R, ValueType::Int),
            ResourceDef::new(rid::access_control::OIID, ResourceKind::R, ValueType::Int),
            ResourceDef::new(rid::access_control::ACL, ResourceKind::Rwm, ValueType::Int),
            ResourceDef::new(rid::access_control::OWNER, ResourceKind::Rw, ValueType::Int),
        ],
    )
}

/// Generic test Object: 0 is RW integer, 1 is RW string, 2 is a RW
/// multiple integer, 3 is read-only, 4 is executable
pub fn test_object(oid: Oid) -> MockObject {
    MockObject::new(
        oid,
        &[
            ResourceDef::new(0, ResourceKind::Rw, ValueType::Int),
            ResourceDef::new(1, ResourceKind::Rw, ValueType::String),
            ResourceDef::new(2, ResourceKind::Rwm, ValueType::Int),
            ResourceDef::new(3, ResourceKind::R, ValueType::Int),
            ResourceDef::new(4, ResourceKind::E, ValueType::Int),
        ],
    )
}

impl MockHandle {
    /// Security instance of server `ssid` (`bootstrap` marks the Bootstrap
    /// Server account)
    pub fn add_security_instance(&self, iid: Iid, ssid: Ssid, bootstrap: bool) {
        self.add_instance(
            iid,
            &[
                (SECURITY_SERVER_URI, Value::String(format!("coap://server-{}", ssid))),
                (rid::security::BOOTSTRAP, Value::Bool(bootstrap)),
                (rid::security::SSID, Value::Int(i64::from(ssid))),
            ],
        );
    }

    pub fn add_server_instance(&self, iid: Iid, ssid: Ssid) {
        self.add_instance(
            iid,
            &[
                (rid::server::SSID, Value::Int(i64::from(ssid))),
                (SERVER_LIFETIME, Value::Int(86400)),
            ],
        );
    }

    /// Access Control instance governing `/target_oid/target_iid`
    pub fn add_ac_instance(
        &self,
        iid: Iid,
        target: (Oid, Iid),
        owner: Ssid,
        acl: &[(Ssid, AccessMask)],
    ) {
        self.add_instance(
            iid,
            &[
                (rid::access_control::OID, Value::Int(i64::from(target.0))),
                (rid::access_control::OIID, Value::Int(i64::from(target.1))),
                (rid::access_control::OWNER, Value::Int(i64::from(owner))),
            ],
        );
        let acl: Vec<_> = acl
            .iter()
            .map(|&(ssid, mask)| (ssid, Value::Int(i64::from(mask.bits()))))
            .collect();
        self.set_multiple(iid, rid::access_control::ACL, &acl);
    }

    /// ACL of an Access Control instance as `(ssid, mask)` pairs
    pub fn acl(&self, iid: Iid) -> Vec<(Ssid, AccessMask)> {
        self.values(iid, rid::access_control::ACL)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(ssid, value)| {
                let bits = u16::try_from(value.as_i64()?).ok()?;
                Some((ssid, AccessMask::from_bits_truncate(bits)))
            })
            .collect()
    }

    /// `(oid, iid, owner)` of an Access Control instance
    pub fn ac_target(&self, iid: Iid) -> Option<(Oid, Iid, Ssid)> {
        let field = |resource| {
            self.value(iid, resource)
                .and_then(|value| value.as_i64())
                .and_then(|value| u16::try_from(value).ok())
        };
        Some((
            field(rid::access_control::OID)?,
            field(rid::access_control::OIID)?,
            field(rid::access_control::OWNER)?,
        ))
    }
}
