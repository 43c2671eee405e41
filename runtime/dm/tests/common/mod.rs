//! Shared fixtures: a data model with Security, Server, a test Object
//! (`/10`) and optionally Access Control, wired to the bincode codec and
//! recording hooks.

#![allow(dead_code)]

use lwm2m_dm::access::AccessMask;
use lwm2m_dm::{Action, DataModel, DmConfig, Request, Response, Ssid, UriPath, Value};
use lwm2m_dm_mock::standard::{access_control_object, security_object, server_object, test_object};
use lwm2m_dm_mock::{decode, encode, BincodeCodec, MockHandle, RecordingHooks, WireEntry, MOCK_FORMAT};

pub const TEST_OID: u16 = 10;

pub struct Env {
    pub dm: DataModel,
    pub hooks: RecordingHooks,
    pub security: MockHandle,
    pub server: MockHandle,
    pub object: MockHandle,
    pub ac: Option<MockHandle>,
}

impl Env {
    pub fn ac(&self) -> &MockHandle {
        self.ac.as_ref().expect("Access Control not registered")
    }

    pub fn perform(&mut self, request: Request) -> Response {
        self.dm.perform(&request)
    }
}

/// Data model for servers `ssids` with Access Control
///
/// `/2/0` governs `/10/0` (owner 1, ACL `acl`) and `/2/1` lets every
/// server create `/10` instances.
pub fn env(ssids: &[Ssid], acl: &[(Ssid, AccessMask)]) -> Env {
    env_with_config(DmConfig::default(), ssids, Some(acl))
}

/// Data model for servers `ssids` without the Access Control Object
pub fn plain_env(ssids: &[Ssid]) -> Env {
    env_with_config(DmConfig::default(), ssids, None)
}

/// Security has a Bootstrap account plus one instance per server; `/10/0`
/// exists with resource 0 = 42 and resource 1 = "hello".
pub fn env_with_config(config: DmConfig, ssids: &[Ssid], access_control: Option<&[(Ssid, AccessMask)]>) -> Env {
    let hooks = RecordingHooks::new();
    let mut dm = DataModel::new(config)
        .with_hooks(Box::new(hooks.clone()))
        .with_codec(Box::new(BincodeCodec));

    let security = security_object();
    let security_handle = security.handle();
    security_handle.add_security_instance(0, 0, true);
    let server = server_object();
    let server_handle = server.handle();
    for (index, &ssid) in ssids.iter().enumerate() {
        let iid = u16::try_from(index).unwrap();
        security_handle.add_security_instance(iid + 1, ssid, false);
        server_handle.add_server_instance(iid, ssid);
    }
    let object = test_object(TEST_OID);
    let object_handle = object.handle();
    object_handle.add_instance(0, &[(0, Value::Int(42)), (1, Value::String("hello".into()))]);

    dm.register_object(Box::new(security)).unwrap();
    dm.register_object(Box::new(server)).unwrap();
    dm.register_object(Box::new(object)).unwrap();

    let ac = access_control.map(|acl| {
        let ac = access_control_object();
        let handle = ac.handle();
        handle.add_ac_instance(0, (TEST_OID, 0), 1, acl);
        let create_acl: Vec<_> = ssids.iter().map(|&ssid| (ssid, AccessMask::CREATE)).collect();
        handle.add_ac_instance(1, (TEST_OID, u16::MAX), 1, &create_acl);
        dm.register_object(Box::new(ac)).unwrap();
        handle
    });
    hooks.clear();

    Env {
        dm,
        hooks,
        security: security_handle,
        server: server_handle,
        object: object_handle,
        ac,
    }
}

pub fn path(s: &str) -> UriPath {
    s.parse().unwrap()
}

pub fn request(ssid: Ssid, action: Action, uri: &str) -> Request {
    Request::new(ssid, action, path(uri))
}

pub fn with_entries(ssid: Ssid, action: Action, uri: &str, entries: &[WireEntry]) -> Request {
    request(ssid, action, uri).with_payload(MOCK_FORMAT, encode(entries))
}

pub fn entries(response: &Response) -> Vec<WireEntry> {
    decode(&response.payload).unwrap()
}

/// `(path, value)` pairs of a Read response
pub fn values(response: &Response) -> Vec<(String, Value)> {
    entries(response)
        .into_iter()
        .filter_map(|entry| {
            let path = UriPath::from_ids(&entry.path).ok()?;
            Some((path.to_string(), entry.value?))
        })
        .collect()
}
