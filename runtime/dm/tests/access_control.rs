//! Access Control enforcement and synchronization
//!
//! Two or three LwM2M Servers are configured, so ACLs are in effect:
//! - per-action rights from the ACL of the target instance
//! - special rules for the Access Control Object itself
//! - AC instances created for, and removed with, their targets
//! - owner election when the owner's server disappears

mod common;

use common::*;
use lwm2m_dm::access::AccessMask;
use lwm2m_dm::{Action, DmConfig, MsgCode, NotifyQueue, Value, SSID_BOOTSTRAP};
use lwm2m_dm_mock::WireEntry;

fn write_value(ssid: u16, uri: &str, ids: &[u16], value: i64) -> lwm2m_dm::Request {
    with_entries(ssid, Action::WriteUpdate, uri, &[WireEntry::value(ids, Value::Int(value))])
}

#[test]
fn test_rights_follow_acl() {
    let mut env = env(&[1, 2], &[(1, AccessMask::OWNER_DEFAULT), (2, AccessMask::READ)]);
    assert_eq!(
        env.perform(request(2, Action::Read, "/10/0")).code(),
        MsgCode::CONTENT
    );
    assert_eq!(
        env.perform(write_value(2, "/10/0", &[10, 0, 0], 1)).code(),
        MsgCode::UNAUTHORIZED
    );
    assert_eq!(
        env.perform(request(2, Action::Delete, "/10/0")).code(),
        MsgCode::UNAUTHORIZED
    );
    assert_eq!(
        env.perform(write_value(1, "/10/0", &[10, 0, 0], 1)).code(),
        MsgCode::CHANGED
    );
    assert_eq!(env.object.value(0, 0), Some(Value::Int(1)));
}

#[test]
fn test_exact_entry_beats_default_entry() {
    let mut env = env(
        &[1, 2, 3],
        &[
            (0, AccessMask::READ | AccessMask::WRITE),
            (1, AccessMask::OWNER_DEFAULT),
            (2, AccessMask::READ),
        ],
    );
    assert_eq!(
        env.perform(write_value(3, "/10/0", &[10, 0, 0], 3)).code(),
        MsgCode::CHANGED
    );
    assert_eq!(
        env.perform(write_value(2, "/10/0", &[10, 0, 0], 2)).code(),
        MsgCode::UNAUTHORIZED
    );
    assert_eq!(env.object.value(0, 0), Some(Value::Int(3)));
}

#[test]
fn test_object_read_skips_unauthorized_instances() {
    let mut env = env(&[1, 2], &[(1, AccessMask::OWNER_DEFAULT), (2, AccessMask::READ)]);
    env.object.add_instance(1, &[(0, Value::Int(7))]);
    let response = env.perform(request(2, Action::Read, "/10"));
    assert_eq!(response.code(), MsgCode::CONTENT);
    let paths: Vec<String> = values(&response).into_iter().map(|(path, _)| path).collect();
    assert_eq!(paths, vec!["/10/0/0".to_string(), "/10/0/1".to_string()]);
}

#[test]
fn test_bootstrap_server_bypasses_acl() {
    let mut env = env(&[1, 2], &[(1, AccessMask::READ)]);
    assert_eq!(
        env.perform(request(SSID_BOOTSTRAP, Action::Delete, "/10/0")).code(),
        MsgCode::DELETED
    );
    assert!(!env.object.has_instance(0));
    // the AC instance of the removed target goes with it
    assert!(!env.ac().has_instance(0));
    assert!(env.ac().has_instance(1));
}

#[test]
fn test_create_adds_access_control_instance() {
    let mut env = env(&[1, 2], &[(1, AccessMask::OWNER_DEFAULT)]);
    let response = env.perform(with_entries(
        2,
        Action::Create,
        "/10",
        &[WireEntry::value(&[10, u16::MAX, 0], Value::Int(5))],
    ));
    assert_eq!(response.code(), MsgCode::CREATED);
    assert_eq!(response.location_path, vec!["10".to_string(), "1".to_string()]);

    assert_eq!(env.ac().ac_target(2), Some((10, 1, 2)));
    assert_eq!(env.ac().acl(2), vec![(2, AccessMask::OWNER_DEFAULT)]);
    assert_eq!(
        env.perform(write_value(2, "/10/1", &[10, 1, 0], 6)).code(),
        MsgCode::CHANGED
    );

    let created_ac = env
        .hooks
        .log()
        .notifications
        .iter()
        .any(|(_, queue)| {
            queue
                .get(2)
                .is_some_and(|entry| entry.instance_set_changes.known_added_iids.contains(&2))
        });
    assert!(created_ac);
}

#[test]
fn test_create_needs_create_right() {
    let mut env = env(&[1, 2], &[(1, AccessMask::OWNER_DEFAULT)]);
    env.ac().set_multiple(
        1,
        lwm2m_dm::ids::rid::access_control::ACL,
        &[(1, Value::Int(i64::from(AccessMask::CREATE.bits())))],
    );
    let response = env.perform(request(2, Action::Create, "/10"));
    assert_eq!(response.code(), MsgCode::UNAUTHORIZED);
    assert_eq!(env.object.instance_ids(), vec![0]);
    assert_eq!(env.ac().instance_ids(), vec![0, 1]);
}

#[test]
fn test_access_control_object_rules() {
    let mut env = env(&[1, 2], &[(1, AccessMask::OWNER_DEFAULT), (2, AccessMask::READ)]);
    let grant_write = |ssid| write_value(ssid, "/2/0", &[2, 0, 2, 2], 3);

    assert_eq!(
        env.perform(request(2, Action::Read, "/2/0")).code(),
        MsgCode::CONTENT
    );
    assert_eq!(env.perform(grant_write(2)).code(), MsgCode::UNAUTHORIZED);
    assert_eq!(
        env.perform(request(1, Action::Delete, "/2/0")).code(),
        MsgCode::UNAUTHORIZED
    );
    assert_eq!(env.perform(grant_write(1)).code(), MsgCode::CHANGED);
    assert_eq!(
        env.ac().acl(0),
        vec![
            (1, AccessMask::OWNER_DEFAULT),
            (2, AccessMask::READ | AccessMask::WRITE)
        ]
    );

    // ACL changes look like instance set changes of the target Object
    let target_notified = env.hooks.log().notifications.iter().any(|(origin, queue)| {
        *origin == 1
            && queue
                .get(10)
                .is_some_and(|entry| entry.instance_set_changes.instance_set_changed)
    });
    assert!(target_notified);
    assert_eq!(
        env.perform(write_value(2, "/10/0", &[10, 0, 0], 9)).code(),
        MsgCode::CHANGED
    );
}

#[test]
fn test_access_control_can_be_disabled() {
    let config = DmConfig {
        access_control: false,
        ..DmConfig::default()
    };
    let mut env = env_with_config(config, &[1, 2], Some(&[(1, AccessMask::OWNER_DEFAULT)][..]));
    assert_eq!(
        env.perform(write_value(2, "/10/0", &[10, 0, 0], 1)).code(),
        MsgCode::CHANGED
    );
    assert_eq!(
        env.perform(request(2, Action::Create, "/10")).code(),
        MsgCode::CREATED
    );
    assert_eq!(env.ac().instance_ids(), vec![0, 1]);
}

#[test]
fn test_owner_reelected_when_owner_server_disappears() {
    let mut env = env(
        &[1, 2, 3],
        &[
            (1, AccessMask::OWNER_DEFAULT),
            (2, AccessMask::WRITE | AccessMask::DELETE),
            (3, AccessMask::WRITE),
        ],
    );
    // Security instance 1 belongs to SSID 1
    assert!(env.security.remove_instance(1));
    env.dm.notify_instances_changed(0);
    env.dm.flush_scheduled_notifications().unwrap();

    assert_eq!(env.ac().ac_target(0), Some((10, 0, 2)));
    assert_eq!(
        env.ac().acl(0),
        vec![
            (2, AccessMask::WRITE | AccessMask::DELETE),
            (3, AccessMask::WRITE)
        ]
    );
}

#[test]
fn test_owner_election_tie_goes_to_later_entry() {
    let mut env = env(
        &[1, 2, 3],
        &[
            (1, AccessMask::OWNER_DEFAULT),
            (2, AccessMask::WRITE),
            (3, AccessMask::DELETE),
        ],
    );
    assert!(env.security.remove_instance(1));
    env.dm.notify_instances_changed(0);
    env.dm.flush_scheduled_notifications().unwrap();
    assert_eq!(env.ac().ac_target(0), Some((10, 0, 3)));
}

#[test]
fn test_sync_is_idempotent() {
    let mut env = env(&[1, 2], &[(1, AccessMask::OWNER_DEFAULT), (2, AccessMask::READ)]);
    // Security instance 2 belongs to SSID 2
    assert!(env.security.remove_instance(2));
    let mut queue = NotifyQueue::new();
    queue.instance_set_unknown_change(0);

    env.dm.sync_access_control(SSID_BOOTSTRAP, &queue).unwrap();
    assert_eq!(env.ac().acl(0), vec![(1, AccessMask::OWNER_DEFAULT)]);
    let state = env.ac().state();
    let notifications = env.hooks.log().notifications.len();
    assert!(notifications > 0);

    env.dm.sync_access_control(SSID_BOOTSTRAP, &queue).unwrap();
    assert_eq!(env.ac().state(), state);
    assert_eq!(env.hooks.log().notifications.len(), notifications);
}

#[test]
fn test_default_entry_can_be_elected_owner() {
    let mut env = env(
        &[1, 2],
        &[
            (1, AccessMask::OWNER_DEFAULT),
            (0, AccessMask::WRITE | AccessMask::DELETE),
            (2, AccessMask::READ),
        ],
    );
    assert!(env.security.remove_instance(1));
    env.dm.notify_instances_changed(0);
    env.dm.flush_scheduled_notifications().unwrap();
    assert_eq!(env.ac().ac_target(0), Some((10, 0, 0)));
}

#[test]
fn test_duplicate_ac_target_is_removed() {
    let mut env = env(&[1, 2], &[(1, AccessMask::OWNER_DEFAULT)]);
    env.ac()
        .add_ac_instance(5, (TEST_OID, 0), 2, &[(2, AccessMask::OWNER_DEFAULT)]);
    env.dm.notify_instances_changed(TEST_OID);
    env.dm.flush_scheduled_notifications().unwrap();

    assert_eq!(env.ac().instance_ids(), vec![0, 1]);
    assert_eq!(env.ac().ac_target(0), Some((10, 0, 1)));
}

#[test]
fn test_added_instance_with_ac_instance_is_left_alone() {
    let mut env = env(&[1, 2], &[(1, AccessMask::OWNER_DEFAULT)]);
    env.object.add_instance(3, &[(0, Value::Int(3))]);
    env.ac()
        .add_ac_instance(7, (TEST_OID, 3), 2, &[(2, AccessMask::OWNER_DEFAULT)]);

    let mut queue = NotifyQueue::new();
    queue.instance_created(TEST_OID, 3);
    env.dm.sync_access_control(1, &queue).unwrap();

    assert_eq!(env.ac().instance_ids(), vec![0, 1, 7]);
    assert_eq!(env.ac().ac_target(7), Some((10, 3, 2)));
    assert_eq!(env.ac().acl(7), vec![(2, AccessMask::OWNER_DEFAULT)]);
}

#[cfg(feature = "discover")]
#[test]
fn test_discover_needs_no_rights() {
    let mut env = env(&[1, 2, 3], &[(1, AccessMask::OWNER_DEFAULT)]);
    let response = env.perform(request(3, Action::Discover, "/10/0"));
    assert_eq!(response.code(), MsgCode::CONTENT);
}
