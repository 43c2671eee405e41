//! Access Control lookup cost
//!
//! Reads one instance through the dispatcher with a growing number of
//! servers in the ACL, which is the path every request by a non-bootstrap
//! server takes.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use lwm2m_dm::access::AccessMask;
use lwm2m_dm::{Action, DataModel, DmConfig, MsgCode, Request, UriPath, Value};
use lwm2m_dm_mock::{standard, BincodeCodec};

fn data_model(servers: u16) -> DataModel {
    let mut dm = DataModel::new(DmConfig::default()).with_codec(Box::new(BincodeCodec));

    let security = standard::security_object();
    let server = standard::server_object();
    let access = standard::access_control_object();
    let object = standard::test_object(10);
    security.handle().add_security_instance(0, 0, true);
    let acl: Vec<_> = (1..=servers).map(|ssid| (ssid, AccessMask::READ)).collect();
    for ssid in 1..=servers {
        security.handle().add_security_instance(ssid, ssid, false);
        server.handle().add_server_instance(ssid - 1, ssid);
    }
    object.handle().add_instance(0, &[(0, Value::Int(1))]);
    access.handle().add_ac_instance(0, (10, 0), 1, &acl);

    for obj in [security, server, object, access] {
        dm.register_object(Box::new(obj)).expect("register object");
    }
    dm
}

fn bench_acl_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("acl_lookup");
    for servers in [2u16, 8, 32] {
        let mut dm = data_model(servers);
        let request = Request::new(servers, Action::Read, UriPath::instance(10, 0));
        assert_eq!(dm.perform(&request).code(), MsgCode::CONTENT);
        group.bench_with_input(BenchmarkId::from_parameter(servers), &request, |b, request| {
            b.iter(|| dm.perform(black_box(request)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_acl_lookup);
criterion_main!(benches);
