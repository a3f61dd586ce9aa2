use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use steam_protocol::kv::KeyValue;
use steam_protocol::protocol::emsg::EMsg;
use steam_protocol::protocol::message::{Message, ProtoMessage};
use steam_protocol::protocol::packet::Packet;
use steam_protocol::protocol::proto::CMsgClientLogon;

fn logon() -> ProtoMessage<CMsgClientLogon> {
    ProtoMessage::new(
        EMsg::ClientLogon,
        CMsgClientLogon {
            protocol_version: Some(65575),
            account_name: Some("bench_user".into()),
            password: Some("hunter2".into()),
            client_language: Some("english".into()),
            machine_id: Some(vec![0u8; 180]),
            ..Default::default()
        },
    )
}

#[allow(clippy::unwrap_used)]
fn bench_proto_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("proto_message");

    group.bench_function("serialize", |b| {
        b.iter_batched(logon, |msg| msg.to_bytes(), BatchSize::SmallInput)
    });

    let blob = logon().to_bytes();
    group.bench_function("deserialize", |b| {
        b.iter(|| {
            let packet = Packet::new(blob.clone()).unwrap();
            let _ = packet.read_proto::<CMsgClientLogon>().unwrap();
        })
    });

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_keyvalue(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyvalue");

    let mut tree = KeyValue::root("MessageObject");
    let root = tree.root_id();
    for i in 0..32 {
        let child = tree.add_object(root, format!("obj{i}"));
        tree.add_string(child, "name", "a".repeat(40));
        tree.add_uint64(child, "id", i);
    }

    group.bench_function("encode", |b| b.iter(|| tree.to_bytes().unwrap()));

    let blob = tree.to_bytes().unwrap();
    group.bench_function("decode", |b| b.iter(|| KeyValue::from_bytes(&blob).unwrap()));

    group.finish();
}

criterion_group!(benches, bench_proto_message, bench_keyvalue);
criterion_main!(benches);
