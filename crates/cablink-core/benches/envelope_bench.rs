//! Criterion benchmarks for envelope framing and category body encoding.
//!
//! The transport thread frames and unframes every envelope, and categories
//! (de)serialize every body, so both sit on the per-message hot path.
//!
//! Run with:
//! ```bash
//! cargo bench --package cablink-core --bench envelope_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cablink_core::protocol::{
    decode_body, decode_envelope, encode_body, encode_envelope, ButtonPanelEvent,
    ConnectedDevice, GroupResult, GroupsReply, ResourceErrorCode, ResourceEvent,
    ResourceRequest, ResourceResponse,
};
use cablink_core::{CategoryId, DeviceRef, DeviceType, Envelope, GroupId, Priority};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn button_pressed() -> ButtonPanelEvent {
    ButtonPanelEvent::ButtonPressed {
        panel_id: 1,
        button_id: 12,
    }
}

fn acquire_groups() -> ResourceRequest {
    ResourceRequest::AcquireGroups {
        device: DeviceRef::new(DeviceType::LightBezel, Some(2)),
        groups: (0..8).map(GroupId).collect(),
        priority: Priority::High,
    }
}

fn mixed_groups_reply() -> ResourceResponse {
    ResourceResponse::AcquireGroups(GroupsReply {
        code: ResourceErrorCode::Success,
        description: String::new(),
        results: (0..8)
            .map(|i| GroupResult {
                group: GroupId(i),
                code: if i % 3 == 0 {
                    ResourceErrorCode::Queued
                } else {
                    ResourceErrorCode::Success
                },
            })
            .collect(),
    })
}

fn device_list_32() -> ResourceResponse {
    ResourceResponse::ConnectedDevices(
        (0..32)
            .map(|i| ConnectedDevice {
                device: DeviceRef::new(DeviceType::ReelShelf, Some(i)),
                groups: (0..4).map(GroupId).collect(),
            })
            .collect(),
    )
}

fn device_acquired() -> ResourceEvent {
    ResourceEvent::DeviceAcquired {
        device: DeviceRef::new(DeviceType::ButtonPanel, Some(1)),
        groups: Vec::new(),
    }
}

fn body(message: &impl serde::Serialize) -> Vec<u8> {
    encode_body(message).expect("fixture encodes")
}

fn envelopes() -> Vec<(&'static str, Envelope)> {
    vec![
        (
            "ButtonPressed",
            Envelope::event(CategoryId::BUTTON_PANEL, body(&button_pressed())),
        ),
        (
            "AcquireGroups(8)",
            Envelope::request(
                CategoryId::RESOURCE_MANAGEMENT,
                7,
                body(&acquire_groups()),
            ),
        ),
        (
            "ConnectedDevices(32)",
            Envelope::response(
                CategoryId::RESOURCE_MANAGEMENT,
                7,
                body(&device_list_32()),
            ),
        ),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Frames and unframes envelopes of increasing body size.
fn bench_framing(c: &mut Criterion) {
    let mut encode = c.benchmark_group("encode_envelope");
    for (name, envelope) in envelopes() {
        encode.bench_with_input(BenchmarkId::new("env", name), &envelope, |b, env| {
            b.iter(|| encode_envelope(black_box(env)).expect("encode must succeed"))
        });
    }
    encode.finish();

    let mut decode = c.benchmark_group("decode_envelope");
    for (name, envelope) in envelopes() {
        let bytes = encode_envelope(&envelope).expect("encode must succeed for setup");
        decode.bench_with_input(BenchmarkId::new("env", name), &bytes, |b, bytes| {
            b.iter(|| decode_envelope(black_box(bytes)).expect("decode must succeed"))
        });
    }
    decode.finish();
}

/// Decodes bodies into their category message families.
fn bench_bodies(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_body");

    let event = encode_body(&device_acquired()).expect("setup");
    group.bench_function("ResourceEvent", |b| {
        b.iter(|| {
            decode_body::<ResourceEvent>(CategoryId::RESOURCE_MANAGEMENT, black_box(&event))
                .expect("decode")
        })
    });

    let reply = encode_body(&mixed_groups_reply()).expect("setup");
    group.bench_function("GroupsReply(8)", |b| {
        b.iter(|| {
            decode_body::<ResourceResponse>(CategoryId::RESOURCE_MANAGEMENT, black_box(&reply))
                .expect("decode")
        })
    });

    group.finish();
}

/// The full inbound path for a button press: bytes to typed event.
fn bench_inbound_button_press(c: &mut Criterion) {
    let bytes = encode_envelope(&Envelope::event(
        CategoryId::BUTTON_PANEL,
        encode_body(&button_pressed()).expect("setup"),
    ))
    .expect("setup");

    c.bench_function("inbound_button_press", |b| {
        b.iter(|| {
            let (envelope, _) = decode_envelope(black_box(&bytes)).unwrap();
            decode_body::<ButtonPanelEvent>(envelope.category, &envelope.body).unwrap()
        })
    });
}

criterion_group!(benches, bench_framing, bench_bodies, bench_inbound_button_press);
criterion_main!(benches);
