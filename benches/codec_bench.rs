use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use network_rpc::core::codec::{BincodeCodec, Codec, JsonCodec, MessagePackCodec};
use network_rpc::core::message::Message;
use network_rpc::{rpc_args, Request, Response, Value};

fn sample_messages() -> Vec<Message> {
    vec![
        Message::Request(Request::new("Calc.Add", rpc_args![10, 20])),
        Message::Request(Request::new(
            "Store.Put",
            rpc_args!["key", Value::Bytes(vec![0xAB; 1024])],
        )),
        Message::Response(Response::Ok(Value::List(vec![Value::Float(2.5); 64]))),
        Message::Response(Response::error("division by zero")),
    ]
}

fn bench_codecs(c: &mut Criterion) {
    let codecs: [&dyn Codec; 3] = [&BincodeCodec, &JsonCodec, &MessagePackCodec];
    let messages = sample_messages();

    for codec in codecs {
        let mut group = c.benchmark_group(format!("codec_{}", codec.name()));

        group.bench_function("encode", |b| {
            b.iter_batched(
                || messages.clone(),
                |msgs| {
                    let mut buf = BytesMut::new();
                    for m in &msgs {
                        codec.encode(m, &mut buf).unwrap();
                    }
                    buf
                },
                BatchSize::SmallInput,
            )
        });

        let mut encoded = BytesMut::new();
        for m in &messages {
            codec.encode(m, &mut encoded).unwrap();
        }
        group.bench_function("decode", |b| {
            b.iter_batched(
                || encoded.clone(),
                |mut buf| {
                    while let Some(m) = codec.decode(&mut buf).unwrap() {
                        criterion::black_box(m);
                    }
                },
                BatchSize::SmallInput,
            )
        });

        group.finish();
    }
}

criterion_group!(benches, bench_codecs);
criterion_main!(benches);
