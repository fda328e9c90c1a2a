#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use network_rpc::core::codec::{BincodeCodec, Codec, JsonCodec, MessagePackCodec};

fuzz_target!(|data: &[u8]| {
    // Frame decoding must never panic or loop on arbitrary input
    for codec in [&BincodeCodec as &dyn Codec, &JsonCodec, &MessagePackCodec] {
        let mut buf = BytesMut::from(data);
        while let Ok(Some(_)) = codec.decode(&mut buf) {}
    }
});
