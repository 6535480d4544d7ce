#![allow(clippy::expect_used)]

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use keyrotor_keys::{
    AesGcmEncryptor, FixedTtlPolicy, KeyManager, PrivateKey,
    der::{der_to_raw, raw_to_der},
};
use keyrotor_storage::{Alg, MemoryKeyStore};
use tokio::runtime::Runtime;

const MESSAGE: &[u8] = b"eyJhbGciOiJFUzI1NiJ9.eyJzdWIiOiJiZW5jaCJ9";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rt() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime")
}

fn manager(rt: &Runtime) -> KeyManager {
    rt.block_on(async {
        let manager = KeyManager::new(
            MemoryKeyStore::new(),
            AesGcmEncryptor::new(&[0x42; 32]).expect("encryptor"),
            FixedTtlPolicy::new(Duration::from_secs(3600)),
        )
        .await
        .expect("manager");
        manager.init_keys(&Alg::ALL).await.expect("init keys");
        manager
    })
}

// ---------------------------------------------------------------------------
// 1. primitives
// ---------------------------------------------------------------------------

fn primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    for alg in Alg::ALL {
        let key = PrivateKey::generate(alg).expect("generate");
        let public_key = key.public_key();
        let signature = key.sign(MESSAGE).expect("sign");

        group.bench_with_input(BenchmarkId::new("sign", alg), &key, |b, key| {
            b.iter(|| key.sign(MESSAGE).expect("sign"));
        });
        group.bench_with_input(BenchmarkId::new("verify", alg), &signature, |b, signature| {
            b.iter(|| public_key.verify(alg, MESSAGE, signature).expect("verify"));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. der_codec
// ---------------------------------------------------------------------------

fn der_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("der_codec");
    let raw = PrivateKey::generate(Alg::Es256).expect("generate").sign(MESSAGE).expect("sign");
    let der = raw_to_der(&raw).expect("encode");

    group.bench_function("der_to_raw", |b| b.iter(|| der_to_raw(&der).expect("decode")));
    group.bench_function("raw_to_der", |b| b.iter(|| raw_to_der(&raw).expect("encode")));

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. manager
// ---------------------------------------------------------------------------

fn manager_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager");
    let rt = rt();
    let manager = manager(&rt);

    for alg in Alg::ALL {
        group.bench_function(BenchmarkId::new("sign", alg), |b| {
            b.iter(|| {
                rt.block_on(manager.sign(alg, |_| Ok::<_, String>(MESSAGE.to_vec()))).expect("sign")
            });
        });
    }

    group.bench_function("reload", |b| b.iter(|| rt.block_on(manager.reload()).expect("reload")));
    group.bench_function("jwks_json", |b| b.iter(|| manager.jwks_json().expect("jwks")));

    group.finish();
}

criterion_group!(benches, primitives, der_codec, manager_operations);
criterion_main!(benches);
