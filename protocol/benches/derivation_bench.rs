// Address derivation and signing benchmarks for the REIT custody protocol.
//
// Covers canonical bump search for each record type, explicit-bump
// re-derivation (the per-operation custody check), and Ed25519 signing of
// API payloads.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use reit_protocol::config::{CONFIGS_SEED, INVESTOR_SEED, SCHEME_SEED};
use reit_protocol::crypto::{derive_address, program_id, sign, verify, Address, Keypair};
use reit_protocol::vault::VaultCustodyPair;

fn bench_configs_derivation(c: &mut Criterion) {
    let pid = program_id();

    c.bench_function("derivation/configs", |b| {
        b.iter(|| derive_address(&[CONFIGS_SEED], &pid).unwrap());
    });
}

fn bench_keyed_derivation(c: &mut Criterion) {
    let pid = program_id();
    let owner = Keypair::generate().address();

    c.bench_function("derivation/scheme", |b| {
        b.iter(|| derive_address(&[SCHEME_SEED, owner.as_ref()], &pid).unwrap());
    });
    c.bench_function("derivation/investor", |b| {
        b.iter(|| derive_address(&[INVESTOR_SEED, owner.as_ref()], &pid).unwrap());
    });
}

fn bench_custody_verify(c: &mut Criterion) {
    let pid = program_id();
    let ledger = Address::new([42; 32]);
    let pair = VaultCustodyPair::derive(&ledger, &pid).unwrap();

    c.bench_function("custody/verify_pair", |b| {
        b.iter(|| VaultCustodyPair::verify(&ledger, &pair.authority, &pair.vault, &pid).unwrap());
    });
}

fn bench_payload_signatures(c: &mut Criterion) {
    let mut group = c.benchmark_group("ed25519/payload");

    for size in [64usize, 256, 1024] {
        let keypair = Keypair::generate();
        let payload = vec![0x5Au8; size];
        let signature = sign(&keypair, &payload);
        let address = keypair.address();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("verify", size), &payload, |b, payload| {
            b.iter(|| verify(&address, payload, &signature));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_configs_derivation,
    bench_keyed_derivation,
    bench_custody_verify,
    bench_payload_signatures,
);
criterion_main!(benches);
