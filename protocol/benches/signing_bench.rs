// Build, sign and grind benchmarks for Quarry.
//
// One grind attempt is compile + sign + serialize + predicate, so those are
// measured separately and then together through the engine against the
// in-memory ledger. Holding-account derivation is here too because a token
// build does it twice.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use quarry_protocol::crypto::{Keypair, Pubkey};
use quarry_protocol::grind::{GrindEngine, GrindPolicy, SignaturePattern, TransferRequest};
use quarry_protocol::network::InMemoryGateway;
use quarry_protocol::transaction::instructions::system_transfer;
use quarry_protocol::transaction::{
    associated_token_address, sign_transaction, Hash, Message, Transaction,
};
use quarry_protocol::vault::usdc;
use quarry_protocol::{Identity, Network};

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("ed25519/keypair_generate", |b| {
        b.iter(Keypair::generate);
    });
}

fn bench_compile_message(c: &mut Criterion) {
    let payer = Keypair::generate().pubkey();
    let to = Pubkey::new_from_array([7u8; 32]);
    let ix = [system_transfer(&payer, &to, 100_000)];
    let blockhash = Hash::new_from_array([9u8; 32]);

    c.bench_function("message/compile_native_transfer", |b| {
        b.iter(|| Message::compile(&ix, &payer, blockhash).unwrap());
    });
}

fn bench_sign_transaction(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let to = Pubkey::new_from_array([7u8; 32]);
    let ix = [system_transfer(&keypair.pubkey(), &to, 100_000)];
    let blockhash = Hash::new_from_array([9u8; 32]);
    let message = Message::compile(&ix, &keypair.pubkey(), blockhash).unwrap();

    c.bench_function("transaction/sign_and_serialize", |b| {
        b.iter(|| {
            let mut tx = Transaction::new_unsigned(message.clone());
            sign_transaction(&mut tx, &keypair).unwrap();
            tx.serialize().unwrap()
        });
    });
}

fn bench_holding_account(c: &mut Criterion) {
    let owner = Keypair::generate().pubkey();
    let mint = usdc(Network::Mainnet).mint;

    c.bench_function("pda/associated_token_address", |b| {
        b.iter(|| associated_token_address(&owner, &mint).unwrap());
    });
}

fn bench_grind_attempts(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let identity = Identity::create();
    let request = TransferRequest::native(Keypair::generate().pubkey().to_string(), 1_000);
    // One in 58^10. Every run uses its whole budget.
    let never = SignaturePattern::prefix("zzzzzzzzzz").unwrap().into_predicate();

    let mut group = c.benchmark_group("grind/exhaust");
    for budget in [10u32, 100] {
        group.throughput(Throughput::Elements(u64::from(budget)));
        group.bench_with_input(BenchmarkId::from_parameter(budget), &budget, |b, &budget| {
            let gateway = InMemoryGateway::new(Network::Devnet);
            let policy = GrindPolicy::default()
                .no_delays()
                .with_attempt_budget(budget);
            let engine = GrindEngine::new(&gateway, policy);
            b.iter(|| rt.block_on(engine.grind(&identity, &request, &never)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_compile_message,
    bench_sign_transaction,
    bench_holding_account,
    bench_grind_attempts,
);
criterion_main!(benches);
