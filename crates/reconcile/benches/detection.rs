use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use remitflow_providers::ProviderId;
use remitflow_reconcile::{
    ConflictCategory, InvoiceRecord, RecordId, RecordSet, StageSequencer, detect_next_conflict,
    group_records,
};

const TAX_IDS: [&str; 4] = ["B12345674", "B99999999", "12345678Z", "X1234567L"];

/// `n` records spread over a handful of providers. Every tenth record has an
/// ambiguous contact, every seventh an account mismatch, every fifth no city.
fn sample(n: u32) -> RecordSet {
    let records = (1..=n)
        .map(|i| {
            let mut r = InvoiceRecord::new(RecordId(i));
            r.provider_id = ProviderId::parse(TAX_IDS[(i as usize) % TAX_IDS.len()]).ok();
            r.provider_name = Some(format!("Provider {}", i % 4));
            r.payment_account = Some("ES9121000418450200051332".to_string());
            r.directory_account_snapshot = Some("ES5700811234560001234567".to_string());
            r.amount_cents = 10_000 + u64::from(i);
            r.contact_email = Some(if i % 10 == 0 {
                "a@x.com, b@x.com".to_string()
            } else {
                "a@x.com".to_string()
            });
            r.iban_mismatch = i % 7 == 0;
            r.address = Some("Calle Mayor 1".to_string());
            r.city = (i % 5 != 0).then(|| "Bilbao".to_string());
            r.postal_code = Some("48001".to_string());
            r.country = Some("ES".to_string());
            r
        })
        .collect();
    RecordSet::new(records).unwrap()
}

fn bench_detect_next_conflict(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_next_conflict");
    for size in [100u32, 1_000, 10_000] {
        let records = sample(size);
        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| detect_next_conflict(black_box(records)));
        });
    }
    group.finish();
}

fn bench_group_by_provider(c: &mut Criterion) {
    let records = sample(10_000);
    c.bench_function("group_missing_fields_10k", |b| {
        b.iter(|| group_records(ConflictCategory::MissingDirectoryFields, black_box(&records)));
    });
}

fn bench_sequencer_pass(c: &mut Criterion) {
    let records = sample(1_000);
    c.bench_function("sequencer_advance_1k", |b| {
        b.iter(|| {
            let mut seq = StageSequencer::new();
            seq.advance(black_box(&records)).clone()
        });
    });
}

criterion_group!(
    benches,
    bench_detect_next_conflict,
    bench_group_by_provider,
    bench_sequencer_pass
);
criterion_main!(benches);
