//! # Field Benchmarks
//!
//! Performance benchmarks for the attesta-core update protocol.
//!
//! Run with: `cargo bench -p attesta-core`

use attesta_core::{
    AttributeStore, Entity, EntityKind, FieldInput, FieldMap, Language, MemoryStore, RawValue,
    RevisionMeta, SourceDraft, SourceId, get_revisions,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const NAME: &str = "Organization_OrganizationName";
const ALIAS: &str = "Organization_OrganizationAlias";

/// Store with one source and one organization.
fn fixture() -> (MemoryStore, Entity, SourceId) {
    let mut store = MemoryStore::new();
    let src = store
        .insert_source(SourceDraft::new("Vanguard"))
        .expect("source")
        .id;
    let map = FieldMap::from([(
        NAME.to_string(),
        FieldInput::new("Acme").with_confidence(2).with_sources([src]),
    )]);
    let (_, validated) =
        Entity::validate_new(&store, EntityKind::Organization, &map).expect("validate");
    let org = Entity::create(
        &mut store,
        EntityKind::Organization,
        &validated,
        &Language::fallback(),
        RevisionMeta::default(),
    )
    .expect("create");
    (store, org, src)
}

fn alias_map(size: usize, offset: usize, src: SourceId) -> FieldMap {
    let raw = RawValue::List(
        (offset..offset + size)
            .map(|i| RawValue::from(format!("alias-{}", i)))
            .collect(),
    );
    FieldMap::from([(
        ALIAS.to_string(),
        FieldInput::new(raw).with_confidence(2).with_sources([src]),
    )])
}

fn bench_single_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_update");
    let en = Language::fallback();

    group.bench_function("changed_value", |b| {
        let (mut store, org, src) = fixture();
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let map = FieldMap::from([(
                NAME.to_string(),
                FieldInput::new(format!("Acme {}", counter))
                    .with_confidence(2)
                    .with_sources([src]),
            )]);
            let (_, validated) = org.validate(&store, &map).expect("validate");
            black_box(
                org.update(&mut store, &validated, &en, RevisionMeta::default())
                    .expect("update"),
            )
        });
    });

    group.bench_function("unchanged_value", |b| {
        let (mut store, org, src) = fixture();
        let map = FieldMap::from([(
            NAME.to_string(),
            FieldInput::new("Acme").with_confidence(2).with_sources([src]),
        )]);
        let (_, validated) = org.validate(&store, &map).expect("validate");
        b.iter(|| {
            black_box(
                org.update(&mut store, &validated, &en, RevisionMeta::default())
                    .expect("update"),
            )
        });
    });

    group.finish();
}

fn bench_list_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_update");
    let en = Language::fallback();

    for size in [10, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (mut store, org, src) = fixture();
            let maps = [alias_map(size, 0, src), alias_map(size, size / 2, src)];
            let validated: Vec<_> = maps
                .iter()
                .map(|map| org.validate(&store, map).expect("validate").1)
                .collect();
            let mut turn = 0usize;
            b.iter(|| {
                turn += 1;
                black_box(
                    org.update(&mut store, &validated[turn % 2], &en, RevisionMeta::default())
                        .expect("update"),
                )
            });
        });
    }

    group.finish();
}

fn bench_revisions(c: &mut Criterion) {
    let mut group = c.benchmark_group("revisions");

    for edits in [10, 100] {
        let (mut store, org, src) = fixture();
        let en = Language::fallback();
        for i in 0..edits {
            let map = FieldMap::from([(
                NAME.to_string(),
                FieldInput::new(format!("Acme {}", i))
                    .with_confidence(2)
                    .with_sources([src]),
            )]);
            let (_, validated) = org.validate(&store, &map).expect("validate");
            org.update(&mut store, &validated, &en, RevisionMeta::default())
                .expect("update");
        }

        group.bench_with_input(BenchmarkId::from_parameter(edits), &store, |b, store| {
            b.iter(|| {
                let count = get_revisions(store, black_box(org.id()))
                    .expect("revisions")
                    .count();
                black_box(count)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_update,
    bench_list_update,
    bench_revisions
);
criterion_main!(benches);
