use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use liteorm::{ChangeSet, Changes, EntitySchema, FieldKind, Record, UpdatePlan};

fn schema() -> EntitySchema {
    EntitySchema::builder("counters")
        .primary_key("id", FieldKind::Integer)
        .field("name", FieldKind::Text)
        .field("count", FieldKind::Integer)
        .nullable_field("note", FieldKind::Text)
        .build()
        .unwrap()
}

/// Alternate `$inc`, `$set` and mixed rows so every projection gets CASE arms.
fn changes_for(i: usize) -> Changes {
    match i % 3 {
        0 => Changes::new().inc("count", 1),
        1 => Changes::new().set("name", format!("n{i}")),
        _ => Changes::new().inc("count", 2).set("note", "x"),
    }
}

fn bench_compile(c: &mut Criterion) {
    let schema = schema();
    let mut group = c.benchmark_group("staging/compile");

    for n in [10, 100, 1_000] {
        let mut items: Vec<Record> = (0..n).map(|_| Record::new()).collect();
        let change_sets: Vec<ChangeSet<'_, Record>> = items
            .iter_mut()
            .enumerate()
            .map(|(i, item)| ChangeSet::new(&schema, i as i64 + 1, changes_for(i), item).unwrap())
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &change_sets, |b, sets| {
            b.iter(|| black_box(UpdatePlan::compile(&schema, sets).unwrap()));
        });
    }

    group.finish();
}

fn bench_select_sql(c: &mut Criterion) {
    let schema = schema();
    let mut group = c.benchmark_group("staging/select_sql");

    for n in [10, 100, 1_000] {
        let mut items: Vec<Record> = (0..n).map(|_| Record::new()).collect();
        let change_sets: Vec<ChangeSet<'_, Record>> = items
            .iter_mut()
            .enumerate()
            .map(|(i, item)| ChangeSet::new(&schema, i as i64 + 1, changes_for(i), item).unwrap())
            .collect();
        let plan = UpdatePlan::compile(&schema, &change_sets).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &plan, |b, plan| {
            b.iter(|| black_box(plan.select_sql(&schema, 0..n)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_select_sql);
criterion_main!(benches);
