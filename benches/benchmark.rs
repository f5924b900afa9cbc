use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cohort::condition::{Condition, Direction, Expr, FieldValue, Predicate, RankingSpec};
use cohort::evaluate::evaluate;
use cohort::roster::{Record, Roster};
use cohort::schema::Operator;

fn synthetic_roster(n: usize) -> Roster {
    let classes = ["A", "B", "C"];
    let records = (0..n)
        .map(|i| Record {
            name: format!("student-{i}"),
            grade: 6 + (i % 4) as i64,
            class_name: classes[i % 3].to_string(),
            quiz_score: (i % 101) as f64,
            homework_submitted: i % 2 == 0,
        })
        .collect();
    Roster::new(records)
}

fn criterion_benchmark(c: &mut Criterion) {
    let roster = synthetic_roster(10_000);

    let filter = Condition::Filter(Expr::And(vec![
        Expr::Compare(Predicate::new("grade", Operator::Eq, FieldValue::Integer(7))),
        Expr::Compare(Predicate::new("quiz_score", Operator::Gte, FieldValue::Number(60.0))),
    ]));
    c.bench_function("filter 10k rows", |b| {
        b.iter(|| evaluate(black_box(&roster), black_box(&filter)))
    });

    let ranking = Condition::Ranking(RankingSpec {
        field: "quiz_score",
        direction: Direction::Max,
        limit: 1,
        pool: Some(Expr::Compare(Predicate::new("grade", Operator::Eq, FieldValue::Integer(7)))),
    });
    c.bench_function("rank 10k rows", |b| {
        b.iter(|| evaluate(black_box(&roster), black_box(&ranking)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
