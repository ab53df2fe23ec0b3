mod common;

use std::cell::{Cell, RefCell};

use serde_json::{Value, json};
use tabular_qa::{
    codegen::{CodeGenerator, GeneratedAnswer},
    dataset::Dataset,
    error::{AnswerError, ValueKind},
    pipeline::{Coordinator, Resolver},
    response::Response,
    trace::MemoryTrace,
};

use common::{dataset, race_results, scores};

/// Records every call and replies with a fixed answer.
struct ScriptedGenerator {
    calls: Cell<usize>,
    questions: RefCell<Vec<String>>,
    reply: Result<GeneratedAnswer, AnswerError>,
}

impl ScriptedGenerator {
    fn answering(answer: Value, code: &str) -> Self {
        Self {
            calls: Cell::new(0),
            questions: RefCell::new(Vec::new()),
            reply: Ok(GeneratedAnswer {
                answer,
                code: Some(code.to_string()),
            }),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            calls: Cell::new(0),
            questions: RefCell::new(Vec::new()),
            reply: Err(AnswerError::collaborator(message)),
        }
    }
}

impl CodeGenerator for ScriptedGenerator {
    fn ask(&self, question: &str, _dataset: &Dataset) -> Result<GeneratedAnswer, AnswerError> {
        self.calls.set(self.calls.get() + 1);
        self.questions.borrow_mut().push(question.to_string());
        self.reply.clone()
    }
}

fn answer_text(data: &Dataset, question: &str) -> String {
    Resolver::new()
        .answer(data, question)
        .expect("question should be answerable")
        .sentence()
}

#[test]
fn averages_the_two_most_recent_years() {
    let data = dataset(scores());
    let answer = Resolver::new()
        .answer(&data, "average score for the past 2 years")
        .unwrap();
    assert_eq!(answer.years, vec![2022, 2021]);
    assert_eq!(answer.target_column, "score");
    assert_eq!(answer.year_column, "year");
    assert_eq!(answer.rows_used, 2);
    assert_eq!(answer.sentence(), "Average score over past 2 years: 25.0000");
}

#[test]
fn window_larger_than_history_uses_every_year() {
    let data = dataset(scores());
    let answer = Resolver::new()
        .answer(&data, "average score for the past 10 years")
        .unwrap();
    assert_eq!(answer.years, vec![2022, 2021, 2020]);
    assert_eq!(answer.sentence(), "Average score over past 10 years: 20.0000");
}

#[test]
fn duration_columns_average_to_truncated_clock_time() {
    let data = dataset(race_results());
    assert_eq!(
        answer_text(&data, "average finish time for the past 1 years"),
        "Average finish_time over past 1 years: 1:59:52"
    );
}

#[test]
fn tables_without_years_report_missing_year_column() {
    let data = dataset(json!([
        {"name": "a", "score": 1},
        {"name": "b", "score": 2}
    ]));
    let err = Resolver::new()
        .answer(&data, "average score for the past 2 years")
        .unwrap_err();
    assert_eq!(err, AnswerError::NoYearColumn);
    assert_eq!(err.to_string(), "Could not detect a 'year' column.");
}

#[test]
fn unsupported_question_without_fallback_is_terminal() {
    let data = dataset(scores());
    let err = Coordinator::deterministic(Resolver::new())
        .respond(&data, "what is the max score")
        .unwrap_err();
    assert_eq!(err, AnswerError::UnsupportedQuestion);
    let payload = serde_json::to_value(Response::from(err)).unwrap();
    assert_eq!(
        payload,
        json!({"error": "Question not supported by deterministic aggregator."})
    );
}

#[test]
fn unsupported_question_is_delegated_exactly_once() {
    let data = dataset(scores());
    let generator = ScriptedGenerator::answering(json!("30"), "print(df['score'].max())");
    let trace = MemoryTrace::new();
    let resolver = Resolver::new().with_trace(&trace);
    let outcome = Coordinator::with_fallback(resolver, &generator)
        .respond(&data, "what is the max score")
        .unwrap();

    assert_eq!(generator.calls.get(), 1);
    assert!(
        generator.questions.borrow()[0].ends_with("what is the max score"),
        "the original question is forwarded inside the wrapped prompt"
    );
    assert_eq!(
        serde_json::to_value(Response::from(outcome)).unwrap(),
        json!({"answer": "30", "code": "print(df['score'].max())"})
    );
    assert_eq!(
        trace.step_names(),
        vec!["failed", "delegated_to_fallback"]
    );
}

#[test]
fn collaborator_errors_are_forwarded_without_retry() {
    let data = dataset(scores());
    let generator = ScriptedGenerator::failing("Code generation failed: offline");
    let err = Coordinator::with_fallback(Resolver::new(), &generator)
        .respond(&data, "how many rows are there")
        .unwrap_err();
    assert_eq!(generator.calls.get(), 1);
    assert_eq!(err.to_string(), "Code generation failed: offline");
    assert!(!err.is_deterministic());
}

#[test]
fn every_deterministic_failure_kind_delegates() {
    let cases = [
        (json!([{"name": "x"}]), "average score for the past 1 years"),
        (scores(), "average rebounds for the past 1 years"),
        (
            json!([{"year": 2020, "score": "n/a"}]),
            "average score for the past 1 years",
        ),
    ];
    for (records, question) in cases {
        let data = dataset(records);
        let generator = ScriptedGenerator::answering(json!(1), "df.head()");
        let outcome = Coordinator::with_fallback(Resolver::new(), &generator)
            .respond(&data, question)
            .unwrap();
        assert_eq!(generator.calls.get(), 1, "{question}");
        assert_eq!(outcome.answer, json!(1));
    }
}

#[test]
fn answered_questions_skip_the_generator() {
    let data = dataset(scores());
    let generator = ScriptedGenerator::answering(json!("unused"), "unused");
    let outcome = Coordinator::with_fallback(Resolver::new(), &generator)
        .respond(&data, "average score for the past 2 years")
        .unwrap();
    assert_eq!(generator.calls.get(), 0);
    assert_eq!(
        serde_json::to_value(Response::from(outcome)).unwrap(),
        json!({"answer": "Average score over past 2 years: 25.0000", "code": null})
    );
}

#[test]
fn named_year_column_wins_over_earlier_year_range_column() {
    let data = dataset(json!([
        {"founded": 1999, "Season Year": 2020, "points": 5},
        {"founded": 1999, "Season Year": 2021, "points": 7}
    ]));
    let answer = Resolver::new()
        .answer(&data, "average points for the past 1 years")
        .unwrap();
    assert_eq!(answer.year_column, "Season Year");
    assert_eq!(answer.sentence(), "Average points over past 1 years: 7.0000");
}

#[test]
fn year_range_detection_applies_without_a_named_column() {
    let data = dataset(json!([
        {"id": 1, "season": 2019, "points": 5},
        {"id": 2, "season": 2020, "points": 9}
    ]));
    let answer = Resolver::new()
        .answer(&data, "average points for the past 1 years")
        .unwrap();
    assert_eq!(answer.year_column, "season");
    assert_eq!(answer.rows_used, 1);
}

#[test]
fn zero_year_window_is_empty() {
    let data = dataset(scores());
    let err = Resolver::new()
        .answer(&data, "average score for the past 0 years")
        .unwrap_err();
    assert_eq!(err, AnswerError::EmptyRecencyWindow);
}

#[test]
fn oversized_year_count_covers_every_year() {
    let data = dataset(scores());
    let answer = Resolver::new()
        .answer(&data, "average score for the past 99999999999999999999 years")
        .unwrap();
    assert_eq!(answer.years, vec![2022, 2021, 2020]);
    assert_eq!(answer.rows_used, 3);
}

#[test]
fn years_without_values_are_reported() {
    let data = dataset(json!([
        {"year": "unknown", "score": 1},
        {"year": null, "score": 2}
    ]));
    let err = Resolver::new()
        .answer(&data, "average score for the past 2 years")
        .unwrap_err();
    assert_eq!(err, AnswerError::NoValidYears);
}

#[test]
fn unparseable_durations_fail_as_time_aggregation() {
    let data = dataset(json!([
        {"year": 2022, "lap time": "fast"},
        {"year": 2022, "lap time": "slow"}
    ]));
    let err = Resolver::new()
        .answer(&data, "average lap time for the past 1 years")
        .unwrap_err();
    assert_eq!(
        err,
        AnswerError::AggregationFailed {
            column: "lap time".into(),
            kind: ValueKind::Duration,
        }
    );
    assert_eq!(
        err.to_string(),
        "Deterministic aggregator error: Could not compute average of time column"
    );
}

#[test]
fn rows_outside_the_window_never_leak_in() {
    let data = dataset(json!([
        {"year": 2022, "score": 100},
        {"year": 2018, "score": 0},
        {"year": 2021, "score": 50},
        {"year": 2022, "score": 0}
    ]));
    let answer = Resolver::new()
        .answer(&data, "average score for the past 2 years")
        .unwrap();
    assert_eq!(answer.rows_used, 3);
    assert_eq!(answer.sentence(), "Average score over past 2 years: 50.0000");
}

#[test]
fn resolution_is_repeatable_and_input_is_untouched() {
    let data = dataset(scores());
    let before = data.clone();
    let first = Resolver::new()
        .answer(&data, "Average SCORE for the past 2 year")
        .unwrap();
    let second = Resolver::new()
        .answer(&data, "Average SCORE for the past 2 year")
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(data, before);
}
