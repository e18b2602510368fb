//! Integration tests for eval module

use super::*;
use crate::config::EvaliteConfig;
use crate::error::EvalError;
use crate::metrics::{ScoreState, sum_token_usage};
use crate::scorer::{FnScorer, Levenshtein, NumericDifference, Score, ScoreInput};
use crate::trace::{TokenUsage, TraceEvent, report_trace};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

fn concat_rows() -> Vec<DatasetRow<String, String>> {
    vec![
        DatasetRow::new("abc".to_string(), "abcdef".to_string()),
        DatasetRow::new("xyz".to_string(), "xyzdef".to_string()),
        DatasetRow::new("hello".to_string(), "hellodef".to_string()),
    ]
}

/// Golden test: the traced concatenation evaluation
#[tokio::test]
async fn golden_traces_eval() {
    let definition = EvaluationDefinition::<String, String, String>::builder("Traces")
        .rows(vec![DatasetRow::new("abc".to_string(), "abcdef".to_string())])
        .task(|input: String| async move {
            report_trace(
                TraceEvent::new(
                    0.0,
                    100.0,
                    json!([
                        {"role": "system", "content": "You are a helpful assistant."},
                        {"role": "user", "content": input},
                    ]),
                    json!("abcdef"),
                )
                .with_usage(1, 1),
            )?;
            Ok::<_, anyhow::Error>("abcdef".to_string())
        })
        .scorer(Levenshtein)
        .build()
        .unwrap();

    let run = Evaluator::new().run_evaluation(&definition).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.results.len(), 1);
    let result = &run.results[0];
    assert_eq!(result.scores[0].name, "Levenshtein");
    assert_eq!(result.scores[0].score, Some(1.0));
    assert_eq!(result.traces.len(), 1);
    assert_eq!(sum_token_usage(&result.traces), Some(TokenUsage::new(1, 1)));
}

#[tokio::test]
async fn test_zero_scorers_fails_before_any_row() {
    let loads = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let dataset = {
        let loads = loads.clone();
        move || {
            loads.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(concat_rows()) }
        }
    };
    let task = {
        let calls = calls.clone();
        move |input: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, anyhow::Error>(input) }
        }
    };

    let definition = EvaluationDefinition::<String, String, String>::builder("No scorers")
        .data(dataset)
        .task(task)
        .build()
        .unwrap();

    let evaluator = Evaluator::new();
    let err = evaluator.run_evaluation(&definition).await.unwrap_err();

    assert!(matches!(
        err,
        EvalError::Configuration(ref msg) if msg.contains("at least one scorer")
    ));
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(evaluator.history().runs("No scorers").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_expected_is_configuration_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let task = {
        let calls = calls.clone();
        move |input: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, anyhow::Error>(input) }
        }
    };

    let definition = EvaluationDefinition::<String, String, String>::builder("Missing expected")
        .rows(vec![
            DatasetRow::new("abc".to_string(), "abc".to_string()),
            DatasetRow::input_only("def".to_string()),
        ])
        .task(task)
        .scorer(Levenshtein)
        .build()
        .unwrap();

    let evaluator = Evaluator::new();
    let err = evaluator.run_evaluation(&definition).await.unwrap_err();

    match err {
        EvalError::Configuration(msg) => {
            assert!(msg.contains("Levenshtein"), "{msg}");
            assert!(msg.contains("row 1"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!evaluator.is_running("Missing expected"));
    assert!(evaluator.history().runs("Missing expected").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scorer_without_expected_requirement_runs_on_bare_rows() {
    let non_empty = FnScorer::new("NonEmpty", |args: ScoreInput<'_, String, String>| {
        Ok(Score::new(if args.output.is_empty() { 0.0 } else { 1.0 }))
    });
    let definition = EvaluationDefinition::<String, String, String>::builder("Bare rows")
        .rows(vec![DatasetRow::input_only("abc".to_string())])
        .task(|input: String| async move { Ok::<_, anyhow::Error>(input) })
        .scorer(non_empty)
        .build()
        .unwrap();

    let run = Evaluator::new().run_evaluation(&definition).await.unwrap();
    assert_eq!(run.results[0].expected, None);
    assert_eq!(run.results[0].scores[0].score, Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn test_results_keep_dataset_order() {
    let rows: Vec<DatasetRow<u32, u32>> = (0..8).map(|i| DatasetRow::new(i, i)).collect();
    let definition = EvaluationDefinition::<u32, u32, u32>::builder("Order")
        .rows(rows)
        .task(|input: u32| async move {
            // Later rows finish first
            tokio::time::sleep(Duration::from_millis(u64::from(100 - input * 10))).await;
            Ok::<_, anyhow::Error>(input)
        })
        .scorer(NumericDifference)
        .build()
        .unwrap();

    let run = Evaluator::new().run_evaluation(&definition).await.unwrap();

    assert_eq!(run.results.len(), 8);
    for (i, result) in run.results.iter().enumerate() {
        assert_eq!(result.input, json!(i));
        assert_eq!(result.output, Some(json!(i)));
    }
    // Concurrent rows: the run takes as long as the slowest row
    assert!(run.duration < 200, "{}", run.duration);
}

#[tokio::test]
async fn test_task_failure_is_isolated_to_row() {
    let definition = EvaluationDefinition::<String, String, String>::builder("Failures")
        .rows(concat_rows())
        .task(|input: String| async move {
            report_trace(TraceEvent::new(0.0, 1.0, json!(input.clone()), json!(null)))?;
            if input == "xyz" {
                anyhow::bail!("model refused");
            }
            Ok::<_, anyhow::Error>(format!("{input}def"))
        })
        .scorer(Levenshtein)
        .build()
        .unwrap();

    let run = Evaluator::new().run_evaluation(&definition).await.unwrap();

    assert_eq!(run.status, RunStatus::Fail);
    assert_eq!(run.failed_count(), 1);

    let failed = &run.results[1];
    assert_eq!(failed.status, ResultStatus::Fail);
    assert!(failed.error.as_deref().unwrap().contains("model refused"));
    assert_eq!(failed.traces.len(), 1);
    assert!(failed.scores.is_empty());

    for i in [0, 2] {
        assert_eq!(run.results[i].status, ResultStatus::Success);
        assert_eq!(run.results[i].scores[0].score, Some(1.0));
    }
}

#[tokio::test]
async fn test_traces_do_not_cross_rows() {
    let rows: Vec<DatasetRow<u32, u32>> = (0..16).map(|i| DatasetRow::new(i, i)).collect();
    let definition = EvaluationDefinition::<u32, u32, u32>::builder("Isolation")
        .rows(rows)
        .task(|input: u32| async move {
            for step in 0..input % 4 + 1 {
                report_trace(TraceEvent::new(
                    step as f64,
                    step as f64 + 1.0,
                    json!(input),
                    json!(step),
                ))?;
                tokio::task::yield_now().await;
            }
            Ok::<_, anyhow::Error>(input)
        })
        .scorer(NumericDifference)
        .build()
        .unwrap();

    let run = Evaluator::new().run_evaluation(&definition).await.unwrap();

    for (i, result) in run.results.iter().enumerate() {
        let i = i as u32;
        assert_eq!(result.traces.len() as u32, i % 4 + 1);
        assert!(result.traces.iter().all(|t| t.input == json!(i)));
        let steps: Vec<_> = result.traces.iter().map(|t| t.output.clone()).collect();
        let expected: Vec<_> = (0..i % 4 + 1).map(|s| json!(s)).collect();
        assert_eq!(steps, expected);
    }
}

#[tokio::test]
async fn test_dataset_loaded_once_per_run() {
    let loads = Arc::new(AtomicUsize::new(0));
    let dataset = {
        let loads = loads.clone();
        move || {
            loads.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(concat_rows()) }
        }
    };

    let definition = EvaluationDefinition::<String, String, String>::builder("Loads")
        .data(dataset)
        .task(|input: String| async move { Ok::<_, anyhow::Error>(format!("{input}def")) })
        .scorer(Levenshtein)
        .build()
        .unwrap();

    let evaluator = Evaluator::new();
    evaluator.run_evaluation(&definition).await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    evaluator.run_evaluation(&definition).await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_dataset_failure() {
    let definition = EvaluationDefinition::<String, String, String>::builder("Broken data")
        .data(|| async {
            Err::<Vec<DatasetRow<String, String>>, _>(anyhow::anyhow!("no such file"))
        })
        .task(|input: String| async move { Ok::<_, anyhow::Error>(input) })
        .scorer(Levenshtein)
        .build()
        .unwrap();

    let evaluator = Evaluator::new();
    let err = evaluator.run_evaluation(&definition).await.unwrap_err();

    assert!(matches!(err, EvalError::Dataset(ref msg) if msg.contains("no such file")));
    assert!(!evaluator.is_running("Broken data"));
    assert!(evaluator.history().runs("Broken data").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_dataset_succeeds() {
    let definition = EvaluationDefinition::<String, String, String>::builder("Empty")
        .rows(Vec::new())
        .task(|input: String| async move { Ok::<_, anyhow::Error>(input) })
        .scorer(Levenshtein)
        .build()
        .unwrap();

    let run = Evaluator::new().run_evaluation(&definition).await.unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.results.is_empty());
    assert_eq!(run.average_score(), None);
}

#[tokio::test(start_paused = true)]
async fn test_max_concurrency_bounds_rows() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let task = {
        let active = active.clone();
        let peak = peak.clone();
        move |input: u32| {
            let active = active.clone();
            let peak = peak.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(input)
            }
        }
    };

    let rows: Vec<DatasetRow<u32, u32>> = (1..=10).map(|i| DatasetRow::new(i, i)).collect();
    let definition = EvaluationDefinition::<u32, u32, u32>::builder("Bounded")
        .rows(rows)
        .task(task)
        .scorer(NumericDifference)
        .build()
        .unwrap();

    let config = EvaliteConfig::builder().max_concurrency(2).build();
    let run = Evaluator::with_config(config)
        .run_evaluation(&definition)
        .await
        .unwrap();

    assert_eq!(run.results.len(), 10);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert!(run.results.iter().all(|r| r.scores[0].score == Some(1.0)));
}

#[tokio::test(start_paused = true)]
async fn test_task_timeout_from_config() {
    let definition = EvaluationDefinition::<u32, u32, u32>::builder("Timeout")
        .rows(vec![DatasetRow::new(1, 1), DatasetRow::new(2, 2)])
        .task(|input: u32| async move {
            tokio::time::sleep(Duration::from_secs(u64::from(input * 10))).await;
            Ok::<_, anyhow::Error>(input)
        })
        .scorer(NumericDifference)
        .build()
        .unwrap();

    let config = EvaliteConfig::builder()
        .task_timeout(Duration::from_secs(15))
        .build();
    let run = Evaluator::with_config(config)
        .run_evaluation(&definition)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Fail);
    assert_eq!(run.results[0].status, ResultStatus::Success);
    assert_eq!(run.results[1].status, ResultStatus::Fail);
    assert!(run.results[1].error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_run_over_run_comparison() {
    let answers = Arc::new(std::sync::Mutex::new(vec!["abcdef", "abc"]));
    let task = {
        let answers = answers.clone();
        move |_input: String| {
            let answer = answers.lock().unwrap().pop().unwrap_or("abcdef").to_string();
            async move { Ok::<_, anyhow::Error>(answer) }
        }
    };

    let definition = EvaluationDefinition::<String, String, String>::builder("Compare")
        .rows(vec![DatasetRow::new("abc".to_string(), "abcdef".to_string())])
        .task(task)
        .scorer(Levenshtein)
        .source("fn compare() {}")
        .build()
        .unwrap();

    let evaluator = Evaluator::new();
    let first = evaluator.run_evaluation(&definition).await.unwrap();
    let second = evaluator.run_evaluation(&definition).await.unwrap();

    assert_eq!(first.results[0].scores[0].score, Some(0.5));
    assert_eq!(second.results[0].scores[0].score, Some(1.0));
    assert_ne!(first.id, second.id);
    assert_eq!(first.source_code_hash, second.source_code_hash);

    let view = evaluator.get_result("Compare", 0, None).await.unwrap();
    assert_eq!(view.evaluation.id, second.id);
    assert_eq!(view.score_state(0.0), Some(ScoreState::Improved));
    assert!(!view.is_running);

    let view = evaluator
        .get_result("Compare", 0, Some(first.created_at))
        .await
        .unwrap();
    assert_eq!(view.score_state(0.0), Some(ScoreState::FirstRun));
}

#[tokio::test]
async fn test_is_running_while_rows_execute() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let task = {
        let started = started.clone();
        let release = release.clone();
        move |input: String| {
            let started = started.clone();
            let release = release.clone();
            async move {
                started.notify_one();
                release.notified().await;
                Ok::<_, anyhow::Error>(input)
            }
        }
    };

    let definition = EvaluationDefinition::<String, String, String>::builder("Live")
        .rows(vec![DatasetRow::new("abc".to_string(), "abc".to_string())])
        .task(task)
        .scorer(Levenshtein)
        .build()
        .unwrap();

    let evaluator = Evaluator::new();
    assert!(!evaluator.is_running("Live"));

    let (run, ()) = tokio::join!(evaluator.run_evaluation(&definition), async {
        started.notified().await;
        assert!(evaluator.is_running("Live"));

        let (_, created_at) = evaluator.registry().running().pop().unwrap();
        let live = evaluator
            .get_result("Live", 0, Some(created_at))
            .await
            .unwrap();
        assert!(live.is_running);
        assert_eq!(live.evaluation.status, RunStatus::Running);
        assert_eq!(live.result.status, ResultStatus::Running);
        assert_eq!(live.result.input, json!("abc"));

        // Without a timestamp the live run is shown but not flagged
        let latest = evaluator.get_result("Live", 0, None).await.unwrap();
        assert_eq!(latest.evaluation.created_at, created_at);
        assert!(!latest.is_running);

        release.notify_one();
    });

    let run = run.unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert!(!evaluator.is_running("Live"));

    let view = evaluator
        .get_result("Live", 0, Some(run.created_at))
        .await
        .unwrap();
    assert!(!view.is_running);
    assert_eq!(view.evaluation.status, RunStatus::Success);
    assert_eq!(view.result.status, ResultStatus::Success);
    assert_eq!(evaluator.history().runs("Live").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_overlapping_runs_of_one_evaluation() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let gated = {
        let started = started.clone();
        let release = release.clone();
        move |input: String| {
            let started = started.clone();
            let release = release.clone();
            async move {
                started.notify_one();
                release.notified().await;
                Ok::<_, anyhow::Error>(input)
            }
        }
    };
    let slow = EvaluationDefinition::<String, String, String>::builder("Overlap")
        .rows(vec![DatasetRow::new("abc".to_string(), "abc".to_string())])
        .task(gated)
        .scorer(Levenshtein)
        .build()
        .unwrap();
    let fast = EvaluationDefinition::<String, String, String>::builder("Overlap")
        .rows(vec![DatasetRow::new("abc".to_string(), "abc".to_string())])
        .task(|input: String| async move { Ok::<_, anyhow::Error>(input) })
        .scorer(Levenshtein)
        .build()
        .unwrap();

    let evaluator = Evaluator::new();
    let (slow_run, fast_run) = tokio::join!(evaluator.run_evaluation(&slow), async {
        started.notified().await;
        let fast_run = evaluator.run_evaluation(&fast).await.unwrap();

        // The older run is still in flight after the newer one finished
        assert!(evaluator.is_running("Overlap"));
        let runs = evaluator.history().runs("Overlap").await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].status, RunStatus::Running);
        assert_eq!(runs[1].id, fast_run.id);

        release.notify_one();
        fast_run
    });

    let slow_run = slow_run.unwrap();
    assert!(slow_run.created_at <= fast_run.created_at);
    assert!(!evaluator.is_running("Overlap"));

    let runs = evaluator.history().runs("Overlap").await.unwrap();
    let ids: Vec<_> = runs.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![slow_run.id, fast_run.id]);
    assert!(runs.iter().all(|r| r.status == RunStatus::Success));

    let latest = evaluator.get_result("Overlap", 0, None).await.unwrap();
    assert_eq!(latest.evaluation.id, fast_run.id);
    assert_eq!(latest.prev_result.unwrap().status, ResultStatus::Success);
}

#[tokio::test]
async fn test_rendered_columns_on_run() {
    let definition = EvaluationDefinition::<String, String, String>::builder("Columns")
        .rows(concat_rows())
        .task(|input: String| async move { Ok::<_, anyhow::Error>(format!("{input}def")) })
        .scorer(Levenshtein)
        .columns(|input, output, _expected| {
            vec![
                RenderedColumn::new("Input", json!(input)),
                RenderedColumn::new("Output", json!(output)),
            ]
        })
        .build()
        .unwrap();

    let run = Evaluator::new().run_evaluation(&definition).await.unwrap();
    assert_eq!(run.results[2].rendered_columns[0].value, json!("hello"));
    assert_eq!(run.results[2].rendered_columns[1].value, json!("hellodef"));
}

#[tokio::test]
async fn test_numeric_difference_zero_expected_is_kept() {
    let definition = EvaluationDefinition::<f64, f64, f64>::builder("Numeric")
        .rows(vec![DatasetRow::new(5.0, 0.0), DatasetRow::new(90.0, 100.0)])
        .task(|input: f64| async move { Ok::<_, anyhow::Error>(input) })
        .scorer(NumericDifference)
        .build()
        .unwrap();

    let run = Evaluator::new().run_evaluation(&definition).await.unwrap();

    assert_eq!(run.results[0].scores[0].score, Some(f64::NEG_INFINITY));
    assert_eq!(run.results[1].scores[0].score, Some(0.9));
    assert_eq!(run.status, RunStatus::Success);
}
