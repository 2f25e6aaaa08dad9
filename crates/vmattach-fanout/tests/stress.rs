use std::collections::BTreeSet;
use std::time::Duration;

use rand::Rng;
use vmattach_fanout::{FailureSet, FanOut, TaskOutcome};

const TASKS: usize = 100;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_tasks_with_random_latency_record_every_failure_once() -> anyhow::Result<()> {
    let plan: Vec<(u64, bool)> = {
        let mut rng = rand::rng();
        (0..TASKS)
            .map(|_| (rng.random_range(0..25), rng.random_bool(0.35)))
            .collect()
    };
    let induced: BTreeSet<usize> = plan
        .iter()
        .enumerate()
        .filter_map(|(index, (_, fails))| fails.then_some(index))
        .collect();

    let tasks = plan.iter().enumerate().map(|(index, &(latency, fails))| async move {
        tokio::time::sleep(Duration::from_millis(latency)).await;
        if fails { Err(index) } else { Ok(index) }
    });

    let mut failures = FailureSet::new();
    let mut succeeded = BTreeSet::new();
    let report = FanOut::new(tasks)
        .run_all(|index, outcome| match outcome {
            TaskOutcome::Completed(Ok(value)) => {
                assert_eq!(value, index);
                assert!(succeeded.insert(value), "success delivered twice: {value}");
            }
            TaskOutcome::Completed(Err(value)) => failures.record(value),
            other => panic!("unexpected outcome for task {index}: {other:?}"),
        })
        .await;

    assert!(report.is_balanced());
    assert_eq!(report.dispatched, TASKS);
    assert_eq!(failures.len(), induced.len());

    let recorded: BTreeSet<usize> = failures.iter().copied().collect();
    assert_eq!(recorded.len(), failures.len(), "duplicate failure recorded");
    assert_eq!(recorded, induced);
    assert_eq!(succeeded.len() + recorded.len(), TASKS);
    Ok(())
}

#[tokio::test]
async fn failures_reduce_to_one_composite_outcome() -> anyhow::Result<()> {
    let tasks = (0..5_u32).map(|index| async move {
        if index % 2 == 0 {
            Err(format!("task {index} rejected"))
        } else {
            Ok(())
        }
    });

    let mut failures = FailureSet::new();
    FanOut::new(tasks)
        .run_all(|_, outcome| {
            if let TaskOutcome::Completed(Err(message)) = outcome {
                failures.record(message);
            }
        })
        .await;

    let Err(composite) = failures.reduce(|first| format!("batch failed, because: {first}")) else {
        anyhow::bail!("expected composite failure");
    };
    assert_eq!(composite.causes().len(), 3);
    assert!(composite.message().starts_with("batch failed, because: task "));
    Ok(())
}
