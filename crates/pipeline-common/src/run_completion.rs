use tokio::task::JoinHandle;
use tracing::debug;

use crate::PipelineError;

/// Unified completion error for a consumer + producer-task run.
#[derive(Debug)]
pub enum RunCompletionError<ConsumerErr> {
    Consumer(ConsumerErr),
    Pipeline(PipelineError),
}

/// Wait for all producer tasks and resolve the run outcome deterministically.
///
/// Semantics:
/// - If the consumer failed, return `Consumer`; producer failures are secondary
///   and only logged.
/// - If the consumer succeeded and a producer task failed or panicked, return
///   the first such failure as `Pipeline`.
/// - If everything succeeded, return the consumer output and the producer
///   outputs in task order.
pub async fn settle_run<Out, ConsumerErr, P>(
    consumer_result: Result<Out, ConsumerErr>,
    producer_tasks: impl IntoIterator<Item = JoinHandle<Result<P, PipelineError>>>,
) -> Result<(Out, Vec<P>), RunCompletionError<ConsumerErr>> {
    let mut outputs = Vec::new();
    let mut first_pipeline_error: Option<PipelineError> = None;

    for task in producer_tasks {
        let task_result = match task.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_cancelled() => Err(PipelineError::Cancelled),
            Err(join_error) => Err(PipelineError::TaskPanicked(join_error.to_string())),
        };

        match task_result {
            Ok(output) => outputs.push(output),
            Err(err) if consumer_result.is_err() || first_pipeline_error.is_some() => {
                debug!(error = %err, "Secondary producer failure");
            }
            Err(err) => first_pipeline_error = Some(err),
        }
    }

    match (consumer_result, first_pipeline_error) {
        (Err(err), _) => Err(RunCompletionError::Consumer(err)),
        (Ok(_), Some(err)) => Err(RunCompletionError::Pipeline(err)),
        (Ok(output), None) => Ok((output, outputs)),
    }
}

#[cfg(test)]
mod tests {
    use super::{RunCompletionError, settle_run};
    use crate::PipelineError;

    #[tokio::test]
    async fn settle_run_returns_pipeline_error_when_consumer_succeeds() {
        let tasks = vec![tokio::spawn(async {
            Err::<(), _>(PipelineError::ChannelClosed("producer failed"))
        })];

        let result = settle_run::<usize, (), ()>(Ok(1), tasks).await;
        match result {
            Err(RunCompletionError::Pipeline(PipelineError::ChannelClosed(msg))) => {
                assert_eq!(msg, "producer failed");
            }
            other => panic!("expected pipeline error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn settle_run_prioritizes_consumer_error() {
        let tasks = vec![tokio::spawn(async {
            Err::<(), _>(PipelineError::ChannelClosed("producer failed"))
        })];

        let result = settle_run::<usize, &str, ()>(Err("consumer failed"), tasks).await;
        match result {
            Err(RunCompletionError::Consumer(err)) => {
                assert_eq!(err, "consumer failed");
            }
            other => panic!("expected consumer error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn settle_run_reports_panicked_producer() {
        let tasks = vec![tokio::task::spawn_blocking(|| -> Result<u32, PipelineError> {
            panic!("producer blew up")
        })];

        let result = settle_run::<(), (), u32>(Ok(()), tasks).await;
        assert!(matches!(
            result,
            Err(RunCompletionError::Pipeline(PipelineError::TaskPanicked(_)))
        ));
    }

    #[tokio::test]
    async fn settle_run_collects_producer_outputs() {
        let tasks = (0..3u32).map(|i| tokio::spawn(async move { Ok::<_, PipelineError>(i * 10) }));

        let (out, produced) = settle_run::<&str, (), u32>(Ok("done"), tasks)
            .await
            .unwrap();
        assert_eq!(out, "done");
        assert_eq!(produced, vec![0, 10, 20]);
    }
}
