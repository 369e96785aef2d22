//! 阻塞操作通道：同一资源上的阻塞调用逐个执行
//!
//! 调用方的 future 被外层超时丢弃时，已启动的阻塞任务不会被取消；
//! 下一次 run 会先等它结束，同一时刻只有一个操作作用于资源。

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::actuator::ActuatorError;

pub struct BlockingLane<R> {
    resource: Arc<R>,
    inflight: Option<JoinHandle<()>>,
}

impl<R: Send + Sync + 'static> BlockingLane<R> {
    pub fn new(resource: Arc<R>) -> Self {
        Self {
            resource,
            inflight: None,
        }
    }

    /// 上一次被放弃的操作是否仍在执行
    pub fn is_busy(&self) -> bool {
        self.inflight.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn run<T, F>(&mut self, op: F) -> Result<T, ActuatorError>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> Result<T, ActuatorError> + Send + 'static,
    {
        self.drain().await;

        let resource = Arc::clone(&self.resource);
        let (tx, rx) = oneshot::channel();
        self.inflight = Some(tokio::task::spawn_blocking(move || {
            let _ = tx.send(op(&resource));
        }));

        let received = rx.await;
        let joined = match self.inflight.take() {
            Some(handle) => handle.await,
            None => Ok(()),
        };
        match (received, joined) {
            (Ok(result), _) => result,
            (Err(_), Err(e)) => Err(ActuatorError::Failed(format!("Task join: {e}"))),
            (Err(_), Ok(())) => Err(ActuatorError::Failed(
                "blocking task ended without a result".to_string(),
            )),
        }
    }

    async fn drain(&mut self) {
        let Some(handle) = self.inflight.take() else {
            return;
        };
        if !handle.is_finished() {
            tracing::warn!("previous page operation still running, waiting for it");
        }
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "previous page operation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    type Log = Mutex<Vec<&'static str>>;

    #[tokio::test]
    async fn test_abandoned_operation_finishes_before_next_starts() {
        let log: Arc<Log> = Arc::default();
        let mut lane = BlockingLane::new(Arc::clone(&log));

        let slow = lane.run(|log: &Log| {
            std::thread::sleep(Duration::from_millis(200));
            log.lock().unwrap().push("slow");
            Ok(())
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), slow).await.is_err());
        assert!(lane.is_busy());

        lane.run(|log: &Log| {
            log.lock().unwrap().push("next");
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["slow", "next"]);
        assert!(!lane.is_busy());
    }

    #[tokio::test]
    async fn test_result_and_error_pass_through() {
        let mut lane = BlockingLane::new(Arc::new(7u32));
        assert_eq!(lane.run(|n: &u32| Ok(*n * 2)).await, Ok(14));
        assert_eq!(
            lane.run(|_: &u32| -> Result<(), _> { Err(ActuatorError::Timeout) }).await,
            Err(ActuatorError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_panicking_operation_becomes_failure() {
        let mut lane = BlockingLane::new(Arc::new(()));
        let result = lane.run(|_: &()| -> Result<(), ActuatorError> { panic!("tab crashed") }).await;
        assert!(matches!(result, Err(ActuatorError::Failed(msg)) if msg.starts_with("Task join")));
    }
}
