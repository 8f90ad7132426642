//! Cooperative stop signal for the run loop.

use std::future::Future;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;

/// Shared stop request. Raising it never interrupts a frame in flight; the
/// loop checks it once per iteration.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// True if `line` is a quit request.
fn is_quit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}

/// Raise `flag` when a `q` line arrives on stdin.
///
/// The thread exits on quit, on EOF, or on a read error; it is detached and
/// does not hold the process open.
pub fn spawn_quit_listener(flag: StopFlag) -> std::io::Result<()> {
    std::thread::Builder::new().name("facewatch-stdin".into()).spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if is_quit(&line) => {
                    tracing::info!("quit requested");
                    flag.raise();
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "stdin closed");
                    return;
                }
            }
        }
    })?;
    Ok(())
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WaitError {
    #[error("interrupted again before the current frame finished")]
    Interrupted,
    #[error("pipeline thread exited without reporting")]
    WorkerGone,
}

/// Wait for the pipeline thread's result.
///
/// The first `interrupt` raises `flag` and keeps waiting for the frame in
/// flight; a second one gives up with [`WaitError::Interrupted`]. If the
/// interrupt source itself fails, only the result is awaited.
pub async fn wait_for_worker<T, F, Fut>(
    mut rx: oneshot::Receiver<T>,
    flag: &StopFlag,
    mut interrupt: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        outcome = &mut rx => return outcome.map_err(|_| WaitError::WorkerGone),
        signal = interrupt() => match signal {
            Ok(()) => {
                tracing::info!("interrupt received, stopping after the current frame");
                flag.raise();
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for interrupts");
                return rx.await.map_err(|_| WaitError::WorkerGone);
            }
        },
    }

    tokio::select! {
        outcome = &mut rx => outcome.map_err(|_| WaitError::WorkerGone),
        signal = interrupt() => match signal {
            Ok(()) => {
                tracing::warn!("second interrupt, abandoning the current frame");
                Err(WaitError::Interrupted)
            }
            Err(_) => rx.await.map_err(|_| WaitError::WorkerGone),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Interrupt source that fires on the first `fires` calls, then never.
    fn interrupts(fires: usize) -> impl FnMut() -> std::future::Ready<std::io::Result<()>> {
        let mut calls = 0;
        move || {
            calls += 1;
            if calls <= fires {
                std::future::ready(Ok(()))
            } else {
                std::future::ready(Err(std::io::Error::other("no more interrupts")))
            }
        }
    }

    fn never() -> std::future::Pending<std::io::Result<()>> {
        std::future::pending()
    }

    /// Reply once `flag` is raised, like a pipeline finishing its frame.
    fn reply_after_stop(flag: &StopFlag, tx: oneshot::Sender<u32>) {
        let flag = flag.clone();
        tokio::spawn(async move {
            while !flag.is_raised() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            let _ = tx.send(7);
        });
    }

    #[tokio::test]
    async fn test_result_without_interrupt() {
        let flag = StopFlag::new();
        let (tx, rx) = oneshot::channel();
        tx.send(7).unwrap();

        assert_eq!(wait_for_worker(rx, &flag, never).await, Ok(7));
        assert!(!flag.is_raised());
    }

    #[tokio::test]
    async fn test_first_interrupt_waits_for_frame() {
        let flag = StopFlag::new();
        let (tx, rx) = oneshot::channel();
        reply_after_stop(&flag, tx);

        let pending_after_first = {
            let mut fired = false;
            move || {
                let fire = !fired;
                fired = true;
                async move {
                    if !fire {
                        std::future::pending::<()>().await;
                    }
                    Ok(())
                }
            }
        };
        let outcome = wait_for_worker(rx, &flag, pending_after_first).await;
        assert_eq!(outcome, Ok(7));
        assert!(flag.is_raised());
    }

    #[tokio::test]
    async fn test_second_interrupt_abandons_run() {
        let flag = StopFlag::new();
        let (_tx, rx) = oneshot::channel::<u32>();

        assert_eq!(wait_for_worker(rx, &flag, interrupts(2)).await, Err(WaitError::Interrupted));
        assert!(flag.is_raised());
    }

    #[tokio::test]
    async fn test_failed_interrupt_source_still_waits() {
        let flag = StopFlag::new();
        let (tx, rx) = oneshot::channel();
        reply_after_stop(&flag, tx);
        flag.raise();

        assert_eq!(wait_for_worker(rx, &flag, interrupts(0)).await, Ok(7));
    }

    #[tokio::test]
    async fn test_worker_gone() {
        let flag = StopFlag::new();
        let (tx, rx) = oneshot::channel::<u32>();
        drop(tx);

        assert_eq!(wait_for_worker(rx, &flag, never).await, Err(WaitError::WorkerGone));
    }

    #[test]
    fn test_flag_shared_between_clones() {
        let flag = StopFlag::new();
        let other = flag.clone();
        assert!(!other.is_raised());
        flag.raise();
        assert!(other.is_raised());
    }

    #[test]
    fn test_quit_line() {
        assert!(is_quit("q"));
        assert!(is_quit(" Q \n"));
        assert!(!is_quit("quit"));
        assert!(!is_quit(""));
    }
}
