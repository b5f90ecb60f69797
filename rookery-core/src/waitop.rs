//! Single-shot request/response operations.
//!
//! A [`WaitOp`] marshals exactly one asynchronous reply back to the caller
//! that started the operation. The caller transitions the operation from
//! idle to doing, runs its start action (typically a packet write), and then
//! blocks until the network side settles the operation with [`WaitOp::fulfill`]
//! or [`WaitOp::reject`].

use std::{
    future::Future,
    sync::{Mutex, PoisonError},
};

use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitOpError {
    #[error("already doing")]
    AlreadyDoing,
    #[error("terminated")]
    Terminated,
    #[error("not started")]
    NotStarted,
}

enum Phase<T> {
    Idle,
    Doing,
    Done(Result<T, WaitOpError>),
}

pub struct WaitOp<T> {
    state: Mutex<Phase<T>>,
    notify: Notify,
}

impl<T> WaitOp<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Phase::Idle),
            notify: Notify::new(),
        }
    }

    /// Start an exclusive operation and wait for its response.
    ///
    /// Fails with [`WaitOpError::AlreadyDoing`] if another run is in flight.
    /// When `start` fails the operation reverts to idle and the error is
    /// returned as-is. The internal lock is never held while `start` runs,
    /// so a start action that completes the operation synchronously will not
    /// deadlock.
    pub async fn run<F, Fut, E>(&self, start: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<WaitOpError>,
    {
        {
            let mut state = self.lock_state();
            match *state {
                Phase::Idle => *state = Phase::Doing,
                _ => return Err(WaitOpError::AlreadyDoing.into()),
            }
        }

        if let Err(err) = start().await {
            let mut state = self.lock_state();
            *state = Phase::Idle;
            return Err(err);
        }

        let notified = self.notify.notified();
        tokio::pin!(notified);
        loop {
            notified.as_mut().enable();
            {
                let mut state = self.lock_state();
                if matches!(*state, Phase::Done(_)) {
                    let Phase::Done(result) = std::mem::replace(&mut *state, Phase::Idle) else {
                        unreachable!()
                    };
                    return result.map_err(E::from);
                }
            }
            notified.as_mut().await;
            notified.set(self.notify.notified());
        }
    }

    fn settle(&self, result: Result<T, WaitOpError>) -> Result<(), WaitOpError> {
        let mut state = self.lock_state();
        match *state {
            Phase::Doing => {
                *state = Phase::Done(result);
                self.notify.notify_waiters();
                Ok(())
            }
            _ => Err(WaitOpError::NotStarted),
        }
    }

    /// Complete the in-flight operation with a value.
    pub fn fulfill(&self, value: T) -> Result<(), WaitOpError> {
        self.settle(Ok(value))
    }

    /// Complete the in-flight operation with an error.
    pub fn reject(&self, err: WaitOpError) -> Result<(), WaitOpError> {
        self.settle(Err(err))
    }

    /// Abort the in-flight operation, if any. Blocked callers observe
    /// [`WaitOpError::Terminated`]. Always succeeds.
    pub fn close(&self) {
        let _ = self.settle(Err(WaitOpError::Terminated));
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Phase<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for WaitOp<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use super::*;

    #[tokio::test]
    async fn fulfill_round_trip() {
        let op = Arc::new(WaitOp::<u32>::new());

        let settler = op.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            settler.fulfill(42).unwrap();
        });

        let got: Result<u32, WaitOpError> = op.run(|| async { Ok(()) }).await;
        assert_eq!(got.unwrap(), 42);
        task.await.unwrap();

        // the operation is idle again
        let settler = op.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            settler.fulfill(7).unwrap();
        });
        let got: Result<u32, WaitOpError> = op.run(|| async { Ok(()) }).await;
        assert_eq!(got.unwrap(), 7);
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let op = Arc::new(WaitOp::<()>::new());

        let first = op.clone();
        let task = tokio::spawn(async move {
            let _: Result<(), WaitOpError> = first.run(|| async { Ok(()) }).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let got: Result<(), WaitOpError> = op.run(|| async { Ok(()) }).await;
        assert_eq!(got.unwrap_err(), WaitOpError::AlreadyDoing);

        op.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn close_unblocks_run() {
        let op = Arc::new(WaitOp::<()>::new());

        let closer = op.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            closer.close();
        });

        let got: Result<(), WaitOpError> = op.run(|| async { Ok(()) }).await;
        assert_eq!(got.unwrap_err(), WaitOpError::Terminated);

        // a later run still works
        let settler = op.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            settler.fulfill(()).unwrap();
        });
        let got: Result<(), WaitOpError> = op.run(|| async { Ok(()) }).await;
        assert!(got.is_ok());
    }

    #[tokio::test]
    async fn settle_when_idle_is_not_started() {
        let op = WaitOp::<()>::new();
        assert_eq!(op.fulfill(()).unwrap_err(), WaitOpError::NotStarted);
        assert_eq!(
            op.reject(WaitOpError::Terminated).unwrap_err(),
            WaitOpError::NotStarted
        );
    }

    #[tokio::test]
    async fn start_failure_reverts_to_idle() {
        let op = WaitOp::<()>::new();

        let got: Result<(), WaitOpError> =
            op.run(|| async { Err(WaitOpError::Terminated) }).await;
        assert_eq!(got.unwrap_err(), WaitOpError::Terminated);

        // idle again: fulfill has nothing to complete
        assert_eq!(op.fulfill(()).unwrap_err(), WaitOpError::NotStarted);
    }
}
