use std::future::Future;

use crate::AvailabilityGate;

/// Outcome of a gated operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gated<T> {
    Served(T),
    /// The gate was SLEEPING; the operation did not run.
    Deferred,
}

impl<T> Gated<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Gated::Deferred)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Gated::Served(v) => Some(v),
            Gated::Deferred => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Gated<U> {
        match self {
            Gated::Served(v) => Gated::Served(f(v)),
            Gated::Deferred => Gated::Deferred,
        }
    }
}

impl AvailabilityGate {
    /// Run `op` under a serving permit, or return [`Gated::Deferred`] without
    /// running it. Every mirror read goes through here.
    pub async fn gated<F, Fut, T>(&self, op: F) -> Gated<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(_permit) = self.try_enter() else {
            return Gated::Deferred;
        };
        Gated::Served(op().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn deferred_operation_never_runs() {
        let gate = AvailabilityGate::new();
        let ran = AtomicBool::new(false);

        let _cycle = gate.begin_cycle().await;
        let out = gate
            .gated(|| async {
                ran.store(true, Ordering::SeqCst);
                1
            })
            .await;

        assert!(out.is_deferred());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn served_operation_returns_its_value() {
        let gate = AvailabilityGate::new();
        let out = gate.gated(|| async { 41 + 1 }).await;
        assert_eq!(out, Gated::Served(42));
        assert_eq!(out.map(|v| v * 2).into_option(), Some(84));
    }
}
