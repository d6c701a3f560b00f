//! Ambient correlation ids, scoped per logical task tree.
//!
//! A chain of `(token, id)` entries lives in a tokio task-local, so each
//! logical call path carries its own chain and concurrent paths never share
//! writable state. Scopes inherit the current id unless given an explicit
//! one; disposing a scope removes exactly the entry it pushed, which keeps
//! sibling scopes correct even when they are dropped out of order.
//!
//! Correlation is observability-only: nothing in the pipeline branches on it.

use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CHAIN: RefCell<Vec<(u64, String)>>;
}

/// Namespace for the ambient correlation API.
#[derive(Debug)]
pub struct CorrelationScope;

impl CorrelationScope {
    /// Run `fut` with an ambient chain available. If the current task
    /// already has one (a nested pipeline call), `fut` runs in it directly.
    pub async fn with_chain<F: Future>(fut: F) -> F::Output {
        if CHAIN.try_with(|_| ()).is_ok() {
            fut.await
        } else {
            CHAIN.scope(RefCell::new(Vec::new()), fut).await
        }
    }

    /// The current correlation id, or `None` outside any scope.
    #[must_use]
    pub fn current() -> Option<String> {
        CHAIN
            .try_with(|chain| chain.borrow().last().map(|(_, id)| id.clone()))
            .ok()
            .flatten()
    }

    /// Enter a scope: an explicit id wins, else the parent's id is
    /// inherited, else a fresh one is minted. Outside [`Self::with_chain`]
    /// the handle is inert and [`Self::current`] stays `None`.
    #[must_use]
    pub fn begin(explicit_id: Option<&str>) -> ScopeHandle {
        let id = match explicit_id {
            Some(id) => id.to_string(),
            None => Self::current().unwrap_or_else(|| Uuid::new_v4().to_string()),
        };
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let pushed = CHAIN
            .try_with(|chain| chain.borrow_mut().push((token, id)))
            .is_ok();
        ScopeHandle { token, pushed }
    }
}

/// Restores the previous scope on drop by removing the entry this handle
/// pushed, wherever it sits in the chain.
#[derive(Debug)]
pub struct ScopeHandle {
    token: u64,
    pushed: bool,
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        if !self.pushed {
            return;
        }
        let _ = CHAIN.try_with(|chain| {
            let mut chain = chain.borrow_mut();
            if let Some(position) = chain.iter().rposition(|(token, _)| *token == self.token) {
                chain.remove(position);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_scope_means_no_id() {
        assert_eq!(CorrelationScope::current(), None);
        CorrelationScope::with_chain(async {
            assert_eq!(CorrelationScope::current(), None);
        })
        .await;
    }

    #[tokio::test]
    async fn begin_mints_and_dispose_restores() {
        CorrelationScope::with_chain(async {
            let outer = CorrelationScope::begin(Some("req-7"));
            assert_eq!(CorrelationScope::current().as_deref(), Some("req-7"));

            {
                let _inner = CorrelationScope::begin(None);
                // No explicit id: the child inherits.
                assert_eq!(CorrelationScope::current().as_deref(), Some("req-7"));
            }
            assert_eq!(CorrelationScope::current().as_deref(), Some("req-7"));

            drop(outer);
            assert_eq!(CorrelationScope::current(), None);
        })
        .await;
    }

    #[tokio::test]
    async fn explicit_id_overrides_inheritance() {
        CorrelationScope::with_chain(async {
            let _outer = CorrelationScope::begin(Some("outer"));
            let _inner = CorrelationScope::begin(Some("inner"));
            assert_eq!(CorrelationScope::current().as_deref(), Some("inner"));
        })
        .await;
    }

    #[tokio::test]
    async fn minted_ids_are_distinct() {
        CorrelationScope::with_chain(async {
            let a = {
                let _scope = CorrelationScope::begin(None);
                CorrelationScope::current()
            };
            let b = {
                let _scope = CorrelationScope::begin(None);
                CorrelationScope::current()
            };
            assert!(a.is_some());
            assert_ne!(a, b);
        })
        .await;
    }

    #[tokio::test]
    async fn out_of_order_disposal_restores_the_survivor() {
        CorrelationScope::with_chain(async {
            let first = CorrelationScope::begin(Some("first"));
            let second = CorrelationScope::begin(Some("second"));

            // Dispose the older scope while the newer one is still live.
            drop(first);
            assert_eq!(CorrelationScope::current().as_deref(), Some("second"));

            drop(second);
            assert_eq!(CorrelationScope::current(), None);
        })
        .await;
    }

    #[tokio::test]
    async fn concurrent_task_trees_are_isolated() {
        let a = tokio::spawn(CorrelationScope::with_chain(async {
            let _scope = CorrelationScope::begin(Some("tree-a"));
            tokio::task::yield_now().await;
            CorrelationScope::current()
        }));
        let b = tokio::spawn(CorrelationScope::with_chain(async {
            let _scope = CorrelationScope::begin(Some("tree-b"));
            tokio::task::yield_now().await;
            CorrelationScope::current()
        }));

        assert_eq!(a.await.unwrap().as_deref(), Some("tree-a"));
        assert_eq!(b.await.unwrap().as_deref(), Some("tree-b"));
    }

    #[tokio::test]
    async fn begin_outside_a_chain_is_inert() {
        let handle = CorrelationScope::begin(Some("orphan"));
        assert_eq!(CorrelationScope::current(), None);
        drop(handle);
    }
}
