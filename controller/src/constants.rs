use kube_runtime::controller::Action;
use std::time::Duration;

/// How long to wait for objects that are created asynchronously by CAPI to show up.
pub(crate) const REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// Tell the controller to reconcile the object again after some duration.
pub(crate) fn requeue() -> Action {
    Action::requeue(REQUEUE_DELAY)
}

/// Do not requeue the object, the next watch event will trigger a reconciliation.
pub(crate) fn no_requeue() -> Action {
    Action::await_change()
}
