//! Pending-request bookkeeping with context grouping.

use super::cancel::Cancel;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

struct PendingRequest {
    context: Option<String>,
    cancel: Box<dyn Cancel>,
    seq: u64,
}

#[derive(Default)]
struct State {
    pending: HashMap<String, PendingRequest>,
    /// Context tag -> ids pending under it, in registration order.
    contexts: HashMap<String, Vec<String>>,
    next_seq: u64,
}

impl State {
    /// Remove `id` from both maps. Empty context groups are dropped.
    fn detach(&mut self, id: &str) -> Option<PendingRequest> {
        let entry = self.pending.remove(id)?;
        if let Some(ctx) = entry.context.as_deref() {
            self.unlink(ctx, id);
        }
        Some(entry)
    }

    fn unlink(&mut self, ctx: &str, id: &str) {
        if let Some(ids) = self.contexts.get_mut(ctx) {
            ids.retain(|x| x != id);
            if ids.is_empty() {
                self.contexts.remove(ctx);
            }
        }
    }
}

/// Tracks in-flight cancelable requests by id and by context.
///
/// Every operation is a no-op for unknown ids or contexts. Bookkeeping is
/// updated under the lock; cancel callbacks run after it is released, so a
/// callback may call back into the manager.
pub struct RequestManager {
    debug: bool,
    state: Mutex<State>,
}

impl Default for RequestManager {
    fn default() -> Self {
        Self::new(false)
    }
}

impl RequestManager {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a pending request. A still-pending request with the same id
    /// is stale and gets cancelled first.
    ///
    /// Returns the registration sequence number, accepted by
    /// [`RequestManager::remove_registration`].
    pub fn add_request(
        &self,
        id: &str,
        context: Option<&str>,
        cancel: impl Cancel + 'static,
    ) -> u64 {
        if self.debug {
            debug!(request_id = id, context = ?context, "adding request");
        }
        let (stale, seq) = {
            let mut st = self.lock();
            let stale = st.detach(id);
            let seq = st.next_seq;
            st.next_seq += 1;
            if let Some(ctx) = context {
                st.contexts
                    .entry(ctx.to_string())
                    .or_default()
                    .push(id.to_string());
            }
            st.pending.insert(
                id.to_string(),
                PendingRequest {
                    context: context.map(str::to_string),
                    cancel: Box::new(cancel),
                    seq,
                },
            );
            (stale, seq)
        };
        if let Some(stale) = stale {
            let reason = format!(
                "`cancelRequest({})` from `RequestManager.addRequest`. Found duplicate pending request.",
                id
            );
            self.fire(id, stale, &reason);
        }
        seq
    }

    /// Complete the registration `seq` of `id`. No-op when the entry was
    /// already cancelled or replaced by a newer registration of the same id.
    pub fn remove_registration(&self, id: &str, seq: u64) -> bool {
        let mut st = self.lock();
        let owned = st.pending.get(id).map_or(false, |entry| entry.seq == seq);
        if owned {
            st.detach(id);
            if self.debug {
                debug!(request_id = id, seq, "removing request");
            }
        }
        owned
    }

    /// Mark a request as completed. Idempotent.
    pub fn remove_request(&self, id: &str, context: Option<&str>) {
        if self.debug {
            debug!(request_id = id, "removing request");
        }
        let mut st = self.lock();
        if st.detach(id).is_none() {
            if let Some(ctx) = context {
                st.unlink(ctx, id);
            }
        }
    }

    /// Cancel a single pending request, or, when `id_or_context` names no
    /// pending request but a known context, every request in that context.
    pub fn cancel_request(&self, id_or_context: &str, reason: Option<&str>) {
        if self.debug {
            debug!(target_id = id_or_context, "cancelling request");
        }
        let single = {
            let mut st = self.lock();
            if st.pending.contains_key(id_or_context) {
                st.detach(id_or_context)
            } else if st.contexts.contains_key(id_or_context) {
                None
            } else {
                return;
            }
        };
        match single {
            Some(entry) => {
                let reason = reason
                    .map(str::to_string)
                    .unwrap_or_else(|| default_reason(id_or_context, "cancelRequest"));
                self.fire(id_or_context, entry, &reason);
            }
            None => self.cancel_group(id_or_context, |id| {
                reason
                    .map(str::to_string)
                    .unwrap_or_else(|| default_reason(id, "cancelRequest"))
            }),
        }
    }

    /// Cancel every request registered under `context`; the context tag is
    /// used as the cancellation reason.
    pub fn cancel_context_requests(&self, context: &str) {
        if self.debug {
            debug!(context, "cancelling context");
        }
        self.cancel_group(context, |_| context.to_string());
    }

    /// Cancel everything and drop all context groups.
    pub fn cancel_all_requests(&self, reason: Option<&str>) {
        let mut drained: Vec<(String, PendingRequest)> = {
            let mut st = self.lock();
            st.contexts.clear();
            st.pending.drain().collect()
        };
        if self.debug {
            debug!(count = drained.len(), "cancelling all requests");
        }
        drained.sort_by_key(|(_, entry)| entry.seq);
        for (id, entry) in drained {
            let reason = reason
                .map(str::to_string)
                .unwrap_or_else(|| default_reason(&id, "cancelAllRequests"));
            self.fire(&id, entry, &reason);
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.lock().pending.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Ids pending under `context`, in registration order.
    pub fn context_ids(&self, context: &str) -> Vec<String> {
        self.lock()
            .contexts
            .get(context)
            .cloned()
            .unwrap_or_default()
    }

    /// Known context tags, sorted.
    pub fn contexts(&self) -> Vec<String> {
        let mut out: Vec<String> = self.lock().contexts.keys().cloned().collect();
        out.sort();
        out
    }

    fn cancel_group(&self, context: &str, reason_for: impl Fn(&str) -> String) {
        let entries: Vec<(String, PendingRequest)> = {
            let mut st = self.lock();
            let ids = st.contexts.remove(context).unwrap_or_default();
            ids.into_iter()
                .filter_map(|id| {
                    let entry = st.pending.remove(&id)?;
                    Some((id, entry))
                })
                .collect()
        };
        for (id, entry) in entries {
            let reason = reason_for(&id);
            self.fire(&id, entry, &reason);
        }
    }

    /// Invoke a detached entry's cancel callback. A panicking callback is
    /// logged and swallowed; the entry is already gone either way.
    fn fire(&self, id: &str, entry: PendingRequest, reason: &str) {
        let outcome = catch_unwind(AssertUnwindSafe(|| entry.cancel.cancel(reason)));
        match outcome {
            Ok(()) => {
                if self.debug {
                    debug!(request_id = id, reason, "request cancelled");
                }
            }
            Err(_) => warn!(request_id = id, "cancel callback panicked; skipping"),
        }
    }
}

fn default_reason(id: &str, call_site: &str) -> String {
    format!("`cancelRequest({})` from `RequestManager.{}`", id, call_site)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(String, String)>>>;

    fn recorder(log: &Log, name: &str) -> impl Cancel + 'static {
        let log = log.clone();
        let name = name.to_string();
        move |reason: &str| log.lock().unwrap().push((name.clone(), reason.to_string()))
    }

    fn calls(log: &Log) -> Vec<(String, String)> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn unknown_ids_are_noops() {
        let mgr = RequestManager::default();
        mgr.cancel_request("ghost", None);
        mgr.remove_request("ghost", Some("ctx"));
        mgr.cancel_context_requests("ghost");
        assert!(mgr.is_empty());
        assert!(mgr.contexts().is_empty());
    }

    #[test]
    fn duplicate_id_cancels_stale_entry() {
        let log = Log::default();
        let mgr = RequestManager::default();
        mgr.add_request("x", Some("A"), recorder(&log, "first"));
        mgr.add_request("x", Some("B"), recorder(&log, "second"));

        let calls = calls(&log);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "first");
        assert!(calls[0].1.contains("Found duplicate pending request"));
        assert_eq!(mgr.contexts(), vec!["B".to_string()]);
        assert_eq!(mgr.context_ids("B"), vec!["x".to_string()]);
        assert_eq!(mgr.pending_count(), 1);
    }

    #[test]
    fn remove_is_idempotent_and_keeps_index_consistent() {
        let mgr = RequestManager::default();
        mgr.add_request("a", Some("ctx"), |_: &str| {});
        mgr.add_request("b", Some("ctx"), |_: &str| {});
        mgr.remove_request("a", Some("ctx"));
        mgr.remove_request("a", Some("ctx"));
        assert_eq!(mgr.context_ids("ctx"), vec!["b".to_string()]);
        mgr.remove_request("b", Some("ctx"));
        assert!(mgr.contexts().is_empty());
        assert!(mgr.is_empty());
    }

    #[test]
    fn cancel_single_uses_default_reason() {
        let log = Log::default();
        let mgr = RequestManager::default();
        mgr.add_request("r1", None, recorder(&log, "r1"));
        mgr.cancel_request("r1", None);
        mgr.cancel_request("r1", None);
        assert_eq!(
            calls(&log),
            vec![(
                "r1".to_string(),
                "`cancelRequest(r1)` from `RequestManager.cancelRequest`".to_string()
            )]
        );
        assert!(!mgr.has("r1"));
    }

    #[test]
    fn cancel_request_falls_back_to_context() {
        let log = Log::default();
        let mgr = RequestManager::default();
        mgr.add_request("a", Some("page"), recorder(&log, "a"));
        mgr.add_request("b", Some("page"), recorder(&log, "b"));
        mgr.add_request("c", Some("other"), recorder(&log, "c"));

        mgr.cancel_request("page", None);

        let calls = calls(&log);
        assert_eq!(
            calls,
            vec![
                (
                    "a".to_string(),
                    "`cancelRequest(a)` from `RequestManager.cancelRequest`".to_string()
                ),
                (
                    "b".to_string(),
                    "`cancelRequest(b)` from `RequestManager.cancelRequest`".to_string()
                ),
            ]
        );
        assert_eq!(mgr.contexts(), vec!["other".to_string()]);
        assert!(mgr.has("c"));
    }

    #[test]
    fn cancel_context_fires_each_once() {
        let log = Log::default();
        let mgr = RequestManager::default();
        mgr.add_request("a", Some("view"), recorder(&log, "a"));
        mgr.add_request("b", Some("view"), recorder(&log, "b"));
        mgr.remove_request("b", Some("view"));

        mgr.cancel_context_requests("view");
        mgr.cancel_context_requests("view");

        assert_eq!(calls(&log), vec![("a".to_string(), "view".to_string())]);
        assert!(mgr.context_ids("view").is_empty());
        assert!(mgr.contexts().is_empty());
    }

    #[test]
    fn cancel_all_clears_everything() {
        let log = Log::default();
        let mgr = RequestManager::default();
        mgr.cancel_all_requests(None);

        mgr.add_request("a", Some("x"), recorder(&log, "a"));
        mgr.add_request("b", None, recorder(&log, "b"));
        mgr.cancel_all_requests(Some("shutdown"));

        assert_eq!(
            calls(&log),
            vec![
                ("a".to_string(), "shutdown".to_string()),
                ("b".to_string(), "shutdown".to_string()),
            ]
        );
        assert!(mgr.is_empty());
        assert!(mgr.contexts().is_empty());
    }

    #[test]
    fn stale_registration_does_not_remove_newer_one() {
        let mgr = RequestManager::default();
        let old = mgr.add_request("x", Some("A"), |_: &str| {});
        let new = mgr.add_request("x", Some("B"), |_: &str| {});
        assert_ne!(old, new);

        assert!(!mgr.remove_registration("x", old));
        assert!(mgr.has("x"));
        assert_eq!(mgr.context_ids("B"), vec!["x".to_string()]);

        assert!(mgr.remove_registration("x", new));
        assert!(!mgr.remove_registration("x", new));
        assert!(mgr.is_empty());
        assert!(mgr.contexts().is_empty());
    }

    #[test]
    fn panicking_callback_is_contained() {
        let log = Log::default();
        let mgr = RequestManager::default();
        mgr.add_request("bad", Some("g"), |_: &str| panic!("broken handle"));
        mgr.add_request("good", Some("g"), recorder(&log, "good"));
        mgr.cancel_context_requests("g");
        assert_eq!(calls(&log).len(), 1);
        assert!(mgr.is_empty());
    }

    #[test]
    fn callback_may_reenter_manager() {
        let mgr = Arc::new(RequestManager::default());
        let inner = mgr.clone();
        mgr.add_request("a", Some("ctx"), move |_: &str| {
            inner.remove_request("a", Some("ctx"));
            assert!(!inner.has("a"));
        });
        mgr.cancel_request("a", None);
        assert!(mgr.is_empty());
    }
}
