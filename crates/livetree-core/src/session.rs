//! Update Session: per-connection state that turns a stream of data
//! snapshots into a stream of minimal wire frames (§3, §4.5, §5).
//!
//! A `Session` owns the last [`RenderedTree`] it produced. Every call to
//! [`Session::next_delta`] renders the template fresh against the new data,
//! diffs it against the cached tree, and — only if rendering succeeded —
//! commits the new tree as the cache for next time. A failed render never
//! touches the cache, so a transient evaluation error in strict mode can't
//! leave the session out of sync with what the client actually holds.

use std::sync::{Arc, Condvar, Mutex};

use crate::config::EngineConfig;
use crate::construct::CompiledTemplate;
use crate::diff::diff_tree;
use crate::error::EngineError;
use crate::eval::DataContext;
use crate::fingerprint::fnv1a_hex;
use crate::path::Scope;
use crate::registry::Registry;
use crate::render;
use crate::rendered::RenderedTree;
use crate::tree::UpdateTree;

pub struct Session {
    template: Arc<CompiledTemplate>,
    registry: Registry,
    config: EngineConfig,
    last: Option<RenderedTree>,
}

impl Session {
    pub fn new(template: Arc<CompiledTemplate>, registry: Registry, config: EngineConfig) -> Self {
        Session {
            template,
            registry,
            config,
            last: None,
        }
    }

    /// Render `data` as a full tree, unconditionally resetting the cache to
    /// it. Used for the initial connection handshake and after
    /// [`Session::reset`] (§4.5 "Reconnection"). `data` is anything
    /// implementing [`DataContext`] — a bare `serde_json::Value` works out
    /// of the box.
    pub fn full_tree<D: DataContext>(&mut self, data: D) -> Result<UpdateTree, EngineError> {
        let rendered = self.render(data)?;
        let mut wire = rendered.to_wire();
        self.attach_fingerprint(&mut wire);
        self.last = Some(rendered);
        Ok(wire)
    }

    /// Render `data` and return the minimal delta against the last tree
    /// this session sent, or `None` if nothing changed (P5: an empty delta
    /// is never sent as a frame).
    ///
    /// The very first call on a fresh session has no cache to diff against,
    /// so it behaves like [`Session::full_tree`].
    pub fn next_delta<D: DataContext>(&mut self, data: D) -> Result<Option<UpdateTree>, EngineError> {
        let Some(previous) = &self.last else {
            return self.full_tree(data).map(Some);
        };
        let rendered = self.render(data)?;
        let mut delta = diff_tree(previous, &rendered, &self.config);
        if delta.is_empty() {
            self.last = Some(rendered);
            return Ok(None);
        }
        self.attach_fingerprint(&mut delta);
        self.last = Some(rendered);
        Ok(Some(delta))
    }

    /// Drop the cached tree. The next [`Session::next_delta`] call renders
    /// and sends a full tree instead of a delta (§4.5).
    pub fn reset(&mut self) {
        self.last = None;
    }

    fn render<D: DataContext>(&self, data: D) -> Result<RenderedTree, EngineError> {
        let scope = Scope::root(data);
        render::render(&self.template, &scope, &self.registry, &self.config)
    }

    fn attach_fingerprint(&self, tree: &mut UpdateTree) {
        if self.config.emit_fingerprint {
            tree.fingerprint = Some(fnv1a_hex(&tree.to_value()));
        }
    }
}

/// Single-slot coalescing queue used for outbound backpressure (§5).
///
/// `push` never blocks and never drops a caller's update: it either fills
/// the empty slot or overwrites a still-pending one, which is the
/// "coalesce" behavior — an unconsumed render is replaced by a fresher one,
/// not discarded silently while also being kept. `pop_blocking` is the only
/// way an item actually leaves the slot, and it blocks the consumer until
/// one is available rather than returning a stale or missing value.
pub struct Coalescer<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Coalescer<T> {
    pub fn new() -> Self {
        Coalescer {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(item);
        self.ready.notify_one();
    }

    /// Block until an item is available, then take it.
    pub fn pop_blocking(&self) -> T {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(item) = slot.take() {
                return item;
            }
            slot = self.ready.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Take whatever is pending without blocking, if anything is.
    pub fn try_pop(&self) -> Option<T> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    }
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Coalescer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use serde_json::json;
    use std::thread;
    use std::time::Duration;

    fn session(src: &str) -> Session {
        Session::new(Arc::new(compile(src).unwrap()), Registry::new(), EngineConfig::default())
    }

    #[test]
    fn first_call_sends_a_full_tree() {
        let mut s = session("<p>{{.Name}}</p>");
        let tree = s.next_delta(json!({"Name": "Ada"})).unwrap().unwrap();
        assert!(tree.statics.is_some());
    }

    #[test]
    fn unchanged_data_produces_no_delta() {
        let mut s = session("<p>{{.Name}}</p>");
        s.next_delta(json!({"Name": "Ada"})).unwrap();
        let second = s.next_delta(json!({"Name": "Ada"})).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn changed_field_produces_a_sparse_delta() {
        let mut s = session("<p>{{.Name}}</p>");
        s.next_delta(json!({"Name": "Ada"})).unwrap();
        let delta = s.next_delta(json!({"Name": "Grace"})).unwrap().unwrap();
        assert!(delta.statics.is_none());
        assert_eq!(delta.to_value(), json!({"0": "Grace"}));
    }

    #[test]
    fn reset_forces_the_next_call_to_be_a_full_tree() {
        let mut s = session("<p>{{.Name}}</p>");
        s.next_delta(json!({"Name": "Ada"})).unwrap();
        s.reset();
        let tree = s.next_delta(json!({"Name": "Ada"})).unwrap().unwrap();
        assert!(tree.statics.is_some());
    }

    #[test]
    fn coalescer_collapses_backpressured_pushes_into_the_latest() {
        let c: Coalescer<i32> = Coalescer::new();
        c.push(1);
        c.push(2);
        c.push(3);
        assert_eq!(c.pop_blocking(), 3);
    }

    #[test]
    fn coalescer_pop_blocks_until_a_push_arrives() {
        let c = Arc::new(Coalescer::<i32>::new());
        let producer = Arc::clone(&c);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push(42);
        });
        assert_eq!(c.pop_blocking(), 42);
    }
}
