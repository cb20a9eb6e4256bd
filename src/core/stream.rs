//! Lazy value streams and the range data-source adapter.
//!
//! Range data may be an eager list or a producer running on its own thread.
//! Either way the engine sees the same thing: a bounded, single-pass
//! sequence of string-keyed scopes, one per iteration.

use std::fmt;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

use crate::types::{DataMap, Value};

/// Handle on a bounded, single-consumer stream of values.
///
/// Clones share the underlying channel, so a stream is consumed at most
/// once no matter how many handles exist. Dropping every handle closes the
/// channel, which a producer observes as a send error.
#[derive(Clone)]
pub struct ValueStream {
    rx: Arc<Mutex<Receiver<Value>>>,
}

impl ValueStream {
    /// A bounded hand-off channel: the producer blocks once `capacity`
    /// values are in flight. The sender side goes to the producer task,
    /// the stream into the data context.
    pub fn bounded(capacity: usize) -> (SyncSender<Value>, ValueStream) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (
            tx,
            ValueStream {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// A pre-filled stream over a fixed set of values.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> ValueStream {
        let values: Vec<Value> = values.into_iter().collect();
        let (tx, stream) = ValueStream::bounded(values.len().max(1));
        for value in values {
            // Capacity covers every element; the buffer cannot be full.
            let _ = tx.send(value);
        }
        stream
    }

    pub(crate) fn next_value(&self) -> Option<Value> {
        match self.rx.lock() {
            Ok(rx) => rx.recv().ok(),
            Err(_) => None,
        }
    }

    pub(crate) fn same_channel(&self, other: &ValueStream) -> bool {
        Arc::ptr_eq(&self.rx, &other.rx)
    }
}

impl fmt::Debug for ValueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueStream")
    }
}

/// Per-iteration scopes for one range expansion, in source order.
///
/// The iterator is fused on the first element that is not a string-keyed
/// map: that element and everything after it are discarded rather than
/// surfaced as an error, keeping templates robust to partially-shaped data.
pub(crate) struct RowScopes {
    source: ScopeSource,
    done: bool,
}

enum ScopeSource {
    Stream(ValueStream),
    List(std::vec::IntoIter<Value>),
    Empty,
}

/// Normalize the value under a range key into iteration scopes.
///
/// Streams pass through, lists iterate in order, and anything else yields
/// no iterations at all.
pub(crate) fn row_scopes(value: Value) -> RowScopes {
    let source = match value {
        Value::Stream(stream) => ScopeSource::Stream(stream),
        Value::List(items) => ScopeSource::List(items.into_iter()),
        _ => ScopeSource::Empty,
    };
    RowScopes {
        source,
        done: false,
    }
}

impl Iterator for RowScopes {
    type Item = DataMap;

    fn next(&mut self) -> Option<DataMap> {
        if self.done {
            return None;
        }
        let value = match &mut self.source {
            ScopeSource::Stream(stream) => stream.next_value(),
            ScopeSource::List(items) => items.next(),
            ScopeSource::Empty => None,
        };
        let Some(value) = value else {
            self.done = true;
            return None;
        };
        match value.into_data_map() {
            Ok(scope) => Some(scope),
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}
