// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Queue and invocation tree of a single context.
//!
//! Everything here runs under the context's state lock and never calls user
//! code; handlers, interceptors and observers are invoked by the context
//! after the lock is released.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::node::{Completion, NodeData, NodeId, NodeStatus};
use crate::engine::{Handler, HandlerId, JoinSpec};
use crate::events::Event;

pub(crate) struct QueuedEvent {
    pub event: Event,
    pub seq: u64,
    pub producer: NodeId,
}

struct Subscriber {
    scope: NodeId,
    tx: mpsc::UnboundedSender<Event>,
}

/// A satisfied join-spec, already removed from the queue.
pub(crate) struct Match {
    pub inputs: Vec<Event>,
    pub parent: NodeId,
}

pub(crate) struct SchedulerState {
    queue: VecDeque<QueuedEvent>,
    nodes: HashMap<NodeId, NodeData>,
    subscribers: Vec<Subscriber>,
    next_seq: u64,
    next_node: u64,
}

fn is_within(nodes: &HashMap<NodeId, NodeData>, node: NodeId, scope: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == scope {
            return true;
        }
        current = nodes.get(&id).and_then(|n| n.parent);
    }
    false
}

impl SchedulerState {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::ROOT, NodeData::root());
        Self {
            queue: VecDeque::new(),
            nodes,
            subscribers: Vec::new(),
            next_seq: 0,
            next_node: 0,
        }
    }

    /// Sequence number the next recorded event will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Append to the queue, attribute to `producer` and notify scoped streams.
    pub fn record(&mut self, producer: NodeId, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(node) = self.nodes.get_mut(&producer) {
            node.emitted.push((seq, event.clone()));
        }

        let nodes = &self.nodes;
        self.subscribers.retain(|sub| {
            if is_within(nodes, producer, sub.scope) {
                sub.tx.send(event.clone()).is_ok()
            } else {
                !sub.tx.is_closed()
            }
        });

        self.queue.push_back(QueuedEvent {
            event,
            seq,
            producer,
        });
    }

    /// Try to satisfy `spec` from events recorded before `horizon`.
    ///
    /// The new invocation's parent is the producer of the most recently sent
    /// of the consumed inputs.
    pub fn take_match(&mut self, spec: &JoinSpec, horizon: u64) -> Option<Match> {
        let positions = spec.match_slots(
            self.queue
                .iter()
                .enumerate()
                .filter(|(_, queued)| queued.seq < horizon)
                .map(|(position, queued)| (position, &queued.event)),
        )?;

        let parent = positions
            .iter()
            .map(|&p| &self.queue[p])
            .max_by_key(|queued| queued.seq)
            .map(|queued| queued.producer)
            .unwrap_or(NodeId::ROOT);
        let inputs = positions
            .iter()
            .map(|&p| self.queue[p].event.clone())
            .collect();

        let mut removal = positions;
        removal.sort_unstable_by(|a, b| b.cmp(a));
        for position in removal {
            self.queue.remove(position);
        }

        Some(Match { inputs, parent })
    }

    pub fn can_match(&self, spec: &JoinSpec) -> bool {
        spec.match_slots(
            self.queue
                .iter()
                .enumerate()
                .map(|(position, queued)| (position, &queued.event)),
        )
        .is_some()
    }

    pub fn create_node(&mut self, parent: NodeId, handler: Handler, inputs: Vec<Event>) -> NodeId {
        let parent = if self.nodes.contains_key(&parent) {
            parent
        } else {
            NodeId::ROOT
        };
        self.next_node += 1;
        let id = NodeId(self.next_node);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.insert(id);
        }
        self.nodes
            .insert(id, NodeData::invocation(parent, handler, inputs));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(&id)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn has_token(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.token.is_some())
    }

    /// Lazily allocate the node's token as a child of its parent's.
    /// Collected nodes fall back to the root.
    pub fn token_for(&mut self, id: NodeId) -> CancellationToken {
        let id = if self.nodes.contains_key(&id) {
            id
        } else {
            NodeId::ROOT
        };
        if let Some(token) = self.nodes.get(&id).and_then(|n| n.token.clone()) {
            return token;
        }
        let token = match self.parent_of(id) {
            Some(parent) => self.token_for(parent).child_token(),
            None => CancellationToken::new(),
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.token = Some(token.clone());
        }
        token
    }

    /// Record the first cancellation reason for `id`.
    pub fn set_reason(&mut self, id: NodeId, reason: Arc<anyhow::Error>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.cancel_reason.get_or_insert(reason);
        }
    }

    /// The closest cancellation reason at or above `id`.
    pub fn reason_for(&self, id: NodeId) -> Option<Arc<anyhow::Error>> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.nodes.get(&node_id)?;
            if let Some(reason) = &node.cancel_reason {
                return Some(reason.clone());
            }
            current = node.parent;
        }
        None
    }

    /// Open a stream over `scope`'s subtree: recorded history first (when
    /// `replay` is set), then live.
    pub fn subscribe(&mut self, scope: NodeId, replay: bool) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        if !replay {
            self.subscribers.push(Subscriber { scope, tx });
            return rx;
        }

        let mut recorded: Vec<&(u64, Event)> = self
            .nodes
            .iter()
            .filter(|(id, _)| is_within(&self.nodes, **id, scope))
            .flat_map(|(_, node)| node.emitted.iter())
            .collect();
        recorded.sort_by_key(|(seq, _)| *seq);
        for (_, event) in recorded {
            // Receiver is alive: we hold it.
            let _ = tx.send(event.clone());
        }

        self.subscribers.push(Subscriber { scope, tx });
        rx
    }

    /// Every event sent into the context, in send order.
    pub fn history(&self) -> Vec<Event> {
        let mut all: Vec<&(u64, Event)> = self
            .nodes
            .values()
            .flat_map(|node| node.emitted.iter())
            .collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, event)| event.clone()).collect()
    }

    pub fn pending(&self) -> Vec<Event> {
        self.queue.iter().map(|q| q.event.clone()).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Running deferred invocations, optionally only those of one handler.
    pub fn in_flight(&self, handler: Option<HandlerId>) -> Vec<(NodeId, Handler, Completion)> {
        let mut running: Vec<(NodeId, Handler, Completion)> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.status == NodeStatus::Running)
            .filter_map(|(id, node)| {
                let h = node.handler.as_ref()?;
                if handler.is_some_and(|wanted| wanted != h.id()) {
                    return None;
                }
                let completion = node.completion.clone()?;
                Some((*id, h.clone(), completion))
            })
            .collect();
        running.sort_by_key(|(id, _, _)| *id);
        running
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop settled leaf nodes until none are left, returning how many went.
    ///
    /// Nodes that are still running, have children, or produced events that
    /// are still queued are kept. History emitted by collected nodes is lost.
    pub fn collect_garbage(&mut self) -> usize {
        let queued_producers: HashSet<NodeId> = self.queue.iter().map(|q| q.producer).collect();
        let mut removed = 0;

        loop {
            let collectable: Vec<NodeId> = self
                .nodes
                .iter()
                .filter(|(id, node)| {
                    !id.is_root()
                        && node.children.is_empty()
                        && node.status != NodeStatus::Running
                        && !queued_producers.contains(id)
                })
                .map(|(id, _)| *id)
                .collect();
            if collectable.is_empty() {
                break;
            }
            for id in collectable {
                if let Some(node) = self.nodes.remove(&id) {
                    if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
                        parent.children.remove(&id);
                    }
                    removed += 1;
                }
            }
        }
        removed
    }
}
