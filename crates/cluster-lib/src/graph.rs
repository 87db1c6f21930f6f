//! Object graph shared by points, cluster markers and containers
//!
//! Every map object lives in an arena owned by [`ObjectGraph`] and is addressed by a
//! generational [`ObjectId`]. Objects form a containment tree: a parent's location is
//! derived from its direct children and is recomputed whenever a child moves or the
//! child list changes, so a change at a leaf ripples up to every ancestor.
//!
//! Listeners are registered per object and per [`EventKind`]. They receive a mutable
//! reference to the graph, which lets a listener react by mutating other objects (for
//! example, moving a marker to follow its container's centroid).

use crate::{ClusterError, Location, Result};
use geo::Point;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Generational handle of an object in an [`ObjectGraph`]
///
/// A handle stays valid until its object is deleted. Slots are reused, but the
/// generation is bumped on reuse so stale handles are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Kinds of events an object can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LocationChange,
    ChildrenChange,
    ActiveChange,
}

/// An event emitted by an object
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// The object's location changed to the given value
    LocationChanged(Location),
    /// A child was added or removed; `count` is the new number of children
    ChildrenChanged { count: usize },
    /// The object's active flag changed to the given value
    ActiveChanged(bool),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::LocationChanged(_) => EventKind::LocationChange,
            Event::ChildrenChanged { .. } => EventKind::ChildrenChange,
            Event::ActiveChanged(_) => EventKind::ActiveChange,
        }
    }
}

/// Handle of a registered listener, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// How a container derives its location from its direct children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LocationMode {
    /// Arithmetic mean of all children
    #[default]
    Average,
    /// Location of the middle child in insertion order (cheaper, no averaging)
    Middle,
}

type Callback = dyn FnMut(&mut ObjectGraph, ObjectId, &Event) + 'static;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    callback: Rc<RefCell<Callback>>,
}

/// A single object stored in the arena
struct MapObject {
    generation: u32,
    name: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    location: Location,
    active: bool,
    location_mode: LocationMode,
    listeners: Vec<Listener>,
}

/// Arena of map objects with containment, location propagation and events
pub struct ObjectGraph {
    objects: Vec<Option<MapObject>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    next_listener: u64,
    converge_active_state: bool,
}

impl Default for ObjectGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectGraph")
            .field("objects_total", &self.objects.len())
            .field("objects_alive", &self.len())
            .field("free_list", &self.free_list.len())
            .field("converge_active_state", &self.converge_active_state)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ObjectGraph {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            next_listener: 0,
            converge_active_state: false,
        }
    }

    /// Enable the "all children share one active state" bookkeeping
    ///
    /// When enabled, a parent whose children all end up with the same active flag
    /// adopts that flag (without cascading back down). This is advisory only:
    /// nothing in the clustering engine reads a container's flag to decide what
    /// is visible, and under interleaved partial updates the parent flag may lag.
    pub fn with_active_convergence(mut self, enabled: bool) -> Self {
        self.converge_active_state = enabled;
        self
    }

    pub fn set_active_convergence(&mut self, enabled: bool) {
        self.converge_active_state = enabled;
    }

    /// Create a new, parentless, active object at the given location
    pub fn create(&mut self, name: impl Into<String>, location: Location) -> ObjectId {
        let object = |generation| MapObject {
            generation,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            location,
            active: true,
            location_mode: LocationMode::default(),
            listeners: Vec::new(),
        };

        if let Some(index) = self.free_list.pop() {
            let generation = self.generations[index].saturating_add(1);
            self.generations[index] = generation;
            self.objects[index] = Some(object(generation));
            ObjectId {
                index: index as u32,
                generation,
            }
        } else {
            let generation = 1;
            self.objects.push(Some(object(generation)));
            self.generations.push(generation);
            ObjectId {
                index: (self.objects.len() - 1) as u32,
                generation,
            }
        }
    }

    /// Whether the handle refers to a live object
    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_ok()
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.objects.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self, id: ObjectId) -> Option<&str> {
        self.get(id).ok().map(|o| o.name.as_str())
    }

    pub fn location(&self, id: ObjectId) -> Option<Location> {
        self.get(id).ok().map(|o| o.location)
    }

    /// Active flag of the object (`false` for unknown handles)
    pub fn is_active(&self, id: ObjectId) -> bool {
        self.get(id).map(|o| o.active).unwrap_or(false)
    }

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id).ok().and_then(|o| o.parent)
    }

    /// Direct children in insertion order (empty for unknown handles)
    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.get(id).map(|o| o.children.as_slice()).unwrap_or(&[])
    }

    pub fn location_mode(&self, id: ObjectId) -> Option<LocationMode> {
        self.get(id).ok().map(|o| o.location_mode)
    }

    /// Number of listeners registered on the object, across all event kinds
    pub fn listener_count(&self, id: ObjectId) -> usize {
        self.get(id).map(|o| o.listeners.len()).unwrap_or(0)
    }

    /// Move an object
    ///
    /// Returns `Ok(false)` if the location is exactly equal to the current one.
    /// Otherwise emits [`Event::LocationChanged`] and asks the parent to
    /// recompute its own location.
    pub fn set_location(&mut self, id: ObjectId, location: Location) -> Result<bool> {
        let object = self.get_mut(id)?;
        if object.location == location {
            return Ok(false);
        }
        object.location = location;
        let parent = object.parent;

        self.emit(id, Event::LocationChanged(location));
        if let Some(parent) = parent {
            self.recompute_location(parent)?;
        }
        Ok(true)
    }

    /// Change how the object derives its location from its children
    ///
    /// The location is re-evaluated immediately.
    pub fn set_location_mode(&mut self, id: ObjectId, mode: LocationMode) -> Result<()> {
        self.get_mut(id)?.location_mode = mode;
        self.recompute_location(id)
    }

    /// Add `child` under `parent`, detaching it from its previous parent first
    ///
    /// Adding an object to its current parent again is a no-op.
    pub fn add_child(&mut self, parent: ObjectId, child: ObjectId) -> Result<()> {
        self.add_children(parent, &[child])
    }

    /// Add several children, in order
    ///
    /// The parent's location is recomputed and [`Event::ChildrenChanged`] emitted
    /// once for the whole batch. On error, the children attached so far stay attached.
    pub fn add_children(&mut self, parent: ObjectId, children: &[ObjectId]) -> Result<()> {
        self.get(parent)?;

        let mut result = Ok(());
        let mut attached = false;
        for &child in children {
            match self.attach(parent, child) {
                Ok(changed) => attached |= changed,
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        if attached {
            let count = self.get(parent)?.children.len();
            self.recompute_location(parent)?;
            self.emit(parent, Event::ChildrenChanged { count });
        }
        result
    }

    /// Detach every child at once, returning them in their previous order
    ///
    /// The parent keeps its last location.
    pub fn take_children(&mut self, id: ObjectId) -> Result<Vec<ObjectId>> {
        let children = std::mem::take(&mut self.get_mut(id)?.children);
        for &child in &children {
            if let Ok(child) = self.get_mut(child) {
                child.parent = None;
            }
        }
        if !children.is_empty() {
            self.emit(id, Event::ChildrenChanged { count: 0 });
        }
        Ok(children)
    }

    /// Remove `child` from `parent`'s children
    pub fn remove_child(&mut self, parent: ObjectId, child: ObjectId) -> Result<()> {
        let object = self.get_mut(parent)?;
        let Some(position) = object.children.iter().position(|c| *c == child) else {
            tracing::warn!("Object {} is not a child of {}", child, parent);
            return Err(ClusterError::NotAChild { parent, child });
        };
        object.children.remove(position);
        let count = object.children.len();

        if let Ok(child) = self.get_mut(child) {
            child.parent = None;
        }

        self.recompute_location(parent)?;
        self.emit(parent, Event::ChildrenChanged { count });
        Ok(())
    }

    /// Detach an object from its parent, if it has one
    pub fn detach(&mut self, id: ObjectId) -> Result<()> {
        match self.get(id)?.parent {
            Some(parent) => self.remove_child(parent, id),
            None => Ok(()),
        }
    }

    /// Change the active flag
    ///
    /// No-op unless the flag changes or `force` is set. Unless `ignore_children`
    /// is set, the new flag cascades to every descendant. Returns whether the
    /// object was updated.
    pub fn set_active(
        &mut self,
        id: ObjectId,
        active: bool,
        force: bool,
        ignore_children: bool,
    ) -> Result<bool> {
        let object = self.get_mut(id)?;
        if !force && object.active == active {
            return Ok(false);
        }
        object.active = active;
        let parent = object.parent;

        if !ignore_children {
            let children = object.children.clone();
            for child in children {
                self.set_active(child, active, force, false)?;
            }
        }

        if self.converge_active_state
            && let Some(parent) = parent
        {
            self.converge_children_active(parent)?;
        }

        self.emit(id, Event::ActiveChanged(active));
        Ok(true)
    }

    /// Register a listener for one kind of event on an object
    ///
    /// Listeners run in registration order.
    pub fn add_listener<F>(&mut self, id: ObjectId, kind: EventKind, callback: F) -> Result<ListenerId>
    where
        F: FnMut(&mut ObjectGraph, ObjectId, &Event) + 'static,
    {
        let listener_id = ListenerId(self.next_listener);
        let callback: Rc<RefCell<Callback>> = Rc::new(RefCell::new(callback));
        self.get_mut(id)?.listeners.push(Listener {
            id: listener_id,
            kind,
            callback,
        });
        self.next_listener += 1;
        Ok(listener_id)
    }

    /// Register a listener and immediately call it once with the current state
    pub fn add_listener_and_call<F>(
        &mut self,
        id: ObjectId,
        kind: EventKind,
        mut callback: F,
    ) -> Result<ListenerId>
    where
        F: FnMut(&mut ObjectGraph, ObjectId, &Event) + 'static,
    {
        let object = self.get(id)?;
        let current = match kind {
            EventKind::LocationChange => Event::LocationChanged(object.location),
            EventKind::ChildrenChange => Event::ChildrenChanged {
                count: object.children.len(),
            },
            EventKind::ActiveChange => Event::ActiveChanged(object.active),
        };
        callback(self, id, &current);
        self.add_listener(id, kind, callback)
    }

    /// Remove a listener; returns `false` if it was not registered on the object
    pub fn remove_listener(&mut self, id: ObjectId, listener: ListenerId) -> bool {
        let Ok(object) = self.get_mut(id) else {
            return false;
        };
        let before = object.listeners.len();
        object.listeners.retain(|l| l.id != listener);
        object.listeners.len() != before
    }

    /// Delete an object and all of its descendants
    ///
    /// The object is detached from its parent first (which recomputes the
    /// parent's location). Listeners of deleted objects are dropped.
    pub fn delete(&mut self, id: ObjectId) -> Result<()> {
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    fn free_subtree(&mut self, id: ObjectId) {
        let Some(object) = self
            .objects
            .get_mut(id.index as usize)
            .and_then(|slot| slot.take_if(|o| o.generation == id.generation))
        else {
            return;
        };
        self.free_list.push(id.index as usize);
        for child in object.children {
            self.free_subtree(child);
        }
    }

    /// Recompute an object's location from its direct children
    fn recompute_location(&mut self, id: ObjectId) -> Result<()> {
        let object = self.get(id)?;
        if object.children.is_empty() {
            return Ok(());
        }

        let location = match object.location_mode {
            LocationMode::Middle => {
                let middle = object.children[object.children.len() / 2];
                self.get(middle)?.location
            }
            LocationMode::Average => {
                let (mut sum_x, mut sum_y) = (0.0, 0.0);
                for &child in &object.children {
                    let location = self.get(child)?.location;
                    sum_x += location.x();
                    sum_y += location.y();
                }
                let n = object.children.len() as f64;
                Point::new(sum_x / n, sum_y / n)
            }
        };

        self.set_location(id, location).map(|_| ())
    }

    /// Adopt the children's active flag if they all agree on one
    fn converge_children_active(&mut self, parent: ObjectId) -> Result<()> {
        let object = self.get(parent)?;
        let mut states = object.children.iter().map(|&c| self.is_active(c));
        let Some(first) = states.next() else {
            return Ok(());
        };
        if states.all(|s| s == first) && object.active != first {
            self.set_active(parent, first, false, true)?;
        }
        Ok(())
    }

    /// Link `child` under `parent` without recomputing or emitting on `parent`
    fn attach(&mut self, parent: ObjectId, child: ObjectId) -> Result<bool> {
        let previous = self.get(child)?.parent;
        if previous == Some(parent) {
            return Ok(false);
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(ClusterError::Cycle { parent, child });
        }
        if let Some(previous) = previous {
            self.remove_child(previous, child)?;
        }

        self.get_mut(child)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(child);
        Ok(true)
    }

    /// Whether `ancestor` is a strict ancestor of `id`
    fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    fn emit(&mut self, id: ObjectId, event: Event) {
        let kind = event.kind();
        let callbacks: Vec<Rc<RefCell<Callback>>> = match self.get(id) {
            Ok(object) => object
                .listeners
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| l.callback.clone())
                .collect(),
            Err(_) => return,
        };

        for callback in callbacks {
            match callback.try_borrow_mut() {
                Ok(mut callback) => (*callback)(self, id, &event),
                Err(_) => {
                    tracing::warn!("Skipping re-entrant {:?} listener on {}", kind, id);
                }
            }
        }
    }

    fn get(&self, id: ObjectId) -> Result<&MapObject> {
        self.objects
            .get(id.index as usize)
            .and_then(|slot| slot.as_ref())
            .filter(|o| o.generation == id.generation)
            .ok_or(ClusterError::UnknownObject(id))
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut MapObject> {
        self.objects
            .get_mut(id.index as usize)
            .and_then(|slot| slot.as_mut())
            .filter(|o| o.generation == id.generation)
            .ok_or(ClusterError::UnknownObject(id))
    }
}
