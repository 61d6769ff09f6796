//! Cross-reference table: the owner of every indirect object in a document.
//!
//! Objects refer to each other only through [`ObjectRef`] handles, so the
//! graph may contain cycles while each value has exactly one owner here.
//! Reachability, compaction and renumbering all work on the id graph.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Default reference-hop depth before a subgraph is deferred.
pub const DEFAULT_CLOSURE_DEPTH: usize = 64;

/// Indirect objects of one document revision, keyed by id.
#[derive(Debug, Clone)]
pub struct CrossRefTable {
    objects: BTreeMap<ObjectRef, Object>,
    max_object_number: u32,
    max_closure_depth: usize,
}

impl Default for CrossRefTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            max_object_number: 0,
            max_closure_depth: DEFAULT_CLOSURE_DEPTH,
        }
    }

    /// Set the depth guard used by [`compact`](Self::compact) and
    /// [`renumber`](Self::renumber).
    pub fn with_max_closure_depth(mut self, depth: usize) -> Self {
        self.max_closure_depth = depth.max(1);
        self
    }

    /// Number of objects in the table.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Largest object number ever inserted. Never decreases except through
    /// [`renumber`](Self::renumber).
    pub fn max_object_number(&self) -> u32 {
        self.max_object_number
    }

    /// The id [`add`](Self::add) will assign next.
    pub fn next_object_id(&self) -> ObjectRef {
        ObjectRef::new(self.max_object_number + 1, 0)
    }

    /// Store `object` under a freshly minted id.
    pub fn add(&mut self, object: Object) -> ObjectRef {
        let id = self.next_object_id();
        self.objects.insert(id, object);
        self.max_object_number = id.id;
        id
    }

    /// Store `object` under `id`. An id already present is rejected.
    pub fn insert(&mut self, id: ObjectRef, object: Object) -> Result<()> {
        if self.objects.contains_key(&id) {
            return Err(Error::DuplicateObject(id));
        }
        self.objects.insert(id, object);
        self.max_object_number = self.max_object_number.max(id.id);
        Ok(())
    }

    /// Replace the value stored under `id`, inserting it if absent.
    pub fn set(&mut self, id: ObjectRef, object: Object) -> Option<Object> {
        self.max_object_number = self.max_object_number.max(id.id);
        self.objects.insert(id, object)
    }

    /// Remove and return the object stored under `id`.
    pub fn remove(&mut self, id: ObjectRef) -> Option<Object> {
        self.objects.remove(&id)
    }

    /// Look up an object by id.
    pub fn get(&self, id: ObjectRef) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// Look up an object by id for modification.
    pub fn get_mut(&mut self, id: ObjectRef) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    /// Check whether `id` is present.
    pub fn contains(&self, id: ObjectRef) -> bool {
        self.objects.contains_key(&id)
    }

    /// Follow `object` if it is a reference, returning the target.
    ///
    /// Direct objects are returned unchanged. A dangling reference resolves
    /// to `None`.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(r) => self.get(*r),
            other => Some(other),
        }
    }

    /// All ids in ascending order.
    pub fn all_references(&self) -> Vec<ObjectRef> {
        self.objects.keys().copied().collect()
    }

    /// Iterate over `(id, object)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectRef, &Object)> {
        self.objects.iter()
    }

    /// Ids reachable from `roots`, in first-visit order.
    ///
    /// Each id appears once. Subgraphs more than `max_depth` reference hops
    /// from the nearest root are deferred and expanded in a follow-up pass,
    /// so long chains cost no more than short ones. References to ids that
    /// are not in the table are skipped.
    pub fn transitive_closure(&self, roots: &[ObjectRef], max_depth: usize) -> Vec<ObjectRef> {
        let max_depth = max_depth.max(1);
        let mut visited: HashSet<ObjectRef> = HashSet::new();
        let mut order = Vec::new();

        let mut pending: Vec<ObjectRef> = roots.to_vec();
        let mut passes = 0usize;

        while !pending.is_empty() {
            passes += 1;
            let mut deferred = Vec::new();
            let mut queue: VecDeque<(ObjectRef, usize)> =
                pending.drain(..).map(|r| (r, 0)).collect();

            while let Some((id, depth)) = queue.pop_front() {
                if visited.contains(&id) {
                    continue;
                }
                let Some(object) = self.objects.get(&id) else {
                    log::debug!("Closure skipped missing object {}", id);
                    continue;
                };
                if depth > max_depth {
                    deferred.push(id);
                    continue;
                }

                visited.insert(id);
                order.push(id);

                object.for_each_reference(&mut |child| {
                    if !visited.contains(&child) {
                        queue.push_back((child, depth + 1));
                    }
                });
            }

            pending = deferred;
        }

        if passes > 1 {
            log::debug!(
                "Closure reached {} objects in {} passes (depth guard {})",
                order.len(),
                passes,
                max_depth
            );
        }

        order
    }

    /// Drop every object not reachable from `roots`. Returns how many were removed.
    pub fn compact(&mut self, roots: &[ObjectRef]) -> usize {
        let reachable: HashSet<ObjectRef> = self
            .transitive_closure(roots, self.max_closure_depth)
            .into_iter()
            .collect();

        let before = self.objects.len();
        self.objects.retain(|id, _| reachable.contains(id));
        let removed = before - self.objects.len();

        if removed > 0 {
            log::info!("Compaction removed {} unreachable objects", removed);
        }
        removed
    }

    /// Reassign ids densely as `1..=N` with generation 0.
    ///
    /// Objects reachable from the references inside `roots` are numbered in
    /// closure order; anything else keeps its relative order after them.
    /// Every reference in every object, and in `roots`, is rewritten. Returns
    /// the old-to-new id map.
    pub fn renumber(&mut self, roots: &mut Object) -> HashMap<ObjectRef, ObjectRef> {
        let mut root_refs = Vec::new();
        roots.for_each_reference(&mut |r| root_refs.push(r));

        let mut order = self.transitive_closure(&root_refs, self.max_closure_depth);
        let reached: HashSet<ObjectRef> = order.iter().copied().collect();
        order.extend(self.all_references().into_iter().filter(|id| !reached.contains(id)));

        let map: HashMap<ObjectRef, ObjectRef> = order
            .iter()
            .enumerate()
            .map(|(i, old)| (*old, ObjectRef::new(i as u32 + 1, 0)))
            .collect();

        let rewrite = |r: ObjectRef| map.get(&r).copied();
        let old_objects = std::mem::take(&mut self.objects);
        for (old_id, mut object) in old_objects {
            object.rewrite_references(&rewrite);
            if let Some(new_id) = map.get(&old_id) {
                self.objects.insert(*new_id, object);
            }
        }
        roots.rewrite_references(&rewrite);

        self.max_object_number = self.objects.len() as u32;
        log::debug!("Renumbered {} objects", map.len());
        map
    }
}
