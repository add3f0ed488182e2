use super::piece::Span;

/// One splice of the piece list: `old` was replaced by `new` at byte
/// position `pos`. Running the swap with the spans flipped reverts it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Change {
    pub pos: u64,
    pub old: Span,
    pub new: Span,
}

pub(crate) type RevisionId = usize;

/// A group of changes performed between two snapshots. Nodes of the history
/// tree; revisions are kept for the lifetime of the text.
#[derive(Debug)]
pub(crate) struct Revision {
    /// Changes in the order they were made.
    pub changes: Vec<Change>,
    /// Seconds since the epoch, stamped when the revision is sealed.
    pub time: u64,
    pub parent: Option<RevisionId>,
    /// In creation order, so the most recently created child is last.
    pub children: Vec<RevisionId>,
}

/// The revision tree. `head` is the sealed revision whose changes produced
/// the current content; an open revision collects changes made since and is
/// sealed by the next snapshot.
#[derive(Debug)]
pub(crate) struct History {
    arena: Vec<Revision>,
    head: RevisionId,
    open: Option<RevisionId>,
    saved: RevisionId,
}

impl History {
    pub fn new(time: u64) -> History {
        let root = Revision {
            changes: Vec::new(),
            time,
            parent: None,
            children: Vec::new(),
        };
        History {
            arena: vec![root],
            head: 0,
            open: None,
            saved: 0,
        }
    }

    /// Record a change into the open revision, creating one as a child of
    /// `head` if necessary.
    pub fn record(&mut self, change: Change) {
        let open = match self.open {
            Some(id) => id,
            None => {
                let id = self.arena.len();
                self.arena.push(Revision {
                    changes: Vec::new(),
                    time: 0,
                    parent: Some(self.head),
                    children: Vec::new(),
                });
                self.arena[self.head].children.push(id);
                self.open = Some(id);
                id
            }
        };
        self.arena[open].changes.push(change);
    }

    /// The most recent change of the open revision, for contiguous insert
    /// coalescing.
    pub fn last_change_mut(&mut self) -> Option<&mut Change> {
        let open = self.open?;
        self.arena[open].changes.last_mut()
    }

    /// Seal the open revision, stamping its timestamp and making it the new
    /// head. No-op when nothing has changed since the last snapshot.
    pub fn snapshot(&mut self, time: u64) {
        if let Some(open) = self.open.take() {
            self.arena[open].time = time;
            self.head = open;
        }
    }

    #[inline]
    pub fn has_open(&self) -> bool {
        self.open.is_some()
    }

    #[inline]
    pub fn head(&self) -> RevisionId {
        self.head
    }

    #[inline]
    pub fn set_head(&mut self, id: RevisionId) {
        self.head = id;
    }

    #[inline]
    pub fn parent(&self, id: RevisionId) -> Option<RevisionId> {
        self.arena[id].parent
    }

    /// Redo target: the most recently created child.
    #[inline]
    pub fn latest_child(&self, id: RevisionId) -> Option<RevisionId> {
        self.arena[id].children.last().copied()
    }

    #[inline]
    pub fn changes(&self, id: RevisionId) -> &[Change] {
        &self.arena[id].changes
    }

    #[inline]
    pub fn time(&self, id: RevisionId) -> u64 {
        self.arena[id].time
    }

    #[inline]
    pub fn set_saved(&mut self, id: RevisionId) {
        self.saved = id;
    }

    pub fn modified(&self) -> bool {
        self.open.is_some() || self.head != self.saved
    }

    /// Revision whose timestamp is closest to `time`, ties broken toward the
    /// earlier revision. Only meaningful after a snapshot, when every
    /// revision in the arena is sealed.
    pub fn nearest(&self, time: u64) -> RevisionId {
        let mut best = 0;
        let mut best_dist = u64::MAX;
        for (id, rev) in self.arena.iter().enumerate() {
            let dist = rev.time.abs_diff(time);
            if dist < best_dist {
                best = id;
                best_dist = dist;
            }
        }
        best
    }

    /// Revisions to revert and to apply to get from `from` to `to`, going
    /// through their least common ancestor.
    pub fn path(&self, from: RevisionId, to: RevisionId) -> (Vec<RevisionId>, Vec<RevisionId>) {
        let from_chain = self.ancestors(from);
        let to_chain = self.ancestors(to);
        // The root is a common ancestor, so this always finds one.
        let lca = from_chain
            .iter()
            .copied()
            .find(|id| to_chain.contains(id))
            .unwrap_or(0);

        let up: Vec<RevisionId> = from_chain.iter().copied().take_while(|id| *id != lca).collect();
        let mut down: Vec<RevisionId> = to_chain.iter().copied().take_while(|id| *id != lca).collect();
        down.reverse();
        (up, down)
    }

    fn ancestors(&self, mut id: RevisionId) -> Vec<RevisionId> {
        let mut chain = vec![id];
        while let Some(parent) = self.arena[id].parent {
            chain.push(parent);
            id = parent;
        }
        chain
    }

    #[cfg(test)]
    pub(crate) fn set_time(&mut self, id: RevisionId, time: u64) {
        self.arena[id].time = time;
    }

    /// Position of the oldest change of the revision `index` steps up the
    /// parent chain, starting from the open revision if there is one.
    pub fn get(&self, index: usize) -> Option<u64> {
        let mut id = self.open.unwrap_or(self.head);
        for _ in 0..index {
            id = self.arena[id].parent?;
        }
        self.arena[id].changes.first().map(|c| c.pos)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn change(pos: u64) -> Change {
        Change {
            pos,
            old: Span::empty(),
            new: Span::empty(),
        }
    }

    #[test]
    fn snapshot_without_changes_is_noop() {
        let mut history = History::new(10);
        history.snapshot(20);
        assert_eq!(0, history.head());
        assert_eq!(10, history.time(0));
    }

    #[test]
    fn record_opens_one_revision() {
        let mut history = History::new(10);
        history.record(change(0));
        history.record(change(5));
        assert!(history.has_open());
        assert_eq!(0, history.head());

        history.snapshot(20);
        assert!(!history.has_open());
        assert_eq!(1, history.head());
        assert_eq!(2, history.changes(1).len());
        assert_eq!(20, history.time(1));
    }

    #[test]
    fn latest_child_wins() {
        let mut history = History::new(0);
        history.record(change(0));
        history.snapshot(1);
        let first = history.head();

        history.set_head(0);
        history.record(change(1));
        history.snapshot(2);
        let second = history.head();

        assert_ne!(first, second);
        assert_eq!(Some(second), history.latest_child(0));
    }

    #[test]
    fn nearest_breaks_ties_toward_earlier() {
        let mut history = History::new(10);
        history.record(change(0));
        history.snapshot(20);
        history.record(change(0));
        history.snapshot(30);

        assert_eq!(0, history.nearest(0));
        assert_eq!(2, history.nearest(100));
        // 15 is equally close to 10 and 20, the earlier revision wins
        assert_eq!(0, history.nearest(15));
    }

    #[test]
    fn path_goes_through_common_ancestor() {
        let mut history = History::new(0);
        history.record(change(0));
        history.snapshot(1);
        let left = history.head();

        history.set_head(0);
        history.record(change(1));
        history.snapshot(2);
        let right = history.head();

        let (up, down) = history.path(left, right);
        assert_eq!(vec![left], up);
        assert_eq!(vec![right], down);

        let (up, down) = history.path(left, left);
        assert!(up.is_empty());
        assert!(down.is_empty());
    }

    #[test]
    fn modified_tracks_saved_revision() {
        let mut history = History::new(0);
        assert!(!history.modified());

        history.record(change(0));
        assert!(history.modified());

        history.snapshot(1);
        assert!(history.modified());

        history.set_saved(history.head());
        assert!(!history.modified());
    }
}
