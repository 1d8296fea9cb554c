//! The in-memory item list and every way it can change.
//!
//! Ids are unique after every operation. Mutable fields follow a recency
//! rule when a fetched copy meets an item already in the list:
//!
//! 1. if both copies carry a server `version`, the higher one wins
//!    (a tie goes to the fetched copy);
//! 2. otherwise the fetched copy wins unless a realtime event touched the
//!    item after the fetch was dispatched.
//!
//! The list keeps a logical clock for rule 2: [`FeedList::begin_fetch`]
//! returns the dispatch tick and every realtime mutation stamps the item.

use std::collections::{HashMap, HashSet};
use std::mem;

use tracing::debug;

use crate::domain::{FeedItem, ItemId, ReactionUpdate};
use crate::realtime::RealtimeEvent;

#[derive(Debug, Default)]
pub struct FeedList {
    items: Vec<FeedItem>,
    clock: u64,
    /// Last realtime mutation per item.
    touched: HashMap<ItemId, u64>,
    /// When a realtime `ItemCreated` inserted the item.
    arrived: HashMap<ItemId, u64>,
}

impl FeedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&FeedItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.position(id).is_some()
    }

    /// Up to `n` items from the top of the list.
    pub fn head(&self, n: usize) -> Vec<FeedItem> {
        self.items.iter().take(n).cloned().collect()
    }

    fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == *id)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Record a fetch dispatch; pass the result to the matching merge call.
    pub fn begin_fetch(&mut self) -> u64 {
        self.tick()
    }

    fn fetched_wins(&self, existing: &FeedItem, fetched: &FeedItem, dispatched_at: u64) -> bool {
        if let (Some(current), Some(incoming)) = (existing.version, fetched.version) {
            return incoming >= current;
        }
        self.touched
            .get(&existing.id)
            .map_or(true, |&touched_at| touched_at < dispatched_at)
    }

    /// Merge a fetched item into its listed copy, or hand it back if the id is new.
    fn merge_existing(&mut self, fetched: FeedItem, dispatched_at: u64) -> Option<FeedItem> {
        let Some(pos) = self.position(&fetched.id) else {
            return Some(fetched);
        };
        if self.fetched_wins(&self.items[pos], &fetched, dispatched_at) {
            self.items[pos].absorb(fetched);
        } else {
            debug!("Keeping realtime state for item {}", fetched.id);
        }
        None
    }

    /// Append a fetched page after the current items.
    ///
    /// Items already present are merged in place. Returns how many were appended.
    pub fn append_page(&mut self, fetched: Vec<FeedItem>, dispatched_at: u64) -> usize {
        let mut appended = 0;
        for item in fetched {
            if let Some(new_item) = self.merge_existing(item, dispatched_at) {
                self.items.push(new_item);
                appended += 1;
            }
        }
        appended
    }

    /// Replace the list with a freshly fetched first page.
    ///
    /// Items that arrived over realtime after the dispatch and are missing from
    /// the page stay on top; fields touched by realtime after the dispatch
    /// survive per the recency rule.
    pub fn replace_with_page(&mut self, fetched: Vec<FeedItem>, dispatched_at: u64) {
        let previous = mem::take(&mut self.items);
        let fetched_ids: HashSet<ItemId> = fetched.iter().map(|item| item.id.clone()).collect();

        let mut late_arrivals = Vec::new();
        let mut carried = HashMap::new();
        for item in previous {
            let arrived_late = self
                .arrived
                .get(&item.id)
                .is_some_and(|&at| at > dispatched_at);
            if arrived_late && !fetched_ids.contains(&item.id) {
                late_arrivals.push(item);
            } else if fetched_ids.contains(&item.id) {
                carried.insert(item.id.clone(), item);
            }
        }

        self.items = late_arrivals;
        for item in fetched {
            if self.contains(&item.id) {
                continue;
            }
            match carried.remove(&item.id) {
                Some(mut existing) => {
                    if self.fetched_wins(&existing, &item, dispatched_at) {
                        existing.absorb(item);
                    }
                    self.items.push(existing);
                }
                None => self.items.push(item),
            }
        }

        self.forget_missing();
    }

    /// Load items restored from the offline cache, dropping duplicate ids.
    pub fn restore(&mut self, cached: Vec<FeedItem>) {
        self.items.clear();
        self.touched.clear();
        self.arrived.clear();
        for item in cached {
            if !self.contains(&item.id) {
                self.items.push(item);
            }
        }
    }

    fn forget_missing(&mut self) {
        let present: HashSet<&ItemId> = self.items.iter().map(|item| &item.id).collect();
        self.touched.retain(|id, _| present.contains(id));
        self.arrived.retain(|id, _| present.contains(id));
    }

    /// Apply a realtime event. Returns whether the list changed.
    pub fn apply(&mut self, event: RealtimeEvent) -> bool {
        match event {
            RealtimeEvent::ItemCreated(item) => self.insert_live(item),
            RealtimeEvent::ReactionChanged { item_id, update } => {
                self.update_reaction(&item_id, &update)
            }
            RealtimeEvent::CommentCountChanged { item_id, count } => {
                self.update_comment_count(&item_id, count)
            }
        }
    }

    /// Prepend a pushed item unless its id is already listed.
    pub fn insert_live(&mut self, item: FeedItem) -> bool {
        if self.contains(&item.id) {
            debug!("Ignoring redelivered item {}", item.id);
            return false;
        }
        let at = self.tick();
        self.arrived.insert(item.id.clone(), at);
        self.touched.insert(item.id.clone(), at);
        self.items.insert(0, item);
        true
    }

    pub fn update_reaction(&mut self, id: &ItemId, update: &ReactionUpdate) -> bool {
        let Some(pos) = self.position(id) else {
            debug!("Reaction for item {} outside the loaded window", id);
            return false;
        };
        if let (Some(current), Some(incoming)) = (self.items[pos].version, update.version) {
            if incoming < current {
                debug!("Ignoring stale reaction v{} for item {} (at v{})", incoming, id, current);
                return false;
            }
        }
        self.items[pos].apply_reaction(update);
        let at = self.tick();
        self.touched.insert(id.clone(), at);
        true
    }

    pub fn update_comment_count(&mut self, id: &ItemId, count: i64) -> bool {
        let Some(pos) = self.position(id) else {
            debug!("Comment count for item {} outside the loaded window", id);
            return false;
        };
        self.items[pos].comment_count = count;
        let at = self.tick();
        self.touched.insert(id.clone(), at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn items(ids: std::ops::Range<i64>) -> Vec<FeedItem> {
        ids.map(FeedItem::new).collect()
    }

    fn ids(list: &FeedList) -> Vec<i64> {
        list.items()
            .iter()
            .map(|item| match item.id {
                ItemId::Int(n) => n,
                ItemId::Text(_) => panic!("unexpected text id"),
            })
            .collect()
    }

    fn likes(n: i64) -> ReactionUpdate {
        ReactionUpdate {
            counts: BTreeMap::from([("like".to_string(), n)]),
            ..Default::default()
        }
    }

    fn with_likes(id: i64, n: i64) -> FeedItem {
        let mut item = FeedItem::new(id);
        item.apply_reaction(&likes(n));
        item
    }

    #[test]
    fn test_repeated_creates_keep_one_copy() {
        let mut list = FeedList::new();
        assert!(list.insert_live(FeedItem::new(1)));
        assert!(list.insert_live(FeedItem::new(2)));
        assert!(!list.insert_live(FeedItem::new(1)));
        assert!(!list.apply(RealtimeEvent::ItemCreated(FeedItem::new(2))));

        assert_eq!(ids(&list), vec![2, 1]);
    }

    #[test]
    fn test_append_page_dedupes() {
        let mut list = FeedList::new();
        let t = list.begin_fetch();
        list.replace_with_page(items(1..11), t);

        let t = list.begin_fetch();
        let mut page = items(9..16);
        page.push(FeedItem::new(15));
        assert_eq!(list.append_page(page, t), 5);

        assert_eq!(ids(&list), (1..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_reaction_updates_in_place() {
        let mut list = FeedList::new();
        let t = list.begin_fetch();
        list.replace_with_page(items(1..4), t);

        assert!(list.update_reaction(&ItemId::Int(2), &likes(3)));
        assert_eq!(ids(&list), vec![1, 2, 3]);
        assert_eq!(list.get(&ItemId::Int(2)).unwrap().reaction_count, 3);
    }

    #[test]
    fn test_events_for_unloaded_items_are_ignored() {
        let mut list = FeedList::new();
        assert!(!list.update_reaction(&ItemId::Int(9), &likes(3)));
        assert!(!list.update_comment_count(&ItemId::Int(9), 2));
        assert!(list.is_empty());
    }

    #[test]
    fn test_reaction_merge_is_idempotent() {
        let mut list = FeedList::new();
        let t = list.begin_fetch();
        list.replace_with_page(items(1..3), t);

        list.update_reaction(&ItemId::Int(1), &likes(3));
        let once = list.get(&ItemId::Int(1)).cloned();
        list.update_reaction(&ItemId::Int(1), &likes(3));
        assert_eq!(list.get(&ItemId::Int(1)).cloned(), once);
    }

    #[test]
    fn test_realtime_after_dispatch_beats_stale_fetch() {
        let mut list = FeedList::new();
        let t = list.begin_fetch();
        list.replace_with_page(vec![with_likes(5, 1)], t);

        // Fetch goes out, then the broadcast lands, then the stale response.
        let dispatched = list.begin_fetch();
        list.update_reaction(&ItemId::Int(5), &likes(3));
        list.append_page(vec![with_likes(5, 2)], dispatched);

        assert_eq!(list.get(&ItemId::Int(5)).unwrap().reaction_count, 3);
    }

    #[test]
    fn test_fetch_dispatched_after_realtime_wins() {
        let mut list = FeedList::new();
        let t = list.begin_fetch();
        list.replace_with_page(vec![with_likes(5, 1)], t);

        list.update_reaction(&ItemId::Int(5), &likes(3));
        let dispatched = list.begin_fetch();
        list.append_page(vec![with_likes(5, 4)], dispatched);

        assert_eq!(list.get(&ItemId::Int(5)).unwrap().reaction_count, 4);
    }

    #[test]
    fn test_server_versions_decide_when_present() {
        let mut list = FeedList::new();
        let t = list.begin_fetch();
        let mut v3 = with_likes(5, 3);
        v3.version = Some(3);
        list.replace_with_page(vec![v3], t);

        let dispatched = list.begin_fetch();
        let mut v2 = with_likes(5, 2);
        v2.version = Some(2);
        list.append_page(vec![v2], dispatched);
        assert_eq!(list.get(&ItemId::Int(5)).unwrap().reaction_count, 3);

        // A newer version wins even though realtime touched the item after dispatch
        let dispatched = list.begin_fetch();
        list.update_reaction(&ItemId::Int(5), &likes(6));
        let mut v4 = with_likes(5, 8);
        v4.version = Some(4);
        list.append_page(vec![v4], dispatched);
        assert_eq!(list.get(&ItemId::Int(5)).unwrap().reaction_count, 8);
    }

    #[test]
    fn test_stale_versioned_reaction_is_ignored() {
        let mut list = FeedList::new();
        let t = list.begin_fetch();
        let mut item = with_likes(1, 5);
        item.version = Some(10);
        list.replace_with_page(vec![item], t);

        let stale = ReactionUpdate {
            version: Some(9),
            ..likes(1)
        };
        assert!(!list.update_reaction(&ItemId::Int(1), &stale));
        assert_eq!(list.get(&ItemId::Int(1)).unwrap().reaction_count, 5);
    }

    #[test]
    fn test_replace_keeps_late_realtime_arrivals() {
        let mut list = FeedList::new();
        let t = list.begin_fetch();
        list.replace_with_page(items(1..4), t);
        list.insert_live(FeedItem::new(50));

        let dispatched = list.begin_fetch();
        list.insert_live(FeedItem::new(60));
        list.replace_with_page(items(2..5), dispatched);

        // 50 arrived before the refresh went out and the page dropped it
        assert_eq!(ids(&list), vec![60, 2, 3, 4]);
    }

    #[test]
    fn test_replace_dedupes_late_arrival_present_in_page() {
        let mut list = FeedList::new();
        let dispatched = list.begin_fetch();
        list.insert_live(FeedItem::new(3));
        list.replace_with_page(items(1..5), dispatched);
        assert_eq!(ids(&list), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_restore_drops_duplicates() {
        let mut list = FeedList::new();
        list.restore(vec![FeedItem::new(1), FeedItem::new(2), FeedItem::new(1)]);
        assert_eq!(ids(&list), vec![1, 2]);
    }

    #[test]
    fn test_comment_count_change() {
        let mut list = FeedList::new();
        let t = list.begin_fetch();
        list.replace_with_page(items(1..3), t);
        assert!(list.apply(RealtimeEvent::CommentCountChanged {
            item_id: ItemId::Int(2),
            count: 7,
        }));
        assert_eq!(list.get(&ItemId::Int(2)).unwrap().comment_count, 7);
    }
}
