// Breadth-first crawl frontier

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// A normalized URL paired with its distance from the seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTarget {
    pub url: String,
    pub depth: usize,
}

impl CrawlTarget {
    pub fn new(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<CrawlTarget>,
    visited: HashSet<String>,
    max_pages: usize,
    max_depth: usize,
}

impl Frontier {
    /// Start a frontier at `seed` (depth 0).
    pub fn new(seed: impl Into<String>, max_pages: usize, max_depth: usize) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(CrawlTarget::new(seed, 0));
        Self {
            queue,
            visited: HashSet::new(),
            max_pages,
            max_depth,
        }
    }

    /// Rebuild a frontier from a checkpoint: `visited` URLs are never
    /// yielded again and `pending` replaces the initial queue.
    pub fn restore(
        pending: Vec<CrawlTarget>,
        visited: impl IntoIterator<Item = String>,
        max_pages: usize,
        max_depth: usize,
    ) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            visited: visited.into_iter().collect(),
            max_pages,
            max_depth,
        };
        for target in pending {
            frontier.enqueue(target.url, target.depth);
        }
        frontier
    }

    /// Pop the next unvisited target within the depth budget, or `None` once
    /// the queue is empty or the page budget is spent.
    pub fn next(&mut self) -> Option<CrawlTarget> {
        while self.visited.len() < self.max_pages {
            let target = self.queue.pop_front()?;
            if self.visited.contains(&target.url) || target.depth > self.max_depth {
                continue;
            }
            self.visited.insert(target.url.clone());
            return Some(target);
        }
        None
    }

    /// Queue `url` unless it was already visited or is already waiting.
    /// Returns whether the URL was added.
    pub fn enqueue(&mut self, url: impl Into<String>, depth: usize) -> bool {
        let url = url.into();
        if self.visited.contains(&url) || self.queue.iter().any(|t| t.url == url) {
            return false;
        }
        self.queue.push_back(CrawlTarget::new(url, depth));
        true
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Snapshot of the waiting queue, in dequeue order.
    pub fn pending(&self) -> Vec<CrawlTarget> {
        self.queue.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_depth_zero() {
        let mut frontier = Frontier::new("https://example.com/", 10, 2);
        let seed = frontier.next().unwrap();
        assert_eq!(seed, CrawlTarget::new("https://example.com/", 0));
        assert!(frontier.next().is_none());
    }

    #[test]
    fn test_enqueue_deduplicates_visited_and_queued() {
        let mut frontier = Frontier::new("https://example.com/", 10, 2);
        frontier.next();
        assert!(!frontier.enqueue("https://example.com/", 1));
        assert!(frontier.enqueue("https://example.com/a", 1));
        assert!(!frontier.enqueue("https://example.com/a", 1));
        assert_eq!(frontier.queued_count(), 1);
    }

    #[test]
    fn test_breadth_first_order() {
        let mut frontier = Frontier::new("s", 100, 5);
        let mut order = Vec::new();
        while let Some(target) = frontier.next() {
            if target.depth < 3 {
                for i in 0..2 {
                    frontier.enqueue(format!("{}-{}", target.url, i), target.depth + 1);
                }
            }
            order.push(target);
        }
        assert_eq!(order.len(), 1 + 2 + 4 + 8);
        assert!(order.windows(2).all(|w| w[0].depth <= w[1].depth));
    }

    #[test]
    fn test_never_yields_same_url_twice() {
        let mut frontier = Frontier::new("s", 100, 5);
        let mut seen = HashSet::new();
        while let Some(target) = frontier.next() {
            assert!(seen.insert(target.url.clone()));
            if target.depth < 3 {
                frontier.enqueue("s", target.depth + 1);
                frontier.enqueue("shared", target.depth + 1);
            }
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_page_budget_stops_traversal() {
        let mut frontier = Frontier::new("s", 1, 3);
        frontier.next().unwrap();
        for i in 0..10 {
            frontier.enqueue(format!("p{}", i), 1);
        }
        assert!(frontier.next().is_none());
        assert_eq!(frontier.queued_count(), 10);
    }

    #[test]
    fn test_targets_beyond_max_depth_are_discarded() {
        let mut frontier = Frontier::new("s", 10, 1);
        frontier.next().unwrap();
        frontier.enqueue("deep", 2);
        frontier.enqueue("ok", 1);
        assert_eq!(frontier.next().unwrap().url, "ok");
        assert!(frontier.next().is_none());
    }

    #[test]
    fn test_restore_skips_visited() {
        let mut frontier = Frontier::restore(
            vec![CrawlTarget::new("a", 0), CrawlTarget::new("b", 1)],
            vec!["a".to_string()],
            10,
            3,
        );
        assert!(frontier.is_visited("a"));
        assert_eq!(frontier.next().unwrap().url, "b");
        assert!(frontier.next().is_none());
        assert_eq!(frontier.visited_count(), 2);
    }
}
