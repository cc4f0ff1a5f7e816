use std::cmp::Ordering;

use crate::models::{Feed, HelpQ, Location, Tag, User};
use crate::store::ObjectGraph;

/// A kind of entity that can be loaded from the store
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn collect(graph: &ObjectGraph) -> Vec<Self>;
}

impl Entity for Feed {
    const KIND: &'static str = "Feed";

    fn collect(graph: &ObjectGraph) -> Vec<Self> {
        graph.feeds().cloned().collect()
    }
}

impl Entity for Location {
    const KIND: &'static str = "Location";

    fn collect(graph: &ObjectGraph) -> Vec<Self> {
        graph.locations().cloned().collect()
    }
}

impl Entity for Tag {
    const KIND: &'static str = "Tag";

    fn collect(graph: &ObjectGraph) -> Vec<Self> {
        graph.tags().cloned().collect()
    }
}

impl Entity for HelpQ {
    const KIND: &'static str = "HelpQ";

    fn collect(graph: &ObjectGraph) -> Vec<Self> {
        graph.help_q().cloned().collect()
    }
}

impl Entity for User {
    const KIND: &'static str = "User";

    fn collect(graph: &ObjectGraph) -> Vec<Self> {
        graph.user().cloned().into_iter().collect()
    }
}

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Filter, sort order and limit applied by `EntityStore::load_with`
pub struct FetchRequest<T> {
    predicate: Option<Predicate<T>>,
    sort: Option<Comparator<T>>,
    limit: Option<usize>,
}

impl<T> Default for FetchRequest<T> {
    fn default() -> Self {
        FetchRequest { predicate: None, sort: None, limit: None }
    }
}

impl<T> FetchRequest<T> {
    pub fn filter<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn sort_by<F>(&mut self, compare: F) -> &mut Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some(Box::new(compare));
        self
    }

    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn apply(&self, mut items: Vec<T>) -> Vec<T> {
        if let Some(predicate) = &self.predicate {
            items.retain(|item| predicate(item));
        }
        if let Some(compare) = &self.sort {
            items.sort_by(|a, b| compare(a, b));
        }
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        items
    }
}
