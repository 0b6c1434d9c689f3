//! Persistence Destinations
//!
//! The configured set of local directories extents are spread across. Each
//! destination is a named root plus a concurrency budget; records on disk
//! reference destinations by id, never by position, so the configured list
//! can be reordered or extended without breaking resolution.

use crate::config::DestinationConfig;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One configured destination.
#[derive(Debug, Clone)]
pub struct Destination {
    pub id: String,
    pub root_path: PathBuf,
    pub max_concurrency: u32,
}

/// Lookup and round-robin selection over the configured destinations.
pub struct DestinationSet {
    by_id: HashMap<String, Destination>,
    order: Vec<String>,
    cursor: AtomicUsize,
}

impl DestinationSet {
    pub fn new(configs: &[DestinationConfig]) -> Result<Self> {
        if configs.is_empty() {
            return Err(Error::Config(
                "at least one persistence destination is required".to_string(),
            ));
        }

        let mut by_id = HashMap::with_capacity(configs.len());
        let mut order = Vec::with_capacity(configs.len());

        for config in configs {
            if config.max_concurrency == 0 {
                return Err(Error::Config(format!(
                    "destination {} has a zero concurrency budget",
                    config.id
                )));
            }
            let previous = by_id.insert(
                config.id.clone(),
                Destination {
                    id: config.id.clone(),
                    root_path: config.root_path.clone(),
                    max_concurrency: config.max_concurrency,
                },
            );
            if previous.is_some() {
                return Err(Error::Config(format!(
                    "duplicate destination id: {}",
                    config.id
                )));
            }
            order.push(config.id.clone());
        }

        Ok(Self {
            by_id,
            order,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn get(&self, id: &str) -> Result<&Destination> {
        self.by_id
            .get(id)
            .ok_or_else(|| Error::UnknownDestination(id.to_string()))
    }

    /// Next destination in round-robin order.
    pub fn next(&self) -> &Destination {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.order.len();
        &self.by_id[&self.order[i]]
    }

    /// Absolute path of an extent file from its catalog placement.
    pub fn resolve(&self, destination_id: &str, relative_path: &str) -> Result<PathBuf> {
        Ok(self.get(destination_id)?.root_path.join(relative_path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Destination> {
        self.order.iter().map(|id| &self.by_id[id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str) -> DestinationConfig {
        DestinationConfig {
            id: id.to_string(),
            root_path: PathBuf::from(format!("/data/{id}")),
            max_concurrency: 2,
        }
    }

    #[test]
    fn empty_configuration_is_rejected() {
        assert!(matches!(DestinationSet::new(&[]), Err(Error::Config(_))));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = DestinationSet::new(&[config("a"), config("a")]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn round_robin_cycles_in_configured_order() {
        let set = DestinationSet::new(&[config("a"), config("b"), config("c")]).unwrap();

        let picked: Vec<_> = (0..6).map(|_| set.next().id.clone()).collect();
        assert_eq!(picked, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn resolve_joins_root_and_relative_path() {
        let set = DestinationSet::new(&[config("a")]).unwrap();

        let path = set.resolve("a", "some-extent-id").unwrap();
        assert_eq!(path, PathBuf::from("/data/a/some-extent-id"));

        assert!(matches!(
            set.resolve("missing", "x"),
            Err(Error::UnknownDestination(_))
        ));
    }
}
