use std::collections::{HashMap, HashSet};

use super::NumberingTemplate;

/// Per-batch duplicate name state
///
/// One resolver lives for one handler invocation and is never shared across
/// tasks. Names are claimed in input order; a finalized name is recorded
/// before the next one is processed, so no two outputs of a batch collide.
#[derive(Debug)]
pub struct NameResolver<'t> {
    template: &'t NumberingTemplate,
    existing: HashSet<String>,
    claimed: HashSet<String>,
    occurrences: HashMap<String, u32>,
    counters: HashMap<String, u64>,
}

impl<'t> NameResolver<'t> {
    pub fn new(template: &'t NumberingTemplate, existing: impl IntoIterator<Item = String>) -> Self {
        Self {
            template,
            existing: existing.into_iter().collect(),
            claimed: HashSet::new(),
            occurrences: HashMap::new(),
            counters: HashMap::new(),
        }
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.claimed.contains(name) || self.existing.contains(name)
    }

    /// Record a name discovered after construction (e.g. a write-time
    /// existence re-check)
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.existing.insert(name.into());
    }

    /// Finalize `proposed`, numbering it if it collides
    ///
    /// With `ignore_first`, the first batch occurrence of a name may keep it
    /// even when it is already present in `existing`.
    pub fn claim(&mut self, proposed: &str) -> String {
        let seen = self.occurrences.entry(proposed.to_string()).or_insert(0);
        *seen += 1;
        let first_occurrence = *seen == 1;

        let bare_free = !self.claimed.contains(proposed)
            && (!self.existing.contains(proposed)
                || (self.template.ignore_first() && first_occurrence));
        if bare_free {
            self.claimed.insert(proposed.to_string());
            return proposed.to_string();
        }

        let counter = self.counters.entry(proposed.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = self.template.apply(proposed, *counter);
            if !self.claimed.contains(&candidate) && !self.existing.contains(&candidate) {
                self.claimed.insert(candidate.clone());
                return candidate;
            }
        }
    }
}

/// Resolve a whole batch of proposed names against `existing`
pub fn resolve<T>(
    proposed: impl IntoIterator<Item = (T, String)>,
    template: &NumberingTemplate,
    existing: &HashSet<String>,
) -> Vec<(T, String)> {
    let mut resolver = NameResolver::new(template, existing.iter().cloned());
    proposed
        .into_iter()
        .map(|(item, name)| {
            let finalized = resolver.claim(&name);
            (item, finalized)
        })
        .collect()
}
