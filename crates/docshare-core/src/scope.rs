// ABOUTME: Decides which API definitions fall inside a share's scope.
// ABOUTME: Module scopes expand to every descendant module before matching.

use std::collections::{HashMap, HashSet};

use crate::definition::{ApiDefinition, ApiModule};
use crate::model::{MatchSymbol, ShareScope};

/// A share scope resolved against a project's full module list.
#[derive(Debug)]
pub struct ScopeMatcher<'a> {
    scope: &'a ShareScope,
    modules: HashSet<String>,
}

impl<'a> ScopeMatcher<'a> {
    /// Resolve `scope` against `modules`. The module list must be the
    /// unfiltered one so that descendants of a selected module are found
    /// even when an intermediate module is hidden by protocol filtering.
    pub fn new(scope: &'a ShareScope, modules: &[ApiModule]) -> Self {
        let modules = match scope {
            ShareScope::Modules { module_ids } => {
                let parents: HashMap<&str, Option<&str>> = modules
                    .iter()
                    .map(|m| (m.id.as_str(), m.parent_id.as_deref()))
                    .collect();
                modules
                    .iter()
                    .filter(|m| has_selected_ancestor(&m.id, &parents, |id| module_ids.contains(id)))
                    .map(|m| m.id.clone())
                    .chain(module_ids.iter().cloned())
                    .collect()
            }
            _ => HashSet::new(),
        };
        Self { scope, modules }
    }

    pub fn matches(&self, definition: &ApiDefinition) -> bool {
        match self.scope {
            ShareScope::All => true,
            ShareScope::Modules { .. } => definition
                .module_id
                .as_deref()
                .is_some_and(|id| self.modules.contains(id)),
            ShareScope::Path { symbol, value } => match symbol {
                MatchSymbol::Equals => definition.path == *value,
                MatchSymbol::Contains => definition.path.contains(value.as_str()),
            },
            ShareScope::Tag { value } => definition.tags.iter().any(|t| t == value),
        }
    }
}

/// Walk from `id` towards the root, stopping on cycles.
fn has_selected_ancestor(
    id: &str,
    parents: &HashMap<&str, Option<&str>>,
    selected: impl Fn(&str) -> bool,
) -> bool {
    let mut seen = HashSet::new();
    let mut current = Some(id);
    while let Some(node) = current {
        if selected(node) {
            return true;
        }
        if !seen.insert(node) {
            return false;
        }
        current = parents.get(node).copied().flatten();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryCatalog, sample_definition};

    fn modules() -> Vec<ApiModule> {
        InMemoryCatalog::new()
            .module("a", None, "HTTP", 0)
            .module("a1", Some("a"), "HTTP", 0)
            .module("a1x", Some("a1"), "HTTP", 0)
            .module("b", None, "HTTP", 1)
            .modules
    }

    #[test]
    fn module_scope_includes_descendants() {
        let scope = ShareScope::Modules {
            module_ids: ["a".to_string()].into_iter().collect(),
        };
        let mods = modules();
        let matcher = ScopeMatcher::new(&scope, &mods);

        assert!(matcher.matches(&sample_definition("d1", Some("a1x"), "HTTP")));
        assert!(matcher.matches(&sample_definition("d2", Some("a"), "HTTP")));
        assert!(!matcher.matches(&sample_definition("d3", Some("b"), "HTTP")));
        assert!(!matcher.matches(&sample_definition("d4", None, "HTTP")));
    }

    #[test]
    fn module_scope_survives_parent_cycles() {
        let mut mods = modules();
        mods[0].parent_id = Some("a1x".to_string());
        let scope = ShareScope::Modules {
            module_ids: ["b".to_string()].into_iter().collect(),
        };
        let matcher = ScopeMatcher::new(&scope, &mods);
        assert!(!matcher.matches(&sample_definition("d1", Some("a1"), "HTTP")));
    }

    #[test]
    fn path_and_tag_scopes() {
        let mut def = sample_definition("pets", None, "HTTP");
        def.tags = vec!["public".to_string()];

        let equals = ShareScope::Path {
            symbol: MatchSymbol::Equals,
            value: "/pets".to_string(),
        };
        let contains = ShareScope::Path {
            symbol: MatchSymbol::Contains,
            value: "et".to_string(),
        };
        let tag = ShareScope::Tag {
            value: "public".to_string(),
        };
        let other_tag = ShareScope::Tag {
            value: "internal".to_string(),
        };

        assert!(ScopeMatcher::new(&equals, &[]).matches(&def));
        assert!(ScopeMatcher::new(&contains, &[]).matches(&def));
        assert!(ScopeMatcher::new(&tag, &[]).matches(&def));
        assert!(!ScopeMatcher::new(&other_tag, &[]).matches(&def));
        assert!(ScopeMatcher::new(&ShareScope::All, &[]).matches(&def));
    }
}
