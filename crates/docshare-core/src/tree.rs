// ABOUTME: Builds the protocol-filtered module forest and per-module counts for a share.
// ABOUTME: Orphans hang under a synthetic root per protocol; branches without definitions are pruned.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collab::DefinitionCatalog;
use crate::definition::{ApiDefinition, ApiModule};
use crate::error::ShareError;
use crate::model::ShareScope;
use crate::scope::ScopeMatcher;

/// Prefix of synthetic per-protocol root ids.
pub const SYNTHETIC_ROOT_PREFIX: &str = "root:";

/// Display name of synthetic roots.
pub const SYNTHETIC_ROOT_NAME: &str = "unplanned";

/// Id of the synthetic root collecting orphans of `protocol`.
pub fn synthetic_root_id(protocol: &str) -> String {
    format!("{}{}", SYNTHETIC_ROOT_PREFIX, protocol)
}

/// A node of the share's module forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNode {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub protocol: String,
    pub sort_order: i64,
    /// Definitions in this module and all of its descendants.
    pub count: u64,
    pub children: Vec<ModuleNode>,
}

impl ModuleNode {
    /// Visit this node and its descendants depth-first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ModuleNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Inputs shared by tree, count, and export selection.
#[derive(Debug, Clone)]
pub struct TreeQuery {
    pub project_id: String,
    pub org_id: String,
    pub protocols: BTreeSet<String>,
    pub scope: ShareScope,
}

/// The result of one filtered traversal: the pruned forest and the
/// definitions it covers, in tree order.
#[derive(Debug, Default)]
pub struct ShareForest {
    pub roots: Vec<ModuleNode>,
    pub definitions: Vec<ApiDefinition>,
}

impl ShareForest {
    pub fn counts(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for root in &self.roots {
            root.walk(&mut |node| {
                counts.insert(node.id.clone(), node.count);
            });
        }
        counts
    }
}

/// Builds module forests over the definition catalog.
#[derive(Clone)]
pub struct ModuleTreeBuilder {
    catalog: Arc<dyn DefinitionCatalog>,
}

impl ModuleTreeBuilder {
    pub fn new(catalog: Arc<dyn DefinitionCatalog>) -> Self {
        Self { catalog }
    }

    pub fn build_tree(&self, query: &TreeQuery) -> Result<Vec<ModuleNode>, ShareError> {
        Ok(self.build_forest(query)?.roots)
    }

    /// Definition counts keyed by every module id present in `build_tree`.
    pub fn build_count(&self, query: &TreeQuery) -> Result<BTreeMap<String, u64>, ShareError> {
        Ok(self.build_forest(query)?.counts())
    }

    /// Definitions visible through the share, ordered as the tree shows them.
    pub fn select_definitions(&self, query: &TreeQuery) -> Result<Vec<ApiDefinition>, ShareError> {
        Ok(self.build_forest(query)?.definitions)
    }

    pub fn build_forest(&self, query: &TreeQuery) -> Result<ShareForest, ShareError> {
        if query.protocols.is_empty() {
            return Ok(ShareForest::default());
        }

        let modules = self.catalog.list_modules(&query.project_id)?;
        let matcher = ScopeMatcher::new(&query.scope, &modules);
        let definitions: Vec<ApiDefinition> = self
            .catalog
            .list_definitions(&query.project_id, &query.protocols)?
            .into_iter()
            .filter(|d| query.protocols.contains(&d.protocol) && matcher.matches(d))
            .collect();

        let allowed: Vec<&ApiModule> = modules
            .iter()
            .filter(|m| query.protocols.contains(&m.protocol))
            .collect();

        let forest = assemble(&allowed, definitions);
        tracing::debug!(
            project_id = %query.project_id,
            roots = forest.roots.len(),
            definitions = forest.definitions.len(),
            "built share module forest"
        );
        Ok(forest)
    }
}

struct Draft {
    id: String,
    name: String,
    parent_id: Option<String>,
    protocol: String,
    sort_order: i64,
    children: Vec<String>,
    definitions: Vec<ApiDefinition>,
}

fn assemble(modules: &[&ApiModule], definitions: Vec<ApiDefinition>) -> ShareForest {
    let known: HashSet<&str> = modules.iter().map(|m| m.id.as_str()).collect();

    let mut parents: HashMap<String, Option<String>> = modules
        .iter()
        .map(|m| {
            let parent = match m.parent_id.as_deref() {
                None => None,
                Some(p) if known.contains(p) && p != m.id => Some(p.to_string()),
                Some(_) => Some(synthetic_root_id(&m.protocol)),
            };
            (m.id.clone(), parent)
        })
        .collect();
    let protocols: HashMap<&str, &str> = modules
        .iter()
        .map(|m| (m.id.as_str(), m.protocol.as_str()))
        .collect();
    break_cycles(&mut parents, &protocols);

    let mut drafts: HashMap<String, Draft> = modules
        .iter()
        .map(|m| {
            (
                m.id.clone(),
                Draft {
                    id: m.id.clone(),
                    name: m.name.clone(),
                    parent_id: parents.get(&m.id).cloned().flatten(),
                    protocol: m.protocol.clone(),
                    sort_order: m.sort_order,
                    children: Vec::new(),
                    definitions: Vec::new(),
                },
            )
        })
        .collect();

    for definition in definitions {
        let home = match definition.module_id.as_deref() {
            Some(id) if drafts.contains_key(id) => id.to_string(),
            _ => synthetic_root_id(&definition.protocol),
        };
        synthetic_entry(&mut drafts, &home, &definition.protocol)
            .definitions
            .push(definition);
    }

    let links: Vec<(String, String, String)> = drafts
        .values()
        .filter_map(|d| {
            d.parent_id
                .clone()
                .map(|parent| (parent, d.id.clone(), d.protocol.clone()))
        })
        .collect();
    for (parent, child, protocol) in links {
        synthetic_entry(&mut drafts, &parent, &protocol)
            .children
            .push(child);
    }
    let roots: Vec<String> = drafts
        .values()
        .filter(|d| d.parent_id.is_none())
        .map(|d| d.id.clone())
        .collect();

    let mut owned: HashMap<String, Vec<ApiDefinition>> = HashMap::new();
    let mut nodes: Vec<ModuleNode> = roots
        .iter()
        .filter_map(|id| materialize(id, &mut drafts, &mut owned))
        .collect();
    nodes.sort_by(sibling_order);

    let mut ordered = Vec::new();
    for root in &nodes {
        root.walk(&mut |node| {
            if let Some(defs) = owned.remove(&node.id) {
                ordered.extend(defs);
            }
        });
    }
    ShareForest {
        roots: nodes,
        definitions: ordered,
    }
}

/// Get a draft, creating the synthetic root for `protocol` if `id` names one.
fn synthetic_entry<'a>(
    drafts: &'a mut HashMap<String, Draft>,
    id: &str,
    protocol: &str,
) -> &'a mut Draft {
    drafts.entry(id.to_string()).or_insert_with(|| Draft {
        id: id.to_string(),
        name: SYNTHETIC_ROOT_NAME.to_string(),
        parent_id: None,
        protocol: id
            .strip_prefix(SYNTHETIC_ROOT_PREFIX)
            .unwrap_or(protocol)
            .to_string(),
        sort_order: i64::MIN,
        children: Vec::new(),
        definitions: Vec::new(),
    })
}

/// Turn parent cycles into orphans: the member whose parent link closes a
/// cycle is moved under its protocol's synthetic root.
fn break_cycles(parents: &mut HashMap<String, Option<String>>, protocols: &HashMap<&str, &str>) {
    let mut starts: Vec<String> = parents.keys().cloned().collect();
    starts.sort();
    let mut done: HashSet<String> = HashSet::new();

    for start in starts {
        let mut path: Vec<String> = Vec::new();
        let mut on_path: HashSet<String> = HashSet::new();
        let mut current = start;
        loop {
            if done.contains(&current) {
                break;
            }
            if on_path.contains(&current) {
                if let Some(last) = path.last() {
                    let protocol = protocols.get(last.as_str()).copied().unwrap_or_default();
                    tracing::warn!(module_id = %last, "module parent cycle detected, treating as orphan");
                    parents.insert(last.clone(), Some(synthetic_root_id(protocol)));
                }
                break;
            }
            on_path.insert(current.clone());
            path.push(current.clone());
            match parents.get(&current) {
                Some(Some(parent)) if parents.contains_key(parent) => current = parent.clone(),
                _ => break,
            }
        }
        done.extend(path);
    }
}

/// Build the pruned subtree for `id`. Returns None when it holds no definitions.
fn materialize(
    id: &str,
    drafts: &mut HashMap<String, Draft>,
    owned: &mut HashMap<String, Vec<ApiDefinition>>,
) -> Option<ModuleNode> {
    let mut draft = drafts.remove(id)?;
    let mut children: Vec<ModuleNode> = std::mem::take(&mut draft.children)
        .iter()
        .filter_map(|child| materialize(child, drafts, owned))
        .collect();
    children.sort_by(sibling_order);

    let own = draft.definitions.len() as u64;
    let count = own + children.iter().map(|c| c.count).sum::<u64>();
    if count == 0 {
        return None;
    }

    draft.definitions.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    if !draft.definitions.is_empty() {
        owned.insert(draft.id.clone(), draft.definitions);
    }

    Some(ModuleNode {
        id: draft.id,
        name: draft.name,
        parent_id: draft.parent_id,
        protocol: draft.protocol,
        sort_order: draft.sort_order,
        count,
        children,
    })
}

fn sibling_order(a: &ModuleNode, b: &ModuleNode) -> Ordering {
    a.sort_order
        .cmp(&b.sort_order)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryCatalog;

    fn http() -> BTreeSet<String> {
        ["HTTP".to_string()].into_iter().collect()
    }

    fn query(protocols: BTreeSet<String>, scope: ShareScope) -> TreeQuery {
        TreeQuery {
            project_id: "project-1".to_string(),
            org_id: "org-1".to_string(),
            protocols,
            scope,
        }
    }

    fn builder(catalog: InMemoryCatalog) -> ModuleTreeBuilder {
        ModuleTreeBuilder::new(Arc::new(catalog))
    }

    fn ids(nodes: &[ModuleNode]) -> Vec<String> {
        let mut out = Vec::new();
        for node in nodes {
            node.walk(&mut |n| out.push(n.id.clone()));
        }
        out
    }

    fn mixed_catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .module("a", None, "HTTP", 2)
            .module("a1", Some("a"), "HTTP", 0)
            .module("b", None, "HTTP", 1)
            .module("t", None, "TCP", 0)
            .module("t1", Some("t"), "HTTP", 0)
            .module("empty", None, "HTTP", 0)
            .definition("d1", Some("a1"), "HTTP")
            .definition("d2", Some("a"), "HTTP")
            .definition("d3", Some("b"), "HTTP")
            .definition("d4", Some("t"), "TCP")
            .definition("d5", Some("t1"), "HTTP")
            .definition("d6", None, "HTTP")
    }

    #[test]
    fn empty_allow_list_yields_empty_forest() {
        let b = builder(mixed_catalog());
        let q = query(BTreeSet::new(), ShareScope::All);
        assert!(b.build_tree(&q).unwrap().is_empty());
        assert!(b.build_count(&q).unwrap().is_empty());
        assert!(b.select_definitions(&q).unwrap().is_empty());
    }

    #[test]
    fn disallowed_protocols_are_removed_and_orphans_reparented() {
        let b = builder(mixed_catalog());
        let tree = b.build_tree(&query(http(), ShareScope::All)).unwrap();

        // Synthetic root sorts first; it holds the orphaned t1 and the moduleless d6.
        assert_eq!(tree[0].id, "root:HTTP");
        assert_eq!(tree[0].name, SYNTHETIC_ROOT_NAME);
        assert_eq!(tree[0].count, 2);
        assert_eq!(tree[0].children[0].id, "t1");
        assert_eq!(tree[0].children[0].parent_id.as_deref(), Some("root:HTTP"));

        let all = ids(&tree);
        assert!(!all.contains(&"t".to_string()), "TCP module must be removed");
        assert!(!all.contains(&"empty".to_string()), "empty module must be pruned");
        assert_eq!(all, vec!["root:HTTP", "t1", "b", "a", "a1"]);
    }

    #[test]
    fn counts_are_inclusive_and_match_tree_nodes() {
        let b = builder(mixed_catalog());
        for protocols in [
            http(),
            ["TCP".to_string()].into_iter().collect(),
            ["HTTP".to_string(), "TCP".to_string()].into_iter().collect(),
            ["GRPC".to_string()].into_iter().collect(),
        ] {
            let q = query(protocols, ShareScope::All);
            let tree = b.build_tree(&q).unwrap();
            let counts = b.build_count(&q).unwrap();

            let tree_ids: BTreeSet<String> = ids(&tree).into_iter().collect();
            let count_ids: BTreeSet<String> = counts.keys().cloned().collect();
            assert_eq!(tree_ids, count_ids);
            assert!(counts.values().all(|c| *c >= 1));
        }

        let counts = b.build_count(&query(http(), ShareScope::All)).unwrap();
        assert_eq!(counts["a"], 2);
        assert_eq!(counts["a1"], 1);
        assert_eq!(counts["b"], 1);
    }

    #[test]
    fn both_protocols_keep_tcp_parent() {
        let b = builder(mixed_catalog());
        let protocols = ["HTTP".to_string(), "TCP".to_string()].into_iter().collect();
        let counts = b.build_count(&query(protocols, ShareScope::All)).unwrap();
        assert_eq!(counts["t"], 2);
        assert_eq!(counts["t1"], 1);
    }

    #[test]
    fn module_scope_drops_module_with_only_foreign_protocol() {
        let catalog = InMemoryCatalog::new()
            .module("moduleA", None, "HTTP", 0)
            .module("moduleB", None, "HTTP", 1)
            .definition("http-def", Some("moduleA"), "HTTP")
            .definition("tcp-def", Some("moduleB"), "TCP");
        let b = builder(catalog);
        let scope = ShareScope::Modules {
            module_ids: ["moduleA".to_string(), "moduleB".to_string()]
                .into_iter()
                .collect(),
        };
        let q = query(http(), scope);

        let tree = b.build_tree(&q).unwrap();
        assert_eq!(ids(&tree), vec!["moduleA"]);
        let counts = b.build_count(&q).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts["moduleA"], 1);
    }

    #[test]
    fn siblings_sort_by_order_then_name() {
        let mut catalog = InMemoryCatalog::new()
            .module("z", None, "HTTP", 1)
            .module("y", None, "HTTP", 1)
            .module("x", None, "HTTP", 0)
            .definition("d1", Some("z"), "HTTP")
            .definition("d2", Some("y"), "HTTP")
            .definition("d3", Some("x"), "HTTP");
        catalog.modules[0].name = "Alpha".to_string();
        catalog.modules[1].name = "Beta".to_string();

        let tree = builder(catalog)
            .build_tree(&query(http(), ShareScope::All))
            .unwrap();
        assert_eq!(ids(&tree), vec!["x", "z", "y"]);
    }

    #[test]
    fn parent_cycles_do_not_loop() {
        let catalog = InMemoryCatalog::new()
            .module("p", Some("q"), "HTTP", 0)
            .module("q", Some("p"), "HTTP", 0)
            .definition("d1", Some("p"), "HTTP");
        let b = builder(catalog);
        let q = query(http(), ShareScope::All);

        let tree = b.build_tree(&q).unwrap();
        let counts = b.build_count(&q).unwrap();
        let tree_ids: BTreeSet<String> = ids(&tree).into_iter().collect();
        assert_eq!(tree_ids, counts.keys().cloned().collect());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, "root:HTTP");
        assert_eq!(tree[0].count, 1);
    }

    #[test]
    fn selected_definitions_follow_tree_order() {
        let b = builder(mixed_catalog());
        let defs = b.select_definitions(&query(http(), ShareScope::All)).unwrap();
        let order: Vec<&str> = defs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(order, vec!["d6", "d5", "d3", "d2", "d1"]);
    }
}
