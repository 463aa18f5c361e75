//! # Traversal Plans
//!
//! A plan is a tree with one node per path segment, rooted at a synthetic
//! node standing for the physical column. Wherever a non-terminal segment has
//! been observed as an array of objects (`ArrayJson`), a heterogeneous array
//! (`ArrayDynamic`), or both, the node grows a branch per representation.
//!
//! Nodes live in an arena (`Vec<PlanNode>`); parents own children through
//! branch slots and children point back with a [`NodeId`].
//!
//! ## Budgets
//!
//! Each node carries the `max_dynamic_types` / `max_dynamic_paths` limits the
//! engine applies at that depth. They appear verbatim in the
//! `Array(JSON(...))` annotation, so they must match the engine exactly:
//!
//! | Step                        | types   | paths   |
//! |-----------------------------|---------|---------|
//! | body column root            | 32      | 0       |
//! | promoted column root        | 32      | 1024    |
//! | child through object parent | `t / 2` | `p / 4` |
//! | child through dynamic array | 16      | 256     |
//!
//! The root counts as an object parent for the first segment.

use std::fmt;

use bj_core::{lookup_path, ObservedType, Operator, TypeLookup};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::resolve::{resolve_declared, Resolution};
use crate::sql::quote_ident;

/// Index of a node inside its [`Plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub usize);

/// Engine JSON encoding limits at one depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Budget {
    pub max_dynamic_types: u32,
    pub max_dynamic_paths: u32,
}

impl Budget {
    pub const BODY_ROOT: Budget = Budget::new(32, 0);
    pub const PROMOTED_ROOT: Budget = Budget::new(32, 1024);
    pub const DYNAMIC_RESET: Budget = Budget::new(16, 256);

    pub const fn new(max_dynamic_types: u32, max_dynamic_paths: u32) -> Self {
        Self {
            max_dynamic_types,
            max_dynamic_paths,
        }
    }

    /// Budget of a child entered through an object (or the root).
    pub const fn object_child(self) -> Self {
        Self::new(self.max_dynamic_types / 2, self.max_dynamic_paths / 4)
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max_dynamic_types={}, max_dynamic_paths={}",
            self.max_dynamic_types, self.max_dynamic_paths
        )
    }
}

/// Which physical column a plan targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    pub column: String,
    pub budget: Budget,
}

impl Root {
    pub fn body(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            budget: Budget::BODY_ROOT,
        }
    }

    pub fn promoted(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            budget: Budget::PROMOTED_ROOT,
        }
    }
}

/// Comparison settings of a terminal node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalConfig {
    pub value_type: ObservedType,
    pub element_type: ObservedType,
    pub prefer_array: bool,
    pub op: Operator,
    pub value: Value,
    /// Type declared on the key, if any.
    pub declared: Option<ObservedType>,
    /// A skip index covers this path's String sub-column.
    pub string_indexed: bool,
}

impl TerminalConfig {
    fn from_resolution(r: Resolution, op: Operator, declared: Option<ObservedType>) -> Self {
        Self {
            value_type: r.value_type,
            element_type: r.element_type,
            prefer_array: r.prefer_array,
            op,
            value: r.value,
            declared,
            string_indexed: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanNode {
    pub name: String,
    /// Catalog key of this segment, e.g. `education[].awards`.
    pub lookup_path: String,
    pub terminal: bool,
    pub observed: Vec<ObservedType>,
    pub parent: Option<NodeId>,
    /// Child reached through `Array(JSON)`. The root's only child sits here too.
    pub json: Option<NodeId>,
    /// Child reached through `Array(Dynamic)` filtered to JSON elements.
    pub dynamic: Option<NodeId>,
    pub budget: Budget,
    pub terminal_config: Option<TerminalConfig>,
    alias_name: String,
}

impl PlanNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Identifier that names this node's array element inside lambdas and
    /// `ARRAY JOIN`: the bare column for the root, backtick-quoted otherwise.
    pub fn alias(&self) -> String {
        if self.is_root() {
            self.alias_name.clone()
        } else {
            quote_ident(&self.alias_name)
        }
    }

    pub fn has(&self, t: ObservedType) -> bool {
        self.observed.contains(&t)
    }

    pub fn has_branches(&self) -> bool {
        self.json.is_some() || self.dynamic.is_some()
    }
}

/// A finished traversal plan. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    nodes: Vec<PlanNode>,
    op: Operator,
}

impl Plan {
    pub fn root(&self) -> &PlanNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    pub fn column(&self) -> &str {
        &self.root().alias_name
    }

    /// Node of the first path segment.
    pub fn first(&self) -> Option<NodeId> {
        self.root().json
    }

    pub fn parent(&self, id: NodeId) -> Option<&PlanNode> {
        self.node(id).parent.map(|p| self.node(p))
    }

    /// Expression addressing `id` relative to its parent's element,
    /// e.g. ``body_json.`user.name` `` or `` `body_json.education`.`name` ``.
    pub fn field_path(&self, id: NodeId) -> String {
        let node = self.node(id);
        match self.parent(id) {
            Some(parent) => format!("{}.{}", parent.alias(), quote_ident(&node.name)),
            None => node.alias(),
        }
    }

    pub fn terminals(&self) -> impl Iterator<Item = &PlanNode> {
        self.nodes.iter().filter(|n| n.terminal)
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize, label: &str) -> fmt::Result {
        let node = self.node(id);
        let types: Vec<&str> = node.observed.iter().map(|t| t.as_str()).collect();
        write!(
            f,
            "{:indent$}{}{} [{}] ({}, {})",
            "",
            label,
            node.name,
            types.join(", "),
            node.budget.max_dynamic_types,
            node.budget.max_dynamic_paths,
            indent = depth * 2
        )?;
        if let Some(cfg) = &node.terminal_config {
            write!(
                f,
                " => {} {} {}{}",
                cfg.element_type,
                cfg.op,
                cfg.value,
                if cfg.prefer_array { " (array)" } else { "" }
            )?;
        }
        writeln!(f)?;
        if let Some(c) = node.json {
            self.write_node(f, c, depth + 1, "json: ")?;
        }
        if let Some(c) = node.dynamic {
            self.write_node(f, c, depth + 1, "dynamic: ")?;
        }
        Ok(())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.root();
        writeln!(
            f,
            "{} ({}, {})",
            root.alias_name, root.budget.max_dynamic_types, root.budget.max_dynamic_paths
        )?;
        match self.first() {
            Some(first) => self.write_node(f, first, 1, ""),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds plans against one [`TypeLookup`].
pub struct PlanBuilder<'a, L: TypeLookup + ?Sized> {
    lookup: &'a L,
    declared: Option<ObservedType>,
}

impl<'a, L: TypeLookup + ?Sized> PlanBuilder<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            declared: None,
        }
    }

    pub fn declared(mut self, declared: Option<ObservedType>) -> Self {
        self.declared = declared;
        self
    }

    pub fn build(&self, parts: &[String], op: Operator, value: &Value, root: &Root) -> Result<Plan> {
        if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
            return Err(Error::EmptyPath);
        }

        let mut state = BuildState {
            parts,
            op,
            value,
            declared: self.declared,
            lookup: self.lookup,
            nodes: vec![PlanNode {
                name: root.column.clone(),
                lookup_path: String::new(),
                terminal: false,
                observed: Vec::new(),
                parent: None,
                json: None,
                dynamic: None,
                budget: root.budget,
                terminal_config: None,
                alias_name: root.column.clone(),
            }],
        };

        let first = state.node(0, NodeId(0), root.budget.object_child())?;
        state.nodes[0].json = Some(first);

        tracing::trace!(
            "built plan for {} on {} with {} nodes",
            lookup_path(parts, parts.len() - 1),
            root.column,
            state.nodes.len()
        );

        Ok(Plan {
            nodes: state.nodes,
            op,
        })
    }
}

/// Build a plan with no declared type.
pub fn build<L: TypeLookup + ?Sized>(
    parts: &[String],
    op: Operator,
    value: &Value,
    lookup: &L,
    root: &Root,
) -> Result<Plan> {
    PlanBuilder::new(lookup).build(parts, op, value, root)
}

struct BuildState<'a, L: TypeLookup + ?Sized> {
    parts: &'a [String],
    op: Operator,
    value: &'a Value,
    declared: Option<ObservedType>,
    lookup: &'a L,
    nodes: Vec<PlanNode>,
}

impl<L: TypeLookup + ?Sized> BuildState<'_, L> {
    /// Create the node for segment `index` under `parent` with its own
    /// `budget`, recursing into whichever array branches were observed.
    fn node(&mut self, index: usize, parent: NodeId, budget: Budget) -> Result<NodeId> {
        let name = self
            .parts
            .get(index)
            .ok_or(Error::PlanIndexOutOfBounds {
                index,
                len: self.parts.len(),
            })?
            .clone();

        let path = lookup_path(self.parts, index);
        let observed = self.lookup.types(&path);
        let terminal = index + 1 == self.parts.len();

        let parent_node = &self.nodes[parent.0];
        let alias_name = if parent_node.is_root() {
            format!("{}.{}", parent_node.alias_name, name)
        } else {
            format!("{}[].{}", parent_node.alias_name, name)
        };

        let terminal_config = terminal.then(|| {
            let r = resolve_declared(&observed, self.op, self.value, self.declared);
            let mut cfg = TerminalConfig::from_resolution(r, self.op, self.declared);
            cfg.string_indexed = index == 0 && self.lookup.string_indexed(&self.nodes[0].alias_name, &path);
            cfg
        });

        let has_json = observed.contains(&ObservedType::ArrayJson);
        let has_dynamic = observed.contains(&ObservedType::ArrayDynamic);

        let id = NodeId(self.nodes.len());
        self.nodes.push(PlanNode {
            name,
            lookup_path: path,
            terminal,
            observed,
            parent: Some(parent),
            json: None,
            dynamic: None,
            budget,
            terminal_config,
            alias_name,
        });

        if !terminal {
            if has_json {
                let child = self.node(index + 1, id, budget.object_child())?;
                self.nodes[id.0].json = Some(child);
            }
            if has_dynamic {
                let child = self.node(index + 1, id, Budget::DYNAMIC_RESET)?;
                self.nodes[id.0].dynamic = Some(child);
            }
        }

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture_types, segments};
    use serde_json::json;

    fn body_plan(path: &str, op: Operator, value: Value) -> Plan {
        build(&segments(path), op, &value, &fixture_types(), &Root::body("body_json")).unwrap()
    }

    #[test]
    fn test_budget_decay() {
        let mut b = Budget::BODY_ROOT;
        let mut seen = Vec::new();
        for _ in 0..8 {
            b = b.object_child();
            seen.push(b.max_dynamic_types);
        }
        assert_eq!(seen, vec![16, 8, 4, 2, 1, 0, 0, 0]);
        assert_eq!(Budget::PROMOTED_ROOT.object_child(), Budget::new(16, 256));
        assert_eq!(Budget::new(16, 256).object_child(), Budget::new(8, 64));
    }

    #[test]
    fn test_single_segment_plan() {
        let plan = body_plan("user.name", Operator::Equal, json!("alice"));
        let first = plan.first().unwrap();
        let node = plan.node(first);
        assert!(node.terminal);
        assert_eq!(node.budget, Budget::new(16, 0));
        assert_eq!(plan.field_path(first), "body_json.`user.name`");
        assert_eq!(node.alias(), "`body_json.user.name`");
        let cfg = node.terminal_config.as_ref().unwrap();
        assert_eq!(cfg.element_type, ObservedType::String);
        assert!(!cfg.prefer_array);
    }

    #[test]
    fn test_nested_aliases_and_field_paths() {
        let plan = body_plan("education[].awards[].type", Operator::Equal, json!("sports"));
        let edu = plan.first().unwrap();
        assert_eq!(plan.node(edu).alias(), "`body_json.education`");
        assert_eq!(plan.field_path(edu), "body_json.`education`");

        let awards_json = plan.node(edu).json.unwrap();
        assert_eq!(plan.node(awards_json).alias(), "`body_json.education[].awards`");
        assert_eq!(plan.field_path(awards_json), "`body_json.education`.`awards`");
        assert_eq!(plan.node(awards_json).budget, Budget::new(8, 0));

        let ty = plan.node(awards_json).json.unwrap();
        assert_eq!(plan.field_path(ty), "`body_json.education[].awards`.`type`");
        assert_eq!(plan.node(ty).budget, Budget::new(4, 0));
    }

    #[test]
    fn test_branches_follow_observed_types() {
        let plan = body_plan("education[].awards[].name", Operator::Equal, json!("x"));
        for node in plan.nodes().iter().filter(|n| !n.is_root()) {
            if node.terminal {
                assert!(!node.has_branches());
                assert!(node.terminal_config.is_some());
                continue;
            }
            assert_eq!(node.json.is_some(), node.has(ObservedType::ArrayJson));
            assert_eq!(node.dynamic.is_some(), node.has(ObservedType::ArrayDynamic));
        }
        // awards is both object-array and dynamic-array
        let awards = plan.node(plan.node(plan.first().unwrap()).json.unwrap());
        assert!(awards.json.is_some() && awards.dynamic.is_some());
        assert_eq!(plan.terminals().count(), 2);
    }

    #[test]
    fn test_dynamic_branch_resets_budget() {
        let plan = body_plan("education[].awards[].name", Operator::Equal, json!("x"));
        let awards = plan.node(plan.node(plan.first().unwrap()).json.unwrap());
        assert_eq!(awards.budget, Budget::new(8, 0));
        assert_eq!(plan.node(awards.json.unwrap()).budget, Budget::new(4, 0));
        assert_eq!(plan.node(awards.dynamic.unwrap()).budget, Budget::DYNAMIC_RESET);
    }

    #[test]
    fn test_six_hops_decay_to_zero() {
        let path = "interests[].entities[].reviews[].entries[].metadata[].positions[].name";
        let plan = body_plan(path, Operator::Equal, json!("lead"));
        let mut id = plan.first().unwrap();
        let mut budgets = Vec::new();
        loop {
            let node = plan.node(id);
            budgets.push(node.budget.max_dynamic_types);
            match node.json {
                Some(next) => id = next,
                None => break,
            }
        }
        assert_eq!(budgets, vec![16, 8, 4, 2, 1, 0, 0]);
        assert!(plan.node(id).terminal);
    }

    #[test]
    fn test_promoted_root_seed() {
        let parts = segments("education[].name");
        let plan = build(
            &parts,
            Operator::Equal,
            &json!("IIT"),
            &fixture_types(),
            &Root::promoted("body_json_promoted"),
        )
        .unwrap();
        let edu = plan.node(plan.first().unwrap());
        assert_eq!(edu.budget, Budget::new(16, 256));
        assert_eq!(plan.node(edu.json.unwrap()).budget, Budget::new(8, 64));
        assert_eq!(plan.column(), "body_json_promoted");
    }

    #[test]
    fn test_non_array_hop_has_no_branches() {
        let plan = body_plan("user.name[].first", Operator::Equal, json!("a"));
        let node = plan.node(plan.first().unwrap());
        assert!(!node.terminal);
        assert!(!node.has_branches());
        assert_eq!(plan.terminals().count(), 0);
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = build(&[], Operator::Equal, &json!(1), &fixture_types(), &Root::body("b")).unwrap_err();
        assert_eq!(err, Error::EmptyPath);
    }

    #[test]
    fn test_index_past_end_is_out_of_bounds() {
        let parts = segments("education[].name");
        let types = fixture_types();
        let mut state = BuildState {
            parts: &parts,
            op: Operator::Equal,
            value: &Value::Null,
            declared: None,
            lookup: &types,
            nodes: vec![],
        };
        state.nodes.push(PlanNode {
            name: "b".into(),
            lookup_path: String::new(),
            terminal: false,
            observed: vec![],
            parent: None,
            json: None,
            dynamic: None,
            budget: Budget::BODY_ROOT,
            terminal_config: None,
            alias_name: "b".into(),
        });
        let err = state.node(2, NodeId(0), Budget::BODY_ROOT).unwrap_err();
        assert_eq!(err, Error::PlanIndexOutOfBounds { index: 2, len: 2 });
    }

    #[test]
    fn test_display_tree() {
        let plan = body_plan("education[].parameters", Operator::Contains, json!(1.65));
        let text = plan.to_string();
        assert!(text.starts_with("body_json (32, 0)"));
        assert!(text.contains("education [Array(JSON)] (16, 0)"));
        assert!(text.contains("json: parameters"));
        assert!(text.contains("(array)"));
    }
}
