//! Declarative permission tree.
//!
//! Menus and actions are described as nested [`PermissionSpec`] nodes. A node
//! without children implies one leaf per default CRUD action (plus any custom
//! actions); a node with children recurses. The seed routine reconciles this
//! tree against storage, see `crate::seed`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::postgres::PermissionRow;

/// One derived or explicit action under a menu node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub scope: String,
    #[serde(default)]
    pub is_menu: bool,
    #[serde(default = "default_true")]
    pub is_action: bool,
}

impl ActionSpec {
    fn new(name: &str, scope: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: scope.to_string(),
            is_menu: false,
            is_action: true,
        }
    }
}

/// A node of the declarative permission tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSpec {
    pub name: String,
    pub scope: String,
    /// Extra actions beyond the default set (leaf nodes only).
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    #[serde(default)]
    pub children: Vec<PermissionSpec>,
    #[serde(default = "default_true")]
    pub is_menu: bool,
    #[serde(default)]
    pub is_action: bool,
    #[serde(default)]
    pub icon: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PermissionSpec {
    pub fn menu(name: &str, scope: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: scope.to_string(),
            actions: Vec::new(),
            children: Vec::new(),
            is_menu: true,
            is_action: false,
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<PermissionSpec>) -> Self {
        self.children = children;
        self
    }

    /// The full action set implied by this node: defaults plus custom actions.
    pub fn leaf_actions(&self) -> Vec<ActionSpec> {
        let mut all = default_actions();
        all.extend(self.actions.iter().cloned());
        all
    }

    /// Storage record for this node itself.
    pub fn record(&self, parent_id: Option<Uuid>) -> NewPermission {
        NewPermission {
            name: self.name.clone(),
            scope: self.scope.clone(),
            parent_id,
            is_menu: self.is_menu,
            is_action: self.is_action,
            icon: self.icon.clone(),
        }
    }

    /// Storage records for the implied leaves, scoped `{parent}.{action}` and
    /// named `{parent_name} {action_name}`.
    pub fn leaf_records(&self, parent_id: Uuid) -> Vec<NewPermission> {
        self.leaf_actions()
            .iter()
            .map(|action| NewPermission {
                name: format!("{} {}", self.name, action.name),
                scope: format!("{}.{}", self.scope, action.scope),
                parent_id: Some(parent_id),
                is_menu: action.is_menu,
                is_action: action.is_action,
                icon: None,
            })
            .collect()
    }
}

/// Default CRUD action set derived under every leaf menu node.
pub fn default_actions() -> Vec<ActionSpec> {
    vec![
        ActionSpec::new("列表", "list"),
        ActionSpec::new("详情", "get"),
        ActionSpec::new("创建", "store"),
        ActionSpec::new("更新", "update"),
        ActionSpec::new("删除", "delete"),
        ActionSpec::new("导出", "export"),
        ActionSpec::new("导入", "import"),
    ]
}

/// Insertable permission record (ensure-exists by scope).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub name: String,
    pub scope: String,
    pub parent_id: Option<Uuid>,
    pub is_menu: bool,
    pub is_action: bool,
    pub icon: Option<String>,
}

/// Console root ensured before any other permission.
pub fn dashboard_spec() -> PermissionSpec {
    PermissionSpec::menu("控制台", "Dashboard").with_icon("DataBoard")
}

/// Built-in system permission tree: the admin modules themselves.
pub fn system_permissions() -> Vec<PermissionSpec> {
    vec![
        PermissionSpec::menu("预约管理", "function.appointment").with_icon("Calendar"),
        PermissionSpec::menu("系统管理", "function")
            .with_icon("Setting")
            .with_children(vec![
                PermissionSpec::menu("权限管理", "function.permission"),
                PermissionSpec::menu("用户管理", "function.user"),
                PermissionSpec::menu("公司管理", "function.company"),
            ]),
    ]
}

// ── Visible tree assembly ────────────────────────────────────

/// Nested permission node returned by the `params` endpoint.
#[derive(Debug, Serialize)]
pub struct PermissionNode {
    pub id: Uuid,
    pub name: String,
    pub scope: String,
    pub is_menu: bool,
    pub is_action: bool,
    pub icon: Option<String>,
    pub children: Vec<PermissionNode>,
}

/// Assemble flat rows into a nested tree by parent reference. Rows whose
/// parent is not in the set become roots, so a scope-filtered subset still
/// renders.
pub fn build_tree(rows: &[PermissionRow]) -> Vec<PermissionNode> {
    let ids: std::collections::HashSet<Uuid> = rows.iter().map(|r| r.id).collect();
    let roots: Vec<&PermissionRow> = rows
        .iter()
        .filter(|r| r.parent_id.map_or(true, |p| !ids.contains(&p)))
        .collect();
    roots.iter().map(|r| build_node(r, rows)).collect()
}

fn build_node(row: &PermissionRow, rows: &[PermissionRow]) -> PermissionNode {
    let children = rows
        .iter()
        .filter(|r| r.parent_id == Some(row.id))
        .map(|r| build_node(r, rows))
        .collect();
    PermissionNode {
        id: row.id,
        name: row.name.clone(),
        scope: row.scope.clone(),
        is_menu: row.is_menu,
        is_action: row.is_action,
        icon: row.icon.clone(),
        children,
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn default_action_set_is_seven() {
        let actions = default_actions();
        let scopes: Vec<&str> = actions.iter().map(|a| a.scope.as_str()).collect();
        assert_eq!(
            scopes,
            vec!["list", "get", "store", "update", "delete", "export", "import"]
        );
    }

    #[test]
    fn leaf_records_derive_scope_and_name() {
        let spec = PermissionSpec::menu("控制台", "Dashboard");
        let parent = Uuid::new_v4();
        let leaves = spec.leaf_records(parent);

        assert_eq!(leaves.len(), 7);
        assert_eq!(leaves[0].scope, "Dashboard.list");
        assert_eq!(leaves[0].name, "控制台 列表");
        assert!(leaves.iter().all(|l| l.parent_id == Some(parent)));
        assert!(leaves.iter().all(|l| l.is_action && !l.is_menu));
    }

    #[test]
    fn custom_actions_extend_the_default_set() {
        let mut spec = PermissionSpec::menu("预约管理", "function.appointment");
        spec.actions.push(ActionSpec::new("审核", "audit"));

        let leaves = spec.leaf_records(Uuid::new_v4());
        assert_eq!(leaves.len(), 8);
        assert_eq!(leaves.last().unwrap().scope, "function.appointment.audit");
        assert_eq!(leaves.last().unwrap().name, "预约管理 审核");
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: PermissionSpec =
            serde_json::from_str(r#"{"name":"控制台","scope":"Dashboard"}"#).unwrap();
        assert!(spec.is_menu);
        assert!(!spec.is_action);
        assert!(spec.children.is_empty());
        assert!(spec.actions.is_empty());
    }

    fn row(id: Uuid, parent: Option<Uuid>, scope: &str) -> PermissionRow {
        PermissionRow {
            id,
            name: scope.to_string(),
            scope: scope.to_string(),
            parent_id: parent,
            is_menu: true,
            is_action: false,
            icon: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn build_tree_nests_children() {
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let rows = vec![
            row(root, None, "function"),
            row(child, Some(root), "function.user"),
        ];

        let tree = build_tree(&rows);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].scope, "function");
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].scope, "function.user");
    }

    #[test]
    fn build_tree_promotes_orphans_to_roots() {
        let missing_parent = Uuid::new_v4();
        let orphan = Uuid::new_v4();
        let rows = vec![row(orphan, Some(missing_parent), "function.user.list")];

        let tree = build_tree(&rows);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].scope, "function.user.list");
    }
}
