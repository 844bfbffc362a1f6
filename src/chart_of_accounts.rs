use crate::error::{ClinicLedgerError, Result};
use crate::schema::{AccountMainType, AccountNode};
use log::warn;
use std::collections::{BTreeMap, HashMap};

/// The chart of accounts as an arena: nodes addressed by index, parent and
/// children stored as index lists.
#[derive(Debug, Clone, Default)]
pub struct AccountTree {
    nodes: Vec<AccountNode>,
    index: HashMap<String, usize>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl AccountTree {
    /// Builds the arena. Duplicate ids keep the first node; a parent id that
    /// points nowhere turns the node into a root.
    pub fn from_nodes(nodes: &[AccountNode]) -> Self {
        let mut tree = AccountTree::default();

        for node in nodes {
            if tree.index.contains_key(&node.id) {
                warn!("Duplicate account id '{}' ignored", node.id);
                continue;
            }
            tree.index.insert(node.id.clone(), tree.nodes.len());
            tree.nodes.push(node.clone());
        }

        tree.parents = vec![None; tree.nodes.len()];
        tree.children = vec![Vec::new(); tree.nodes.len()];

        for (idx, node) in tree.nodes.iter().enumerate() {
            let Some(parent_id) = node.parent_id.as_deref() else {
                continue;
            };
            match tree.index.get(parent_id) {
                Some(&parent) => {
                    tree.parents[idx] = Some(parent);
                    tree.children[parent].push(idx);
                }
                None => warn!(
                    "Account '{}' references missing parent '{}', treating it as a root",
                    node.id, parent_id
                ),
            }
        }

        tree
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AccountNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn roots(&self) -> impl Iterator<Item = &AccountNode> + '_ {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_none())
            .map(|(idx, _)| &self.nodes[idx])
    }

    pub fn children_of(&self, id: &str) -> Vec<&AccountNode> {
        self.index
            .get(id)
            .map(|&idx| self.children[idx].iter().map(|&c| &self.nodes[c]).collect())
            .unwrap_or_default()
    }

    /// Number of ancestors, or `None` for an unknown id or a node on a parent cycle.
    pub fn depth(&self, id: &str) -> Option<usize> {
        let mut current = *self.index.get(id)?;
        let mut depth = 0;
        while let Some(parent) = self.parents[current] {
            depth += 1;
            if depth > self.nodes.len() {
                return None;
            }
            current = parent;
        }
        Some(depth)
    }

    pub fn nodes_of_type(&self, main_type: AccountMainType) -> Vec<&AccountNode> {
        self.nodes
            .iter()
            .filter(|n| n.main_type == main_type)
            .collect()
    }

    /// Own ledger balance plus the rolled-up balances of all descendants.
    ///
    /// `balance_of` supplies the own balance of an account id. Each node is
    /// visited at most once per call; meeting a node twice means the parent
    /// links form a cycle, reported as [`ClinicLedgerError::AccountCycle`].
    pub fn rolled_up_balance<F>(&self, id: &str, balance_of: F) -> Result<f64>
    where
        F: Fn(&str) -> f64,
    {
        let &start = self
            .index
            .get(id)
            .ok_or_else(|| ClinicLedgerError::UnknownAccount(id.to_string()))?;

        let mut visited = vec![false; self.nodes.len()];
        self.rollup(start, &balance_of, &mut visited)
    }

    fn rollup<F>(&self, idx: usize, balance_of: &F, visited: &mut [bool]) -> Result<f64>
    where
        F: Fn(&str) -> f64,
    {
        if visited[idx] {
            return Err(ClinicLedgerError::AccountCycle {
                account_id: self.nodes[idx].id.clone(),
            });
        }
        visited[idx] = true;

        let mut total = balance_of(&self.nodes[idx].id);
        for &child in &self.children[idx] {
            total += self.rollup(child, balance_of, visited)?;
        }
        Ok(total)
    }

    /// Rolled-up balance of every account. Accounts caught in a cycle are
    /// logged and left out.
    pub fn rolled_up_balances<F>(&self, balance_of: F) -> BTreeMap<String, f64>
    where
        F: Fn(&str) -> f64,
    {
        let mut balances = BTreeMap::new();
        for node in &self.nodes {
            match self.rolled_up_balance(&node.id, &balance_of) {
                Ok(balance) => {
                    balances.insert(node.id.clone(), balance);
                }
                Err(e) => warn!("Skipping rollup for account '{}': {}", node.id, e),
            }
        }
        balances
    }

    /// Depth-first order from each root, children in code order.
    fn walk(&self) -> Vec<(usize, usize)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = vec![false; self.nodes.len()];

        let mut roots: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| self.parents[idx].is_none())
            .collect();
        roots.sort_by(|a, b| self.nodes[*a].code.cmp(&self.nodes[*b].code));

        let mut stack: Vec<(usize, usize)> = roots.into_iter().rev().map(|r| (r, 0)).collect();
        while let Some((idx, depth)) = stack.pop() {
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            order.push((idx, depth));

            let mut children = self.children[idx].clone();
            children.sort_by(|a, b| self.nodes[*a].code.cmp(&self.nodes[*b].code));
            stack.extend(children.into_iter().rev().map(|c| (c, depth + 1)));
        }

        order
    }

    pub fn to_csv(&self, balances: &BTreeMap<String, f64>) -> String {
        let mut output = String::new();
        output.push_str("Code,Account Name,Main Type,Depth,Rolled-up Balance\n");

        for (idx, depth) in self.walk() {
            let node = &self.nodes[idx];
            output.push_str(&format!(
                "{},{},{:?},{},{:.2}\n",
                node.code,
                node.name,
                node.main_type,
                depth,
                balances.get(&node.id).copied().unwrap_or(0.0)
            ));
        }

        output
    }

    pub fn to_markdown(&self, title: &str, balances: &BTreeMap<String, f64>) -> String {
        let mut output = String::new();
        output.push_str(&format!("# Chart of Accounts - {}\n\n", title));

        for (idx, depth) in self.walk() {
            let node = &self.nodes[idx];
            let indent = "  ".repeat(depth);
            let balance = balances
                .get(&node.id)
                .map(|b| format!("{:.2}", b))
                .unwrap_or_else(|| "n/a".to_string());
            if depth == 0 {
                output.push_str(&format!(
                    "- **{} {}** ({:?}): {}\n",
                    node.code, node.name, node.main_type, balance
                ));
            } else {
                output.push_str(&format!(
                    "{}- {} {}: {}\n",
                    indent, node.code, node.name, balance
                ));
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>) -> AccountNode {
        AccountNode {
            id: id.to_string(),
            code: id.to_uppercase(),
            name: format!("Account {}", id),
            parent_id: parent.map(str::to_string),
            main_type: AccountMainType::Asset,
        }
    }

    fn balances() -> HashMap<&'static str, f64> {
        HashMap::from([("r", 1.0), ("a", 10.0), ("b", 100.0), ("c", 1000.0)])
    }

    #[test]
    fn test_rollup_sums_all_descendants() {
        let tree = AccountTree::from_nodes(&[
            node("r", None),
            node("a", Some("r")),
            node("b", Some("r")),
            node("c", Some("a")),
        ]);
        let b = balances();
        let lookup = |id: &str| b.get(id).copied().unwrap_or(0.0);

        assert_eq!(tree.rolled_up_balance("r", lookup).unwrap(), 1111.0);
        assert_eq!(tree.rolled_up_balance("a", lookup).unwrap(), 1010.0);
        assert_eq!(tree.rolled_up_balance("c", lookup).unwrap(), 1000.0);
    }

    #[test]
    fn test_rollup_independent_of_storage_order() {
        let tree = AccountTree::from_nodes(&[
            node("c", Some("a")),
            node("b", Some("r")),
            node("a", Some("r")),
            node("r", None),
        ]);
        let b = balances();
        let lookup = |id: &str| b.get(id).copied().unwrap_or(0.0);
        assert_eq!(tree.rolled_up_balance("r", lookup).unwrap(), 1111.0);
    }

    #[test]
    fn test_cycle_is_reported_not_followed() {
        let tree = AccountTree::from_nodes(&[
            node("x", Some("z")),
            node("y", Some("x")),
            node("z", Some("y")),
            node("ok", None),
        ]);
        let result = tree.rolled_up_balance("x", |_| 1.0);
        assert!(matches!(result, Err(ClinicLedgerError::AccountCycle { .. })));
        assert_eq!(tree.depth("x"), None);

        let all = tree.rolled_up_balances(|_| 1.0);
        assert_eq!(all.len(), 1);
        assert_eq!(all["ok"], 1.0);
    }

    #[test]
    fn test_unknown_account() {
        let tree = AccountTree::from_nodes(&[node("r", None)]);
        assert!(matches!(
            tree.rolled_up_balance("nope", |_| 0.0),
            Err(ClinicLedgerError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_dangling_parent_becomes_root() {
        let tree = AccountTree::from_nodes(&[node("orphan", Some("gone")), node("r", None)]);
        assert_eq!(tree.roots().count(), 2);
        assert_eq!(tree.depth("orphan"), Some(0));
    }

    #[test]
    fn test_structure_queries() {
        let tree = AccountTree::from_nodes(&[
            node("r", None),
            node("a", Some("r")),
            node("c", Some("a")),
        ]);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.depth("c"), Some(2));
        assert_eq!(tree.children_of("r").len(), 1);
        assert!(tree.children_of("missing").is_empty());
        assert_eq!(tree.nodes_of_type(AccountMainType::Asset).len(), 3);
    }

    #[test]
    fn test_renderings() {
        let tree = AccountTree::from_nodes(&[
            node("r", None),
            node("a", Some("r")),
            node("c", Some("a")),
        ]);
        let b = balances();
        let rolled = tree.rolled_up_balances(|id| b.get(id).copied().unwrap_or(0.0));

        let csv = tree.to_csv(&rolled);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Code,Account Name,Main Type,Depth,Rolled-up Balance");
        assert_eq!(lines[1], "R,Account r,Asset,0,1011.00");
        assert_eq!(lines[3], "C,Account c,Asset,2,1000.00");

        let markdown = tree.to_markdown("Clinic", &rolled);
        assert!(markdown.contains("# Chart of Accounts - Clinic"));
        assert!(markdown.contains("    - C Account c: 1000.00"));
    }
}
