//! Pool-backed representation of the valid_policy_tree used during certificate policy processing

use alloc::vec::Vec;
use core::cell::RefCell;

use const_oid::db::rfc5280::ANY_POLICY;
use der::asn1::ObjectIdentifier;

use crate::ObjectIdentifierSet;

/// `PolicyTreeNode` is the node type in the valid_policy_tree maintained while processing the
/// certificate policies, policy mappings, policy constraints and inhibit anyPolicy extensions. The
/// first three fields correspond to the node contents described in RFC 5280 Section 6.1.2. The
/// depth field indicates the row in the valid_policy_tree where the node was added and the parent
/// field identifies the node whose evaluation caused this node to be added, with only the root
/// node having no parent.
///
/// Nodes are owned by a [`PolicyPool`] and referenced by index, both from tree rows and from the
/// children lists of other nodes. Childless interior nodes are periodically pruned from the tree
/// (the pool itself is never compacted, so indices remain stable). The first five fields are
/// established when a node is created and are not altered thereafter.
#[derive(Clone)]
pub(crate) struct PolicyTreeNode {
    pub(crate) valid_policy: ObjectIdentifier,
    pub(crate) qualifier_set: Option<Vec<u8>>,
    pub(crate) expected_policy_set: ObjectIdentifierSet,
    pub(crate) depth: u8,
    pub(crate) parent: Option<usize>,
    pub(crate) children: RefCell<Vec<usize>>,
}

impl PolicyTreeNode {
    pub(crate) fn new(
        valid_policy: ObjectIdentifier,
        qualifier_set: Option<Vec<u8>>,
        expected_policy_set: ObjectIdentifierSet,
        depth: u8,
        parent: Option<usize>,
    ) -> Self {
        PolicyTreeNode {
            valid_policy,
            qualifier_set,
            expected_policy_set,
            depth,
            parent,
            children: RefCell::new(Vec::new()),
        }
    }
}

/// `PolicyPool` owns every [`PolicyTreeNode`] that appears in a valid_policy_tree.
pub(crate) type PolicyPool = Vec<PolicyTreeNode>;

/// `PolicyTreeRow` represents one depth of the valid_policy_tree. Each element is an index into
/// the [`PolicyPool`] that backs the tree.
pub(crate) type PolicyTreeRow = Vec<usize>;

/// Appends a node to the pool and returns its index.
pub(crate) fn add_node_to_pool(pool: &mut PolicyPool, node: PolicyTreeNode) -> usize {
    pool.push(node);
    pool.len() - 1
}

/// Returns true if the given children list contains a node whose valid_policy equals oid.
pub(crate) fn has_child_with_policy(
    pool: &PolicyPool,
    children: &RefCell<Vec<usize>>,
    oid: &ObjectIdentifier,
) -> bool {
    children
        .borrow()
        .iter()
        .any(|c| pool[*c].valid_policy == *oid)
}

/// Adds child_index to the given children list unless a child with the same valid_policy is
/// already present.
pub(crate) fn attach_child(pool: &PolicyPool, children: &RefCell<Vec<usize>>, child_index: usize) {
    let candidate = &pool[child_index];
    let present = children
        .borrow()
        .iter()
        .any(|c| pool[*c].valid_policy == candidate.valid_policy);
    if !present {
        children.borrow_mut().push(child_index);
    }
}

/// Returns true if the node at the given pool index has valid_policy equal to oid.
pub(crate) fn node_is_policy(pool: &PolicyPool, index: usize, oid: ObjectIdentifier) -> bool {
    pool[index].valid_policy == oid
}

/// Searches a tree row for a node whose valid_policy equals oid, returning the pool index of the
/// first such node or None.
pub(crate) fn row_contains_policy(
    pool: &PolicyPool,
    row: &PolicyTreeRow,
    oid: ObjectIdentifier,
) -> Option<usize> {
    row.iter().copied().find(|i| pool[*i].valid_policy == oid)
}

/// Returns true if the node at the given pool index has no children. Out of range indices are
/// treated as childless.
pub(crate) fn is_childless(pool: &PolicyPool, index: usize) -> bool {
    match pool.get(index) {
        Some(node) => node.children.borrow().is_empty(),
        None => true,
    }
}

/// Collects the valid_policy_node_set per RFC 5280 Section 6.1.5 (g)(iii)(1), i.e., the nodes
/// whose parent has a valid_policy of anyPolicy, recursing through chained anyPolicy nodes.
pub(crate) fn collect_valid_policy_node_set(
    pool: &PolicyPool,
    node: &PolicyTreeNode,
    valid_policy_node_set: &mut Vec<usize>,
) {
    if node.valid_policy == ANY_POLICY {
        for c_index in node.children.borrow().iter() {
            valid_policy_node_set.push(*c_index);
            collect_valid_policy_node_set(pool, &pool[*c_index], valid_policy_node_set);
        }
    }
}

/// Deletes from the tree each node in the valid_policy_node_set whose valid_policy is neither
/// anyPolicy nor a member of the initial policy set, along with the node's children, per RFC 5280
/// Section 6.1.5 (g)(iii)(2).
pub(crate) fn prune_disallowed_policies(
    pool: &PolicyPool,
    initial_policy_set: &ObjectIdentifierSet,
    valid_policy_node_set: &[usize],
    valid_policy_tree: &mut Vec<PolicyTreeRow>,
) {
    for node_index in valid_policy_node_set {
        let node = &pool[*node_index];
        if node.valid_policy == ANY_POLICY || initial_policy_set.contains(&node.valid_policy) {
            continue;
        }
        if let Some(parent_index) = node.parent {
            pool[parent_index]
                .children
                .borrow_mut()
                .retain(|x| !node_is_policy(pool, *x, node.valid_policy));
            remove_subtree(pool, valid_policy_tree, node, *node_index);
        }
    }
}

/// Removes a node and all of its descendants from the tree rows and clears the affected children
/// lists. Pool entries are left in place so that surviving indices remain valid.
pub(crate) fn remove_subtree(
    pool: &PolicyPool,
    valid_policy_tree: &mut Vec<PolicyTreeRow>,
    node: &PolicyTreeNode,
    node_index: usize,
) {
    for c_index in node.children.borrow().iter() {
        remove_subtree(pool, valid_policy_tree, &pool[*c_index], *c_index);
    }
    node.children.borrow_mut().clear();
    valid_policy_tree[node.depth as usize].retain(|x| *x != node_index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeSet;
    use alloc::vec;

    #[test]
    fn attach_and_query_children() {
        let policy = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.2.1.48.1");
        let mut pool = PolicyPool::new();
        let root = add_node_to_pool(
            &mut pool,
            PolicyTreeNode::new(ANY_POLICY, None, BTreeSet::from([ANY_POLICY]), 0, None),
        );
        let child = add_node_to_pool(
            &mut pool,
            PolicyTreeNode::new(policy, None, BTreeSet::from([policy]), 1, Some(root)),
        );
        attach_child(&pool, &pool[root].children, child);
        assert!(has_child_with_policy(&pool, &pool[root].children, &policy));
        assert!(!has_child_with_policy(
            &pool,
            &pool[root].children,
            &ANY_POLICY
        ));
        assert!(!is_childless(&pool, root));
        assert!(is_childless(&pool, child));
        assert!(is_childless(&pool, pool.len()));

        let dup = add_node_to_pool(
            &mut pool,
            PolicyTreeNode::new(policy, None, BTreeSet::from([policy]), 1, Some(root)),
        );
        attach_child(&pool, &pool[root].children, dup);
        assert_eq!(1, pool[root].children.borrow().len());
    }

    #[test]
    fn row_queries() {
        let policy = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.2.1.48.2");
        let mut pool = PolicyPool::new();
        let root = add_node_to_pool(
            &mut pool,
            PolicyTreeNode::new(ANY_POLICY, None, BTreeSet::from([ANY_POLICY]), 0, None),
        );
        let child = add_node_to_pool(
            &mut pool,
            PolicyTreeNode::new(policy, None, BTreeSet::from([policy]), 1, Some(root)),
        );
        let row = PolicyTreeRow::from([root, child]);
        assert_eq!(Some(root), row_contains_policy(&pool, &row, ANY_POLICY));
        assert_eq!(Some(child), row_contains_policy(&pool, &row, policy));
        assert_eq!(
            None,
            row_contains_policy(
                &pool,
                &row,
                ObjectIdentifier::new_unwrap("2.16.840.1.101.3.2.1.48.3")
            )
        );
        assert!(node_is_policy(&pool, child, policy));
        assert!(!node_is_policy(&pool, child, ANY_POLICY));
    }

    #[test]
    fn prune_nodes_outside_initial_set() {
        let keep_oid = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.2.1.48.4");
        let cull_oid = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.2.1.48.5");
        let mut pool = PolicyPool::new();
        let root = add_node_to_pool(
            &mut pool,
            PolicyTreeNode::new(ANY_POLICY, None, BTreeSet::from([ANY_POLICY]), 0, None),
        );
        let kept = add_node_to_pool(
            &mut pool,
            PolicyTreeNode::new(keep_oid, None, BTreeSet::from([keep_oid]), 1, Some(root)),
        );
        let culled = add_node_to_pool(
            &mut pool,
            PolicyTreeNode::new(cull_oid, None, BTreeSet::from([cull_oid]), 1, Some(root)),
        );
        attach_child(&pool, &pool[root].children, kept);
        attach_child(&pool, &pool[root].children, culled);

        let mut tree = vec![PolicyTreeRow::from([root]), PolicyTreeRow::from([kept, culled])];
        let mut valid_policy_node_set = Vec::new();
        collect_valid_policy_node_set(&pool, &pool[root], &mut valid_policy_node_set);
        assert_eq!(2, valid_policy_node_set.len());

        let initial_policy_set = ObjectIdentifierSet::from([keep_oid]);
        prune_disallowed_policies(&pool, &initial_policy_set, &valid_policy_node_set, &mut tree);
        assert_eq!(vec![kept], tree[1]);
        assert_eq!(1, pool[root].children.borrow().len());
        assert!(has_child_with_policy(&pool, &pool[root].children, &keep_oid));
    }
}
