//! Depth-first traversal over parse results.

use crate::grammar::{Emit, Grammar};
use crate::node::Node;

/// Hooks fired while walking a tree. Both default to doing nothing, so a
/// visitor only implements the directions it cares about.
pub trait Visitor {
    /// Called before a node's children are walked.
    fn enter(&mut self, _node: &Node) {}

    /// Called after a node's children are walked.
    fn leave(&mut self, _node: &Node) {}
}

impl Grammar {
    /// Walk `node` depth-first, firing [Visitor::enter] pre-order and
    /// [Visitor::leave] post-order. After leaving a node, an emit action
    /// registered for its symbol (or alternative) is invoked with the node,
    /// which is what drives callback-based evaluation of a tree.
    pub fn traverse(&self, node: &Node, visitor: &mut impl Visitor) {
        visitor.enter(node);

        for child in node.children() {
            self.traverse(child, visitor);
        }

        visitor.leave(node);

        if let Some(Emit::Action(action)) = self.emit_of(node) {
            action(node);
        }
    }
}
