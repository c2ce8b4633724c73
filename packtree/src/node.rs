//! Nodes of the abstract syntax tree produced by a parse.

use std::fmt::Display;

/// Indentation step used by [Node::dump]
const INDENT_SIZE: usize = 1;

/// A node of the abstract syntax tree.
///
/// Leaf nodes carry the matched lexeme; interior nodes carry children and,
/// for symbol-level emits, the text spanned by the whole reduction. A node
/// exclusively owns its subtree, and there are no back-references to the
/// parent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    /// The grammar symbol this node was reduced from. [None] only for the
    /// anonymous root that wraps an unemitted goal.
    symbol: Option<String>,
    /// The emit label attached to the symbol, if any.
    emit: Option<String>,
    /// The alternative index, for nodes produced by a per-alternative emit.
    rule: Option<usize>,
    /// The matched lexeme (leaves) or spanned text (symbol-level emits).
    matched: Option<String>,
    /// Child nodes, in input order.
    children: Vec<Node>,
}

impl Node {
    /// Construct a terminal leaf.
    pub(crate) fn leaf(symbol: &str, emit: Option<String>, matched: &str) -> Self {
        Node {
            symbol: Some(symbol.to_string()),
            emit,
            rule: None,
            matched: Some(matched.to_string()),
            children: Vec::new(),
        }
    }

    /// Construct an interior node for an emitted nonterminal.
    pub(crate) fn interior(
        symbol: &str,
        emit: Option<String>,
        matched: &str,
        children: Vec<Node>,
    ) -> Self {
        Node {
            symbol: Some(symbol.to_string()),
            emit,
            rule: None,
            matched: Some(matched.to_string()),
            children,
        }
    }

    /// Construct a wrapper node for an emitted goal reduction.
    pub(crate) fn reduction(symbol: &str, emit: Option<String>, children: Vec<Node>) -> Self {
        Node {
            symbol: Some(symbol.to_string()),
            emit,
            rule: None,
            matched: None,
            children,
        }
    }

    /// Construct a wrapper node for an emitted alternative.
    pub(crate) fn alternative(
        symbol: &str,
        emit: Option<String>,
        rule: usize,
        children: Vec<Node>,
    ) -> Self {
        Node {
            symbol: Some(symbol.to_string()),
            emit,
            rule: Some(rule),
            matched: None,
            children,
        }
    }

    /// Construct the anonymous root holding an unemitted goal's children.
    pub(crate) fn root(children: Vec<Node>) -> Self {
        Node {
            children,
            ..Node::default()
        }
    }

    /// The symbol this node was reduced from, if it has one.
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// The display name: the emit label if one was attached, else the symbol.
    pub fn name(&self) -> Option<&str> {
        self.emit.as_deref().or(self.symbol.as_deref())
    }

    /// The emit label attached to this node, if any.
    pub fn emit(&self) -> Option<&str> {
        self.emit.as_deref()
    }

    /// The alternative index, for per-alternative emits.
    pub fn rule(&self) -> Option<usize> {
        self.rule
    }

    /// The matched lexeme or spanned text, if any.
    pub fn matched(&self) -> Option<&str> {
        self.matched.as_deref()
    }

    /// The child nodes, in input order.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Whether this node was reduced from `symbol`.
    pub fn check(&self, symbol: &str) -> bool {
        self.symbol.as_deref() == Some(symbol)
    }

    /// Whether any direct child was reduced from `symbol`.
    pub fn contains(&self, symbol: &str) -> bool {
        self.children.iter().any(|c| c.check(symbol))
    }

    /// All direct children reduced from `symbol`, in input order.
    pub fn select(&self, symbol: &str) -> Vec<&Node> {
        self.children.iter().filter(|c| c.check(symbol)).collect()
    }

    /// The `idx`-th direct child reduced from `symbol`, if present.
    pub fn select_nth(&self, symbol: &str, idx: usize) -> Option<&Node> {
        self.children.iter().filter(|c| c.check(symbol)).nth(idx)
    }

    /// Render the subtree as an indented listing, one node per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_level(0, &mut out);
        out
    }

    /// Append this node and its children to `out` at the given indent level.
    fn dump_level(&self, level: usize, out: &mut String) {
        let mut next = level;

        if self.symbol.is_some() || self.emit.is_some() {
            out.push_str(&" ".repeat(level * INDENT_SIZE));
            out.push_str(&self.to_string());
            out.push('\n');
            next += 1;
        }

        for child in &self.children {
            child.dump_level(next, out);
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name().unwrap_or(""))?;

        if let Some(rule) = self.rule {
            write!(f, "[{}]", rule)?;
        }

        if self.children.is_empty() {
            if let Some(matched) = &self.matched {
                write!(f, " ({})", matched)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A small two-level tree: expr(INT, INT)
    fn sample() -> Node {
        Node::interior(
            "expr",
            None,
            "1+2",
            vec![
                Node::leaf("INT", None, "1"),
                Node::leaf("INT", None, "2"),
            ],
        )
    }

    #[test]
    fn select_filters_direct_children() {
        let n = sample();
        assert_eq!(n.select("INT").len(), 2);
        assert!(n.select("expr").is_empty());
        assert_eq!(n.select_nth("INT", 1).unwrap().matched(), Some("2"));
        assert!(n.select_nth("INT", 2).is_none());
        assert!(n.contains("INT"));
        assert!(n.check("expr"));
    }

    #[test]
    fn display_shows_lexemes_on_leaves_only() {
        let n = sample();
        assert_eq!(n.to_string(), "expr");
        assert_eq!(n.children()[0].to_string(), "INT (1)");

        let alt = Node::alternative("term", None, 1, Vec::new());
        assert_eq!(alt.to_string(), "term[1]");
    }

    #[test]
    fn dump_indents_by_depth() {
        let n = sample();
        assert_eq!(n.dump(), "expr\n INT (1)\n INT (2)\n");
    }

    #[test]
    fn anonymous_root_is_invisible_in_dumps() {
        let root = Node::root(vec![sample()]);
        assert_eq!(root.dump(), "expr\n INT (1)\n INT (2)\n");
    }
}
