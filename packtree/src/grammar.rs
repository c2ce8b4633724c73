//! The grammar: productions, terminals, ignore-terminals, emit markings and
//! the goal symbol.
//!
//! Also validates the grammar while it is being defined: terminal and
//! nonterminal names share one namespace-uniqueness rule, emit markings must
//! reference defined symbols, and a goal must exist before the grammar can
//! be constructed.

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};

use crate::bnf;
use crate::node::Node;
use crate::parser::ParseError;
use crate::token::Matcher;

/// Signature of an emit action, invoked with the emitted node during
/// traversal.
pub type EmitFn = Box<dyn Fn(&Node) + Send + Sync>;

/// What emitting a symbol produces on its nodes.
pub enum Emit {
    /// Emit under the symbol's own name.
    Name,
    /// Emit under a custom label.
    Label(String),
    /// Emit under the symbol's own name and run a callback during traversal.
    Action(EmitFn),
}

impl Emit {
    /// The label to store on emitted nodes, if one was configured.
    pub fn label(&self) -> Option<&str> {
        match self {
            Emit::Label(label) => Some(label),
            Emit::Name | Emit::Action(_) => None,
        }
    }
}

impl Debug for Emit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emit::Name => write!(f, "Name"),
            Emit::Label(label) => write!(f, "Label({:?})", label),
            Emit::Action(_) => write!(f, "Action(..)"),
        }
    }
}

/// Addresses an emit marking: a whole symbol, or one alternative of a
/// nonterminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EmitKey {
    /// A terminal or nonterminal by name.
    Symbol(String),
    /// One alternative of a nonterminal, by name and alternative index.
    Alternative(String, usize),
}

impl From<&str> for EmitKey {
    fn from(value: &str) -> Self {
        EmitKey::Symbol(value.to_string())
    }
}

impl From<(&str, usize)> for EmitKey {
    fn from(value: (&str, usize)) -> Self {
        EmitKey::Alternative(value.0.to_string(), value.1)
    }
}

/// Errors raised while defining a grammar.
#[derive(Debug)]
pub enum Error {
    /// No goal symbol was marked in the provided grammar.
    UndefinedGoal,
    /// An emit marking referenced a symbol that is not defined.
    SymbolNotFound(String),
    /// A terminal or nonterminal name was defined twice.
    MultipleDefinition(String),
    /// A terminal pattern did not compile.
    BadPattern(String, regex::Error),
    /// A grammar description string did not parse.
    Description(ParseError),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UndefinedGoal => write!(f, "no goal symbol defined in provided grammar"),
            Error::SymbolNotFound(name) => write!(f, "symbol not found: '{}'", name),
            Error::MultipleDefinition(name) => write!(f, "multiple definition of: '{}'", name),
            Error::BadPattern(name, e) => write!(f, "bad pattern for '{}': {}", name, e),
            Error::Description(e) => write!(f, "malformed grammar description: {}", e),
        }
    }
}

impl From<ParseError> for Error {
    fn from(value: ParseError) -> Self {
        Error::Description(value)
    }
}

/// A context-free grammar with PEG-style ordered alternatives.
///
/// Symbols inside productions are classified when they are matched: a name
/// registered as a terminal scans the input, a name with productions is
/// applied as a nonterminal, and anything else matches itself as an
/// anonymous literal.
///
/// A grammar is defined once and read-only afterwards; parsing never
/// mutates it, so a grammar may be shared by reference between threads
/// (scanner callbacks and emit actions carry `Send + Sync` bounds).
#[derive(Debug, Default)]
pub struct Grammar {
    /// Nonterminal name to its ordered list of alternatives.
    productions: HashMap<String, Vec<Vec<String>>>,
    /// Terminal name to its matcher.
    tokens: HashMap<String, Matcher>,
    /// Names of ignore-terminals, tried in definition order.
    ignores: Vec<String>,
    /// Emit markings for whole symbols.
    emit_symbols: HashMap<String, Emit>,
    /// Emit markings for single alternatives, keyed by nonterminal name and
    /// alternative index.
    emit_rules: HashMap<String, HashMap<usize, Emit>>,
    /// The goal nonterminal. Always present in a constructed grammar.
    goal: Option<String>,
}

impl Grammar {
    /// A grammar with nothing defined yet. Constructors fill it in.
    pub(crate) fn empty() -> Self {
        Grammar::default()
    }

    /// Build a grammar from nonterminal definitions.
    ///
    /// Each entry maps a nonterminal name to its alternatives; every
    /// alternative is a whitespace-separated sequence of symbol names, and
    /// an empty string is an empty production. Markers: a leading `@` on
    /// the name emits every reduction, a trailing `$` marks the goal
    /// (required in this form), a leading `@` on a symbol emits that
    /// symbol, and a trailing `*`, `+` or `?` on a symbol is a repetition
    /// operator, rewritten into fresh helper nonterminals during
    /// construction.
    ///
    /// # Errors
    ///
    /// Fails on duplicate nonterminal names or when no goal is marked.
    pub fn from_rules(rules: &[(&str, &[&str])]) -> Result<Self, Error> {
        let mut grammar = Grammar::empty();
        let mut cleaned = Vec::with_capacity(rules.len());

        // Register every nonterminal name up front; repetition lowering
        // probes the namespace when inventing helper names.
        for (key, alternatives) in rules {
            let mut name = *key;
            let emit = name.starts_with('@');
            if emit {
                name = &name[1..];
            }
            let goal = name.ends_with('$');
            if goal {
                name = &name[..name.len() - 1];
            }

            grammar.declare(name)?;
            cleaned.push((name, emit, goal, *alternatives));
        }

        for (name, emit, goal, alternatives) in cleaned {
            if emit {
                grammar.emit_symbols.insert(name.to_string(), Emit::Name);
            }
            if goal {
                grammar.goal = Some(name.to_string());
            }

            let alternatives = if alternatives.is_empty() {
                &[""][..]
            } else {
                alternatives
            };

            for alternative in alternatives {
                let sequence = grammar.build_sequence(name, alternative);
                grammar.push_alternative(name, sequence);
            }
        }

        match grammar.goal {
            Some(_) => Ok(grammar),
            None => Err(Error::UndefinedGoal),
        }
    }

    /// Build a grammar from a textual description (see the crate docs for
    /// the description language).
    ///
    /// # Errors
    ///
    /// Fails when the description does not parse, on duplicate or unknown
    /// symbols, or when the description defines no nonterminal to take the
    /// goal role.
    pub fn from_description(description: &str) -> Result<Self, Error> {
        bnf::load(description)
    }

    /// Parse a description with the built-in meta-grammar and return the
    /// raw meta-AST, without building a grammar from it.
    ///
    /// # Errors
    ///
    /// Fails when the description does not parse.
    pub fn description_ast(description: &str) -> Result<Node, Error> {
        bnf::description_ast(description)
    }

    /// Parse one alternative string into a symbol sequence, applying `@`
    /// emit markers and repetition operators.
    fn build_sequence(&mut self, nonterm: &str, alternative: &str) -> Vec<String> {
        let mut sequence = Vec::new();

        for word in alternative.split_whitespace() {
            let mut sym = word;

            if sym.len() > 1 && sym.starts_with('@') {
                sym = &sym[1..];
                let base = sym.trim_end_matches(['*', '+', '?']);
                self.emit_symbols.insert(base.to_string(), Emit::Name);
            }

            let mut sym = sym.to_string();
            if sym.len() > 1 {
                if let Some(modifier) = sym.chars().last().filter(|c| "*+?".contains(*c)) {
                    sym.pop();
                    sym = self.lower_modifier(nonterm, sym, modifier);
                }
            }

            sequence.push(sym);
        }

        sequence
    }

    /// Register `name` as a nonterminal with no alternatives yet.
    pub(crate) fn declare(&mut self, name: &str) -> Result<(), Error> {
        if self.productions.contains_key(name) || self.tokens.contains_key(name) {
            return Err(Error::MultipleDefinition(name.to_string()));
        }

        self.productions.insert(name.to_string(), Vec::new());
        Ok(())
    }

    /// Append one alternative to a declared nonterminal.
    pub(crate) fn push_alternative(&mut self, name: &str, sequence: Vec<String>) {
        self.productions.entry(name.to_string()).or_default().push(sequence);
    }

    /// Number of alternatives currently defined for `name`.
    pub(crate) fn alternative_count(&self, name: &str) -> usize {
        self.productions.get(name).map_or(0, Vec::len)
    }

    /// Set the goal nonterminal.
    pub(crate) fn set_goal(&mut self, name: &str) {
        self.goal = Some(name.to_string());
    }

    /// The goal nonterminal.
    pub(crate) fn goal_symbol(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    /// Derive a name from `base` that collides with no defined symbol, by
    /// appending `'` marks.
    pub(crate) fn unique_name(&self, base: &str) -> String {
        let mut name = base.to_string();

        while self.tokens.contains_key(&name) || self.productions.contains_key(&name) {
            name.push('\'');
        }

        name
    }

    /// Rewrite one use of `sym` under a repetition operator into fresh
    /// helper nonterminals, returning the symbol to reference instead.
    ///
    /// `X+` becomes `N` with `N: N X | X` (left-recursive); `X*` becomes
    /// `X+` wrapped in `M: N | ε`; `X?` becomes `M: X | ε`.
    pub(crate) fn lower_modifier(&mut self, nonterm: &str, sym: String, modifier: char) -> String {
        let mut sym = sym;

        if modifier == '*' || modifier == '+' {
            let one_or_more = self.unique_name(nonterm);
            self.productions.insert(
                one_or_more.clone(),
                vec![vec![one_or_more.clone(), sym.clone()], vec![sym]],
            );
            sym = one_or_more;
        }

        if modifier == '*' || modifier == '?' {
            let one_or_none = self.unique_name(nonterm);
            self.productions
                .insert(one_or_none.clone(), vec![vec![sym], vec![]]);
            sym = one_or_none;
        }

        sym
    }

    /// Register a terminal matching an anchored regular expression.
    ///
    /// # Errors
    ///
    /// Fails when the name is already taken or the pattern does not
    /// compile.
    pub fn token(&mut self, name: &str, pattern: &str) -> Result<(), Error> {
        let matcher =
            Matcher::pattern(pattern).map_err(|e| Error::BadPattern(name.to_string(), e))?;
        self.define_token(name, matcher)
    }

    /// Register a terminal matching a static string.
    ///
    /// # Errors
    ///
    /// Fails when the name is already taken.
    pub fn token_literal(&mut self, name: &str, literal: &str) -> Result<(), Error> {
        self.define_token(name, Matcher::Literal(literal.to_string()))
    }

    /// Register a terminal matched by a callback. The callback receives the
    /// whole input and a byte offset and returns the matched length, or
    /// [None] for no match; it must be pure, since results are memoized.
    ///
    /// # Errors
    ///
    /// Fails when the name is already taken.
    pub fn token_fn(
        &mut self,
        name: &str,
        scan: impl Fn(&str, usize) -> Option<usize> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.define_token(name, Matcher::Scan(Box::new(scan)))
    }

    /// Register a terminal under `name`, enforcing namespace uniqueness.
    pub(crate) fn define_token(&mut self, name: &str, matcher: Matcher) -> Result<(), Error> {
        if self.tokens.contains_key(name) || self.productions.contains_key(name) {
            return Err(Error::MultipleDefinition(name.to_string()));
        }

        self.tokens.insert(name.to_string(), matcher);
        Ok(())
    }

    /// Register an auto-named ignore-terminal from a regular expression.
    /// Ignore-terminals are skipped before every symbol match, in the order
    /// they were registered.
    ///
    /// # Errors
    ///
    /// Fails when the pattern does not compile.
    pub fn ignore(&mut self, pattern: &str) -> Result<(), Error> {
        let name = self.auto_name();
        self.token(&name, pattern)?;
        self.ignores.push(name);
        Ok(())
    }

    /// Register an auto-named ignore-terminal from a static string.
    ///
    /// # Errors
    ///
    /// Fails when the generated name is already taken.
    pub fn ignore_literal(&mut self, literal: &str) -> Result<(), Error> {
        let name = self.auto_name();
        self.token_literal(&name, literal)?;
        self.ignores.push(name);
        Ok(())
    }

    /// Register an ignore-terminal under an existing terminal name.
    pub(crate) fn ignore_token(&mut self, name: &str) {
        self.ignores.push(name.to_string());
    }

    /// Generated name for anonymous terminals.
    pub(crate) fn auto_name(&self) -> String {
        format!("T${:03}", self.tokens.len())
    }

    /// Mark a symbol or alternative as emitted under its own name.
    ///
    /// # Errors
    ///
    /// Fails when the referenced symbol is not defined.
    pub fn emit(&mut self, key: impl Into<EmitKey>) -> Result<(), Error> {
        self.set_emit(key.into(), Emit::Name)
    }

    /// Mark a symbol or alternative as emitted under `label`.
    ///
    /// # Errors
    ///
    /// Fails when the referenced symbol is not defined.
    pub fn emit_as(&mut self, key: impl Into<EmitKey>, label: &str) -> Result<(), Error> {
        self.set_emit(key.into(), Emit::Label(label.to_string()))
    }

    /// Mark a symbol or alternative as emitted, with a callback invoked on
    /// every emitted node during traversal.
    ///
    /// # Errors
    ///
    /// Fails when the referenced symbol is not defined.
    pub fn emit_with(
        &mut self,
        key: impl Into<EmitKey>,
        action: impl Fn(&Node) + Send + Sync + 'static,
    ) -> Result<(), Error> {
        self.set_emit(key.into(), Emit::Action(Box::new(action)))
    }

    /// Store one emit marking, validating the symbol reference.
    pub(crate) fn set_emit(&mut self, key: EmitKey, emit: Emit) -> Result<(), Error> {
        let name = match &key {
            EmitKey::Symbol(name) | EmitKey::Alternative(name, _) => name,
        };

        if !self.productions.contains_key(name) && !self.tokens.contains_key(name) {
            return Err(Error::SymbolNotFound(name.clone()));
        }

        match key {
            EmitKey::Symbol(name) => {
                self.emit_symbols.insert(name, emit);
            }
            EmitKey::Alternative(name, index) => {
                self.emit_rules.entry(name).or_default().insert(index, emit);
            }
        }

        Ok(())
    }

    /// The alternatives of a nonterminal, or an empty slice for unknown
    /// names.
    pub(crate) fn rules(&self, name: &str) -> &[Vec<String>] {
        self.productions.get(name).map_or(&[], Vec::as_slice)
    }

    /// Whether `name` is a registered nonterminal.
    pub(crate) fn is_nonterminal(&self, name: &str) -> bool {
        self.productions.contains_key(name)
    }

    /// The matcher registered for a terminal name, if any.
    pub(crate) fn matcher(&self, name: &str) -> Option<&Matcher> {
        self.tokens.get(name)
    }

    /// The ordered ignore-terminal names.
    pub(crate) fn ignores(&self) -> &[String] {
        &self.ignores
    }

    /// The emit marking for a whole symbol.
    pub(crate) fn emit_for_symbol(&self, name: &str) -> Option<&Emit> {
        self.emit_symbols.get(name)
    }

    /// The emit marking for one alternative of a nonterminal.
    pub(crate) fn emit_for_rule(&self, name: &str, index: usize) -> Option<&Emit> {
        self.emit_rules.get(name).and_then(|m| m.get(&index))
    }

    /// The emit marking that produced `node`, looked up by the node's
    /// symbol and alternative index.
    pub fn emit_of(&self, node: &Node) -> Option<&Emit> {
        let symbol = node.symbol()?;

        match node.rule() {
            Some(index) => self.emit_for_rule(symbol, index),
            None => self.emit_for_symbol(symbol),
        }
    }
}
