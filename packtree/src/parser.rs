//! The packrat parsing engine.
//!
//! A top-down recognizer over the grammar's ordered alternatives, memoized
//! per (nonterminal, offset), with support for direct and indirect left
//! recursion via the seed-and-grow algorithm: the first (shortest) parse of
//! a left-recursive nonterminal is planted as a seed and re-parsed against
//! itself until the match stops advancing.

use std::collections::HashMap;
use std::fmt::{self, Display};

use log::{debug, trace};

use crate::grammar::Grammar;
use crate::node::Node;

/// Child nodes collected while matching one production.
type Children = Vec<Node>;

/// Index into [Session::lrs].
type LrId = usize;

/// Index into [Session::head_arena].
type HeadId = usize;

/// A parse failure, reported at the longest offset any rule reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset of the failure.
    offset: usize,
    /// 1-based line of the failure.
    line: usize,
    /// 1-based column of the failure, in characters since the last newline.
    column: usize,
    /// The unconsumed input from the failure offset.
    tail: String,
}

impl ParseError {
    /// Derive line, column and tail from the failure offset.
    pub(crate) fn new(input: &str, offset: usize) -> Self {
        let mut offset = offset.min(input.len());
        while !input.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &input[..offset];

        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(i) => before[i + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };

        ParseError {
            offset,
            line,
            column,
            tail: input[offset..].to_string(),
        }
    }

    /// Byte offset of the failure.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 1-based line of the failure.
    pub fn line(&self) -> usize {
        self.line
    }

    /// 1-based column of the failure.
    pub fn column(&self) -> usize {
        self.column
    }

    /// The unconsumed input from the failure offset.
    pub fn tail(&self) -> &str {
        &self.tail
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {}: Parse error @ >{}<",
            self.line, self.column, self.tail
        )
    }
}

/// Outcome stored in a memo entry.
#[derive(Clone)]
enum Res {
    /// The nonterminal does not match at this offset.
    Fail,
    /// The nonterminal matched, producing these children.
    Match(Children),
    /// The nonterminal is currently being evaluated at this offset; a
    /// reentry means left recursion and takes the sentinel's seed.
    Pending(LrId),
}

/// One memo slot: the outcome and the offset reached.
#[derive(Clone)]
struct Entry {
    /// The stored outcome.
    res: Res,
    /// End offset of the match; equals the start offset on failure.
    pos: usize,
}

/// A left-recursion sentinel, one per in-flight [Session::apply].
struct Lr<'g> {
    /// The nonterminal being evaluated.
    nterm: &'g str,
    /// The initial parse seed.
    seed: Option<Children>,
    /// The head of the recursion this sentinel got drawn into, if any.
    head: Option<HeadId>,
}

/// Per-offset record of a left-recursion cycle being resolved.
struct Head<'g> {
    /// The nonterminal whose seed is growing.
    nterm: &'g str,
    /// Nonterminals involved in the cycle.
    involved: Vec<&'g str>,
    /// Involved nonterminals still eligible for re-evaluation in the
    /// current growth iteration.
    evaluate: Vec<&'g str>,
}

/// State of one `parse` invocation, discarded on return.
struct Session<'g, 'i> {
    /// The grammar being applied.
    grammar: &'g Grammar,
    /// The input being parsed.
    input: &'i str,
    /// Memo table keyed by nonterminal name and offset.
    memo: HashMap<(&'g str, usize), Entry>,
    /// Stack of in-flight sentinels, outermost first.
    lrstack: Vec<LrId>,
    /// Arena backing the sentinels; memo entries and the stack refer into
    /// it by index.
    lrs: Vec<Lr<'g>>,
    /// Offsets at which a seed is currently growing.
    heads: HashMap<usize, HeadId>,
    /// Arena backing the heads.
    head_arena: Vec<Head<'g>>,
}

impl<'g, 'i> Session<'g, 'i> {
    /// Apply nonterminal `nterm` at offset `off`.
    fn apply(&mut self, nterm: &'g str, off: usize) -> (Option<Children>, usize) {
        match self.recall(nterm, off) {
            None => {
                let lr = self.lrs.len();
                self.lrs.push(Lr {
                    nterm,
                    seed: None,
                    head: None,
                });
                self.lrstack.push(lr);

                // Plant a failure sentinel before descending; a reentry
                // through this slot is a left recursion.
                self.memo.insert(
                    (nterm, off),
                    Entry {
                        res: Res::Pending(lr),
                        pos: off,
                    },
                );

                let (res, pos) = self.consume(nterm, off);

                self.lrstack.pop();

                if let Some(entry) = self.memo.get_mut(&(nterm, off)) {
                    entry.pos = pos;
                }

                if self.lrs[lr].head.is_some() {
                    self.lrs[lr].seed = res;
                    self.lr_answer(nterm, off, lr)
                } else {
                    if let Some(entry) = self.memo.get_mut(&(nterm, off)) {
                        entry.res = res.clone().map_or(Res::Fail, Res::Match);
                    }
                    (res, pos)
                }
            }
            Some(entry) => match entry.res {
                Res::Pending(lr) => {
                    self.lr_start(nterm, lr);
                    (self.lrs[lr].seed.clone(), entry.pos)
                }
                Res::Match(children) => (Some(children), entry.pos),
                Res::Fail => (None, entry.pos),
            },
        }
    }

    /// Memo lookup, adjusted while a seed grows at `off`: nonterminals
    /// outside the cycle fail immediately, and involved nonterminals still
    /// on the evaluation list are re-run once per growth iteration.
    fn recall(&mut self, nterm: &'g str, off: usize) -> Option<Entry> {
        let Some(&head) = self.heads.get(&off) else {
            return self.memo.get(&(nterm, off)).cloned();
        };

        if !self.memo.contains_key(&(nterm, off))
            && self.head_arena[head].nterm != nterm
            && !self.head_arena[head].involved.contains(&nterm)
        {
            // Not part of the cycle: fail without polluting the memo.
            return Some(Entry {
                res: Res::Fail,
                pos: off,
            });
        }

        let eligible = self.head_arena[head]
            .evaluate
            .iter()
            .position(|&n| n == nterm);
        if let Some(i) = eligible {
            self.head_arena[head].evaluate.remove(i);

            let (res, pos) = self.consume(nterm, off);
            let entry = self.memo.entry((nterm, off)).or_insert(Entry {
                res: Res::Fail,
                pos: off,
            });
            entry.res = res.map_or(Res::Fail, Res::Match);
            entry.pos = pos;
        }

        self.memo.get(&(nterm, off)).cloned()
    }

    /// A reentry hit the sentinel `lr`: set up (or join) the head and mark
    /// every nonterminal on the stack above it as involved.
    fn lr_start(&mut self, nterm: &'g str, lr: LrId) {
        let head = match self.lrs[lr].head {
            Some(head) => head,
            None => {
                let head = self.head_arena.len();
                self.head_arena.push(Head {
                    nterm,
                    involved: Vec::new(),
                    evaluate: Vec::new(),
                });
                self.lrs[lr].head = Some(head);
                head
            }
        };

        for i in (0..self.lrstack.len()).rev() {
            let frame = self.lrstack[i];
            if self.lrs[frame].head == Some(head) {
                break;
            }

            self.lrs[frame].head = Some(head);
            let involved = self.lrs[frame].nterm;
            self.head_arena[head].involved.push(involved);
        }
    }

    /// A left recursion was detected under `nterm`'s evaluation: either
    /// answer with the seed (when `nterm` is not the head of the cycle) or
    /// grow the seed to its fixed point.
    fn lr_answer(&mut self, nterm: &'g str, off: usize, lr: LrId) -> (Option<Children>, usize) {
        let pos = self.memo.get(&(nterm, off)).map_or(off, |e| e.pos);
        let Some(head) = self.lrs[lr].head else {
            return (self.lrs[lr].seed.clone(), pos);
        };

        if self.head_arena[head].nterm != nterm {
            // An involved nonterminal answers with its seed; its sentinel
            // stays in the memo for the growth pass to re-evaluate.
            return (self.lrs[lr].seed.clone(), pos);
        }

        match self.lrs[lr].seed.take() {
            None => {
                if let Some(entry) = self.memo.get_mut(&(nterm, off)) {
                    entry.res = Res::Fail;
                }
                (None, pos)
            }
            Some(children) => {
                if let Some(entry) = self.memo.get_mut(&(nterm, off)) {
                    entry.res = Res::Match(children);
                }
                self.grow(nterm, off, head)
            }
        }
    }

    /// Grow a seed: re-parse `nterm` at `off` with the current seed
    /// installed, accepting only strictly longer matches, until the result
    /// stops advancing. Each iteration strictly increases the end offset,
    /// bounded by the input length, so growth terminates.
    fn grow(&mut self, nterm: &'g str, off: usize, head: HeadId) -> (Option<Children>, usize) {
        debug!("growing {} at {}", nterm, off);
        self.heads.insert(off, head);

        loop {
            let involved = self.head_arena[head].involved.clone();
            self.head_arena[head].evaluate = involved;

            let (res, pos) = self.consume(nterm, off);
            let current = self.memo.get(&(nterm, off)).map_or(off, |e| e.pos);

            match res {
                Some(children) if pos > current => {
                    if let Some(entry) = self.memo.get_mut(&(nterm, off)) {
                        entry.res = Res::Match(children);
                        entry.pos = pos;
                    }
                }
                _ => break,
            }
        }

        self.heads.remove(&off);

        match self.memo.get(&(nterm, off)) {
            Some(entry) => match &entry.res {
                Res::Match(children) => (Some(children.clone()), entry.pos),
                _ => (None, entry.pos),
            },
            None => (None, off),
        }
    }

    /// Try every alternative of `nterm` in declaration order; the first
    /// that matches wins.
    fn consume(&mut self, nterm: &'g str, off: usize) -> (Option<Children>, usize) {
        trace!("consume {} at {}", nterm, off);
        let grammar = self.grammar;

        'rules: for (count, rule) in grammar.rules(nterm).iter().enumerate() {
            let mut seq = Children::new();
            let mut pos = off;

            for sym in rule {
                pos = self.skip_ignored(pos);

                if let Some(matcher) = grammar.matcher(sym) {
                    let Some(len) = matcher.scan(self.input, pos) else {
                        continue 'rules;
                    };

                    if let Some(emit) = grammar.emit_for_symbol(sym) {
                        let lexeme = &self.input[pos..pos + len];
                        seq.push(Node::leaf(sym, emit.label().map(String::from), lexeme));
                    }

                    pos += len;
                } else if !grammar.is_nonterminal(sym) {
                    // An anonymous literal matches itself.
                    if !self.input[pos..].starts_with(sym.as_str()) {
                        continue 'rules;
                    }

                    pos += sym.len();
                } else {
                    let (res, end) = self.apply(sym, pos);
                    let Some(children) = res else {
                        continue 'rules;
                    };

                    // A per-alternative emit has already wrapped the
                    // reduction and overrides a whole-symbol emit.
                    let wrapped = children.len() == 1
                        && children[0].rule().is_some()
                        && children[0].check(sym);

                    match grammar.emit_for_symbol(sym) {
                        Some(emit) if !wrapped => {
                            let span = &self.input[pos..end];
                            seq.push(Node::interior(
                                sym,
                                emit.label().map(String::from),
                                span,
                                children,
                            ));
                        }
                        _ => seq.extend(children),
                    }

                    pos = end;
                }
            }

            pos = self.skip_ignored(pos);

            if let Some(emit) = grammar.emit_for_rule(nterm, count) {
                seq = vec![Node::alternative(
                    nterm,
                    emit.label().map(String::from),
                    count,
                    seq,
                )];
            }

            return (Some(seq), pos);
        }

        (None, off)
    }

    /// Advance past ignore-terminals: the first one that matches restarts
    /// the scan, and the scan ends on a full pass with no advance.
    /// Skipping never fails.
    fn skip_ignored(&self, mut pos: usize) -> usize {
        loop {
            let mut advanced = false;

            for name in self.grammar.ignores() {
                let matched = self
                    .grammar
                    .matcher(name)
                    .and_then(|m| m.scan(self.input, pos));

                if let Some(len) = matched {
                    pos += len;
                    advanced = true;
                    break;
                }
            }

            if !advanced {
                return pos;
            }
        }
    }
}

impl Grammar {
    /// Parse `input` against the grammar's goal symbol.
    ///
    /// Success requires the goal to derive and the whole input to be
    /// consumed. The parse is a pure function of the grammar and the
    /// input: all memoization state is local to this call.
    ///
    /// # Errors
    ///
    /// Returns a [ParseError] locating the longest advance any rule
    /// achieved.
    pub fn parse(&self, input: &str) -> Result<Node, ParseError> {
        let goal = self.goal_symbol().unwrap_or_default();
        debug!("parsing {} bytes against goal '{}'", input.len(), goal);

        let mut session = Session {
            grammar: self,
            input,
            memo: HashMap::new(),
            lrstack: Vec::new(),
            lrs: Vec::new(),
            heads: HashMap::new(),
            head_arena: Vec::new(),
        };

        let (res, pos) = session.apply(goal, 0);

        let children = match res {
            Some(children) if pos >= input.len() => children,
            _ => {
                let mut last = pos;
                for &(_, off) in session.memo.keys() {
                    if off > last {
                        last = off;
                    }
                }

                return Err(ParseError::new(input, last));
            }
        };

        let wrapped =
            children.len() == 1 && children[0].rule().is_some() && children[0].check(goal);

        match self.emit_for_symbol(goal) {
            Some(emit) if !wrapped => Ok(Node::reduction(
                goal,
                emit.label().map(String::from),
                children,
            )),
            _ => Ok(Node::root(children)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::Grammar;

    #[test]
    fn parse_error_locates_line_and_column() {
        let err = super::ParseError::new("ab\ncd", 4);
        assert_eq!(err.line(), 2);
        assert_eq!(err.column(), 2);
        assert_eq!(err.tail(), "d");
        assert_eq!(err.to_string(), "line 2, column 2: Parse error @ >d<");
    }

    #[test]
    fn ignored_terminals_interleave_between_symbols() {
        let mut g = Grammar::from_rules(&[("pair$", &["INT INT"])]).unwrap();
        g.token("INT", r"\d+").unwrap();
        g.ignore(r"\s+").unwrap();
        g.ignore(r"//[^\n]*").unwrap();
        g.emit("INT").unwrap();

        let ast = g.parse("  1 // noise\n 2  ").unwrap();
        let ints: Vec<_> = ast
            .select("INT")
            .iter()
            .map(|n| n.matched().unwrap().to_string())
            .collect();
        assert_eq!(ints, ["1", "2"]);
    }

    #[test]
    fn anonymous_literals_match_themselves() {
        let mut g = Grammar::from_rules(&[("call$", &["name ( )"])]).unwrap();
        g.token("name", r"\w+").unwrap();
        g.ignore(r"\s+").unwrap();

        assert!(g.parse("f ( )").is_ok());
        assert!(g.parse("f ( ]").is_err());
    }
}
