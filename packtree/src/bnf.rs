//! The grammar-description loader.
//!
//! A description string is parsed by a hard-coded meta-grammar, built with
//! the same machinery and parsed by the same engine as any user grammar
//! (the meta-grammar is itself left-recursive). The resulting AST is then
//! walked to assemble the runtime grammar. No separate meta-parser exists.
//!
//! The description language accepts both generations of the original
//! syntax: `@NAME …` / `NAME $ : …` introductions as well as
//! `$ NAME …` terminal definitions and `%goal` / `%emit` / `%noemit` /
//! `%ignore` / `%skip` word flags.

use log::debug;

use crate::grammar::{Error, Grammar};
use crate::node::Node;
use crate::token::Matcher;

/// Build the hard-coded meta-grammar describing the description language.
fn meta_grammar() -> Result<Grammar, Error> {
    let rules: &[(&str, &[&str])] = &[
        ("opt_ident", &["IDENT", ""]),
        ("opt_emit", &["EMIT", ""]),
        (
            "inline",
            &["EMIT opt_ident ( alternation )", "( alternation )"],
        ),
        (
            "symbol",
            &["IDENT", "STRING", "TOKEN", "REGEX", "CCL", "inline"],
        ),
        ("mod_kleene", &["symbol *"]),
        ("mod_positive", &["symbol +"]),
        ("mod_optional", &["symbol ?"]),
        (
            "modifier",
            &["mod_kleene", "mod_positive", "mod_optional", "symbol"],
        ),
        ("sequence", &["sequence modifier", "modifier"]),
        ("prodflag", &["FEMIT", "FNOEMIT"]),
        ("prodflags", &["prodflags prodflag", "prodflag"]),
        (
            "production",
            &["sequence prodflags", "sequence", "prodflags", ""],
        ),
        ("alternation", &["alternation | production", "production"]),
        ("nontermflag", &["GOAL", "FGOAL", "FEMIT", "FNOEMIT"]),
        (
            "nontermflags",
            &["nontermflags nontermflag", "nontermflag", ""],
        ),
        ("nontermdef", &["opt_emit IDENT nontermflags : alternation ;"]),
        ("termsym", &["STRING", "REGEX", "CCL", "IDENT"]),
        ("termflag", &["FEMIT", "IGNORE"]),
        ("termflags", &["termflags termflag", "termflag", ""]),
        (
            "termdef",
            &[
                "opt_emit IDENT termsym termflags ;",
                "GOAL opt_ident termsym termflags ;",
                "IGNORE termsym ;",
            ],
        ),
        ("definition", &["nontermdef", "termdef"]),
        ("definitions", &["definitions definition", "definition"]),
        ("grammar$", &["definitions"]),
    ];

    let mut meta = Grammar::from_rules(rules)?;

    meta.ignore(r"\s+")?;
    meta.ignore(r"//[^\n]*\n")?;
    meta.ignore(r"/\*([^*]|\*[^/])*\*/")?;

    meta.token("IDENT", r"\w+")?;
    meta.token("CCL", r"\[[^\]]*\]")?;
    meta.token("STRING", r"'[^']*'")?;
    meta.token("TOKEN", r#""[^"]*""#)?;
    meta.token("REGEX", r"/(\\.|[^\\/])*/")?;

    meta.token_literal("GOAL", "$")?;
    meta.token_literal("EMIT", "@")?;
    meta.token("FGOAL", "%goal")?;
    meta.token("FEMIT", "%emit")?;
    meta.token("FNOEMIT", "%noemit")?;
    meta.token("IGNORE", "%(ignore|skip)")?;

    for name in [
        "IDENT", "STRING", "TOKEN", "REGEX", "CCL", "GOAL", "EMIT", "FGOAL", "FEMIT", "FNOEMIT",
        "IGNORE",
    ] {
        meta.emit(name)?;
    }

    for name in [
        "inline",
        "mod_kleene",
        "mod_positive",
        "mod_optional",
        "production",
        "nontermdef",
        "termdef",
        "grammar",
    ] {
        meta.emit(name)?;
    }

    Ok(meta)
}

/// Parse a description with the meta-grammar, returning its raw AST.
pub(crate) fn description_ast(description: &str) -> Result<Node, Error> {
    let meta = meta_grammar()?;
    Ok(meta.parse(description)?)
}

/// Build a runtime grammar from a description string.
pub(crate) fn load(description: &str) -> Result<Grammar, Error> {
    let ast = description_ast(description)?;

    let mut grammar = Grammar::empty();
    let mut goal = None;
    let mut last_nonterm = None;

    // Register every nonterminal name up front, so that symbols inside
    // productions classify correctly regardless of definition order and
    // invented helper names cannot collide with later definitions.
    for def in ast.select("nontermdef") {
        if let Some(name) = def.select_nth("IDENT", 0).and_then(Node::matched) {
            grammar.declare(name)?;
        }
    }

    for def in ast.children() {
        if def.check("termdef") {
            build_terminal(&mut grammar, def)?;
        } else if def.check("nontermdef") {
            let name = build_nonterminal(&mut grammar, def)?;

            if def.contains("GOAL") || def.contains("FGOAL") {
                goal = Some(name.clone());
            }
            last_nonterm = Some(name);
        }
    }

    // An explicitly flagged goal wins; otherwise the last nonterminal
    // defined takes the role.
    match goal.or(last_nonterm) {
        Some(goal) => {
            debug!("loaded description with goal '{}'", goal);
            grammar.set_goal(&goal);
            Ok(grammar)
        }
        None => Err(Error::UndefinedGoal),
    }
}

/// Strip the delimiting quote or slash characters off a lexeme.
fn strip_delimiters(text: &str) -> &str {
    if text.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Assemble one terminal definition.
fn build_terminal(grammar: &mut Grammar, def: &Node) -> Result<(), Error> {
    let idents = def.select("IDENT");
    let named = idents.first().and_then(|n| n.matched());

    let (name, matcher) = if let Some(lit) = def.select_nth("STRING", 0).and_then(Node::matched) {
        let name = named.map_or_else(|| grammar.auto_name(), str::to_string);
        (name, Matcher::Literal(strip_delimiters(lit).to_string()))
    } else if let Some(pat) = def.select_nth("REGEX", 0).and_then(Node::matched) {
        let name = named.map_or_else(|| grammar.auto_name(), str::to_string);
        let matcher = Matcher::pattern(strip_delimiters(pat))
            .map_err(|e| Error::BadPattern(name.clone(), e))?;
        (name, matcher)
    } else if let Some(class) = def.select_nth("CCL", 0).and_then(Node::matched) {
        let name = named.map_or_else(|| grammar.auto_name(), str::to_string);
        let matcher =
            Matcher::pattern(class).map_err(|e| Error::BadPattern(name.clone(), e))?;
        (name, matcher)
    } else {
        // The definition itself is an identifier, matched as a literal.
        // With two identifiers the first names the terminal; with one, the
        // terminal is anonymous.
        let definition = idents.last().and_then(|n| n.matched()).unwrap_or_default();
        let name = if idents.len() > 1 {
            named.unwrap_or_default().to_string()
        } else {
            grammar.auto_name()
        };
        (name, Matcher::Literal(definition.to_string()))
    };

    grammar.define_token(&name, matcher)?;

    if def.contains("EMIT") || def.contains("FEMIT") {
        grammar.emit(name.as_str())?;
    }
    if def.contains("IGNORE") {
        grammar.ignore_token(&name);
    }

    Ok(())
}

/// Assemble one nonterminal definition, returning its name.
fn build_nonterminal(grammar: &mut Grammar, def: &Node) -> Result<String, Error> {
    let name = def
        .select_nth("IDENT", 0)
        .and_then(Node::matched)
        .unwrap_or_default()
        .to_string();

    let all_emit =
        (def.contains("EMIT") || def.contains("FEMIT")) && !def.contains("FNOEMIT");
    let emitted = build_alternatives(grammar, &name, &def.select("production"), all_emit)?;
    apply_emits(grammar, &name, emitted)?;

    Ok(name)
}

/// Append the alternatives of `prods` to nonterminal `name`, honoring
/// per-production `%emit`/`%noemit` flags. Returns the emitted alternative
/// indexes.
fn build_alternatives(
    grammar: &mut Grammar,
    name: &str,
    prods: &[&Node],
    all_emit: bool,
) -> Result<Vec<usize>, Error> {
    let mut emitted = Vec::new();

    for (index, prod) in prods.iter().enumerate() {
        let mut sequence = Vec::new();
        let mut emit = all_emit;

        for sym in prod.children() {
            if sym.check("FEMIT") {
                emit = true;
            } else if sym.check("FNOEMIT") {
                emit = false;
            } else {
                sequence.push(build_symbol(grammar, name, sym)?);
            }
        }

        if emit {
            emitted.push(index);
        }
        grammar.push_alternative(name, sequence);
    }

    Ok(emitted)
}

/// Record emit markings for a nonterminal: the whole symbol when every
/// alternative is emitted, otherwise one key per emitted alternative.
fn apply_emits(grammar: &mut Grammar, name: &str, emitted: Vec<usize>) -> Result<(), Error> {
    if emitted.is_empty() {
        return Ok(());
    }

    if emitted.len() == grammar.alternative_count(name) {
        grammar.emit(name)?;
    } else {
        for index in emitted {
            grammar.emit((name, index))?;
        }
    }

    Ok(())
}

/// Resolve one symbol of a production to the name to reference, creating
/// helper nonterminals and auto-named terminals as needed.
fn build_symbol(grammar: &mut Grammar, nonterm: &str, sym: &Node) -> Result<String, Error> {
    let kind = sym.symbol().unwrap_or_default();

    let name = if let Some(modifier) = kind.strip_prefix("mod_") {
        let inner = match sym.children().first() {
            Some(inner) => build_symbol(grammar, nonterm, inner)?,
            None => String::new(),
        };

        let mark = match modifier {
            "kleene" => '*',
            "positive" => '+',
            _ => '?',
        };
        grammar.lower_modifier(nonterm, inner, mark)
    } else if kind == "inline" {
        // Lower the group to a fresh nonterminal; `@(…)` emits it, and
        // `@label(…)` emits it under the label.
        let fresh = grammar.unique_name(nonterm);
        grammar.declare(&fresh)?;

        let emitted = build_alternatives(grammar, &fresh, &sym.select("production"), false)?;
        apply_emits(grammar, &fresh, emitted)?;

        if sym.contains("EMIT") {
            match sym.select_nth("IDENT", 0).and_then(Node::matched) {
                Some(label) => grammar.emit_as(fresh.as_str(), label)?,
                None => grammar.emit(fresh.as_str())?,
            }
        }

        fresh
    } else if kind == "TOKEN" {
        // A double-quoted literal registers itself as an emitted terminal.
        let lit = strip_delimiters(sym.matched().unwrap_or_default()).to_string();

        if grammar.matcher(&lit).is_none() {
            grammar.define_token(&lit, Matcher::Literal(lit.clone()))?;
        }
        grammar.emit(lit.as_str())?;

        lit
    } else if kind == "REGEX" {
        let pat = strip_delimiters(sym.matched().unwrap_or_default());
        let name = grammar.unique_name(&nonterm.to_uppercase());

        let matcher =
            Matcher::pattern(pat).map_err(|e| Error::BadPattern(name.clone(), e))?;
        grammar.define_token(&name, matcher)?;
        grammar.emit(name.as_str())?;

        name
    } else if kind == "CCL" {
        let class = sym.matched().unwrap_or_default();
        let name = grammar.unique_name(&nonterm.to_uppercase());

        let matcher =
            Matcher::pattern(class).map_err(|e| Error::BadPattern(name.clone(), e))?;
        grammar.define_token(&name, matcher)?;

        name
    } else if kind == "STRING" {
        // Single quotes denote an anonymous literal.
        strip_delimiters(sym.matched().unwrap_or_default()).to_string()
    } else {
        sym.matched().unwrap_or_default().to_string()
    };

    Ok(name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The meta-grammar, for the self-hosting law in `crate::test::bnf`.
    pub(crate) fn meta() -> Grammar {
        meta_grammar().unwrap()
    }

    #[test]
    fn meta_grammar_builds() {
        meta();
    }

    #[test]
    fn malformed_descriptions_are_reported() {
        let err = Grammar::from_description("a: b").unwrap_err();
        assert!(matches!(err, Error::Description(_)));
    }

    #[test]
    fn empty_descriptions_have_no_goal() {
        let err = Grammar::from_description("INT /\\d+/;").unwrap_err();
        assert!(matches!(err, Error::UndefinedGoal));
    }
}
