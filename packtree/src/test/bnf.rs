//! Tests of the grammar description language and the meta-grammar loader.

use crate::bnf;
use crate::grammar::Grammar;
use crate::node::Node;

/// Whether any node in the subtree was reduced from `symbol`.
fn tree_contains(node: &Node, symbol: &str) -> bool {
    node.check(symbol) || node.children().iter().any(|c| tree_contains(c, symbol))
}

/// The matched lexemes of every leaf, left to right.
fn leaves(node: &Node) -> Vec<String> {
    if node.children().is_empty() {
        return node.matched().map(str::to_string).into_iter().collect();
    }

    node.children().iter().flat_map(leaves).collect()
}

#[test]
fn older_dialect_arithmetic_description() {
    let _ = env_logger::builder().is_test(true).try_init();

    let g = Grammar::from_description(
        "$INT /\\d+/ %emit; f: INT | '(' e ')'; mul %emit: t '*' f; \
         t: mul | f; add %emit: e '+' t; e %goal: add | t;",
    )
    .unwrap();

    let ast = g.parse("1+2*(3+4)+5").unwrap();

    // The goal e is not emitted, so the root is anonymous and holds the
    // e -> add derivation.
    assert!(ast.symbol().is_none());
    assert_eq!(ast.children().len(), 1);

    let outer = &ast.children()[0];
    assert!(outer.check("add"));
    assert_eq!(outer.children().len(), 2);
    assert_eq!(outer.children()[1].matched(), Some("5"));

    // (1 + 2*(3+4))
    let inner = &outer.children()[0];
    assert!(inner.check("add"));
    assert_eq!(inner.children()[0].matched(), Some("1"));

    // 2 * (3+4): parentheses and the unemitted f/t collapse away.
    let mul = &inner.children()[1];
    assert!(mul.check("mul"));
    assert_eq!(mul.children()[0].matched(), Some("2"));
    assert!(mul.children()[1].check("add"));

    assert!(!tree_contains(&ast, "t"));
    assert!(!tree_contains(&ast, "f"));
}

#[test]
fn newer_dialect_uses_marker_characters() {
    let g = Grammar::from_description("@INT /\\d+/; @add: add '+' INT | INT; expr $: add;")
        .unwrap();

    let ast = g.parse("1+2+3").unwrap();
    assert_eq!(leaves(&ast), ["1", "2", "3"]);

    // ((1 + 2) + 3)
    let outer = &ast.children()[0];
    assert!(outer.check("add"));
    assert!(outer.children()[0].check("add"));
    assert_eq!(outer.children()[1].matched(), Some("3"));
}

#[test]
fn skip_and_real_number_description() {
    let g =
        Grammar::from_description("%skip /\\s+/; @REAL /\\d+\\.\\d*|\\d*\\.\\d+/; num: REAL;")
            .unwrap();

    for input in ["3.14", ".5", "3."] {
        let ast = g.parse(input).unwrap();
        let real = &ast.children()[0];
        assert!(real.check("REAL"));
        assert_eq!(real.matched(), Some(input));
    }

    let ast = g.parse("  3.14  ").unwrap();
    assert_eq!(ast.children()[0].matched(), Some("3.14"));

    assert!(g.parse("3").is_err());
}

#[test]
fn comments_are_ignored_between_tokens() {
    let g = Grammar::from_description(
        "// tokens\n@INT /\\d+/;\n/* the goal\n   symbol */\nnum $: INT;",
    )
    .unwrap();

    assert_eq!(leaves(&g.parse("42").unwrap()), ["42"]);
}

#[test]
fn double_quoted_literals_are_auto_emitted() {
    let g = Grammar::from_description("%skip /\\s+/; @WORD /[a-z]+/; stmt $: \"if\" WORD;")
        .unwrap();

    let ast = g.parse("if cond").unwrap();
    let names: Vec<_> = ast
        .children()
        .iter()
        .map(|n| n.name().unwrap().to_string())
        .collect();
    assert_eq!(names, ["if", "WORD"]);
}

#[test]
fn character_classes_define_auto_named_terminals() {
    let g = Grammar::from_description("@C [abc]; v $: C D; D [xyz];").unwrap();

    // C is emitted, D is not.
    let ast = g.parse("bx").unwrap();
    assert_eq!(leaves(&ast), ["b"]);

    assert!(g.parse("dx").is_err());
}

#[test]
fn inline_regex_terminals_are_auto_named_and_emitted() {
    let g = Grammar::from_description("sum $: /\\d+/ '+' /\\d+/;").unwrap();

    let ast = g.parse("1+2").unwrap();
    assert_eq!(leaves(&ast), ["1", "2"]);
}

#[test]
fn unemitted_groups_flatten_into_the_parent() {
    let g = Grammar::from_description("@INT /\\d+/; list $: INT ( ',' INT )*;").unwrap();

    let ast = g.parse("1,2,3").unwrap();
    assert_eq!(leaves(&ast), ["1", "2", "3"]);
    assert_eq!(ast.children().len(), 3);
}

#[test]
fn emitted_groups_become_named_nonterminals() {
    let g = Grammar::from_description("@INT /\\d+/; pair $: INT @( ',' INT );").unwrap();

    let ast = g.parse("1,2").unwrap();
    assert_eq!(ast.children().len(), 2);

    let group = &ast.children()[1];
    assert_eq!(group.symbol(), Some("pair'"));
    assert_eq!(leaves(group), ["2"]);
}

#[test]
fn emitted_groups_accept_a_label() {
    let g = Grammar::from_description("@INT /\\d+/; pair $: INT @rest( ',' INT );").unwrap();

    let ast = g.parse("1,2").unwrap();
    let group = &ast.children()[1];
    assert_eq!(group.symbol(), Some("pair'"));
    assert_eq!(group.name(), Some("rest"));
}

#[test]
fn production_level_emit_flags_mark_single_alternatives() {
    let g = Grammar::from_description("@INT /\\d+/; e %goal: e '+' INT %emit | INT;").unwrap();

    let ast = g.parse("1+2").unwrap();
    let sum = &ast.children()[0];
    assert!(sum.check("e"));
    assert_eq!(sum.rule(), Some(0));
    assert_eq!(leaves(sum), ["1", "2"]);

    // The unmarked alternative stays silent.
    let ast = g.parse("7").unwrap();
    assert!(ast.symbol().is_none());
    assert_eq!(ast.children().len(), 1);
    assert!(ast.children()[0].check("INT"));
}

#[test]
fn duplicate_definitions_are_rejected() {
    use crate::grammar::Error;

    let err = Grammar::from_description("@INT /\\d+/; @INT /\\d+/; n $: INT;").unwrap_err();
    assert!(matches!(err, Error::MultipleDefinition(_)));

    let err = Grammar::from_description("a $: 'x'; a: 'y';").unwrap_err();
    assert!(matches!(err, Error::MultipleDefinition(_)));
}

/// The meta-grammar, written in its own description language.
const META_DESCRIPTION: &str = r#"
// lexical definitions
@IDENT /\w+/;
@CCL /\[[^\]]*\]/;
@STRING /'[^']*'/;
@TOKEN /"[^"]*"/;
@REGEX /\/(\\.|[^\\\/])*\//;
@GOAL '$';
@EMIT '@';
@FGOAL /%goal/;
@FEMIT /%emit/;
@FNOEMIT /%noemit/;
@IGNORE /%(ignore|skip)/;
%skip /\s+/;
%skip /\/\/[^\n]*\n/;
%skip /\/\*([^*]|\*[^\/])*\*\//;

opt_ident: IDENT | ;
opt_emit: EMIT | ;
@inline: EMIT opt_ident '(' alternation ')' | '(' alternation ')';
symbol: IDENT | STRING | TOKEN | REGEX | CCL | inline;
@mod_kleene: symbol '*';
@mod_positive: symbol '+';
@mod_optional: symbol '?';
modifier: mod_kleene | mod_positive | mod_optional | symbol;
sequence: sequence modifier | modifier;
prodflag: FEMIT | FNOEMIT;
prodflags: prodflags prodflag | prodflag;
@production: sequence prodflags | sequence | prodflags | ;
alternation: alternation '|' production | production;
nontermflag: GOAL | FGOAL | FEMIT | FNOEMIT;
nontermflags: nontermflags nontermflag | nontermflag | ;
@nontermdef: opt_emit IDENT nontermflags ':' alternation ';';
termsym: STRING | REGEX | CCL | IDENT;
termflag: FEMIT | IGNORE;
termflags: termflags termflag | termflag | ;
@termdef: opt_emit IDENT termsym termflags ';'
        | GOAL opt_ident termsym termflags ';'
        | IGNORE termsym ';';
definition: nontermdef | termdef;
definitions: definitions definition | definition;
@grammar $: definitions;
"#;

#[test]
fn the_meta_grammar_hosts_itself() {
    let _ = env_logger::builder().is_test(true).try_init();

    // Loading the meta-grammar written in its own language yields a
    // grammar that parses that description exactly like the built-in one.
    let loaded = Grammar::from_description(META_DESCRIPTION).unwrap();

    let through_loaded = loaded.parse(META_DESCRIPTION).unwrap();
    let through_builtin = bnf::tests::meta().parse(META_DESCRIPTION).unwrap();

    assert_eq!(through_loaded, through_builtin);
}
