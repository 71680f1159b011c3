//! Expression trees for model-level algebra.
//!
//! Couplings, internal parameters, Lorentz structures and color factors all
//! arrive as textual algebra. They are parsed into an [`Expression`] tree and
//! rewritten structurally; no general simplification is performed beyond the
//! substitutions the exporters ask for.

pub mod parser;

use ahash::AHashSet;
use indexmap::IndexMap;
use smartstring::{LazyCompact, SmartString};
use std::fmt;

pub use parser::{parse, ParseError};

pub type Name = SmartString<LazyCompact>;

/// Whether a product factor multiplies or divides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorSign {
    Times,
    Over,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    pub sign: FactorSign,
    pub expr: Expression,
}

impl Factor {
    pub fn times(expr: Expression) -> Factor {
        Factor {
            sign: FactorSign::Times,
            expr,
        }
    }

    pub fn over(expr: Expression) -> Factor {
        Factor {
            sign: FactorSign::Over,
            expr,
        }
    }
}

/// Rendering convention of the consuming backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// Python-style algebra, `**` for powers.
    Python,
    /// FORM-style algebra, `^` for powers.
    Form,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Integer(i64),
    /// A floating point literal, kept as its source text. Two literals are
    /// equal iff they are spelled identically.
    Float(Name),
    Symbol(Name),
    /// A known function or constant that is exempt from symbol prefixing.
    Builtin(Name),
    /// A quoted placeholder, to be renamed into a dummy index.
    Str(Name),
    Sum(Vec<Expression>),
    Product(Vec<Factor>),
    Neg(Box<Expression>),
    Power(Box<Expression>, Box<Expression>),
    Call(Box<Expression>, Vec<Expression>),
}

/// Names that parse as [`Expression::Builtin`] rather than plain symbols.
#[derive(Debug, Clone, Default)]
pub struct BuiltinSet {
    names: AHashSet<Name>,
}

impl BuiltinSet {
    pub fn from_names<'a, I: IntoIterator<Item = &'a str>>(names: I) -> BuiltinSet {
        BuiltinSet {
            names: names.into_iter().map(Name::from).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Shared table assigning fresh symbolic names to hoisted float literals.
///
/// The mapping is global across one emission pass: the same literal text maps
/// to the same name in every artifact.
#[derive(Debug, Clone)]
pub struct FloatTable {
    prefix: Name,
    names: IndexMap<Name, Name>,
}

impl FloatTable {
    pub fn new(prefix: &str) -> FloatTable {
        FloatTable {
            prefix: prefix.into(),
            names: IndexMap::new(),
        }
    }

    fn name_for(&mut self, literal: &str) -> Name {
        if let Some(name) = self.names.get(literal) {
            return name.clone();
        }
        let name: Name = format!("{}{}", self.prefix, self.names.len() + 1).into();
        self.names.insert(literal.into(), name.clone());
        name
    }

    /// Pairs of (literal text, assigned symbol name), in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Name)> {
        self.names.iter()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Name> {
        self.names.values()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Shared bookkeeping for dummy indices introduced while canonicalizing
/// Lorentz and color structures.
///
/// Placeholder indices come from quoted strings in the source expressions,
/// implicit indices from negative integer markers. Both tables live for a
/// whole emission pass so that repeated structures reuse their names.
#[derive(Debug, Clone, Default)]
pub struct IndexBook {
    placeholders: IndexMap<Name, Name>,
    implicit: IndexMap<i64, Name>,
}

impl IndexBook {
    pub fn new() -> IndexBook {
        IndexBook::default()
    }

    fn placeholder_for(&mut self, tag: &str, content: &str) -> Name {
        if let Some(name) = self.placeholders.get(content) {
            return name.clone();
        }
        let name: Name = format!("{}{}", tag, self.placeholders.len() + 1).into();
        self.placeholders.insert(content.into(), name.clone());
        name
    }

    fn implicit_for(&mut self, prefix: &str, marker: i64) -> Name {
        if let Some(name) = self.implicit.get(&marker) {
            return name.clone();
        }
        let name: Name = format!("{}{}", prefix, marker).into();
        self.implicit.insert(marker, name.clone());
        name
    }

    pub fn placeholder_names(&self) -> impl Iterator<Item = &Name> {
        self.placeholders.values()
    }

    pub fn implicit_names(&self) -> impl Iterator<Item = &Name> {
        self.implicit.values()
    }
}

impl Expression {
    pub fn symbol(name: &str) -> Expression {
        Expression::Symbol(name.into())
    }

    pub fn builtin(name: &str) -> Expression {
        Expression::Builtin(name.into())
    }

    pub fn integer(value: i64) -> Expression {
        Expression::Integer(value)
    }

    pub fn call(head: Expression, args: Vec<Expression>) -> Expression {
        Expression::Call(Box::new(head), args)
    }

    pub fn neg(expr: Expression) -> Expression {
        Expression::Neg(Box::new(expr))
    }

    pub fn product(factors: Vec<Expression>) -> Expression {
        Expression::Product(factors.into_iter().map(Factor::times).collect())
    }

    pub fn one() -> Expression {
        Expression::Integer(1)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expression::Integer(1))
    }

    /// Pre-order rewrite. `f` returning `Some` replaces the whole node and
    /// stops the descent into it.
    fn rewrite<F>(&self, f: &mut F) -> Expression
    where
        F: FnMut(&Expression) -> Option<Expression>,
    {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Expression::Sum(terms) => {
                Expression::Sum(terms.iter().map(|t| t.rewrite(f)).collect())
            }
            Expression::Product(factors) => Expression::Product(
                factors
                    .iter()
                    .map(|fac| Factor {
                        sign: fac.sign,
                        expr: fac.expr.rewrite(f),
                    })
                    .collect(),
            ),
            Expression::Neg(term) => Expression::Neg(Box::new(term.rewrite(f))),
            Expression::Power(base, exp) => {
                Expression::Power(Box::new(base.rewrite(f)), Box::new(exp.rewrite(f)))
            }
            Expression::Call(head, args) => Expression::Call(
                Box::new(head.rewrite(f)),
                args.iter().map(|a| a.rewrite(f)).collect(),
            ),
            leaf => leaf.clone(),
        }
    }

    /// Replaces every structurally equal occurrence of `pattern`.
    pub fn algebraic_substitute(
        &self,
        pattern: &Expression,
        replacement: &Expression,
    ) -> Expression {
        self.rewrite(&mut |node| (node == pattern).then(|| replacement.clone()))
    }

    /// Prefixes every plain symbol, call heads included. Builtins are exempt.
    pub fn prefix_symbols(&self, prefix: &str) -> Expression {
        self.rewrite(&mut |node| match node {
            Expression::Symbol(name) => {
                Some(Expression::Symbol(format!("{}{}", prefix, name).into()))
            }
            _ => None,
        })
    }

    /// Replaces float literals with named constants from `table`, reusing the
    /// name on repeated occurrences of the same literal text.
    pub fn hoist_floats(&self, table: &mut FloatTable) -> Expression {
        self.rewrite(&mut |node| match node {
            Expression::Float(text) => Some(Expression::Symbol(table.name_for(text))),
            _ => None,
        })
    }

    /// Renames quoted string placeholders into `tag<N>` dummy indices,
    /// assigning each distinct string content one name.
    pub fn substitute_placeholder_indices(&self, tag: &str, book: &mut IndexBook) -> Expression {
        self.rewrite(&mut |node| match node {
            Expression::Str(content) => {
                Some(Expression::Symbol(book.placeholder_for(tag, content)))
            }
            _ => None,
        })
    }

    /// Turns negative integer markers in call arguments into named dummy
    /// indices `<prefix><base + n>`, recording them in `book`.
    pub fn resolve_implicit_indices(
        &self,
        base: i64,
        prefix: &str,
        book: &mut IndexBook,
    ) -> Expression {
        match self {
            Expression::Sum(terms) => Expression::Sum(
                terms
                    .iter()
                    .map(|t| t.resolve_implicit_indices(base, prefix, book))
                    .collect(),
            ),
            Expression::Product(factors) => Expression::Product(
                factors
                    .iter()
                    .map(|fac| Factor {
                        sign: fac.sign,
                        expr: fac.expr.resolve_implicit_indices(base, prefix, book),
                    })
                    .collect(),
            ),
            Expression::Neg(term) => Expression::Neg(Box::new(
                term.resolve_implicit_indices(base, prefix, book),
            )),
            Expression::Power(b, e) => Expression::Power(
                Box::new(b.resolve_implicit_indices(base, prefix, book)),
                Box::new(e.resolve_implicit_indices(base, prefix, book)),
            ),
            Expression::Call(head, args) => {
                let args = args
                    .iter()
                    .map(|arg| match arg {
                        Expression::Integer(value) if *value < 0 => {
                            Expression::Symbol(book.implicit_for(prefix, base - value))
                        }
                        Expression::Neg(inner) => match inner.as_ref() {
                            Expression::Integer(value) if *value > 0 => {
                                Expression::Symbol(book.implicit_for(prefix, base + value))
                            }
                            _ => arg.resolve_implicit_indices(base, prefix, book),
                        },
                        _ => arg.resolve_implicit_indices(base, prefix, book),
                    })
                    .collect();
                Expression::Call(
                    Box::new(head.resolve_implicit_indices(base, prefix, book)),
                    args,
                )
            }
            leaf => leaf.clone(),
        }
    }

    /// True iff `name` occurs as a symbol anywhere in the tree.
    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Expression::Symbol(s) => s == name,
            Expression::Sum(terms) => terms.iter().any(|t| t.depends_on(name)),
            Expression::Product(factors) => factors.iter().any(|f| f.expr.depends_on(name)),
            Expression::Neg(term) => term.depends_on(name),
            Expression::Power(b, e) => b.depends_on(name) || e.depends_on(name),
            Expression::Call(head, args) => {
                head.depends_on(name) || args.iter().any(|a| a.depends_on(name))
            }
            _ => false,
        }
    }

    /// Renders the tree in the given backend syntax.
    pub fn render(&self, syntax: Syntax) -> String {
        let mut out = String::new();
        self.collect_tokens(syntax, &mut |tok| out.push_str(tok));
        out
    }

    /// Emits the rendered form as a stream of small tokens, suitable for the
    /// width-limited writers used by the text backends.
    pub fn collect_tokens(&self, syntax: Syntax, sink: &mut impl FnMut(&str)) {
        match self {
            Expression::Integer(value) => sink(&value.to_string()),
            Expression::Float(text) => sink(text),
            Expression::Symbol(name) | Expression::Builtin(name) => sink(name),
            Expression::Str(content) => sink(&format!("'{}'", content)),
            Expression::Sum(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    match term {
                        Expression::Neg(inner) => {
                            sink("-");
                            inner.collect_grouped(syntax, sink, |e| {
                                matches!(e, Expression::Sum(_) | Expression::Neg(_))
                            });
                        }
                        _ => {
                            if i > 0 {
                                sink("+");
                            }
                            term.collect_grouped(syntax, sink, |e| {
                                matches!(e, Expression::Sum(_))
                            });
                        }
                    }
                }
            }
            Expression::Product(factors) => {
                for (i, factor) in factors.iter().enumerate() {
                    match factor.sign {
                        FactorSign::Times => {
                            if i > 0 {
                                sink("*");
                            }
                        }
                        FactorSign::Over => {
                            if i == 0 {
                                sink("1");
                            }
                            sink("/");
                        }
                    }
                    let inverted = factor.sign == FactorSign::Over;
                    // A leading negation reads fine unparenthesized.
                    let guard_neg = i > 0 || inverted;
                    factor.expr.collect_grouped(syntax, sink, |e| {
                        matches!(e, Expression::Sum(_))
                            || (guard_neg && matches!(e, Expression::Neg(_)))
                            || (inverted
                                && matches!(e, Expression::Product(_) | Expression::Power(..)))
                    });
                }
            }
            Expression::Neg(term) => {
                sink("-");
                term.collect_grouped(syntax, sink, |e| {
                    matches!(e, Expression::Sum(_) | Expression::Neg(_))
                });
            }
            Expression::Power(base, exp) => {
                base.collect_grouped(syntax, sink, |e| {
                    matches!(
                        e,
                        Expression::Sum(_)
                            | Expression::Product(_)
                            | Expression::Neg(_)
                            | Expression::Power(..)
                    )
                });
                sink(match syntax {
                    Syntax::Python => "**",
                    Syntax::Form => "^",
                });
                exp.collect_grouped(syntax, sink, |e| {
                    matches!(
                        e,
                        Expression::Sum(_) | Expression::Product(_) | Expression::Neg(_)
                    )
                });
            }
            Expression::Call(head, args) => {
                head.collect_tokens(syntax, sink);
                sink("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        sink(",");
                    }
                    arg.collect_tokens(syntax, sink);
                }
                sink(")");
            }
        }
    }

    fn collect_grouped(
        &self,
        syntax: Syntax,
        sink: &mut impl FnMut(&str),
        needs_parens: impl Fn(&Expression) -> bool,
    ) {
        if needs_parens(self) {
            sink("(");
            self.collect_tokens(syntax, sink);
            sink(")");
        } else {
            self.collect_tokens(syntax, sink);
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Syntax::Python))
    }
}
