//! Recursive-descent parser for the textual algebra used by model files.
//!
//! The grammar covers sums, signed products, `**` powers, function calls,
//! integer and float literals (floats keep their source spelling), quoted
//! index placeholders and parentheses.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    Finish, IResult,
};
use thiserror::Error;

use super::{BuiltinSet, Expression, Factor};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed algebraic expression '{input}' near '{at}'")]
pub struct ParseError {
    pub input: String,
    pub at: String,
}

/// Parses `input` into an expression tree. Names listed in `builtins` come
/// back as [`Expression::Builtin`] and are thereby exempt from prefixing.
pub fn parse(input: &str, builtins: &BuiltinSet) -> Result<Expression, ParseError> {
    match all_consuming(terminated(expr, multispace0))(input).finish() {
        Ok((_, parsed)) => Ok(mark_builtins(&parsed, builtins)),
        Err(err) => Err(ParseError {
            input: input.to_owned(),
            at: err.input.chars().take(40).collect(),
        }),
    }
}

fn mark_builtins(expr: &Expression, builtins: &BuiltinSet) -> Expression {
    match expr {
        Expression::Symbol(name) if builtins.contains(name) => Expression::Builtin(name.clone()),
        Expression::Sum(terms) => {
            Expression::Sum(terms.iter().map(|t| mark_builtins(t, builtins)).collect())
        }
        Expression::Product(factors) => Expression::Product(
            factors
                .iter()
                .map(|f| Factor {
                    sign: f.sign,
                    expr: mark_builtins(&f.expr, builtins),
                })
                .collect(),
        ),
        Expression::Neg(term) => Expression::Neg(Box::new(mark_builtins(term, builtins))),
        Expression::Power(base, exp) => Expression::Power(
            Box::new(mark_builtins(base, builtins)),
            Box::new(mark_builtins(exp, builtins)),
        ),
        Expression::Call(head, args) => Expression::Call(
            Box::new(mark_builtins(head, builtins)),
            args.iter().map(|a| mark_builtins(a, builtins)).collect(),
        ),
        leaf => leaf.clone(),
    }
}

fn lex<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    preceded(multispace0, inner)
}

fn expr(input: &str) -> IResult<&str, Expression> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(lex(one_of("+-")), term))(input)?;
    if rest.is_empty() {
        return Ok((input, first));
    }
    let mut terms = Vec::with_capacity(rest.len() + 1);
    terms.push(first);
    for (op, t) in rest {
        terms.push(if op == '-' { Expression::neg(t) } else { t });
    }
    Ok((input, Expression::Sum(terms)))
}

fn term(input: &str) -> IResult<&str, Expression> {
    let (input, first) = signed_factor(input)?;
    let (input, rest) = many0(pair(lex(one_of("*/")), signed_factor))(input)?;
    if rest.is_empty() {
        return Ok((input, first));
    }
    let mut factors = Vec::with_capacity(rest.len() + 1);
    factors.push(Factor::times(first));
    for (op, f) in rest {
        factors.push(if op == '/' {
            Factor::over(f)
        } else {
            Factor::times(f)
        });
    }
    Ok((input, Expression::Product(factors)))
}

fn signed_factor(input: &str) -> IResult<&str, Expression> {
    let (input, signs) = many0(lex(one_of("+-")))(input)?;
    let (input, value) = power(input)?;
    Ok((input, apply_signs(&signs, value)))
}

fn power(input: &str) -> IResult<&str, Expression> {
    let (input, base) = atom(input)?;
    let (input, exp) = opt(preceded(lex(tag("**")), exponent))(input)?;
    Ok((input, match exp {
        Some(e) => Expression::Power(Box::new(base), Box::new(e)),
        None => base,
    }))
}

fn exponent(input: &str) -> IResult<&str, Expression> {
    let (input, signs) = many0(lex(one_of("+-")))(input)?;
    let (input, value) = power(input)?;
    Ok((input, apply_signs(&signs, value)))
}

fn apply_signs(signs: &[char], value: Expression) -> Expression {
    if signs.iter().filter(|c| **c == '-').count() % 2 == 1 {
        Expression::neg(value)
    } else {
        value
    }
}

fn atom(input: &str) -> IResult<&str, Expression> {
    lex(alt((
        float_literal,
        integer_literal,
        string_literal,
        call_or_name,
        parenthesized,
    )))(input)
}

fn parenthesized(input: &str) -> IResult<&str, Expression> {
    delimited(char('('), expr, lex(char(')')))(input)
}

fn exponent_marker(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn float_literal(input: &str) -> IResult<&str, Expression> {
    map(
        alt((
            recognize(tuple((
                digit1,
                char('.'),
                opt(digit1),
                opt(exponent_marker),
            ))),
            recognize(tuple((char('.'), digit1, opt(exponent_marker)))),
            recognize(pair(digit1, exponent_marker)),
        )),
        |text: &str| Expression::Float(text.into()),
    )(input)
}

fn integer_literal(input: &str) -> IResult<&str, Expression> {
    map(
        map_res(digit1, |digits: &str| digits.parse::<i64>()),
        Expression::Integer,
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, Expression> {
    map(
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        |content: &str| Expression::Str(content.into()),
    )(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn call_or_name(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(delimited(
        lex(char('(')),
        separated_list0(lex(char(',')), expr),
        lex(char(')')),
    ))(input)?;
    Ok((input, match args {
        Some(args) => Expression::call(Expression::Symbol(name.into()), args),
        None => Expression::Symbol(name.into()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_trailing_garbage() {
        let err = parse("a+*b", &BuiltinSet::default()).unwrap_err();
        assert!(err.at.starts_with("+*b"));
        assert!(parse("a+", &BuiltinSet::default()).is_err());
    }

    #[test]
    fn whitespace_is_insignificant() {
        let spaced = parse(" a * ( b + c ) ", &BuiltinSet::default()).unwrap();
        let tight = parse("a*(b+c)", &BuiltinSet::default()).unwrap();
        assert_eq!(spaced, tight);
    }

    #[test]
    fn power_binds_tighter_than_product() {
        let expr = parse("2*a**3", &BuiltinSet::default()).unwrap();
        assert_eq!(
            expr,
            Expression::product(vec![
                Expression::integer(2),
                Expression::Power(
                    Box::new(Expression::symbol("a")),
                    Box::new(Expression::integer(3)),
                ),
            ])
        );
    }

    #[test]
    fn negative_exponents() {
        let expr = parse("a**-2", &BuiltinSet::default()).unwrap();
        assert_eq!(expr.render(super::super::Syntax::Python), "a**(-2)");
    }

    #[test]
    fn scientific_notation_is_a_float() {
        assert_eq!(
            parse("1e5", &BuiltinSet::default()).unwrap(),
            Expression::Float("1e5".into())
        );
        assert_eq!(
            parse("2.", &BuiltinSet::default()).unwrap(),
            Expression::Float("2.".into())
        );
    }
}
