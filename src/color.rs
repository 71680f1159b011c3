//! Canonicalization of SU(N) color structures.
//!
//! Literal particle positions in `T`, `f` and `Identity` calls are resolved
//! into color-class-annotated index names (`idx<position>C<|class|>`). The
//! position remap `xidx` is decided at the vertex level (fermion-line flip)
//! and must match the emitted field order. Generators additionally get a
//! fixed argument-order convention: (adjoint, antifundamental, fundamental).

use crate::expressions::{Expression, Factor, Name};
use thiserror::Error;

/// A generator call whose resolved argument classes match neither accepted
/// canonical ordering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot recognize color assignment at vertex: {pattern:?}")]
pub struct ColorPatternError {
    pub pattern: [isize; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorHead {
    Generator,
    StructureConstant,
    Identity,
}

impl ColorHead {
    fn recognize(head: &Expression) -> Option<ColorHead> {
        match head {
            Expression::Symbol(name) => match name.as_str() {
                "T" => Some(ColorHead::Generator),
                "f" => Some(ColorHead::StructureConstant),
                "Identity" => Some(ColorHead::Identity),
                _ => None,
            },
            _ => None,
        }
    }
}

fn color_index(position: usize, class: isize) -> Expression {
    let name: Name = format!("idx{}C{}", position, class.abs()).into();
    Expression::Symbol(name)
}

/// Rewrites a color factor into index-annotated primitives.
///
/// `colors` lists the signed color classes of the vertex legs in emission
/// (flipped) order, `xidx` is the vertex position remap applied to literal
/// generator and structure-constant arguments.
pub fn canonicalize_color(
    expr: &Expression,
    colors: &[isize],
    xidx: &[usize],
) -> Result<Expression, ColorPatternError> {
    match expr {
        Expression::Sum(terms) => Ok(Expression::Sum(
            terms
                .iter()
                .map(|t| canonicalize_color(t, colors, xidx))
                .collect::<Result<_, _>>()?,
        )),
        Expression::Product(factors) => Ok(Expression::Product(
            factors
                .iter()
                .map(|f| {
                    Ok(Factor {
                        sign: f.sign,
                        expr: canonicalize_color(&f.expr, colors, xidx)?,
                    })
                })
                .collect::<Result<_, ColorPatternError>>()?,
        )),
        Expression::Neg(term) => Ok(Expression::neg(canonicalize_color(term, colors, xidx)?)),
        Expression::Call(head, args) => match ColorHead::recognize(head) {
            Some(kind @ (ColorHead::Generator | ColorHead::StructureConstant))
                if args.len() == 3 =>
            {
                let mut indices = Vec::with_capacity(3);
                let mut order = [0isize; 3];
                for (slot, arg) in args.iter().enumerate() {
                    match arg {
                        Expression::Integer(position)
                            if *position > 0 && (*position as usize) <= xidx.len() =>
                        {
                            let x = xidx[*position as usize - 1];
                            order[slot] = colors[x];
                            indices.push(color_index(x + 1, colors[x]));
                        }
                        other => {
                            indices.push(other.clone());
                        }
                    }
                }
                if kind == ColorHead::StructureConstant {
                    return Ok(Expression::Call(head.clone(), indices));
                }
                // A generator leg on a colorless slot stands in for the
                // missing (anti)fundamental one.
                if order == [8, -3, 0] {
                    order[2] = 3;
                } else if order == [8, 0, 3] {
                    order[1] = -3;
                }
                if order == [8, -3, 3] {
                    Ok(Expression::Call(head.clone(), indices))
                } else if order == [8, 3, -3] {
                    indices.swap(1, 2);
                    Ok(Expression::Call(head.clone(), indices))
                } else {
                    Err(ColorPatternError { pattern: order })
                }
            }
            Some(ColorHead::Identity) if args.len() == 2 => {
                let resolved = args
                    .iter()
                    .map(|arg| match arg {
                        Expression::Integer(position)
                            if *position > 0 && (*position as usize) <= colors.len() =>
                        {
                            color_index(
                                *position as usize,
                                colors[*position as usize - 1],
                            )
                        }
                        other => other.clone(),
                    })
                    .collect();
                Ok(Expression::Call(
                    Box::new(Expression::symbol("d_")),
                    resolved,
                ))
            }
            _ => Ok(expr.clone()),
        },
        _ => Ok(expr.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::{parse, BuiltinSet, Syntax};

    fn parse_plain(text: &str) -> Expression {
        parse(text, &BuiltinSet::default()).unwrap()
    }

    const NO_FLIP: [usize; 3] = [0, 1, 2];

    #[test]
    fn generator_in_canonical_order_is_kept() {
        // (antifundamental, fundamental, adjoint) legs, T(adjoint, anti, fund).
        let expr = parse_plain("T(3,1,2)");
        let canonical = canonicalize_color(&expr, &[-3, 3, 8], &NO_FLIP).unwrap();
        assert_eq!(canonical.render(Syntax::Form), "T(idx3C8,idx1C3,idx2C3)");
    }

    #[test]
    fn generator_with_swapped_fermion_legs_is_reordered() {
        let expr = parse_plain("T(3,2,1)");
        let canonical = canonicalize_color(&expr, &[-3, 3, 8], &NO_FLIP).unwrap();
        // Resolved order is (8, 3, -3); the last two indices swap.
        assert_eq!(canonical.render(Syntax::Form), "T(idx3C8,idx1C3,idx2C3)");
    }

    #[test]
    fn generator_with_a_dummy_leg_is_completed() {
        // Third argument already symbolic: the class triple reads (8,-3,0)
        // and is treated as (8,-3,3).
        let expr = parse_plain("T(3,1,s)");
        let canonical = canonicalize_color(&expr, &[-3, 3, 8], &NO_FLIP).unwrap();
        assert_eq!(canonical.render(Syntax::Form), "T(idx3C8,idx1C3,s)");
        let expr = parse_plain("T(3,s,2)");
        let canonical = canonicalize_color(&expr, &[-3, 3, 8], &NO_FLIP).unwrap();
        assert_eq!(canonical.render(Syntax::Form), "T(idx3C8,s,idx2C3)");
    }

    #[test]
    fn unrecognized_generator_pattern_is_fatal() {
        let expr = parse_plain("T(1,2,3)");
        let err = canonicalize_color(&expr, &[-3, 3, 8], &NO_FLIP).unwrap_err();
        assert_eq!(err.pattern, [-3, 3, 8]);
    }

    #[test]
    fn structure_constants_keep_their_argument_order() {
        let expr = parse_plain("f(2,1,3)");
        let canonical = canonicalize_color(&expr, &[8, 8, 8], &NO_FLIP).unwrap();
        assert_eq!(canonical.render(Syntax::Form), "f(idx2C8,idx1C8,idx3C8)");
    }

    #[test]
    fn identity_becomes_a_color_delta() {
        let expr = parse_plain("Identity(1,2)");
        let canonical = canonicalize_color(&expr, &[3, -3, 1], &NO_FLIP).unwrap();
        assert_eq!(canonical.render(Syntax::Form), "d_(idx1C3,idx2C3)");
    }

    #[test]
    fn vertex_flip_remaps_generator_positions() {
        // With slots 0 and 1 swapped, argument 1 resolves through xidx to
        // slot 1 and argument 2 to slot 0.
        let expr = parse_plain("T(3,1,2)");
        let canonical = canonicalize_color(&expr, &[3, -3, 8], &[1, 0, 2]).unwrap();
        assert_eq!(canonical.render(Syntax::Form), "T(idx3C8,idx2C3,idx1C3)");
    }

    #[test]
    fn products_and_sums_recurse() {
        let expr = parse_plain("f(-1,1,2)*f(-1,3,4)");
        let mut book = crate::expressions::IndexBook::new();
        let expr = expr.resolve_implicit_indices(0, "MDLIndex", &mut book);
        let canonical = canonicalize_color(&expr, &[8, 8, 8, 8], &[0, 1, 2, 3]).unwrap();
        assert_eq!(
            canonical.render(Syntax::Form),
            "f(MDLIndex1,idx1C8,idx2C8)*f(MDLIndex1,idx3C8,idx4C8)"
        );
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let expr = parse_plain("T(3,1,2)");
        let once = canonicalize_color(&expr, &[-3, 3, 8], &NO_FLIP).unwrap();
        let twice = canonicalize_color(&once, &[-3, 3, 8], &NO_FLIP).unwrap();
        assert_eq!(once, twice);
    }
}
