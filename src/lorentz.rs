//! Canonicalization of Lorentz tensor structures.
//!
//! Model-level calls like `P`, `Metric` or `Gamma` carry literal particle
//! positions as index arguments. Canonicalization resolves those positions
//! into spin-class-annotated index names (`idx<position>L<spin class>`) and
//! rewrites the calls into the primitives the macro processor understands.
//! Spin classes are `spin − 1`: 0 scalar, 1 fermionic, 2 vector.

use crate::expressions::{Expression, Factor};

/// Heads recognized by the Lorentz canonicalizer. Anything else passes
/// through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LorentzHead {
    Momentum,
    Metric,
    Identity,
    Gamma,
    ProjP,
    ProjM,
}

impl LorentzHead {
    fn recognize(head: &Expression) -> Option<LorentzHead> {
        match head {
            Expression::Symbol(name) => match name.as_str() {
                "P" => Some(LorentzHead::Momentum),
                "Metric" => Some(LorentzHead::Metric),
                "Identity" => Some(LorentzHead::Identity),
                "Gamma" => Some(LorentzHead::Gamma),
                "ProjP" => Some(LorentzHead::ProjP),
                "ProjM" => Some(LorentzHead::ProjM),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Momentum-power degree of a tensor expression: additive over products,
/// max over sum terms, `1` for a momentum insertion, `0` elsewhere.
pub fn rank(expr: &Expression) -> usize {
    match expr {
        Expression::Sum(terms) => terms.iter().map(rank).max().unwrap_or(0),
        Expression::Product(factors) => factors.iter().map(|f| rank(&f.expr)).sum(),
        Expression::Neg(term) => rank(term),
        Expression::Call(head, _) => match LorentzHead::recognize(head) {
            Some(LorentzHead::Momentum) => 1,
            _ => 0,
        },
        _ => 0,
    }
}

/// The synthesized spin index for a literal particle position (1-based).
fn spin_index(position: i64, spins: &[isize]) -> Option<Expression> {
    let class = spins.get(position as usize - 1)? - 1;
    Some(Expression::symbol(&format!("idx{}L{}", position, class)))
}

/// Resolves an index argument: a literal position becomes its spin index and
/// reports the spin class, anything symbolic passes through.
fn resolve_spin_arg(arg: &Expression, spins: &[isize]) -> (Expression, Option<isize>) {
    match arg {
        Expression::Integer(position) if *position > 0 => {
            match spins.get(*position as usize - 1) {
                Some(spin) => (
                    spin_index(*position, spins).unwrap(),
                    Some(spin - 1),
                ),
                None => (arg.clone(), None),
            }
        }
        _ => (arg.clone(), None),
    }
}

fn nc_container(payload: Expression, left: Expression, right: Expression) -> Expression {
    Expression::call(Expression::symbol("NCContainer"), vec![payload, left, right])
}

/// Rewrites a Lorentz structure into index-annotated primitives, given the
/// spins of the participating particles. Idempotent: the output contains no
/// literal position markers.
pub fn canonicalize_lorentz(expr: &Expression, spins: &[isize]) -> Expression {
    match expr {
        Expression::Sum(terms) => Expression::Sum(
            terms
                .iter()
                .map(|t| canonicalize_lorentz(t, spins))
                .collect(),
        ),
        Expression::Product(factors) => Expression::Product(
            factors
                .iter()
                .map(|f| Factor {
                    sign: f.sign,
                    expr: canonicalize_lorentz(&f.expr, spins),
                })
                .collect(),
        ),
        Expression::Neg(term) => Expression::neg(canonicalize_lorentz(term, spins)),
        Expression::Call(head, args) => match LorentzHead::recognize(head) {
            Some(LorentzHead::Momentum) if args.len() == 2 => {
                let (index, _) = resolve_spin_arg(&args[0], spins);
                let momentum = match &args[1] {
                    Expression::Integer(n) => Expression::symbol(&format!("k{}", n)),
                    other => other.clone(),
                };
                // Model momenta are all outgoing, hence the sign flip.
                Expression::neg(Expression::call(momentum, vec![index]))
            }
            Some(LorentzHead::Metric | LorentzHead::Identity) if args.len() == 2 => {
                let (index1, class1) = resolve_spin_arg(&args[0], spins);
                let (index2, class2) = resolve_spin_arg(&args[1], spins);
                if class1 == Some(1) && class2 == Some(1) {
                    nc_container(Expression::one(), index1, index2)
                } else {
                    Expression::call(Expression::symbol("d"), vec![index1, index2])
                }
            }
            Some(LorentzHead::Gamma) if args.len() == 3 => {
                let (index2, _) = resolve_spin_arg(&args[1], spins);
                let (index3, _) = resolve_spin_arg(&args[2], spins);
                if args[0] == Expression::Integer(5) {
                    return nc_container(Expression::symbol("Gamma5"), index2, index3);
                }
                let (index1, _) = resolve_spin_arg(&args[0], spins);
                nc_container(
                    Expression::call(Expression::symbol("Sm"), vec![index1]),
                    index2,
                    index3,
                )
            }
            Some(LorentzHead::ProjM) if args.len() == 2 => {
                let (index1, _) = resolve_spin_arg(&args[0], spins);
                let (index2, _) = resolve_spin_arg(&args[1], spins);
                nc_container(Expression::symbol("ProjMinus"), index1, index2)
            }
            Some(LorentzHead::ProjP) if args.len() == 2 => {
                let (index1, _) = resolve_spin_arg(&args[0], spins);
                let (index2, _) = resolve_spin_arg(&args[1], spins);
                nc_container(Expression::symbol("ProjPlus"), index1, index2)
            }
            _ => expr.clone(),
        },
        _ => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::{parse, BuiltinSet, Syntax};

    fn parse_plain(text: &str) -> Expression {
        parse(text, &BuiltinSet::default()).unwrap()
    }

    #[test]
    fn rank_is_additive_over_products() {
        let a = parse_plain("P(1,2)*P(2,1)");
        assert_eq!(rank(&a), 2);
        let b = parse_plain("P(1,2)*Metric(1,2)");
        assert_eq!(rank(&b), 1);
    }

    #[test]
    fn rank_takes_the_max_over_sum_terms() {
        let expr = parse_plain("Metric(1,2) + P(1,2)*P(2,1) + P(3,1)");
        assert_eq!(rank(&expr), 2);
    }

    #[test]
    fn rank_ignores_negation() {
        let expr = parse_plain("P(1,2)");
        assert_eq!(rank(&Expression::neg(expr.clone())), rank(&expr));
    }

    #[test]
    fn momentum_insertion_flips_sign_and_resolves_the_index() {
        // Participant at position 1 has spin 2, so the index is idx1L1.
        let expr = parse_plain("P(1,2)");
        let canonical = canonicalize_lorentz(&expr, &[2, 2, 3]);
        assert_eq!(canonical.render(Syntax::Form), "-k2(idx1L1)");
    }

    #[test]
    fn metric_between_fermionic_indices_becomes_a_container() {
        let expr = parse_plain("Identity(1,2)");
        let canonical = canonicalize_lorentz(&expr, &[2, 2, 3]);
        assert_eq!(canonical.render(Syntax::Form), "NCContainer(1,idx1L1,idx2L1)");
    }

    #[test]
    fn metric_between_vector_indices_stays_a_metric() {
        let expr = parse_plain("Metric(1,2)");
        let canonical = canonicalize_lorentz(&expr, &[3, 3, 1]);
        assert_eq!(canonical.render(Syntax::Form), "d(idx1L2,idx2L2)");
    }

    #[test]
    fn gamma_and_gamma5() {
        let spins = [2, 2, 3];
        let gamma = canonicalize_lorentz(&parse_plain("Gamma(3,2,1)"), &spins);
        assert_eq!(
            gamma.render(Syntax::Form),
            "NCContainer(Sm(idx3L2),idx2L1,idx1L1)"
        );
        let gamma5 = canonicalize_lorentz(&parse_plain("Gamma(5,2,1)"), &spins);
        assert_eq!(
            gamma5.render(Syntax::Form),
            "NCContainer(Gamma5,idx2L1,idx1L1)"
        );
    }

    #[test]
    fn chiral_projectors() {
        let spins = [2, 2, 1];
        let minus = canonicalize_lorentz(&parse_plain("ProjM(2,1)"), &spins);
        assert_eq!(
            minus.render(Syntax::Form),
            "NCContainer(ProjMinus,idx2L1,idx1L1)"
        );
        let plus = canonicalize_lorentz(&parse_plain("ProjP(2,1)"), &spins);
        assert_eq!(
            plus.render(Syntax::Form),
            "NCContainer(ProjPlus,idx2L1,idx1L1)"
        );
    }

    #[test]
    fn symbolic_indices_pass_through() {
        let expr = parse_plain("Gamma(mu,2,1)");
        let canonical = canonicalize_lorentz(&expr, &[2, 2]);
        assert_eq!(
            canonical.render(Syntax::Form),
            "NCContainer(Sm(mu),idx2L1,idx1L1)"
        );
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let spins = [2, 2, 3];
        for text in [
            "P(1,2)",
            "Gamma(3,2,1) + Gamma(5,2,1)",
            "Metric(1,2)*P(3,1) - 2*Identity(1,2)",
        ] {
            let once = canonicalize_lorentz(&parse_plain(text), &spins);
            let twice = canonicalize_lorentz(&once, &spins);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn unknown_heads_pass_through() {
        let expr = parse_plain("Epsilon(1,2,3,4)");
        assert_eq!(canonicalize_lorentz(&expr, &[3, 3, 3, 3]), expr);
    }
}
