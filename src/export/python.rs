//! Emitter for the data-structure backend: a Python module of mapping
//! literals describing particles, functions, parameters and input locations.

use super::{coupling_symbol, is_zero_reference, ExportContext, ExportError};
use crate::expressions::{parse, BuiltinSet, Expression, Name, Syntax};
use crate::model::{Model, ParameterNature, ParameterType};
use crate::utils::py_repr;
use indexmap::IndexMap;
use log::info;
use std::io;

/// Line styles of the drawing backend, keyed by the model-level tag.
const LINE_STYLES: &[(&str, &str)] = &[
    ("straight", "fermion"),
    ("wavy", "photon"),
    ("curly", "gluon"),
    ("dashed", "scalar"),
    ("dotted", "ghost"),
];

/// Functions and constants reachable under the `cmath.` qualifier.
const CMATH_FUNCTIONS: &[&str] = &[
    "exp", "log", "sqrt", "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh",
    "asinh", "acosh", "atanh", "pi", "e",
];

/// Function shortcuts understood by the downstream evaluator.
const SHORTCUT_FUNCTIONS: &[&str] = &[
    "re", "im", "sec", "csc", "asec", "acsc", "complexconjugate", "complex", "if",
];

/// Symbols that stay unprefixed because the downstream code defines them.
const UNPREFIXED_SYMBOLS: &[&str] = &["Nf", "Nfgen", "Nfrat"];

fn value_builtins() -> BuiltinSet {
    BuiltinSet::from_names(
        CMATH_FUNCTIONS
            .iter()
            .chain(SHORTCUT_FUNCTIONS)
            .chain(UNPREFIXED_SYMBOLS)
            .chain(["i_"].iter())
            .copied(),
    )
}

/// Strips the `cmath.` qualifier, the way the downstream grammar expects
/// these functions to be spelled.
fn fold_cmath(text: &str) -> String {
    let mut folded = text.to_owned();
    for name in CMATH_FUNCTIONS {
        folded = folded.replace(&format!("cmath.{}", name), name);
    }
    folded
}

fn line_style(tag: Option<&str>) -> &'static str {
    let tag = tag.map(|t| t.to_lowercase()).unwrap_or_default();
    LINE_STYLES
        .iter()
        .find(|(key, _)| *key == tag)
        .map(|(_, style)| *style)
        .unwrap_or("scalar")
}

/// Python `str()` of a float value.
fn py_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

enum PyValue {
    Lit(&'static str),
    Real(f64),
    Pair(f64, f64),
}

impl PyValue {
    fn render(&self) -> String {
        match self {
            PyValue::Lit(text) => py_repr(text),
            PyValue::Real(value) => py_repr(&py_float(*value)),
            PyValue::Pair(re, im) => {
                format!("[{}, {}]", py_repr(&py_float(*re)), py_repr(&py_float(*im)))
            }
        }
    }
}

/// One `name = { ... }` mapping literal.
struct PyDict<'w, W: io::Write> {
    out: &'w mut W,
    first: bool,
}

impl<'w, W: io::Write> PyDict<'w, W> {
    fn open(out: &'w mut W, name: &str) -> io::Result<PyDict<'w, W>> {
        write!(out, "{} = {{", name)?;
        Ok(PyDict { out, first: true })
    }

    fn entry(&mut self, content: &str) -> io::Result<()> {
        if self.first {
            self.first = false;
            writeln!(self.out)?;
        } else {
            writeln!(self.out, ",")?;
        }
        write!(self.out, "\t{}", content)
    }

    fn close(self) -> io::Result<()> {
        write!(self.out, "\n}}\n\n")
    }
}

pub fn write_python_file(
    model: &Model,
    ctx: &mut ExportContext,
    out: &mut impl io::Write,
) -> Result<(), ExportError> {
    let prefix = ctx.prefix.clone();

    writeln!(out, "# This file has been generated from the model files")?;
    writeln!(out, "# in {}", model.origin)?;
    writeln!(out, "from feynforge.model.particle import Particle")?;
    writeln!(out, "\nmodel_name = {}\n", py_repr(&model.name))?;

    info!("      Generating particle list ...");

    let mut mnemonics: IndexMap<Name, Name> = IndexMap::new();
    let mut latex_names: IndexMap<Name, Name> = IndexMap::new();
    let mut line_styles: IndexMap<Name, &'static str> = IndexMap::new();

    let mut particles = PyDict::open(out, "particles")?;
    for p in &model.particles {
        let (canonical_name, canonical_anti) = p.canonical_field_names();
        mnemonics.insert(p.name.clone(), canonical_name.clone());
        latex_names.insert(canonical_name.clone(), p.texname.clone());
        line_styles.insert(canonical_name.clone(), line_style(p.line.as_deref()));

        let mass = if is_zero_reference(&p.mass.name) {
            "0".to_owned()
        } else {
            py_repr(&format!("{}{}", prefix, p.mass.name))
        };
        let width = if is_zero_reference(&p.width.name) {
            py_repr("0")
        } else {
            py_repr(&format!("{}{}", prefix, p.width.name))
        };
        let mut spin = p.spin.abs() - 1;
        if canonical_name.starts_with("anti") {
            spin = -spin;
        }

        particles.entry(&format!(
            "{}: Particle({}, {}, {}, {}, {}, {}, {})",
            py_repr(&canonical_name),
            py_repr(&canonical_name),
            spin,
            mass,
            p.color,
            py_repr(&canonical_anti),
            width,
            p.pdg_code,
        ))?;
    }
    particles.close()?;

    let mut block = PyDict::open(out, "mnemonics")?;
    for (key, value) in &mnemonics {
        block.entry(&format!("{}: particles[{}]", py_repr(key), py_repr(value)))?;
    }
    block.close()?;

    let mut block = PyDict::open(out, "latex_names")?;
    for (key, value) in &latex_names {
        block.entry(&format!("{}: {}", py_repr(key), py_repr(value)))?;
    }
    block.close()?;

    let mut block = PyDict::open(out, "line_styles")?;
    for (key, value) in &line_styles {
        block.entry(&format!("{}: {}", py_repr(key), py_repr(value)))?;
    }
    block.close()?;

    let mut parameters: IndexMap<Name, PyValue> = IndexMap::new();
    let mut functions: IndexMap<Name, Name> = IndexMap::new();
    let mut types: IndexMap<Name, &'static str> = IndexMap::new();
    let mut slha_locations: IndexMap<Name, (Name, Vec<usize>)> = IndexMap::new();

    for p in &model.parameters {
        let name: Name = format!("{}{}", prefix, p.name).into();
        match p.nature {
            ParameterNature::External => {
                let value = p.value.unwrap_or_default();
                parameters.insert(
                    name.clone(),
                    match p.parameter_type {
                        ParameterType::Complex => PyValue::Pair(value.re, value.im),
                        ParameterType::Real => PyValue::Real(value.re),
                    },
                );
                slha_locations.insert(
                    name.clone(),
                    (
                        p.lhablock.clone().unwrap_or_default(),
                        p.lhacode.clone().unwrap_or_default(),
                    ),
                );
            }
            ParameterNature::Internal => {
                functions.insert(name.clone(), p.expression.clone().unwrap_or_else(|| "0".into()));
            }
        }
        types.insert(
            name,
            match p.parameter_type {
                ParameterType::Real => "R",
                ParameterType::Complex => "C",
            },
        );
    }

    parameters.insert("NC".into(), PyValue::Lit("3.0"));
    types.insert("NC".into(), "R");
    parameters.insert("Nf".into(), PyValue::Lit("5.0"));
    types.insert("Nf".into(), "R");
    parameters.insert("Nfgen".into(), PyValue::Lit("-1.0"));
    types.insert("Nfgen".into(), "R");

    functions.insert("Nfrat".into(), "if(Nfgen,Nf/Nfgen,1)".into());
    types.insert("Nfrat".into(), "R");

    for c in &model.couplings {
        let name = coupling_symbol(&prefix, &c.name);
        functions.insert(name.clone(), c.expression.clone());
        types.insert(name, "C");
    }

    info!("      Generating function list ...");

    let builtins = value_builtins();
    let imaginary_unit = Expression::builtin("i_");
    let imaginary_pattern = Expression::call(
        Expression::builtin("complex"),
        vec![Expression::integer(0), Expression::integer(1)],
    );

    let mut block = PyDict::open(out, "functions")?;
    for (name, value) in &functions {
        let expr = parse(&fold_cmath(value), &builtins)?
            .prefix_symbols(&prefix)
            .hoist_floats(&mut ctx.floats)
            .algebraic_substitute(&imaginary_pattern, &imaginary_unit);
        block.entry(&format!(
            "{}: '{}'",
            py_repr(name),
            expr.render(Syntax::Python)
        ))?;
    }
    block.close()?;

    let mut block = PyDict::open(out, "parameters")?;
    for (literal, name) in ctx.floats.iter() {
        block.entry(&format!("{}: {}", py_repr(name), py_repr(literal)))?;
    }
    for (name, value) in &parameters {
        block.entry(&format!("{}: {}", py_repr(name), value.render()))?;
    }
    block.close()?;

    let mut block = PyDict::open(out, "latex_parameters")?;
    for p in &model.parameters {
        block.entry(&format!(
            "{}: {}",
            py_repr(&format!("{}{}", prefix, p.name)),
            py_repr(&p.texname)
        ))?;
    }
    block.close()?;

    let mut block = PyDict::open(out, "types")?;
    for name in ctx.floats.symbols() {
        block.entry(&format!("{}: 'RP'", py_repr(name)))?;
    }
    for (name, type_tag) in &types {
        block.entry(&format!("{}: {}", py_repr(name), py_repr(type_tag)))?;
    }
    block.close()?;

    let mut block = PyDict::open(out, "slha_locations")?;
    for (name, (lhablock, lhacode)) in &slha_locations {
        block.entry(&format!(
            "{}: ({}, {:?})",
            py_repr(name),
            py_repr(lhablock),
            lhacode
        ))?;
    }
    block.close()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmath_qualifiers_fold_without_clobbering_longer_names() {
        assert_eq!(fold_cmath("cmath.sqrt(2)"), "sqrt(2)");
        assert_eq!(fold_cmath("cmath.asinh(x)+cmath.pi"), "asinh(x)+pi");
        assert_eq!(fold_cmath("cmath.exp(cmath.e)"), "exp(e)");
    }

    #[test]
    fn float_values_render_like_python() {
        assert_eq!(py_float(173.0), "173.0");
        assert_eq!(py_float(0.118), "0.118");
        assert_eq!(py_float(-1.0), "-1.0");
    }

    #[test]
    fn unknown_line_styles_default_to_scalar() {
        assert_eq!(line_style(Some("curly")), "gluon");
        assert_eq!(line_style(Some("Swavy")), "scalar");
        assert_eq!(line_style(None), "scalar");
    }
}
