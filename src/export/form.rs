//! Emitter for the macro-processor backend: a FORM program declaring every
//! model symbol and rewriting matched vertices into their algebraic sums.

use super::{coupling_symbol, ExportContext};
use crate::assemble::AssembledVertex;
use crate::expressions::{IndexBook, Name, Syntax};
use crate::model::Model;
use crate::utils::LimitedWidthWriter;
use itertools::Itertools;
use log::debug;
use std::io;

const LINE_WIDTH: usize = 70;
const CONTINUATION_INDENT: usize = 6;

/// Reserved no-op procedure kept for callers that still invoke it.
const VERTEX_CONSTANTS_BLOCK: &str = "\
*---#[ Procedure VertexConstants :
#Procedure VertexConstants
* Just a dummy, all vertex constants are already
* replaced in ReplaceVertices.
*
* This procedure might disappear in any future version
* so don't rely on it.
*
#EndProcedure
*---#] Procedure VertexConstants :
";

/// `Symbol x;` for one name, `Symbols` with a wrapped list otherwise.
fn write_symbol_list<W: io::Write>(
    w: &mut LimitedWidthWriter<W>,
    names: &[Name],
) -> io::Result<()> {
    match names {
        [] => Ok(()),
        [only] => w.raw(&format!("Symbol {};", only)),
        [first, rest @ ..] => {
            w.raw("Symbols")?;
            w.nl()?;
            w.token(first)?;
            for name in rest {
                w.token(",")?;
                w.token(name)?;
            }
            w.token(";")
        }
    }
}

pub fn write_form_file(
    model: &Model,
    vertices: &[AssembledVertex],
    index_book: &IndexBook,
    ctx: &ExportContext,
    out: &mut impl io::Write,
) -> io::Result<()> {
    let mut w = LimitedWidthWriter::with_indent(&mut *out, LINE_WIDTH, CONTINUATION_INDENT);

    w.raw("* This file has been generated from the model files\n")?;
    w.raw(&format!("* in {}\n\n", model.origin))?;

    w.raw("*---#[ Symbol Definitions:\n")?;
    w.raw("*---#[ Fields:\n")?;

    let mut fields: Vec<Name> = Vec::new();
    for p in &model.particles {
        let (part, anti) = p.canonical_field_names();
        let field: Name = format!("[field.{}]", part).into();
        if !fields.contains(&field) {
            fields.push(field);
        }
        if part != anti {
            let field: Name = format!("[field.{}]", anti).into();
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
    }
    write_symbol_list(&mut w, &fields)?;
    w.raw("\n")?;
    w.raw("*---#] Fields:\n")?;
    w.raw("*---#[ Parameters:\n")?;

    let mut params: Vec<Name> = model
        .parameters
        .iter()
        .map(|p| format!("{}{}", ctx.prefix, p.name).into())
        .collect();
    for c in &model.couplings {
        params.push(coupling_symbol(&ctx.prefix, &c.name));
    }
    write_symbol_list(&mut w, &params)?;
    w.raw("\n")?;

    let floats: Vec<Name> = ctx.floats.symbols().cloned().collect();
    match floats.as_slice() {
        [] => {}
        [only] => w.raw(&format!("Symbol {};\n", only))?,
        [first, rest @ ..] => {
            w.raw("Symbols")?;
            w.nl()?;
            w.token(first)?;
            for name in rest {
                w.token(",")?;
                w.token(name)?;
            }
            w.token(";")?;
            w.raw("\n")?;
        }
    }

    w.raw("AutoDeclare Indices ModelDummyIndex, MDLIndex;\n")?;
    w.raw("*---#] Parameters:\n")?;
    w.raw("*---#] Symbol Definitions:\n")?;

    if model.contains_majorana_fermions() {
        w.raw("* Model contains Majorana Fermions:\n")?;
        debug!("You are working with a model that contains Majorana fermions.");
        w.raw("#Define DISCARDQGRAFSIGN \"1\"\n")?;
    }
    w.raw("#Define USEVERTEXPROC \"1\"\n")?;
    w.raw("*---#[ Procedure ReplaceVertices :\n")?;
    w.raw("#Procedure ReplaceVertices\n")?;

    for v in vertices {
        let fold_name = format!("({}) {} Vertex", v.name, v.particle_names.iter().join(" -- "));
        w.raw(&format!("*---#[ {}:\n", fold_name))?;
        w.raw("Identify Once vertex(iv?")?;
        for slot in &v.slots {
            w.raw(&format!(
                ",\n   [field.{}], idx{}?,{},k{}?,idx{}L{}?,{},idx{}C{}?",
                slot.field,
                slot.position + 1,
                slot.spin,
                slot.position + 1,
                slot.position + 1,
                slot.spin.abs(),
                slot.color,
                slot.position + 1,
                slot.color.abs()
            ))?;
        }
        w.raw(") =")?;

        for term in &v.terms {
            w.raw(&format!(
                "\n   + {}",
                coupling_symbol(&ctx.prefix, &term.coupling)
            ))?;
            if let Some(factor) = &term.factor {
                w.raw(" * (")?;
                w.nl()?;
                let mut result = Ok(());
                factor.collect_tokens(Syntax::Form, &mut |tok| {
                    if result.is_ok() {
                        result = w.token(tok);
                    }
                });
                result?;
                w.raw("\n   )")?;
            }
        }
        w.raw(";\n")?;

        if !v.dummies.is_empty() {
            w.raw(&format!("Sum {};\n", v.dummies.iter().join(", ")))?;
        }
        w.raw(&format!("*---#] {}:\n", fold_name))?;
    }

    w.raw("#EndProcedure\n")?;
    w.raw("*---#] Procedure ReplaceVertices :\n")?;
    w.raw("*---#[ Dummy Indices:\n")?;
    for name in index_book.placeholder_names() {
        w.raw(&format!("Index {};\n", name))?;
    }
    w.raw("*---#] Dummy Indices:\n")?;
    w.raw(VERTEX_CONSTANTS_BLOCK)?;

    Ok(())
}
