//! Emitter for the diagram-generator backend: the QGraf model file listing
//! propagators and vertices, and the control card driving one QGraf run.

use super::{is_zero_reference, MODEL_PREFIX};
use crate::assemble::AssembledVertex;
use crate::expressions::Name;
use crate::model::Model;
use crate::utils::{py_repr, LimitedWidthWriter};
use itertools::Itertools;
use std::io;

const LINE_WIDTH: usize = 70;

/// Breaks an over-long origin path into continuation comment lines.
fn wrap_origin(origin: &str) -> String {
    let chars: Vec<char> = origin.chars().collect();
    let mut pieces = Vec::new();
    let mut rest = &chars[..];
    while rest.len() > 70 {
        pieces.push(rest[..69].iter().collect::<String>());
        rest = &rest[69..];
    }
    pieces.push(rest.iter().collect::<String>());
    pieces.join("\\\n% ")
}

pub fn write_model_file(
    model: &Model,
    vertices: &[AssembledVertex],
    out: &mut impl io::Write,
) -> io::Result<()> {
    writeln!(out, "% vim: syntax=none\n")?;
    writeln!(out, "% This file has been generated from the model files")?;
    writeln!(out, "% in {}", wrap_origin(&model.origin))?;
    writeln!(out, "[ model = '{}' ]\n", model.name)?;
    writeln!(out, "[ fmrules = '{}' ]\n", model.name)?;

    writeln!(out, "%---#[ Propagators:")?;
    for p in &model.particles {
        if p.pdg_code < 0 {
            continue;
        }
        writeln!(
            out,
            "% {} -- {} Propagator (PDG: {})",
            p.name, p.antiname, p.pdg_code
        )?;

        let (field, afield) = p.canonical_field_names();
        let mass_is_zero = is_zero_reference(&p.mass.name);
        let mass = if mass_is_zero {
            "0".to_owned()
        } else {
            format!("{}{}", MODEL_PREFIX, p.mass.name)
        };
        let width = if is_zero_reference(&p.width.name) {
            "0".to_owned()
        } else {
            format!("{}{}", MODEL_PREFIX, p.width.name)
        };

        let (sign, options) = if p.spin % 2 == 1 {
            let sign = match p.ghost_number {
                Some(1) => "-",
                _ => "+",
            };
            // Massless bosons cannot sit on a tadpole line.
            let options = if mass_is_zero { ", notadpole" } else { "" };
            (sign, options)
        } else {
            ("-", "")
        };
        let aux = if p.propagating { "+0" } else { "+1" };
        let conj = if p.self_conjugate {
            "('+')"
        } else {
            "('+','-')"
        };

        writeln!(
            out,
            "[{},{},{}{};TWOSPIN='{}',COLOR='{}',",
            field,
            afield,
            sign,
            options,
            p.spin.abs() - 1,
            p.color.abs()
        )?;
        writeln!(out, "    MASS='{}', WIDTH='{}',", mass, width)?;
        writeln!(out, "    AUX='{}', CONJ={}]", aux, conj)?;
    }
    writeln!(out, "%---#] Propagators:")?;

    writeln!(out, "%---#[ Vertices:")?;
    let mut w = LimitedWidthWriter::new(&mut *out, LINE_WIDTH);
    for v in vertices {
        w.raw(&format!(
            "% {}: {} Vertex",
            v.name,
            v.particle_names.iter().join(" -- ")
        ))?;
        w.nl()?;
        w.token("[")?;
        for (i, slot) in v.slots.iter().enumerate() {
            if i > 0 {
                w.token(",")?;
            }
            w.token(&slot.field)?;
        }
        w.token(";")?;
        for (i, (name, power)) in v.orders.iter().enumerate() {
            if i > 0 {
                w.token(",")?;
            }
            w.token(&format!("{}='{}'", name, power))?;
        }
        w.token("]")?;
        w.nl()?;
    }
    writeln!(out, "%---#] Vertices:\n")?;

    Ok(())
}

/// Input for one QGraf control card.
#[derive(Debug, Clone)]
pub struct ControlCard {
    pub output: Name,
    pub style: Name,
    pub model: Name,
    pub in_particles: Vec<Name>,
    pub out_particles: Vec<Name>,
    pub loops: usize,
    pub options: Vec<Name>,
    /// Propagator selections and other directives, passed through verbatim
    /// after statement splitting.
    pub verbatim: String,
    /// Renormalization particle restricting every propagator, one-loop only.
    pub reno_particle: Option<Name>,
}

/// Re-flows verbatim option text so that every `;`-terminated statement
/// sits on its own line.
pub fn format_verbatim(text: &str) -> String {
    let mut result = Vec::new();
    for line in text.lines() {
        let mut rest = line;
        while let Some(pos) = rest.find(';') {
            result.push(rest[..=pos].to_owned());
            rest = &rest[pos + 1..];
        }
        result.push(rest.to_owned());
    }
    result.join("\n")
}

/// Writes the `qgraf.dat` grammar for one run.
pub fn write_control_card(card: &ControlCard, out: &mut impl io::Write) -> io::Result<()> {
    assert!(
        card.reno_particle.is_none() || card.loops == 1,
        "a renormalization particle requires a one-loop run"
    );

    writeln!(out, "output = {};", py_repr(&card.output))?;
    writeln!(out, "style = {};", py_repr(&card.style))?;
    writeln!(out, "model = {};", py_repr(&card.model))?;

    let mut ki = 0;
    write!(out, "in = ")?;
    for (i, p) in card.in_particles.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        ki += 1;
        write!(out, "{}[k{}]", p, ki)?;
    }
    writeln!(out, ";")?;

    write!(out, "out = ")?;
    for (i, p) in card.out_particles.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        ki += 1;
        write!(out, "{}[k{}]", p, ki)?;
    }
    writeln!(out, ";")?;

    writeln!(out, "loops={};\nloop_momentum=p;", card.loops)?;
    writeln!(out, "options={};", card.options.iter().join(", "))?;
    if let Some(reno) = &card.reno_particle {
        writeln!(out, "true=iprop[{},1,1];", reno)?;
    }
    out.write_all(card.verbatim.as_bytes())?;
    writeln!(out, "\n%------- EOF ----------")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbatim_statements_each_get_a_line() {
        assert_eq!(
            format_verbatim("true=iprop[U,0,0];true=iprop[D,0,0];"),
            "true=iprop[U,0,0];\ntrue=iprop[D,0,0];\n"
        );
        assert_eq!(format_verbatim("a;b"), "a;\nb");
    }

    #[test]
    fn control_card_grammar() {
        let card = ControlCard {
            output: "diagrams.hh".into(),
            style: "form.sty".into(),
            model: "model".into(),
            in_particles: vec!["part11".into(), "anti11".into()],
            out_particles: vec!["part22".into(), "part23".into()],
            loops: 1,
            options: vec!["onshell".into(), "notadpole".into()],
            verbatim: "true=vsum[QED,2,2];".to_owned(),
            reno_particle: None,
        };
        let mut buf = Vec::new();
        write_control_card(&card, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "output = 'diagrams.hh';\n\
             style = 'form.sty';\n\
             model = 'model';\n\
             in = part11[k1], anti11[k2];\n\
             out = part22[k3], part23[k4];\n\
             loops=1;\n\
             loop_momentum=p;\n\
             options=onshell, notadpole;\n\
             true=vsum[QED,2,2];\n\
             %------- EOF ----------\n"
        );
    }

    #[test]
    fn renormalization_particle_restricts_propagators() {
        let card = ControlCard {
            output: "ct.hh".into(),
            style: "form.sty".into(),
            model: "model".into(),
            in_particles: vec!["part1".into()],
            out_particles: vec!["part1".into()],
            loops: 1,
            options: vec![],
            verbatim: String::new(),
            reno_particle: Some("RENO".into()),
        };
        let mut buf = Vec::new();
        write_control_card(&card, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("true=iprop[RENO,1,1];\n"));
    }

    #[test]
    fn long_origins_wrap_into_comment_continuations() {
        let origin = "m".repeat(100);
        let wrapped = wrap_origin(&origin);
        assert_eq!(
            wrapped,
            format!("{}\\\n% {}", "m".repeat(69), "m".repeat(31))
        );
        assert_eq!(wrap_origin("short"), "short");
    }
}
