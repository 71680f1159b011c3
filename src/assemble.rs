//! Per-vertex assembly of the algebraic replacement rules.
//!
//! For every vertex the assembler combines each (coupling, color factor,
//! Lorentz factor) triple into one signed sum, resolves the coupling-order
//! powers against every order name used anywhere in the model, and records
//! which dummy indices actually occur so that the macro-processor backend
//! sums exactly those.

use crate::color::{canonicalize_color, ColorPatternError};
use crate::expressions::{
    parse, BuiltinSet, Expression, IndexBook, Name, ParseError,
};
use crate::lorentz::canonicalize_lorentz;
use crate::model::{Model, VertexRule};
use ahash::AHashMap;
use indexmap::IndexMap;
use log::warn;
use thiserror::Error;

/// Tag for dummy indices substituted for quoted string placeholders.
pub const PLACEHOLDER_INDEX_TAG: &str = "ModelDummyIndex";
/// Prefix for dummy indices resolved from negative integer markers.
pub const IMPLICIT_INDEX_PREFIX: &str = "MDLIndex";
/// Reserved order name carrying the vertex rank.
pub const RANK_ORDER_NAME: &str = "RK";

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("could not parse color factor '{factor}' of vertex {vertex}: {source}")]
    MalformedColorFactor {
        vertex: Name,
        factor: Name,
        #[source]
        source: ParseError,
    },
    #[error("cannot recognize color assignment at vertex {vertex}: {pattern:?}")]
    UnrecognizedColorPattern { vertex: Name, pattern: [isize; 3] },
}

/// One leg of a vertex in emission order: the field name the external
/// backend matches on, the original participant position and the signed
/// spin/color classes (negative on anti-fields).
#[derive(Debug, Clone)]
pub struct LegSlot {
    pub field: Name,
    pub position: usize,
    pub spin: isize,
    pub color: isize,
}

/// One summand of a vertex replacement rule: a coupling symbol and the
/// combined color-Lorentz factor, unless that factor is the identity.
#[derive(Debug, Clone)]
pub struct VertexTerm {
    pub coupling: Name,
    pub factor: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct AssembledVertex {
    pub name: Name,
    pub particle_names: Vec<Name>,
    pub flip: bool,
    pub slots: Vec<LegSlot>,
    /// `RK` first, then every order name used anywhere in the model.
    pub orders: IndexMap<Name, isize>,
    pub terms: Vec<VertexTerm>,
    /// Dummy indices occurring in at least one term factor.
    pub dummies: Vec<Name>,
}

/// Shared state of one assembly pass: canonical Lorentz forms are memoized
/// per structure name, dummy-index tables span the whole pass.
pub struct Assembler {
    order_names: Vec<Name>,
    canonical_lorentz: AHashMap<Name, Expression>,
    book: IndexBook,
    builtins: BuiltinSet,
}

impl Assembler {
    pub fn new(model: &Model) -> Assembler {
        let mut book = IndexBook::new();
        let two = Expression::integer(2);
        let mut canonical_lorentz = AHashMap::default();
        for ls in &model.lorentz_structures {
            let mut structure = ls
                .structure
                .substitute_placeholder_indices(PLACEHOLDER_INDEX_TAG, &mut book)
                .resolve_implicit_indices(0, IMPLICIT_INDEX_PREFIX, &mut book);
            // The macro processor takes no float literals; small integer
            // coefficients written as floats are folded back.
            for spelling in ["2.", "2.0"] {
                structure =
                    structure.algebraic_substitute(&Expression::Float(spelling.into()), &two);
            }
            canonical_lorentz.insert(
                ls.name.clone(),
                canonicalize_lorentz(&structure, &ls.spins),
            );
        }
        Assembler {
            order_names: model.coupling_order_names(),
            canonical_lorentz,
            book,
            builtins: BuiltinSet::default(),
        }
    }

    pub fn index_book(&self) -> &IndexBook {
        &self.book
    }

    pub fn into_index_book(self) -> IndexBook {
        self.book
    }

    pub fn assemble(&mut self, vertex: &VertexRule) -> Result<AssembledVertex, AssembleError> {
        let particle_names: Vec<Name> = vertex.particles.iter().map(|p| p.name.clone()).collect();
        let spins: Vec<isize> = vertex.particles.iter().map(|p| p.spin - 1).collect();

        // Fermion-line convention of the diagram generator: when the first
        // and third leg are both fermionic, the first two slots swap.
        let flip = spins.len() >= 3 && spins[0] == 1 && spins[2] == 1;
        let mut xidx: Vec<usize> = (0..vertex.particles.len()).collect();
        if flip {
            xidx.swap(0, 1);
        }

        let slots: Vec<LegSlot> = xidx
            .iter()
            .map(|&i| {
                let p = &vertex.particles[i];
                let (_, field) = p.canonical_field_names();
                let mut spin = p.spin.abs() - 1;
                let mut color = p.color.abs();
                if field.starts_with("anti") {
                    spin = -spin;
                    color = -color;
                }
                LegSlot {
                    field,
                    position: i,
                    spin,
                    color,
                }
            })
            .collect();
        let colors: Vec<isize> = slots.iter().map(|s| s.color).collect();

        let mut orders: IndexMap<Name, isize> = IndexMap::new();
        let mut vrank = 0;
        for row in &vertex.couplings {
            for (il, coupling) in row.iter().enumerate() {
                if coupling.is_some() {
                    vrank = vrank.max(vertex.lorentz_structures[il].rank);
                }
            }
        }
        orders.insert(RANK_ORDER_NAME.into(), vrank as isize);
        for row in &vertex.couplings {
            for coupling in row.iter().flatten() {
                for name in &self.order_names {
                    let power = coupling.orders.get(name).copied().unwrap_or(0);
                    if let Some(existing) = orders.get(name) {
                        if *existing != power {
                            warn!(
                                "Vertex {} has ambiguous powers in {} ({}, {}). I will use {}.",
                                vertex.name, name, existing, power, existing
                            );
                        }
                    } else {
                        orders.insert(name.clone(), power);
                    }
                }
            }
        }

        let mut terms = Vec::new();
        for (ic, row) in vertex.couplings.iter().enumerate() {
            for (il, coupling) in row.iter().enumerate() {
                let Some(coupling) = coupling else {
                    continue;
                };
                let lorentz = &self.canonical_lorentz[&vertex.lorentz_structures[il].name];
                let scolor = &vertex.color_structures[ic];
                let combined = if scolor == "1" {
                    lorentz.clone()
                } else {
                    let color = parse(scolor, &self.builtins)
                        .map_err(|source| AssembleError::MalformedColorFactor {
                            vertex: vertex.name.clone(),
                            factor: scolor.clone(),
                            source,
                        })?
                        .substitute_placeholder_indices(PLACEHOLDER_INDEX_TAG, &mut self.book)
                        .resolve_implicit_indices(0, IMPLICIT_INDEX_PREFIX, &mut self.book);
                    let color =
                        canonicalize_color(&color, &colors, &xidx).map_err(
                            |ColorPatternError { pattern }| AssembleError::UnrecognizedColorPattern {
                                vertex: vertex.name.clone(),
                                pattern,
                            },
                        )?;
                    if lorentz.is_one() {
                        color
                    } else {
                        Expression::product(vec![color, lorentz.clone()])
                    }
                };
                terms.push(VertexTerm {
                    coupling: coupling.name.clone(),
                    factor: (!combined.is_one()).then_some(combined),
                });
            }
        }

        let mut dummies = Vec::new();
        for name in self
            .book
            .placeholder_names()
            .chain(self.book.implicit_names())
        {
            let occurs = terms.iter().any(|t| {
                t.factor
                    .as_ref()
                    .map_or(false, |factor| factor.depends_on(name))
            });
            if occurs {
                dummies.push(name.clone());
            }
        }

        Ok(AssembledVertex {
            name: vertex.name.clone(),
            particle_names,
            flip,
            slots,
            orders,
            terms,
            dummies,
        })
    }
}

/// Assembles every vertex of the model and hands back the dummy-index
/// bookkeeping accumulated along the way.
pub fn assemble_model(model: &Model) -> Result<(Vec<AssembledVertex>, IndexBook), AssembleError> {
    let mut assembler = Assembler::new(model);
    let vertices = model
        .vertex_rules
        .iter()
        .map(|v| assembler.assemble(v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((vertices, assembler.into_index_book()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::Syntax;
    use crate::model::Model;

    fn scalar_model() -> Model {
        Model::from_yaml_str(
            r#"
name: phi3
parameters:
  - name: ZERO
    nature: external
    type: real
    lhablock: MASS
    lhacode: [0]
    value: [0.0, 0.0]
  - name: lam
    nature: external
    type: real
    lhablock: COUPLINGS
    lhacode: [1]
    value: [0.1, 0.0]
particles:
  - pdg_code: 9000001
    name: phi
    antiname: phi
    spin: 1
    color: 1
    mass: ZERO
    width: ZERO
    texname: "\\phi"
    line: dashed
    self_conjugate: true
lorentz_structures:
  - name: SSS1
    spins: [1, 1, 1]
    structure: "1"
couplings:
  - name: GC_1
    expression: "-lam"
    orders: {QCD: 0, QED: 1}
vertex_rules:
  - name: V_1
    particles: [phi, phi, phi]
    color_structures: ["1"]
    lorentz_structures: [SSS1]
    couplings: [[GC_1]]
"#,
        )
        .unwrap()
    }

    fn qcd_model() -> Model {
        Model::from_yaml_str(
            r#"
name: tiny_qcd
parameters:
  - name: ZERO
    nature: external
    type: real
    value: [0.0, 0.0]
  - name: MT
    nature: external
    type: real
    lhablock: MASS
    lhacode: [6]
    value: [173.0, 0.0]
particles:
  - pdg_code: 6
    name: t
    antiname: t~
    spin: 2
    color: 3
    mass: MT
    width: ZERO
    texname: t
    line: straight
  - pdg_code: -6
    name: t~
    antiname: t
    spin: 2
    color: -3
    mass: MT
    width: ZERO
    texname: "\\bar{t}"
    line: straight
  - pdg_code: 21
    name: g
    antiname: g
    spin: 3
    color: 8
    mass: ZERO
    width: ZERO
    texname: g
    line: curly
    self_conjugate: true
lorentz_structures:
  - name: FFV1
    spins: [2, 2, 3]
    structure: "Gamma(3,2,1)"
  - name: VVV1
    spins: [3, 3, 3]
    structure: "P(3,1)*Metric(1,2) - P(3,2)*Metric(1,2)"
couplings:
  - name: GC_11
    expression: "complex(0,1)*G"
    orders: {QCD: 1}
  - name: GC_10
    expression: "-G"
    orders: {QCD: 1}
vertex_rules:
  - name: V_1
    particles: [t~, t, g]
    color_structures: ["T(3,2,1)"]
    lorentz_structures: [FFV1]
    couplings: [[GC_11]]
  - name: V_2
    particles: [g, g, g]
    color_structures: ["f(1,2,3)"]
    lorentz_structures: [VVV1]
    couplings: [[GC_10]]
"#,
        )
        .unwrap()
    }

    #[test]
    fn trivial_scalar_vertex_is_just_the_coupling() {
        let model = scalar_model();
        let (vertices, _) = assemble_model(&model).unwrap();
        let v = &vertices[0];
        assert!(!v.flip);
        assert_eq!(v.terms.len(), 1);
        assert_eq!(v.terms[0].coupling, "GC_1");
        assert!(v.terms[0].factor.is_none());
        assert!(v.dummies.is_empty());
        assert_eq!(v.orders[RANK_ORDER_NAME], 0);
        assert_eq!(v.orders["QCD"], 0);
        assert_eq!(v.orders["QED"], 1);
    }

    #[test]
    fn ffv_ordering_does_not_flip() {
        let model = qcd_model();
        let (vertices, _) = assemble_model(&model).unwrap();
        let v = &vertices[0];
        // (t~, t, g): position 2 is a vector, so no flip.
        assert!(!v.flip);
        let fields: Vec<&str> = v.slots.iter().map(|s| s.field.as_str()).collect();
        assert_eq!(fields, vec!["part6", "anti6", "part21"]);
        assert_eq!(v.slots[0].position, 0);
        assert_eq!(v.slots[0].spin, 1);
        assert_eq!(v.slots[0].color, 3);
        assert_eq!(v.slots[1].spin, -1);
        assert_eq!(v.slots[1].color, -3);
        assert_eq!(v.slots[2].spin, 2);
        assert_eq!(v.slots[2].color, 8);
    }

    #[test]
    fn fermionic_first_and_third_legs_flip_the_first_two_slots() {
        let model = qcd_model();
        let yaml = r#"
name: V_4F
particles: [t~, t, t~, t]
color_structures: ["Identity(1,2)*Identity(3,4)"]
lorentz_structures: [FFV1]
couplings: [[GC_11]]
"#;
        let serializable: crate::model::SerializableVertexRule =
            serde_yaml::from_str(yaml).unwrap();
        let rule = crate::model::VertexRule::from_serializable_vertex_rule(&model, &serializable);
        let mut assembler = Assembler::new(&model);
        let v = assembler.assemble(&rule).unwrap();
        assert!(v.flip);
        let fields: Vec<&str> = v.slots.iter().map(|s| s.field.as_str()).collect();
        // Anti-field names of (t~, t, t~, t) with slots 0 and 1 swapped.
        assert_eq!(fields, vec!["anti6", "part6", "part6", "anti6"]);
        assert_eq!(v.slots[0].position, 1);
        assert_eq!(v.slots[1].position, 0);
    }

    #[test]
    fn rank_order_tracks_the_momentum_degree() {
        let model = qcd_model();
        let (vertices, _) = assemble_model(&model).unwrap();
        assert_eq!(vertices[0].orders[RANK_ORDER_NAME], 0);
        assert_eq!(vertices[1].orders[RANK_ORDER_NAME], 1);
    }

    #[test]
    fn combined_factor_multiplies_color_and_lorentz() {
        let model = qcd_model();
        let (vertices, _) = assemble_model(&model).unwrap();
        let factor = vertices[0].terms[0].factor.as_ref().unwrap();
        // Resolved T order is (8, -3, 3): adjoint on the gluon slot, the
        // antifundamental t leg, the fundamental t~ leg.
        assert_eq!(
            factor.render(Syntax::Form),
            "T(idx3C8,idx2C3,idx1C3)*NCContainer(Sm(idx3L2),idx2L1,idx1L1)"
        );
        assert!(vertices[0].dummies.is_empty());
    }

    #[test]
    fn implicit_color_indices_are_summed() {
        let mut model = qcd_model();
        // Splice a four-gluon-like color contraction onto the 3-gluon vertex.
        let yaml = r#"
name: V_3
particles: [g, g, g]
color_structures: ["f(1,2,-1)*f(3,-1,-2)*f(-2,1,2)"]
lorentz_structures: [VVV1]
couplings: [[GC_10]]
"#;
        let serializable: crate::model::SerializableVertexRule =
            serde_yaml::from_str(yaml).unwrap();
        let rule = crate::model::VertexRule::from_serializable_vertex_rule(&model, &serializable);
        model.vertex_rules.push(std::sync::Arc::new(rule));

        let (vertices, book) = assemble_model(&model).unwrap();
        let v = vertices.last().unwrap();
        let dummies: Vec<&str> = v.dummies.iter().map(|n| n.as_str()).collect();
        assert_eq!(dummies, vec!["MDLIndex1", "MDLIndex2"]);
        assert_eq!(book.implicit_names().count(), 2);
        // The other vertices do not sum over indices they never mention.
        assert!(vertices[0].dummies.is_empty());
    }

    #[test]
    fn ambiguous_order_powers_keep_the_first_seen_value() {
        let model = Model::from_yaml_str(
            r#"
name: conflict
parameters:
  - name: ZERO
    nature: external
    type: real
    value: [0.0, 0.0]
particles:
  - pdg_code: 9000001
    name: phi
    antiname: phi
    spin: 1
    color: 1
    mass: ZERO
    width: ZERO
    texname: "\\phi"
    self_conjugate: true
lorentz_structures:
  - name: SSS1
    spins: [1, 1, 1]
    structure: "1"
  - name: SSS2
    spins: [1, 1, 1]
    structure: "P(1,1)*P(1,2)"
couplings:
  - name: GC_1
    expression: "g1"
    orders: {NP: 1}
  - name: GC_2
    expression: "g2"
    orders: {NP: 2}
vertex_rules:
  - name: V_1
    particles: [phi, phi, phi]
    color_structures: ["1"]
    lorentz_structures: [SSS1, SSS2]
    couplings: [[GC_1, GC_2]]
"#,
        )
        .unwrap();
        let (vertices, _) = assemble_model(&model).unwrap();
        assert_eq!(vertices[0].orders["NP"], 1);
        assert_eq!(vertices[0].orders[RANK_ORDER_NAME], 2);
    }

    #[test]
    fn index_namespaces_never_collide() {
        let model = qcd_model();
        let (vertices, _) = assemble_model(&model).unwrap();
        let rendered = vertices[0].terms[0]
            .factor
            .as_ref()
            .unwrap()
            .render(Syntax::Form);
        let indices: Vec<&str> = rendered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|tok| tok.starts_with("idx"))
            .collect();
        assert!(!indices.is_empty());
        for index in indices {
            // Spin indices carry an L, color indices a C, never both.
            assert_ne!(index.contains('L'), index.contains('C'), "{}", index);
        }
    }

    #[test]
    fn unrecognized_color_pattern_reports_the_vertex() {
        let model = qcd_model();
        let yaml = r#"
name: V_bad
particles: [t~, t, g]
color_structures: ["T(1,2,3)"]
lorentz_structures: [FFV1]
couplings: [[GC_11]]
"#;
        let serializable: crate::model::SerializableVertexRule =
            serde_yaml::from_str(yaml).unwrap();
        let rule = crate::model::VertexRule::from_serializable_vertex_rule(&model, &serializable);
        let mut assembler = Assembler::new(&model);
        let err = assembler.assemble(&rule).unwrap_err();
        match err {
            AssembleError::UnrecognizedColorPattern { vertex, .. } => {
                assert_eq!(vertex, "V_bad");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
