//! Runtime representation of a UFO-style interaction model.
//!
//! A model is loaded once from a YAML document through the `Serializable*`
//! mirror types, linked into `Arc`-shared entities with name lookup tables,
//! and is immutable afterwards.

use crate::expressions::{parse, BuiltinSet, Expression, Name, ParseError};
use crate::lorentz;
use ahash::RandomState;
use color_eyre::{Help, Report};
use eyre::{eyre, WrapErr};
use indexmap::IndexSet;
use num::Complex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("parameter nature '{0}' is not implemented")]
    UnsupportedParameterNature(String),
    #[error("parameter type '{0}' is not implemented")]
    UnsupportedParameterType(String),
    #[error("Lorentz structure '{name}' is malformed: {source}")]
    MalformedLorentzStructure {
        name: Name,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterNature {
    External,
    Internal,
}

impl TryFrom<&str> for ParameterNature {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<ParameterNature, ModelError> {
        match value {
            "external" => Ok(ParameterNature::External),
            "internal" => Ok(ParameterNature::Internal),
            other => Err(ModelError::UnsupportedParameterNature(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    Real,
    Complex,
}

impl TryFrom<&str> for ParameterType {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<ParameterType, ModelError> {
        match value {
            "real" => Ok(ParameterType::Real),
            "complex" => Ok(ParameterType::Complex),
            other => Err(ModelError::UnsupportedParameterType(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableParameter {
    pub name: Name,
    pub nature: Name,
    #[serde(rename = "type")]
    pub parameter_type: Name,
    #[serde(default)]
    pub lhablock: Option<Name>,
    #[serde(default)]
    pub lhacode: Option<Vec<usize>>,
    #[serde(default)]
    pub value: Option<(f64, f64)>,
    #[serde(default)]
    pub expression: Option<Name>,
    #[serde(default)]
    pub texname: Name,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: Name,
    pub nature: ParameterNature,
    pub parameter_type: ParameterType,
    pub lhablock: Option<Name>,
    pub lhacode: Option<Vec<usize>>,
    pub value: Option<Complex<f64>>,
    pub expression: Option<Name>,
    pub texname: Name,
}

impl Parameter {
    pub fn from_serializable_parameter(
        param: &SerializableParameter,
    ) -> Result<Parameter, ModelError> {
        Ok(Parameter {
            name: param.name.clone(),
            nature: ParameterNature::try_from(param.nature.as_str())?,
            parameter_type: ParameterType::try_from(param.parameter_type.as_str())?,
            lhablock: param.lhablock.clone(),
            lhacode: param.lhacode.clone(),
            value: param.value.map(|(re, im)| Complex::new(re, im)),
            expression: param.expression.clone(),
            texname: param.texname.clone(),
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableParticle {
    pub pdg_code: isize,
    pub name: Name,
    pub antiname: Name,
    pub spin: isize,
    pub color: isize,
    pub mass: Name,
    pub width: Name,
    #[serde(default)]
    pub texname: Name,
    #[serde(default)]
    pub line: Option<Name>,
    #[serde(default = "default_true")]
    pub propagating: bool,
    #[serde(default)]
    pub ghost_number: Option<isize>,
    #[serde(default)]
    pub self_conjugate: bool,
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub pdg_code: isize,
    pub name: Name,
    pub antiname: Name,
    pub spin: isize,
    pub color: isize,
    pub mass: Arc<Parameter>,
    pub width: Arc<Parameter>,
    pub texname: Name,
    pub line: Option<Name>,
    pub propagating: bool,
    pub ghost_number: Option<isize>,
    pub self_conjugate: bool,
}

impl Particle {
    pub fn from_serializable_particle(model: &Model, particle: &SerializableParticle) -> Particle {
        Particle {
            pdg_code: particle.pdg_code,
            name: particle.name.clone(),
            antiname: particle.antiname.clone(),
            spin: particle.spin,
            color: particle.color,
            mass: model.get_parameter(&particle.mass),
            width: model.get_parameter(&particle.width),
            texname: particle.texname.clone(),
            line: particle.line.clone(),
            propagating: particle.propagating,
            ghost_number: particle.ghost_number,
            self_conjugate: particle.self_conjugate,
        }
    }

    /// The stable field name pair `(name, antiname)` derived from the signed
    /// identity code, `part<N>` / `anti<N>`. Self-conjugate particles share
    /// one name.
    pub fn canonical_field_names(&self) -> (Name, Name) {
        let code = self.pdg_code.unsigned_abs();
        if self.pdg_code < 0 {
            let canonical: Name = format!("anti{}", code).into();
            if self.self_conjugate {
                (canonical.clone(), canonical)
            } else {
                (canonical, format!("part{}", code).into())
            }
        } else {
            let canonical: Name = format!("part{}", code).into();
            if self.self_conjugate {
                (canonical.clone(), canonical)
            } else {
                (canonical, format!("anti{}", code).into())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableLorentzStructure {
    pub name: Name,
    pub spins: Vec<isize>,
    pub structure: Name,
}

#[derive(Debug, Clone)]
pub struct LorentzStructure {
    pub name: Name,
    pub spins: Vec<isize>,
    pub structure: Expression,
    /// Momentum-power degree of `structure`, computed once at load time.
    pub rank: usize,
}

impl LorentzStructure {
    pub fn from_serializable_lorentz_structure(
        ls: &SerializableLorentzStructure,
    ) -> Result<LorentzStructure, ModelError> {
        let structure = parse(&ls.structure, &BuiltinSet::default()).map_err(|source| {
            ModelError::MalformedLorentzStructure {
                name: ls.name.clone(),
                source,
            }
        })?;
        let rank = lorentz::rank(&structure);
        Ok(LorentzStructure {
            name: ls.name.clone(),
            spins: ls.spins.clone(),
            structure,
            rank,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableCoupling {
    pub name: Name,
    pub expression: Name,
    #[serde(default)]
    pub orders: HashMap<Name, isize, RandomState>,
}

#[derive(Debug, Clone)]
pub struct Coupling {
    pub name: Name,
    pub expression: Name,
    pub orders: HashMap<Name, isize, RandomState>,
}

impl Coupling {
    pub fn from_serializable_coupling(coupling: &SerializableCoupling) -> Coupling {
        Coupling {
            name: coupling.name.clone(),
            expression: coupling.expression.clone(),
            orders: coupling.orders.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableVertexRule {
    pub name: Name,
    pub particles: Vec<Name>,
    pub color_structures: Vec<Name>,
    pub lorentz_structures: Vec<Name>,
    pub couplings: Vec<Vec<Option<Name>>>,
}

#[derive(Debug, Clone)]
pub struct VertexRule {
    pub name: Name,
    pub particles: Vec<Arc<Particle>>,
    /// One textual color factor per color slot; `"1"` is the trivial factor.
    pub color_structures: Vec<Name>,
    pub lorentz_structures: Vec<Arc<LorentzStructure>>,
    /// Couplings indexed as `couplings[color][lorentz]`.
    pub couplings: Vec<Vec<Option<Arc<Coupling>>>>,
}

impl VertexRule {
    pub fn from_serializable_vertex_rule(
        model: &Model,
        vertex_rule: &SerializableVertexRule,
    ) -> VertexRule {
        VertexRule {
            name: vertex_rule.name.clone(),
            particles: vertex_rule
                .particles
                .iter()
                .map(|name| model.get_particle(name))
                .collect(),
            color_structures: vertex_rule.color_structures.clone(),
            lorentz_structures: vertex_rule
                .lorentz_structures
                .iter()
                .map(|name| model.get_lorentz_structure(name))
                .collect(),
            couplings: vertex_rule
                .couplings
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|name| name.as_ref().map(|n| model.get_coupling(n)))
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableModel {
    pub name: Name,
    pub parameters: Vec<SerializableParameter>,
    pub particles: Vec<SerializableParticle>,
    pub lorentz_structures: Vec<SerializableLorentzStructure>,
    pub couplings: Vec<SerializableCoupling>,
    pub vertex_rules: Vec<SerializableVertexRule>,
}

impl SerializableModel {
    pub fn from_file(file_path: impl AsRef<Path>) -> Result<SerializableModel, Report> {
        let file_path = file_path.as_ref();
        let f = File::open(file_path)
            .wrap_err_with(|| format!("Could not open model yaml file {}", file_path.display()))
            .suggestion("Does the path exist?")?;
        serde_yaml::from_reader(f)
            .map_err(|e| eyre!(format!("Error parsing model yaml: {}", e)))
            .suggestion("Is it a correct yaml file?")
    }

    pub fn from_yaml_str(yaml_str: &str) -> Result<SerializableModel, Report> {
        serde_yaml::from_str(yaml_str)
            .map_err(|e| eyre!(format!("Error parsing model yaml: {}", e)))
            .suggestion("Is it a correct yaml file?")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub name: Name,
    /// Where the model was loaded from, quoted in generated file headers.
    pub origin: Name,
    pub parameters: Vec<Arc<Parameter>>,
    pub particles: Vec<Arc<Particle>>,
    pub lorentz_structures: Vec<Arc<LorentzStructure>>,
    pub couplings: Vec<Arc<Coupling>>,
    pub vertex_rules: Vec<Arc<VertexRule>>,
    pub parameter_name_to_position: HashMap<Name, usize, RandomState>,
    pub particle_name_to_position: HashMap<Name, usize, RandomState>,
    pub particle_pdg_to_position: HashMap<isize, usize, RandomState>,
    pub lorentz_structure_name_to_position: HashMap<Name, usize, RandomState>,
    pub coupling_name_to_position: HashMap<Name, usize, RandomState>,
    pub vertex_rule_name_to_position: HashMap<Name, usize, RandomState>,
}

impl Model {
    pub fn from_serializable_model(
        serializable_model: &SerializableModel,
    ) -> Result<Model, ModelError> {
        let mut model = Model {
            name: serializable_model.name.clone(),
            origin: serializable_model.name.clone(),
            ..Model::default()
        };

        for (i_param, serializable_param) in serializable_model.parameters.iter().enumerate() {
            let parameter = Arc::new(Parameter::from_serializable_parameter(serializable_param)?);
            model
                .parameter_name_to_position
                .insert(parameter.name.clone(), i_param);
            model.parameters.push(parameter);
        }

        for (i_part, serializable_particle) in serializable_model.particles.iter().enumerate() {
            let particle = Arc::new(Particle::from_serializable_particle(
                &model,
                serializable_particle,
            ));
            model
                .particle_name_to_position
                .insert(particle.name.clone(), i_part);
            model
                .particle_pdg_to_position
                .insert(particle.pdg_code, i_part);
            model.particles.push(particle);
        }

        for (i_lor, serializable_lorentz) in
            serializable_model.lorentz_structures.iter().enumerate()
        {
            let lorentz_structure = Arc::new(
                LorentzStructure::from_serializable_lorentz_structure(serializable_lorentz)?,
            );
            model
                .lorentz_structure_name_to_position
                .insert(lorentz_structure.name.clone(), i_lor);
            model.lorentz_structures.push(lorentz_structure);
        }

        for (i_coupl, serializable_coupling) in serializable_model.couplings.iter().enumerate() {
            let coupling = Arc::new(Coupling::from_serializable_coupling(serializable_coupling));
            model
                .coupling_name_to_position
                .insert(coupling.name.clone(), i_coupl);
            model.couplings.push(coupling);
        }

        for (i_vr, serializable_vertex_rule) in serializable_model.vertex_rules.iter().enumerate() {
            let vertex_rule = Arc::new(VertexRule::from_serializable_vertex_rule(
                &model,
                serializable_vertex_rule,
            ));
            model
                .vertex_rule_name_to_position
                .insert(vertex_rule.name.clone(), i_vr);
            model.vertex_rules.push(vertex_rule);
        }

        Ok(model)
    }

    pub fn from_file(file_path: impl AsRef<Path>) -> Result<Model, Report> {
        let file_path = file_path.as_ref();
        let serializable = SerializableModel::from_file(file_path)?;
        let mut model = Model::from_serializable_model(&serializable)?;
        model.origin = file_path.display().to_string().into();
        Ok(model)
    }

    pub fn from_yaml_str(yaml_str: &str) -> Result<Model, Report> {
        let serializable = SerializableModel::from_yaml_str(yaml_str)?;
        Ok(Model::from_serializable_model(&serializable)?)
    }

    /// Order names appearing in any coupling of the model. Per coupling the
    /// names are sorted, across couplings first appearance wins, so the
    /// result is deterministic.
    pub fn coupling_order_names(&self) -> Vec<Name> {
        let mut names: IndexSet<Name> = IndexSet::new();
        for coupling in &self.couplings {
            let mut order_names: Vec<&Name> = coupling.orders.keys().collect();
            order_names.sort();
            for name in order_names {
                names.insert(name.clone());
            }
        }
        names.into_iter().collect()
    }

    /// A model has Majorana content iff some particle is self-conjugate with
    /// an even spin encoding.
    pub fn contains_majorana_fermions(&self) -> bool {
        self.particles
            .iter()
            .any(|p| p.spin % 2 == 0 && p.self_conjugate)
    }

    #[inline]
    pub fn get_particle(&self, name: &Name) -> Arc<Particle> {
        if let Some(position) = self.particle_name_to_position.get(name) {
            self.particles[*position].clone()
        } else {
            panic!("Particle '{}' not found in model '{}'.", name, self.name);
        }
    }

    #[inline]
    pub fn get_particle_from_pdg(&self, pdg: isize) -> Arc<Particle> {
        if let Some(position) = self.particle_pdg_to_position.get(&pdg) {
            self.particles[*position].clone()
        } else {
            panic!(
                "Particle with PDG {} not found in model '{}'.",
                pdg, self.name
            );
        }
    }

    #[inline]
    pub fn get_parameter(&self, name: &Name) -> Arc<Parameter> {
        if let Some(position) = self.parameter_name_to_position.get(name) {
            self.parameters[*position].clone()
        } else {
            panic!("Parameter '{}' not found in model '{}'.", name, self.name);
        }
    }

    #[inline]
    pub fn get_lorentz_structure(&self, name: &Name) -> Arc<LorentzStructure> {
        if let Some(position) = self.lorentz_structure_name_to_position.get(name) {
            self.lorentz_structures[*position].clone()
        } else {
            panic!(
                "Lorentz structure '{}' not found in model '{}'.",
                name, self.name
            );
        }
    }

    #[inline]
    pub fn get_coupling(&self, name: &Name) -> Arc<Coupling> {
        if let Some(position) = self.coupling_name_to_position.get(name) {
            self.couplings[*position].clone()
        } else {
            panic!("Coupling '{}' not found in model '{}'.", name, self.name);
        }
    }

    #[inline]
    pub fn get_vertex_rule(&self, name: &Name) -> Arc<VertexRule> {
        if let Some(position) = self.vertex_rule_name_to_position.get(name) {
            self.vertex_rules[*position].clone()
        } else {
            panic!("Vertex rule '{}' not found in model '{}'.", name, self.name);
        }
    }
}
