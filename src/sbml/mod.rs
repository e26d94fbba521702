//! SBML core reader: XML → [`SbmlDocument`].

pub mod mathml;
pub mod model;
pub mod reader;
pub mod xml;

pub use model::{
    Compartment, InitialAssignment, KineticLaw, Parameter, Reaction, Rule, SbmlDocument,
    SbmlModel, Species, SpeciesReference,
};
pub use reader::parse_sbml;
