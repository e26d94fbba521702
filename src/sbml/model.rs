use crate::expr::Expr;

#[derive(Debug, Clone, PartialEq)]
pub struct SbmlDocument {
    pub level: Option<u32>,
    pub version: Option<u32>,
    pub model: SbmlModel,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SbmlModel {
    pub id: String,
    pub name: Option<String>,
    pub compartments: Vec<Compartment>,
    pub species: Vec<Species>,
    pub parameters: Vec<Parameter>,
    pub initial_assignments: Vec<InitialAssignment>,
    pub rules: Vec<Rule>,
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Compartment {
    pub id: String,
    pub size: Option<f64>,
    pub constant: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub id: String,
    pub compartment: String,
    pub initial_amount: Option<f64>,
    pub initial_concentration: Option<f64>,
    pub boundary_condition: bool,
    pub constant: bool,
}

impl Species {
    /// Concentration wins over amount when both are declared.
    pub fn initial_value(&self) -> Option<f64> {
        self.initial_concentration.or(self.initial_amount)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub id: String,
    pub value: Option<f64>,
    pub constant: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitialAssignment {
    pub symbol: String,
    pub math: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Assignment { variable: String, math: Expr },
    Rate { variable: String, math: Expr },
    Algebraic { math: Expr },
}

impl Rule {
    pub fn variable(&self) -> Option<&str> {
        match self {
            Self::Assignment { variable, .. } | Self::Rate { variable, .. } => Some(variable),
            Self::Algebraic { .. } => None,
        }
    }

    pub fn math(&self) -> &Expr {
        match self {
            Self::Assignment { math, .. } | Self::Rate { math, .. } | Self::Algebraic { math } => {
                math
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesReference {
    pub species: String,
    pub stoichiometry: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KineticLaw {
    pub math: Expr,
    pub local_parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub id: String,
    pub reversible: bool,
    pub reactants: Vec<SpeciesReference>,
    pub products: Vec<SpeciesReference>,
    pub kinetic_law: Option<KineticLaw>,
}

impl SbmlModel {
    pub fn rule_for(&self, variable: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.variable() == Some(variable))
    }
}
