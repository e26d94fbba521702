//! SBML document → [`DaeModel`].
//!
//! Every model quantity ends up either as a parameter of the generated code
//! or as one of three kinds of state:
//!
//! * ODE states: species driven by reactions, rate rule targets, boundary species.
//! * Algebraic states: quantities fixed by an algebraic rule (`0 = f(x)`).
//! * Assignment states: assignment rule targets, recomputed from the others.

use crate::domain::model::{DaeModel, ModelParameter, SimulationOptions, State, StateType};
use crate::expr::{BinaryOp, Expr};
use crate::sbml::{Rule, SbmlDocument, SbmlModel};
use crate::utils::error::{ConvertError, Result};
use crate::utils::validation::validate_matlab_identifier;
use std::collections::{HashMap, HashSet};

pub const PARAMETERS_CONTEXT: &str = "Parameters";
pub const COMPARTMENTS_CONTEXT: &str = "Compartments";

/// Names the generated MATLAB code uses for its own variables.
const RESERVED_NAMES: [&str; 7] = ["t", "x", "p", "dx", "out", "ones_t", "obj"];

pub struct DaeBuilder {
    options: SimulationOptions,
    name: Option<String>,
}

/// What decides the value of a quantity.
enum Driver<'a> {
    Assignment(&'a Expr),
    Rate(&'a Expr),
    Algebraic(&'a Expr),
    None,
}

impl DaeBuilder {
    pub fn new(options: SimulationOptions) -> Self {
        Self {
            options,
            name: None,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn build(&self, document: &SbmlDocument) -> Result<DaeModel> {
        let model = &document.model;
        let name = self.name.clone().unwrap_or_else(|| model.id.clone());
        validate_matlab_identifier("model.name", &name)?;

        let known = declared_ids(model)?;
        check_rules(model, &known)?;

        let (rates, local_parameters) = reaction_rates(model, &known)?;
        let algebraic = assign_algebraic_rules(model)?;
        let values = initial_values(model, &local_parameters)?;
        let value_of = |id: &str| values.get(id).copied().unwrap_or(0.0);

        let driver = |id: &str| match model.rule_for(id) {
            Some(Rule::Assignment { math, .. }) => Driver::Assignment(math),
            Some(Rule::Rate { math, .. }) => Driver::Rate(math),
            _ => match algebraic.get(id) {
                Some(math) => Driver::Algebraic(*math),
                None => Driver::None,
            },
        };

        let mut states = Vec::new();
        let mut parameters = Vec::new();

        for species in &model.species {
            let id = species.id.as_str();
            let (state_type, equation) = match driver(id) {
                Driver::Assignment(math) => (StateType::Assignment, math.to_formula()),
                Driver::Rate(math) => (StateType::Ode, math.to_formula()),
                Driver::Algebraic(math) => (StateType::Algebraic, math.to_formula()),
                Driver::None if species.constant => {
                    parameters.push(ModelParameter {
                        id: id.to_string(),
                        value: value_of(id),
                    });
                    continue;
                }
                Driver::None if species.boundary_condition => (StateType::Ode, "0".to_string()),
                Driver::None => (StateType::Ode, species_balance(model, id, &rates)?),
            };

            states.push(State {
                id: id.to_string(),
                state_type,
                initial_condition: value_of(id),
                equation,
                context: species.compartment.clone(),
            });
        }

        let others = model
            .parameters
            .iter()
            .map(|p| (p.id.as_str(), PARAMETERS_CONTEXT))
            .chain(
                model
                    .compartments
                    .iter()
                    .map(|c| (c.id.as_str(), COMPARTMENTS_CONTEXT)),
            );

        for (id, context) in others {
            let (state_type, equation) = match driver(id) {
                Driver::Assignment(math) => (StateType::Assignment, math.to_formula()),
                Driver::Rate(math) => (StateType::Ode, math.to_formula()),
                Driver::Algebraic(math) => (StateType::Algebraic, math.to_formula()),
                Driver::None => {
                    parameters.push(ModelParameter {
                        id: id.to_string(),
                        value: value_of(id),
                    });
                    continue;
                }
            };

            states.push(State {
                id: id.to_string(),
                state_type,
                initial_condition: value_of(id),
                equation,
                context: context.to_string(),
            });
        }

        parameters.extend(local_parameters.iter().map(|(id, value)| ModelParameter {
            id: id.clone(),
            value: *value,
        }));

        for id in states
            .iter()
            .map(|s| s.id.as_str())
            .chain(parameters.iter().map(|p| p.id.as_str()))
        {
            if RESERVED_NAMES.contains(&id) {
                tracing::warn!(
                    "Identifier '{}' shadows a variable of the generated code; the export may not run",
                    id
                );
            }
        }

        let dae = DaeModel {
            name,
            states,
            parameters,
            options: self.options.clone(),
        };

        // Rejects cyclic assignment rules up front instead of at export time.
        dae.assignment_order()?;

        tracing::info!(
            "Built DAE model '{}': {} ODE, {} algebraic, {} assignment states, {} parameters",
            dae.name,
            dae.count(StateType::Ode),
            dae.count(StateType::Algebraic),
            dae.count(StateType::Assignment),
            dae.parameters.len()
        );

        Ok(dae)
    }
}

fn declared_ids(model: &SbmlModel) -> Result<HashSet<&str>> {
    let mut ids = HashSet::new();
    let all = model
        .compartments
        .iter()
        .map(|c| c.id.as_str())
        .chain(model.species.iter().map(|s| s.id.as_str()))
        .chain(model.parameters.iter().map(|p| p.id.as_str()));

    for id in all {
        if !ids.insert(id) {
            return Err(ConvertError::dae(format!("identifier '{}' is declared twice", id)));
        }
    }
    Ok(ids)
}

fn check_rules(model: &SbmlModel, known: &HashSet<&str>) -> Result<()> {
    let mut targeted = HashSet::new();
    for variable in model.rules.iter().filter_map(Rule::variable) {
        if !known.contains(variable) {
            return Err(ConvertError::dae(format!(
                "rule targets unknown variable '{}'",
                variable
            )));
        }
        if !targeted.insert(variable) {
            return Err(ConvertError::dae(format!(
                "variable '{}' is the target of more than one rule",
                variable
            )));
        }
    }

    for variable in &targeted {
        let constant = model
            .parameters
            .iter()
            .find(|p| p.id == *variable)
            .map(|p| p.constant)
            .or_else(|| {
                model
                    .compartments
                    .iter()
                    .find(|c| c.id == *variable)
                    .map(|c| c.constant)
            })
            .or_else(|| {
                model
                    .species
                    .iter()
                    .find(|s| s.id == *variable)
                    .map(|s| s.constant)
            })
            .unwrap_or(false);
        if constant {
            return Err(ConvertError::dae(format!(
                "rule targets constant quantity '{}'",
                variable
            )));
        }
    }
    Ok(())
}

/// Kinetic laws with local parameters renamed to `<reaction>_<parameter>`, and the
/// renamed parameters with their values.
fn reaction_rates(
    model: &SbmlModel,
    known: &HashSet<&str>,
) -> Result<(HashMap<String, Expr>, Vec<(String, f64)>)> {
    let mut rates = HashMap::new();
    let mut locals: Vec<(String, f64)> = Vec::new();

    for reaction in &model.reactions {
        let Some(law) = &reaction.kinetic_law else {
            continue;
        };

        let mut math = law.math.clone();
        for local in &law.local_parameters {
            let global = format!("{}_{}", reaction.id, local.id);
            if known.contains(global.as_str()) || locals.iter().any(|(id, _)| *id == global) {
                return Err(ConvertError::dae(format!(
                    "local parameter '{}' of reaction '{}' collides with '{}'",
                    local.id, reaction.id, global
                )));
            }
            math.rename(&local.id, &global);
            locals.push((global, local.value.unwrap_or(0.0)));
        }
        rates.insert(reaction.id.clone(), math);
    }

    Ok((rates, locals))
}

/// Algebraic rules claim, in order, the first free variable they reference.
/// Free means: not constant, not a rule target, not a species taking part in a reaction.
fn assign_algebraic_rules(model: &SbmlModel) -> Result<HashMap<&str, &Expr>> {
    let reacting: HashSet<&str> = model
        .reactions
        .iter()
        .flat_map(|r| r.reactants.iter().chain(r.products.iter()))
        .map(|sr| sr.species.as_str())
        .collect();

    let candidates: Vec<&str> = model
        .species
        .iter()
        .filter(|s| !s.constant && (s.boundary_condition || !reacting.contains(s.id.as_str())))
        .map(|s| s.id.as_str())
        .chain(
            model
                .parameters
                .iter()
                .filter(|p| !p.constant)
                .map(|p| p.id.as_str()),
        )
        .chain(
            model
                .compartments
                .iter()
                .filter(|c| !c.constant)
                .map(|c| c.id.as_str()),
        )
        .filter(|id| model.rule_for(id).is_none())
        .collect();

    let mut claimed: HashMap<&str, &Expr> = HashMap::new();
    for (index, rule) in model.rules.iter().enumerate() {
        let Rule::Algebraic { math } = rule else {
            continue;
        };
        let referenced = math.identifiers();
        let variable = candidates
            .iter()
            .copied()
            .find(|c| referenced.contains(c) && !claimed.contains_key(c))
            .ok_or_else(|| {
                ConvertError::dae(format!(
                    "algebraic rule #{} ({} = 0) has no free variable to determine",
                    index + 1,
                    math.to_formula()
                ))
            })?;
        claimed.insert(variable, math);
    }
    Ok(claimed)
}

fn initial_values(model: &SbmlModel, locals: &[(String, f64)]) -> Result<HashMap<String, f64>> {
    let mut values: HashMap<String, f64> = HashMap::new();
    for c in &model.compartments {
        values.insert(c.id.clone(), c.size.unwrap_or(1.0));
    }
    for s in &model.species {
        values.insert(s.id.clone(), s.initial_value().unwrap_or(0.0));
    }
    for p in &model.parameters {
        values.insert(p.id.clone(), p.value.unwrap_or(0.0));
    }
    for (id, value) in locals {
        values.insert(id.clone(), *value);
    }

    for assignment in &model.initial_assignments {
        if !values.contains_key(&assignment.symbol) {
            return Err(ConvertError::dae(format!(
                "initial assignment targets unknown symbol '{}'",
                assignment.symbol
            )));
        }
        let value = assignment
            .math
            .eval(&|id| values.get(id).copied())
            .map_err(|e| {
                ConvertError::dae(format!(
                    "cannot evaluate initial assignment of '{}': {}",
                    assignment.symbol, e
                ))
            })?;
        values.insert(assignment.symbol.clone(), value);
    }

    Ok(values)
}

/// Net production of `species` over all reactions, as an infix formula.
fn species_balance(model: &SbmlModel, species: &str, rates: &HashMap<String, Expr>) -> Result<String> {
    let mut balance: Option<Expr> = None;

    for reaction in &model.reactions {
        let consumed = reaction.reactants.iter().filter(|r| r.species == species);
        let produced = reaction.products.iter().filter(|r| r.species == species);
        let terms = consumed
            .map(|r| (false, r.stoichiometry))
            .chain(produced.map(|r| (true, r.stoichiometry)));

        for (is_product, stoichiometry) in terms {
            let rate = rates.get(&reaction.id).ok_or_else(|| {
                ConvertError::dae(format!(
                    "reaction '{}' changes '{}' but has no kinetic law",
                    reaction.id, species
                ))
            })?;
            let term = if stoichiometry == 1.0 {
                rate.clone()
            } else {
                Expr::binary(BinaryOp::Mul, Expr::Number(stoichiometry), rate.clone())
            };

            balance = Some(match (balance, is_product) {
                (None, true) => term,
                (None, false) => Expr::Neg(Box::new(term)),
                (Some(acc), true) => Expr::binary(BinaryOp::Add, acc, term),
                (Some(acc), false) => Expr::binary(BinaryOp::Sub, acc, term),
            });
        }
    }

    Ok(balance
        .map(|b| b.to_formula())
        .unwrap_or_else(|| "0".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbml::parse_sbml;

    fn build(xml: &str) -> Result<DaeModel> {
        let document = parse_sbml(xml.as_bytes())?;
        DaeBuilder::new(SimulationOptions::default()).build(&document)
    }

    const REVERSIBLE: &str = r#"<sbml level="3" version="2"><model id="reversible">
      <listOfCompartments><compartment id="cell" size="2" constant="true"/></listOfCompartments>
      <listOfSpecies>
        <species id="A" compartment="cell" initialConcentration="10" boundaryCondition="false" constant="false"/>
        <species id="B" compartment="cell" initialConcentration="0" boundaryCondition="false" constant="false"/>
        <species id="E" compartment="cell" initialConcentration="1" boundaryCondition="false" constant="true"/>
      </listOfSpecies>
      <listOfParameters>
        <parameter id="kf" value="0.3" constant="true"/>
        <parameter id="kr" value="0.1" constant="true"/>
      </listOfParameters>
      <listOfReactions>
        <reaction id="fwd" reversible="false">
          <listOfReactants><speciesReference species="A" stoichiometry="2"/></listOfReactants>
          <listOfProducts><speciesReference species="B"/></listOfProducts>
          <kineticLaw><math><apply><times/><ci>kf</ci><ci>E</ci><ci>A</ci></apply></math></kineticLaw>
        </reaction>
        <reaction id="rev" reversible="false">
          <listOfReactants><speciesReference species="B"/></listOfReactants>
          <listOfProducts><speciesReference species="A" stoichiometry="2"/></listOfProducts>
          <kineticLaw>
            <math><apply><times/><ci>k</ci><ci>B</ci></apply></math>
            <listOfLocalParameters><localParameter id="k" value="0.1"/></listOfLocalParameters>
          </kineticLaw>
        </reaction>
      </listOfReactions>
    </model></sbml>"#;

    #[test]
    fn test_reaction_network_becomes_odes() {
        let dae = build(REVERSIBLE).unwrap();
        assert_eq!(dae.name, "reversible");

        let a = dae.state("A").unwrap();
        assert_eq!(a.state_type, StateType::Ode);
        assert_eq!(a.equation, "-2*kf*E*A + 2*rev_k*B");
        assert_eq!(a.initial_condition, 10.0);
        assert_eq!(a.context, "cell");

        let b = dae.state("B").unwrap();
        assert_eq!(b.equation, "kf*E*A - rev_k*B");

        // Constant species and compartments are parameters.
        assert!(dae.state("E").is_none());
        let ids: Vec<&str> = dae.parameters.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["E", "kf", "kr", "cell", "rev_k"]);
        assert_eq!(dae.parameters[3].value, 2.0);
    }

    #[test]
    fn test_rules_classify_states() {
        let xml = r#"<sbml><model id="rules">
          <listOfCompartments><compartment id="c" constant="true"/></listOfCompartments>
          <listOfSpecies>
            <species id="S" compartment="c" initialAmount="1" boundaryCondition="true" constant="false"/>
          </listOfSpecies>
          <listOfParameters>
            <parameter id="v" value="2" constant="false"/>
            <parameter id="total" constant="false"/>
            <parameter id="z" value="3" constant="false"/>
          </listOfParameters>
          <listOfRules>
            <rateRule variable="v"><math><apply><minus/><ci>v</ci></apply></math></rateRule>
            <assignmentRule variable="total"><math><apply><plus/><ci>v</ci><ci>S</ci></apply></math></assignmentRule>
            <algebraicRule><math><apply><minus/><ci>z</ci><apply><times/><cn>2</cn><ci>v</ci></apply></apply></math></algebraicRule>
          </listOfRules>
        </model></sbml>"#;

        let dae = build(xml).unwrap();
        let kinds: Vec<(&str, StateType)> = dae
            .states
            .iter()
            .map(|s| (s.id.as_str(), s.state_type))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("S", StateType::Ode),
                ("v", StateType::Ode),
                ("total", StateType::Assignment),
                ("z", StateType::Algebraic),
            ]
        );
        assert_eq!(dae.state("S").unwrap().equation, "0");
        assert_eq!(dae.state("v").unwrap().equation, "-v");
        assert_eq!(dae.state("z").unwrap().equation, "z - 2*v");
        assert_eq!(dae.state("z").unwrap().context, PARAMETERS_CONTEXT);
        assert_eq!(dae.parameters.len(), 1);
        assert_eq!(dae.parameters[0].id, "c");
        assert_eq!(dae.parameters[0].value, 1.0);
    }

    #[test]
    fn test_initial_assignment_overrides_value() {
        let xml = r#"<sbml><model id="ia">
          <listOfCompartments><compartment id="c" size="1" constant="true"/></listOfCompartments>
          <listOfSpecies>
            <species id="A" compartment="c" initialConcentration="1" boundaryCondition="false" constant="false"/>
          </listOfSpecies>
          <listOfParameters><parameter id="A0" value="4" constant="true"/></listOfParameters>
          <listOfInitialAssignments>
            <initialAssignment symbol="A"><math><apply><times/><cn>2</cn><ci>A0</ci></apply></math></initialAssignment>
          </listOfInitialAssignments>
        </model></sbml>"#;

        let dae = build(xml).unwrap();
        assert_eq!(dae.state("A").unwrap().initial_condition, 8.0);
        assert_eq!(dae.state("A").unwrap().equation, "0");
    }

    #[test]
    fn test_cyclic_assignment_rules_are_rejected() {
        let xml = r#"<sbml><model id="cycle">
          <listOfParameters>
            <parameter id="a" constant="false"/>
            <parameter id="b" constant="false"/>
          </listOfParameters>
          <listOfRules>
            <assignmentRule variable="a"><math><ci>b</ci></math></assignmentRule>
            <assignmentRule variable="b"><math><ci>a</ci></math></assignmentRule>
          </listOfRules>
        </model></sbml>"#;

        let err = build(xml).unwrap_err();
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn test_algebraic_rule_without_free_variable() {
        let xml = r#"<sbml><model id="alg">
          <listOfParameters><parameter id="k" value="1" constant="true"/></listOfParameters>
          <listOfRules><algebraicRule><math><ci>k</ci></math></algebraicRule></listOfRules>
        </model></sbml>"#;

        let err = build(xml).unwrap_err();
        assert!(err.to_string().contains("no free variable"));
    }

    #[test]
    fn test_rule_on_unknown_or_constant_variable() {
        let unknown = r#"<sbml><model id="m"><listOfRules>
            <assignmentRule variable="ghost"><math><cn>1</cn></math></assignmentRule>
        </listOfRules></model></sbml>"#;
        assert!(build(unknown).unwrap_err().to_string().contains("ghost"));

        let constant = r#"<sbml><model id="m">
          <listOfParameters><parameter id="k" value="1" constant="true"/></listOfParameters>
          <listOfRules><rateRule variable="k"><math><cn>1</cn></math></rateRule></listOfRules>
        </model></sbml>"#;
        assert!(build(constant).unwrap_err().to_string().contains("constant"));
    }

    #[test]
    fn test_reaction_without_kinetic_law() {
        let xml = r#"<sbml><model id="m">
          <listOfCompartments><compartment id="c" constant="true"/></listOfCompartments>
          <listOfSpecies>
            <species id="A" compartment="c" boundaryCondition="false" constant="false"/>
          </listOfSpecies>
          <listOfReactions>
            <reaction id="r"><listOfReactants><speciesReference species="A"/></listOfReactants></reaction>
          </listOfReactions>
        </model></sbml>"#;

        let err = build(xml).unwrap_err();
        assert!(err.to_string().contains("no kinetic law"));
    }

    #[test]
    fn test_duplicate_identifier() {
        let xml = r#"<sbml><model id="m">
          <listOfCompartments><compartment id="k" constant="true"/></listOfCompartments>
          <listOfParameters><parameter id="k" value="1" constant="true"/></listOfParameters>
        </model></sbml>"#;

        let err = build(xml).unwrap_err();
        assert!(matches!(err, ConvertError::DaeBuildError { .. }));
        assert!(err.to_string().contains("'k' is declared twice"));
    }

    #[test]
    fn test_two_rules_on_one_variable() {
        let xml = r#"<sbml><model id="m">
          <listOfParameters><parameter id="v" constant="false"/></listOfParameters>
          <listOfRules>
            <assignmentRule variable="v"><math><cn>1</cn></math></assignmentRule>
            <rateRule variable="v"><math><cn>2</cn></math></rateRule>
          </listOfRules>
        </model></sbml>"#;

        let err = build(xml).unwrap_err();
        assert!(err.to_string().contains("'v' is the target of more than one rule"));
    }

    #[test]
    fn test_renamed_local_parameter_collision() {
        let xml = r#"<sbml><model id="m">
          <listOfCompartments><compartment id="c" constant="true"/></listOfCompartments>
          <listOfSpecies>
            <species id="A" compartment="c" boundaryCondition="false" constant="false"/>
          </listOfSpecies>
          <listOfParameters><parameter id="r_k" value="5" constant="true"/></listOfParameters>
          <listOfReactions>
            <reaction id="r">
              <listOfReactants><speciesReference species="A"/></listOfReactants>
              <kineticLaw>
                <math><apply><times/><ci>k</ci><ci>A</ci></apply></math>
                <listOfLocalParameters><localParameter id="k" value="0.1"/></listOfLocalParameters>
              </kineticLaw>
            </reaction>
          </listOfReactions>
        </model></sbml>"#;

        let err = build(xml).unwrap_err();
        assert!(err
            .to_string()
            .contains("local parameter 'k' of reaction 'r' collides with 'r_k'"));
    }

    #[test]
    fn test_initial_assignment_to_unknown_symbol() {
        let xml = r#"<sbml><model id="m">
          <listOfInitialAssignments>
            <initialAssignment symbol="ghost"><math><cn>1</cn></math></initialAssignment>
          </listOfInitialAssignments>
        </model></sbml>"#;

        let err = build(xml).unwrap_err();
        assert!(err
            .to_string()
            .contains("initial assignment targets unknown symbol 'ghost'"));
    }

    #[test]
    fn test_initial_assignment_that_cannot_be_evaluated() {
        let xml = r#"<sbml><model id="m">
          <listOfParameters><parameter id="k" constant="true"/></listOfParameters>
          <listOfInitialAssignments>
            <initialAssignment symbol="k"><math><apply><times/><cn>2</cn><ci>missing</ci></apply></math></initialAssignment>
          </listOfInitialAssignments>
        </model></sbml>"#;

        let err = build(xml).unwrap_err();
        assert!(matches!(err, ConvertError::DaeBuildError { .. }));
        let message = err.to_string();
        assert!(message.contains("cannot evaluate initial assignment of 'k'"));
        assert!(message.contains("unknown identifier 'missing'"));
    }

    #[test]
    fn test_reserved_names_still_build() {
        let xml = r#"<sbml><model id="m">
          <listOfCompartments><compartment id="obj" constant="true"/></listOfCompartments>
          <listOfSpecies>
            <species id="x" compartment="obj" initialAmount="1" boundaryCondition="true" constant="false"/>
          </listOfSpecies>
          <listOfParameters><parameter id="p" value="3" constant="true"/></listOfParameters>
        </model></sbml>"#;

        let dae = build(xml).unwrap();
        assert_eq!(dae.state("x").unwrap().equation, "0");
        let ids: Vec<&str> = dae.parameters.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p", "obj"]);
    }

    #[test]
    fn test_name_override_and_invalid_name() {
        let document = parse_sbml(REVERSIBLE.as_bytes()).unwrap();
        let dae = DaeBuilder::new(SimulationOptions::default())
            .with_name(Some("Renamed".to_string()))
            .build(&document)
            .unwrap();
        assert_eq!(dae.name, "Renamed");

        let err = DaeBuilder::new(SimulationOptions::default())
            .with_name(Some("_hidden".to_string()))
            .build(&document)
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfigValueError { .. }));
    }
}
