use super::mathml::parse_optional_math;
use super::model::*;
use super::xml::{parse_document, Element};
use crate::expr::Expr;
use crate::utils::error::{ConvertError, Result};

pub fn parse_sbml(bytes: &[u8]) -> Result<SbmlDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ConvertError::sbml("sbml", format!("document is not valid UTF-8: {}", e)))?;
    let root = parse_document(text)?;

    if root.name != "sbml" {
        return Err(ConvertError::sbml(
            &root.name,
            "root element must be <sbml>",
        ));
    }

    let level = root.attr("level").and_then(|v| v.trim().parse().ok());
    let version = root.attr("version").and_then(|v| v.trim().parse().ok());
    let model = root
        .child("model")
        .ok_or_else(|| ConvertError::sbml("sbml", "document has no <model>"))?;

    tracing::debug!(?level, ?version, "Parsing SBML model");

    Ok(SbmlDocument {
        level,
        version,
        model: read_model(model)?,
    })
}

fn read_model(model: &Element) -> Result<SbmlModel> {
    let id = model
        .attr("id")
        .or_else(|| model.attr("name"))
        .ok_or_else(|| ConvertError::sbml("model", "missing required attribute 'id'"))?
        .to_string();

    let compartments = model
        .list_items("listOfCompartments", "compartment")
        .map(read_compartment)
        .collect::<Result<Vec<_>>>()?;

    let species = model
        .list_items("listOfSpecies", "species")
        .map(read_species)
        .collect::<Result<Vec<_>>>()?;

    let parameters = model
        .list_items("listOfParameters", "parameter")
        .map(read_parameter)
        .collect::<Result<Vec<_>>>()?;

    let initial_assignments = model
        .list_items("listOfInitialAssignments", "initialAssignment")
        .map(|ia| {
            Ok(InitialAssignment {
                symbol: ia.required_attr("symbol")?.to_string(),
                math: required_math(ia)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let rules = match model.child("listOfRules") {
        Some(list) => list
            .children
            .iter()
            .map(read_rule)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let reactions = model
        .list_items("listOfReactions", "reaction")
        .map(read_reaction)
        .collect::<Result<Vec<_>>>()?;

    Ok(SbmlModel {
        id,
        name: model.attr("name").map(str::to_string),
        compartments,
        species,
        parameters,
        initial_assignments,
        rules,
        reactions,
    })
}

fn required_math(element: &Element) -> Result<Expr> {
    parse_optional_math(element)?
        .ok_or_else(|| ConvertError::sbml(&element.name, "missing <math> element"))
}

fn read_compartment(c: &Element) -> Result<Compartment> {
    // Level 2 used `volume` for the size.
    let size = match c.f64_attr("size")? {
        Some(size) => Some(size),
        None => c.f64_attr("volume")?,
    };
    Ok(Compartment {
        id: c.required_attr("id")?.to_string(),
        size,
        constant: c.bool_attr("constant", true)?,
    })
}

fn read_species(s: &Element) -> Result<Species> {
    Ok(Species {
        id: s.required_attr("id")?.to_string(),
        compartment: s.required_attr("compartment")?.to_string(),
        initial_amount: s.f64_attr("initialAmount")?,
        initial_concentration: s.f64_attr("initialConcentration")?,
        boundary_condition: s.bool_attr("boundaryCondition", false)?,
        constant: s.bool_attr("constant", false)?,
    })
}

fn read_parameter(p: &Element) -> Result<Parameter> {
    Ok(Parameter {
        id: p.required_attr("id")?.to_string(),
        value: p.f64_attr("value")?,
        constant: p.bool_attr("constant", true)?,
    })
}

fn read_rule(rule: &Element) -> Result<Rule> {
    match rule.name.as_str() {
        "assignmentRule" => Ok(Rule::Assignment {
            variable: rule.required_attr("variable")?.to_string(),
            math: required_math(rule)?,
        }),
        "rateRule" => Ok(Rule::Rate {
            variable: rule.required_attr("variable")?.to_string(),
            math: required_math(rule)?,
        }),
        "algebraicRule" => Ok(Rule::Algebraic {
            math: required_math(rule)?,
        }),
        other => Err(ConvertError::sbml(other, "unknown rule type")),
    }
}

fn read_species_references(reaction: &Element, list: &str) -> Result<Vec<SpeciesReference>> {
    reaction
        .list_items(list, "speciesReference")
        .map(|r| {
            Ok(SpeciesReference {
                species: r.required_attr("species")?.to_string(),
                stoichiometry: r.f64_attr("stoichiometry")?.unwrap_or(1.0),
            })
        })
        .collect()
}

fn read_reaction(reaction: &Element) -> Result<Reaction> {
    let kinetic_law = match reaction.child("kineticLaw") {
        Some(law) => {
            // Level 3 names them localParameter, Level 2 parameter.
            let local_parameters = law
                .list_items("listOfLocalParameters", "localParameter")
                .chain(law.list_items("listOfParameters", "parameter"))
                .map(read_parameter)
                .collect::<Result<Vec<_>>>()?;
            Some(KineticLaw {
                math: required_math(law)?,
                local_parameters,
            })
        }
        None => None,
    };

    Ok(Reaction {
        id: reaction.required_attr("id")?.to_string(),
        reversible: reaction.bool_attr("reversible", true)?,
        reactants: read_species_references(reaction, "listOfReactants")?,
        products: read_species_references(reaction, "listOfProducts")?,
        kinetic_law,
    })
}
