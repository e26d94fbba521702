use crate::expr::{format_number, tokenize, TokenKind};
use crate::utils::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    /// `dx/dt = f(x)`, a 1 on the mass matrix diagonal.
    Ode,
    /// `0 = g(x)`, a 0 on the mass matrix diagonal.
    Algebraic,
    /// `x = h(...)`, computed from the other states and never integrated.
    Assignment,
}

impl StateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ode => "ode",
            Self::Algebraic => "algebraic",
            Self::Assignment => "assignment",
        }
    }

    /// Whether the state is part of the integrated vector `x`.
    pub fn is_integrated(self) -> bool {
        matches!(self, Self::Ode | Self::Algebraic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: String,
    #[serde(rename = "type")]
    pub state_type: StateType,
    pub initial_condition: f64,
    pub equation: String,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameter {
    pub id: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOptions {
    pub t_init: f64,
    pub t_end: f64,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            t_init: 0.0,
            t_end: 10.0,
            extra: BTreeMap::new(),
        }
    }
}

impl SimulationOptions {
    /// `(key, value)` pairs as they appear in the generated code: times first, then extras.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("t_init".to_string(), format_number(self.t_init)),
            ("t_end".to_string(), format_number(self.t_end)),
        ];
        entries.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaeModel {
    pub name: String,
    pub states: Vec<State>,
    pub parameters: Vec<ModelParameter>,
    pub options: SimulationOptions,
}

impl DaeModel {
    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.iter().find(|s| s.id == id)
    }

    /// ODE and algebraic states, in the order they occupy in the state vector.
    pub fn integrated_states(&self) -> impl Iterator<Item = &State> {
        self.states.iter().filter(|s| s.state_type.is_integrated())
    }

    pub fn is_parameter(&self, id: &str) -> bool {
        self.parameters.iter().any(|p| p.id == id)
    }

    pub fn count(&self, state_type: StateType) -> usize {
        self.states
            .iter()
            .filter(|s| s.state_type == state_type)
            .count()
    }

    /// State ids referenced by `equation`, in order of appearance.
    pub fn state_dependencies(&self, equation: &str) -> Vec<String> {
        let mut deps: Vec<String> = Vec::new();
        for token in tokenize(equation) {
            if token.kind == TokenKind::Name
                && self.state(&token.text).is_some()
                && !deps.contains(&token.text)
            {
                deps.push(token.text);
            }
        }
        deps
    }

    /// Assignment states ordered so each one follows every assignment state it reads.
    /// Ties keep declaration order. A cyclic dependency is an error.
    pub fn assignment_order(&self) -> Result<Vec<&State>> {
        let pending: Vec<(&State, Vec<String>)> = self
            .states
            .iter()
            .filter(|s| s.state_type == StateType::Assignment)
            .map(|s| (s, self.state_dependencies(&s.equation)))
            .collect();

        let mut known: HashSet<&str> = self
            .integrated_states()
            .map(|s| s.id.as_str())
            .collect();
        let mut ordered: Vec<&State> = Vec::with_capacity(pending.len());

        while ordered.len() < pending.len() {
            let mut progressed = false;
            for (state, deps) in &pending {
                let state: &State = *state;
                if known.contains(state.id.as_str()) {
                    continue;
                }
                if deps.iter().all(|d| known.contains(d.as_str())) {
                    known.insert(state.id.as_str());
                    ordered.push(state);
                    progressed = true;
                }
            }

            if !progressed {
                let stuck: Vec<&str> = pending
                    .iter()
                    .map(|(s, _)| s.id.as_str())
                    .filter(|id| !known.contains(id))
                    .collect();
                return Err(ConvertError::dae(format!(
                    "cyclic assignment rules between: {}",
                    stuck.join(", ")
                )));
            }
        }

        Ok(ordered)
    }

    /// States grouped by context, groups in order of first appearance.
    pub fn contexts(&self) -> Vec<(&str, Vec<&State>)> {
        let mut groups: Vec<(&str, Vec<&State>)> = Vec::new();
        for state in &self.states {
            match groups.iter_mut().find(|(c, _)| *c == state.context) {
                Some((_, members)) => members.push(state),
                None => groups.push((state.context.as_str(), vec![state])),
            }
        }
        groups
    }
}

/// Which renderers run during the load phase. The MATLAB class is always written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSelection {
    pub example: bool,
    pub json: bool,
    pub csv: bool,
    pub zip: bool,
}

impl Default for ExportSelection {
    fn default() -> Self {
        Self {
            example: true,
            json: false,
            csv: false,
            zip: false,
        }
    }
}
