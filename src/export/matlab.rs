//! MATLAB export: a `classdef` holding the DAE plus an example driver script.

use super::{Exporter, RenderedFile};
use crate::domain::model::{DaeModel, StateType};
use crate::expr::{format_number, tokenize, TokenKind};
use crate::utils::error::{ConvertError, Result};
use std::fmt::{self, Write};

/// Helper functions appended to the class file when an equation calls them.
const HELPERS: [(&str, &str); 3] = [
    (
        "piecewise",
        "function y = piecewise(varargin)
\t% Evaluate piecewise(value1, condition1, ..., otherwise) element-wise.
\tn = numel(varargin);
\tif mod(n, 2) == 1
\t\ty = varargin{n};
\telse
\t\ty = NaN;
\tend
\tfor k = n - mod(n, 2) - 1:-2:1
\t\tc = logical(varargin{k+1}) & true(size(y));
\t\tv = varargin{k}.*ones(size(c));
\t\ty = y.*ones(size(c));
\t\ty(c) = v(c);
\tend
end
",
    ),
    (
        "root",
        "function y = root(n, x)
\t% n-th root of x.
\ty = x.^(1./n);
end
",
    ),
    (
        "logbase",
        "function y = logbase(b, x)
\t% Logarithm of x in base b.
\ty = log(x)./log(b);
end
",
    ),
];

#[derive(Debug, Clone)]
pub struct MatlabExporter {
    example: bool,
}

impl MatlabExporter {
    pub fn new(example: bool) -> Self {
        Self { example }
    }

    pub fn class_file_name(model: &DaeModel) -> String {
        format!("{}.m", model.name)
    }

    pub fn example_file_name(model: &DaeModel) -> String {
        format!("{}_example.m", model.name)
    }

    pub fn render_class(&self, model: &DaeModel) -> Result<String> {
        let order = model.assignment_order()?;
        let mut out = String::new();
        ClassWriter {
            model,
            assignments: order.iter().map(|s| (s.id.as_str(), s.equation.as_str())).collect(),
            out: &mut out,
        }
        .write()
        .map_err(fmt_error)?;
        Ok(out)
    }

    pub fn render_example(&self, model: &DaeModel) -> Result<String> {
        let mut out = String::new();
        write_example(model, &mut out).map_err(fmt_error)?;
        Ok(out)
    }
}

impl Exporter for MatlabExporter {
    fn render(&self, model: &DaeModel) -> Result<Vec<RenderedFile>> {
        let mut files = vec![RenderedFile::new(
            Self::class_file_name(model),
            self.render_class(model)?,
        )];
        if self.example {
            files.push(RenderedFile::new(
                Self::example_file_name(model),
                self.render_example(model)?,
            ));
        }
        Ok(files)
    }
}

fn fmt_error(e: fmt::Error) -> ConvertError {
    ConvertError::ExportError {
        message: format!("failed to render MATLAB code: {}", e),
    }
}

/// Translate an infix formula into element-wise MATLAB.
///
/// Parameters become fields of `p`, `* / ^` become `.* ./ .^`, logical
/// operators map to their MATLAB spelling, everything else is copied.
pub fn to_matlab(model: &DaeModel, formula: &str) -> String {
    let tokens = tokenize(formula);
    let mut result = String::new();

    for (i, token) in tokens.iter().enumerate() {
        let is_call = tokens.get(i + 1).is_some_and(|next| next.text == "(");
        match (token.kind, token.text.as_str()) {
            (TokenKind::Name, "ln") if is_call => result.push_str("log"),
            (TokenKind::Name, "log") if is_call => result.push_str("logbase"),
            (TokenKind::Name, name) if !is_call && model.is_parameter(name) => {
                result.push_str("p.");
                result.push_str(name);
            }
            (TokenKind::Op, op @ ("*" | "/" | "^")) => {
                result.push('.');
                result.push_str(op);
            }
            (TokenKind::Op, op @ ("+" | "-")) => {
                result.push(' ');
                result.push_str(op);
                result.push(' ');
            }
            (TokenKind::Op, "!=") => result.push_str("~="),
            (TokenKind::Op, "!") => result.push('~'),
            (TokenKind::Op, "&&") => result.push_str(" & "),
            (TokenKind::Op, "||") => result.push_str(" | "),
            (TokenKind::Op, ",") => result.push_str(", "),
            (_, text) => result.push_str(text),
        }
    }

    result.trim().to_string()
}

/// Rows and columns of the subplot grid for `n` plots.
pub fn subplot_grid(n: usize) -> (usize, usize) {
    let x = (n as f64).sqrt().ceil() as usize;
    let mut y = x;
    while y > 0 && x * (y - 1) >= n {
        y -= 1;
    }
    (x, y)
}

fn write_warning(out: &mut String, tabs: usize) -> fmt::Result {
    let tab = "\t".repeat(tabs);
    writeln!(out, "{}% This file was automatically generated by sbml2dae.", tab)?;
    writeln!(
        out,
        "{}% Any changes you make to it will be overwritten the next time",
        tab
    )?;
    writeln!(out, "{}% the file is generated.", tab)?;
    writeln!(out)
}

fn write_example(model: &DaeModel, out: &mut String) -> fmt::Result {
    let name = &model.name;
    writeln!(out, "%% Example driver script for simulating \"{}\" model.", name)?;
    write_warning(out, 0)?;

    writeln!(out, "clear all;")?;
    writeln!(out, "close all;")?;

    writeln!(out, "\n% Init model.")?;
    writeln!(out, "m = {}();", name)?;

    writeln!(out, "\n% Solver options.")?;
    writeln!(out, "opt = odeset('AbsTol',1e-8,'RelTol',1e-8);")?;
    writeln!(out, "opt = odeset(opt,'Mass',m.M);")?;

    writeln!(out, "\n% Simulation time span.")?;
    writeln!(out, "tspan = [m.opts.t_init m.opts.t_end];")?;

    writeln!(out, "\n[t,x] = ode15s(@(t,x) m.ode(t,x,m.p),tspan,m.x0,opt);")?;
    writeln!(out, "out = m.simout2struct(t,x,m.p);")?;

    writeln!(out, "\n% Plot result.")?;
    writeln!(out, "m.plot(out);")
}

struct ClassWriter<'a> {
    model: &'a DaeModel,
    /// Assignment states in evaluation order, as `(id, equation)`.
    assignments: Vec<(&'a str, &'a str)>,
    out: &'a mut String,
}

impl ClassWriter<'_> {
    fn write(&mut self) -> fmt::Result {
        self.write_header()?;
        self.write_constructor()?;
        self.write_default_parameters()?;
        self.write_initial_conditions()?;
        self.write_mass_matrix()?;
        self.write_simulation_options()?;
        self.write_ode()?;
        writeln!(self.out)?;
        self.write_simout_to_struct()?;
        writeln!(self.out)?;
        self.write_plot()?;
        writeln!(self.out, "\tend")?;
        writeln!(self.out, "end")?;
        self.write_helpers()
    }

    fn matlab(&self, formula: &str) -> String {
        to_matlab(self.model, formula)
    }

    fn write_header(&mut self) -> fmt::Result {
        writeln!(self.out, "classdef {}", self.model.name)?;
        write_warning(self.out, 1)?;

        writeln!(self.out, "\tproperties")?;
        writeln!(self.out, "\t\tp      % Default model parameters.")?;
        writeln!(self.out, "\t\tx0     % Default initial conditions.")?;
        writeln!(self.out, "\t\tM      % Mass matrix for DAE systems.")?;
        writeln!(self.out, "\t\topts   % Simulation options.")?;
        writeln!(self.out, "\tend")?;
        writeln!(self.out)?;

        writeln!(self.out, "\tmethods")
    }

    fn write_constructor(&mut self) -> fmt::Result {
        let name = &self.model.name;
        writeln!(self.out, "\t\tfunction obj = {}()", name)?;
        writeln!(self.out, "\t\t\t%% Constructor of {}.", name)?;
        writeln!(self.out, "\t\t\tobj.p    = obj.default_parameters();")?;
        writeln!(self.out, "\t\t\tobj.x0   = obj.initial_conditions();")?;
        writeln!(self.out, "\t\t\tobj.M    = obj.mass_matrix();")?;
        writeln!(self.out, "\t\t\tobj.opts = obj.simulation_options();")?;
        writeln!(self.out, "\t\tend")?;
        writeln!(self.out)
    }

    fn write_default_parameters(&mut self) -> fmt::Result {
        writeln!(self.out, "\t\tfunction p = default_parameters(~)")?;
        writeln!(self.out, "\t\t\t%% Default parameters value.")?;
        writeln!(self.out, "\t\t\tp = [];")?;
        for parameter in &self.model.parameters {
            writeln!(
                self.out,
                "\t\t\tp.{} = {};",
                parameter.id,
                format_number(parameter.value)
            )?;
        }
        writeln!(self.out, "\t\tend")?;
        writeln!(self.out)
    }

    fn write_initial_conditions(&mut self) -> fmt::Result {
        writeln!(self.out, "\t\tfunction x0 = initial_conditions(~)")?;
        writeln!(self.out, "\t\t\t%% Default initial conditions.")?;
        writeln!(self.out, "\t\t\tx0 = [")?;
        for state in self.model.integrated_states() {
            let value = format_number(state.initial_condition);
            match state.state_type {
                StateType::Algebraic => {
                    writeln!(self.out, "\t\t\t\t{} % {} (algebraic)", value, state.id)?
                }
                _ => writeln!(self.out, "\t\t\t\t{} % {}", value, state.id)?,
            }
        }
        writeln!(self.out, "\t\t\t];")?;
        writeln!(self.out, "\t\tend")?;
        writeln!(self.out)
    }

    fn write_mass_matrix(&mut self) -> fmt::Result {
        writeln!(self.out, "\t\tfunction M = mass_matrix(~)")?;
        writeln!(self.out, "\t\t\t%% Mass matrix for DAE systems.")?;
        writeln!(self.out, "\t\t\tM = [")?;

        let diagonal: Vec<u8> = self
            .model
            .integrated_states()
            .map(|s| u8::from(s.state_type == StateType::Ode))
            .collect();
        let n = diagonal.len();
        for (i, d) in diagonal.iter().enumerate() {
            writeln!(
                self.out,
                "\t\t\t\t{}{} {}",
                "0 ".repeat(i),
                d,
                "0 ".repeat(n - i - 1)
            )?;
        }

        writeln!(self.out, "\t\t\t];")?;
        writeln!(self.out, "\t\tend")?;
        writeln!(self.out)
    }

    fn write_simulation_options(&mut self) -> fmt::Result {
        writeln!(self.out, "\t\tfunction opts = simulation_options(~)")?;
        writeln!(self.out, "\t\t\t%% Default simulation options.")?;
        for (key, value) in self.model.options.entries() {
            writeln!(self.out, "\t\t\topts.{} = {};", key, value)?;
        }
        writeln!(self.out, "\t\tend")?;
        writeln!(self.out)
    }

    fn write_local_states(&mut self) -> fmt::Result {
        writeln!(self.out, "\t\t\t% ODE and algebraic states:")?;
        for (i, state) in self.model.integrated_states().enumerate() {
            writeln!(self.out, "\t\t\t{} = x({},:);", state.id, i + 1)?;
        }
        writeln!(self.out)?;

        writeln!(self.out, "\t\t\t% Assignment states:")?;
        for (id, equation) in &self.assignments {
            let equation = self.matlab(equation);
            writeln!(self.out, "\t\t\t{} = {};", id, equation)?;
        }
        writeln!(self.out)
    }

    fn write_ode(&mut self) -> fmt::Result {
        writeln!(self.out, "\t\tfunction dx = ode(~,t,x,p)")?;
        writeln!(self.out, "\t\t\t%% Evaluate the ODE.")?;
        writeln!(self.out, "\t\t\t%")?;

        writeln!(self.out, "\t\t\t% Args:")?;
        writeln!(self.out, "\t\t\t%\t t Current time in the simulation.")?;
        writeln!(self.out, "\t\t\t%\t x Array with the state value.")?;
        writeln!(self.out, "\t\t\t%\t p Struct with the parameters.")?;
        writeln!(self.out, "\t\t\t%")?;

        writeln!(self.out, "\t\t\t% Return:")?;
        writeln!(self.out, "\t\t\t%\t dx Array with the ODE.")?;
        writeln!(self.out)?;

        self.write_local_states()?;

        let model = self.model;
        for (i, state) in model.integrated_states().enumerate() {
            let equation = self.matlab(&state.equation);
            writeln!(self.out, "\t\t\t% der({})", state.id)?;
            writeln!(self.out, "\t\t\tdx({},1) = {};", i + 1, equation)?;
            writeln!(self.out)?;
        }

        writeln!(self.out, "\t\tend")
    }

    fn write_simout_to_struct(&mut self) -> fmt::Result {
        writeln!(self.out, "\t\tfunction out = simout2struct(~,t,x,p)")?;
        writeln!(
            self.out,
            "\t\t\t%% Convert the simulation output into an easy-to-use struct."
        )?;
        writeln!(self.out)?;

        writeln!(self.out, "\t\t\t% We need to transpose state matrix.")?;
        writeln!(self.out, "\t\t\tx = x';")?;

        self.write_local_states()?;

        writeln!(self.out, "\t\t\t% Save simulation time.")?;
        writeln!(self.out, "\t\t\tout.t = t;")?;
        writeln!(self.out)?;

        writeln!(
            self.out,
            "\t\t\t% Vector for extending single-value states and parameters."
        )?;
        writeln!(self.out, "\t\t\tones_t = ones(size(t'));")?;
        writeln!(self.out)?;

        writeln!(self.out, "\t\t\t% Save states.")?;
        for state in &self.model.states {
            writeln!(self.out, "\t\t\tout.{id} = ({id}.*ones_t)';", id = state.id)?;
        }
        writeln!(self.out)?;

        writeln!(self.out, "\t\t\t% Save parameters.")?;
        for parameter in &self.model.parameters {
            writeln!(
                self.out,
                "\t\t\tout.{id} = (p.{id}.*ones_t)';",
                id = parameter.id
            )?;
        }
        writeln!(self.out)?;

        writeln!(self.out, "\t\tend")
    }

    fn write_plot(&mut self) -> fmt::Result {
        writeln!(self.out, "\t\tfunction plot(~,out)")?;
        writeln!(self.out, "\t\t\t%% Plot simulation result.")?;

        for (context, states) in self.model.contexts() {
            let (x, y) = subplot_grid(states.len());
            writeln!(self.out, "\t\t\tfigure('Name','{}');", context)?;

            for (i, state) in states.iter().enumerate() {
                writeln!(self.out, "\t\t\tsubplot({},{},{});", x, y, i + 1)?;
                writeln!(self.out, "\t\t\tplot(out.t, out.{});", state.id)?;
                writeln!(self.out, "\t\t\ttitle(\"{}\");", state.id)?;
                writeln!(self.out, "\t\t\tylim([0, +inf]);")?;
                writeln!(self.out, "\t\t\tgrid on;")?;
                writeln!(self.out)?;
            }
        }

        writeln!(self.out, "\t\tend")
    }

    fn write_helpers(&mut self) -> fmt::Result {
        let used: Vec<&str> = self
            .model
            .states
            .iter()
            .flat_map(|s| {
                let matlab = to_matlab(self.model, &s.equation);
                HELPERS
                    .iter()
                    .filter(move |(name, _)| calls(&matlab, name))
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
            })
            .collect();

        for (name, source) in HELPERS.iter() {
            if used.contains(name) {
                writeln!(self.out)?;
                self.out.write_str(source)?;
            }
        }
        Ok(())
    }
}

/// Whether the MATLAB expression calls function `name`.
fn calls(matlab: &str, name: &str) -> bool {
    let tokens = tokenize(matlab);
    tokens
        .windows(2)
        .any(|w| w[0].is_name(name) && w[1].text == "(")
}
