//! Content MathML → [`Expr`].

use super::xml::{parse_f64, Element};
use crate::expr::{BinaryOp, Constant, Expr};
use crate::utils::error::{ConvertError, Result};

const AVOGADRO: f64 = 6.022_140_76e23;

/// Parse a `<math>` element holding a single expression.
pub fn parse_math(math: &Element) -> Result<Expr> {
    let mut nodes = math.children.iter();
    match (nodes.next(), nodes.next()) {
        (Some(node), None) => parse_node(node),
        (None, _) => Err(ConvertError::sbml("math", "empty math element")),
        (Some(_), Some(_)) => Err(ConvertError::sbml(
            "math",
            "math element must contain exactly one expression",
        )),
    }
}

/// Parse the `<math>` child of `parent`, if present.
pub fn parse_optional_math(parent: &Element) -> Result<Option<Expr>> {
    parent.child("math").map(parse_math).transpose()
}

fn parse_node(node: &Element) -> Result<Expr> {
    match node.name.as_str() {
        "cn" => parse_cn(node),
        "ci" => {
            let id = node.text();
            if id.is_empty() {
                return Err(ConvertError::sbml("ci", "empty identifier"));
            }
            Ok(Expr::Name(id))
        }
        "csymbol" => parse_csymbol(node),
        "pi" => Ok(Expr::Constant(Constant::Pi)),
        "exponentiale" => Ok(Expr::Constant(Constant::ExponentialE)),
        "true" => Ok(Expr::Constant(Constant::True)),
        "false" => Ok(Expr::Constant(Constant::False)),
        "notanumber" => Ok(Expr::Number(f64::NAN)),
        "infinity" => Ok(Expr::Number(f64::INFINITY)),
        "apply" => parse_apply(node),
        "piecewise" => parse_piecewise(node),
        "semantics" => node
            .children
            .first()
            .ok_or_else(|| ConvertError::sbml("semantics", "empty semantics element"))
            .and_then(parse_node),
        other => Err(ConvertError::sbml(other, "unsupported MathML element")),
    }
}

fn parse_number(element: &str, raw: &str) -> Result<f64> {
    parse_f64(raw.trim())
        .ok_or_else(|| ConvertError::sbml(element, format!("malformed number '{}'", raw.trim())))
}

fn parse_cn(node: &Element) -> Result<Expr> {
    match node.attr("type").unwrap_or("real") {
        "e-notation" => {
            let (mantissa, exponent) = sep_parts(node)?;
            parse_number("cn", &format!("{}e{}", mantissa.trim(), exponent.trim())).map(Expr::Number)
        }
        "rational" => {
            let (numerator, denominator) = sep_parts(node)?;
            Ok(Expr::binary(
                BinaryOp::Div,
                Expr::Number(parse_number("cn", numerator)?),
                Expr::Number(parse_number("cn", denominator)?),
            ))
        }
        "integer" | "real" | "double" => parse_number("cn", &node.text()).map(Expr::Number),
        other => Err(ConvertError::sbml(
            "cn",
            format!("unsupported number type '{}'", other),
        )),
    }
}

fn sep_parts(node: &Element) -> Result<(&str, &str)> {
    match node.texts.as_slice() {
        [first, second] => Ok((first.as_str(), second.as_str())),
        _ => Err(ConvertError::sbml(
            "cn",
            "expected two parts separated by <sep/>",
        )),
    }
}

fn parse_csymbol(node: &Element) -> Result<Expr> {
    let url = node.attr("definitionURL").unwrap_or_default();
    if url.ends_with("/time") {
        Ok(Expr::Time)
    } else if url.ends_with("/avogadro") {
        Ok(Expr::Number(AVOGADRO))
    } else {
        Err(ConvertError::sbml(
            "csymbol",
            format!("unsupported symbol '{}'", url),
        ))
    }
}

fn parse_piecewise(node: &Element) -> Result<Expr> {
    let mut pieces = Vec::new();
    let mut otherwise = None;

    for child in &node.children {
        match child.name.as_str() {
            "piece" => match child.children.as_slice() {
                [value, condition] => pieces.push((parse_node(value)?, parse_node(condition)?)),
                _ => {
                    return Err(ConvertError::sbml(
                        "piece",
                        "piece must hold a value and a condition",
                    ))
                }
            },
            "otherwise" => {
                let value = child
                    .children
                    .first()
                    .ok_or_else(|| ConvertError::sbml("otherwise", "empty otherwise element"))?;
                otherwise = Some(Box::new(parse_node(value)?));
            }
            other => return Err(ConvertError::sbml(other, "unexpected element in piecewise")),
        }
    }

    Ok(Expr::Piecewise { pieces, otherwise })
}

fn qualifier(node: &Element, name: &str) -> Result<Option<Expr>> {
    node.child(name)
        .map(|q| {
            q.children
                .first()
                .ok_or_else(|| ConvertError::sbml(name, "empty qualifier"))
                .and_then(parse_node)
        })
        .transpose()
}

fn parse_apply(node: &Element) -> Result<Expr> {
    let (operator, rest) = node
        .children
        .split_first()
        .ok_or_else(|| ConvertError::sbml("apply", "empty apply element"))?;

    let args = rest
        .iter()
        .filter(|c| !matches!(c.name.as_str(), "degree" | "logbase" | "bvar"))
        .map(parse_node)
        .collect::<Result<Vec<_>>>()?;

    let op = operator.name.as_str();
    let arity = |expected: usize| -> Result<()> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ConvertError::sbml(
                op,
                format!("expected {} argument(s), found {}", expected, args.len()),
            ))
        }
    };

    match op {
        "plus" => Ok(Expr::fold(BinaryOp::Add, args).unwrap_or(Expr::Number(0.0))),
        "times" => Ok(Expr::fold(BinaryOp::Mul, args).unwrap_or(Expr::Number(1.0))),
        "and" => Ok(Expr::fold(BinaryOp::And, args).unwrap_or(Expr::Constant(Constant::True))),
        "or" => Ok(Expr::fold(BinaryOp::Or, args).unwrap_or(Expr::Constant(Constant::False))),
        "minus" => match args.len() {
            1 => Ok(Expr::Neg(Box::new(one(args)))),
            2 => Ok(two(BinaryOp::Sub, args)),
            n => Err(ConvertError::sbml(
                "minus",
                format!("expected 1 or 2 arguments, found {}", n),
            )),
        },
        "not" => {
            arity(1)?;
            Ok(Expr::Not(Box::new(one(args))))
        }
        "divide" => {
            arity(2)?;
            Ok(two(BinaryOp::Div, args))
        }
        "power" => {
            arity(2)?;
            Ok(two(BinaryOp::Pow, args))
        }
        "eq" | "neq" | "lt" | "gt" | "leq" | "geq" => {
            let relation = match op {
                "eq" => BinaryOp::Eq,
                "neq" => BinaryOp::Neq,
                "lt" => BinaryOp::Lt,
                "gt" => BinaryOp::Gt,
                "leq" => BinaryOp::Leq,
                _ => BinaryOp::Geq,
            };
            relational_chain(op, relation, args)
        }
        "root" => {
            arity(1)?;
            match qualifier(node, "degree")? {
                None => Ok(Expr::call("sqrt", args)),
                Some(Expr::Number(d)) if d == 2.0 => Ok(Expr::call("sqrt", args)),
                Some(degree) => Ok(Expr::call("root", vec![degree, one(args)])),
            }
        }
        "log" => {
            arity(1)?;
            match qualifier(node, "logbase")? {
                None => Ok(Expr::call("log10", args)),
                Some(Expr::Number(b)) if b == 10.0 => Ok(Expr::call("log10", args)),
                Some(base) => Ok(Expr::call("log", vec![base, one(args)])),
            }
        }
        "exp" | "ln" | "abs" | "floor" | "sin" | "cos" | "tan" => {
            arity(1)?;
            Ok(Expr::call(op, args))
        }
        "ceiling" => {
            arity(1)?;
            Ok(Expr::call("ceil", args))
        }
        "ci" => Ok(Expr::call(operator.text(), args)),
        other => Err(ConvertError::sbml(other, "unsupported MathML operator")),
    }
}

fn one(args: Vec<Expr>) -> Expr {
    args.into_iter().next().unwrap_or(Expr::Number(0.0))
}

fn two(op: BinaryOp, args: Vec<Expr>) -> Expr {
    let mut it = args.into_iter();
    let lhs = it.next().unwrap_or(Expr::Number(0.0));
    let rhs = it.next().unwrap_or(Expr::Number(0.0));
    Expr::binary(op, lhs, rhs)
}

/// `a < b < c` becomes `a < b && b < c`.
fn relational_chain(op: &str, relation: BinaryOp, args: Vec<Expr>) -> Result<Expr> {
    if args.len() < 2 {
        return Err(ConvertError::sbml(
            op,
            format!("expected at least 2 arguments, found {}", args.len()),
        ));
    }
    let comparisons = args
        .windows(2)
        .map(|pair| Expr::binary(relation, pair[0].clone(), pair[1].clone()))
        .collect();
    Ok(Expr::fold(BinaryOp::And, comparisons).unwrap_or(Expr::Constant(Constant::True)))
}
