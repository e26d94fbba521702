//! Math expression tree shared by the SBML reader and the DAE builder.
//!
//! Trees are produced from MathML and rendered back as infix formulas in the
//! SBML Level 3 text style (`k1*S1/(Km + S1)`), which is what the DAE model
//! stores and what the exporters consume.

pub mod token;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use token::{tokenize, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Leq => "<=",
            Self::Geq => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Neq | Self::Lt | Self::Gt | Self::Leq | Self::Geq => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div => 5,
            Self::Pow => 7,
        }
    }
}

const MUL_PRECEDENCE: u8 = 5;
const UNARY_PRECEDENCE: u8 = 6;
const ATOM_PRECEDENCE: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constant {
    Pi,
    ExponentialE,
    True,
    False,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    Name(String),
    /// Simulation time (MathML `csymbol` time), rendered as `t`.
    Time,
    Constant(Constant),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    Piecewise {
        pieces: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn name(id: impl Into<String>) -> Self {
        Self::Name(id.into())
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            function: function.into(),
            args,
        }
    }

    /// Left fold of `args` with `op`; `None` when `args` is empty.
    pub fn fold(op: BinaryOp, args: Vec<Expr>) -> Option<Self> {
        args.into_iter()
            .reduce(|acc, next| Expr::binary(op, acc, next))
    }

    pub fn to_formula(&self) -> String {
        self.to_string()
    }

    /// Identifiers referenced by the expression, first occurrence order, without duplicates.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Name(id) => {
                if !out.contains(&id.as_str()) {
                    out.push(id);
                }
            }
            Self::Number(_) | Self::Time | Self::Constant(_) => {}
            Self::Neg(arg) | Self::Not(arg) => arg.collect_identifiers(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_identifiers(out);
                rhs.collect_identifiers(out);
            }
            Self::Call { args, .. } => args.iter().for_each(|a| a.collect_identifiers(out)),
            Self::Piecewise { pieces, otherwise } => {
                for (value, condition) in pieces {
                    value.collect_identifiers(out);
                    condition.collect_identifiers(out);
                }
                if let Some(other) = otherwise {
                    other.collect_identifiers(out);
                }
            }
        }
    }

    /// Replace every reference to `from` with `to`.
    pub fn rename(&mut self, from: &str, to: &str) {
        match self {
            Self::Name(id) if id == from => *id = to.to_string(),
            Self::Name(_) | Self::Number(_) | Self::Time | Self::Constant(_) => {}
            Self::Neg(arg) | Self::Not(arg) => arg.rename(from, to),
            Self::Binary { lhs, rhs, .. } => {
                lhs.rename(from, to);
                rhs.rename(from, to);
            }
            Self::Call { args, .. } => args.iter_mut().for_each(|a| a.rename(from, to)),
            Self::Piecewise { pieces, otherwise } => {
                for (value, condition) in pieces.iter_mut() {
                    value.rename(from, to);
                    condition.rename(from, to);
                }
                if let Some(other) = otherwise {
                    other.rename(from, to);
                }
            }
        }
    }

    /// Numeric evaluation; `lookup` resolves identifiers, `t` evaluates to 0.
    pub fn eval(&self, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, String> {
        let truth = |b: bool| if b { 1.0 } else { 0.0 };

        Ok(match self {
            Self::Number(v) => *v,
            Self::Name(id) => lookup(id).ok_or_else(|| format!("unknown identifier '{}'", id))?,
            Self::Time => 0.0,
            Self::Constant(Constant::Pi) => std::f64::consts::PI,
            Self::Constant(Constant::ExponentialE) => std::f64::consts::E,
            Self::Constant(Constant::True) => 1.0,
            Self::Constant(Constant::False) => 0.0,
            Self::Neg(arg) => -arg.eval(lookup)?,
            Self::Not(arg) => truth(arg.eval(lookup)? == 0.0),
            Self::Binary { op, lhs, rhs } => {
                let a = lhs.eval(lookup)?;
                let b = rhs.eval(lookup)?;
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                    BinaryOp::Eq => truth(a == b),
                    BinaryOp::Neq => truth(a != b),
                    BinaryOp::Lt => truth(a < b),
                    BinaryOp::Gt => truth(a > b),
                    BinaryOp::Leq => truth(a <= b),
                    BinaryOp::Geq => truth(a >= b),
                    BinaryOp::And => truth(a != 0.0 && b != 0.0),
                    BinaryOp::Or => truth(a != 0.0 || b != 0.0),
                }
            }
            Self::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|a| a.eval(lookup))
                    .collect::<Result<Vec<_>, _>>()?;
                eval_call(function, &values)?
            }
            Self::Piecewise { pieces, otherwise } => {
                for (value, condition) in pieces {
                    if condition.eval(lookup)? != 0.0 {
                        return value.eval(lookup);
                    }
                }
                match otherwise {
                    Some(other) => other.eval(lookup)?,
                    None => f64::NAN,
                }
            }
        })
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Binary { op, .. } => op.precedence(),
            // `-a*b` prints without parentheses, so it binds like a product.
            Self::Neg(arg) => match arg.precedence() {
                p if p >= MUL_PRECEDENCE => p.min(UNARY_PRECEDENCE),
                _ => UNARY_PRECEDENCE,
            },
            Self::Not(_) => UNARY_PRECEDENCE,
            Self::Number(v) if *v < 0.0 => UNARY_PRECEDENCE,
            _ => ATOM_PRECEDENCE,
        }
    }
}

fn eval_call(function: &str, values: &[f64]) -> Result<f64, String> {
    let unary = |f: fn(f64) -> f64| match values {
        [x] => Ok(f(*x)),
        _ => Err(format!("{}() expects one argument", function)),
    };

    match function {
        "exp" => unary(f64::exp),
        "ln" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "sqrt" => unary(f64::sqrt),
        "abs" => unary(f64::abs),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "log" => match values {
            [base, x] => Ok(x.ln() / base.ln()),
            _ => Err("log() expects a base and an argument".to_string()),
        },
        "root" => match values {
            [degree, x] => Ok(x.powf(1.0 / degree)),
            _ => Err("root() expects a degree and an argument".to_string()),
        },
        other => Err(format!("unsupported function '{}'", other)),
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == value.trunc() && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let plain = format!("{}", value);
    if plain.len() > 12 {
        format!("{:e}", value)
    } else {
        plain
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => f.write_str(&format_number(*v)),
            Self::Name(id) => f.write_str(id),
            Self::Time => f.write_str("t"),
            Self::Constant(Constant::Pi) => f.write_str("pi"),
            Self::Constant(Constant::ExponentialE) => f.write_str("exp(1)"),
            Self::Constant(Constant::True) => f.write_str("true"),
            Self::Constant(Constant::False) => f.write_str("false"),
            Self::Neg(arg) => {
                f.write_str("-")?;
                write_operand(f, arg, arg.precedence() < MUL_PRECEDENCE)
            }
            Self::Not(arg) => {
                f.write_str("!")?;
                write_operand(f, arg, arg.precedence() < UNARY_PRECEDENCE)
            }
            Self::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                let lhs_parens = match op {
                    BinaryOp::Pow => lhs.precedence() <= prec,
                    _ => lhs.precedence() < prec,
                };
                // Only `+ * && ||` may drop parentheses around an equal-precedence
                // right operand; `^` and comparisons are left-associative in MATLAB.
                let rhs_parens = match op {
                    BinaryOp::Add | BinaryOp::Mul | BinaryOp::And | BinaryOp::Or => {
                        rhs.precedence() < prec
                    }
                    _ => rhs.precedence() <= prec,
                };
                write_operand(f, lhs, lhs_parens)?;
                match op {
                    BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => f.write_str(op.symbol())?,
                    _ => write!(f, " {} ", op.symbol())?,
                }
                write_operand(f, rhs, rhs_parens)
            }
            Self::Call { function, args } => {
                write!(f, "{}(", function)?;
                write_list(f, args.iter())?;
                f.write_str(")")
            }
            Self::Piecewise { pieces, otherwise } => {
                f.write_str("piecewise(")?;
                let flat = pieces
                    .iter()
                    .flat_map(|(value, condition)| [value, condition])
                    .chain(otherwise.as_deref());
                write_list(f, flat)?;
                f.write_str(")")
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn write_list<'a>(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = &'a Expr>) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: &str) -> Expr {
        Expr::name(id)
    }

    #[test]
    fn test_michaelis_menten_formula() {
        let rate = Expr::binary(
            BinaryOp::Div,
            Expr::binary(BinaryOp::Mul, n("Vmax"), n("S")),
            Expr::binary(BinaryOp::Add, n("Km"), n("S")),
        );
        assert_eq!(rate.to_formula(), "Vmax*S/(Km + S)");
    }

    #[test]
    fn test_parentheses_follow_associativity() {
        let sub = Expr::binary(
            BinaryOp::Sub,
            n("a"),
            Expr::binary(BinaryOp::Sub, n("b"), n("c")),
        );
        assert_eq!(sub.to_formula(), "a - (b - c)");

        let left_sub = Expr::binary(
            BinaryOp::Sub,
            Expr::binary(BinaryOp::Sub, n("a"), n("b")),
            n("c"),
        );
        assert_eq!(left_sub.to_formula(), "a - b - c");

        let pow = Expr::binary(
            BinaryOp::Pow,
            Expr::binary(BinaryOp::Pow, n("a"), n("b")),
            n("c"),
        );
        assert_eq!(pow.to_formula(), "(a^b)^c");

        let right_pow = Expr::binary(
            BinaryOp::Pow,
            n("a"),
            Expr::binary(BinaryOp::Pow, n("b"), n("c")),
        );
        assert_eq!(right_pow.to_formula(), "a^(b^c)");

        let comparison = Expr::binary(
            BinaryOp::Eq,
            n("a"),
            Expr::binary(BinaryOp::Lt, n("b"), n("c")),
        );
        assert_eq!(comparison.to_formula(), "a == (b < c)");

        let left_comparison = Expr::binary(
            BinaryOp::Eq,
            Expr::binary(BinaryOp::Lt, n("a"), n("b")),
            n("c"),
        );
        assert_eq!(left_comparison.to_formula(), "a < b == c");

        let neg_sum = Expr::Neg(Box::new(Expr::binary(BinaryOp::Add, n("a"), n("b"))));
        assert_eq!(neg_sum.to_formula(), "-(a + b)");

        let neg_product = Expr::Neg(Box::new(Expr::binary(BinaryOp::Mul, n("a"), n("b"))));
        assert_eq!(neg_product.to_formula(), "-a*b");
        let quotient = Expr::binary(BinaryOp::Div, n("x"), neg_product);
        assert_eq!(quotient.to_formula(), "x/(-a*b)");
    }

    #[test]
    fn test_calls_and_piecewise() {
        let expr = Expr::Piecewise {
            pieces: vec![(
                Expr::call("exp", vec![n("x")]),
                Expr::binary(BinaryOp::Gt, Expr::Time, Expr::Number(5.0)),
            )],
            otherwise: Some(Box::new(Expr::Number(0.0))),
        };
        assert_eq!(expr.to_formula(), "piecewise(exp(x), t > 5, 0)");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(1.5e-10), "1.5e-10");
    }

    #[test]
    fn test_identifiers_and_rename() {
        let mut expr = Expr::binary(
            BinaryOp::Mul,
            n("k"),
            Expr::binary(BinaryOp::Add, n("S"), n("k")),
        );
        assert_eq!(expr.identifiers(), vec!["k", "S"]);

        expr.rename("k", "R1_k");
        assert_eq!(expr.to_formula(), "R1_k*(S + R1_k)");
    }

    #[test]
    fn test_eval() {
        let expr = Expr::binary(
            BinaryOp::Add,
            Expr::call("log", vec![Expr::Number(10.0), Expr::Number(100.0)]),
            Expr::binary(BinaryOp::Mul, n("a"), Expr::Number(3.0)),
        );
        let value = expr
            .eval(&|id| if id == "a" { Some(2.0) } else { None })
            .unwrap();
        assert!((value - 8.0).abs() < 1e-12);

        let err = n("missing").eval(&|_| None).unwrap_err();
        assert!(err.contains("missing"));
    }
}
