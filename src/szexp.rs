//! The size-expression sub-language.
//!
//! Output dimensions and execution conditions of a pass are declared in a
//! whitespace-separated reverse-Polish notation over the sizes of named
//! textures, e.g. `HOOKED.w 2 *`. Programs are parsed once into a fixed
//! capacity token sequence and evaluated every invocation against whatever
//! textures exist at that point in the frame.

use arrayvec::ArrayVec;
use bytes::Bytes;
use thiserror::Error;

use crate::bstr;
use crate::MAX_SZEXP_SIZE;

/// A monadic size-expression operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Op1 {
    /// Logical negation: nonzero becomes `0.0`, zero becomes `1.0`.
    Not,
}

/// A dyadic size-expression operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Op2 {
    ///
    Add,
    ///
    Sub,
    ///
    Mul,
    ///
    Div,
    /// Greater-than, yielding `1.0` or `0.0`.
    Gt,
    /// Less-than, yielding `1.0` or `0.0`.
    Lt,
}

/// One token of a size-expression program.
#[derive(Clone, Debug, PartialEq)]
pub enum SzExp {
    /// Push a literal.
    Const(f32),
    /// Push the width of the named texture.
    VarW(Bytes),
    /// Push the height of the named texture.
    VarH(Bytes),
    /// Pop one element, push the result.
    Op1(Op1),
    /// Pop two elements, push the result.
    Op2(Op2),
}

/// Size-expression parse failure.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SzExprError {
    /// More than [`MAX_SZEXP_SIZE`](crate::MAX_SZEXP_SIZE) tokens.
    #[error("expression exceeds {} tokens", MAX_SZEXP_SIZE)]
    TooLong,
    /// A token that started with a digit but is not a number.
    #[error("invalid numeric literal '{0}'")]
    BadNumber(String),
    /// Anything else.
    #[error("illegal token '{0}' in expression")]
    BadToken(String),
}

/// Size-expression evaluation failure.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvalError {
    /// An operator found fewer operands than it needs.
    #[error("stack underflow in RPN expression")]
    StackUnderflow,
    /// An operation produced NaN or infinity.
    #[error("illegal operation in RPN expression")]
    NotFinite,
    /// A texture-size reference that no lookup source resolved.
    #[error("variable '{0}' not found in RPN expression")]
    UnknownVariable(String),
    /// Evaluation ended with anything other than exactly one stack element.
    #[error("malformed stack after RPN expression")]
    MalformedStack,
}

/// Resolves texture names to `(width, height)` during evaluation.
///
/// The dispatcher composites several sources behind this (the hooked
/// texture, the frame rectangles, saved pass textures); tests can supply a
/// plain closure.
pub trait SizeLookup {
    /// Size of the named texture, or `None` if the name is unknown.
    fn lookup(&self, name: &[u8]) -> Option<(f32, f32)>;
}

impl<F> SizeLookup for F
where
    F: Fn(&[u8]) -> Option<(f32, f32)>,
{
    fn lookup(&self, name: &[u8]) -> Option<(f32, f32)> {
        self(name)
    }
}

/// A parsed size-expression program.
///
/// Holds at most [`MAX_SZEXP_SIZE`](crate::MAX_SZEXP_SIZE) tokens; the
/// parser refuses longer inputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SzExpr(ArrayVec<SzExp, MAX_SZEXP_SIZE>);

impl SzExpr {
    /// The constant program `value`.
    pub fn constant(value: f32) -> Self {
        let mut prog = ArrayVec::new();
        prog.push(SzExp::Const(value));
        SzExpr(prog)
    }

    /// The program pushing the width of `name`.
    pub fn var_w(name: Bytes) -> Self {
        let mut prog = ArrayVec::new();
        prog.push(SzExp::VarW(name));
        SzExpr(prog)
    }

    /// The program pushing the height of `name`.
    pub fn var_h(name: Bytes) -> Self {
        let mut prog = ArrayVec::new();
        prog.push(SzExp::VarH(name));
        SzExpr(prog)
    }

    /// The tokens of this program.
    pub fn tokens(&self) -> &[SzExp] {
        &self.0
    }

    /// Parse a whitespace-separated RPN token stream.
    ///
    /// Tokens ending in `.w`/`.width` or `.h`/`.height` reference the size
    /// of the named texture; tokens starting with one of `+ - * / ! > <`
    /// are operators; tokens starting with a decimal digit are float
    /// literals. Anything else is an error.
    pub fn parse(line: &Bytes) -> Result<Self, SzExprError> {
        let mut prog = ArrayVec::new();
        let mut rest = line.clone();

        while !rest.is_empty() {
            let (word, tail) = bstr::split_char(&rest, b' ');
            rest = tail;
            let mut word = bstr::strip(&word);
            if word.is_empty() {
                continue;
            }

            if bstr::eat_end(&mut word, b".w") || bstr::eat_end(&mut word, b".width") {
                push(&mut prog, SzExp::VarW(word))?;
                continue;
            }

            if bstr::eat_end(&mut word, b".h") || bstr::eat_end(&mut word, b".height") {
                push(&mut prog, SzExp::VarH(word))?;
                continue;
            }

            let exp = match word[0] {
                b'+' => Some(SzExp::Op2(Op2::Add)),
                b'-' => Some(SzExp::Op2(Op2::Sub)),
                b'*' => Some(SzExp::Op2(Op2::Mul)),
                b'/' => Some(SzExp::Op2(Op2::Div)),
                b'!' => Some(SzExp::Op1(Op1::Not)),
                b'>' => Some(SzExp::Op2(Op2::Gt)),
                b'<' => Some(SzExp::Op2(Op2::Lt)),
                _ => None,
            };
            if let Some(exp) = exp {
                push(&mut prog, exp)?;
                continue;
            }

            if word[0].is_ascii_digit() {
                let text = String::from_utf8_lossy(&word);
                let value = text
                    .parse::<f32>()
                    .map_err(|_| SzExprError::BadNumber(text.to_string()))?;
                push(&mut prog, SzExp::Const(value))?;
                continue;
            }

            return Err(SzExprError::BadToken(
                String::from_utf8_lossy(&word).to_string(),
            ));
        }

        Ok(SzExpr(prog))
    }

    /// Execute the program against a size lookup.
    ///
    /// Failures are logged with context before being returned, so callers
    /// can propagate the error without repeating the diagnostic.
    pub fn eval(&self, lookup: &impl SizeLookup) -> Result<f32, EvalError> {
        // The program length bounds the stack depth, so this can never
        // overflow its capacity.
        let mut stack: ArrayVec<f32, MAX_SZEXP_SIZE> = ArrayVec::new();

        for exp in &self.0 {
            match exp {
                SzExp::Const(v) => stack.push(*v),

                SzExp::Op1(op) => {
                    let top = match stack.last_mut() {
                        Some(top) => top,
                        None => {
                            warn!("Stack underflow in RPN expression!");
                            return Err(EvalError::StackUnderflow);
                        }
                    };
                    match op {
                        Op1::Not => *top = if *top != 0.0 { 0.0 } else { 1.0 },
                    }
                }

                SzExp::Op2(op) => {
                    // Pop the operands in reverse order
                    let (op2, op1) = match (stack.pop(), stack.pop()) {
                        (Some(b), Some(a)) => (b, a),
                        _ => {
                            warn!("Stack underflow in RPN expression!");
                            return Err(EvalError::StackUnderflow);
                        }
                    };
                    let res = match op {
                        Op2::Add => op1 + op2,
                        Op2::Sub => op1 - op2,
                        Op2::Mul => op1 * op2,
                        Op2::Div => op1 / op2,
                        Op2::Gt => (op1 > op2) as i32 as f32,
                        Op2::Lt => (op1 < op2) as i32 as f32,
                    };
                    if !res.is_finite() {
                        warn!("Illegal operation in RPN expression!");
                        return Err(EvalError::NotFinite);
                    }
                    stack.push(res);
                }

                SzExp::VarW(name) | SzExp::VarH(name) => {
                    let (w, h) = match lookup.lookup(name) {
                        Some(size) => size,
                        None => {
                            warn!(
                                "Variable '{}' not found in RPN expression!",
                                String::from_utf8_lossy(name)
                            );
                            return Err(EvalError::UnknownVariable(
                                String::from_utf8_lossy(name).to_string(),
                            ));
                        }
                    };
                    stack.push(if matches!(exp, SzExp::VarW(_)) { w } else { h });
                }
            }
        }

        if stack.len() != 1 {
            warn!("Malformed stack after RPN expression!");
            return Err(EvalError::MalformedStack);
        }
        Ok(stack[0])
    }
}

fn push(
    prog: &mut ArrayVec<SzExp, MAX_SZEXP_SIZE>,
    exp: SzExp,
) -> Result<(), SzExprError> {
    prog.try_push(exp).map_err(|_| SzExprError::TooLong)
}
