//! Expression tree.

use rowstep_core::types::Scalar;

use crate::aggregate::AggFunc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Ident(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// Aggregate call; `slot` indexes the program's accumulator list.
    Aggregate {
        func: AggFunc,
        args: Vec<Expr>,
        slot: usize,
    },
}

impl Expr {
    /// Visit every node depth-first (pre-order).
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Ident(_) => {}
            Expr::Unary { expr, .. } => expr.walk(f),
            Expr::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Call { args, .. } | Expr::Aggregate { args, .. } => {
                for a in args {
                    a.walk(f);
                }
            }
        }
    }

    /// Identifiers referenced anywhere in the tree, in order of first use.
    pub fn idents(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Ident(name) = e {
                if !out.iter().any(|o| o == name) {
                    out.push(name.clone());
                }
            }
        });
        out
    }

    /// Identifiers referenced outside of any aggregate call.
    pub fn free_idents(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_free(self, &mut out);
        out
    }

    pub fn has_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Aggregate { .. }) {
                found = true;
            }
        });
        found
    }
}

fn collect_free(e: &Expr, out: &mut Vec<String>) {
    match e {
        Expr::Ident(name) => {
            if !out.iter().any(|o| o == name) {
                out.push(name.clone());
            }
        }
        Expr::Literal(_) | Expr::Aggregate { .. } => {}
        Expr::Unary { expr, .. } => collect_free(expr, out),
        Expr::Binary { left, right, .. } => {
            collect_free(left, out);
            collect_free(right, out);
        }
        Expr::Call { args, .. } => {
            for a in args {
                collect_free(a, out);
            }
        }
    }
}
