//! Model registration: variables, linear rows and the objective.
//!
//! HiGHS only understands linear rows over binary/integer columns, so every
//! boolean relation the rules need (implication, reified AND/OR, "at least
//! one of") is expanded here into its exact linear encoding. Rows are kept
//! on the builder so a returned solution can be checked against them.

use good_lp::{Expression, ProblemVariables, Variable, constraint, variable};
use log::{info, trace, warn};

const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// A boolean variable or its negation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lit {
    var: Variable,
    negated: bool,
}

impl Lit {
    pub fn pos(var: Variable) -> Self {
        Self { var, negated: false }
    }

    pub fn neg(var: Variable) -> Self {
        Self { var, negated: true }
    }

    /// `x` or `1 - x`.
    pub fn expr(self) -> Expression {
        if self.negated {
            Expression::from(1.0) - self.var
        } else {
            Expression::from(self.var)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// `lhs (<=|>=|==) rhs`
#[derive(Debug, Clone)]
pub struct Row {
    pub lhs: Expression,
    pub sense: Sense,
    pub rhs: f64,
}

impl Row {
    pub fn to_constraint(&self) -> good_lp::Constraint {
        let lhs = self.lhs.clone();
        let rhs = self.rhs;
        match self.sense {
            Sense::Le => constraint!(lhs <= rhs),
            Sense::Ge => constraint!(lhs >= rhs),
            Sense::Eq => constraint!(lhs == rhs),
        }
    }

    pub fn is_satisfied_by(&self, lhs_value: f64) -> bool {
        match self.sense {
            Sense::Le => lhs_value <= self.rhs + FEASIBILITY_TOLERANCE,
            Sense::Ge => lhs_value >= self.rhs - FEASIBILITY_TOLERANCE,
            Sense::Eq => (lhs_value - self.rhs).abs() <= FEASIBILITY_TOLERANCE,
        }
    }
}

pub fn sum_of(vars: &[Variable]) -> Expression {
    vars.iter().copied().sum()
}

/// Mutable handle used by the variable builder, the rules and the objective.
pub struct ModelBuilder {
    vars: ProblemVariables,
    rows: Vec<Row>,
    objective: Expression,
    objective_terms: usize,
    columns: usize,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            vars: ProblemVariables::new(),
            rows: Vec::new(),
            objective: Expression::from(0.0),
            objective_terms: 0,
            columns: 0,
        }
    }

    pub fn add_bool(&mut self) -> Variable {
        self.columns += 1;
        self.vars.add(variable().binary())
    }

    pub fn add_bool_vector(&mut self, len: usize) -> Vec<Variable> {
        self.columns += len;
        self.vars.add_vector(variable().binary(), len)
    }

    pub fn add_int(&mut self, min: f64, max: f64) -> Variable {
        self.columns += 1;
        self.vars.add(variable().integer().min(min).max(max))
    }

    pub fn add_row(&mut self, lhs: Expression, sense: Sense, rhs: f64) {
        self.rows.push(Row { lhs, sense, rhs });
    }

    pub fn le(&mut self, lhs: Expression, rhs: f64) {
        self.add_row(lhs, Sense::Le, rhs);
    }

    pub fn ge(&mut self, lhs: Expression, rhs: f64) {
        self.add_row(lhs, Sense::Ge, rhs);
    }

    pub fn eq(&mut self, lhs: Expression, rhs: f64) {
        self.add_row(lhs, Sense::Eq, rhs);
    }

    pub fn fix(&mut self, var: Variable, value: bool) {
        self.eq(Expression::from(var), if value { 1.0 } else { 0.0 });
    }

    pub fn exactly_one(&mut self, vars: &[Variable]) {
        if !vars.is_empty() {
            self.eq(sum_of(vars), 1.0);
        }
    }

    pub fn at_most_one(&mut self, vars: &[Variable]) {
        if vars.len() > 1 {
            self.le(sum_of(vars), 1.0);
        }
    }

    /// `a => b`
    pub fn implies(&mut self, a: Lit, b: Lit) {
        self.le(a.expr() - b.expr(), 0.0);
    }

    /// `b <=> lit`
    pub fn reify_equal(&mut self, b: Variable, lit: Lit) {
        self.eq(Expression::from(b) - lit.expr(), 0.0);
    }

    /// `b <=> OR(lits)`; an empty disjunction pins `b` to false.
    pub fn reify_any(&mut self, b: Variable, lits: &[Lit]) {
        let terms: Vec<Expression> = lits.iter().map(|lit| lit.expr()).collect();
        self.reify_any_terms(b, terms);
    }

    /// `b <=> AND(lits)`; an empty conjunction pins `b` to true.
    pub fn reify_all(&mut self, b: Variable, lits: &[Lit]) {
        let terms: Vec<Expression> = lits.iter().map(|lit| lit.expr()).collect();
        self.reify_all_terms(b, terms);
    }

    /// Like [`Self::reify_any`] over 0/1-valued expressions, such as the
    /// sum of mutually exclusive shift variables of one day.
    pub fn reify_any_terms(&mut self, b: Variable, terms: Vec<Expression>) {
        if terms.is_empty() {
            self.fix(b, false);
            return;
        }
        let mut total = Expression::from(0.0);
        for term in terms {
            self.le(term.clone() - b, 0.0);
            total += term;
        }
        self.le(Expression::from(b) - total, 0.0);
    }

    pub fn reify_all_terms(&mut self, b: Variable, terms: Vec<Expression>) {
        if terms.is_empty() {
            self.fix(b, true);
            return;
        }
        let slack = terms.len() as f64 - 1.0;
        let mut total = Expression::from(0.0);
        for term in terms {
            self.le(Expression::from(b) - term.clone(), 0.0);
            total += term;
        }
        self.ge(Expression::from(b) - total, -slack);
    }

    /// Fresh indicator for "at least one of `lits`".
    pub fn any_of(&mut self, lits: &[Lit]) -> Variable {
        let b = self.add_bool();
        self.reify_any(b, lits);
        b
    }

    /// Fresh indicator for "all of `lits`".
    pub fn all_of(&mut self, lits: &[Lit]) -> Variable {
        let b = self.add_bool();
        self.reify_all(b, lits);
        b
    }

    pub fn all_of_terms(&mut self, terms: Vec<Expression>) -> Variable {
        let b = self.add_bool();
        self.reify_all_terms(b, terms);
        b
    }

    /// Makes the model infeasible. Used when a quota can never be met.
    pub fn contradiction(&mut self, reason: &str) {
        warn!("Unsatisfiable requirement: {reason}");
        let b = self.add_bool();
        self.ge(Expression::from(b), 1.0);
        self.le(Expression::from(b), 0.0);
    }

    /// Fresh `d >= |diff|`. Tight only under minimisation.
    pub fn abs_upper_bound(&mut self, diff: Expression, bound: f64) -> Variable {
        let d = self.add_int(0.0, bound);
        self.ge(Expression::from(d) - diff.clone(), 0.0);
        self.ge(Expression::from(d) + diff, 0.0);
        d
    }

    pub fn add_objective_term(&mut self, weight: f64, term: Expression) {
        if weight != 0.0 {
            self.objective += weight * term;
            self.objective_terms += 1;
        }
    }

    /// Runs one rule family and logs how many rows it added.
    pub fn rule(&mut self, name: &str, add: impl FnOnce(&mut Self)) {
        info!("Adding '{name}' constraints...");
        let before = self.rows.len();
        add(self);
        trace!("'{name}' added {} rows", self.rows.len() - before);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    pub fn objective_terms(&self) -> usize {
        self.objective_terms
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn objective(&self) -> &Expression {
        &self.objective
    }

    /// Hands the columns to the solver; rows and objective stay readable.
    pub fn take_variables(&mut self) -> ProblemVariables {
        std::mem::replace(&mut self.vars, ProblemVariables::new())
    }

    /// Number of rows a candidate assignment violates.
    pub fn violated_rows(&self, eval: impl Fn(&Expression) -> f64) -> usize {
        self.rows
            .iter()
            .filter(|row| !row.is_satisfied_by(eval(&row.lhs)))
            .count()
    }
}
