//! Reference interpreter for the emitted evaluation plan. Walks the
//! statement trees of the generated functions directly, providing the
//! runtime surface the plan assumes: trigger vector operations, event
//! handles with deferred clearing, debug message capture and the
//! divergence fatal.

use crate::ir::{DType, Expr, ExprId, FuncId, LValue, Netlist, Stmt, StmtId, VarId};
use malachite_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RunError {
    #[error("{msg} ({file}:{line})")]
    Fatal { file: String, line: u32, msg: String },
}

#[derive(Debug, Clone)]
enum Value {
    Bits(BigUint),
    Event { fired: bool, triggered: bool },
}

/// One simulation instance over a scheduled netlist.
pub struct Sim<'a> {
    netlist: &'a Netlist,
    values: Vec<Value>,
    /// Events queued for clearing their 'triggered' state on the next eval
    clear_queue: Vec<VarId>,
    /// Execute debug-guarded statements and capture their messages
    pub debug: bool,
    /// Captured debug messages
    pub log: Vec<String>,
}

fn mask(width: u32) -> BigUint {
    (BigUint::one() << width as usize) - BigUint::one()
}

impl<'a> Sim<'a> {
    pub fn new(netlist: &'a Netlist) -> Self {
        let values = netlist
            .vars
            .iter()
            .map(|v| match v.dtype {
                DType::Event => Value::Event { fired: false, triggered: false },
                _ => Value::Bits(BigUint::zero()),
            })
            .collect();
        Self { netlist, values, clear_queue: Vec::new(), debug: false, log: Vec::new() }
    }

    // ---- Driver API ----

    pub fn set(&mut self, var: VarId, val: u64) {
        self.set_wide(var, BigUint::from(val));
    }

    pub fn set_wide(&mut self, var: VarId, val: BigUint) {
        let width = self.netlist.var(var).dtype.width();
        self.values[var.0] = Value::Bits(val & mask(width));
    }

    pub fn get(&self, var: VarId) -> BigUint {
        match &self.values[var.0] {
            Value::Bits(v) => v.clone(),
            Value::Event { fired, .. } => BigUint::from(*fired as u8),
        }
    }

    pub fn get_u64(&self, var: VarId) -> u64 {
        self.get(var).to_u64().expect("value wider than 64 bits")
    }

    pub fn fire_event(&mut self, var: VarId) {
        self.values[var.0] = Value::Event { fired: true, triggered: true };
    }

    pub fn event_triggered(&self, var: VarId) -> bool {
        match &self.values[var.0] {
            Value::Event { triggered, .. } => *triggered,
            _ => panic!("not an event variable"),
        }
    }

    pub fn event_fired(&self, var: VarId) -> bool {
        match &self.values[var.0] {
            Value::Event { fired, .. } => *fired,
            _ => panic!("not an event variable"),
        }
    }

    /// Run the one-time plan sections: static and initial logic, then the
    /// settle loop restoring the combinational invariant.
    pub fn initialize(&mut self) -> Result<(), RunError> {
        for name in ["_eval_static", "_eval_initial", "_eval_settle"] {
            if let Some(func) = self.netlist.find_func(name) {
                self.run_func(func)?;
            }
        }
        Ok(())
    }

    /// Run one tick of the plan's entry point.
    pub fn eval(&mut self) -> Result<(), RunError> {
        // Deferred clearing of 'triggered' event state
        for var in std::mem::take(&mut self.clear_queue) {
            if let Value::Event { triggered, .. } = &mut self.values[var.0] {
                *triggered = false;
            }
        }
        let func = self
            .netlist
            .eval_fn
            .or_else(|| self.netlist.find_func("_eval"))
            .expect("netlist has not been scheduled");
        self.run_func(func)
    }

    /// Run the final logic.
    pub fn finalize(&mut self) -> Result<(), RunError> {
        if let Some(func) = self.netlist.find_func("_eval_final") {
            self.run_func(func)?;
        }
        Ok(())
    }

    pub fn run_func(&mut self, func: FuncId) -> Result<(), RunError> {
        let stmts = self.netlist.func(func).stmts.clone();
        self.exec_stmts(&stmts)
    }

    // ---- Execution ----

    fn exec_stmts(&mut self, stmts: &[StmtId]) -> Result<(), RunError> {
        for stmt in stmts {
            self.exec_stmt(*stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: StmtId) -> Result<(), RunError> {
        match self.netlist.stmt(stmt).clone() {
            Stmt::Assign { lhs, rhs } | Stmt::AssignPre { lhs, rhs } => {
                let val = self.eval_expr(rhs);
                self.write(lhs, val);
                Ok(())
            }
            Stmt::If { cond, then_stmts, else_stmts, .. } => {
                if !self.eval_expr(cond).is_zero() {
                    self.exec_stmts(&then_stmts)
                } else {
                    self.exec_stmts(&else_stmts)
                }
            }
            Stmt::While { cond, body } => {
                while !self.eval_expr(cond).is_zero() {
                    self.exec_stmts(&body)?;
                }
                Ok(())
            }
            Stmt::Call(func) => self.run_func(func),
            Stmt::Process { body } => self.exec_stmts(&body),
            Stmt::TrigClear { vec } => {
                self.values[vec.0] = Value::Bits(BigUint::zero());
                Ok(())
            }
            Stmt::TrigSet { dst, src } => {
                let merged = self.bits(dst) | self.bits(src);
                self.values[dst.0] = Value::Bits(merged);
                Ok(())
            }
            Stmt::TrigAndNot { dst, a, b } => {
                let width = self.netlist.var(dst).dtype.width();
                let value = self.bits(a) & (self.bits(b) ^ mask(width));
                self.values[dst.0] = Value::Bits(value);
                Ok(())
            }
            Stmt::EventClear(handle) => {
                let var = self.event_var(handle);
                if let Value::Event { fired, .. } = &mut self.values[var.0] {
                    *fired = false;
                }
                Ok(())
            }
            Stmt::EnqueueEventClear(handle) => {
                let var = self.event_var(handle);
                self.clear_queue.push(var);
                Ok(())
            }
            Stmt::DbgMsg(text) => {
                if self.debug {
                    self.log.push(text);
                }
                Ok(())
            }
            Stmt::IfDebug { body } => {
                if self.debug {
                    self.exec_stmts(&body)?;
                }
                Ok(())
            }
            Stmt::Fatal { file, line, msg } => Err(RunError::Fatal { file, line, msg }),
        }
    }

    fn write(&mut self, lhs: LValue, val: BigUint) {
        match lhs {
            LValue::Var(var) => {
                let width = self.netlist.var(var).dtype.width();
                self.values[var.0] = Value::Bits(val & mask(width));
            }
            LValue::TrigBit { vec, index } => {
                let bit = BigUint::one() << index as usize;
                let current = self.bits(vec);
                let next = if val.is_zero() {
                    let width = self.netlist.var(vec).dtype.width();
                    current & (bit ^ mask(width))
                } else {
                    current | bit
                };
                self.values[vec.0] = Value::Bits(next);
            }
        }
    }

    fn bits(&self, var: VarId) -> BigUint {
        match &self.values[var.0] {
            Value::Bits(v) => v.clone(),
            Value::Event { .. } => panic!("event used as a plain value"),
        }
    }

    /// The event variable behind an event handle expression.
    fn event_var(&self, handle: ExprId) -> VarId {
        match *self.netlist.exprs.get(handle) {
            Expr::VarRef(var) => {
                assert_eq!(self.netlist.var(var).dtype, DType::Event, "not an event handle");
                var
            }
            _ => panic!("event handle should be a variable reference"),
        }
    }

    fn eval_expr(&self, expr: ExprId) -> BigUint {
        match self.netlist.exprs.get(expr).clone() {
            Expr::Const(value, width) => value & mask(width),
            Expr::VarRef(var) => self.bits(var),
            Expr::And(lhs, rhs) => self.eval_expr(lhs) & self.eval_expr(rhs),
            Expr::Or(lhs, rhs) => self.eval_expr(lhs) | self.eval_expr(rhs),
            Expr::Xor(lhs, rhs) => self.eval_expr(lhs) ^ self.eval_expr(rhs),
            Expr::Not(inner) => {
                let width = self.netlist.expr_width(inner);
                self.eval_expr(inner) ^ mask(width)
            }
            Expr::Neq(lhs, rhs) => {
                BigUint::from((self.eval_expr(lhs) != self.eval_expr(rhs)) as u8)
            }
            Expr::Eq(lhs, rhs) => {
                BigUint::from((self.eval_expr(lhs) == self.eval_expr(rhs)) as u8)
            }
            Expr::Gt(lhs, rhs) => {
                BigUint::from((self.eval_expr(lhs) > self.eval_expr(rhs)) as u8)
            }
            Expr::Add(lhs, rhs) => {
                let width = self.netlist.expr_width(lhs);
                (self.eval_expr(lhs) + self.eval_expr(rhs)) & mask(width)
            }
            Expr::Sel { expr, lsb, width } => {
                (self.eval_expr(expr) >> lsb as usize) & mask(width)
            }
            Expr::TrigAt { vec, index } => (self.bits(vec) >> index as usize) & BigUint::one(),
            Expr::TrigAny { vec } => BigUint::from(!self.bits(vec).is_zero() as u8),
            Expr::EventFired(handle) => {
                let var = self.event_var(handle);
                BigUint::from(self.event_fired(var) as u8)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Stmt;

    #[test]
    fn test_expr_evaluation_masks_to_width() {
        let mut netlist = Netlist::new("top");
        let a = netlist.create_temp("a", DType::Bit { width: 4 });
        let a_ref = netlist.var_ref(a);
        let not_a = netlist.not(a_ref);
        let one = netlist.const_u(1, 4);
        let sum = netlist.add(a_ref, one);

        let mut sim = Sim::new(&netlist);
        sim.set(a, 0xF);
        assert!(sim.eval_expr(not_a).is_zero());
        assert!(sim.eval_expr(sum).is_zero()); // 0xF + 1 wraps in 4 bits
    }

    #[test]
    fn test_trigger_vec_operations() {
        let mut netlist = Netlist::new("top");
        let act = netlist.create_temp("act", DType::TriggerVec { width: 3 });
        let nba = netlist.create_temp("nba", DType::TriggerVec { width: 3 });
        let pre = netlist.create_temp("pre", DType::TriggerVec { width: 3 });
        let and_not = netlist.add_stmt(Stmt::TrigAndNot { dst: pre, a: act, b: nba });
        let set = netlist.add_stmt(Stmt::TrigSet { dst: nba, src: act });
        let clear = netlist.add_stmt(Stmt::TrigClear { vec: nba });

        let mut sim = Sim::new(&netlist);
        sim.set(act, 0b011);
        sim.set(nba, 0b110);
        sim.exec_stmt(and_not).unwrap();
        assert_eq!(sim.get_u64(pre), 0b001);
        sim.exec_stmt(set).unwrap();
        assert_eq!(sim.get_u64(nba), 0b111);
        sim.exec_stmt(clear).unwrap();
        assert_eq!(sim.get_u64(nba), 0);
    }

    #[test]
    fn test_while_loop_and_fatal() {
        let mut netlist = Netlist::new("top");
        let flag = netlist.create_temp("flag", DType::Bit { width: 1 });
        let cond = netlist.var_ref(flag);
        let fatal = netlist.add_stmt(Stmt::Fatal {
            file: "top.v".to_owned(),
            line: 3,
            msg: "Test region did not converge.".to_owned(),
        });
        let body = vec![fatal];
        let while_stmt = netlist.add_stmt(Stmt::While { cond, body });

        let mut sim = Sim::new(&netlist);
        sim.set(flag, 0);
        assert_eq!(sim.exec_stmt(while_stmt), Ok(()));
        sim.set(flag, 1);
        let err = sim.exec_stmt(while_stmt).unwrap_err();
        assert_eq!(
            err,
            RunError::Fatal {
                file: "top.v".to_owned(),
                line: 3,
                msg: "Test region did not converge.".to_owned()
            }
        );
    }

    #[test]
    fn test_event_clear_queue_deferred_to_next_eval() {
        let mut netlist = Netlist::new("top");
        let ev = netlist.create_temp("ev", DType::Event);
        let handle = netlist.var_ref(ev);
        let clear = netlist.add_stmt(Stmt::EventClear(handle));
        let enqueue = netlist.add_stmt(Stmt::EnqueueEventClear(handle));
        // A scheduled netlist needs an _eval; an empty one will do here
        crate::sched::make_top_function(&mut netlist, "_eval", false);

        let mut sim = Sim::new(&netlist);
        sim.fire_event(ev);
        assert!(sim.event_fired(ev));
        sim.exec_stmt(clear).unwrap();
        sim.exec_stmt(enqueue).unwrap();
        assert!(!sim.event_fired(ev));
        // 'triggered' survives until the next eval tick
        assert!(sim.event_triggered(ev));
        sim.eval().unwrap();
        assert!(!sim.event_triggered(ev));
    }
}
