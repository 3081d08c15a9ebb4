//! SenExprBuilder constructs the expressions used to compute whether a
//! sensitivity tree has triggered.

use crate::HashMap;
use crate::HashSet;
use crate::ir::{
    DType, EdgeKind, Expr, ExprId, FuncId, LValue, Netlist, SenItem, SenTreeId, Stmt, StmtId,
    VarId,
};

/// Decomposes activation expressions into persistent previous-value state
/// plus pure trigger terms. One instance is threaded through every region
/// that needs edge detection, so previous-value storage is shared.
pub struct SenExprBuilder {
    /// The initialization function; previous-value initializers accumulate
    /// here
    init_func: FuncId,
    /// The 'previous value' signals, keyed by the structural identity of the
    /// sensed expression
    prev: HashMap<ExprId, VarId>,
    /// Whether the given sensed expression already has an update statement
    /// in `updates`
    has_update: HashSet<ExprId>,
    /// Update assignments, harvested into the trigger compute function
    updates: Vec<StmtId>,
    /// For generating unique signal names
    unique_names: usize,
}

impl SenExprBuilder {
    pub fn new(init_func: FuncId) -> Self {
        Self {
            init_func,
            prev: HashMap::default(),
            has_update: HashSet::default(),
            updates: Vec::new(),
            unique_names: 0,
        }
    }

    /// The persistent storage holding the last sampled value of `curr`.
    fn get_prev(&mut self, netlist: &mut Netlist, curr: ExprId) -> VarId {
        let prev = match self.prev.get(&curr).copied() {
            Some(prev) => prev,
            None => {
                // For readability, use the scoped signal name if the trigger
                // is a simple variable reference
                let name = if let Expr::VarRef(var) = netlist.exprs.get(curr) {
                    let var = netlist.var(*var);
                    format!(
                        "__Vtrigrprev__{}__{}",
                        netlist.scope(var.scope).name_dotless(),
                        var.name
                    )
                } else {
                    let n = self.unique_names;
                    self.unique_names += 1;
                    format!("__Vtrigprev__expression_{n}")
                };

                let width = netlist.expr_width(curr);
                let prev = netlist.create_temp(&name, DType::Bit { width });
                self.prev.insert(curr, prev);

                // Initialize to the current value
                let init = netlist.add_stmt(Stmt::Assign { lhs: LValue::Var(prev), rhs: curr });
                netlist.func_mut(self.init_func).stmts.push(init);
                prev
            }
        };

        // Add the update if it does not exist yet in this round
        if self.has_update.insert(curr) {
            let update = netlist.add_stmt(Stmt::Assign { lhs: LValue::Var(prev), rhs: curr });
            self.updates.push(update);
        }

        prev
    }

    /// Returns the term expression, and whether the term fires on the first
    /// evaluation.
    fn create_term(&mut self, netlist: &mut Netlist, item: &SenItem) -> (Option<ExprId>, bool) {
        if item.edge == EdgeKind::Illegal {
            // Already warned for in an earlier pass
            return (None, false);
        }
        let curr = item.expr.expect("sensitivity item without expression");

        // All edge signals should be 1-bit at this point; the low-bit select
        // contracts wider signals regardless
        match item.edge {
            EdgeKind::Changed | EdgeKind::Hybrid => {
                let prev = self.get_prev(netlist, curr);
                let prev = netlist.var_ref(prev);
                (Some(netlist.neq(curr, prev)), true)
            }
            EdgeKind::Bothedge => {
                let prev = self.get_prev(netlist, curr);
                let prev = netlist.var_ref(prev);
                let diff = netlist.xor(curr, prev);
                (Some(netlist.sel(diff, 0, 1)), false)
            }
            EdgeKind::Posedge => {
                let prev = self.get_prev(netlist, curr);
                let prev = netlist.var_ref(prev);
                let not_prev = netlist.not(prev);
                let rise = netlist.and(curr, not_prev);
                (Some(netlist.sel(rise, 0, 1)), false)
            }
            EdgeKind::Negedge => {
                let prev = self.get_prev(netlist, curr);
                let prev = netlist.var_ref(prev);
                let not_curr = netlist.not(curr);
                let fall = netlist.and(not_curr, prev);
                (Some(netlist.sel(fall, 0, 1)), false)
            }
            EdgeKind::Event => {
                // If the event is fired, set up the clearing process: clear
                // the 'fired' state now, and enqueue clearing the 'triggered'
                // state for the next evaluation
                let fired = netlist.event_fired(curr);
                let clear = netlist.add_stmt(Stmt::EventClear(curr));
                let enqueue = netlist.add_stmt(Stmt::EnqueueEventClear(curr));
                let update = netlist.add_stmt(Stmt::If {
                    cond: fired,
                    then_stmts: vec![clear, enqueue],
                    else_stmts: vec![],
                    unlikely: false,
                });
                self.updates.push(update);

                (Some(fired), false)
            }
            edge => panic!("unknown edge kind {edge:?} in clocked sensitivity"),
        }
    }

    /// Returns the expression computing the trigger, and a bool indicating
    /// that the trigger should also fire on the first evaluation.
    pub fn build(&mut self, netlist: &mut Netlist, tree: SenTreeId) -> (Option<ExprId>, bool) {
        let items = netlist.sen_tree(tree).items.clone();
        let mut result: Option<ExprId> = None;
        let mut fired_at_initialization = false;
        for item in &items {
            let (term, fired) = self.create_term(netlist, item);
            if let Some(term) = term {
                result = Some(match result {
                    Some(acc) => netlist.or(acc, term),
                    None => term,
                });
                fired_at_initialization |= fired;
            }
        }
        (result, fired_at_initialization)
    }

    /// Harvest the accumulated update statements. The per-round update set is
    /// cleared, the previous-value storage is retained so later builds reuse
    /// it.
    pub fn get_and_clear_updates(&mut self) -> Vec<StmtId> {
        self.has_update.clear();
        std::mem::take(&mut self.updates)
    }
}
