use crate::HashMap;
use malachite_bigint::BigUint;
use std::fmt;

/// Scope identifier
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// Variable-in-scope identifier
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Expression node identifier (hash-consed, see [`ExprArena`])
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExprId(pub usize);

/// Statement node identifier
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StmtId(pub usize);

/// Generated function identifier
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FuncId(pub usize);

/// Sensitivity tree identifier
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SenTreeId(pub usize);

/// Activation block identifier
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ActiveId(pub usize);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Data type of a variable or temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Plain packed value of the given bit width
    Bit { width: u32 },
    /// Packed trigger flag vector, one flag per sensitivity
    TriggerVec { width: u32 },
    /// Event handle with `fired` / `triggered` runtime state
    Event,
}

impl DType {
    pub fn width(&self) -> u32 {
        match self {
            DType::Bit { width } | DType::TriggerVec { width } => *width,
            DType::Event => 1,
        }
    }

    pub fn is_trigger_vec(&self) -> bool {
        matches!(self, DType::TriggerVec { .. })
    }
}

/// Edge kind of one sensitivity item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Static,
    Initial,
    Final,
    Combo,
    Posedge,
    Negedge,
    Bothedge,
    Changed,
    Hybrid,
    Event,
    True,
    Illegal,
}

/// One entry of a sensitivity list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenItem {
    pub edge: EdgeKind,
    /// The sensed expression; absent for static/initial/final/combo items.
    pub expr: Option<ExprId>,
}

/// An ordered sensitivity list. The kind of the tree is derived from its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenTree {
    pub items: Vec<SenItem>,
}

impl SenTree {
    pub fn has_static(&self) -> bool {
        self.items.iter().any(|i| i.edge == EdgeKind::Static)
    }
    pub fn has_initial(&self) -> bool {
        self.items.iter().any(|i| i.edge == EdgeKind::Initial)
    }
    pub fn has_final(&self) -> bool {
        self.items.iter().any(|i| i.edge == EdgeKind::Final)
    }
    pub fn has_combo(&self) -> bool {
        self.items.iter().any(|i| i.edge == EdgeKind::Combo)
    }
    pub fn has_hybrid(&self) -> bool {
        self.items.iter().any(|i| i.edge == EdgeKind::Hybrid)
    }
    /// True if any item is an edge, change, event or trigger-bit term.
    pub fn has_clocked(&self) -> bool {
        self.items.iter().any(|i| {
            matches!(
                i.edge,
                EdgeKind::Posedge
                    | EdgeKind::Negedge
                    | EdgeKind::Bothedge
                    | EdgeKind::Changed
                    | EdgeKind::Event
                    | EdgeKind::True
            )
        })
    }
}

/// Pure expression node. Expressions only ever read state; writes are the
/// left-hand sides of statements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Const(BigUint, u32),
    VarRef(VarId),
    And(ExprId, ExprId),
    Or(ExprId, ExprId),
    Xor(ExprId, ExprId),
    Not(ExprId),
    Neq(ExprId, ExprId),
    Eq(ExprId, ExprId),
    Gt(ExprId, ExprId),
    Add(ExprId, ExprId),
    Sel { expr: ExprId, lsb: u32, width: u32 },
    /// `vec.at(index)` read of one trigger flag
    TrigAt { vec: VarId, index: u32 },
    /// `vec.any()`
    TrigAny { vec: VarId },
    /// `handle.isFired()`
    EventFired(ExprId),
}

/// Hash-consing expression arena: structurally equal expressions share an id,
/// which gives structural equality checks and cache keys for free.
#[derive(Debug, Clone, Default)]
pub struct ExprArena {
    nodes: Vec<Expr>,
    cache: HashMap<Expr, ExprId>,
}

impl ExprArena {
    pub fn alloc(&mut self, node: Expr) -> ExprId {
        if let Some(id) = self.cache.get(&node) {
            return *id;
        }
        let id = ExprId(self.nodes.len());
        self.cache.insert(node.clone(), id);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Assignment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LValue {
    Var(VarId),
    /// `vec.at(index)` as an assignment target
    TrigBit { vec: VarId, index: u32 },
}

/// Statement node. Statements own their children as id lists, so moving a
/// block of logic between containers moves ids, never re-allocates trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign {
        lhs: LValue,
        rhs: ExprId,
    },
    /// Shadow-variable update emitted for non-blocking assignments; runs in
    /// the `pre` region, guarded by triggers that fired but are not yet
    /// latched for NBA.
    AssignPre {
        lhs: LValue,
        rhs: ExprId,
    },
    If {
        cond: ExprId,
        then_stmts: Vec<StmtId>,
        else_stmts: Vec<StmtId>,
        /// Branch predicted not taken
        unlikely: bool,
    },
    While {
        cond: ExprId,
        body: Vec<StmtId>,
    },
    Call(FuncId),
    /// Procedure wrapper; only the body is transplanted when the statement
    /// is moved into a generated function.
    Process {
        body: Vec<StmtId>,
    },
    /// `vec.clear()`
    TrigClear {
        vec: VarId,
    },
    /// `dst.set(src)`: OR the source flags into the destination
    TrigSet {
        dst: VarId,
        src: VarId,
    },
    /// `dst.andNot(a, b)`: `dst = a & !b`
    TrigAndNot {
        dst: VarId,
        a: VarId,
        b: VarId,
    },
    /// `handle.clearFired()`
    EventClear(ExprId),
    /// `enqueueTriggeredEventForClearing(handle)`
    EnqueueEventClear(ExprId),
    /// `VL_DBG_MSGF` text, emitted verbatim
    DbgMsg(String),
    /// Statements compiled and executed only when debug is enabled
    IfDebug {
        body: Vec<StmtId>,
    },
    /// `VL_FATAL_MT(file, line, "", msg)`
    Fatal {
        file: String,
        line: u32,
        msg: String,
    },
}

/// Named region of the design hierarchy.
#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub is_top: bool,
    pub vars: Vec<VarId>,
    pub actives: Vec<ActiveId>,
    pub funcs: Vec<FuncId>,
}

impl Scope {
    /// Canonical name with hierarchy separators flattened.
    pub fn name_dotless(&self) -> String {
        self.name.replace('.', "__")
    }
}

/// A variable bound to a scope.
#[derive(Debug, Clone)]
pub struct VarScope {
    pub name: String,
    pub scope: ScopeId,
    pub dtype: DType,
    /// Top level input port
    pub is_top_input: bool,
    /// A port that is not an output (input or inout)
    pub is_non_output: bool,
    /// Written from a foreign (DPI export) context
    pub written_by_dpi: bool,
    /// Needs external sensitivity wiring in SystemC emission
    pub sc_sensitive: bool,
}

/// An activation: a sensitivity tree bound to a block of statements.
#[derive(Debug, Clone)]
pub struct Active {
    pub scope: ScopeId,
    pub sen_tree: SenTreeId,
    pub stmts: Vec<StmtId>,
}

/// A generated callable bound to a scope.
#[derive(Debug, Clone)]
pub struct Func {
    pub name: String,
    pub scope: ScopeId,
    pub stmts: Vec<StmtId>,
    /// Cleanup section; scheduling never populates it
    pub finals: Vec<StmtId>,
    /// Rare execution path
    pub slow: bool,
    pub entry_point: bool,
    pub dont_combine: bool,
    pub is_loose: bool,
    pub is_const: bool,
    pub decl_private: bool,
    /// Compiled only when debug support is enabled
    pub ifdef_debug: bool,
    /// May be compiled to a task graph by downstream passes
    pub mtasks: bool,
}

/// Source location carried into emitted fatal messages.
#[derive(Debug, Clone)]
pub struct Loc {
    pub file: String,
    pub line: u32,
}

impl Default for Loc {
    fn default() -> Self {
        Self { file: "<top>".to_owned(), line: 0 }
    }
}

/// Root of the elaborated design. Owns every IR entity; passes refer to
/// entities by id and mutate through the netlist.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    pub scopes: Vec<Scope>,
    pub vars: Vec<VarScope>,
    pub exprs: ExprArena,
    stmts: Vec<Stmt>,
    pub funcs: Vec<Func>,
    pub sen_trees: Vec<SenTree>,
    /// `None` marks a deleted activation
    pub actives: Vec<Option<Active>>,
    /// Runtime-set flag signalling a foreign callout mutated state
    pub dpi_export_trigger: Option<VarId>,
    /// The assembled `_eval` entry point
    pub eval_fn: Option<FuncId>,
    /// The nba region function, recorded for downstream passes
    pub eval_nba_fn: Option<FuncId>,
    /// Location of the top module, used by emitted divergence fatals
    pub top_loc: Loc,
}

impl Netlist {
    /// Create a netlist with a top scope of the given name.
    pub fn new(top_name: &str) -> Self {
        let mut netlist = Self::default();
        netlist.scopes.push(Scope {
            name: top_name.to_owned(),
            is_top: true,
            vars: Vec::new(),
            actives: Vec::new(),
            funcs: Vec::new(),
        });
        netlist
    }

    pub fn top_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn add_scope(&mut self, name: &str) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            name: name.to_owned(),
            is_top: false,
            vars: Vec::new(),
            actives: Vec::new(),
            funcs: Vec::new(),
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn add_var(&mut self, scope: ScopeId, name: &str, dtype: DType) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(VarScope {
            name: name.to_owned(),
            scope,
            dtype,
            is_top_input: false,
            is_non_output: false,
            written_by_dpi: false,
            sc_sensitive: false,
        });
        self.scopes[scope.0].vars.push(id);
        id
    }

    pub fn var(&self, id: VarId) -> &VarScope {
        &self.vars[id.0]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut VarScope {
        &mut self.vars[id.0]
    }

    /// Create a fresh temporary in the top scope.
    pub fn create_temp(&mut self, name: &str, dtype: DType) -> VarId {
        self.add_var(self.top_scope(), name, dtype)
    }

    /// Create a fresh temporary with the same type as an existing variable.
    pub fn create_temp_like(&mut self, name: &str, like: VarId) -> VarId {
        let dtype = self.vars[like.0].dtype;
        self.create_temp(name, dtype)
    }

    pub fn add_sen_tree(&mut self, tree: SenTree) -> SenTreeId {
        let id = SenTreeId(self.sen_trees.len());
        self.sen_trees.push(tree);
        id
    }

    pub fn sen_tree(&self, id: SenTreeId) -> &SenTree {
        &self.sen_trees[id.0]
    }

    pub fn add_active(&mut self, scope: ScopeId, sen_tree: SenTreeId, stmts: Vec<StmtId>) -> ActiveId {
        let id = ActiveId(self.actives.len());
        self.actives.push(Some(Active { scope, sen_tree, stmts }));
        self.scopes[scope.0].actives.push(id);
        id
    }

    /// Create an activation owned by a logic set rather than a scope, e.g. a
    /// clone made because ordering is destructive.
    pub fn add_active_detached(
        &mut self,
        scope: ScopeId,
        sen_tree: SenTreeId,
        stmts: Vec<StmtId>,
    ) -> ActiveId {
        let id = ActiveId(self.actives.len());
        self.actives.push(Some(Active { scope, sen_tree, stmts }));
        id
    }

    pub fn active(&self, id: ActiveId) -> &Active {
        self.actives[id.0].as_ref().expect("deleted activation")
    }

    pub fn active_mut(&mut self, id: ActiveId) -> &mut Active {
        self.actives[id.0].as_mut().expect("deleted activation")
    }

    /// Unlink an activation from its scope and delete it. The statements must
    /// have been transplanted already.
    pub fn delete_active(&mut self, id: ActiveId) {
        if let Some(active) = self.actives[id.0].take() {
            let scope = &mut self.scopes[active.scope.0];
            scope.actives.retain(|a| *a != id);
        }
    }

    pub fn add_func(&mut self, func: Func) -> FuncId {
        let scope = func.scope;
        let id = FuncId(self.funcs.len());
        self.funcs.push(func);
        self.scopes[scope.0].funcs.push(id);
        id
    }

    pub fn func(&self, id: FuncId) -> &Func {
        &self.funcs[id.0]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Func {
        &mut self.funcs[id.0]
    }

    /// Look up a generated function by name.
    pub fn find_func(&self, name: &str) -> Option<FuncId> {
        self.funcs
            .iter()
            .position(|f| f.name == name)
            .map(FuncId)
    }

    // ---- Statements ----

    pub fn add_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.stmts.len());
        self.stmts.push(stmt);
        id
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.0]
    }

    /// Recursive node count of a statement tree; the unit of the
    /// function-splitting threshold.
    pub fn stmt_count(&self, id: StmtId) -> usize {
        match self.stmt(id) {
            Stmt::If { then_stmts, else_stmts, .. } => {
                1 + self.stmts_count(then_stmts) + self.stmts_count(else_stmts)
            }
            Stmt::While { body, .. } | Stmt::Process { body } | Stmt::IfDebug { body } => {
                1 + self.stmts_count(body)
            }
            _ => 1,
        }
    }

    pub fn stmts_count(&self, ids: &[StmtId]) -> usize {
        ids.iter().map(|id| self.stmt_count(*id)).sum()
    }

    /// Deep-copy a statement tree. Expressions are shared: they are immutable
    /// and hash-consed, so an id is as good as a copy.
    pub fn clone_stmt(&mut self, id: StmtId) -> StmtId {
        let stmt = self.stmt(id).clone();
        let cloned = match stmt {
            Stmt::If { cond, then_stmts, else_stmts, unlikely } => Stmt::If {
                cond,
                then_stmts: self.clone_stmts(&then_stmts),
                else_stmts: self.clone_stmts(&else_stmts),
                unlikely,
            },
            Stmt::While { cond, body } => Stmt::While { cond, body: self.clone_stmts(&body) },
            Stmt::Process { body } => Stmt::Process { body: self.clone_stmts(&body) },
            Stmt::IfDebug { body } => Stmt::IfDebug { body: self.clone_stmts(&body) },
            other => other,
        };
        self.add_stmt(cloned)
    }

    pub fn clone_stmts(&mut self, ids: &[StmtId]) -> Vec<StmtId> {
        ids.iter().map(|id| self.clone_stmt(*id)).collect()
    }

    // ---- Expression constructors ----

    pub fn const_u(&mut self, value: u64, width: u32) -> ExprId {
        self.exprs.alloc(Expr::Const(BigUint::from(value), width))
    }

    pub fn var_ref(&mut self, var: VarId) -> ExprId {
        self.exprs.alloc(Expr::VarRef(var))
    }

    pub fn and(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.exprs.alloc(Expr::And(lhs, rhs))
    }

    pub fn or(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.exprs.alloc(Expr::Or(lhs, rhs))
    }

    pub fn xor(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.exprs.alloc(Expr::Xor(lhs, rhs))
    }

    pub fn not(&mut self, expr: ExprId) -> ExprId {
        self.exprs.alloc(Expr::Not(expr))
    }

    pub fn neq(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.exprs.alloc(Expr::Neq(lhs, rhs))
    }

    pub fn eq(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.exprs.alloc(Expr::Eq(lhs, rhs))
    }

    pub fn gt(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.exprs.alloc(Expr::Gt(lhs, rhs))
    }

    pub fn add(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.exprs.alloc(Expr::Add(lhs, rhs))
    }

    pub fn sel(&mut self, expr: ExprId, lsb: u32, width: u32) -> ExprId {
        self.exprs.alloc(Expr::Sel { expr, lsb, width })
    }

    pub fn trig_at(&mut self, vec: VarId, index: u32) -> ExprId {
        self.exprs.alloc(Expr::TrigAt { vec, index })
    }

    pub fn trig_any(&mut self, vec: VarId) -> ExprId {
        self.exprs.alloc(Expr::TrigAny { vec })
    }

    pub fn event_fired(&mut self, handle: ExprId) -> ExprId {
        self.exprs.alloc(Expr::EventFired(handle))
    }

    /// Bit width of an expression.
    pub fn expr_width(&self, id: ExprId) -> u32 {
        match *self.exprs.get(id) {
            Expr::Const(_, width) => width,
            Expr::VarRef(var) => self.vars[var.0].dtype.width(),
            Expr::And(lhs, _) | Expr::Or(lhs, _) | Expr::Xor(lhs, _) | Expr::Add(lhs, _) => {
                self.expr_width(lhs)
            }
            Expr::Not(inner) => self.expr_width(inner),
            Expr::Neq(..) | Expr::Eq(..) | Expr::Gt(..) => 1,
            Expr::Sel { width, .. } => width,
            Expr::TrigAt { .. } | Expr::TrigAny { .. } | Expr::EventFired(_) => 1,
        }
    }

    /// Collect every variable read by an expression.
    pub fn expr_reads(&self, id: ExprId, out: &mut Vec<VarId>) {
        match *self.exprs.get(id) {
            Expr::Const(..) => {}
            Expr::VarRef(var) => out.push(var),
            Expr::And(lhs, rhs)
            | Expr::Or(lhs, rhs)
            | Expr::Xor(lhs, rhs)
            | Expr::Neq(lhs, rhs)
            | Expr::Eq(lhs, rhs)
            | Expr::Gt(lhs, rhs)
            | Expr::Add(lhs, rhs) => {
                self.expr_reads(lhs, out);
                self.expr_reads(rhs, out);
            }
            Expr::Not(inner) | Expr::EventFired(inner) => self.expr_reads(inner, out),
            Expr::Sel { expr, .. } => self.expr_reads(expr, out),
            Expr::TrigAt { vec, .. } | Expr::TrigAny { vec } => out.push(vec),
        }
    }

    /// Collect the variables read and written by a statement tree.
    pub fn stmt_reads_writes(&self, id: StmtId, reads: &mut Vec<VarId>, writes: &mut Vec<VarId>) {
        match self.stmt(id) {
            Stmt::Assign { lhs, rhs } | Stmt::AssignPre { lhs, rhs } => {
                self.expr_reads(*rhs, reads);
                match lhs {
                    LValue::Var(var) => writes.push(*var),
                    LValue::TrigBit { vec, .. } => writes.push(*vec),
                }
            }
            Stmt::If { cond, then_stmts, else_stmts, .. } => {
                self.expr_reads(*cond, reads);
                for s in then_stmts.iter().chain(else_stmts) {
                    self.stmt_reads_writes(*s, reads, writes);
                }
            }
            Stmt::While { cond, body } => {
                self.expr_reads(*cond, reads);
                for s in body {
                    self.stmt_reads_writes(*s, reads, writes);
                }
            }
            Stmt::Process { body } | Stmt::IfDebug { body } => {
                for s in body {
                    self.stmt_reads_writes(*s, reads, writes);
                }
            }
            Stmt::TrigClear { vec } => writes.push(*vec),
            Stmt::TrigSet { dst, src } => {
                reads.push(*src);
                writes.push(*dst);
            }
            Stmt::TrigAndNot { dst, a, b } => {
                reads.push(*a);
                reads.push(*b);
                writes.push(*dst);
            }
            Stmt::EventClear(handle) | Stmt::EnqueueEventClear(handle) => {
                self.expr_reads(*handle, reads);
            }
            Stmt::Call(_) | Stmt::DbgMsg(_) | Stmt::Fatal { .. } => {}
        }
    }

    /// Rebuild an expression with every reference to the trigger vector
    /// `from` redirected to `to`. Any other variable reference is an IR
    /// contract violation.
    pub fn rewrite_trigger_refs(&mut self, id: ExprId, from: VarId, to: VarId) -> ExprId {
        match self.exprs.get(id).clone() {
            Expr::Const(..) => id,
            Expr::VarRef(var) => {
                assert_eq!(var, from, "unexpected variable reference in trigger sensitivity");
                self.var_ref(to)
            }
            Expr::And(lhs, rhs) => {
                let (l, r) = (self.rewrite_trigger_refs(lhs, from, to), self.rewrite_trigger_refs(rhs, from, to));
                self.and(l, r)
            }
            Expr::Or(lhs, rhs) => {
                let (l, r) = (self.rewrite_trigger_refs(lhs, from, to), self.rewrite_trigger_refs(rhs, from, to));
                self.or(l, r)
            }
            Expr::Xor(lhs, rhs) => {
                let (l, r) = (self.rewrite_trigger_refs(lhs, from, to), self.rewrite_trigger_refs(rhs, from, to));
                self.xor(l, r)
            }
            Expr::Not(inner) => {
                let e = self.rewrite_trigger_refs(inner, from, to);
                self.not(e)
            }
            Expr::Neq(lhs, rhs) => {
                let (l, r) = (self.rewrite_trigger_refs(lhs, from, to), self.rewrite_trigger_refs(rhs, from, to));
                self.neq(l, r)
            }
            Expr::Eq(lhs, rhs) => {
                let (l, r) = (self.rewrite_trigger_refs(lhs, from, to), self.rewrite_trigger_refs(rhs, from, to));
                self.eq(l, r)
            }
            Expr::Gt(lhs, rhs) => {
                let (l, r) = (self.rewrite_trigger_refs(lhs, from, to), self.rewrite_trigger_refs(rhs, from, to));
                self.gt(l, r)
            }
            Expr::Add(lhs, rhs) => {
                let (l, r) = (self.rewrite_trigger_refs(lhs, from, to), self.rewrite_trigger_refs(rhs, from, to));
                self.add(l, r)
            }
            Expr::Sel { expr, lsb, width } => {
                let e = self.rewrite_trigger_refs(expr, from, to);
                self.sel(e, lsb, width)
            }
            Expr::TrigAt { vec, index } => {
                assert_eq!(vec, from, "unexpected trigger vector reference");
                self.trig_at(to, index)
            }
            Expr::TrigAny { vec } => {
                assert_eq!(vec, from, "unexpected trigger vector reference");
                self.trig_any(to)
            }
            Expr::EventFired(inner) => {
                let e = self.rewrite_trigger_refs(inner, from, to);
                self.event_fired(e)
            }
        }
    }

    // ---- Printing ----

    pub fn display_expr(&self, id: ExprId) -> ExprDisplay<'_> {
        ExprDisplay { netlist: self, id }
    }

    /// Render a sensitivity tree the way it would read in the source
    /// language, for debug dump messages.
    pub fn sen_tree_to_string(&self, id: SenTreeId) -> String {
        let tree = self.sen_tree(id);
        let terms: Vec<String> = tree
            .items
            .iter()
            .map(|item| {
                let expr = item
                    .expr
                    .map(|e| self.display_expr(e).to_string())
                    .unwrap_or_default();
                match item.edge {
                    EdgeKind::Posedge => format!("posedge {expr}"),
                    EdgeKind::Negedge => format!("negedge {expr}"),
                    EdgeKind::Bothedge => format!("edge {expr}"),
                    EdgeKind::Combo => "*".to_owned(),
                    _ => expr,
                }
            })
            .collect();
        format!("@({})", terms.join(" or "))
    }
}

pub struct ExprDisplay<'a> {
    netlist: &'a Netlist,
    id: ExprId,
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nl = self.netlist;
        let sub = |id| ExprDisplay { netlist: nl, id };
        match *nl.exprs.get(self.id) {
            Expr::Const(ref value, _) => write!(f, "{value}"),
            Expr::VarRef(var) => {
                let v = nl.var(var);
                if nl.scope(v.scope).is_top {
                    write!(f, "{}", v.name)
                } else {
                    write!(f, "{}.{}", nl.scope(v.scope).name, v.name)
                }
            }
            Expr::And(lhs, rhs) => write!(f, "({} & {})", sub(lhs), sub(rhs)),
            Expr::Or(lhs, rhs) => write!(f, "({} | {})", sub(lhs), sub(rhs)),
            Expr::Xor(lhs, rhs) => write!(f, "({} ^ {})", sub(lhs), sub(rhs)),
            Expr::Not(inner) => write!(f, "(~ {})", sub(inner)),
            Expr::Neq(lhs, rhs) => write!(f, "({} != {})", sub(lhs), sub(rhs)),
            Expr::Eq(lhs, rhs) => write!(f, "({} == {})", sub(lhs), sub(rhs)),
            Expr::Gt(lhs, rhs) => write!(f, "({} > {})", sub(lhs), sub(rhs)),
            Expr::Add(lhs, rhs) => write!(f, "({} + {})", sub(lhs), sub(rhs)),
            Expr::Sel { expr, lsb, width } => {
                write!(f, "{}[{}:{}]", sub(expr), lsb + width - 1, lsb)
            }
            Expr::TrigAt { vec, index } => write!(f, "{}.at({index})", nl.var(vec).name),
            Expr::TrigAny { vec } => write!(f, "{}.any()", nl.var(vec).name),
            Expr::EventFired(inner) => write!(f, "{}.isFired()", sub(inner)),
        }
    }
}
