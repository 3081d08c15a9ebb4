//! Shared helpers for building small designs and inspecting emitted plans.
#![allow(dead_code)]

use strobe::ir::{
    ActiveId, DType, EdgeKind, ExprId, FuncId, LValue, Netlist, SenItem, SenTree, SenTreeId,
    Stmt, StmtId, VarId,
};

pub fn bit_var(netlist: &mut Netlist, name: &str, width: u32) -> VarId {
    netlist.create_temp(name, DType::Bit { width })
}

pub fn input_var(netlist: &mut Netlist, name: &str, width: u32) -> VarId {
    let var = bit_var(netlist, name, width);
    netlist.var_mut(var).is_top_input = true;
    netlist.var_mut(var).is_non_output = true;
    var
}

pub fn combo_tree(netlist: &mut Netlist) -> SenTreeId {
    netlist.add_sen_tree(SenTree { items: vec![SenItem { edge: EdgeKind::Combo, expr: None }] })
}

pub fn edge_tree(netlist: &mut Netlist, edge: EdgeKind, var: VarId) -> SenTreeId {
    let expr = netlist.var_ref(var);
    netlist.add_sen_tree(SenTree { items: vec![SenItem { edge, expr: Some(expr) }] })
}

/// Add `lhs = rhs` as a single-statement activation at the top scope.
pub fn add_assign_active(
    netlist: &mut Netlist,
    tree: SenTreeId,
    lhs: VarId,
    rhs: ExprId,
) -> ActiveId {
    let scope = netlist.top_scope();
    let stmt = netlist.add_stmt(Stmt::Assign { lhs: LValue::Var(lhs), rhs });
    netlist.add_active(scope, tree, vec![stmt])
}

pub fn find_var(netlist: &Netlist, name: &str) -> VarId {
    let idx = netlist
        .vars
        .iter()
        .position(|v| v.name == name)
        .unwrap_or_else(|| panic!("no variable named '{name}'"));
    VarId(idx)
}

pub fn func_named(netlist: &Netlist, name: &str) -> FuncId {
    netlist.find_func(name).unwrap_or_else(|| panic!("no function named '{name}'"))
}

/// Flatten a statement tree, depth first.
pub fn collect_stmts(netlist: &Netlist, stmts: &[StmtId], out: &mut Vec<StmtId>) {
    for stmt in stmts {
        out.push(*stmt);
        match netlist.stmt(*stmt) {
            Stmt::If { then_stmts, else_stmts, .. } => {
                collect_stmts(netlist, then_stmts, out);
                collect_stmts(netlist, else_stmts, out);
            }
            Stmt::While { body, .. }
            | Stmt::Process { body }
            | Stmt::IfDebug { body } => collect_stmts(netlist, body, out),
            _ => {}
        }
    }
}

/// Flatten a function's statement tree, following calls into sub-functions.
pub fn collect_stmts_through_calls(netlist: &Netlist, func: FuncId, out: &mut Vec<StmtId>) {
    let mut flat = Vec::new();
    collect_stmts(netlist, &netlist.func(func).stmts, &mut flat);
    for stmt in flat {
        out.push(stmt);
        if let Stmt::Call(sub) = netlist.stmt(stmt) {
            collect_stmts_through_calls(netlist, *sub, out);
        }
    }
}
