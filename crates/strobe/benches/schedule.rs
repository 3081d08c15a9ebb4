use criterion::{Criterion, criterion_group, criterion_main};
use strobe::ir::{DType, EdgeKind, LValue, Netlist, SenItem, SenTree, Stmt};
use strobe::sched::{SchedOptions, schedule};

const FLOPS: usize = 500;

/// A shift chain of flops with a combinational tap on each stage.
fn build() -> Netlist {
    let mut netlist = Netlist::new("top");
    let clk = netlist.create_temp("clk", DType::Bit { width: 1 });
    netlist.var_mut(clk).is_top_input = true;
    let clk_ref = netlist.var_ref(clk);
    let clk_tree = netlist.add_sen_tree(SenTree {
        items: vec![SenItem { edge: EdgeKind::Posedge, expr: Some(clk_ref) }],
    });
    let combo_tree = netlist
        .add_sen_tree(SenTree { items: vec![SenItem { edge: EdgeKind::Combo, expr: None }] });

    let scope = netlist.top_scope();
    let mut prev = netlist.create_temp("d", DType::Bit { width: 8 });
    netlist.var_mut(prev).is_top_input = true;
    for i in 0..FLOPS {
        let q = netlist.create_temp(&format!("q{i}"), DType::Bit { width: 8 });
        let rhs = netlist.var_ref(prev);
        let stmt = netlist.add_stmt(Stmt::Assign { lhs: LValue::Var(q), rhs });
        netlist.add_active(scope, clk_tree, vec![stmt]);

        let tap = netlist.create_temp(&format!("tap{i}"), DType::Bit { width: 8 });
        let q_ref = netlist.var_ref(q);
        let one = netlist.const_u(1, 8);
        let sum = netlist.add(q_ref, one);
        let stmt = netlist.add_stmt(Stmt::Assign { lhs: LValue::Var(tap), rhs: sum });
        netlist.add_active(scope, combo_tree, vec![stmt]);

        prev = q;
    }
    netlist
}

fn benchmark_schedule(c: &mut Criterion) {
    c.bench_function("schedule_flop_chain_500", |b| {
        b.iter_batched(
            build,
            |mut netlist| {
                schedule(&mut netlist, &SchedOptions::default(), None).unwrap();
                netlist
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, benchmark_schedule);
criterion_main!(benches);
