//! Whole programs run through the analysis.

use crate::ast::*;
use crate::config::{Config, DataModel, HeapMergePolicy};
use crate::domain::AbstractValue;
use crate::explorer::Report;
use crate::memory::FaultKind;
use test_log::test;

mod openmp;

fn main_returning(statements: Vec<Statement>) -> Function {
    Function::new("main", Type::Int, vec![], block(statements))
}

fn run(program: &Program) -> Report {
    crate::analyze(program, &Config::default()).unwrap()
}

fn only_terminal(report: &Report) -> &AbstractValue {
    assert_eq!(report.terminals().len(), 1, "{:?}", report.terminals());
    report.terminals()[0].value()
}

/// The distinct values returned by every terminal, in order.
fn terminal_values(report: &Report) -> Vec<AbstractValue> {
    let mut values: Vec<AbstractValue> = report
        .terminals()
        .iter()
        .map(|terminal| terminal.value().clone())
        .collect();
    values.sort();
    values.dedup();
    values
}

#[test]
fn factorial() {
    // int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); }
    let program = Program::new("main")
        .function(Function::new(
            "fact",
            Type::Int,
            vec![param("n", Type::Int)],
            block(vec![
                if_(le(ident("n"), int(1)), ret(Some(int(1))), None),
                ret(Some(mul(
                    ident("n"),
                    call("fact", vec![sub(ident("n"), int(1))]),
                ))),
            ]),
        ))
        .function(main_returning(vec![ret(Some(call("fact", vec![int(7)])))]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert!(!report.incomplete());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);
}

#[test]
fn pointer_difference() {
    // int a[8]; int *p = &a[6]; int *q = &a[1]; return p - q;
    let program = Program::new("main").function(main_returning(vec![
        declare("a", Type::Int.array_of(Some(8)), None),
        declare(
            "p",
            Type::Int.pointer_to(),
            Some(address_of(index(ident("a"), int(6)))),
        ),
        declare(
            "q",
            Type::Int.pointer_to(),
            Some(address_of(index(ident("a"), int(1)))),
        ),
        ret(Some(sub(ident("p"), ident("q")))),
    ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);
}

#[test]
fn enumerators_are_constants() {
    // enum color { RED, GREEN = 5, BLUE }; int table[7];
    let program = |subscript: Expression| {
        Program::new("main")
            .enumeration(Enumeration::new(
                "color",
                vec![
                    Enumerator::new("RED", None),
                    Enumerator::new("GREEN", Some(int(5))),
                    Enumerator::new("BLUE", None),
                ],
            ))
            .global(decl("table", Type::Int.array_of(Some(7)), None))
            .function(main_returning(vec![ret(Some(index(
                ident("table"),
                subscript,
            )))]))
    };

    let report = run(&program(ident("BLUE")));
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Zero);

    let report = run(&program(add(ident("BLUE"), int(1))));
    assert_eq!(report.faults_of(FaultKind::OutOfBounds).len(), 1);
}

#[test]
fn function_pointer_table() {
    // int one() { return 1; } int neg() { return -1; }
    // int (*table[2])() = { one, neg }; int (*f)() = table[1]; return f();
    let handler = Type::Int.function_returning(vec![]).pointer_to();
    let program = Program::new("main")
        .function(Function::new(
            "one",
            Type::Int,
            vec![],
            block(vec![ret(Some(int(1)))]),
        ))
        .function(Function::new(
            "neg",
            Type::Int,
            vec![],
            block(vec![ret(Some(negate(int(1))))]),
        ))
        .function(main_returning(vec![
            declare_list(
                "table",
                handler.clone().array_of(Some(2)),
                vec![
                    Initializer::Expression(ident("one")),
                    Initializer::Expression(ident("neg")),
                ],
            ),
            declare("f", handler, Some(index(ident("table"), int(1)))),
            ret(Some(call_expr(ident("f"), vec![]))),
        ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Neg);
}

fn dispatch_table(statements: Vec<Statement>) -> Program {
    // int one() { return 1; } int neg() { return -1; }
    // int (*table[2])() = { one, neg };
    let handler = Type::Int.function_returning(vec![]).pointer_to();
    Program::new("main")
        .function(Function::new(
            "one",
            Type::Int,
            vec![],
            block(vec![ret(Some(int(1)))]),
        ))
        .function(Function::new(
            "neg",
            Type::Int,
            vec![],
            block(vec![ret(Some(negate(int(1))))]),
        ))
        .global(Declaration::new(
            "table",
            handler.array_of(Some(2)),
            Some(Initializer::List(vec![
                Initializer::Expression(ident("one")),
                Initializer::Expression(ident("neg")),
            ])),
        ))
        .function(main_returning(statements))
}

#[test]
fn dispatch_in_a_loop() {
    // int s = 0; int i; for (i = 0; i < 2; i = i + 1) s = table[i](); return s;
    let program = dispatch_table(vec![
        declare("s", Type::Int, Some(int(0))),
        declare("i", Type::Int, None),
        for_(
            Some(expr(assign(ident("i"), int(0)))),
            Some(lt(ident("i"), int(2))),
            Some(assign(ident("i"), add(ident("i"), int(1)))),
            expr(assign(
                ident("s"),
                call_expr(index(ident("table"), ident("i")), vec![]),
            )),
        ),
        ret(Some(ident("s"))),
    ]);

    let report = run(&program);
    assert!(report.faults().is_empty(), "{:?}", report.faults());
    assert!(!report.incomplete());
    assert_eq!(
        terminal_values(&report),
        vec![AbstractValue::Pos, AbstractValue::Neg]
    );
}

#[test]
fn dispatch_on_unknown_index() {
    // int i = rand(); return table[i]();
    let program = dispatch_table(vec![
        declare("i", Type::Int, Some(call("rand", vec![]))),
        ret(Some(call_expr(index(ident("table"), ident("i")), vec![]))),
    ]);

    let report = run(&program);
    assert!(!report.has_fault(FaultKind::WildPointerDeref));
    assert_eq!(
        terminal_values(&report),
        vec![AbstractValue::Pos, AbstractValue::Neg]
    );
}

#[test]
fn short_circuit_skips_the_right_operand() {
    // int *p = 0; int x = 0; if (p != 0 && *p > 0) x = 1; return x;
    let program = |condition: Expression| {
        Program::new("main").function(main_returning(vec![
            declare("p", Type::Int.pointer_to(), Some(null())),
            declare("x", Type::Int, Some(int(0))),
            if_(condition, expr(assign(ident("x"), int(1))), None),
            ret(Some(ident("x"))),
        ]))
    };
    let dereference = || gt(deref(ident("p")), int(0));

    let report = run(&program(and(ne(ident("p"), null()), dereference())));
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Zero);

    // if (p == 0 || *p > 0) x = 1;
    let report = run(&program(or(eq(ident("p"), null()), dereference())));
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);
}

#[test]
fn short_circuit_on_unknown_operand() {
    // int a = rand(); return a && 5;
    let program = Program::new("main").function(main_returning(vec![
        declare("a", Type::Int, Some(call("rand", vec![]))),
        ret(Some(and(ident("a"), int(5)))),
    ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert_eq!(
        terminal_values(&report),
        vec![AbstractValue::Zero, AbstractValue::Pos]
    );
}

#[test]
fn conditional_expressions() {
    // int *p = 0; return p ? *p : 3;
    let program = Program::new("main").function(main_returning(vec![
        declare("p", Type::Int.pointer_to(), Some(null())),
        ret(Some(conditional(ident("p"), deref(ident("p")), int(3)))),
    ]));
    let report = run(&program);
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);

    // int a = rand(); return a > 0 ? a : -a;
    let program = Program::new("main").function(main_returning(vec![
        declare("a", Type::Int, Some(call("rand", vec![]))),
        ret(Some(conditional(
            gt(ident("a"), int(0)),
            ident("a"),
            negate(ident("a")),
        ))),
    ]));
    let report = run(&program);
    assert!(report.faults().is_empty());
    assert_eq!(
        terminal_values(&report),
        vec![AbstractValue::Zero, AbstractValue::Pos]
    );
}

#[test]
fn comma_evaluates_in_order() {
    // int x; return (x = -2, x * x);
    let program = Program::new("main").function(main_returning(vec![
        declare("x", Type::Int, None),
        ret(Some(comma(vec![
            assign(ident("x"), negate(int(2))),
            mul(ident("x"), ident("x")),
        ]))),
    ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);
}

#[test]
fn compound_assignment() {
    // int x = 1; x += 2; x *= 3; return x;
    let program = Program::new("main").function(main_returning(vec![
        declare("x", Type::Int, Some(int(1))),
        expr(compound(BinaryOperator::Add, ident("x"), int(2))),
        expr(compound(BinaryOperator::Mul, ident("x"), int(3))),
        ret(Some(ident("x"))),
    ]));
    let report = run(&program);
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);

    // int a[4]; int *p = &a[0]; p += 4; *p = 0; return 0;
    let program = Program::new("main").function(main_returning(vec![
        declare("a", Type::Int.array_of(Some(4)), None),
        declare(
            "p",
            Type::Int.pointer_to(),
            Some(address_of(index(ident("a"), int(0)))),
        ),
        expr(compound(BinaryOperator::Add, ident("p"), int(4))),
        expr(assign(deref(ident("p")), int(0))),
        ret(Some(int(0))),
    ]));
    let report = run(&program);
    assert_eq!(report.faults_of(FaultKind::OutOfBounds).len(), 1);
    assert_eq!(only_terminal(&report), &AbstractValue::Zero);
}

#[test]
fn narrowing_casts_wrap() {
    // return (char) 200;
    let program = Program::new("main").function(main_returning(vec![ret(Some(cast(
        Type::Char,
        int(200),
    )))]));
    assert_eq!(only_terminal(&run(&program)), &AbstractValue::Neg);
}

#[test]
fn union_punning() {
    // union u { int i; char c[4]; } x; x.i = 1; return x.c[0];
    let program = Program::new("main")
        .aggregate(union_(
            "u",
            vec![("i", Type::Int), ("c", Type::Char.array_of(Some(4)))],
        ))
        .function(main_returning(vec![
            declare("x", Type::Union("u".to_string()), None),
            expr(assign(member(ident("x"), "i"), int(1))),
            ret(Some(index(member(ident("x"), "c"), int(0)))),
        ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert!(only_terminal(&report).is_top());
}

#[test]
fn switch_on_constant() {
    // switch (selector) { case 1: r = 10; break; case 2: r = 20; case 3: r = r + 1; break;
    //                     default: r = -1; }
    let program = |selector: i64| {
        Program::new("main").function(main_returning(vec![
            declare("r", Type::Int, Some(int(0))),
            switch(
                int(selector),
                block(vec![
                    case(int(1), expr(assign(ident("r"), int(10)))),
                    break_(),
                    case(int(2), expr(assign(ident("r"), int(20)))),
                    case(int(3), expr(assign(ident("r"), add(ident("r"), int(1))))),
                    break_(),
                    default(expr(assign(ident("r"), negate(int(1))))),
                ]),
            ),
            ret(Some(ident("r"))),
        ]))
    };

    assert_eq!(only_terminal(&run(&program(2))), &AbstractValue::Pos);
    assert_eq!(only_terminal(&run(&program(7))), &AbstractValue::Neg);
}

#[test]
fn switch_on_unknown_selector() {
    // int r = 0;
    // switch (rand()) { case -1: r = -1; break; case 0: r = 1; break; case 1: r = 2; break;
    //                   default: r = 3; }
    // return r;
    let program = Program::new("main").function(main_returning(vec![
        declare("r", Type::Int, Some(int(0))),
        switch(
            call("rand", vec![]),
            block(vec![
                case(negate(int(1)), expr(assign(ident("r"), negate(int(1))))),
                break_(),
                case(int(0), expr(assign(ident("r"), int(1)))),
                break_(),
                case(int(1), expr(assign(ident("r"), int(2)))),
                break_(),
                default(expr(assign(ident("r"), int(3)))),
            ]),
        ),
        ret(Some(ident("r"))),
    ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);
}

#[test]
fn backward_goto_terminates() {
    // int i = 0; again: i = i + 1; if (i < 10) goto again; return i;
    let program = Program::new("main").function(main_returning(vec![
        declare("i", Type::Int, Some(int(0))),
        labeled("again", expr(assign(ident("i"), add(ident("i"), int(1))))),
        if_(lt(ident("i"), int(10)), goto("again"), None),
        ret(Some(ident("i"))),
    ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert!(!report.incomplete());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);
}

#[test]
fn malformed_callee_returns_anything() {
    // int broken() { goto nowhere; return 1; } int main() { int x = broken(); return x; }
    let program = Program::new("main")
        .function(Function::new(
            "broken",
            Type::Int,
            vec![],
            block(vec![goto("nowhere"), ret(Some(int(1)))]),
        ))
        .function(main_returning(vec![
            declare("x", Type::Int, Some(call("broken", vec![]))),
            ret(Some(ident("x"))),
        ]));

    let report = run(&program);
    assert_eq!(report.malformed().len(), 1);
    assert!(report
        .malformed()
        .iter()
        .all(|diagnostic| diagnostic.function() == "broken"));
    assert!(!report.incomplete());
    assert!(only_terminal(&report).is_top());
}

#[test]
fn global_heap_merging() {
    // int *a = malloc(4); *a = 1; int *b = malloc(4); *b = -1; int *c = malloc(4); return *a;
    let allocate = || call("malloc", vec![sizeof_type(Type::Int)]);
    let program = Program::new("main").function(main_returning(vec![
        declare("a", Type::Int.pointer_to(), Some(allocate())),
        expr(assign(deref(ident("a")), int(1))),
        declare("b", Type::Int.pointer_to(), Some(allocate())),
        expr(assign(deref(ident("b")), negate(int(1)))),
        declare("c", Type::Int.pointer_to(), Some(allocate())),
        ret(Some(deref(ident("a")))),
    ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);

    let global = Config::default().with_heap_merge_policy(HeapMergePolicy::Global);
    let report = crate::analyze(&program, &global).unwrap();
    assert!(report.faults().is_empty());
    assert!(only_terminal(&report).is_top());
}

#[test]
fn data_model_sets_long_width() {
    // return sizeof(long) - 4;
    let program = Program::new("main").function(main_returning(vec![ret(Some(sub(
        sizeof_type(Type::Long),
        int(4),
    )))]));
    let ilp32 = Config::default().with_data_model(DataModel::Ilp32);
    assert_eq!(only_terminal(&run(&program)), &AbstractValue::Pos);
    assert_eq!(
        only_terminal(&crate::analyze(&program, &ilp32).unwrap()),
        &AbstractValue::Zero
    );

    // int x = 1; long *p = (long *) &x; return (int) *p;
    let program = Program::new("main").function(main_returning(vec![
        declare("x", Type::Int, Some(int(1))),
        declare(
            "p",
            Type::Long.pointer_to(),
            Some(cast(Type::Long.pointer_to(), address_of(ident("x")))),
        ),
        ret(Some(cast(Type::Int, deref(ident("p"))))),
    ]));
    let report = run(&program);
    assert_eq!(report.faults_of(FaultKind::OutOfBounds).len(), 1);
    assert!(only_terminal(&report).is_top());

    let report = crate::analyze(&program, &ilp32).unwrap();
    assert!(report.faults().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);
}

#[test]
fn reports_are_deterministic() {
    let program = Program::new("main")
        .global(decl("g", Type::Int, None))
        .function(main_returning(vec![
            declare("p", Type::Int.pointer_to(), Some(address_of(ident("g")))),
            declare("i", Type::Int, Some(call("rand", vec![]))),
            if_(
                gt(ident("i"), int(3)),
                expr(assign(deref(ident("p")), ident("i"))),
                Some(expr(assign(ident("p"), null()))),
            ),
            ret(Some(deref(ident("p")))),
        ]));

    let first = run(&program).to_json().unwrap();
    let second = run(&program).to_json().unwrap();
    assert_eq!(first, second);
}
