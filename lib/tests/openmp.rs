use super::*;
use crate::explorer::{AccessKind, EventLog, Explorer};
use crate::memory::{Base, Slot};
use test_log::test;

fn global_base(program: &Program, name: &str) -> Base {
    let declaration = program
        .globals()
        .iter()
        .find(|declaration| declaration.name() == name)
        .unwrap();
    Base::stack(0, Slot::Variable(declaration.id()))
}

#[test]
fn private_copies_are_not_shared() {
    // int total;
    // int main() {
    //     int local = 0; total = 5;
    //     #pragma omp parallel private(local)
    //     { int tmp = 2; local = tmp; total = local; }
    //     return 0;
    // }
    let program = Program::new("main")
        .global(decl("total", Type::Int, None))
        .function(main_returning(vec![
            declare("local", Type::Int, Some(int(0))),
            expr(assign(ident("total"), int(5))),
            omp(
                OmpKind::Parallel,
                vec![OmpClause::Private(vec!["local".to_string()])],
                block(vec![
                    declare("tmp", Type::Int, Some(int(2))),
                    expr(assign(ident("local"), ident("tmp"))),
                    expr(assign(ident("total"), ident("local"))),
                ]),
            ),
            ret(Some(int(0))),
        ]));

    let mut log = EventLog::new();
    let report = Explorer::new(&program, &Config::default())
        .unwrap()
        .run_with_sink(&mut log);
    assert!(report.faults().is_empty());
    assert_eq!(report.events().len(), 1);
    assert_eq!(log.events().len(), 1);

    let event = &log.events()[0];
    assert_eq!(event.access(), AccessKind::Write);
    assert_eq!(event.address().base(), global_base(&program, "total"));
    assert_eq!(event.value(), &AbstractValue::Pos);
}

#[test]
fn shared_locals_are_reported() {
    // int main() {
    //     int seed = 3; int out;
    //     #pragma omp parallel
    //     { out = seed; }
    //     return out;
    // }
    let program = Program::new("main").function(main_returning(vec![
        declare("seed", Type::Int, Some(int(3))),
        declare("out", Type::Int, None),
        omp(
            OmpKind::Parallel,
            vec![],
            block(vec![expr(assign(ident("out"), ident("seed")))]),
        ),
        ret(Some(ident("out"))),
    ]));

    let report = run(&program);
    let accesses: Vec<AccessKind> = report.events().iter().map(|event| event.access()).collect();
    assert_eq!(accesses.len(), 2);
    assert!(accesses.contains(&AccessKind::Read));
    assert!(accesses.contains(&AccessKind::Write));
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);
}

#[test]
fn loop_variable_is_private() {
    // int a[4];
    // int main() {
    //     int i;
    //     #pragma omp parallel for
    //     for (i = 0; i < 4; i = i + 1) a[i] = i;
    //     return 0;
    // }
    let program = Program::new("main")
        .global(decl("a", Type::Int.array_of(Some(4)), None))
        .function(main_returning(vec![
            declare("i", Type::Int, None),
            omp(
                OmpKind::ParallelFor,
                vec![],
                for_(
                    Some(expr(assign(ident("i"), int(0)))),
                    Some(lt(ident("i"), int(4))),
                    Some(assign(ident("i"), add(ident("i"), int(1)))),
                    expr(assign(index(ident("a"), ident("i")), ident("i"))),
                ),
            ),
            ret(Some(int(0))),
        ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    let array = global_base(&program, "a");
    assert!(!report.events().is_empty());
    assert!(report.events().iter().all(|event| {
        event.address().base() == array && event.access() == AccessKind::Write
    }));
}

#[test]
fn first_private_copies_the_original() {
    // int main() {
    //     int n = 4;
    //     #pragma omp parallel firstprivate(n)
    //     { n = n - 1; }
    //     return n;
    // }
    let program = Program::new("main").function(main_returning(vec![
        declare("n", Type::Int, Some(int(4))),
        omp(
            OmpKind::Parallel,
            vec![OmpClause::FirstPrivate(vec!["n".to_string()])],
            block(vec![expr(assign(ident("n"), sub(ident("n"), int(1))))]),
        ),
        ret(Some(ident("n"))),
    ]));

    let report = run(&program);
    assert!(report.faults().is_empty());
    assert!(report.events().is_empty());
    assert_eq!(only_terminal(&report), &AbstractValue::Pos);
}
