use tinyc::{memory::Segment, prelude::*};

fn run(source: &str, conf: TinyConf) -> (TinyResult<i64>, String) {
    let program = match compile(source, &conf) {
        Ok(program) => program,
        Err(err) => return (Err(err.into()), String::new()),
    };
    let mut vm = Vm::with_host(conf, CaptureHost::new()).unwrap();
    vm.load::<&str>(&program, &[]).unwrap();
    let result = vm.execute();
    (result, vm.host().output_str())
}

fn fault_of(result: TinyResult<i64>) -> RuntimeFault {
    match result {
        Err(TinyError::Runtime(fault)) => fault,
        other => panic!("expected runtime fault, got {other:?}"),
    }
}

#[test]
fn test_undefined_identifier_fails_before_running() {
    let source = "int main() {\n  printf(\"ran\\n\");\n  return nope + 1;\n}\n";
    let (result, output) = run(source, TinyConf::default());
    match result {
        Err(TinyError::Compile(err)) => {
            assert_eq!(err.kind, CompileErrorKind::UndefinedSymbol("nope".into()));
            assert_eq!(err.line, 3);
            assert_eq!(err.to_string(), "line 3: semantic error: undefined symbol 'nope'");
        }
        other => panic!("expected compile error, got {other:?}"),
    }
    assert_eq!(output, "");
}

#[test]
fn test_lexical_error() {
    let err = compile("int main() {\n  return 1 @ 2;\n}", &TinyConf::default()).unwrap_err();
    assert_eq!(err.line, 2);
    assert_eq!(err.kind.stage(), "lexical");
}

#[test]
fn test_syntax_error_names_token() {
    let err = compile("int main() {\n  if 1) return 0;\n}", &TinyConf::default()).unwrap_err();
    assert_eq!(err.to_string(), "line 2: syntax error: expected '(', found number 1");
}

#[test]
fn test_data_segment_overflow() {
    let conf = TinyConf {
        pool_size: 256,
        ..TinyConf::default()
    };
    let globals: String = (0..40).map(|i| format!("int g{i};\n")).collect();
    let source = format!("{globals}int main() {{ return 0; }}");
    let err = compile(source, &conf).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::SegmentOverflow(Segment::Data));
    assert_eq!(err.line, 33);
}

#[test]
fn test_division_by_zero_faults() {
    let source = r#"
        int main() {
          int z;
          z = 0;
          printf("before\n");
          return 10 / z;
        }
    "#;
    let (result, output) = run(source, TinyConf::default());
    let fault = fault_of(result);
    assert_eq!(fault.kind, FaultKind::DivisionByZero);
    assert_eq!(output, "before\n");

    let (result, _) = run("int main() { int z; z = 0; return 10 % z; }", TinyConf::default());
    assert_eq!(fault_of(result).kind, FaultKind::DivisionByZero);
}

#[test]
fn test_null_dereference_faults() {
    let (result, _) = run("int main() { int *p; p = 0; return *p; }", TinyConf::default());
    assert_eq!(fault_of(result).kind, FaultKind::OutOfBounds(0));

    let (result, _) = run("int main() { char *p; p = 8; *p = 1; return 0; }", TinyConf::default());
    assert_eq!(fault_of(result).kind, FaultKind::OutOfBounds(8));
}

#[test]
fn test_runaway_recursion_overflows_stack() {
    let conf = TinyConf {
        pool_size: 4096,
        ..TinyConf::default()
    };
    let (result, _) = run(
        "int f(int n) { return f(n + 1); } int main() { return f(0); }",
        conf,
    );
    assert_eq!(fault_of(result).kind, FaultKind::SegmentOverflow(Segment::Stack));
}

#[test]
fn test_infinite_loop_hits_cycle_limit() {
    let conf = TinyConf {
        max_cycles: Some(10_000),
        ..TinyConf::default()
    };
    let (result, _) = run("int main() { while (1) ; return 0; }", conf);
    let fault = fault_of(result);
    assert_eq!(fault.kind, FaultKind::CycleLimit(10_000));
    assert!(fault.to_string().starts_with("cycle 10000 (pc "));
}

#[test]
fn test_oversized_printf_width_faults() {
    let source = "int main() {\n  printf(\"ok\\n\");\n  printf(\"%99999999999999999999999d\", 1);\n  return 0;\n}\n";
    let (result, output) = run(source, TinyConf::default());
    let fault = fault_of(result);
    assert_eq!(fault.kind, FaultKind::FieldWidth(usize::MAX));
    assert!(fault.to_string().contains("runtime fault: printf field width"));
    assert_eq!(output, "ok\n");
}

#[test]
fn test_invalid_config() {
    let conf = TinyConf {
        pool_size: 16,
        ..TinyConf::default()
    };
    assert!(matches!(
        Vm::with_host(conf, CaptureHost::new()),
        Err(TinyError::Config(_))
    ));
}
