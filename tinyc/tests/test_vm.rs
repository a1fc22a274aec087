use tinyc::prelude::*;

fn load(source: &str) -> (Program, Vm<CaptureHost>) {
    let conf = TinyConf::default();
    let program = compile(source, &conf).unwrap();
    let mut vm = Vm::with_host(conf, CaptureHost::new()).unwrap();
    vm.load::<&str>(&program, &[]).unwrap();
    (program, vm)
}

#[test]
fn test_frames_fully_unwound() {
    let source = r#"
        int leaf(int a, int b) { int x; int y; x = a; y = b; return x * y; }
        int middle(int n) { int t; t = leaf(n, n + 1); return t + leaf(1, 2); }
        int deep(int n) { if (n == 0) return 0; return middle(n) + deep(n - 1); }
        int main() { return deep(5); }
    "#;
    let (_, mut vm) = load(source);

    let mut frames = vec![];
    let mut calls = 0;
    let status = loop {
        let before = (vm.cpu().sp, vm.cpu().bp);
        match vm.step().unwrap() {
            Flow::Call => {
                calls += 1;
                frames.push(before);
            }
            Flow::Return => {
                let caller = frames.pop().expect("return without call");
                assert_eq!((vm.cpu().sp, vm.cpu().bp), caller);
            }
            Flow::Exit(status) => break status,
            Flow::Ok => {}
        }
    };

    assert!(frames.is_empty());
    assert_eq!(calls, 1 + 6 + 5 * 3);
    // n(n+1) + 2, summed for n = 1..5
    assert_eq!(status, (1..=5).map(|n| n * (n + 1) + 2).sum::<i64>());
}

#[test]
fn test_run_steps() {
    let (program, mut vm) = load("int main() { int i; i = 0; while (i < 100) i++; return i; }");
    assert_eq!(vm.cpu().pc, program.entry);

    assert_eq!(vm.run_steps(1).unwrap(), Flow::Call);
    assert_eq!(vm.cpu().pc, program.main);
    assert_eq!(vm.cpu().cycle, 1);

    vm.run_steps(50).unwrap();
    assert_eq!(vm.cpu().cycle, 51);

    assert_eq!(vm.run_steps(100_000).unwrap(), Flow::Exit(100));
    assert_eq!(vm.execute().unwrap(), 100);
}

#[test]
fn test_compile_twice_runs_the_same() {
    let source = include_str!("programs/sort.c");
    let conf = TinyConf::default();

    let first = compile(source, &conf).unwrap();
    let second = compile(source, &conf).unwrap();
    assert_eq!(first, second);

    let outcomes: Vec<(i64, String)> = [first, second]
        .iter()
        .map(|program| {
            let mut vm = Vm::with_host(conf.clone(), CaptureHost::new()).unwrap();
            vm.load::<&str>(program, &[]).unwrap();
            let status = vm.execute().unwrap();
            (status, vm.host().output_str())
        })
        .collect();
    assert_eq!(outcomes[0], outcomes[1]);
}

#[test]
fn test_reload_resets_state() {
    let source = "int counter; int main() { counter++; printf(\"%d\", counter); return counter; }";
    let conf = TinyConf::default();
    let program = compile(source, &conf).unwrap();
    let mut vm = Vm::with_host(conf, CaptureHost::new()).unwrap();

    for _ in 0..3 {
        vm.load::<&str>(&program, &[]).unwrap();
        assert_eq!(vm.execute().unwrap(), 1);
    }
    assert_eq!(vm.host().output_str(), "111");
}
