use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tinyc::prelude::*;

fn criterion_benchmark(c: &mut Criterion) {
    let source = include_str!("../programs/fib.c");
    let conf = TinyConf::default();

    c.bench_function("fib compile", |b| {
        b.iter(|| black_box(compile(black_box(source), &conf)))
    });

    {
        let program = compile(source, &conf).unwrap();
        let mut vm = Vm::with_host(conf.clone(), CaptureHost::new()).unwrap();

        c.bench_function("fib run", |b| {
            b.iter(|| {
                vm.load::<&str>(&program, &[]).unwrap();
                black_box(vm.execute())
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
