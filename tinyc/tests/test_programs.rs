use tinyc::prelude::*;

/// Compile and run against a capturing host, returning the exit status and output.
fn run_source(source: &str, args: &[&str], host: CaptureHost) -> (i64, String) {
    match tinyc::run_with(source, TinyConf::default(), host, args) {
        Ok((status, host)) => (status, host.output_str()),
        Err(err) => panic!("{err}"),
    }
}

fn run(source: &str) -> (i64, String) {
    run_source(source, &[], CaptureHost::new())
}

#[test]
fn test_return_literal() {
    for literal in ["0", "1", "42", "255", "1000", "0x7fff", "010"] {
        let source = format!("int main() {{ return {literal}; }}");
        let expected = if let Some(hex) = literal.strip_prefix("0x") {
            i64::from_str_radix(hex, 16).unwrap()
        } else if literal.len() > 1 && literal.starts_with('0') {
            i64::from_str_radix(&literal[1..], 8).unwrap()
        } else {
            literal.parse().unwrap()
        };
        assert_eq!(run(&source).0, expected, "return {literal}");
    }
    assert_eq!(run("int main() { return -7; }").0, -7);
}

#[test]
fn test_arithmetic_precedence() {
    let cases = [
        ("2 + 3 * 4", 14),
        ("(2 + 3) * 4", 20),
        ("100 - 10 - 5", 85),
        ("2 * (3 + 4) - 20 / 4 / 5", 13),
        ("(7 - 10) / 2 * -1 + 17 % 5", 3),
        ("-7 % 3", -1),
        ("1 + 2 < 4", 1),
        ("3 == 3 != 0", 1),
        ("1 << 4 | 0xF0 >> 4 ^ 3 & 6", 29),
        ("10 - 2 * 3 >= 4 == 1", 1),
        ("~5 + !0 + !7", -5),
    ];
    for (expr, expected) in cases {
        let source = format!("int main() {{ return {expr}; }}");
        assert_eq!(run(&source).0, expected, "{expr}");
    }
}

#[test]
fn test_logic_and_conditional() {
    let source = r#"
        int main() {
          int a;
          int b;
          a = 3;
          b = 0;
          return (a > 2 ? 10 : 20) + (b || a) * 100 + (a && b) * 1000 + !b * 5 + (~0 == -1);
        }
    "#;
    assert_eq!(run(source).0, 116);

    // The right side is skipped once the result is known.
    let source = r#"
        int hits;
        int touch() { hits++; return 1; }
        int main() {
          0 && touch();
          1 || touch();
          1 && touch();
          0 ? touch() : 0;
          return hits;
        }
    "#;
    assert_eq!(run(source).0, 1);
}

#[test]
fn test_assignment_and_locals() {
    let source = r#"
        int g;
        int main() {
          int a;
          int b;
          a = b = 4;
          g = a + b;
          {
            int c = g * 2, *p = &c;
            *p = *p + 1;
            return c;
          }
        }
    "#;
    assert_eq!(run(source).0, 17);
}

#[test]
fn test_chars_are_signed() {
    assert_eq!(run("int main() { char c; c = 200; return c; }").0, -56);
    assert_eq!(run("int main() { return sizeof(char) + sizeof(int) * 10 + sizeof(char *) * 100; }").0, 881);
}

#[test]
fn test_recursion() {
    let (status, output) = run(include_str!("programs/recursion.c"));
    assert_eq!(status, 0);

    let expected: String = (0..=12)
        .map(|n: u64| {
            let factorial: u64 = (1..=n).product();
            let (mut a, mut b) = (0u64, 1u64);
            for _ in 0..n {
                (a, b) = (b, a + b);
            }
            format!("{n} {factorial} {a}\n")
        })
        .collect();
    assert_eq!(output, expected);
}

#[test]
fn test_forward_references() {
    assert_eq!(run(include_str!("programs/even_odd.c")).0, 11);

    // Prototypes work too.
    let source = r#"
        int twice(int x);
        int main() { return twice(21); }
        int twice(int x) { return x * 2; }
    "#;
    assert_eq!(run(source).0, 42);
}

#[test]
fn test_locals_shadow_globals() {
    let source = r#"
        int x;
        int f(int x) { int y; y = x * 10; return y; }
        int g() { return x; }
        int main() {
          x = 7;
          return f(20) + g() * 0 + (g() == 7) * 10;
        }
    "#;
    // f sees its parameter, g sees the global again.
    assert_eq!(run(source).0, 210);
}

#[test]
fn test_pointers() {
    assert_eq!(run(include_str!("programs/pointers.c")).0, 5);
    assert_eq!(
        run("int main() { int a; int *p; p = &a; *p = 5; return *p; }").0,
        5
    );
}

#[test]
fn test_strings_and_memory() {
    let (status, output) = run(include_str!("programs/strings.c"));
    assert_eq!(status, 0);
    assert_eq!(
        output,
        "xxx 3\ncba\n1 0\n[   hi|7   |005|ff]\nadjacent literals\n"
    );
}

#[test]
fn test_files() {
    let host = CaptureHost::new().with_file("input.txt", "twenty bytes of text");
    let (status, host) =
        tinyc::run_with(include_str!("programs/files.c"), TinyConf::default(), host, &[] as &[&str]).unwrap();
    assert_eq!(status, 20);
    // Every descriptor was closed again.
    assert_eq!(host.open_count(), 0);
}

#[test]
fn test_main_arguments() {
    let (status, output) = run_source(
        include_str!("programs/args.c"),
        &["args.c", "one", "two"],
        CaptureHost::new(),
    );
    assert_eq!(status, 3);
    assert_eq!(output, "0:args.c\n1:one\n2:two\n");
}

#[test]
fn test_sort() {
    let mut seed = 7;
    let mut data: Vec<i64> = (0..8)
        .map(|_| {
            seed = (seed * 13 + 5) % 31;
            seed
        })
        .collect();
    let inversions = (0..data.len())
        .flat_map(|i| (i + 1..data.len()).map(move |j| (i, j)))
        .filter(|(i, j)| data[*i] > data[*j])
        .count();
    data.sort();
    let expected: String = data.iter().map(|n| format!("{n} ")).collect::<String>() + "\n";

    let (status, output) = run(include_str!("programs/sort.c"));
    assert_eq!(status, inversions as i64);
    assert_eq!(output, expected);
}

#[test]
fn test_exit_and_printf_result() {
    let source = r#"
        int main() {
          int n;
          n = printf("%d\n", 12345);
          exit(n * 10);
          return 1;
        }
    "#;
    assert_eq!(run(source), (60, "12345\n".to_string()));
}

#[test]
fn test_malloc_exhaustion_returns_null() {
    let conf = TinyConf {
        heap_size: Some(64),
        ..TinyConf::default()
    };
    let source = "int main() { char *a; a = malloc(48); return malloc(32) == 0; }";
    let (status, _) = tinyc::run_with(source, conf, CaptureHost::new(), &[] as &[&str]).unwrap();
    assert_eq!(status, 1);
}
