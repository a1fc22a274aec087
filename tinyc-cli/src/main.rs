//! Entrypoint for CLI
use std::{env, fs, process::exit};

use log::{debug, LevelFilter};
use tinyc::{disasm::listing, prelude::*, IMPL_VERSION};

static USAGE: &str = r#"
usage: tinyc [-s] [-d] [--pool BYTES] [--config FILE] FILE [ARGS...]

options:
    -s              Print the source listing with compiled instructions, without running
    -d              Trace every executed instruction
    --pool BYTES    Capacity of the code, data and stack segments
    --config FILE   Load settings from a YAML file

Arguments after FILE are passed to the program's main(argc, argv).

examples:
    tinyc hello.c
    tinyc -s hello.c
    tinyc --config tinyc.yaml fib.c 20
"#;

/// Exit status for compile errors, runtime faults and I/O errors.
const EXIT_FAILURE: i32 = 1;

/// FreeBSD EX_USAGE (64)
const EXIT_USAGE: i32 = 64;

struct Cmd {
    listing: bool,
    trace: bool,
    pool: Option<usize>,
    config: Option<String>,
    filepath: String,
    /// Arguments for the program itself.
    args: Vec<String>,
}

fn main() {
    let Some(cmd) = parse_args(env::args().skip(1)) else {
        print_usage();
        exit(EXIT_USAGE)
    };

    let mut logger = simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env();
    if cmd.trace {
        // Tracing asked for on the command line wins over the environment.
        logger = logger.with_level(LevelFilter::Trace);
    }
    if let Err(err) = logger.init() {
        eprintln!("tinyc: failed to initialise logger: {err}");
    }

    match run(&cmd) {
        Ok(status) => {
            debug!("{} exited with status {status}", cmd.filepath);
            exit(status as i32)
        }
        Err(err) => {
            debug!("{} stage failed", err.stage());
            eprintln!("tinyc: {}: {err}", cmd.filepath);
            exit(EXIT_FAILURE)
        }
    }
}

fn run(cmd: &Cmd) -> TinyResult<i64> {
    let mut conf = match &cmd.config {
        Some(path) => load_config(path)?,
        None => TinyConf::default(),
    };
    if let Some(pool) = cmd.pool {
        conf.pool_size = pool;
    }
    conf.trace |= cmd.trace;
    conf.validate()?;

    let source = fs::read(&cmd.filepath)?;
    let program = compile(&source, &conf)?;

    if cmd.listing {
        print!("{}", listing(&source, &program));
        return Ok(0);
    }

    // The program sees its own source path as argv[0].
    let args: Vec<&str> = std::iter::once(cmd.filepath.as_str())
        .chain(cmd.args.iter().map(String::as_str))
        .collect();

    let mut vm = Vm::new(conf)?;
    vm.load(&program, &args)?;
    vm.execute()
}

fn load_config(path: &str) -> TinyResult<TinyConf> {
    let file = fs::File::open(path)?;
    serde_yaml::from_reader(file).map_err(|err| TinyError::Config(format!("{path}: {err}")))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Cmd> {
    let mut listing = false;
    let mut trace = false;
    let mut pool = None;
    let mut config = None;

    // Options end at the source file.
    let filepath = loop {
        let arg = args.next()?;
        match arg.as_str() {
            "-s" => listing = true,
            "-d" => trace = true,
            "--pool" => pool = Some(args.next()?.parse().ok()?),
            "--config" => config = Some(args.next()?),
            _ if arg.starts_with('-') => return None,
            _ => break arg,
        }
    };

    Some(Cmd {
        listing,
        trace,
        pool,
        config,
        filepath,
        args: args.collect(),
    })
}

fn print_usage() {
    println!("tinyc v{IMPL_VERSION}");
    println!("{USAGE}");
}
