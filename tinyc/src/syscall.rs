//! Builtin calls into the host.
//!
//! Syscalls read their arguments straight off the stack, as pushed by the
//! caller. The topmost word is the last argument.
use crate::{
    bytecode::Opcode,
    constants::MAX_FIELD_WIDTH,
    error::FaultKind,
    host::Host,
    memory::{MemResult, Memory},
    vm::{Flow, Vm},
};

impl<H: Host> Vm<H> {
    pub(crate) fn syscall(&mut self, op: Opcode) -> MemResult<Flow> {
        let ax = match op {
            // open(path, flags)
            Opcode::Open => {
                let path = self.memory.c_str(self.stack_arg(1)?)?;
                let flags = self.stack_arg(0)?;
                self.host.open(path, flags)
            }
            // read(fd, buf, count)
            Opcode::Read => {
                let fd = self.stack_arg(2)?;
                let buf = self.stack_arg(1)?;
                match usize::try_from(self.stack_arg(0)?) {
                    Ok(0) => 0,
                    Ok(count) => {
                        let dest = self.memory.slice_mut(buf, count)?;
                        self.host.read(fd, dest)
                    }
                    Err(_) => -1,
                }
            }
            // close(fd)
            Opcode::Clos => {
                let fd = self.stack_arg(0)?;
                self.host.close(fd)
            }
            Opcode::Prtf => self.printf()?,
            // malloc(size)
            Opcode::Malc => {
                let size = self.stack_arg(0)?;
                self.memory.alloc(size).unwrap_or(0)
            }
            // The heap is an arena, released as a whole when the program ends.
            Opcode::Free => 0,
            // memset(dest, value, count)
            Opcode::Mset => {
                let dest = self.stack_arg(2)?;
                let value = self.stack_arg(1)?;
                let count = self.stack_arg(0)?;
                if count > 0 {
                    self.memory.slice_mut(dest, count as usize)?.fill(value as u8);
                }
                dest
            }
            // memcmp(a, b, count)
            Opcode::Mcmp => {
                let a = self.stack_arg(2)?;
                let b = self.stack_arg(1)?;
                let count = self.stack_arg(0)?;
                if count > 0 {
                    let count = count as usize;
                    compare(self.memory.slice(a, count)?, self.memory.slice(b, count)?)
                } else {
                    0
                }
            }
            // exit(status)
            Opcode::Exit => {
                let status = self.stack_arg(0)?;
                log::debug!("exit({status})");
                return Ok(Flow::Exit(status));
            }
            _ => return Err(FaultKind::InvalidOpcode(op.word())),
        };

        self.cpu.ax = ax;
        Ok(Flow::Ok)
    }

    /// `printf(fmt, ...)`
    ///
    /// The argument count is taken from the `ADJ` that pops the
    /// arguments after the call.
    fn printf(&mut self) -> MemResult<i64> {
        let argc = match self.code.get(self.cpu.pc) {
            Some(word) if *word == Opcode::Adj.word() => {
                self.code.get(self.cpu.pc + 1).copied().unwrap_or(1)
            }
            _ => 1,
        };
        if argc < 1 {
            return Ok(0);
        }

        // Format string is the deepest argument.
        let fmt = self.stack_arg(argc - 1)?;
        let args = (1..argc)
            .map(|index| self.stack_arg(argc - 1 - index))
            .collect::<MemResult<Vec<_>>>()?;

        let mut out = Vec::new();
        format(&self.memory, self.memory.c_str(fmt)?, &args, &mut out)?;

        match self.host.write(&out) {
            Ok(()) => Ok(out.len() as i64),
            Err(err) => {
                log::warn!("printf failed: {err}");
                Ok(-1)
            }
        }
    }
}

/// Difference of the first mismatching bytes, compared as unsigned.
fn compare(a: &[u8], b: &[u8]) -> i64 {
    a.iter()
        .zip(b)
        .find(|(x, y)| x != y)
        .map(|(x, y)| *x as i64 - *y as i64)
        .unwrap_or(0)
}

/// Conversion specification following a `%`.
#[derive(Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

impl Spec {
    /// Parse flags, width, precision and length, leaving `pos` at the conversion character.
    fn parse(fmt: &[u8], pos: &mut usize) -> MemResult<Self> {
        let mut spec = Spec::default();

        while let Some(c @ (b'-' | b'0')) = fmt.get(*pos) {
            match c {
                b'-' => spec.left = true,
                _ => spec.zero = true,
            }
            *pos += 1;
        }

        spec.width = digits(fmt, pos)?;

        if fmt.get(*pos) == Some(&b'.') {
            *pos += 1;
            spec.precision = Some(digits(fmt, pos)?);
        }

        while fmt.get(*pos) == Some(&b'l') {
            *pos += 1;
        }

        Ok(spec)
    }

    /// Write a converted integer, with its sign or prefix kept ahead of zero padding.
    fn pad_number(&self, prefix: &[u8], digits: &[u8], out: &mut Vec<u8>) {
        let mut body = Vec::with_capacity(digits.len());
        if let Some(precision) = self.precision {
            body.resize(precision.saturating_sub(digits.len()), b'0');
        }
        body.extend_from_slice(digits);

        let len = prefix.len() + body.len();
        let fill = self.width.saturating_sub(len);

        if self.left {
            out.extend_from_slice(prefix);
            out.extend_from_slice(&body);
            out.resize(out.len() + fill, b' ');
        } else if self.zero && self.precision.is_none() {
            out.extend_from_slice(prefix);
            out.resize(out.len() + fill, b'0');
            out.extend_from_slice(&body);
        } else {
            out.resize(out.len() + fill, b' ');
            out.extend_from_slice(prefix);
            out.extend_from_slice(&body);
        }
    }

    fn pad_text(&self, text: &[u8], out: &mut Vec<u8>) {
        let fill = self.width.saturating_sub(text.len());
        if self.left {
            out.extend_from_slice(text);
            out.resize(out.len() + fill, b' ');
        } else {
            out.resize(out.len() + fill, b' ');
            out.extend_from_slice(text);
        }
    }
}

fn digits(fmt: &[u8], pos: &mut usize) -> MemResult<usize> {
    let mut value = 0usize;
    while let Some(c @ b'0'..=b'9') = fmt.get(*pos) {
        value = value.saturating_mul(10).saturating_add((c - b'0') as usize);
        *pos += 1;
    }
    if value > MAX_FIELD_WIDTH {
        return Err(FaultKind::FieldWidth(value));
    }
    Ok(value)
}

/// Expand a printf format string into `out`.
///
/// Missing arguments read as zero. Unknown conversions are copied through as-is.
pub fn format(memory: &Memory, fmt: &[u8], args: &[i64], out: &mut Vec<u8>) -> MemResult<()> {
    let mut args = args.iter().copied();
    let mut pos = 0;

    while let Some(&c) = fmt.get(pos) {
        pos += 1;
        if c != b'%' {
            out.push(c);
            continue;
        }

        let start = pos;
        let spec = Spec::parse(fmt, &mut pos)?;
        let Some(&conversion) = fmt.get(pos) else {
            out.extend_from_slice(&fmt[start - 1..]);
            break;
        };
        pos += 1;

        match conversion {
            b'%' => out.push(b'%'),
            b'd' | b'i' => {
                let value = args.next().unwrap_or(0);
                let sign: &[u8] = if value < 0 { b"-" } else { b"" };
                spec.pad_number(sign, value.unsigned_abs().to_string().as_bytes(), out);
            }
            b'u' => {
                let value = args.next().unwrap_or(0) as u64;
                spec.pad_number(b"", value.to_string().as_bytes(), out);
            }
            b'x' => {
                let value = args.next().unwrap_or(0) as u64;
                spec.pad_number(b"", format!("{value:x}").as_bytes(), out);
            }
            b'X' => {
                let value = args.next().unwrap_or(0) as u64;
                spec.pad_number(b"", format!("{value:X}").as_bytes(), out);
            }
            b'o' => {
                let value = args.next().unwrap_or(0) as u64;
                spec.pad_number(b"", format!("{value:o}").as_bytes(), out);
            }
            b'p' => {
                let value = args.next().unwrap_or(0) as u64;
                spec.pad_number(b"0x", format!("{value:x}").as_bytes(), out);
            }
            b'c' => {
                let value = args.next().unwrap_or(0) as u8;
                spec.pad_text(&[value], out);
            }
            b's' => {
                let addr = args.next().unwrap_or(0);
                let text = if addr == 0 {
                    &b"(null)"[..]
                } else {
                    memory.c_str(addr)?
                };
                let text = match spec.precision {
                    Some(precision) => &text[..precision.min(text.len())],
                    None => text,
                };
                spec.pad_text(text, out);
            }
            _ => out.extend_from_slice(&fmt[start - 1..pos]),
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::DATA_BASE;

    fn printf(fmt: &str, args: &[i64]) -> String {
        let mut memory = Memory::new(64, 0, 0);
        memory.load_data(b"hello\0world\0").unwrap();
        let mut out = vec![];
        format(&memory, fmt.as_bytes(), args, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_integers() {
        assert_eq!(printf("%d %i", &[42, -7]), "42 -7");
        assert_eq!(printf("%ld", &[i64::MIN]), "-9223372036854775808");
        assert_eq!(printf("%u", &[-1]), "18446744073709551615");
        assert_eq!(printf("%x %X %o", &[255, 255, 8]), "ff FF 10");
        assert_eq!(printf("%p", &[0x10]), "0x10");
    }

    #[test]
    fn test_width_and_flags() {
        assert_eq!(printf("[%5d]", &[42]), "[   42]");
        assert_eq!(printf("[%-5d]", &[42]), "[42   ]");
        assert_eq!(printf("[%05d]", &[-42]), "[-0042]");
        assert_eq!(printf("[%.3d]", &[7]), "[007]");
        assert_eq!(printf("[%3c]", &['x' as i64]), "[  x]");
    }

    #[test]
    fn test_strings() {
        assert_eq!(printf("%s, %s!", &[DATA_BASE, DATA_BASE + 6]), "hello, world!");
        assert_eq!(printf("[%.3s]", &[DATA_BASE]), "[hel]");
        assert_eq!(printf("[%-7s]", &[DATA_BASE]), "[hello  ]");
        assert_eq!(printf("%s", &[0]), "(null)");
    }

    #[test]
    fn test_escapes_and_oddities() {
        assert_eq!(printf("100%%", &[]), "100%");
        assert_eq!(printf("%d %d", &[1]), "1 0");
        assert_eq!(printf("%q", &[]), "%q");
        assert_eq!(printf("tail %", &[]), "tail %");
    }

    #[test]
    fn test_bad_string_pointer() {
        let memory = Memory::new(0, 0, 0);
        let mut out = vec![];
        assert_eq!(
            format(&memory, b"%s", &[16], &mut out),
            Err(FaultKind::OutOfBounds(16))
        );
    }

    #[test]
    fn test_field_width_limit() {
        let memory = Memory::new(0, 0, 0);
        let mut out = vec![];
        assert_eq!(
            format(&memory, b"%99999999999999999999999d", &[1], &mut out),
            Err(FaultKind::FieldWidth(usize::MAX))
        );
        assert_eq!(
            format(&memory, b"%.300000000s", &[0], &mut out),
            Err(FaultKind::FieldWidth(300_000_000))
        );
        assert!(out.is_empty());

        // The limit itself is still fine.
        let fmt = format!("%{MAX_FIELD_WIDTH}d");
        format(&memory, fmt.as_bytes(), &[7], &mut out).unwrap();
        assert_eq!(out.len(), MAX_FIELD_WIDTH);
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(b"abc", b"abc"), 0);
        assert_eq!(compare(b"abd", b"abc"), 1);
        assert_eq!(compare(b"\x00", b"\xFF"), -255);
    }
}
