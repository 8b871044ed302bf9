mod session;

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use session::Session;

const TRANSCRIPT_HEADER: &str = "Projector Remote Emulator transcript";

#[derive(Debug, Default)]
struct Options {
    script: Option<PathBuf>,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: remote-emulator [--script <file>] [--transcript <file>]");
        process::exit(2);
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(
        options
            .transcript
            .as_deref()
            .map(|path| (path, TRANSCRIPT_HEADER)),
    )?;

    writeln!(
        writer,
        "Projector Remote Emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for response in session.start()? {
        writeln!(writer, "{response}")?;
    }

    match options.script {
        Some(path) => {
            let script = fs::read_to_string(path)?;
            run_script(&mut session, &script, &mut writer)
        }
        None => run_interactive(&mut session, &mut writer),
    }
}

fn run_interactive(session: &mut Session, writer: &mut impl Write) -> io::Result<()> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

/// Replays a script, echoing each command. `#` starts a comment line.
fn run_script(session: &mut Session, script: &str, writer: &mut impl Write) -> io::Result<()> {
    for line in script.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        writeln!(writer, "> {trimmed}")?;
        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let slot = match flag.as_str() {
            "--script" => &mut options.script,
            "--transcript" => &mut options.transcript,
            other => return Err(format!("Unknown argument `{other}`")),
        };
        let value = inline
            .or_else(|| args.next())
            .ok_or_else(|| format!("Expected value after {flag}"))?;
        *slot = Some(PathBuf::from(value));
    }
    Ok(options)
}
