use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use taghl::kernel::services::adapters::worker::wire::{self, WireError};

/// Keyword whose following identifier gets a fixed kind.
const DECL_KEYWORDS: &[(&str, char)] = &[
    ("struct", 's'),
    ("union", 'u'),
    ("enum", 'g'),
    ("class", 'c'),
    ("namespace", 'n'),
    ("package", 'p'),
    ("typedef", 't'),
    ("type", 't'),
    ("func", 'f'),
];

const KEYWORDS: &[&str] = &[
    "break", "case", "char", "const", "continue", "default", "else", "for", "func", "if",
    "import", "int", "long", "package", "return", "short", "sizeof", "static", "struct",
    "switch", "type", "typedef", "union", "unsigned", "var", "void", "while", "enum", "class",
    "namespace",
];

struct Knobs {
    delay: Option<Duration>,
    exit_after: Option<u64>,
    truncate: bool,
}

impl Knobs {
    fn from_env() -> Self {
        let delay = std::env::var("TAGHL_STUB_DELAY_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_millis);
        let exit_after = std::env::var("TAGHL_STUB_EXIT_AFTER")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok());
        let truncate = std::env::var_os("TAGHL_STUB_TRUNCATE").is_some_and(|v| !v.is_empty());
        Self {
            delay,
            exit_after,
            truncate,
        }
    }
}

struct Trace {
    file: Option<std::fs::File>,
}

impl Trace {
    fn from_env() -> Self {
        let path = std::env::var_os("TAGHL_STUB_TRACE_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let file = path.and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        Self { file }
    }

    fn log(&mut self, line: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let _ = writeln!(file, "{line}");
        let _ = file.flush();
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn kind_for(
    word: &str,
    prev_word: Option<&str>,
    prev_byte: Option<u8>,
    next_byte: Option<u8>,
) -> Option<char> {
    if KEYWORDS.contains(&word) {
        return None;
    }
    if let Some(prev) = prev_word {
        if let Some((_, kind)) = DECL_KEYWORDS.iter().find(|(kw, _)| *kw == prev) {
            return Some(*kind);
        }
    }
    if next_byte == Some(b'(') {
        return Some('f');
    }
    if matches!(prev_byte, Some(b'.')) {
        return Some('m');
    }
    let screaming = word
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b == b'_' || b.is_ascii_digit());
    if word.len() > 1 && screaming {
        return Some('d');
    }
    None
}

fn tokenize(source: &str) -> String {
    let mut out = String::new();
    for (line_no, line) in source.lines().enumerate() {
        let bytes = line.as_bytes();
        let mut prev_word: Option<&str> = None;
        let mut i = 0;
        while i < bytes.len() {
            if !is_ident_start(bytes[i]) {
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            let word = &line[start..i];
            let prev_byte = start.checked_sub(1).map(|p| bytes[p]);
            let next_byte = bytes[i..].iter().copied().find(|b| !b.is_ascii_whitespace());
            if let Some(kind) = kind_for(word, prev_word, prev_byte, next_byte) {
                out.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                    kind,
                    line_no,
                    start,
                    line_no,
                    i,
                    word.len(),
                    word
                ));
            }
            prev_word = Some(word);
        }
    }
    out
}

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let debug = argv.get(2).is_some_and(|flag| flag == "1");

    let mut trace = Trace::from_env();
    trace.log(&format!("argv {}", argv.get(1..).unwrap_or_default().join(" ")));

    let knobs = Knobs::from_env();
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = stdin.lock();
    let mut writer = stdout.lock();

    let mut served: u64 = 0;
    loop {
        let request = match wire::read_frame(&mut reader) {
            Ok(request) => request,
            Err(WireError::UnexpectedEof { read: 0, .. }) => break,
            Err(e) => {
                eprintln!("taghl_worker_stub: {}", e);
                std::process::exit(1);
            }
        };

        if knobs.exit_after.is_some_and(|limit| served >= limit) {
            trace.log("exit");
            std::process::exit(0);
        }
        served += 1;

        let source = String::from_utf8_lossy(&request);
        let reply = tokenize(&source);
        trace.log(&format!("request {} bytes={}", served, request.len()));
        if debug {
            eprintln!("request {}: {} bytes in, {} bytes out", served, request.len(), reply.len());
        }

        if let Some(delay) = knobs.delay {
            std::thread::sleep(delay);
        }

        if knobs.truncate {
            let Ok(header) = wire::encode_length(reply.len() as u64 + 1) else {
                std::process::exit(1);
            };
            let _ = writer.write_all(&header);
            let _ = writer.write_all(reply.as_bytes());
            let _ = writer.flush();
            std::process::exit(0);
        }

        if let Err(e) = wire::write_frame(&mut writer, reply.as_bytes()) {
            eprintln!("taghl_worker_stub: {}", e);
            std::process::exit(1);
        }
    }
}
