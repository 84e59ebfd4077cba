//! Line-oriented command shell over a [`Calculator`].
//!
//! Each input line is one command acting on the current session:
//!
//! ```text
//! session 3            select session 3 (default 1)
//! set cube violet      set a selector (cube, tier, category, level, region, wants)
//! field att% 21        add `att% >= 21` to the trailing group
//! push                 open a new group
//! op or 2              insert a combinator, threshold optional
//! calc                 compute and cache matches
//! matches 10           print cached matching combinations
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::calc::Calculator;
use crate::enums::{Line, Operator};
use crate::error::CalcError;
use crate::humanize;
use crate::registry::{CalcParam, ParamValue, SessionId};

/// Errors from shell commands.
#[derive(Debug, Error, Diagnostic)]
pub enum ShellError {
    #[error("cannot parse command \"{input}\": {message}")]
    #[diagnostic(
        code(cubecalc::shell::parse),
        help("Type `help` for the list of commands.")
    )]
    Parse { input: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Calc(#[from] CalcError),

    #[error("failed to write shell output")]
    #[diagnostic(code(cubecalc::shell::output))]
    Output {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read shell input")]
    #[diagnostic(code(cubecalc::shell::input))]
    Input {
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for ShellError {
    fn from(source: std::io::Error) -> Self {
        ShellError::Output { source }
    }
}

pub type ShellResult<T> = std::result::Result<T, ShellError>;

const HELP: &str = "\
commands:
  session <id>             select the current session
  sessions                 list live sessions
  set <param> <value>      param: cube, tier, category, level, region, wants (JSON)
  field <line> <value>     set a requirement in the trailing group
  push                     open a new requirement group
  op <and|or> [threshold]  insert a combinator
  clear                    clear the want expression
  len                      current group length and total term count
  show                     print the current session
  calc                     compute the probability and cache matches
  matches [n]              print up to n cached matching combinations
  free                     drop the current session
  debug <on|off>           toggle session tracing
  save <path>              write the session as JSON
  load <path>              replace the session from JSON
  quit                     leave the shell";

/// One parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Session(SessionId),
    Sessions,
    Set(ParamValue),
    Field(Line, i32),
    Push,
    Op(Operator, i32),
    Clear,
    Len,
    Show,
    Calc,
    Matches(Option<usize>),
    Free,
    Debug(bool),
    Save(PathBuf),
    Load(PathBuf),
    Help,
    Quit,
}

/// Split off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

impl Command {
    /// Parse one input line. Blank lines and comments yield `None`.
    pub fn parse(input: &str) -> ShellResult<Option<Self>> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let fail = |message: &str| ShellError::Parse {
            input: trimmed.to_string(),
            message: message.to_string(),
        };
        let (word, rest) = split_word(trimmed);
        let no_args = |cmd: Command| {
            if rest.is_empty() {
                Ok(cmd)
            } else {
                Err(fail("takes no arguments"))
            }
        };

        let cmd = match word.to_lowercase().as_str() {
            "session" => Command::Session(rest.parse().map_err(|_| fail("expected a session id"))?),
            "sessions" => no_args(Command::Sessions)?,
            "set" => {
                let (param, value) = split_word(rest);
                if value.is_empty() {
                    return Err(fail("expected `set <param> <value>`"));
                }
                let kind: CalcParam = param.parse().map_err(CalcError::from)?;
                Command::Set(ParamValue::parse(kind, value).map_err(CalcError::from)?)
            }
            "field" => {
                let (line, value) = rest
                    .rsplit_once(char::is_whitespace)
                    .ok_or_else(|| fail("expected `field <line> <value>`"))?;
                let line: Line = line.parse().map_err(CalcError::from)?;
                let value = value.parse().map_err(|_| fail("value must be an integer"))?;
                Command::Field(line, value)
            }
            "push" => no_args(Command::Push)?,
            "op" => {
                let (op, threshold) = split_word(rest);
                if op.is_empty() {
                    return Err(fail("expected `op <and|or> [threshold]`"));
                }
                let op: Operator = op.parse().map_err(CalcError::from)?;
                let threshold = if threshold.is_empty() {
                    -1
                } else {
                    threshold
                        .parse()
                        .map_err(|_| fail("threshold must be an integer"))?
                };
                Command::Op(op, threshold)
            }
            "clear" => no_args(Command::Clear)?,
            "len" => no_args(Command::Len)?,
            "show" => no_args(Command::Show)?,
            "calc" => no_args(Command::Calc)?,
            "matches" => Command::Matches(if rest.is_empty() {
                None
            } else {
                Some(rest.parse().map_err(|_| fail("expected a count"))?)
            }),
            "free" => no_args(Command::Free)?,
            "debug" => match rest.to_lowercase().as_str() {
                "on" | "true" | "1" => Command::Debug(true),
                "off" | "false" | "0" => Command::Debug(false),
                _ => return Err(fail("expected `debug on` or `debug off`")),
            },
            "save" if !rest.is_empty() => Command::Save(PathBuf::from(rest)),
            "load" if !rest.is_empty() => Command::Load(PathBuf::from(rest)),
            "save" | "load" => return Err(fail("expected a file path")),
            "help" | "?" => Command::Help,
            "quit" | "exit" => no_args(Command::Quit)?,
            _ => return Err(fail("unknown command")),
        };
        Ok(Some(cmd))
    }
}

/// Whether the shell should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Interactive or scripted command loop.
#[derive(Debug)]
pub struct Shell {
    calc: Calculator,
    current: SessionId,
    max_display: usize,
    strict: bool,
}

impl Shell {
    pub fn new(calc: Calculator, max_display: usize) -> Self {
        Self {
            calc,
            current: 1,
            max_display,
            strict: false,
        }
    }

    /// Stop at the first failing command instead of reporting and continuing.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_session(mut self, id: SessionId) -> Self {
        self.current = id;
        self
    }

    pub fn calculator(&self) -> &Calculator {
        &self.calc
    }

    pub fn current(&self) -> SessionId {
        self.current
    }

    /// Read commands until end of input or `quit`. With `prompt`, a `> `
    /// prompt is written before each line.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W, prompt: bool) -> ShellResult<()> {
        let mut lines = input.lines();
        loop {
            if prompt {
                write!(out, "[{}]> ", self.current)?;
                out.flush()?;
            }
            let Some(line) = lines.next() else { break };
            let line = line.map_err(|source| ShellError::Input { source })?;
            match self.execute_line(&line, out) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    tracing::warn!(input = %line.trim(), "command failed");
                    writeln!(out, "error: {e}")?;
                }
            }
        }
        Ok(())
    }

    pub fn execute_line<W: Write>(&mut self, line: &str, out: &mut W) -> ShellResult<Flow> {
        match Command::parse(line)? {
            Some(cmd) => self.execute(cmd, out),
            None => Ok(Flow::Continue),
        }
    }

    pub fn execute<W: Write>(&mut self, cmd: Command, out: &mut W) -> ShellResult<Flow> {
        let id = self.current;
        match cmd {
            Command::Session(new_id) => {
                self.current = new_id;
                self.calc.ensure(new_id);
            }
            Command::Sessions => {
                let ids: Vec<String> = self
                    .calc
                    .registry()
                    .ids()
                    .iter()
                    .map(|i| i.to_string())
                    .collect();
                writeln!(out, "{}", ids.join(" "))?;
            }
            Command::Set(value) => self.calc.set(id, value),
            Command::Field(line, value) => {
                self.calc.set_field(id, line, value);
            }
            Command::Push => writeln!(out, "{}", self.calc.push_group(id))?,
            Command::Op(op, threshold) => self.calc.insert_combinator(id, op, threshold),
            Command::Clear => self.calc.clear_wants(id),
            Command::Len => writeln!(
                out,
                "current={} total={}",
                self.calc.current_length(id),
                self.calc.total_length(id)
            )?,
            Command::Show => match self.calc.session(id) {
                Some(session) => writeln!(out, "session {id}: {session}")?,
                None => writeln!(out, "session {id}: (absent)")?,
            },
            Command::Calc => {
                let outcome = self.calc.calc_outcome(id)?;
                let tier = outcome
                    .achieved_tier
                    .map_or_else(|| "-".to_string(), |t| t.to_string());
                writeln!(
                    out,
                    "probability {} ({}) tier={tier}",
                    humanize::percent(outcome.probability),
                    humanize::one_in(outcome.probability),
                )?;
            }
            Command::Matches(limit) => self.print_matches(id, limit.unwrap_or(self.max_display), out)?,
            Command::Free => self.calc.free(id),
            Command::Debug(on) => self.calc.set_debug(on),
            Command::Save(path) => self.calc.save_session(id, &path)?,
            Command::Load(path) => self.calc.load_session(id, &path)?,
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn print_matches<W: Write>(&self, id: SessionId, limit: usize, out: &mut W) -> ShellResult<()> {
        let matching = self.calc.matching(id).map_err(CalcError::from)?;
        writeln!(
            out,
            "{} combos, {} lines each",
            matching.outer_length(),
            matching.inner_length()
        )?;
        for index in 0..matching.outer_length().min(limit) {
            let Some(combo) = matching.combo(index) else { break };
            let rendered: Vec<String> = combo
                .iter()
                .map(|l| {
                    let tier = if l.prime { "prime" } else { "lower" };
                    let odds = humanize::humanize(l.one_in.round() as i64);
                    if l.line == Line::ANY {
                        format!("any (1 in {odds}, {tier})")
                    } else {
                        format!("{}={} (1 in {odds}, {tier})", l.line, l.value)
                    }
                })
                .collect();
            writeln!(out, "{:>4}. {}", index + 1, rendered.join(" | "))?;
        }
        if matching.outer_length() > limit {
            writeln!(out, "  ... {} more", matching.outer_length() - limit)?;
        }
        Ok(())
    }
}
