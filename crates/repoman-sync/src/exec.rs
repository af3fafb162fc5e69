//! The small command language understood by `repoman exec`.
//!
//! Arguments are already split by the invoking shell, so operators and group
//! delimiters have to stand alone: `git fetch && ( git status ; git log -1 )`.
//! `;` binds loosest and runs everything, returning the status of the last
//! command. `&&` stops at the first failure and `||` at the first success; the
//! two are right-associative with equal precedence. `( … )` and `{ … }` group
//! commands without starting a subshell.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use repoman_core::error::RepomanError;

/// Joins the captured output of the commands making up a compound command.
pub const OUTPUT_SEPARATOR: &str = "\n######\n";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// A program and its arguments.
    Single(Vec<String>),
    /// `a ; b`: run all, exit status of the last.
    Sequence(Vec<Cmd>),
    /// `a && b`: stop at the first failure.
    And(Vec<Cmd>),
    /// `a || b`: stop at the first success.
    Or(Vec<Cmd>),
}

/// Outcome of running a command, or a compound command, in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdResult {
    /// Exit code of the last command that ran; `-1` when killed by a signal.
    pub exit_code: i32,
    /// Captured standard output, `None` unless capturing.
    pub stdout: Option<String>,
    /// Captured standard error, `None` unless capturing.
    pub stderr: Option<String>,
}

impl CmdResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

fn parse_error(msg: &str) -> RepomanError {
    RepomanError::CommandParse(msg.to_string())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Group {
    Paren,
    Brace,
}

impl Group {
    fn open(tok: &str) -> Option<Group> {
        match tok {
            "(" => Some(Group::Paren),
            "{" => Some(Group::Brace),
            _ => None,
        }
    }

    fn close_token(self) -> &'static str {
        match self {
            Group::Paren => ")",
            Group::Brace => "}",
        }
    }

    fn unexpected_before(self) -> RepomanError {
        match self {
            Group::Paren => parse_error("Unexpected argument before opening parenthesis."),
            Group::Brace => parse_error("Unexpected argument before opening brace."),
        }
    }

    fn unmatched(self) -> RepomanError {
        match self {
            Group::Paren => parse_error("Unmatched opening parenthesis."),
            Group::Brace => parse_error("Unmatched opening brace."),
        }
    }
}

fn is_closer(tok: &str) -> bool {
    tok == ")" || tok == "}"
}

fn is_operator(tok: &str) -> bool {
    matches!(tok, ";" | "&&" | "||")
}

struct Parser<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    /// `chain (';' chain)*`, stopping at the end or at a closing delimiter.
    /// Empty segments between `;` are ignored.
    fn sequence(&mut self) -> Result<Option<Cmd>, RepomanError> {
        let mut items = Vec::new();
        loop {
            if let Some(cmd) = self.chain()? {
                match cmd {
                    Cmd::Sequence(inner) => items.extend(inner),
                    other => items.push(other),
                }
            }
            match self.peek() {
                Some(";") => self.pos += 1,
                _ => break,
            }
        }
        Ok(match items.len() {
            0 => None,
            1 => items.pop(),
            _ => Some(Cmd::Sequence(items)),
        })
    }

    /// `term (('&&' | '||') chain)?`
    fn chain(&mut self) -> Result<Option<Cmd>, RepomanError> {
        let lhs = self.term()?;
        let op = match self.peek() {
            Some(op @ ("&&" | "||")) => op,
            _ => return Ok(lhs),
        };
        let Some(lhs) = lhs else {
            return Err(RepomanError::CommandParse(format!("Missing command before '{op}'.")));
        };
        self.pos += 1;
        let Some(rhs) = self.chain()? else {
            return Err(RepomanError::CommandParse(format!("Missing command after '{op}'.")));
        };

        let mut items = vec![lhs];
        match (op, rhs) {
            ("&&", Cmd::And(rest)) | ("||", Cmd::Or(rest)) => items.extend(rest),
            (_, rhs) => items.push(rhs),
        }
        Ok(Some(if op == "&&" {
            Cmd::And(items)
        } else {
            Cmd::Or(items)
        }))
    }

    /// A plain command or a group.
    fn term(&mut self) -> Result<Option<Cmd>, RepomanError> {
        let mut words: Vec<String> = Vec::new();
        while let Some(tok) = self.peek() {
            if let Some(group) = Group::open(tok) {
                if !words.is_empty() {
                    return Err(group.unexpected_before());
                }
                self.pos += 1;
                return self.group(group).map(Some);
            }
            if is_closer(tok) || is_operator(tok) {
                break;
            }
            words.push(tok.to_string());
            self.pos += 1;
        }
        Ok((!words.is_empty()).then_some(Cmd::Single(words)))
    }

    fn group(&mut self, group: Group) -> Result<Cmd, RepomanError> {
        let inner = self.sequence()?;
        match self.peek() {
            None => return Err(group.unmatched()),
            Some(tok) if tok == group.close_token() => self.pos += 1,
            Some(_) => return Err(parse_error("Unmatched closing parenthesis or brace.")),
        }
        if let Some(tok) = self.peek() {
            if !is_operator(tok) && !is_closer(tok) {
                return Err(parse_error(
                    "Unexpected argument after closing parenthesis or brace.",
                ));
            }
        }
        inner.ok_or_else(|| parse_error("No command provided."))
    }
}

impl Cmd {
    /// Parse a command line given as separate arguments.
    pub fn parse(args: &[String]) -> Result<Cmd, RepomanError> {
        let mut parser = Parser { tokens: args, pos: 0 };
        let cmd = parser.sequence()?;
        if parser.peek().is_some() {
            // `sequence` only stops early at a closing delimiter.
            return Err(parse_error("Unmatched closing parenthesis or brace."));
        }
        cmd.ok_or_else(|| parse_error("No command provided."))
    }

    /// Run the command in `cwd`. Without `capture` the output goes straight to
    /// the terminal.
    pub fn execute(&self, cwd: &Path, capture: bool) -> Result<CmdResult, RepomanError> {
        match self {
            Cmd::Single(argv) => run_single(argv, cwd, capture),
            Cmd::Sequence(cmds) => run_all(cmds, cwd, capture, |_| false),
            Cmd::And(cmds) => run_all(cmds, cwd, capture, |r| !r.success()),
            Cmd::Or(cmds) => run_all(cmds, cwd, capture, CmdResult::success),
        }
    }
}

impl std::fmt::Display for Cmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (cmds, sep) = match self {
            Cmd::Single(argv) => return write!(f, "{}", argv.join(" ")),
            Cmd::Sequence(cmds) => (cmds, " ; "),
            Cmd::And(cmds) => (cmds, " && "),
            Cmd::Or(cmds) => (cmds, " || "),
        };
        for (i, cmd) in cmds.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            match cmd {
                Cmd::Single(_) => write!(f, "{cmd}")?,
                _ => write!(f, "( {cmd} )")?,
            }
        }
        Ok(())
    }
}

fn run_single(argv: &[String], cwd: &Path, capture: bool) -> Result<CmdResult, RepomanError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(parse_error("No command provided."));
    };
    tracing::debug!("executing {} in {}", argv.join(" "), cwd.display());

    let mut command = Command::new(program);
    command.args(args).current_dir(cwd).stdin(Stdio::null());
    let spawn_err = |e: std::io::Error| RepomanError::Other(format!("failed to run {program}: {e}"));

    if capture {
        let output = command.output().map_err(spawn_err)?;
        Ok(CmdResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        })
    } else {
        let status = command.status().map_err(spawn_err)?;
        Ok(CmdResult {
            exit_code: status.code().unwrap_or(-1),
            stdout: None,
            stderr: None,
        })
    }
}

fn run_all(
    cmds: &[Cmd],
    cwd: &Path,
    capture: bool,
    stop: impl Fn(&CmdResult) -> bool,
) -> Result<CmdResult, RepomanError> {
    let mut results = Vec::with_capacity(cmds.len());
    for cmd in cmds {
        let result = cmd.execute(cwd, capture)?;
        let done = stop(&result);
        results.push(result);
        if done {
            break;
        }
    }

    Ok(CmdResult {
        exit_code: results.last().map_or(0, |r| r.exit_code),
        stdout: capture.then(|| join_output(&results, |r| r.stdout.as_deref())),
        stderr: capture.then(|| join_output(&results, |r| r.stderr.as_deref())),
    })
}

fn join_output(results: &[CmdResult], pick: impl Fn(&CmdResult) -> Option<&str>) -> String {
    results
        .iter()
        .map(|r| pick(r).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(OUTPUT_SEPARATOR)
}

/// How `exec` treats each repository.
#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    pub capture: bool,
    /// Stop visiting repositories after the first one whose command fails.
    pub check: bool,
}

/// Outcome of running the command in one repository.
#[derive(Debug)]
pub struct RepoExec {
    pub repo: PathBuf,
    pub result: Result<CmdResult, RepomanError>,
}

impl RepoExec {
    pub fn failed(&self) -> bool {
        !matches!(&self.result, Ok(r) if r.success())
    }
}

/// Run `cmd` in each repository in turn.
pub fn exec_in_repos(cmd: &Cmd, repos: &[PathBuf], opts: ExecOptions) -> Vec<RepoExec> {
    let mut outcomes = Vec::with_capacity(repos.len());
    for repo in repos {
        tracing::info!("executing in {}", repo.display());
        tracing::debug!("command: {cmd}");
        let result = cmd.execute(repo, opts.capture);

        match &result {
            Ok(r) => {
                tracing::info!("return code: {}", r.exit_code);
                if r.success() {
                    if let Some(out) = r.stdout.as_deref().filter(|s| !s.is_empty()) {
                        tracing::info!("stdout:\n{out}");
                    }
                    if let Some(err) = r.stderr.as_deref().filter(|s| !s.is_empty()) {
                        tracing::info!("stderr:\n{err}");
                    }
                }
            }
            Err(e) => tracing::error!("{}: {e}", repo.display()),
        }

        let outcome = RepoExec {
            repo: repo.clone(),
            result,
        };
        let stop = opts.check && outcome.failed();
        outcomes.push(outcome);
        if stop {
            tracing::error!("command failed, aborting");
            break;
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn single(s: &str) -> Cmd {
        Cmd::Single(args(s))
    }

    fn parse(s: &str) -> Result<Cmd, RepomanError> {
        Cmd::parse(&args(s))
    }

    fn parse_err(s: &str) -> String {
        parse(s).unwrap_err().to_string()
    }

    #[test]
    fn test_parse_single() {
        assert_eq!(parse("echo hello").unwrap(), single("echo hello"));
    }

    #[test]
    fn test_parse_operators() {
        assert_eq!(
            parse("echo hello ; echo world").unwrap(),
            Cmd::Sequence(vec![single("echo hello"), single("echo world")])
        );
        assert_eq!(
            parse("a && b && c").unwrap(),
            Cmd::And(vec![single("a"), single("b"), single("c")])
        );
        assert_eq!(
            parse("a || b || c").unwrap(),
            Cmd::Or(vec![single("a"), single("b"), single("c")])
        );
    }

    #[test]
    fn test_parse_mixed_chain_is_right_associative() {
        assert_eq!(
            parse("hello && world || !").unwrap(),
            Cmd::And(vec![single("hello"), Cmd::Or(vec![single("world"), single("!")])])
        );
        assert_eq!(
            parse("hello || world && !").unwrap(),
            Cmd::Or(vec![single("hello"), Cmd::And(vec![single("world"), single("!")])])
        );
    }

    #[test]
    fn test_parse_groups() {
        let expected = Cmd::Sequence(vec![
            Cmd::And(vec![single("hello"), Cmd::Or(vec![single("foo"), single("bar")])]),
            single("done"),
        ]);
        assert_eq!(parse("hello && ( foo || bar ) ; done").unwrap(), expected);
        assert_eq!(parse("hello && { foo || bar } ; done").unwrap(), expected);
    }

    #[test]
    fn test_parse_nested_groups() {
        assert_eq!(
            parse("( a && { b ; c } ) || d").unwrap(),
            Cmd::Or(vec![
                Cmd::And(vec![single("a"), Cmd::Sequence(vec![single("b"), single("c")])]),
                single("d"),
            ])
        );
    }

    #[test]
    fn test_parse_skips_empty_segments() {
        assert_eq!(parse("; a ; ; b ;").unwrap(), Cmd::Sequence(vec![single("a"), single("b")]));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_err(""), "No command provided.");
        assert_eq!(parse_err(";"), "No command provided.");
        assert_eq!(parse_err("( )"), "No command provided.");
        assert_eq!(parse_err("echo hello ; ("), "Unmatched opening parenthesis.");
        assert_eq!(parse_err("echo hello ; {"), "Unmatched opening brace.");
        assert_eq!(parse_err("echo hello )"), "Unmatched closing parenthesis or brace.");
        assert_eq!(parse_err("echo hello }"), "Unmatched closing parenthesis or brace.");
        assert_eq!(parse_err("( a }"), "Unmatched closing parenthesis or brace.");
        assert_eq!(parse_err("echo hello {"), "Unexpected argument before opening brace.");
        assert_eq!(parse_err("echo hello ("), "Unexpected argument before opening parenthesis.");
        assert_eq!(parse_err("a &&"), "Missing command after '&&'.");
        assert_eq!(parse_err("|| a"), "Missing command before '||'.");
        assert!(parse_err("( a ) b").starts_with("Unexpected argument after"));
    }

    #[test]
    fn test_display() {
        let cmd = parse("a x && ( b || c ) ; d").unwrap();
        assert_eq!(cmd.to_string(), "( a x && ( b || c ) ) ; d");
    }

    #[cfg(unix)]
    mod run {
        use super::*;

        fn exec(s: &str) -> CmdResult {
            let dir = tempfile::tempdir().unwrap();
            parse(s).unwrap().execute(dir.path(), true).unwrap()
        }

        #[test]
        fn test_sequence_runs_everything() {
            let r = exec("false ; echo hi");
            assert_eq!(r.exit_code, 0);
            assert_eq!(r.stdout.as_deref(), Some("\n######\nhi\n"));
        }

        #[test]
        fn test_and_stops_at_failure() {
            let r = exec("echo one && false && echo three");
            assert_ne!(r.exit_code, 0);
            assert_eq!(r.stdout.as_deref(), Some("one\n\n######\n"));
        }

        #[test]
        fn test_or_stops_at_success() {
            let r = exec("false || echo two || echo three");
            assert_eq!(r.exit_code, 0);
            assert_eq!(r.stdout.as_deref(), Some("\n######\ntwo\n"));
        }

        #[test]
        fn test_uncaptured_output_is_none() {
            let dir = tempfile::tempdir().unwrap();
            let r = parse("true").unwrap().execute(dir.path(), false).unwrap();
            assert!(r.success());
            assert!(r.stdout.is_none());
        }

        #[test]
        fn test_missing_program_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = parse("definitely-not-a-real-program-xyz")
                .unwrap()
                .execute(dir.path(), true)
                .unwrap_err();
            assert!(err.to_string().contains("failed to run"));
        }

        #[test]
        fn test_check_stops_at_first_failing_repo() {
            let root = tempfile::tempdir().unwrap();
            let repos: Vec<PathBuf> = ["a", "b", "c"]
                .iter()
                .map(|n| {
                    let p = root.path().join(n);
                    std::fs::create_dir(&p).unwrap();
                    p
                })
                .collect();
            std::fs::write(repos[1].join("marker"), "").unwrap();
            // Fails only where `marker` exists.
            let cmd = parse("test ! -e marker").unwrap();

            let checked = exec_in_repos(&cmd, &repos, ExecOptions { capture: true, check: true });
            assert_eq!(checked.len(), 2);
            assert!(checked[1].failed());

            let unchecked = exec_in_repos(&cmd, &repos, ExecOptions { capture: true, check: false });
            assert_eq!(unchecked.len(), 3);
            assert_eq!(unchecked.iter().filter(|o| o.failed()).count(), 1);
        }
    }
}
