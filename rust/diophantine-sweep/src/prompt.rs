//! Interactive collection of ranges, repository target and credentials.
//!
//! Bad input is answered with a message and the same question again; only
//! I/O failures and end of input escape as errors.

use std::io::{self, BufRead, Write};

use crate::publish::RepoTarget;
use crate::range::{RangeSet, SearchRange};
use crate::schedule::IntervalSchedule;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("input closed while waiting for {0}")]
    Eof(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Prompter::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, question: &str, what: &str) -> Result<String, PromptError> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(PromptError::Eof(what.to_string()));
        }
        Ok(line.trim().to_string())
    }

    fn complain(&mut self, msg: impl std::fmt::Display) -> Result<(), PromptError> {
        writeln!(self.output, "  {}. Please try again.", msg)?;
        Ok(())
    }

    /// Read `"min max"` for variable `var`. Exponents must be non-negative.
    pub fn read_range(&mut self, var: char, exponent: bool) -> Result<SearchRange, PromptError> {
        let kind = if exponent { "exponent" } else { "base" };
        loop {
            let line = self.ask(
                &format!("Range for {} ({}), as \"min max\": ", var, kind),
                &format!("range of {}", var),
            )?;
            match SearchRange::parse(&line) {
                Ok(r) if exponent && (r.min < 0 || r.max > u32::MAX as i64) => {
                    self.complain(format!("exponents must lie within [0, {}]", u32::MAX))?;
                }
                Ok(r) => return Ok(r),
                Err(e) => self.complain(e)?,
            }
        }
    }

    /// Read all four ranges; start over if their product is too large.
    pub fn read_range_set(&mut self) -> Result<RangeSet, PromptError> {
        loop {
            let a = self.read_range('a', false)?;
            let b = self.read_range('b', true)?;
            let c = self.read_range('c', false)?;
            let d = self.read_range('d', true)?;
            match RangeSet::new(a, b, c, d) {
                Ok(set) => return Ok(set),
                Err(e) => self.complain(e)?,
            }
        }
    }

    pub fn read_repo_target(&mut self) -> Result<RepoTarget, PromptError> {
        loop {
            let line = self.ask("Target (owner/repo/path/to/file.json): ", "repository target")?;
            match line.parse::<RepoTarget>() {
                Ok(t) => return Ok(t),
                Err(e) => self.complain(e)?,
            }
        }
    }

    pub fn read_token(&mut self) -> Result<String, PromptError> {
        loop {
            let line = self.ask("Access token: ", "access token")?;
            if !line.is_empty() {
                return Ok(line);
            }
            self.complain("token must not be empty")?;
        }
    }

    /// Read `"start width max"` for the interval loop.
    pub fn read_schedule(&mut self) -> Result<IntervalSchedule, PromptError> {
        loop {
            let line = self.ask(
                "Interval schedule, as \"start width max\": ",
                "interval schedule",
            )?;
            let nums: Vec<i64> = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
            let &[start, width, max] = nums.as_slice() else {
                self.complain(format!("expected three integers, got {:?}", line))?;
                continue;
            };
            match IntervalSchedule::new(start, width, max) {
                Ok(s) => return Ok(s),
                Err(e) => self.complain(e)?,
            }
        }
    }

    pub fn confirm(&mut self, question: &str) -> Result<bool, PromptError> {
        loop {
            let line = self.ask(&format!("{} [y/n]: ", question), "confirmation")?;
            match line.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.complain("answer y or n")?,
            }
        }
    }
}
