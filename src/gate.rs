//! Manual step gate and operator acknowledgment
//!
//! Manual steps render their instructions and then block on an explicit
//! operator acknowledgment: one read, no timeout, no default. The workflow
//! trusts the acknowledgment completely; nothing is verified automatically.
//!
//! The same [`Operator`] is used for the validation-gate confirmation and the
//! continue prompt after every step.

use std::io::{self, BufRead, Write};

use crate::run_log::RunLog;

/// Source of blocking operator acknowledgments
pub trait Operator {
    /// Show `prompt` and block until the operator acknowledges.
    ///
    /// Returns an error only if no acknowledgment can ever arrive (closed input).
    fn acknowledge(&mut self, prompt: &str) -> io::Result<()>;
}

/// Operator at the terminal: prints the prompt and waits for Enter
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn acknowledge(&mut self, prompt: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        write!(stdout, "{} ", prompt)?;
        stdout.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "operator input closed before acknowledgment",
            ));
        }
        Ok(())
    }
}

/// Operator that acknowledges a fixed number of prompts and records them.
///
/// Used by tests and scripted rehearsals; once the budget is spent further
/// prompts fail like closed console input.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    remaining: Option<usize>,
    prompts: Vec<String>,
    refusals: usize,
}

impl ScriptedOperator {
    /// Acknowledge every prompt
    pub fn always() -> Self {
        Self::default()
    }

    /// Acknowledge the first `count` prompts, then report closed input
    pub fn limited(count: usize) -> Self {
        Self {
            remaining: Some(count),
            ..Self::default()
        }
    }

    /// Every prompt shown so far
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Number of prompts that were rejected
    pub fn refusals(&self) -> usize {
        self.refusals
    }
}

impl Operator for ScriptedOperator {
    fn acknowledge(&mut self, prompt: &str) -> io::Result<()> {
        self.prompts.push(prompt.to_string());
        match self.remaining.as_mut() {
            Some(0) => {
                self.refusals += 1;
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "scripted operator exhausted",
                ))
            }
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Instructions for an operator-performed action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualInstruction {
    pub title: String,
    /// Host or context the instructions apply to
    pub context: String,
    pub lines: Vec<String>,
}

impl ManualInstruction {
    pub fn new(title: impl Into<String>, context: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            context: context.into(),
            lines,
        }
    }

    /// Render the instruction block shown before blocking
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("------------------------------------------------------------\n");
        out.push_str(&format!("MANUAL STEP: {}\n", self.title));
        out.push_str(&format!("On: {}\n", self.context));
        out.push_str("------------------------------------------------------------\n");
        for (i, line) in self.lines.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, line));
        }
        out.push_str("------------------------------------------------------------\n");
        out
    }
}

/// Show the instructions, log, block for acknowledgment, log again.
pub fn run_manual_step(
    operator: &mut dyn Operator,
    instruction: &ManualInstruction,
    log: &mut RunLog,
) -> io::Result<()> {
    println!("{}", instruction.render());
    log.info(format!(
        "Awaiting operator: {} on {}",
        instruction.title, instruction.context
    ));
    operator.acknowledge("Press Enter once the steps above are complete...")?;
    log.info(format!(
        "Operator confirmed: {} on {}",
        instruction.title, instruction.context
    ));
    Ok(())
}
