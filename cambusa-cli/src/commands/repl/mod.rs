//! `cambusa repl`: an interactive session bound to the loaded application.

pub mod eval;

use std::io::Write;

use cambusa_core::Application;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::commands::{models, routes};
use crate::error::CommandError;

pub use eval::{evaluate, EvalError};

pub const PROMPT: &str = "cambusa> ";

/// Ends the session, matched case-insensitively.
pub const EXIT_KEYWORD: &str = "exit";

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    /// The user typed the exit keyword.
    Command,
    /// The input stream closed.
    EndOfInput,
}

/// One REPL session over a borrowed application.
pub struct ReplSession<'a> {
    app: &'a Application,
}

impl<'a> ReplSession<'a> {
    pub fn new(app: &'a Application) -> Self {
        Self { app }
    }

    /// Read lines from `input` until the exit keyword or end of input.
    ///
    /// Results and built-in output go to `output`, evaluation errors to
    /// `errors`; the loop continues after either. Lines are decoded lossily,
    /// so bytes that are not UTF-8 surface as an evaluation error rather than
    /// ending the session. Only I/O on the streams themselves can fail it.
    pub async fn run<R, W, E>(
        &self,
        mut input: R,
        output: &mut W,
        errors: &mut E,
    ) -> Result<ReplExit, CommandError>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        E: Write,
    {
        writeln!(output, "Starting Cambusa REPL session...")?;
        writeln!(output, "Cambusa instance is available as \"{}\"", eval::BINDING)?;
        writeln!(output, "Type \"{EXIT_KEYWORD}\" to exit the session")?;

        let mut buf = Vec::new();
        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;

            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                writeln!(output)?;
                return Ok(ReplExit::EndOfInput);
            }
            let text = String::from_utf8_lossy(&buf);
            let line = text.trim();

            if line.eq_ignore_ascii_case(EXIT_KEYWORD) {
                writeln!(output, "Exiting Cambusa REPL session...")?;
                return Ok(ReplExit::Command);
            }
            if line.is_empty() {
                continue;
            }
            self.handle(line, output, errors).await?;
        }
    }

    /// Built-ins (`routes`, `models`, `help`) match exactly; anything else is an expression.
    async fn handle<W: Write, E: Write>(
        &self,
        line: &str,
        output: &mut W,
        errors: &mut E,
    ) -> std::io::Result<()> {
        match line {
            "routes" => routes::write_routes(output, self.app.routes()),
            "models" => models::write_models(output, self.app.models().keys()),
            "help" => write_help(output),
            _ => match evaluate(self.app, line).await {
                Ok(value) => writeln!(output, "{}", eval::render(&value)),
                Err(err) => {
                    tracing::debug!(error = %err, "evaluation failed");
                    writeln!(errors, "Error: {err}")?;
                    errors.flush()
                }
            },
        }
    }
}

fn write_help<W: Write>(output: &mut W) -> std::io::Result<()> {
    writeln!(output, "Available commands:")?;
    writeln!(output, "  routes - List all registered routes")?;
    writeln!(output, "  models - List all available models")?;
    writeln!(output, "  help   - Show this help message")?;
    writeln!(output, "  {EXIT_KEYWORD}   - Exit the REPL session")
}

/// `cambusa repl`
pub async fn run(app: &Application) -> Result<(), CommandError> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let exit = ReplSession::new(app)
        .run(stdin, &mut stdout, &mut stderr)
        .await?;
    tracing::debug!(?exit, "repl session ended");
    Ok(())
}
