use std::io::{self, Stdout, Write};

use crate::errors::{AvatarSegError, Result};

/// Line protocol a host application reads from stdout:
/// `STARTING:<n>`, `PROGRESS:<i>/<n>`, `DONE`, `ERROR:<message>`.
///
/// Every line is flushed as soon as it is written.
pub struct ProgressReporter<W: Write> {
    out: W,
}

impl ProgressReporter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ProgressReporter<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn starting(&mut self, total: usize) -> Result<()> {
        self.line(format_args!("STARTING:{total}"))
    }

    pub fn progress(&mut self, current: usize, total: usize) -> Result<()> {
        self.line(format_args!("PROGRESS:{current}/{total}"))
    }

    pub fn done(&mut self) -> Result<()> {
        self.line(format_args!("DONE"))
    }

    /// Line breaks in `message` are folded so the error stays one line.
    pub fn error(&mut self, message: &str) -> Result<()> {
        let message = message.split(['\r', '\n']).filter(|s| !s.is_empty()).collect::<Vec<_>>();
        self.line(format_args!("ERROR:{}", message.join(" ")))
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) -> Result<()> {
        writeln!(self.out, "{args}")
            .and_then(|()| self.out.flush())
            .map_err(|source| AvatarSegError::FileSystem {
                path: "<stdout>".into(),
                operation: "write progress".to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(reporter: ProgressReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_batch_lines() -> Result<()> {
        let mut reporter = ProgressReporter::new(Vec::new());
        reporter.starting(2)?;
        reporter.progress(1, 2)?;
        reporter.error("bad file")?;
        reporter.progress(2, 2)?;
        reporter.done()?;

        assert_eq!(
            output(reporter),
            "STARTING:2\nPROGRESS:1/2\nERROR:bad file\nPROGRESS:2/2\nDONE\n"
        );
        Ok(())
    }

    #[test]
    fn test_error_is_kept_on_one_line() -> Result<()> {
        let mut reporter = ProgressReporter::new(Vec::new());
        reporter.error("first\nsecond\r\nthird")?;
        assert_eq!(output(reporter), "ERROR:first second third\n");
        Ok(())
    }

    #[test]
    fn test_zero_images() -> Result<()> {
        let mut reporter = ProgressReporter::new(Vec::new());
        reporter.starting(0)?;
        reporter.done()?;
        assert_eq!(output(reporter), "STARTING:0\nDONE\n");
        Ok(())
    }
}
