use std::io::Write;

use color_eyre::Report;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Console output for the CLI tools.
///
/// Regular messages go to `out`, errors to `err`. `log` lines and error details are only
/// printed when debug output is enabled.
pub struct UI<'a> {
    out: &'a mut dyn Write,
    err: &'a mut dyn Write,
    color: bool,
    debug: bool,
    indentation: usize,
}

impl<'a> UI<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write, color: bool, debug: bool) -> Self {
        Self {
            out,
            err,
            color,
            debug,
            indentation: 0,
        }
    }

    pub fn indent(&mut self) {
        self.indentation += 1;
    }

    pub fn outdent(&mut self) {
        self.indentation = self.indentation.saturating_sub(1);
    }

    pub fn info(&mut self, msg: &str) {
        let line = self.line(msg);
        let _ = writeln!(self.out, "{}", line);
    }

    pub fn success(&mut self, msg: &str) {
        let line = self.paint(GREEN, &self.line(&format!("✓ {}", msg)));
        let _ = writeln!(self.out, "{}", line);
    }

    pub fn log(&mut self, msg: &str) {
        if self.debug {
            let line = self.paint(DIM, &self.line(msg));
            let _ = writeln!(self.out, "{}", line);
        }
    }

    /// Prints raw command output, e.g. a JSON document, without indentation or color.
    pub fn output(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }

    pub fn error(&mut self, msg: &str, report: &Report) {
        let line = self.paint(RED, &self.line(&format!("✗ {}", msg)));
        let _ = writeln!(self.err, "{}", line);
        if self.debug {
            let _ = writeln!(self.err, "{:?}", report);
        }
    }

    fn line(&self, msg: &str) -> String {
        format!("{}{}", "  ".repeat(self.indentation), msg)
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::eyre;

    use super::*;

    #[test]
    fn plain_output_is_indented() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut ui = UI::new(&mut out, &mut err, false, true);

        ui.info("Sweeping development sessions…");
        ui.indent();
        ui.log("connecting");
        ui.outdent();
        ui.outdent();
        ui.success("Done.");
        drop(ui);

        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r"
        Sweeping development sessions…
          connecting
        ✓ Done.
        ");
        assert!(err.is_empty());
    }

    #[test]
    fn quiet_mode_hides_logs_and_error_details() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut ui = UI::new(&mut out, &mut err, false, false);

        ui.log("connecting");
        ui.error("Could not sweep sessions!", &eyre!("database is locked"));
        drop(ui);

        assert!(out.is_empty());
        insta::assert_snapshot!(String::from_utf8(err).unwrap(), @"✗ Could not sweep sessions!");
    }

    #[test]
    fn colors_wrap_the_whole_line() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut ui = UI::new(&mut out, &mut err, true, false);

        ui.success("Done.");
        drop(ui);

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\x1b[32m✓ Done.\x1b[0m\n"
        );
    }
}
