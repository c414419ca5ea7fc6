use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::{Arc, Mutex};

use crate::messages::ButtonAction;
use crate::scanner::{ButtonMenu, SourceError, UidSource};

/// Simulated reader and button panel on a terminal.
///
/// Clones share one input stream, so the UID prompt and the button menu can
/// be handed out separately without losing buffered lines.
pub struct Console<R, W> {
    inner: Arc<Mutex<Io<R, W>>>,
}

struct Io<R, W> {
    input: R,
    output: W,
}

impl<R, W> Clone for Console<R, W> {
    fn clone(&self) -> Self {
        Console {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Console<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Console::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Console {
            inner: Arc::new(Mutex::new(Io { input, output })),
        }
    }

    fn with_io<T>(
        &self,
        f: impl FnOnce(&mut Io<R, W>) -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        let mut io = self
            .inner
            .lock()
            .map_err(|_| SourceError::Reader("console lock poisoned".to_string()))?;
        f(&mut *io)
    }
}

impl<R: BufRead, W: Write> Io<R, W> {
    fn prompt(&mut self, text: &str) -> Result<String, SourceError> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(SourceError::Closed);
        }
        Ok(line.trim().to_string())
    }
}

impl<R, W> UidSource for Console<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn read_uid(&mut self) -> Result<String, SourceError> {
        self.with_io(|io| io.prompt("Simulate UID > "))
    }
}

impl<R, W> ButtonMenu for Console<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn open(&mut self) -> Result<(), SourceError> {
        self.with_io(|io| {
            writeln!(io.output)?;
            writeln!(io.output, "[SIM] Button simulation mode")?;
            writeln!(io.output, "  1 = P1 score+   2 = P2 score+")?;
            writeln!(io.output, "  3 = P1 score-   4 = P2 score-")?;
            writeln!(io.output, "  5 = Back")?;
            writeln!(io.output, "  Enter = skip (return to RFID scan)")?;
            writeln!(io.output)?;
            Ok(())
        })
    }

    fn next_action(&mut self) -> Result<Option<ButtonAction>, SourceError> {
        self.with_io(|io| loop {
            let key = io.prompt("Button [1-5] > ")?;
            if key.is_empty() {
                return Ok(None);
            }
            match ButtonAction::from_key(&key) {
                Some(action) => return Ok(Some(action)),
                None => writeln!(io.output, "  Invalid key")?,
            }
        })
    }
}

#[cfg(test)]
impl<R> Console<R, Vec<u8>> {
    pub fn transcript(&self) -> String {
        let io = self.inner.lock().unwrap();
        String::from_utf8_lossy(&io.output).to_string()
    }
}
