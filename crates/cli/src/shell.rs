//! Command interpreter behind the interactive shell.
//!
//! Kept separate from `main` so the command set can be driven from tests
//! with any `Write` sink instead of stdout.

use anyhow::{bail, Result};
use config::Config;
use memtable::Memtable;
use std::collections::HashMap;
use std::io::Write;
use tablet::{Pair, TabletReader, TabletWriter};

/// What the REPL should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    config: Config,
    mem: Memtable,
    /// Tablets opened so far, by name.
    tablets: HashMap<String, TabletReader>,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            mem: Memtable::new(),
            tablets: HashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one input line, writing the response to `out`.
    ///
    /// Command failures are reported as `ERR ...` lines; only failures to
    /// write to `out` are returned as errors.
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let mut parts = line.split_whitespace();
        let cmd = match parts.next() {
            Some(c) => c.to_uppercase(),
            None => return Ok(Flow::Continue),
        };
        let args: Vec<&str> = parts.collect();

        let result = match cmd.as_str() {
            "SET" => self.set(&args, out),
            "DEL" => self.del(&args, out),
            "GET" => self.get(&args, out),
            "SCAN" => self.scan(&args, out),
            "FLUSH" => self.flush(&args, out),
            "OPEN" => self.open(&args, out),
            "FIND" => self.find(&args, out),
            "LOOKUP" => self.lookup(&args, out),
            "INFO" => self.info(&args, out),
            "EXIT" | "QUIT" => {
                writeln!(out, "bye")?;
                return Ok(Flow::Exit);
            }
            other => {
                writeln!(out, "unknown command: {}", other)?;
                return Ok(Flow::Continue);
            }
        };
        if let Err(e) = result {
            tracing::debug!(command = %cmd, error = %e, "command failed");
            writeln!(out, "ERR {}", e)?;
        }
        Ok(Flow::Continue)
    }

    fn set<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        if args.len() < 2 {
            bail!("usage: SET key value");
        }
        let value = args[1..].join(" ");
        self.mem.set(args[0].as_bytes().to_vec(), value.into_bytes());
        writeln!(out, "OK")?;
        Ok(())
    }

    fn del<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let key = match args {
            [key] => key,
            _ => bail!("usage: DEL key"),
        };
        self.mem.delete(key.as_bytes().to_vec());
        writeln!(out, "OK")?;
        Ok(())
    }

    fn get<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let key = match args {
            [key] => key,
            _ => bail!("usage: GET key"),
        };
        match self.mem.get(key.as_bytes()) {
            Some(v) => writeln!(out, "{}", String::from_utf8_lossy(v))?,
            None => writeln!(out, "(nil)")?,
        }
        Ok(())
    }

    fn scan<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let start = args.first().map(|s| s.as_bytes());
        let pairs: Vec<Pair> = self.mem.find(start).collect();
        print_pairs(out, pairs.into_iter().map(Ok))
    }

    fn flush<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let name = tablet_name(args, "usage: FLUSH name")?;
        std::fs::create_dir_all(&self.config.dir)?;
        let path = self.config.tablet_path(name);
        let writer = TabletWriter::new(self.config.writer_options());
        let summary = writer.write_to_path(&path, self.mem.find(None))?;
        self.mem.clear();
        // a stale handle would keep serving the replaced file
        self.tablets.remove(name);
        tracing::info!(path = %path.display(), pairs = summary.pairs, "flushed memtable");
        writeln!(
            out,
            "OK ({} pairs, {} blocks, {} bytes)",
            summary.pairs, summary.data_blocks, summary.bytes_written
        )?;
        Ok(())
    }

    fn open<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let name = tablet_name(args, "usage: OPEN name")?;
        let reader = self.reader(name)?;
        writeln!(out, "OK ({} blocks)", reader.block_count())?;
        Ok(())
    }

    fn find<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let (name, start) = match args {
            [name] => (*name, None),
            [name, start] => (*name, Some(start.as_bytes())),
            _ => bail!("usage: FIND name [start]"),
        };
        let reader = self.reader(name)?;
        print_pairs(out, reader.find(start).map(|r| r.map_err(Into::into)))
    }

    fn lookup<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let (name, key) = match args {
            [name, key] => (*name, *key),
            _ => bail!("usage: LOOKUP name key"),
        };
        let reader = self.reader(name)?;
        match reader.get(key.as_bytes())? {
            Some(pair) => match pair.value_bytes() {
                Some(v) => writeln!(out, "{}", String::from_utf8_lossy(v))?,
                None => writeln!(out, "(deleted)")?,
            },
            None => writeln!(out, "(nil)")?,
        }
        Ok(())
    }

    fn info<W: Write>(&mut self, args: &[&str], out: &mut W) -> Result<()> {
        let name = tablet_name(args, "usage: INFO name")?;
        let reader = self.reader(name)?;
        let footer = reader.footer();
        writeln!(out, "blocks: {}", reader.block_count())?;
        writeln!(out, "meta blocks: {}", reader.meta_index().len())?;
        writeln!(
            out,
            "meta index: {}+{}",
            footer.meta_index_offset, footer.meta_index_length
        )?;
        writeln!(
            out,
            "data index: {}+{}",
            footer.data_index_offset, footer.data_index_length
        )?;
        Ok(())
    }

    /// Cached reader for tablet `name`, opened on first use.
    fn reader(&mut self, name: &str) -> Result<&TabletReader> {
        if !self.tablets.contains_key(name) {
            let reader = TabletReader::open(self.config.tablet_path(name))?;
            self.tablets.insert(name.to_string(), reader);
        }
        match self.tablets.get(name) {
            Some(r) => Ok(r),
            None => bail!("tablet {} is not open", name),
        }
    }
}

fn tablet_name<'a>(args: &[&'a str], usage: &str) -> Result<&'a str> {
    match args {
        [name] if is_valid_name(name) => Ok(*name),
        [name] => bail!("invalid tablet name {:?}", name),
        _ => bail!("{}", usage),
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn print_pairs<W, I>(out: &mut W, pairs: I) -> Result<()>
where
    W: Write,
    I: Iterator<Item = Result<Pair>>,
{
    let mut count = 0;
    for pair in pairs {
        let pair = pair?;
        match pair.value_bytes() {
            Some(v) => writeln!(
                out,
                "{} -> {}",
                String::from_utf8_lossy(&pair.key),
                String::from_utf8_lossy(v)
            )?,
            None => writeln!(out, "{} -> (deleted)", String::from_utf8_lossy(&pair.key))?,
        }
        count += 1;
    }
    if count == 0 {
        writeln!(out, "(empty)")?;
    } else {
        writeln!(out, "({} entries)", count)?;
    }
    Ok(())
}
