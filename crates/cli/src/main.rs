///! # CLI - tablet shell
///!
///! A REPL-style command-line interface for building and inspecting tablet
///! files. Writes go to an in-memory memtable; `FLUSH` turns the memtable into
///! an immutable tablet on disk, which `FIND`, `LOOKUP` and `INFO` then read.
///! Designed for both interactive use and scripted testing (pipe commands via
///! stdin).
///!
///! ## Commands
///!
///! ```text
///! SET key value        Insert or update a pair in the memtable
///! GET key              Look up a key in the memtable (prints value or "(nil)")
///! DEL key              Delete a key (records a tombstone)
///! SCAN [start]         List memtable pairs from `start` (inclusive)
///! FLUSH name           Write the memtable to <dir>/name.tab and clear it
///! OPEN name            Open a tablet and print its block count
///! FIND name [start]    List tablet pairs from `start` (inclusive)
///! LOOKUP name key      Point lookup in a tablet
///! INFO name            Print block and index layout of a tablet
///! EXIT / QUIT          Leave the shell
///! ```
///!
///! ## Configuration
///!
///! ```text
///! TABLET_DIR              Tablet directory          (default: "data")
///! TABLET_BLOCK_SIZE       Data block size in bytes  (default: 4096)
///! TABLET_COMPRESSION      none | snappy             (default: none)
///! TABLET_RESTART_INTERVAL Keys per restart point    (default: 16)
///! RUST_LOG                Log filter for stderr     (default: "warn")
///! ```
///!
///! ## Example
///!
///! ```text
///! $ cargo run -p cli
///! tablet shell (dir=data, block_size=4096, compression=none, restart_interval=16)
///! > SET name Alice
///! OK
///! > FLUSH people
///! OK (1 pairs, 1 blocks, 78 bytes)
///! > FIND people
///! name -> Alice
///! (1 entries)
///! > EXIT
///! bye
///! ```

mod shell;

use anyhow::Result;
use config::Config;
use shell::{Flow, Shell};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Logs go to stderr so scripted stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let shell_config = Config::from_env()?;
    let mut shell = Shell::new(shell_config);
    let config = shell.config();
    println!(
        "tablet shell (dir={}, block_size={}, compression={}, restart_interval={})",
        config.dir.display(),
        config.block_size,
        config.compression,
        config.key_restart_interval
    );
    println!("Commands: SET key value | GET key | DEL key | SCAN [start]");
    println!("          FLUSH name | OPEN name | FIND name [start] | LOOKUP name key");
    println!("          INFO name | EXIT");

    let stdout = io::stdout();
    let stdin = io::stdin();

    print!("> ");
    stdout.lock().flush().ok();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut out = stdout.lock();
        if shell.execute(&line, &mut out)? == Flow::Exit {
            return Ok(());
        }
        write!(out, "> ")?;
        out.flush().ok();
    }

    tracing::debug!("stdin closed");
    Ok(())
}
