use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;

// cli.rs only needs clap + clap_complete, both build-dependencies.
#[path = "src/cli.rs"]
mod cli;

fn main() -> io::Result<()> {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let Some(out_dir) = std::env::var_os("OUT_DIR").map(PathBuf::from) else {
        return Err(io::Error::other("OUT_DIR not set by Cargo"));
    };
    let man_dir = out_dir.join("man");
    std::fs::create_dir_all(&man_dir)?;

    write_pages(&cli::Cli::command(), &man_dir)
}

/// One page per visible command, named `ponwatch-<sub>.1`.
fn write_pages(cmd: &clap::Command, dir: &Path) -> io::Result<()> {
    let name = cmd.get_name().to_owned();
    let mut page = Vec::new();
    clap_mangen::Man::new(cmd.clone()).render(&mut page)?;
    std::fs::write(dir.join(format!("{name}.1")), page)?;

    for sub in cmd.get_subcommands().filter(|s| !s.is_hide_set()) {
        let sub = sub.clone().name(format!("{name}-{}", sub.get_name()));
        write_pages(&sub, dir)?;
    }
    Ok(())
}
