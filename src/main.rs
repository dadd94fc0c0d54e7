//! Command-line front end for the disk-resident B-tree index.
//!
//! Argument parsing is hand-rolled rather than built on `clap`: the
//! external contract (DESIGN.md / SPEC_FULL.md section 4.0.2) requires
//! usage and error text on stdout with a uniform non-zero exit, which is
//! easier to guarantee by hand than to bend a general-purpose parser
//! into.

use std::path::Path;
use std::process::ExitCode;

use log::info;

use btree_index::btree::BTree;
use btree_index::delimited;
use btree_index::error::Error;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("usage: btree_index <command> <args>");
        return ExitCode::FAILURE;
    }

    let result = match args[1].as_str() {
        "create" => run_create(&args),
        "insert" => run_insert(&args),
        "search" => run_search(&args),
        "load" => run_load(&args),
        "print" => run_print(&args),
        "extract" => run_extract(&args),
        other => {
            println!("Error: unknown command '{}'", other);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        // Usage errors already printed their "usage: ..." line at the
        // call site; don't print it twice.
        Err(Error::Usage(_)) => ExitCode::FAILURE,
        Err(e) => {
            println!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_create(args: &[String]) -> Result<(), Error> {
    if args.len() != 3 {
        println!("usage: btree_index create <index>");
        return Err(Error::Usage("wrong argument count".into()));
    }
    let tree = BTree::create(Path::new(&args[2]))?;
    info!("created {}", args[2]);
    tree.close()
}

fn run_insert(args: &[String]) -> Result<(), Error> {
    if args.len() != 5 {
        println!("usage: btree_index insert <index> <key> <value>");
        return Err(Error::Usage("wrong argument count".into()));
    }
    let mut tree = BTree::open(Path::new(&args[2]))?;
    let key = parse_u64_arg(&args[3]);
    let value = parse_u64_arg(&args[4]);
    let result = match (key, value) {
        (Ok(k), Ok(v)) => tree.insert(k, v),
        (Err(e), _) | (_, Err(e)) => Err(e),
    };
    tree.close()?;
    result
}

fn run_search(args: &[String]) -> Result<(), Error> {
    if args.len() != 4 {
        println!("usage: btree_index search <index> <key>");
        return Err(Error::Usage("wrong argument count".into()));
    }
    let mut tree = BTree::open(Path::new(&args[2]))?;
    let key = parse_u64_arg(&args[3])?;
    let found = tree.search(key)?;
    tree.close()?;
    match found {
        Some(value) => {
            println!("{} {}", key, value);
            Ok(())
        }
        None => Err(Error::NotFound),
    }
}

fn run_load(args: &[String]) -> Result<(), Error> {
    if args.len() != 4 {
        println!("usage: btree_index load <index> <csv>");
        return Err(Error::Usage("wrong argument count".into()));
    }
    let mut tree = BTree::open(Path::new(&args[2]))?;
    let loaded = delimited::bulk_load(&mut tree, Path::new(&args[3]));
    tree.close()?;
    let count = loaded?;
    info!("loaded {} rows", count);
    Ok(())
}

fn run_print(args: &[String]) -> Result<(), Error> {
    if args.len() != 3 {
        println!("usage: btree_index print <index>");
        return Err(Error::Usage("wrong argument count".into()));
    }
    let mut tree = BTree::open(Path::new(&args[2]))?;
    let printed = tree.traverse(|k, v| println!("{} {}", k, v));
    tree.close()?;
    printed
}

fn run_extract(args: &[String]) -> Result<(), Error> {
    if args.len() != 4 {
        println!("usage: btree_index extract <index> <out>");
        return Err(Error::Usage("wrong argument count".into()));
    }
    let mut tree = BTree::open(Path::new(&args[2]))?;
    let result = delimited::extract(&mut tree, Path::new(&args[3]));
    tree.close()?;
    result
}

fn parse_u64_arg(s: &str) -> Result<u64, Error> {
    s.parse()
        .map_err(|_| Error::Argument(format!("'{}' is not a valid unsigned 64-bit integer", s)))
}
