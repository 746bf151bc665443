// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn recipe_arg() -> Arg {
    Arg::new("recipe")
        .short('r')
        .long("recipe")
        .value_name("FILE")
        .help("Recipe file (JSON); the built-in python-dmenuwrap recipe if omitted")
}

fn timeout_arg() -> Arg {
    Arg::new("timeout")
        .short('t')
        .long("timeout")
        .value_name("SECS")
        .default_value("30")
        .help("Download timeout in seconds")
}

fn build_cli() -> Command {
    Command::new("pkgstage")
        .version(env!("CARGO_PKG_VERSION"))
        .author("pkgstage Contributors")
        .about("Fetch, verify and stage upstream sources into a package root")
        .subcommand_required(false)
        .subcommand(
            Command::new("stage")
                .about("Fetch, verify and install a package into a staging root")
                .arg(
                    Arg::new("dest")
                        .required(true)
                        .help("Staging root to create (must not exist or be empty)"),
                )
                .arg(recipe_arg())
                .arg(
                    Arg::new("python")
                        .long("python")
                        .value_name("PATH")
                        .default_value("python")
                        .help("Python interpreter that runs setup.py"),
                )
                .arg(
                    Arg::new("optimize")
                        .short('O')
                        .long("optimize")
                        .value_name("LEVEL")
                        .help("Bytecode optimization level (overrides the recipe)"),
                )
                .arg(timeout_arg())
                .arg(
                    Arg::new("scratch")
                        .long("scratch")
                        .value_name("DIR")
                        .help("Parent directory for scratch extraction"),
                )
                .arg(
                    Arg::new("manifest_out")
                        .long("manifest-out")
                        .value_name("FILE")
                        .help("Write the staged file manifest (JSON) to this path"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print the validated recipe as JSON")
                .arg(recipe_arg()),
        )
        .subcommand(
            Command::new("verify")
                .about("Fetch the source archive and check its checksum")
                .arg(recipe_arg())
                .arg(timeout_arg()),
        )
        .subcommand(
            Command::new("manifest")
                .about("Print the manifest of an existing staging root")
                .arg(Arg::new("root").required(true).help("Staging root to scan")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .action(ArgAction::Set)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Target shell"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("pkgstage.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
