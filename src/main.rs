//! raystudio - scene editor and progressive path tracer.

use std::env;
use std::path::PathBuf;

use raystudio::viewer::RunOptions;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_STAMP: &str = env!("RAYSTUDIO_BUILD_STAMP");

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut options = RunOptions::default();

    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage(&args[0]);
                return;
            }
            "-V" | "--version" => {
                println!("raystudio {} (built {})", VERSION, BUILD_STAMP);
                return;
            }
            "-v" | "--verbose" => options.verbose = true,
            "--trace" => options.chrome_trace = true,
            "--scenes" => match iter.next() {
                Some(dir) => options.scenes_dir = Some(PathBuf::from(dir)),
                None => {
                    eprintln!("Error: --scenes needs a directory");
                    std::process::exit(1);
                }
            },
            other if other.starts_with('-') => {
                eprintln!("Unknown option: {}", other);
                print_usage(&args[0]);
                std::process::exit(1);
            }
            file => {
                if options.initial_scene.is_some() {
                    eprintln!("Error: only one scene file can be opened");
                    std::process::exit(1);
                }
                options.initial_scene = Some(PathBuf::from(file));
            }
        }
    }

    if let Err(e) = raystudio::viewer::run(options) {
        eprintln!("raystudio error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(prog: &str) {
    println!("raystudio {} - scene editor with a progressive path tracer", VERSION);
    println!();
    println!("Usage: {} [options] [scene-file]", prog);
    println!();
    println!("Options:");
    println!("  --scenes <dir>  Directory scene names resolve against (default: data/scenes)");
    println!("  --trace         Write a chrome trace to trace.json");
    println!("  -v, --verbose   Debug logging (RUST_LOG overrides)");
    println!("  -V, --version   Show version and build date");
    println!("  -h, --help      Show this help");
    println!();
    println!("Keys:");
    println!("  Space  Toggle path tracing");
    println!("  F1     Toggle wireframe preview");
    println!("  P      Save a screenshot of the path traced image");
    println!("  H      Reset camera");
    println!("  F      Frame the scene");
}
