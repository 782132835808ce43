//! Binary entrypoint for figbuild

fn main() {
    if let Err(err) = figbuild_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
