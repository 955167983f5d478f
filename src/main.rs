use clap::Parser;

fn main() {
    let cli = vm_provision::cli::Cli::parse();
    if let Err(err) = cli.run() {
        vm_provision::util::logger::fatal(&err);
        std::process::exit(1);
    }
}
