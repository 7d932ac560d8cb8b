use anyhow::Result;
use wasmlock::cli::WasmlockCli;
use wasmlock::colors::{C_RED, C_RESET};

fn main() {
    if let Err(e) = real_main() {
        eprintln!("{C_RED}wasmlock error{C_RESET}: {e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let cli = WasmlockCli::parse();
    cli.run()
}
